use chrono::{DateTime, Duration, TimeZone, Utc};
use messenger::domain::display::HIDDEN_PLACEHOLDER;
use messenger::domain::repository::ParticipantRepository;
use messenger::{DomainError, ManualClock, Messenger, MessengerConfig, NewMessage, ThreadId};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
}

fn config() -> MessengerConfig {
    let mut config = MessengerConfig::default();
    config.users.name_columns = vec!["first_name".to_string(), "last_name".to_string()];
    config.display.utc_offset_seconds = Some(0);
    config
}

const USERS: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL
    );
    INSERT OR IGNORE INTO users (id, first_name, last_name) VALUES
        (1, 'Ana', 'Silva'),
        (2, 'Bruno', 'Costa'),
        (3, 'Carla', 'Souza'),
        (4, 'Davi', 'Lima');
";

/// Test helper: in-memory messenger with a seeded users table and a manual clock.
fn setup() -> (Messenger, ManualClock) {
    let clock = ManualClock::new(start());
    let messenger = Messenger::open_in_memory(&config())
        .unwrap()
        .with_clock(clock.clone());
    messenger.database().connection().execute_batch(USERS).unwrap();
    (messenger, clock)
}

fn tick(clock: &ManualClock) {
    clock.advance(Duration::seconds(1));
}

fn post(m: &Messenger, thread_id: ThreadId, user_id: i64, body: &str) -> messenger::Message {
    m.messages().post(&NewMessage::text(thread_id, user_id, body)).unwrap()
}

fn participant_rows(m: &Messenger, thread_id: ThreadId) -> i64 {
    m.database()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM messenger_participants WHERE thread_id = ?1",
            [thread_id],
            |row| row.get(0),
        )
        .unwrap()
}

fn sorted_ids(threads: Vec<messenger::Thread>) -> Vec<ThreadId> {
    let mut ids: Vec<ThreadId> = threads.into_iter().map(|t| t.id).collect();
    ids.sort_unstable();
    ids
}

// --- membership ---

#[test]
fn adding_same_participant_twice_keeps_one_row() {
    let (m, _clock) = setup();
    let thread = m.threads().create("dup", None, &[1, 2]).unwrap();

    m.threads().add_participants(thread.id, &[2, 2]).unwrap();

    assert_eq!(participant_rows(&m, thread.id), 2);
    assert_eq!(m.threads().participants_user_ids(thread.id, None).unwrap(), vec![1, 2]);
}

#[test]
fn removing_then_re_adding_restores_original_row() {
    let (m, clock) = setup();
    let thread = m.threads().create("restore", None, &[1, 2]).unwrap();
    let original = m.database().participants().find(thread.id, 2).unwrap().unwrap();

    tick(&clock);
    assert_eq!(m.threads().remove_participants(thread.id, &[2]).unwrap(), 1);
    assert!(!m.threads().has_participant(thread.id, 2).unwrap());
    let trashed = m
        .database()
        .participants()
        .find_with_trashed(thread.id, 2)
        .unwrap()
        .unwrap();
    assert!(trashed.deleted_at.is_some());

    tick(&clock);
    m.threads().add_participants(thread.id, &[2]).unwrap();

    let restored = m.database().participants().find(thread.id, 2).unwrap().unwrap();
    assert_eq!(restored.id, original.id);
    assert!(restored.is_active());
    assert_eq!(participant_rows(&m, thread.id), 2);
}

#[test]
fn operations_for_non_participants_are_silent_noops() {
    let (m, _clock) = setup();
    let thread = m.threads().create("strangers", None, &[1, 2]).unwrap();
    post(&m, thread.id, 1, "hello");

    assert!(!m.threads().mark_as_read(thread.id, 9).unwrap());
    assert_eq!(m.threads().add_moderators(thread.id, &[9]).unwrap(), 0);
    assert_eq!(m.threads().remove_moderators(thread.id, &[9]).unwrap(), 0);
    assert!(!m.threads().is_unread(thread.id, 9).unwrap());
    assert!(m.threads().user_unread_messages(thread.id, 9).unwrap().is_empty());
    assert!(m.database().participants().find_with_trashed(thread.id, 9).unwrap().is_none());
}

#[test]
fn moderator_flag_toggles_on_active_participants_only() {
    let (m, _clock) = setup();
    let thread = m.threads().create("mods", None, &[1, 2, 3]).unwrap();

    assert_eq!(m.threads().add_moderators(thread.id, &[2, 3]).unwrap(), 2);
    assert!(m.database().participants().find(thread.id, 2).unwrap().unwrap().moderator);

    assert_eq!(m.threads().remove_moderators(thread.id, &[2]).unwrap(), 1);
    assert!(!m.database().participants().find(thread.id, 2).unwrap().unwrap().moderator);
    assert!(m.database().participants().find(thread.id, 3).unwrap().unwrap().moderator);

    m.threads().remove_participants(thread.id, &[3]).unwrap();
    assert_eq!(m.threads().remove_moderators(thread.id, &[3]).unwrap(), 0);
}

#[test]
fn participants_user_ids_include_removed_and_extra() {
    let (m, _clock) = setup();
    let thread = m.threads().create("ids", None, &[1, 2, 3]).unwrap();
    m.threads().remove_participants(thread.id, &[3]).unwrap();

    assert_eq!(
        m.threads().participants_user_ids(thread.id, Some(4)).unwrap(),
        vec![1, 2, 3, 4]
    );
    assert_eq!(m.threads().participants_id(thread.id, Some(1)).unwrap(), vec![2, 3]);
}

#[test]
fn participant_ids_skip_users_missing_from_host_table() {
    let (m, _clock) = setup();
    let thread = m.threads().create("orphan", None, &[1, 9, 2]).unwrap();

    assert_eq!(m.threads().participants_id(thread.id, Some(1)).unwrap(), vec![2]);
    assert_eq!(m.threads().participants_id(thread.id, None).unwrap(), vec![1, 2]);
    assert_eq!(m.threads().summary(thread.id, 1).unwrap().participants_id, vec![2]);
    assert!(m.threads().has_participant(thread.id, 9).unwrap());
}

#[test]
fn activate_all_participants_restores_removed_rows() {
    let (m, _clock) = setup();
    let thread = m.threads().create("wake", None, &[1, 2, 3]).unwrap();
    m.threads().remove_participants(thread.id, &[2, 3]).unwrap();
    assert_eq!(m.database().participants().find_by_thread(thread.id).unwrap().len(), 1);

    assert_eq!(m.threads().activate_all_participants(thread.id).unwrap(), 2);
    assert_eq!(m.database().participants().find_by_thread(thread.id).unwrap().len(), 3);
    assert_eq!(m.threads().activate_all_participants(thread.id).unwrap(), 0);
}

#[test]
fn adding_participant_to_missing_thread_is_rejected_by_database() {
    let (m, _clock) = setup();
    let err = m.threads().add_participants(999, &[1]).unwrap_err();
    assert!(matches!(err, DomainError::Database(_)));
}

// --- read state ---

#[test]
fn is_unread_follows_last_read() {
    let (m, clock) = setup();
    let thread = m.threads().create("read", None, &[1, 2]).unwrap();

    assert!(m.threads().is_unread(thread.id, 2).unwrap());

    assert!(m.threads().mark_as_read(thread.id, 2).unwrap());
    assert!(!m.threads().is_unread(thread.id, 2).unwrap());

    tick(&clock);
    post(&m, thread.id, 1, "ping");
    assert!(m.threads().is_unread(thread.id, 2).unwrap());

    tick(&clock);
    m.threads().mark_as_read(thread.id, 2).unwrap();
    assert!(!m.threads().is_unread(thread.id, 2).unwrap());
}

#[test]
fn removed_participant_cannot_mark_as_read() {
    let (m, _clock) = setup();
    let thread = m.threads().create("gone", None, &[1, 2]).unwrap();
    m.threads().remove_participants(thread.id, &[2]).unwrap();

    assert!(!m.threads().mark_as_read(thread.id, 2).unwrap());
    assert!(!m.threads().is_unread(thread.id, 2).unwrap());
}

#[test]
fn user_unread_messages_skip_own_and_already_read() {
    let (m, clock) = setup();
    let thread = m.threads().create("unread", None, &[1, 2]).unwrap();

    post(&m, thread.id, 1, "a");
    tick(&clock);
    post(&m, thread.id, 2, "b");

    let unread = m.threads().user_unread_messages(thread.id, 2).unwrap();
    assert_eq!(unread.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(), vec!["a"]);

    tick(&clock);
    m.threads().mark_as_read(thread.id, 2).unwrap();
    tick(&clock);
    post(&m, thread.id, 1, "c");

    let unread = m.threads().user_unread_messages(thread.id, 2).unwrap();
    assert_eq!(unread.iter().map(|m| m.body.as_str()).collect::<Vec<_>>(), vec!["c"]);
    assert_eq!(m.threads().user_unread_messages_count(thread.id, 2).unwrap(), 1);
    assert_eq!(m.threads().user_unread_messages_count(thread.id, 1).unwrap(), 1);
}

#[test]
fn global_unread_count_agrees_with_per_thread_counts() {
    let (m, clock) = setup();
    let t1 = m.threads().create("one", None, &[1, 2]).unwrap();
    let t2 = m.threads().create("two", None, &[1, 2, 3]).unwrap();

    tick(&clock);
    post(&m, t1.id, 1, "hi from ana");
    post(&m, t2.id, 3, "hi from carla");
    post(&m, t2.id, 2, "own message");

    let per_thread = m.threads().user_unread_messages_count(t1.id, 2).unwrap()
        + m.threads().user_unread_messages_count(t2.id, 2).unwrap();
    assert_eq!(per_thread, 2);
    assert_eq!(m.user().unread_messages_count(2).unwrap(), 2);
    assert_eq!(m.user().unread_messages(2).unwrap().len(), 2);

    tick(&clock);
    m.threads().mark_as_read(t1.id, 2).unwrap();
    assert_eq!(m.user().unread_messages_count(2).unwrap(), 1);

    m.threads().delete(t2.id).unwrap();
    assert_eq!(m.user().unread_messages_count(2).unwrap(), 0);
    assert_eq!(m.threads().user_unread_messages_count(t2.id, 2).unwrap(), 0);
    assert!(m.threads().user_unread_messages(t2.id, 2).unwrap().is_empty());
    assert!(!m.threads().is_unread(t2.id, 2).unwrap());
}

// --- scopes ---

#[test]
fn between_matches_exact_participant_sets() {
    let (m, _clock) = setup();
    let pair = m.threads().create("pair", None, &[1, 2]).unwrap();
    let trio = m.threads().create("trio", None, &[1, 2, 3]).unwrap();
    let solo = m.threads().create("solo", None, &[1]).unwrap();
    let reversed = m.threads().create("reversed", None, &[2, 1]).unwrap();

    let mut expected = vec![pair.id, reversed.id];
    expected.sort_unstable();
    assert_eq!(sorted_ids(m.threads().between(&[1, 2]).unwrap()), expected);
    assert_eq!(sorted_ids(m.threads().between(&[2, 1, 1]).unwrap()), expected);
    assert_eq!(sorted_ids(m.threads().between(&[1]).unwrap()), vec![solo.id]);
    assert!(m.threads().between(&[]).unwrap().is_empty());

    m.threads().remove_participants(trio.id, &[3]).unwrap();
    let mut expected = vec![pair.id, trio.id, reversed.id];
    expected.sort_unstable();
    assert_eq!(sorted_ids(m.threads().between(&[1, 2]).unwrap()), expected);
}

#[test]
fn for_user_skips_removed_participations() {
    let (m, _clock) = setup();
    let a = m.threads().create("a", None, &[1, 3]).unwrap();
    let b = m.threads().create("b", None, &[2, 3]).unwrap();
    m.threads().remove_participants(b.id, &[3]).unwrap();

    assert_eq!(sorted_ids(m.threads().for_user(3).unwrap()), vec![a.id]);
    let mut both = vec![a.id, b.id];
    both.sort_unstable();
    assert_eq!(sorted_ids(m.user().threads(3).unwrap()), both);
}

#[test]
fn threads_with_new_messages_track_last_read() {
    let (m, clock) = setup();
    let a = m.threads().create("a", None, &[1, 2]).unwrap();
    let b = m.threads().create("b", None, &[1, 2]).unwrap();
    assert_eq!(m.user().new_threads_count(2).unwrap(), 2);

    tick(&clock);
    m.threads().mark_as_read(a.id, 2).unwrap();
    m.threads().mark_as_read(b.id, 2).unwrap();
    assert!(m.threads().for_user_with_new_messages(2).unwrap().is_empty());

    tick(&clock);
    post(&m, b.id, 1, "news");
    assert_eq!(sorted_ids(m.user().threads_with_new_messages(2).unwrap()), vec![b.id]);
    assert_eq!(m.user().new_threads_count(2).unwrap(), 1);
}

#[test]
fn latest_and_subject_lookup_ignore_deleted_threads() {
    let (m, clock) = setup();
    let old = m.threads().create("Weekly sync", None, &[1]).unwrap();
    tick(&clock);
    let newer = m.threads().create("Budget review", None, &[1]).unwrap();
    tick(&clock);
    let gone = m.threads().create("Weekly retro", None, &[1]).unwrap();
    m.threads().delete(gone.id).unwrap();

    let latest: Vec<_> = m.threads().latest().unwrap().into_iter().map(|t| t.id).collect();
    assert_eq!(latest, vec![newer.id, old.id]);

    let weekly = m.threads().by_subject("Weekly%").unwrap();
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].id, old.id);

    assert!(m.threads().find(gone.id).unwrap().is_none());
    assert!(matches!(m.threads().delete(gone.id), Err(DomainError::ThreadNotFound(_))));
}

// --- messages ---

#[test]
fn posting_touches_thread_updated_at() {
    let (m, clock) = setup();
    let thread = m.threads().create("touch", None, &[1, 2]).unwrap();
    clock.advance(Duration::minutes(5));

    post(&m, thread.id, 1, "hello");

    let thread = m.threads().get(thread.id).unwrap();
    assert_eq!(thread.updated_at, start() + Duration::minutes(5));
    assert_eq!(thread.created_at, start());
}

#[test]
fn posting_to_missing_thread_fails() {
    let (m, _clock) = setup();
    let err = m.messages().post(&NewMessage::text(42, 1, "void")).unwrap_err();
    assert!(matches!(err, DomainError::ThreadNotFound(42)));
}

#[test]
fn recipients_exclude_author() {
    let (m, _clock) = setup();
    let thread = m.threads().create("team", None, &[1, 2, 3]).unwrap();
    let msg = post(&m, thread.id, 1, "standup?");

    let recipients: Vec<i64> = m
        .messages()
        .recipients(msg.id)
        .unwrap()
        .into_iter()
        .map(|p| p.user_id)
        .collect();
    assert_eq!(recipients, vec![2, 3]);
}

#[test]
fn replies_resolve_their_parent() {
    let (m, _clock) = setup();
    let thread = m.threads().create("reply", None, &[1, 2]).unwrap();
    let question = post(&m, thread.id, 1, "lunch?");
    let answer = m.messages().reply(question.id, 2, "sure").unwrap();

    assert!(answer.is_reply());
    assert_eq!(answer.thread_id, thread.id);
    assert_eq!(m.messages().parent(answer.id).unwrap().unwrap().id, question.id);
    assert_eq!(m.messages().replies(question.id).unwrap().len(), 1);

    m.messages().delete(question.id).unwrap();
    assert_eq!(m.messages().parent(answer.id).unwrap().unwrap().id, question.id);
}

#[test]
fn reply_across_threads_is_rejected() {
    let (m, _clock) = setup();
    let a = m.threads().create("a", None, &[1, 2]).unwrap();
    let b = m.threads().create("b", None, &[1, 2]).unwrap();
    let original = post(&m, a.id, 1, "in a");

    let err = m
        .messages()
        .post(&NewMessage {
            parent_id: Some(original.id),
            ..NewMessage::text(b.id, 2, "in b")
        })
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput(_)));
}

#[test]
fn edit_and_delete_messages() {
    let (m, clock) = setup();
    let thread = m.threads().create("edit", None, &[1, 2]).unwrap();
    let msg = post(&m, thread.id, 1, "tpyo");

    tick(&clock);
    let edited = m.messages().edit(msg.id, "typo").unwrap();
    assert_eq!(edited.body, "typo");
    assert_eq!(edited.updated_at, start() + Duration::seconds(1));
    assert_eq!(m.threads().get(thread.id).unwrap().updated_at, edited.updated_at);

    m.messages().delete(msg.id).unwrap();
    assert!(m.messages().find(msg.id).unwrap().is_none());
    assert!(m.messages().thread_messages(thread.id, 1).unwrap().is_empty());
    assert!(matches!(m.messages().edit(msg.id, "again"), Err(DomainError::MessageNotFound(_))));
}

#[test]
fn direct_messages_are_visible_to_addressee_only() {
    let (m, _clock) = setup();
    let thread = m.threads().create("dm", None, &[1, 2, 3]).unwrap();
    post(&m, thread.id, 1, "for everyone");
    m.messages()
        .post(&NewMessage {
            to_user_id: Some(2),
            system_message: true,
            ..NewMessage::text(thread.id, 1, "just for bruno")
        })
        .unwrap();

    assert_eq!(m.messages().thread_messages(thread.id, 2).unwrap().len(), 2);
    assert_eq!(m.messages().thread_messages(thread.id, 3).unwrap().len(), 1);
    assert_eq!(m.threads().user_unread_messages_count(thread.id, 3).unwrap(), 1);
    assert_eq!(m.user().unread_messages_count(3).unwrap(), 1);
    assert_eq!(m.user().unread_messages_count(2).unwrap(), 2);
}

#[test]
fn create_with_message_marks_first_message_and_reads_for_author() {
    let (m, _clock) = setup();
    let (thread, message) = m
        .threads()
        .create_with_message("kickoff", 1, "welcome", &[2, 3])
        .unwrap();

    assert!(message.first_message);
    assert_eq!(m.messages().first_message(thread.id).unwrap().unwrap().id, message.id);
    assert!(!m.threads().is_unread(thread.id, 1).unwrap());
    assert!(m.threads().is_unread(thread.id, 2).unwrap());
    assert_eq!(m.threads().creator(thread.id, 9).unwrap(), 1);
}

#[test]
fn creator_is_author_of_oldest_message_even_if_deleted() {
    let (m, clock) = setup();
    let thread = m.threads().create("who", None, &[1, 2]).unwrap();
    assert_eq!(m.threads().creator(thread.id, 1).unwrap(), 1);

    let first = post(&m, thread.id, 2, "first");
    tick(&clock);
    post(&m, thread.id, 1, "second");
    m.messages().delete(first.id).unwrap();

    assert_eq!(m.threads().creator(thread.id, 1).unwrap(), 2);
}

// --- derived fields ---

#[test]
fn summary_of_empty_thread() {
    let (m, _clock) = setup();
    let thread = m.threads().create("quiet", None, &[1, 2, 3]).unwrap();

    let summary = m.threads().summary(thread.id, 1).unwrap();
    assert_eq!(summary.last_message_text, HIDDEN_PLACEHOLDER);
    assert_eq!(summary.last_message_at, "");
    assert_eq!(summary.last_message_timestamp, thread.created_at);
    assert_eq!(summary.qtd_messages, 0);
    assert_eq!(summary.unread_messages, 0);
    assert_eq!(summary.participants_string, "Bruno Costa, Carla Souza");
    assert_eq!(summary.participants_id, vec![2, 3]);
    assert!(!summary.is_group);
    assert!(!summary.is_emoji);
}

#[test]
fn summary_reflects_latest_message() {
    let (m, clock) = setup();
    let thread = m.threads().create("chat", None, &[1, 2]).unwrap();
    post(&m, thread.id, 1, "<b>hi</b>");
    tick(&clock);
    let emoji = post(&m, thread.id, 1, "😀");

    let summary = m.threads().summary(thread.id, 2).unwrap();
    assert!(summary.is_emoji);
    assert_eq!(summary.qtd_messages, 1);
    assert_eq!(summary.last_message_text, "<span>😀</span>");
    assert_eq!(summary.last_message_timestamp, emoji.created_at);
    assert_eq!(summary.last_message_at, "12:00");
    assert_eq!(summary.unread_messages, 2);
    assert_eq!(summary.participants_string, "Ana Silva");

    tick(&clock);
    post(&m, thread.id, 2, "😀 hi");
    assert!(!m.threads().summary(thread.id, 2).unwrap().is_emoji);
}

#[test]
fn summary_renders_attachment_placeholder() {
    let (m, _clock) = setup();
    let thread = m.threads().create("pics", None, &[1, 2]).unwrap();
    m.messages()
        .post(&NewMessage {
            attachment: Some("uploads/cat.png".to_string()),
            ..NewMessage::text(thread.id, 1, "")
        })
        .unwrap();

    let summary = m.threads().summary(thread.id, 2).unwrap();
    assert_eq!(
        summary.last_message_text,
        r#"<span style="font-style: italic;">Image</span>"#
    );
    assert!(!summary.is_emoji);
}

#[test]
fn summary_skips_messages_deleted_for_viewer_or_everyone() {
    let (m, clock) = setup();
    let thread = m.threads().create("hidden", None, &[1, 2]).unwrap();
    let first = post(&m, thread.id, 1, "first");
    tick(&clock);
    let second = post(&m, thread.id, 1, "second");

    m.messages().delete_for_user(second.id, 2).unwrap();
    assert!(m.messages().is_hidden_for(second.id, 2).unwrap());
    assert_eq!(m.threads().summary(thread.id, 2).unwrap().last_message_text, "<span>first</span>");
    assert_eq!(m.threads().summary(thread.id, 1).unwrap().last_message_text, "<span>second</span>");

    let wiped = m.messages().delete_for_all(first.id).unwrap();
    assert!(wiped.deleted_for_all);
    assert_eq!(wiped.body, "This message was deleted");

    let for_bruno = m.threads().summary(thread.id, 2).unwrap();
    assert_eq!(for_bruno.last_message_text, HIDDEN_PLACEHOLDER);
    assert_eq!(for_bruno.qtd_messages, 0);
    assert_eq!(m.threads().summary(thread.id, 1).unwrap().qtd_messages, 1);
}

#[test]
fn display_time_includes_date_for_older_messages() {
    let (m, clock) = setup();
    clock.set(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    let thread = m.threads().create("yesterday", None, &[1, 2]).unwrap();
    let msg = post(&m, thread.id, 1, "old news");

    assert_eq!(m.messages().timestamp_display(&msg), "10:00");

    clock.set(Utc.with_ymd_and_hms(2024, 5, 2, 15, 0, 0).unwrap());
    assert_eq!(m.threads().summary(thread.id, 2).unwrap().last_message_at, "01/05/2024 10:00");
    assert_eq!(m.messages().timestamp_display(&msg), "01/05/2024 10:00");
}

#[test]
fn groups_mark_thread_as_group() {
    let (m, _clock) = setup();
    let thread = m.threads().create("crew", None, &[1, 2, 3]).unwrap();
    assert!(!m.threads().is_group(thread.id).unwrap());

    let group = m.threads().create_group(thread.id, "Crew").unwrap();
    assert_eq!(group.thread_id, thread.id);
    assert!(m.threads().is_group(thread.id).unwrap());
    assert_eq!(m.threads().group(thread.id).unwrap().unwrap().name, "Crew");
    assert!(m.threads().summary(thread.id, 1).unwrap().is_group);

    assert!(matches!(
        m.threads().create_group(999, "nobody"),
        Err(DomainError::ThreadNotFound(999))
    ));
}

#[test]
fn threads_can_be_hidden_per_user() {
    let (m, _clock) = setup();
    let thread = m.threads().create("private", None, &[1, 2]).unwrap();

    m.threads().hide_for_user(thread.id, 2).unwrap();
    m.threads().hide_for_user(thread.id, 2).unwrap();
    assert!(m.threads().is_hidden_for(thread.id, 2).unwrap());
    assert!(!m.threads().is_hidden_for(thread.id, 1).unwrap());

    m.threads().unhide_for_user(thread.id, 2).unwrap();
    assert!(!m.threads().is_hidden_for(thread.id, 2).unwrap());
}

#[test]
fn hidden_threads_drop_out_of_the_users_listing() {
    let (m, _clock) = setup();
    let kept = m.threads().create("kept", None, &[1, 2]).unwrap();
    let hidden = m.threads().create("hidden", None, &[1, 2]).unwrap();

    m.threads().hide_for_user(hidden.id, 2).unwrap();

    let ids: Vec<ThreadId> = m
        .threads()
        .summaries_for_user(2)
        .unwrap()
        .into_iter()
        .map(|s| s.thread.id)
        .collect();
    assert_eq!(ids, vec![kept.id]);
    assert_eq!(sorted_ids(m.threads().visible_for_user(2).unwrap()), vec![kept.id]);
    assert_eq!(m.threads().summaries_for_user(1).unwrap().len(), 2);
    assert_eq!(sorted_ids(m.threads().for_user(2).unwrap()), vec![kept.id, hidden.id]);

    m.threads().unhide_for_user(hidden.id, 2).unwrap();
    assert_eq!(m.threads().summaries_for_user(2).unwrap().len(), 2);
}

#[test]
fn summary_serializes_flat() {
    let (m, _clock) = setup();
    let thread = m.threads().create("json", Some(7), &[1, 2]).unwrap();
    post(&m, thread.id, 2, "hello");

    let value = serde_json::to_value(m.threads().summary(thread.id, 1).unwrap()).unwrap();
    assert_eq!(value["subject"], "json");
    assert_eq!(value["company_id"], 7);
    assert_eq!(value["qtd_messages"], 1);
    assert_eq!(value["unread_messages"], 1);
    assert_eq!(value["participants_string"], "Bruno Costa");
    assert!(value.get("thread").is_none());
}

#[test]
fn summaries_for_user_cover_each_thread() {
    let (m, _clock) = setup();
    m.threads().create("a", None, &[1, 2]).unwrap();
    m.threads().create("b", None, &[1, 3]).unwrap();
    m.threads().create("c", None, &[2, 3]).unwrap();

    let summaries = m.threads().summaries_for_user(1).unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(matches!(m.threads().summary(999, 1), Err(DomainError::ThreadNotFound(999))));
}

// --- storage & configuration ---

#[test]
fn file_database_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("messenger.db");

    let thread_id = {
        let m = Messenger::open(&path, &config()).unwrap();
        let thread = m.threads().create("durable", None, &[1, 2]).unwrap();
        post(&m, thread.id, 1, "still here");
        thread.id
    };

    let m = Messenger::open(&path, &config()).unwrap();
    assert_eq!(m.threads().get(thread_id).unwrap().subject, "durable");
    assert_eq!(m.messages().thread_messages(thread_id, 2).unwrap()[0].body, "still here");
}

#[test]
fn custom_table_names_from_toml() {
    let config = MessengerConfig::from_toml_str(
        r#"
        [tables]
        threads = "chat_threads"
        messages = "chat_messages"
        participants = "chat_members"

        [users]
        table = "employees"
        name_columns = ["nickname"]

        [display]
        utc_offset_seconds = 0
        "#,
    )
    .unwrap();

    let m = Messenger::open_in_memory(&config).unwrap();
    m.database()
        .connection()
        .execute_batch(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, nickname TEXT);
             INSERT INTO employees (id, nickname) VALUES (1, 'ana'), (2, 'bru');",
        )
        .unwrap();

    let thread = m.threads().create("renamed", None, &[1, 2]).unwrap();
    post(&m, thread.id, 1, "hi");
    assert_eq!(m.threads().participants_string(thread.id, Some(1)).unwrap(), "bru");

    let rows: i64 = m
        .database()
        .connection()
        .query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn invalid_config_is_rejected_on_open() {
    let mut config = MessengerConfig::default();
    config.tables.messages = "messages--".to_string();
    assert!(matches!(Messenger::open_in_memory(&config), Err(DomainError::Config(_))));
}
