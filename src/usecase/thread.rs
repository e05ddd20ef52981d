use crate::domain::clock::Clock;
use crate::domain::display;
use crate::domain::entity::{
    Group, Message, NewMessage, NewThread, Thread, ThreadId, ThreadSummary, UserId,
};
use crate::domain::error::DomainError;
use crate::domain::repository::{MessageRepository, ParticipantRepository, ThreadRepository};
use crate::infra::config::DisplayConfig;

pub struct ThreadUseCase<'a, T: ThreadRepository, M: MessageRepository, P: ParticipantRepository> {
    pub(crate) thread_repo: T,
    pub(crate) message_repo: M,
    pub(crate) participant_repo: P,
    clock: &'a dyn Clock,
    display: &'a DisplayConfig,
}

impl<'a, T: ThreadRepository, M: MessageRepository, P: ParticipantRepository> ThreadUseCase<'a, T, M, P> {
    pub fn new(
        thread_repo: T,
        message_repo: M,
        participant_repo: P,
        clock: &'a dyn Clock,
        display: &'a DisplayConfig,
    ) -> Self {
        Self {
            thread_repo,
            message_repo,
            participant_repo,
            clock,
            display,
        }
    }

    /// Creates a thread and enrols `participants` in it.
    pub fn create(
        &self,
        subject: &str,
        company_id: Option<i64>,
        participants: &[UserId],
    ) -> Result<Thread, DomainError> {
        let new = NewThread {
            subject: subject.to_string(),
            company_id,
            moderator: false,
        };
        let thread = self.thread_repo.create(&new, &self.clock.now())?;
        self.add_participants(thread.id, participants)?;
        tracing::info!(thread_id = thread.id, participants = participants.len(), "thread created");
        Ok(thread)
    }

    /// Starts a conversation: thread, author plus recipients as participants, and the opening message.
    pub fn create_with_message(
        &self,
        subject: &str,
        author: UserId,
        body: &str,
        recipients: &[UserId],
    ) -> Result<(Thread, Message), DomainError> {
        let mut members = vec![author];
        members.extend_from_slice(recipients);
        let thread = self.create(subject, None, &members)?;

        let now = self.clock.now();
        let message = self.message_repo.insert(
            &NewMessage {
                first_message: true,
                ..NewMessage::text(thread.id, author, body)
            },
            &now,
        )?;
        self.thread_repo.touch(thread.id, &now)?;
        self.mark_as_read(thread.id, author)?;

        let thread = self.get(thread.id)?;
        Ok((thread, message))
    }

    pub fn find(&self, id: ThreadId) -> Result<Option<Thread>, DomainError> {
        self.thread_repo.find_by_id(id)
    }

    pub fn get(&self, id: ThreadId) -> Result<Thread, DomainError> {
        self.thread_repo
            .find_by_id(id)?
            .ok_or(DomainError::ThreadNotFound(id))
    }

    /// All live threads, most recently updated first.
    pub fn latest(&self) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.list_latest()
    }

    /// Subject match using SQL `LIKE` wildcards.
    pub fn by_subject(&self, pattern: &str) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.find_by_subject(pattern)
    }

    pub fn delete(&self, id: ThreadId) -> Result<(), DomainError> {
        self.thread_repo.soft_delete(id, &self.clock.now())?;
        tracing::info!(thread_id = id, "thread deleted");
        Ok(())
    }

    // --- membership ---

    /// Idempotent: active rows are left alone and soft-deleted rows are restored.
    pub fn add_participants(&self, thread_id: ThreadId, user_ids: &[UserId]) -> Result<(), DomainError> {
        let now = self.clock.now();
        for &user_id in user_ids {
            match self.participant_repo.find_with_trashed(thread_id, user_id)? {
                Some(existing) if existing.is_active() => {
                    tracing::debug!(thread_id, user_id, "participant already active");
                }
                Some(existing) => {
                    self.participant_repo.restore(existing.id, &now)?;
                    tracing::debug!(thread_id, user_id, "participant restored");
                }
                None => {
                    self.participant_repo.insert(thread_id, user_id, &now)?;
                    tracing::debug!(thread_id, user_id, "participant added");
                }
            }
        }
        Ok(())
    }

    pub fn remove_participants(&self, thread_id: ThreadId, user_ids: &[UserId]) -> Result<usize, DomainError> {
        let removed = self
            .participant_repo
            .soft_delete_users(thread_id, user_ids, &self.clock.now())?;
        tracing::debug!(thread_id, removed, "participants removed");
        Ok(removed)
    }

    /// Returns how many of `user_ids` were active participants and got promoted.
    pub fn add_moderators(&self, thread_id: ThreadId, user_ids: &[UserId]) -> Result<usize, DomainError> {
        self.set_moderators(thread_id, user_ids, true)
    }

    pub fn remove_moderators(&self, thread_id: ThreadId, user_ids: &[UserId]) -> Result<usize, DomainError> {
        self.set_moderators(thread_id, user_ids, false)
    }

    fn set_moderators(&self, thread_id: ThreadId, user_ids: &[UserId], moderator: bool) -> Result<usize, DomainError> {
        let now = self.clock.now();
        let mut changed = 0;
        for &user_id in user_ids {
            match self.participant_repo.find(thread_id, user_id)? {
                Some(participant) => {
                    self.participant_repo.set_moderator(participant.id, moderator, &now)?;
                    changed += 1;
                }
                None => tracing::debug!(thread_id, user_id, "moderator change skipped: not a participant"),
            }
        }
        Ok(changed)
    }

    pub fn has_participant(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool, DomainError> {
        self.participant_repo.exists(thread_id, user_id)
    }

    /// Every user ever enrolled, removed ones included, plus `extra` when given.
    pub fn participants_user_ids(&self, thread_id: ThreadId, extra: Option<UserId>) -> Result<Vec<UserId>, DomainError> {
        let mut ids = self.participant_repo.user_ids_with_trashed(thread_id)?;
        ids.extend(extra);
        Ok(ids)
    }

    /// Brings back every removed participant, typically when a new message arrives.
    pub fn activate_all_participants(&self, thread_id: ThreadId) -> Result<usize, DomainError> {
        let restored = self.participant_repo.restore_all(thread_id, &self.clock.now())?;
        if restored > 0 {
            tracing::debug!(thread_id, restored, "participants reactivated");
        }
        Ok(restored)
    }

    pub fn participants_string(&self, thread_id: ThreadId, exclude: Option<UserId>) -> Result<String, DomainError> {
        Ok(self.participant_repo.display_names(thread_id, exclude)?.join(", "))
    }

    pub fn participants_id(&self, thread_id: ThreadId, exclude: Option<UserId>) -> Result<Vec<UserId>, DomainError> {
        self.participant_repo.user_ids_except(thread_id, exclude)
    }

    /// Author of the oldest message, deleted ones included; the viewer when the thread is empty.
    pub fn creator(&self, thread_id: ThreadId, viewer: UserId) -> Result<UserId, DomainError> {
        Ok(self
            .message_repo
            .oldest_with_trashed(thread_id)?
            .map_or(viewer, |m| m.user_id))
    }

    // --- read state ---

    /// Returns false when the user is not an active participant.
    pub fn mark_as_read(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool, DomainError> {
        let Some(participant) = self.participant_repo.find(thread_id, user_id)? else {
            tracing::debug!(thread_id, user_id, "mark as read skipped: not a participant");
            return Ok(false);
        };
        self.participant_repo.set_last_read(participant.id, &self.clock.now())?;
        Ok(true)
    }

    pub fn is_unread(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool, DomainError> {
        let Some(participant) = self.participant_repo.find(thread_id, user_id)? else {
            tracing::debug!(thread_id, user_id, "unread check skipped: not a participant");
            return Ok(false);
        };
        let Some(thread) = self.thread_repo.find_by_id(thread_id)? else {
            tracing::debug!(thread_id, "unread check skipped: thread missing or deleted");
            return Ok(false);
        };
        Ok(participant.has_unread_since(&thread.updated_at))
    }

    /// Messages from others the user has not seen yet, compared on `updated_at`.
    pub fn user_unread_messages(&self, thread_id: ThreadId, user_id: UserId) -> Result<Vec<Message>, DomainError> {
        let Some(participant) = self.participant_repo.find(thread_id, user_id)? else {
            tracing::debug!(thread_id, user_id, "unread messages skipped: not a participant");
            return Ok(Vec::new());
        };
        if self.thread_repo.find_by_id(thread_id)?.is_none() {
            tracing::debug!(thread_id, "unread messages skipped: thread missing or deleted");
            return Ok(Vec::new());
        }

        let messages = self.message_repo.find_by_thread(thread_id, user_id)?;
        Ok(messages
            .into_iter()
            .filter(|m| m.user_id != user_id)
            .filter(|m| participant.has_unread_since(&m.updated_at))
            .collect())
    }

    pub fn user_unread_messages_count(&self, thread_id: ThreadId, user_id: UserId) -> Result<usize, DomainError> {
        Ok(self.user_unread_messages(thread_id, user_id)?.len())
    }

    // --- scopes ---

    pub fn for_user(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.for_user(user_id)
    }

    /// Threads the user takes part in and has not hidden.
    pub fn visible_for_user(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.visible_for_user(user_id)
    }

    pub fn for_user_with_new_messages(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.for_user_with_new_messages(user_id)
    }

    /// Threads whose active participants are exactly `user_ids`.
    pub fn between(&self, user_ids: &[UserId]) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.between(user_ids)
    }

    // --- per-user hiding ---

    pub fn hide_for_user(&self, thread_id: ThreadId, user_id: UserId) -> Result<(), DomainError> {
        self.thread_repo.hide_for_user(thread_id, user_id)
    }

    pub fn unhide_for_user(&self, thread_id: ThreadId, user_id: UserId) -> Result<(), DomainError> {
        self.thread_repo.unhide_for_user(thread_id, user_id)
    }

    pub fn is_hidden_for(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool, DomainError> {
        self.thread_repo.is_hidden_for(thread_id, user_id)
    }

    // --- groups ---

    pub fn create_group(&self, thread_id: ThreadId, name: &str) -> Result<Group, DomainError> {
        self.get(thread_id)?;
        self.thread_repo.create_group(thread_id, name, &self.clock.now())
    }

    pub fn group(&self, thread_id: ThreadId) -> Result<Option<Group>, DomainError> {
        self.thread_repo.find_group(thread_id)
    }

    pub fn is_group(&self, thread_id: ThreadId) -> Result<bool, DomainError> {
        Ok(self.thread_repo.find_group(thread_id)?.is_some())
    }

    // --- derived fields ---

    pub fn summary(&self, thread_id: ThreadId, viewer: UserId) -> Result<ThreadSummary, DomainError> {
        let thread = self.get(thread_id)?;
        let last = self.message_repo.latest_undeleted(thread_id, viewer)?;
        let now = self.clock.now();
        let offset = display::resolve_offset(self.display.utc_offset_seconds);

        Ok(ThreadSummary {
            last_message_text: display::last_message_text(
                last.as_ref(),
                &self.display.deleted_message_body,
            ),
            last_message_timestamp: last.as_ref().map_or(thread.created_at, |m| m.created_at),
            last_message_at: last
                .as_ref()
                .map(|m| display::display_time(&m.created_at, &now, &offset))
                .unwrap_or_default(),
            unread_messages: self.user_unread_messages_count(thread_id, viewer)?,
            participants_string: self.participants_string(thread_id, Some(viewer))?,
            participants_id: self.participants_id(thread_id, Some(viewer))?,
            qtd_messages: u8::from(last.is_some()),
            is_group: self.is_group(thread_id)?,
            is_emoji: last.as_ref().is_some_and(|m| display::is_emoji_only(&m.body)),
            thread,
        })
    }

    /// Summaries of every thread the viewer participates in, newest first.
    pub fn summaries_for_user(&self, viewer: UserId) -> Result<Vec<ThreadSummary>, DomainError> {
        self.visible_for_user(viewer)?
            .into_iter()
            .map(|thread| self.summary(thread.id, viewer))
            .collect()
    }
}
