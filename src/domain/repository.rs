use chrono::{DateTime, Utc};

use super::entity::{
    Group, Message, MessageId, NewMessage, NewThread, Participant, ParticipantId, Thread,
    ThreadId, UserId,
};
use super::error::DomainError;

pub trait ThreadRepository {
    fn create(&self, thread: &NewThread, now: &DateTime<Utc>) -> Result<Thread, DomainError>;
    fn find_by_id(&self, id: ThreadId) -> Result<Option<Thread>, DomainError>;
    fn list_latest(&self) -> Result<Vec<Thread>, DomainError>;
    fn find_by_subject(&self, pattern: &str) -> Result<Vec<Thread>, DomainError>;
    fn touch(&self, id: ThreadId, now: &DateTime<Utc>) -> Result<(), DomainError>;
    fn soft_delete(&self, id: ThreadId, now: &DateTime<Utc>) -> Result<(), DomainError>;

    fn for_user(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError>;
    /// `for_user` minus the threads the user has hidden.
    fn visible_for_user(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError>;
    fn for_user_with_new_messages(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError>;
    fn between(&self, user_ids: &[UserId]) -> Result<Vec<Thread>, DomainError>;
    fn participated_by(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError>;

    fn hide_for_user(&self, id: ThreadId, user_id: UserId) -> Result<(), DomainError>;
    fn unhide_for_user(&self, id: ThreadId, user_id: UserId) -> Result<(), DomainError>;
    fn is_hidden_for(&self, id: ThreadId, user_id: UserId) -> Result<bool, DomainError>;

    fn create_group(&self, id: ThreadId, name: &str, now: &DateTime<Utc>) -> Result<Group, DomainError>;
    fn find_group(&self, id: ThreadId) -> Result<Option<Group>, DomainError>;
}

pub trait MessageRepository {
    fn insert(&self, message: &NewMessage, now: &DateTime<Utc>) -> Result<Message, DomainError>;
    fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, DomainError>;
    fn find_with_trashed(&self, id: MessageId) -> Result<Option<Message>, DomainError>;
    /// Messages of a thread the viewer may see, oldest first.
    fn find_by_thread(&self, thread_id: ThreadId, viewer: UserId) -> Result<Vec<Message>, DomainError>;
    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Message>, DomainError>;
    /// Newest message that is neither deleted for everyone nor hidden by the viewer.
    fn latest_undeleted(&self, thread_id: ThreadId, viewer: UserId) -> Result<Option<Message>, DomainError>;
    fn oldest_with_trashed(&self, thread_id: ThreadId) -> Result<Option<Message>, DomainError>;
    fn first_message(&self, thread_id: ThreadId) -> Result<Option<Message>, DomainError>;
    fn replies_to(&self, parent_id: MessageId) -> Result<Vec<Message>, DomainError>;
    fn unread_for_user(&self, user_id: UserId) -> Result<Vec<Message>, DomainError>;
    fn count_unread_for_user(&self, user_id: UserId) -> Result<usize, DomainError>;

    fn update_body(&self, id: MessageId, body: &str, now: &DateTime<Utc>) -> Result<(), DomainError>;
    fn soft_delete(&self, id: MessageId, now: &DateTime<Utc>) -> Result<(), DomainError>;
    fn mark_deleted_for_all(&self, id: MessageId, body: &str, now: &DateTime<Utc>) -> Result<(), DomainError>;
    fn hide_for_user(&self, id: MessageId, user_id: UserId) -> Result<(), DomainError>;
    fn is_hidden_for(&self, id: MessageId, user_id: UserId) -> Result<bool, DomainError>;
}

pub trait ParticipantRepository {
    /// Active participant row, if any.
    fn find(&self, thread_id: ThreadId, user_id: UserId) -> Result<Option<Participant>, DomainError>;
    fn find_with_trashed(&self, thread_id: ThreadId, user_id: UserId) -> Result<Option<Participant>, DomainError>;
    fn find_by_thread(&self, thread_id: ThreadId) -> Result<Vec<Participant>, DomainError>;
    fn find_by_thread_except(&self, thread_id: ThreadId, user_id: UserId) -> Result<Vec<Participant>, DomainError>;
    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Participant>, DomainError>;
    fn exists(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool, DomainError>;

    fn insert(&self, thread_id: ThreadId, user_id: UserId, now: &DateTime<Utc>) -> Result<Participant, DomainError>;
    fn restore(&self, id: ParticipantId, now: &DateTime<Utc>) -> Result<(), DomainError>;
    fn restore_all(&self, thread_id: ThreadId, now: &DateTime<Utc>) -> Result<usize, DomainError>;
    fn soft_delete_users(&self, thread_id: ThreadId, user_ids: &[UserId], now: &DateTime<Utc>) -> Result<usize, DomainError>;
    fn set_moderator(&self, id: ParticipantId, moderator: bool, now: &DateTime<Utc>) -> Result<(), DomainError>;
    fn set_last_read(&self, id: ParticipantId, at: &DateTime<Utc>) -> Result<(), DomainError>;

    /// User ids of every participant row, soft-deleted ones included.
    fn user_ids_with_trashed(&self, thread_id: ThreadId) -> Result<Vec<UserId>, DomainError>;
    /// Display names of the thread's participants, joined against the host's users table.
    fn display_names(&self, thread_id: ThreadId, exclude: Option<UserId>) -> Result<Vec<String>, DomainError>;
    fn user_ids_except(&self, thread_id: ThreadId, exclude: Option<UserId>) -> Result<Vec<UserId>, DomainError>;
}
