//! Queries seen from a user's side: their messages, participations and unread totals.

use crate::domain::entity::{Message, Participant, Thread, UserId};
use crate::domain::error::DomainError;
use crate::domain::repository::{MessageRepository, ParticipantRepository, ThreadRepository};

pub struct MessagableUseCase<T: ThreadRepository, M: MessageRepository, P: ParticipantRepository> {
    pub(crate) thread_repo: T,
    pub(crate) message_repo: M,
    pub(crate) participant_repo: P,
}

impl<T: ThreadRepository, M: MessageRepository, P: ParticipantRepository> MessagableUseCase<T, M, P> {
    pub fn new(thread_repo: T, message_repo: M, participant_repo: P) -> Self {
        Self {
            thread_repo,
            message_repo,
            participant_repo,
        }
    }

    pub fn messages(&self, user_id: UserId) -> Result<Vec<Message>, DomainError> {
        self.message_repo.find_by_user(user_id)
    }

    pub fn participations(&self, user_id: UserId) -> Result<Vec<Participant>, DomainError> {
        self.participant_repo.find_by_user(user_id)
    }

    /// Every thread the user was ever enrolled in, including ones they left.
    pub fn threads(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.participated_by(user_id)
    }

    pub fn threads_with_new_messages(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.thread_repo.for_user_with_new_messages(user_id)
    }

    pub fn new_threads_count(&self, user_id: UserId) -> Result<usize, DomainError> {
        Ok(self.threads_with_new_messages(user_id)?.len())
    }

    pub fn unread_messages(&self, user_id: UserId) -> Result<Vec<Message>, DomainError> {
        self.message_repo.unread_for_user(user_id)
    }

    pub fn unread_messages_count(&self, user_id: UserId) -> Result<usize, DomainError> {
        self.message_repo.count_unread_for_user(user_id)
    }
}
