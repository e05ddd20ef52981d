use crate::domain::clock::Clock;
use crate::domain::display;
use crate::domain::entity::{Message, MessageId, NewMessage, Participant, ThreadId, UserId};
use crate::domain::error::DomainError;
use crate::domain::repository::{MessageRepository, ParticipantRepository, ThreadRepository};
use crate::infra::config::DisplayConfig;

pub struct MessageUseCase<'a, M: MessageRepository, T: ThreadRepository, P: ParticipantRepository> {
    pub(crate) repo: M,
    pub(crate) thread_repo: T,
    pub(crate) participant_repo: P,
    clock: &'a dyn Clock,
    display: &'a DisplayConfig,
}

impl<'a, M: MessageRepository, T: ThreadRepository, P: ParticipantRepository> MessageUseCase<'a, M, T, P> {
    pub fn new(
        repo: M,
        thread_repo: T,
        participant_repo: P,
        clock: &'a dyn Clock,
        display: &'a DisplayConfig,
    ) -> Self {
        Self {
            repo,
            thread_repo,
            participant_repo,
            clock,
            display,
        }
    }

    /// Stores the message and bumps the thread's `updated_at`.
    pub fn post(&self, message: &NewMessage) -> Result<Message, DomainError> {
        if self.thread_repo.find_by_id(message.thread_id)?.is_none() {
            return Err(DomainError::ThreadNotFound(message.thread_id));
        }

        if let Some(parent_id) = message.parent_id {
            let parent = self
                .repo
                .find_with_trashed(parent_id)?
                .ok_or(DomainError::MessageNotFound(parent_id))?;
            if parent.thread_id != message.thread_id {
                return Err(DomainError::InvalidInput(format!(
                    "message {} belongs to another thread",
                    parent_id
                )));
            }
        }

        let now = self.clock.now();
        let msg = self.repo.insert(message, &now)?;
        self.thread_repo.touch(msg.thread_id, &now)?;
        tracing::debug!(message_id = msg.id, thread_id = msg.thread_id, "message posted");
        Ok(msg)
    }

    pub fn reply(&self, parent_id: MessageId, author: UserId, body: &str) -> Result<Message, DomainError> {
        let parent = self.get(parent_id)?;
        self.post(&NewMessage {
            parent_id: Some(parent.id),
            ..NewMessage::text(parent.thread_id, author, body)
        })
    }

    pub fn find(&self, id: MessageId) -> Result<Option<Message>, DomainError> {
        self.repo.find_by_id(id)
    }

    pub fn get(&self, id: MessageId) -> Result<Message, DomainError> {
        self.repo.find_by_id(id)?.ok_or(DomainError::MessageNotFound(id))
    }

    /// The message this one replies to, even if that one was deleted since.
    pub fn parent(&self, id: MessageId) -> Result<Option<Message>, DomainError> {
        let message = self.get(id)?;
        match message.parent_id {
            Some(parent_id) => self.repo.find_with_trashed(parent_id),
            None => Ok(None),
        }
    }

    pub fn replies(&self, id: MessageId) -> Result<Vec<Message>, DomainError> {
        self.repo.replies_to(id)
    }

    pub fn thread_messages(&self, thread_id: ThreadId, viewer: UserId) -> Result<Vec<Message>, DomainError> {
        self.repo.find_by_thread(thread_id, viewer)
    }

    pub fn first_message(&self, thread_id: ThreadId) -> Result<Option<Message>, DomainError> {
        self.repo.first_message(thread_id)
    }

    /// Everyone in the thread except the author.
    pub fn recipients(&self, id: MessageId) -> Result<Vec<Participant>, DomainError> {
        let message = self.get(id)?;
        self.participant_repo
            .find_by_thread_except(message.thread_id, message.user_id)
    }

    pub fn edit(&self, id: MessageId, body: &str) -> Result<Message, DomainError> {
        let message = self.get(id)?;
        let now = self.clock.now();
        self.repo.update_body(id, body, &now)?;
        self.thread_repo.touch(message.thread_id, &now)?;
        self.get(id)
    }

    pub fn delete(&self, id: MessageId) -> Result<(), DomainError> {
        let message = self.get(id)?;
        let now = self.clock.now();
        self.repo.soft_delete(id, &now)?;
        self.thread_repo.touch(message.thread_id, &now)?;
        tracing::info!(message_id = id, thread_id = message.thread_id, "message deleted");
        Ok(())
    }

    /// Hides the message from `user_id` only.
    pub fn delete_for_user(&self, id: MessageId, user_id: UserId) -> Result<(), DomainError> {
        self.get(id)?;
        self.repo.hide_for_user(id, user_id)
    }

    /// Replaces the body with the deletion sentinel for every participant.
    pub fn delete_for_all(&self, id: MessageId) -> Result<Message, DomainError> {
        let message = self.get(id)?;
        let now = self.clock.now();
        self.repo
            .mark_deleted_for_all(id, &self.display.deleted_message_body, &now)?;
        self.thread_repo.touch(message.thread_id, &now)?;
        tracing::info!(message_id = id, thread_id = message.thread_id, "message deleted for all");
        self.get(id)
    }

    pub fn is_hidden_for(&self, id: MessageId, user_id: UserId) -> Result<bool, DomainError> {
        self.repo.is_hidden_for(id, user_id)
    }

    pub fn timestamp_display(&self, message: &Message) -> String {
        let offset = display::resolve_offset(self.display.utc_offset_seconds);
        display::display_time(&message.created_at, &self.clock.now(), &offset)
    }
}
