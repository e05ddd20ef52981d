//! Threaded messaging on SQLite: threads, messages, participants with
//! read-state tracking, soft deletion and per-user hiding.
//!
//! [`Messenger`] owns the database, the configuration and the clock, and
//! hands out use cases that borrow them for the length of a request.

pub mod domain;
pub mod infra;
pub mod usecase;

use std::path::Path;

pub use domain::clock::{Clock, ManualClock, SystemClock};
pub use domain::entity::{
    Group, Message, MessageId, NewMessage, NewThread, Participant, ParticipantId, Thread,
    ThreadId, ThreadSummary, UserId,
};
pub use domain::error::DomainError;
pub use infra::config::MessengerConfig;
pub use infra::sqlite::Database;

use infra::sqlite::{SqliteMessageRepository, SqliteParticipantRepository, SqliteThreadRepository};
use usecase::messagable::MessagableUseCase;
use usecase::message::MessageUseCase;
use usecase::thread::ThreadUseCase;

pub type SqliteThreadUseCase<'a> = ThreadUseCase<
    'a,
    SqliteThreadRepository<'a>,
    SqliteMessageRepository<'a>,
    SqliteParticipantRepository<'a>,
>;

pub type SqliteMessageUseCase<'a> = MessageUseCase<
    'a,
    SqliteMessageRepository<'a>,
    SqliteThreadRepository<'a>,
    SqliteParticipantRepository<'a>,
>;

pub type SqliteMessagableUseCase<'a> = MessagableUseCase<
    SqliteThreadRepository<'a>,
    SqliteMessageRepository<'a>,
    SqliteParticipantRepository<'a>,
>;

pub struct Messenger {
    db: Database,
    clock: Box<dyn Clock>,
}

impl Messenger {
    pub fn open(path: &Path, config: &MessengerConfig) -> Result<Self, DomainError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(Database::open(path, config)?))
    }

    pub fn open_in_memory(config: &MessengerConfig) -> Result<Self, DomainError> {
        Ok(Self::new(Database::open_in_memory(config)?))
    }

    pub fn new(db: Database) -> Self {
        Self {
            db,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn threads(&self) -> SqliteThreadUseCase<'_> {
        ThreadUseCase::new(
            self.db.threads(),
            self.db.messages(),
            self.db.participants(),
            self.clock.as_ref(),
            &self.db.config().display,
        )
    }

    pub fn messages(&self) -> SqliteMessageUseCase<'_> {
        MessageUseCase::new(
            self.db.messages(),
            self.db.threads(),
            self.db.participants(),
            self.clock.as_ref(),
            &self.db.config().display,
        )
    }

    /// Per-user aggregate queries.
    pub fn user(&self) -> SqliteMessagableUseCase<'_> {
        MessagableUseCase::new(self.db.threads(), self.db.messages(), self.db.participants())
    }
}
