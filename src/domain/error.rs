use thiserror::Error;

use super::entity::{MessageId, ThreadId};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("database error: {0}")]
    Database(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(e: toml::de::Error) -> Self {
        DomainError::Config(e.to_string())
    }
}
