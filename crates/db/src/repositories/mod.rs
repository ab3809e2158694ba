use async_trait::async_trait;
use thiserror::Error;

use ratedesk_core::{ApplicationError, ChatMessage, NewMessage, Session, SessionId, SessionPatch};

pub mod memory;
pub mod session;

pub use memory::InMemorySessionStore;
pub use session::SqlSessionStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Keyed conversation state. Mutating methods create the session on first reference; `find`
/// never does.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(&self, id: &SessionId) -> Result<Session, RepositoryError>;

    /// Stamps a UUID and a timestamp no earlier than the session's previous message.
    async fn append_message(
        &self,
        id: &SessionId,
        message: NewMessage,
    ) -> Result<ChatMessage, RepositoryError>;

    /// Shallow top-level merge; returns the merged session.
    async fn patch(&self, id: &SessionId, patch: SessionPatch)
        -> Result<Session, RepositoryError>;

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
