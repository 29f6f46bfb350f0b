//! Session store trait

use thiserror::Error;

use super::types::{Interaction, NewInteraction, NewSession, Session};

/// Session store errors
#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid session id: {0:?}")]
    InvalidId(String),
}

/// Durable record of sessions and their interactions
///
/// `append_interaction` assigns the next sequence number atomically per
/// session, so concurrent appends never share a sequence.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session
    async fn create_session(&self, new: NewSession) -> Result<Session, SessionStoreError>;

    /// Fetch a session by id
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError>;

    /// Append an interaction at the next sequence number
    async fn append_interaction(
        &self,
        new: NewInteraction,
    ) -> Result<Interaction, SessionStoreError>;

    /// Highest sequence number used in the session
    async fn highest_sequence(&self, session_id: &str) -> Result<Option<i64>, SessionStoreError>;

    /// Every interaction in sequence order
    async fn list_interactions(
        &self,
        session_id: &str,
    ) -> Result<Vec<Interaction>, SessionStoreError>;
}
