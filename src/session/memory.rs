//! In-memory session store

use chrono::Utc;
use dashmap::DashMap;

use super::store::{SessionStore, SessionStoreError};
use super::types::{Interaction, NewInteraction, NewSession, Session};

#[derive(Debug)]
struct SessionRecord {
    session: Session,
    interactions: Vec<Interaction>,
}

/// Session store backed by a `DashMap`
///
/// Appends hold the session's shard lock while reading the last sequence and
/// pushing the new interaction.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, SessionStoreError> {
        let session = new.into_session();
        self.sessions.insert(
            session.id.clone(),
            SessionRecord {
                session: session.clone(),
                interactions: Vec::new(),
            },
        );
        tracing::debug!("[InMemorySessionStore] Created session {}", session.id);
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.sessions.get(session_id).map(|r| r.session.clone()))
    }

    async fn append_interaction(
        &self,
        new: NewInteraction,
    ) -> Result<Interaction, SessionStoreError> {
        let mut record = self
            .sessions
            .get_mut(&new.session_id)
            .ok_or_else(|| SessionStoreError::NotFound(new.session_id.clone()))?;

        let sequence = record.interactions.last().map(|i| i.sequence + 1).unwrap_or(1);
        let interaction = new.into_interaction(sequence);
        record.interactions.push(interaction.clone());
        record.session.updated_at = Utc::now();
        Ok(interaction)
    }

    async fn highest_sequence(&self, session_id: &str) -> Result<Option<i64>, SessionStoreError> {
        let record = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;
        Ok(record.interactions.last().map(|i| i.sequence))
    }

    async fn list_interactions(
        &self,
        session_id: &str,
    ) -> Result<Vec<Interaction>, SessionStoreError> {
        let record = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;
        Ok(record.interactions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequences_start_at_one() {
        let store = InMemorySessionStore::new();
        let session = store
            .create_session(NewSession::conversational("org_1", "user_1", "hi"))
            .await
            .unwrap();
        assert_eq!(store.highest_sequence(&session.id).await.unwrap(), None);

        let first = store
            .append_interaction(NewInteraction::user(&session.id, "hi"))
            .await
            .unwrap();
        let second = store
            .append_interaction(NewInteraction::user(&session.id, "again"))
            .await
            .unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(store.highest_sequence(&session.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_append_to_missing_session() {
        let store = InMemorySessionStore::new();
        let err = store
            .append_interaction(NewInteraction::user("nope", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_get_distinct_sequences() {
        let store = Arc::new(InMemorySessionStore::new());
        let session = store
            .create_session(NewSession::conversational("org_1", "user_1", "hi"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_interaction(NewInteraction::user(id, format!("m{}", i)))
                    .await
                    .unwrap()
                    .sequence
            }));
        }

        let mut sequences = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap());
        }
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=32).collect::<Vec<i64>>());
    }
}
