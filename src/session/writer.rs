//! Session log writer
//!
//! Resolves the session a turn belongs to and writes its user and assistant
//! interactions.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::store::{SessionStore, SessionStoreError};
use super::types::{Interaction, NewInteraction, NewSession, Session};
use crate::core::{Caller, OrchestratorError, OrchestratorResult};

/// Metadata recorded with an assistant interaction
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMetadata {
    /// Agent that produced the answer
    pub agent: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub approval_rejected: bool,
    /// The turn completed but the charge was refused
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unbilled: bool,
}

impl AssistantMetadata {
    fn into_map(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Writes a conversation's interactions to the session store
#[derive(Clone)]
pub struct SessionLogWriter {
    store: Arc<dyn SessionStore>,
}

impl SessionLogWriter {
    /// Create a writer over `store`
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Load the caller's session, or create one titled after `first_message`
    ///
    /// A session owned by another organization is reported as not found.
    pub async fn resolve_session(
        &self,
        caller: &Caller,
        session_id: Option<&str>,
        first_message: &str,
        web_search_enabled: bool,
    ) -> OrchestratorResult<Session> {
        if let Some(id) = session_id {
            return self.owned_session(caller, id).await;
        }

        let new = NewSession::conversational(&caller.organization_id, &caller.user_id, first_message)
            .with_metadata("webSearchEnabled", Value::Bool(web_search_enabled));
        let session = self.store.create_session(new).await?;
        tracing::info!(
            "[SessionLog] Created session {} for organization {}",
            session.id,
            caller.organization_id
        );
        Ok(session)
    }

    /// Load a session the caller's organization owns
    pub async fn owned_session(&self, caller: &Caller, session_id: &str) -> OrchestratorResult<Session> {
        match self.store.get_session(session_id).await? {
            Some(session) if session.organization_id == caller.organization_id => Ok(session),
            Some(_) => {
                tracing::warn!(
                    "[SessionLog] Organization {} asked for session {} it does not own",
                    caller.organization_id,
                    session_id
                );
                Err(OrchestratorError::SessionNotFound(session_id.to_string()))
            }
            None => Err(OrchestratorError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Record the user's message
    pub async fn record_user_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> OrchestratorResult<Interaction> {
        let interaction = self
            .store
            .append_interaction(NewInteraction::user(session_id, content))
            .await?;
        tracing::debug!(
            "[SessionLog] Recorded user message {} in session {}",
            interaction.sequence,
            session_id
        );
        Ok(interaction)
    }

    /// Record the assistant's answer
    pub async fn record_assistant_message(
        &self,
        session_id: &str,
        content: &str,
        metadata: AssistantMetadata,
        cost_credits: i64,
    ) -> Result<Interaction, SessionStoreError> {
        self.store
            .append_interaction(NewInteraction::assistant(
                session_id,
                content,
                metadata.into_map(),
                cost_credits,
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FileSessionStore, InMemorySessionStore, InteractionType};

    fn writer() -> SessionLogWriter {
        SessionLogWriter::new(Arc::new(InMemorySessionStore::new()))
    }

    #[tokio::test]
    async fn test_resolve_creates_then_reuses() {
        let writer = writer();
        let caller = Caller::new("user_1", "org_1");

        let created = writer
            .resolve_session(&caller, None, "What is new in Rust?", true)
            .await
            .unwrap();
        assert_eq!(created.title, "What is new in Rust?");
        assert_eq!(created.metadata["webSearchEnabled"], true);

        let again = writer
            .resolve_session(&caller, Some(&created.id), "ignored", true)
            .await
            .unwrap();
        assert_eq!(again.id, created.id);
    }

    #[tokio::test]
    async fn test_other_organization_cannot_see_session() {
        let writer = writer();
        let owner = Caller::new("user_1", "org_1");
        let session = writer.resolve_session(&owner, None, "hi", false).await.unwrap();

        let intruder = Caller::new("user_2", "org_2");
        let err = writer
            .resolve_session(&intruder, Some(&session.id), "hi", false)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_path_like_session_id_is_invalid() {
        let temp = tempfile::TempDir::new().unwrap();
        let writer = SessionLogWriter::new(Arc::new(FileSessionStore::with_dir(temp.path().join("sessions"))));
        let caller = Caller::new("user_1", "org_1");

        let err = writer
            .resolve_session(&caller, Some("../escaped"), "hi", false)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(!temp.path().join("escaped").exists());
    }

    #[tokio::test]
    async fn test_assistant_metadata() {
        let writer = writer();
        let caller = Caller::new("user_1", "org_1");
        let session = writer.resolve_session(&caller, None, "hi", true).await.unwrap();

        writer.record_user_message(&session.id, "hi").await.unwrap();
        let interaction = writer
            .record_assistant_message(
                &session.id,
                "hello",
                AssistantMetadata {
                    agent: "web_search_agent".into(),
                    tools_used: vec!["web_search".into()],
                    approval_rejected: false,
                    unbilled: false,
                },
                1,
            )
            .await
            .unwrap();

        assert_eq!(interaction.sequence, 2);
        assert_eq!(interaction.interaction_type, InteractionType::AssistantMessage);
        assert_eq!(interaction.metadata["agent"], "web_search_agent");
        assert_eq!(interaction.metadata["toolsUsed"][0], "web_search");
        assert!(!interaction.metadata.contains_key("approvalRejected"));
        assert!(!interaction.metadata.contains_key("unbilled"));
    }
}
