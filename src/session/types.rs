//! Session and interaction records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest derived title before truncation
pub const TITLE_MAX_CHARS: usize = 60;

/// Kind of session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Conversational,
}

/// One conversation owned by an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub organization_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub starred: bool,
}

/// Fields supplied when creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub organization_id: String,
    pub user_id: String,
    pub title: String,
    pub metadata: Map<String, Value>,
}

impl NewSession {
    /// New conversational session titled after `first_message`
    pub fn conversational(
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
        first_message: &str,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: user_id.into(),
            title: derive_title(first_message),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Materialize into a session record
    pub fn into_session(self) -> Session {
        let now = Utc::now();
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: self.organization_id,
            user_id: self.user_id,
            title: self.title,
            session_type: SessionType::Conversational,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
            starred: false,
        }
    }
}

/// Kind of interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    UserMessage,
    AssistantMessage,
}

/// One logged message within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub session_id: String,
    /// Strictly increasing within the session, starting at 1
    pub sequence: i64,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub cost_credits: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending an interaction
///
/// The store assigns `id`, `sequence` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub session_id: String,
    pub interaction_type: InteractionType,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub cost_credits: i64,
}

impl NewInteraction {
    /// A user message
    pub fn user(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            interaction_type: InteractionType::UserMessage,
            content: content.into(),
            metadata: Map::new(),
            cost_credits: 0,
        }
    }

    /// An assistant message
    pub fn assistant(
        session_id: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
        cost_credits: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            interaction_type: InteractionType::AssistantMessage,
            content: content.into(),
            metadata,
            cost_credits,
        }
    }

    /// Materialize at `sequence`
    pub fn into_interaction(self, sequence: i64) -> Interaction {
        Interaction {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: self.session_id,
            sequence,
            interaction_type: self.interaction_type,
            content: self.content,
            metadata: self.metadata,
            cost_credits: self.cost_credits,
            created_at: Utc::now(),
        }
    }
}

/// Title for a session started with `message`
///
/// The first line, truncated to `TITLE_MAX_CHARS` characters with an
/// ellipsis when cut.
pub fn derive_title(message: &str) -> String {
    let line = message.trim().lines().next().unwrap_or_default().trim();
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", cut.trim_end())
}
