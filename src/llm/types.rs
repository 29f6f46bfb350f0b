//! Capability provider wire types
//!
//! The provider streams `ProviderEvent`s. Prompts carry the bounded
//! conversation history plus the new user input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Conversation history
// ============================================================================

/// Author of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One prior turn as supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Role of the message sender
    pub role: Role,
    /// Text content
    pub content: String,
}

impl HistoryMessage {
    /// Create a user history entry
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant history entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Keep only the most recent `limit` history entries
pub fn bound_history(history: &[HistoryMessage], limit: usize) -> Vec<HistoryMessage> {
    let start = history.len().saturating_sub(limit);
    history[start..].to_vec()
}

// ============================================================================
// Request
// ============================================================================

/// Input for one provider run
#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    /// The new user message
    pub input: String,

    /// Bounded prior turns
    pub history: Vec<HistoryMessage>,

    /// Session the run belongs to (for provider-side tracing)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Prompt {
    /// Create a prompt
    pub fn new(input: impl Into<String>, history: Vec<HistoryMessage>) -> Self {
        Self {
            input: input.into(),
            history,
            session_id: None,
        }
    }

    /// Attach the session id
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Event emitted by the capability provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// Incremental text output
    Text { content: String },

    /// The model wants to call a gated tool
    ToolApproval {
        name: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },

    /// The model delegates the message to another agent
    Handoff { agent: String },

    /// Stream complete
    End,
}

impl ProviderEvent {
    /// Create a text event
    pub fn text(content: impl Into<String>) -> Self {
        ProviderEvent::Text {
            content: content.into(),
        }
    }

    /// Create a tool approval event
    pub fn tool_approval(name: impl Into<String>, arguments: Value) -> Self {
        ProviderEvent::ToolApproval {
            name: name.into(),
            arguments: arguments.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Create a handoff event
    pub fn handoff(agent: impl Into<String>) -> Self {
        ProviderEvent::Handoff {
            agent: agent.into(),
        }
    }
}

/// Raw SSE payload, which may also carry a provider-side error
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawProviderEvent {
    /// Error reported inside the stream
    Error { error: String },
    /// Regular event
    Event(ProviderEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_deserialization() {
        let event: ProviderEvent =
            serde_json::from_str(r#"{"type": "text", "content": "Hello"}"#).unwrap();
        assert_eq!(event, ProviderEvent::text("Hello"));

        let event: ProviderEvent = serde_json::from_str(
            r#"{"type": "tool_approval", "name": "web_search", "arguments": {"query": "rust"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ProviderEvent::tool_approval("web_search", json!({"query": "rust"}))
        );

        let event: ProviderEvent = serde_json::from_str(r#"{"type": "end"}"#).unwrap();
        assert_eq!(event, ProviderEvent::End);
    }

    #[test]
    fn test_tool_approval_without_arguments() {
        let event: ProviderEvent =
            serde_json::from_str(r#"{"type": "tool_approval", "name": "web_search"}"#).unwrap();
        match event {
            ProviderEvent::ToolApproval { arguments, .. } => assert!(arguments.is_empty()),
            _ => panic!("Expected ToolApproval"),
        }
    }

    #[test]
    fn test_raw_event_error() {
        let raw: RawProviderEvent = serde_json::from_str(r#"{"error": "overloaded"}"#).unwrap();
        assert!(matches!(raw, RawProviderEvent::Error { error } if error == "overloaded"));

        let raw: RawProviderEvent = serde_json::from_str(r#"{"type": "end"}"#).unwrap();
        assert!(matches!(raw, RawProviderEvent::Event(ProviderEvent::End)));
    }

    #[test]
    fn test_history_roles() {
        let json = serde_json::to_string(&HistoryMessage::user("Hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));

        let msg: HistoryMessage =
            serde_json::from_str(r#"{"role": "system", "content": "be brief"}"#).unwrap();
        assert_eq!(msg.role, Role::System);
    }

    #[test]
    fn test_bound_history_keeps_most_recent() {
        let history: Vec<_> = (0..5).map(|i| HistoryMessage::user(i.to_string())).collect();
        let bounded = bound_history(&history, 2);
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].content, "3");
        assert_eq!(bounded[1].content, "4");
        assert_eq!(bound_history(&history, 10).len(), 5);
    }
}
