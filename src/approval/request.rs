//! Approval request types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::HistoryMessage;
use crate::tools::ToolSpec;

/// A gated tool call waiting for the caller's decision
///
/// Never persisted. Only the outcome ends up in interaction metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Caller-opaque unique id
    pub id: String,
    /// Name of the requested tool
    pub tool_name: String,
    /// Arguments the model wants to call the tool with
    pub arguments: Map<String, Value>,
    /// Agent that requested the call
    pub agent: String,
    /// Creation time (Unix milliseconds)
    pub timestamp: i64,
    /// Human-readable description of the call
    pub justification: String,
}

impl ApprovalRequest {
    /// Create a request for `tool` raised by `agent`
    pub fn new(tool: &ToolSpec, arguments: Map<String, Value>, agent: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool.name.clone(),
            justification: tool.justification(&arguments),
            arguments,
            agent: agent.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Marker serialized as `"pending_approval"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    PendingApproval,
}

/// Caller-facing payload for a suspended turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    /// Prompt asking the caller to confirm
    pub message: String,
    /// Always `pending_approval`
    pub status: ApprovalStatus,
    /// Requests that need a decision
    pub approval_requests: Vec<ApprovalRequest>,
    /// Session the turn belongs to
    pub session_id: String,
    /// History plus the new user turn, for client-side replay
    pub conversation_history: Vec<HistoryMessage>,
}

/// Outcome of a resumed turn
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTurn {
    /// Final answer text
    pub text: String,
    /// Agent that raised the approval requests
    pub agent: String,
    /// Tools that were approved and invoked
    pub tools_used: Vec<String>,
    /// Whether any request was rejected
    pub approval_rejected: bool,
}
