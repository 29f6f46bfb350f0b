//! Turn request and outcome types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::approval::PendingApproval;
use crate::llm::HistoryMessage;

/// One call to the orchestrator
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// User message; may be empty when resubmitting approvals
    pub message: String,
    /// Existing session to continue
    pub session_id: Option<String>,
    /// Prior turns supplied by the caller
    pub history: Vec<HistoryMessage>,
    /// Premium turn: triage with tools and handoffs
    pub agent_mode: bool,
    /// Decisions keyed by approval request id
    pub approvals: HashMap<String, bool>,
}

impl TurnRequest {
    /// A basic turn with `message`
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Resubmission with decisions for a suspended turn
    pub fn resume(session_id: impl Into<String>, approvals: HashMap<String, bool>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            agent_mode: true,
            approvals,
            ..Default::default()
        }
    }

    /// Continue `session_id`
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach caller-supplied history
    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    /// Run as a premium turn
    pub fn agent_mode(mut self) -> Self {
        self.agent_mode = true;
        self
    }

    /// Whether this call resumes a suspended turn
    pub fn is_resume(&self) -> bool {
        !self.approvals.is_empty()
    }
}

/// Usage summary for a completed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnUsage {
    /// Agent that produced the answer
    pub active_agent: String,
    pub tools_used: Vec<String>,
    pub credits_used: i64,
}

/// Which provider failure degraded a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Provider,
    Timeout,
}

/// A turn that produced an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTurn {
    pub message: String,
    pub session_id: String,
    pub usage: TurnUsage,
    /// The answer could not be written to the session log
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unlogged: bool,
    /// Set when the answer is a fallback for a provider failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl CompletedTurn {
    /// Whether this is a fallback answer
    pub fn is_degraded(&self) -> bool {
        self.error_kind.is_some()
    }
}

/// What a call to the orchestrator produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnOutcome {
    PendingApproval(PendingApproval),
    Completed(CompletedTurn),
}

impl TurnOutcome {
    /// Session the turn ran in
    pub fn session_id(&self) -> &str {
        match self {
            TurnOutcome::PendingApproval(p) => &p.session_id,
            TurnOutcome::Completed(c) => &c.session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_wire_shape() {
        let outcome = TurnOutcome::Completed(CompletedTurn {
            message: "Hello".into(),
            session_id: "s1".into(),
            usage: TurnUsage {
                active_agent: "triage_agent".into(),
                tools_used: Vec::new(),
                credits_used: 0,
            },
            unlogged: false,
            error_kind: None,
        });

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["message"], "Hello");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["usage"]["activeAgent"], "triage_agent");
        assert_eq!(value["usage"]["creditsUsed"], 0);
        assert!(value.get("unlogged").is_none());
        assert!(value.get("errorKind").is_none());
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_degraded_wire_shape() {
        let turn = CompletedTurn {
            message: "Sorry".into(),
            session_id: "s1".into(),
            usage: TurnUsage {
                active_agent: "triage_agent".into(),
                tools_used: Vec::new(),
                credits_used: 0,
            },
            unlogged: true,
            error_kind: Some(FailureKind::Timeout),
        };
        assert!(turn.is_degraded());

        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["errorKind"], "timeout");
        assert_eq!(value["unlogged"], true);
    }

    #[test]
    fn test_request_builders() {
        let request = TurnRequest::new("hi").agent_mode().with_session("s1");
        assert!(request.agent_mode);
        assert!(!request.is_resume());

        let resume = TurnRequest::resume("s1", [("a".to_string(), true)].into_iter().collect());
        assert!(resume.is_resume());
        assert_eq!(resume.session_id.as_deref(), Some("s1"));
    }
}
