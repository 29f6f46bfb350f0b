//! Pending approval storage
//!
//! A suspended turn is keyed by session id. Taking it is atomic, so two
//! concurrent resumes for the same session cannot both proceed, and every
//! request id it carried is recorded as resolved before the entry lock is
//! released.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::request::ApprovalRequest;
use crate::agent::AgentKind;
use crate::core::OrchestratorError;
use crate::llm::HistoryMessage;

/// How long resolved request ids are remembered
const RESOLVED_RETENTION_HOURS: i64 = 24;

/// Everything needed to resume a suspended turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingContext {
    /// Session id plus the sorted request ids
    pub correlation_id: String,
    pub session_id: String,
    pub organization_id: String,
    pub user_id: String,
    /// The user message that started the turn
    pub message: String,
    /// Bounded history the turn was started with
    pub history: Vec<HistoryMessage>,
    /// Agent that raised the requests
    pub agent: AgentKind,
    pub requests: Vec<ApprovalRequest>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingContext {
    /// Correlation id for a session and its outstanding requests
    pub fn correlation_id(session_id: &str, requests: &[ApprovalRequest]) -> String {
        let mut ids: Vec<&str> = requests.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        format!("{}:{}", session_id, ids.join(","))
    }

    /// Ids of every outstanding request
    pub fn request_ids(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.id.as_str()).collect()
    }

    /// Whether the TTL has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Pending store errors
#[derive(Error, Debug, PartialEq)]
pub enum PendingStoreError {
    #[error("No pending approval for session: {0}")]
    NotFound(String),

    #[error("Approval request expired for session: {0}")]
    Expired(String),

    #[error("Approval already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Missing approval decisions for: {}", .0.join(", "))]
    Partial(Vec<String>),

    #[error("Unknown approval request ids: {}", .0.join(", "))]
    Unknown(Vec<String>),
}

impl From<PendingStoreError> for OrchestratorError {
    fn from(err: PendingStoreError) -> Self {
        match err {
            PendingStoreError::NotFound(session) => OrchestratorError::PendingNotFound(session),
            PendingStoreError::Expired(session) => OrchestratorError::ApprovalExpired(session),
            PendingStoreError::AlreadyResolved(id) => {
                OrchestratorError::ApprovalAlreadyResolved(id)
            }
            PendingStoreError::Partial(missing) => OrchestratorError::PartialApproval { missing },
            err @ PendingStoreError::Unknown(_) => OrchestratorError::validation(err.to_string()),
        }
    }
}

/// Storage for suspended turns
#[async_trait::async_trait]
pub trait PendingStore: Send + Sync {
    /// Store a suspended turn, replacing any older one for the same session
    async fn save(&self, context: PendingContext) -> Result<(), PendingStoreError>;

    /// Atomically remove and return the suspended turn for `session_id`
    ///
    /// Succeeds only when `decided` covers exactly the outstanding request
    /// ids. On any error the stored turn is left in place, except when it
    /// has expired.
    async fn take(
        &self,
        session_id: &str,
        organization_id: &str,
        decided: &HashSet<String>,
    ) -> Result<PendingContext, PendingStoreError>;
}

/// In-memory pending store
#[derive(Debug, Default)]
pub struct InMemoryPendingStore {
    pending: DashMap<String, PendingContext>,
    resolved: DashMap<String, DateTime<Utc>>,
}

impl InMemoryPendingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of suspended turns
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no turn is suspended
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop expired turns and stale resolved ids
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.pending.retain(|_, ctx| !ctx.is_expired(now));
        let horizon = now - Duration::hours(RESOLVED_RETENTION_HOURS);
        self.resolved.retain(|_, at| *at > horizon);
    }

    fn first_resolved(&self, decided: &HashSet<String>) -> Option<String> {
        decided
            .iter()
            .find(|id| self.resolved.contains_key(id.as_str()))
            .cloned()
    }
}

#[async_trait::async_trait]
impl PendingStore for InMemoryPendingStore {
    async fn save(&self, context: PendingContext) -> Result<(), PendingStoreError> {
        self.purge_expired();
        if let Some(previous) = self.pending.insert(context.session_id.clone(), context) {
            tracing::info!(
                "[PendingStore] Replaced unresolved turn {} for session {}",
                previous.correlation_id,
                previous.session_id
            );
        }
        Ok(())
    }

    async fn take(
        &self,
        session_id: &str,
        organization_id: &str,
        decided: &HashSet<String>,
    ) -> Result<PendingContext, PendingStoreError> {
        if let Some(id) = self.first_resolved(decided) {
            return Err(PendingStoreError::AlreadyResolved(id));
        }

        let entry = match self.pending.entry(session_id.to_string()) {
            Entry::Occupied(entry) => entry,
            // A concurrent take may have won between the check above and here
            Entry::Vacant(_) => {
                return Err(match self.first_resolved(decided) {
                    Some(id) => PendingStoreError::AlreadyResolved(id),
                    None => PendingStoreError::NotFound(session_id.to_string()),
                })
            }
        };

        if entry.get().organization_id != organization_id {
            return Err(PendingStoreError::NotFound(session_id.to_string()));
        }
        if entry.get().is_expired(Utc::now()) {
            entry.remove();
            return Err(PendingStoreError::Expired(session_id.to_string()));
        }

        let outstanding: HashSet<&str> = entry.get().request_ids().into_iter().collect();
        let mut unknown: Vec<String> = decided
            .iter()
            .filter(|id| !outstanding.contains(id.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(PendingStoreError::Unknown(unknown));
        }

        let missing: Vec<String> = entry
            .get()
            .request_ids()
            .into_iter()
            .filter(|id| !decided.contains(*id))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PendingStoreError::Partial(missing));
        }

        let now = Utc::now();
        for id in entry.get().request_ids() {
            self.resolved.insert(id.to_string(), now);
        }
        let context = entry.remove();
        tracing::info!(
            "[PendingStore] Resolved turn {} for session {}",
            context.correlation_id,
            session_id
        );
        Ok(context)
    }
}

/// Decision map keys as a set
pub fn decided_ids(decisions: &HashMap<String, bool>) -> HashSet<String> {
    decisions.keys().cloned().collect()
}
