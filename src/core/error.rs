//! Orchestrator error types

use axum::http::StatusCode;
use thiserror::Error;

use crate::credits::LedgerError;
use crate::session::SessionStoreError;

/// Errors that can end a conversation turn
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Empty message, malformed approval map, unknown request id
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No identified user or organization
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// Organization balance is not positive
    #[error("Insufficient credits for organization {organization_id}")]
    InsufficientCredits {
        /// Organization that was refused
        organization_id: String,
    },

    /// Capability provider failed while producing output
    #[error("Provider error: {0}")]
    Provider(String),

    /// Capability provider did not finish its stream in time
    #[error("Provider timed out after {0} seconds")]
    ProviderTimeout(u64),

    /// Session store or ledger failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Resume was called without a decision for every outstanding request
    #[error("Missing approval decisions for: {}", missing.join(", "))]
    PartialApproval {
        /// Request ids that still need a decision
        missing: Vec<String>,
    },

    /// Session id does not exist for this organization
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No suspended turn for this session
    #[error("No pending approval for session: {0}")]
    PendingNotFound(String),

    /// Request id was already approved or rejected
    #[error("Approval already resolved: {0}")]
    ApprovalAlreadyResolved(String),

    /// Suspended turn outlived its TTL
    #[error("Approval request expired for session: {0}")]
    ApprovalExpired(String),
}

impl OrchestratorError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        OrchestratorError::Validation(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        OrchestratorError::Provider(msg.into())
    }

    /// HTTP status for this error on the conversation endpoint
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrchestratorError::Validation(_) | OrchestratorError::PartialApproval { .. } => {
                StatusCode::BAD_REQUEST
            }
            OrchestratorError::Authentication(_) => StatusCode::UNAUTHORIZED,
            OrchestratorError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            OrchestratorError::SessionNotFound(_) | OrchestratorError::PendingNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            OrchestratorError::ApprovalAlreadyResolved(_) => StatusCode::CONFLICT,
            OrchestratorError::ApprovalExpired(_) => StatusCode::GONE,
            OrchestratorError::Provider(_)
            | OrchestratorError::ProviderTimeout(_)
            | OrchestratorError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error came from the capability provider
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Provider(_) | OrchestratorError::ProviderTimeout(_)
        )
    }
}

impl From<SessionStoreError> for OrchestratorError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::InvalidId(_) => OrchestratorError::Validation(err.to_string()),
            other => OrchestratorError::Persistence(other.to_string()),
        }
    }
}

impl From<LedgerError> for OrchestratorError {
    fn from(err: LedgerError) -> Self {
        OrchestratorError::Persistence(err.to_string())
    }
}

/// Result type alias for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
