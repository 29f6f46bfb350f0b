//! Caller identity attached to every turn

use serde::{Deserialize, Serialize};

use super::error::{OrchestratorError, OrchestratorResult};

/// The authenticated user and organization behind a request
///
/// Sessions, pending approvals and credits are all scoped to the
/// organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: String,
    pub organization_id: String,
}

impl Caller {
    /// Create a caller
    pub fn new(user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: organization_id.into(),
        }
    }

    /// Reject callers with a blank user or organization
    pub fn ensure_identified(&self) -> OrchestratorResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(OrchestratorError::Authentication("missing user id".into()));
        }
        if self.organization_id.trim().is_empty() {
            return Err(OrchestratorError::Authentication(
                "missing organization id".into(),
            ));
        }
        Ok(())
    }
}
