//! Human-in-the-loop approval
//!
//! This module provides:
//! - `ApprovalRequest` / `PendingApproval` - What the caller is asked to confirm
//! - `PendingStore` - Suspended turns awaiting decisions
//! - `ApprovalGateway` - Classification, suspension and resumption

pub mod gateway;
pub mod pending;
pub mod request;

pub use gateway::{ApprovalGateway, SuspendContext, ToolCallClass};
pub use pending::{InMemoryPendingStore, PendingContext, PendingStore, PendingStoreError};
pub use request::{ApprovalRequest, ApprovalStatus, PendingApproval, ResolvedTurn};
