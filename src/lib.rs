//! Conversational agent orchestrator with human-in-the-loop tool approval
//!
//! A triage agent routes each message to a specialist, or answers directly.
//! Tool calls marked as gated suspend the turn until the caller approves or
//! rejects them. Premium turns are charged against the organization's credit
//! balance once they complete.

pub mod agent;
pub mod approval;
pub mod core;
pub mod credits;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod server;
pub mod session;
pub mod stream;
pub mod tools;

pub use crate::core::{Caller, OrchestratorConfig, OrchestratorError, OrchestratorResult};
pub use crate::orchestrator::{Orchestrator, TurnOutcome, TurnRequest};
