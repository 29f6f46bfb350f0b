//! Core types for the orchestrator
//!
//! This module provides the fundamental types used throughout the crate:
//! - `OrchestratorConfig` - Environment-driven configuration
//! - `Caller` - Identity a turn runs on behalf of
//! - `TurnState` / `TurnTracker` - Per-turn state machine
//! - `OrchestratorError` - Error taxonomy surfaced to callers

pub mod config;
pub mod context;
pub mod error;
pub mod state;

pub use config::{OrchestratorConfig, ProviderKind};
pub use context::Caller;
pub use error::{OrchestratorError, OrchestratorResult};
pub use state::{TurnState, TurnTracker};
