//! Turn orchestration
//!
//! `Orchestrator::handle_message` is the single entry point. It owns no
//! per-conversation state and is shared across requests behind an `Arc`.

pub mod engine;
pub mod turn;

pub use engine::{Orchestrator, FALLBACK_MESSAGE, TIMEOUT_MESSAGE};
pub use turn::{CompletedTurn, FailureKind, TurnOutcome, TurnRequest, TurnUsage};
