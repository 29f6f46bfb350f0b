//! Agents and routing
//!
//! Agents hold no per-request state. All per-conversation state lives in the
//! session store.

pub mod instructions;
pub mod registry;

pub use registry::{AgentDescriptor, AgentKind, AgentRegistry, RouteDecision};
