//! Tool declarations for agents
//!
//! This module provides:
//! - `ToolSpec` - Declaration of a tool and whether it is approval-gated
//! - `ToolRegistry` - Registry of every declarable tool

mod registry;
mod tool;

pub use registry::{ToolRegistry, CREDIT_BALANCE_TOOL, SESSION_HISTORY_TOOL, WEB_SEARCH_TOOL};
pub use tool::ToolSpec;
