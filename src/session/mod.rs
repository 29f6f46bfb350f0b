//! Conversation sessions
//!
//! This module provides:
//! - `Session` / `Interaction` - Durable conversation records
//! - `SessionStore` - Storage trait with in-memory and file-backed stores
//! - `SessionLogWriter` - Resolves sessions and records a turn's messages
//!
//! Every session belongs to one organization. Interactions carry a sequence
//! number that increases strictly within their session.

pub mod memory;
pub mod storage;
pub mod store;
pub mod types;
pub mod writer;

pub use memory::InMemorySessionStore;
pub use storage::FileSessionStore;
pub use store::{SessionStore, SessionStoreError};
pub use types::{
    derive_title, Interaction, InteractionType, NewInteraction, NewSession, Session, SessionType,
};
pub use writer::{AssistantMetadata, SessionLogWriter};
