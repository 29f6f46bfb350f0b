//! Capability provider trait
//!
//! Abstracts the reasoning/generation backend so that the HTTP client and the
//! scripted provider can be used interchangeably by the orchestrator.

use anyhow::Result;
use futures::stream::Stream;
use std::pin::Pin;

use super::types::{Prompt, ProviderEvent};
use crate::agent::AgentDescriptor;

/// Stream of provider events for one run
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>;

/// Trait for capability providers.
///
/// A run is single-pass: the returned stream cannot be replayed, and dropping
/// it releases the underlying connection.
#[async_trait::async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Start a streaming run of `agent` on `prompt`.
    async fn run(&self, agent: &AgentDescriptor, prompt: &Prompt) -> Result<EventStream>;

    /// Get the provider name (e.g., "http", "scripted").
    fn provider_name(&self) -> &str;
}
