//! Scripted capability provider
//!
//! Replays pre-programmed event scripts per agent name. Used by tests and for
//! running the server without a real provider.
//!
//! # Example
//!
//! ```ignore
//! let provider = ScriptedProvider::new()
//!     .script("triage_agent", Script::events(vec![ProviderEvent::handoff("web_search_agent")]))
//!     .script("web_search_agent", Script::events(vec![
//!         ProviderEvent::tool_approval("web_search", json!({"query": "news"})),
//!         ProviderEvent::End,
//!     ]));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use futures::{stream, StreamExt};

use super::provider::{CapabilityProvider, EventStream};
use super::types::{Prompt, ProviderEvent};
use crate::agent::AgentDescriptor;

/// One scripted provider run
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit these events, then close the stream
    Events(Vec<ProviderEvent>),
    /// Emit these events, then fail mid-stream
    FailAfter(Vec<ProviderEvent>, String),
    /// Emit these events, then never finish
    Hang(Vec<ProviderEvent>),
    /// Refuse to start the run
    Refuse(String),
    /// Never return from `run`, like a provider that accepts the connection
    /// and never sends response headers
    Stall,
}

impl Script {
    /// Events followed by a normal close
    pub fn events(events: Vec<ProviderEvent>) -> Self {
        Script::Events(events)
    }

    /// A plain text answer followed by `End`
    pub fn reply(text: impl Into<String>) -> Self {
        Script::Events(vec![ProviderEvent::text(text), ProviderEvent::End])
    }
}

/// A recorded provider run
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    /// Name of the agent that was run
    pub agent: String,
    /// Names of the tools it declared
    pub tools: Vec<String>,
    /// Prompt input
    pub input: String,
}

/// Provider that replays scripts in order per agent name
///
/// The last script queued for an agent is reused once the queue runs down to
/// it. Agents without a script echo the input back.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    runs: Mutex<Vec<RecordedRun>>,
}

impl ScriptedProvider {
    /// Create a provider with no scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the agent named `agent`
    pub fn script(self, agent: impl Into<String>, script: Script) -> Self {
        self.push_script(agent, script);
        self
    }

    /// Queue a script on a shared provider
    pub fn push_script(&self, agent: impl Into<String>, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(agent.into()).or_default().push_back(script);
        }
    }

    /// Every run made so far
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of runs made so far
    pub fn run_count(&self) -> usize {
        self.runs.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn next_script(&self, agent: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().ok()?;
        let queue = scripts.get_mut(agent)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait::async_trait]
impl CapabilityProvider for ScriptedProvider {
    async fn run(&self, agent: &AgentDescriptor, prompt: &Prompt) -> Result<EventStream> {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(RecordedRun {
                agent: agent.name.clone(),
                tools: agent.tools.iter().map(|t| t.name.clone()).collect(),
                input: prompt.input.clone(),
            });
        }

        let script = self
            .next_script(&agent.name)
            .unwrap_or_else(|| Script::reply(format!("You said: {}", prompt.input)));
        tracing::debug!("[ScriptedProvider] Running {} with {:?}", agent.name, script);

        let stream: EventStream = match script {
            Script::Events(events) => Box::pin(stream::iter(events.into_iter().map(Ok))),
            Script::FailAfter(events, message) => Box::pin(
                stream::iter(events.into_iter().map(Ok))
                    .chain(stream::once(async move { Err(anyhow::anyhow!(message)) })),
            ),
            Script::Hang(events) => Box::pin(
                stream::iter(events.into_iter().map(Ok)).chain(stream::pending()),
            ),
            Script::Refuse(message) => anyhow::bail!(message),
            Script::Stall => return futures::future::pending().await,
        };

        Ok(stream)
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, AgentRegistry};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_unscripted_agent_echoes() {
        let provider = ScriptedProvider::new();
        let registry = AgentRegistry::standard();
        let stream = provider
            .run(registry.entry(), &Prompt::new("ping", Vec::new()))
            .await
            .unwrap();

        let events: Vec<_> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(
            events,
            vec![ProviderEvent::text("You said: ping"), ProviderEvent::End]
        );
        assert_eq!(provider.run_count(), 1);
    }

    #[tokio::test]
    async fn test_scripts_are_consumed_in_order_and_last_sticks() {
        let provider = ScriptedProvider::new()
            .script("data_agent", Script::reply("first"))
            .script("data_agent", Script::reply("second"));
        let registry = AgentRegistry::standard();
        let agent = registry.get(AgentKind::Data);
        let prompt = Prompt::new("q", Vec::new());

        let mut texts = Vec::new();
        for _ in 0..3 {
            let mut stream = provider.run(agent, &prompt).await.unwrap();
            if let Some(Ok(ProviderEvent::Text { content })) = stream.next().await {
                texts.push(content);
            }
        }
        assert_eq!(texts, vec!["first", "second", "second"]);
        assert_eq!(provider.runs()[0].tools.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_after_yields_error() {
        let provider = ScriptedProvider::new().script(
            "triage_agent",
            Script::FailAfter(vec![ProviderEvent::text("par")], "boom".into()),
        );
        let registry = AgentRegistry::standard();
        let stream = provider
            .run(registry.entry(), &Prompt::new("q", Vec::new()))
            .await
            .unwrap();

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
