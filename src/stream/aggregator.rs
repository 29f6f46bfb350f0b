//! Stream aggregation
//!
//! Folds one provider run's events into a single outcome:
//! approvals beat a handoff, and a handoff beats plain text.

use std::time::Duration;

use futures::StreamExt;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentDescriptor;
use crate::approval::{ApprovalGateway, ApprovalRequest, ToolCallClass};
use crate::core::OrchestratorError;
use crate::llm::{CapabilityProvider, EventStream, Prompt, ProviderEvent};

/// Result of consuming one provider stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// Plain answer text
    Text(String),
    /// Gated tool calls waiting for a decision
    Approvals(Vec<ApprovalRequest>),
    /// The agent asked to hand the turn to another agent
    Handoff {
        /// Requested target agent name
        target: String,
        /// Any text emitted alongside the handoff
        text: String,
    },
}

/// Why a stream could not be aggregated
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("provider stream failed: {0}")]
    Provider(String),

    #[error("provider stream did not finish within {0:?}")]
    Timeout(Duration),

    #[error("provider stream cancelled")]
    Cancelled,
}

impl From<AggregateError> for OrchestratorError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Timeout(limit) => OrchestratorError::ProviderTimeout(limit.as_secs()),
            other => OrchestratorError::provider(other.to_string()),
        }
    }
}

/// Running state of the fold
struct Accumulator<'a> {
    agent: &'a AgentDescriptor,
    text: String,
    approvals: Vec<ApprovalRequest>,
    handoff: Option<String>,
    ended: bool,
}

impl<'a> Accumulator<'a> {
    fn new(agent: &'a AgentDescriptor) -> Self {
        Self {
            agent,
            text: String::new(),
            approvals: Vec::new(),
            handoff: None,
            ended: false,
        }
    }

    fn apply(&mut self, event: ProviderEvent) {
        if self.ended {
            tracing::debug!(
                "[StreamAggregator] Ignoring event after end from {}: {:?}",
                self.agent.name,
                event
            );
            return;
        }

        match event {
            ProviderEvent::Text { content } => self.text.push_str(&content),
            ProviderEvent::ToolApproval { name, arguments } => self.tool_call(name, arguments),
            ProviderEvent::Handoff { agent } => {
                if self.handoff.is_none() {
                    self.handoff = Some(agent);
                } else {
                    tracing::debug!(
                        "[StreamAggregator] Extra handoff to {} from {} ignored",
                        agent,
                        self.agent.name
                    );
                }
            }
            ProviderEvent::End => self.ended = true,
        }
    }

    fn tool_call(&mut self, name: String, arguments: Map<String, Value>) {
        match ApprovalGateway::classify(self.agent, &name, arguments) {
            ToolCallClass::Gated(request) => self.approvals.push(request),
            ToolCallClass::Ungated => tracing::debug!(
                "[StreamAggregator] {} does not need approval, skipping request",
                name
            ),
            ToolCallClass::Undeclared => tracing::warn!(
                "[StreamAggregator] {} requested undeclared tool {}, dropping",
                self.agent.name,
                name
            ),
        }
    }

    fn finish(self) -> StreamOutcome {
        if !self.ended {
            tracing::debug!(
                "[StreamAggregator] Stream from {} closed without end event",
                self.agent.name
            );
        }

        if !self.approvals.is_empty() {
            StreamOutcome::Approvals(self.approvals)
        } else if let Some(target) = self.handoff {
            StreamOutcome::Handoff {
                target,
                text: self.text,
            }
        } else {
            StreamOutcome::Text(self.text)
        }
    }
}

/// Consumes provider streams under a deadline
#[derive(Debug, Clone)]
pub struct StreamAggregator {
    timeout: Duration,
}

impl StreamAggregator {
    /// Create an aggregator with a per-stream deadline
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Per-stream deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a run of `agent` and drain it into one outcome
    ///
    /// The deadline starts before the provider is asked to open the stream,
    /// so a provider that never answers times out like one that stops
    /// mid-stream.
    pub async fn run(
        &self,
        provider: &dyn CapabilityProvider,
        agent: &AgentDescriptor,
        prompt: &Prompt,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, AggregateError> {
        let deadline = Instant::now() + self.timeout;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("[StreamAggregator] Run of {} cancelled before streaming", agent.name);
                return Err(AggregateError::Cancelled);
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(
                    "[StreamAggregator] {} did not start streaming within {:?}",
                    agent.name,
                    self.timeout
                );
                return Err(AggregateError::Timeout(self.timeout));
            }
            opened = provider.run(agent, prompt) => opened,
        };

        let events = opened.map_err(|e| {
            tracing::error!("[StreamAggregator] Run of {} failed to start: {:#}", agent.name, e);
            AggregateError::Provider(format!("{:#}", e))
        })?;

        self.drain(agent, events, cancel, deadline).await
    }

    /// Drain `events` from `agent` into one outcome
    ///
    /// The stream is dropped on every return path, which closes the
    /// underlying provider connection.
    pub async fn aggregate(
        &self,
        agent: &AgentDescriptor,
        events: EventStream,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, AggregateError> {
        self.drain(agent, events, cancel, Instant::now() + self.timeout)
            .await
    }

    async fn drain(
        &self,
        agent: &AgentDescriptor,
        mut events: EventStream,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<StreamOutcome, AggregateError> {
        let deadline = tokio::time::sleep_until(deadline);
        tokio::pin!(deadline);

        let mut acc = Accumulator::new(agent);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("[StreamAggregator] Stream from {} cancelled", agent.name);
                    return Err(AggregateError::Cancelled);
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        "[StreamAggregator] Stream from {} timed out after {:?}",
                        agent.name,
                        self.timeout
                    );
                    return Err(AggregateError::Timeout(self.timeout));
                }
                item = events.next() => item,
            };

            match next {
                Some(Ok(event)) => acc.apply(event),
                Some(Err(e)) => {
                    tracing::error!("[StreamAggregator] Stream from {} failed: {:#}", agent.name, e);
                    return Err(AggregateError::Provider(format!("{:#}", e)));
                }
                None => break,
            }
        }

        Ok(acc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, AgentRegistry};
    use crate::llm::{Script, ScriptedProvider};
    use futures::stream;
    use serde_json::json;

    fn events(items: Vec<ProviderEvent>) -> EventStream {
        Box::pin(stream::iter(items.into_iter().map(Ok)))
    }

    fn aggregator() -> StreamAggregator {
        StreamAggregator::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_text_is_concatenated_in_order() {
        let registry = AgentRegistry::standard();
        let outcome = aggregator()
            .aggregate(
                registry.entry(),
                events(vec![
                    ProviderEvent::text("Hello"),
                    ProviderEvent::text(", "),
                    ProviderEvent::text("world"),
                    ProviderEvent::End,
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Text("Hello, world".into()));
    }

    #[tokio::test]
    async fn test_approvals_win_over_text_and_handoff() {
        let registry = AgentRegistry::standard();
        let agent = registry.get(AgentKind::WebSearch);
        let outcome = aggregator()
            .aggregate(
                agent,
                events(vec![
                    ProviderEvent::text("Let me look that up"),
                    ProviderEvent::handoff("data_agent"),
                    ProviderEvent::tool_approval("web_search", json!({"query": "news"})),
                    ProviderEvent::tool_approval("web_search", json!({"query": "weather"})),
                    ProviderEvent::End,
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match outcome {
            StreamOutcome::Approvals(requests) => {
                assert_eq!(requests.len(), 2);
                assert_eq!(requests[0].arguments["query"], "news");
                assert_eq!(requests[1].arguments["query"], "weather");
                assert_eq!(requests[0].agent, "web_search_agent");
            }
            other => panic!("expected approvals, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_handoff_wins() {
        let registry = AgentRegistry::standard();
        let outcome = aggregator()
            .aggregate(
                registry.entry(),
                events(vec![
                    ProviderEvent::handoff("web_search_agent"),
                    ProviderEvent::handoff("data_agent"),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StreamOutcome::Handoff {
                target: "web_search_agent".into(),
                text: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_undeclared_and_ungated_calls_dropped() {
        let registry = AgentRegistry::standard();
        let data = registry.get(AgentKind::Data);
        let outcome = aggregator()
            .aggregate(
                data,
                events(vec![
                    ProviderEvent::tool_approval("web_search", json!({"query": "x"})),
                    ProviderEvent::tool_approval("get_credit_balance", json!({})),
                    ProviderEvent::text("Your balance is 5"),
                    ProviderEvent::End,
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Text("Your balance is 5".into()));
    }

    #[tokio::test]
    async fn test_events_after_end_are_drained_and_ignored() {
        let registry = AgentRegistry::standard();
        let outcome = aggregator()
            .aggregate(
                registry.entry(),
                events(vec![
                    ProviderEvent::text("done"),
                    ProviderEvent::End,
                    ProviderEvent::text(" extra"),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Text("done".into()));
    }

    #[tokio::test]
    async fn test_close_without_end_is_complete() {
        let registry = AgentRegistry::standard();
        let outcome = aggregator()
            .aggregate(
                registry.entry(),
                events(vec![ProviderEvent::text("partial")]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Text("partial".into()));
    }

    #[tokio::test]
    async fn test_mid_stream_error() {
        let registry = AgentRegistry::standard();
        let failing: EventStream = Box::pin(stream::iter(vec![
            Ok(ProviderEvent::text("par")),
            Err(anyhow::anyhow!("connection reset")),
        ]));
        let err = aggregator()
            .aggregate(registry.entry(), failing, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Provider(ref m) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_deadline() {
        let registry = AgentRegistry::standard();
        let hanging: EventStream =
            Box::pin(stream::iter(vec![Ok(ProviderEvent::text("..."))]).chain(stream::pending()));
        let err = StreamAggregator::new(Duration::from_millis(50))
            .aggregate(registry.entry(), hanging, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Timeout(_)));

        let mapped: OrchestratorError = AggregateError::Timeout(Duration::from_secs(60)).into();
        assert!(matches!(mapped, OrchestratorError::ProviderTimeout(60)));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let registry = AgentRegistry::standard();
        let token = CancellationToken::new();
        token.cancel();
        let err = aggregator()
            .aggregate(registry.entry(), Box::pin(stream::pending()), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_covers_opening_the_stream() {
        let registry = AgentRegistry::standard();
        let provider = ScriptedProvider::new().script("triage_agent", Script::Stall);
        let prompt = Prompt::new("hello", Vec::new());

        let err = StreamAggregator::new(Duration::from_millis(50))
            .run(&provider, registry.entry(), &prompt, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Timeout(_)));
        assert_eq!(provider.run_count(), 1);
    }

    #[tokio::test]
    async fn test_run_start_failure_and_success() {
        let registry = AgentRegistry::standard();
        let prompt = Prompt::new("hello", Vec::new());

        let refusing = ScriptedProvider::new().script("triage_agent", Script::Refuse("503".into()));
        let err = aggregator()
            .run(&refusing, registry.entry(), &prompt, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::Provider(ref m) if m.contains("503")));

        let echo = ScriptedProvider::new();
        let outcome = aggregator()
            .run(&echo, registry.entry(), &prompt, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Text("You said: hello".into()));
    }
}
