//! Conversation orchestrator
//!
//! Runs one turn per call:
//! - Validate the caller and message
//! - Check credits for premium turns
//! - Resolve the session and log the user message
//! - Route through triage, delegating at most one hop
//! - Suspend on gated tool calls, or charge and log the answer
//!
//! Provider failures never surface as errors. The caller gets a fallback
//! answer tagged with `errorKind`, nothing is charged, and nothing is logged
//! for the assistant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::turn::{CompletedTurn, FailureKind, TurnOutcome, TurnRequest, TurnUsage};
use crate::agent::{AgentDescriptor, AgentKind, AgentRegistry, RouteDecision};
use crate::approval::{ApprovalGateway, ApprovalRequest, PendingStore, SuspendContext};
use crate::core::{
    Caller, OrchestratorConfig, OrchestratorError, OrchestratorResult, TurnState, TurnTracker,
};
use crate::credits::{ChargeOutcome, CreditGate, CreditLedger};
use crate::llm::{bound_history, CapabilityProvider, Prompt};
use crate::session::{AssistantMetadata, SessionLogWriter, SessionStore};
use crate::stream::{StreamAggregator, StreamOutcome};

/// Answer returned when the provider fails
pub const FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't complete that request right now. Please try again in a moment.";

/// Answer returned when the provider runs past its deadline
pub const TIMEOUT_MESSAGE: &str =
    "Sorry, that took longer than expected and I had to stop. Please try again.";

/// A finished answer, before charging and logging
#[derive(Debug)]
struct Answer {
    agent: String,
    text: String,
    tools_used: Vec<String>,
    approval_rejected: bool,
}

/// Where routing ended up
enum Routed {
    Answer(Answer),
    Approvals {
        agent: AgentKind,
        requests: Vec<ApprovalRequest>,
    },
}

impl Routed {
    /// Plain answer from `agent`; an empty answer counts as a provider failure
    fn answer(agent: &AgentDescriptor, text: String) -> OrchestratorResult<Self> {
        if text.trim().is_empty() {
            return Err(OrchestratorError::provider(format!(
                "{} returned an empty answer",
                agent.name
            )));
        }
        Ok(Routed::Answer(Answer {
            agent: agent.kind.name().to_string(),
            text,
            tools_used: Vec::new(),
            approval_rejected: false,
        }))
    }
}

/// Entry point for conversation turns
///
/// Holds no per-conversation state; everything lives in the session and
/// pending stores, so one instance serves every request.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    provider: Arc<dyn CapabilityProvider>,
    writer: SessionLogWriter,
    credits: CreditGate,
    gateway: ApprovalGateway,
    aggregator: StreamAggregator,
    history_limit: usize,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in agents
    pub fn new(
        config: &OrchestratorConfig,
        provider: Arc<dyn CapabilityProvider>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn CreditLedger>,
        pending: Arc<dyn PendingStore>,
    ) -> Self {
        Self::with_registry(
            config,
            Arc::new(AgentRegistry::standard()),
            provider,
            sessions,
            ledger,
            pending,
        )
    }

    /// Create an orchestrator over a custom agent registry
    pub fn with_registry(
        config: &OrchestratorConfig,
        registry: Arc<AgentRegistry>,
        provider: Arc<dyn CapabilityProvider>,
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn CreditLedger>,
        pending: Arc<dyn PendingStore>,
    ) -> Self {
        let aggregator = StreamAggregator::new(config.stream_timeout);
        let gateway = ApprovalGateway::new(
            pending,
            registry.clone(),
            provider.clone(),
            aggregator.clone(),
            config.pending_ttl,
        );

        tracing::info!(
            "[Orchestrator] Using {} provider, stream timeout {:?}, turn cost {}",
            provider.provider_name(),
            config.stream_timeout,
            config.premium_turn_cost
        );

        Self {
            registry,
            provider,
            writer: SessionLogWriter::new(sessions),
            credits: CreditGate::new(ledger, config.premium_turn_cost),
            gateway,
            aggregator,
            history_limit: config.history_limit,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel in-flight provider streams when `token` fires
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The agent registry
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Handle one conversation call
    ///
    /// A request carrying approval decisions resumes the suspended turn of
    /// its session; anything else starts a fresh turn.
    pub async fn handle_message(
        &self,
        caller: &Caller,
        request: TurnRequest,
    ) -> OrchestratorResult<TurnOutcome> {
        caller.ensure_identified()?;

        if request.is_resume() {
            let session_id = request
                .session_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    OrchestratorError::validation("sessionId is required when submitting approvals")
                })?;
            return self
                .resume_turn(caller, session_id, &request.approvals)
                .await;
        }

        let message = request.message.trim();
        if message.is_empty() {
            return Err(OrchestratorError::validation("message must not be empty"));
        }
        self.fresh_turn(caller, message, &request).await
    }

    async fn fresh_turn(
        &self,
        caller: &Caller,
        message: &str,
        request: &TurnRequest,
    ) -> OrchestratorResult<TurnOutcome> {
        let premium = request.agent_mode;
        if premium {
            self.credits.ensure_available(&caller.organization_id).await?;
        }

        let session = self
            .writer
            .resolve_session(caller, request.session_id.as_deref(), message, premium)
            .await?;
        let mut tracker = TurnTracker::fresh(&session.id);

        if let Err(e) = self.writer.record_user_message(&session.id, message).await {
            tracker.fail(e.to_string());
            return Err(e);
        }

        let history = bound_history(&request.history, self.history_limit);
        let prompt = Prompt::new(message, history.clone()).with_session(&session.id);
        let entry = if premium {
            self.registry.entry()
        } else {
            self.registry.basic()
        };

        tracing::info!(
            "[Orchestrator] Turn started in session {} ({} mode, {} history entries)",
            session.id,
            if premium { "agent" } else { "basic" },
            history.len()
        );

        match self.route(&mut tracker, entry, &prompt).await {
            Ok(Routed::Answer(answer)) => {
                Ok(self.complete(&mut tracker, caller, &session.id, answer, premium).await)
            }
            Ok(Routed::Approvals { agent, requests }) => {
                tracker.advance(TurnState::AwaitingApproval {
                    pending: requests.len(),
                });
                let context = SuspendContext {
                    session_id: session.id.clone(),
                    organization_id: caller.organization_id.clone(),
                    user_id: caller.user_id.clone(),
                    message: message.to_string(),
                    history,
                    agent,
                };
                match self.gateway.suspend(requests, context).await {
                    Ok(pending) => Ok(TurnOutcome::PendingApproval(pending)),
                    Err(e) => {
                        tracker.fail(e.to_string());
                        Err(e)
                    }
                }
            }
            Err(e) if e.is_provider_failure() => {
                Ok(self.degrade(&mut tracker, &session.id, entry.kind.name(), e))
            }
            Err(e) => {
                tracker.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn resume_turn(
        &self,
        caller: &Caller,
        session_id: &str,
        decisions: &HashMap<String, bool>,
    ) -> OrchestratorResult<TurnOutcome> {
        self.credits.ensure_available(&caller.organization_id).await?;

        let context = self
            .gateway
            .claim(session_id, &caller.organization_id, decisions)
            .await?;
        let mut tracker = TurnTracker::resumed(session_id, context.requests.len());
        tracing::info!(
            "[Orchestrator] Resuming session {} with {} decision(s)",
            session_id,
            decisions.len()
        );

        let resolved = match self
            .gateway
            .resume(&context, decisions, &mut tracker, &self.shutdown)
            .await
        {
            Ok(resolved) if resolved.text.trim().is_empty() => {
                let err = OrchestratorError::provider("approved calls produced no answer");
                return Ok(self.degrade(&mut tracker, session_id, context.agent.name(), err));
            }
            Ok(resolved) => resolved,
            Err(e) if e.is_provider_failure() => {
                return Ok(self.degrade(&mut tracker, session_id, context.agent.name(), e));
            }
            Err(e) => {
                tracker.fail(e.to_string());
                return Err(e);
            }
        };

        let answer = Answer {
            agent: resolved.agent,
            text: resolved.text,
            tools_used: resolved.tools_used,
            approval_rejected: resolved.approval_rejected,
        };
        Ok(self.complete(&mut tracker, caller, session_id, answer, true).await)
    }

    /// Run the entry agent and follow at most one handoff
    async fn route(
        &self,
        tracker: &mut TurnTracker,
        entry: &AgentDescriptor,
        prompt: &Prompt,
    ) -> OrchestratorResult<Routed> {
        let (target, text) = match self.stream_agent(tracker, entry, prompt).await? {
            StreamOutcome::Text(text) => return Routed::answer(entry, text),
            StreamOutcome::Approvals(requests) => {
                return Ok(Routed::Approvals {
                    agent: entry.kind,
                    requests,
                })
            }
            StreamOutcome::Handoff { target, text } => (target, text),
        };

        match self.registry.route(entry.kind, &target) {
            RouteDecision::Delegate(kind) if entry.handoffs.contains(&kind) => {
                tracing::info!("[Orchestrator] {} handed off to {}", entry.name, kind);
                let specialist = self.registry.get(kind);
                match self.stream_agent(tracker, specialist, prompt).await? {
                    StreamOutcome::Text(text) => Routed::answer(specialist, text),
                    StreamOutcome::Approvals(requests) => Ok(Routed::Approvals {
                        agent: kind,
                        requests,
                    }),
                    StreamOutcome::Handoff { target, text } => {
                        tracing::warn!(
                            "[Orchestrator] Ignoring second handoff from {} to {}",
                            specialist.name,
                            target
                        );
                        Routed::answer(specialist, text)
                    }
                }
            }
            _ if !text.trim().is_empty() => Routed::answer(entry, text),
            _ => {
                tracing::info!(
                    "[Orchestrator] {} handoff to {} not followed, answering directly",
                    entry.name,
                    target
                );
                let direct = entry.without_handoffs();
                match self.stream_agent(tracker, &direct, prompt).await? {
                    StreamOutcome::Text(text) | StreamOutcome::Handoff { text, .. } => {
                        Routed::answer(&direct, text)
                    }
                    StreamOutcome::Approvals(requests) => Ok(Routed::Approvals {
                        agent: entry.kind,
                        requests,
                    }),
                }
            }
        }
    }

    async fn stream_agent(
        &self,
        tracker: &mut TurnTracker,
        agent: &AgentDescriptor,
        prompt: &Prompt,
    ) -> OrchestratorResult<StreamOutcome> {
        tracker.advance(TurnState::streaming(&agent.name));
        Ok(self
            .aggregator
            .run(self.provider.as_ref(), agent, prompt, &self.shutdown)
            .await?)
    }

    /// Charge (premium only) and log the answer
    ///
    /// Neither step can fail the turn: a refused charge marks the interaction
    /// unbilled, and a failed write marks the response unlogged.
    async fn complete(
        &self,
        tracker: &mut TurnTracker,
        caller: &Caller,
        session_id: &str,
        answer: Answer,
        premium: bool,
    ) -> TurnOutcome {
        tracker.advance(TurnState::Persisting);

        let charge = if premium {
            let description = format!("Premium turn in session {}", session_id);
            Some(
                self.credits
                    .charge_turn(&caller.organization_id, &description)
                    .await,
            )
        } else {
            None
        };
        let credits_used = charge.map(|c| c.credits_used()).unwrap_or(0);

        let metadata = AssistantMetadata {
            agent: answer.agent.clone(),
            tools_used: answer.tools_used.clone(),
            approval_rejected: answer.approval_rejected,
            unbilled: matches!(charge, Some(ChargeOutcome::Unbilled)),
        };
        let unlogged = match self
            .writer
            .record_assistant_message(session_id, &answer.text, metadata, credits_used)
            .await
        {
            Ok(_) => false,
            Err(e) => {
                tracing::error!(
                    "[Orchestrator] Failed to log answer for session {} (credits used {}): {}",
                    session_id,
                    credits_used,
                    e
                );
                true
            }
        };

        tracker.advance(TurnState::Done);
        tracing::info!(
            "[Orchestrator] Turn completed in session {} by {} ({} credit(s))",
            session_id,
            answer.agent,
            credits_used
        );

        TurnOutcome::Completed(CompletedTurn {
            message: answer.text,
            session_id: session_id.to_string(),
            usage: TurnUsage {
                active_agent: answer.agent,
                tools_used: answer.tools_used,
                credits_used,
            },
            unlogged,
            error_kind: None,
        })
    }

    /// Fallback answer for a provider failure; nothing is charged or logged
    fn degrade(
        &self,
        tracker: &mut TurnTracker,
        session_id: &str,
        agent: &str,
        err: OrchestratorError,
    ) -> TurnOutcome {
        tracing::error!(
            "[Orchestrator] Provider failure in session {}: {}",
            session_id,
            err
        );
        tracker.fail(err.to_string());

        let (message, kind) = match err {
            OrchestratorError::ProviderTimeout(_) => (TIMEOUT_MESSAGE, FailureKind::Timeout),
            _ => (FALLBACK_MESSAGE, FailureKind::Provider),
        };
        TurnOutcome::Completed(CompletedTurn {
            message: message.to_string(),
            session_id: session_id.to_string(),
            usage: TurnUsage {
                active_agent: agent.to_string(),
                tools_used: Vec::new(),
                credits_used: 0,
            },
            unlogged: false,
            error_kind: Some(kind),
        })
    }
}
