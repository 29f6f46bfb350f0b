//! Approval gateway
//!
//! Decides which tool calls need the caller's confirmation, suspends turns
//! that raised such calls, and resumes them once every request has a
//! decision. Approved calls run through a single-tool agent that may only
//! perform the call that was confirmed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::pending::{decided_ids, PendingContext, PendingStore};
use super::request::{ApprovalRequest, ApprovalStatus, PendingApproval, ResolvedTurn};
use crate::agent::{AgentDescriptor, AgentKind, AgentRegistry};
use crate::core::{OrchestratorError, OrchestratorResult, TurnState, TurnTracker};
use crate::llm::{CapabilityProvider, HistoryMessage, Prompt};
use crate::stream::{StreamAggregator, StreamOutcome};

/// Prompt shown to the caller when a turn is suspended
const APPROVAL_PROMPT: &str = "I need your permission before I continue:";

/// How a requested tool call is treated
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallClass {
    /// Declared and gated: needs a decision
    Gated(ApprovalRequest),
    /// Declared but runs without confirmation
    Ungated,
    /// Not part of the agent's tool set
    Undeclared,
}

/// Turn details captured when suspending
#[derive(Debug, Clone)]
pub struct SuspendContext {
    pub session_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub message: String,
    pub history: Vec<HistoryMessage>,
    pub agent: AgentKind,
}

/// Suspends and resumes turns around gated tool calls
pub struct ApprovalGateway {
    pending: Arc<dyn PendingStore>,
    registry: Arc<AgentRegistry>,
    provider: Arc<dyn CapabilityProvider>,
    aggregator: StreamAggregator,
    ttl: Duration,
}

impl ApprovalGateway {
    /// Create a gateway over `pending`
    pub fn new(
        pending: Arc<dyn PendingStore>,
        registry: Arc<AgentRegistry>,
        provider: Arc<dyn CapabilityProvider>,
        aggregator: StreamAggregator,
        ttl: Duration,
    ) -> Self {
        Self {
            pending,
            registry,
            provider,
            aggregator,
            ttl,
        }
    }

    /// Classify a tool call requested by `agent`
    pub fn classify(agent: &AgentDescriptor, name: &str, arguments: Map<String, Value>) -> ToolCallClass {
        match agent.declared_tool(name) {
            None => ToolCallClass::Undeclared,
            Some(tool) if tool.requires_approval => {
                ToolCallClass::Gated(ApprovalRequest::new(tool, arguments, &agent.name))
            }
            Some(_) => ToolCallClass::Ungated,
        }
    }

    /// Store the turn and build the payload returned to the caller
    pub async fn suspend(
        &self,
        requests: Vec<ApprovalRequest>,
        context: SuspendContext,
    ) -> OrchestratorResult<PendingApproval> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| OrchestratorError::validation(format!("Invalid approval TTL: {}", e)))?;

        let mut conversation_history = context.history.clone();
        conversation_history.push(HistoryMessage::user(&context.message));

        let pending = PendingContext {
            correlation_id: PendingContext::correlation_id(&context.session_id, &requests),
            session_id: context.session_id.clone(),
            organization_id: context.organization_id,
            user_id: context.user_id,
            message: context.message,
            history: context.history,
            agent: context.agent,
            requests: requests.clone(),
            created_at: now,
            expires_at: now + ttl,
        };

        tracing::info!(
            "[ApprovalGateway] Suspending session {} with {} request(s) from {}",
            pending.session_id,
            requests.len(),
            pending.agent
        );
        self.pending.save(pending).await?;

        Ok(PendingApproval {
            message: approval_message(&requests),
            status: ApprovalStatus::PendingApproval,
            approval_requests: requests,
            session_id: context.session_id,
            conversation_history,
        })
    }

    /// Take the suspended turn for `session_id` if `decisions` cover it
    pub async fn claim(
        &self,
        session_id: &str,
        organization_id: &str,
        decisions: &HashMap<String, bool>,
    ) -> OrchestratorResult<PendingContext> {
        if decisions.is_empty() {
            return Err(OrchestratorError::validation("approvals must not be empty"));
        }
        let context = self
            .pending
            .take(session_id, organization_id, &decided_ids(decisions))
            .await?;
        Ok(context)
    }

    /// Run approved calls and acknowledge rejected ones, in request order
    pub async fn resume(
        &self,
        context: &PendingContext,
        decisions: &HashMap<String, bool>,
        tracker: &mut TurnTracker,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<ResolvedTurn> {
        let agent = self.registry.get(context.agent);
        let prompt = Prompt::new(context.message.clone(), context.history.clone())
            .with_session(&context.session_id);

        let mut outputs = Vec::new();
        let mut tools_used = Vec::new();
        let mut approval_rejected = false;

        for request in &context.requests {
            let approved = decisions.get(&request.id).copied().unwrap_or(false);
            let tool = match agent.declared_tool(&request.tool_name) {
                Some(tool) if approved => tool,
                Some(_) => {
                    tracing::info!(
                        "[ApprovalGateway] Request {} for {} rejected",
                        request.id,
                        request.tool_name
                    );
                    approval_rejected = true;
                    outputs.push(rejection_notice(&request.tool_name));
                    continue;
                }
                None => {
                    tracing::warn!(
                        "[ApprovalGateway] {} no longer declares {}, skipping request {}",
                        agent.name,
                        request.tool_name,
                        request.id
                    );
                    approval_rejected = true;
                    outputs.push(rejection_notice(&request.tool_name));
                    continue;
                }
            };

            let restricted = agent.restricted_to(tool, &request.arguments);
            tracker.advance(TurnState::streaming(&restricted.name));
            tracing::info!(
                "[ApprovalGateway] Running approved {} for session {}",
                tool.name,
                context.session_id
            );

            let outcome = self
                .aggregator
                .run(self.provider.as_ref(), &restricted, &prompt, cancel)
                .await?;
            match outcome {
                StreamOutcome::Text(text) | StreamOutcome::Handoff { text, .. } => {
                    if !text.trim().is_empty() {
                        outputs.push(text);
                    }
                }
                StreamOutcome::Approvals(_) => {
                    return Err(OrchestratorError::provider(format!(
                        "approved call to {} asked for further approval",
                        tool.name
                    )));
                }
            }
            tools_used.push(tool.name.clone());
        }

        Ok(ResolvedTurn {
            text: outputs.join("\n\n"),
            agent: agent.name.clone(),
            tools_used,
            approval_rejected,
        })
    }
}

fn approval_message(requests: &[ApprovalRequest]) -> String {
    let mut message = APPROVAL_PROMPT.to_string();
    for request in requests {
        message.push_str("\n- ");
        message.push_str(&request.justification);
    }
    message
}

fn rejection_notice(tool: &str) -> String {
    format!(
        "The request to use {} was declined, so I continued without it.",
        tool
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::InMemoryPendingStore;
    use crate::llm::{ProviderEvent, Script, ScriptedProvider};
    use serde_json::json;

    struct Fixture {
        gateway: ApprovalGateway,
        provider: Arc<ScriptedProvider>,
        registry: Arc<AgentRegistry>,
    }

    fn fixture(provider: ScriptedProvider) -> Fixture {
        let provider = Arc::new(provider);
        let registry = Arc::new(AgentRegistry::standard());
        let gateway = ApprovalGateway::new(
            Arc::new(InMemoryPendingStore::new()),
            registry.clone(),
            provider.clone(),
            StreamAggregator::new(Duration::from_secs(5)),
            Duration::from_secs(900),
        );
        Fixture {
            gateway,
            provider,
            registry,
        }
    }

    fn search_request(registry: &AgentRegistry, query: &str) -> ApprovalRequest {
        let agent = registry.get(AgentKind::WebSearch);
        let args = json!({ "query": query }).as_object().cloned().unwrap();
        match ApprovalGateway::classify(agent, "web_search", args) {
            ToolCallClass::Gated(request) => request,
            other => panic!("expected gated call, got {:?}", other),
        }
    }

    fn suspend_context() -> SuspendContext {
        SuspendContext {
            session_id: "s1".into(),
            organization_id: "org_1".into(),
            user_id: "user_1".into(),
            message: "What's in the news?".into(),
            history: vec![HistoryMessage::assistant("Hi!")],
            agent: AgentKind::WebSearch,
        }
    }

    #[test]
    fn test_classify() {
        let registry = AgentRegistry::standard();
        let data = registry.get(AgentKind::Data);
        assert_eq!(
            ApprovalGateway::classify(data, "get_credit_balance", Map::new()),
            ToolCallClass::Ungated
        );
        assert_eq!(
            ApprovalGateway::classify(data, "web_search", Map::new()),
            ToolCallClass::Undeclared
        );
        assert!(matches!(
            ApprovalGateway::classify(registry.get(AgentKind::WebSearch), "web_search", Map::new()),
            ToolCallClass::Gated(_)
        ));
    }

    #[tokio::test]
    async fn test_suspend_payload() {
        let f = fixture(ScriptedProvider::new());
        let request = search_request(&f.registry, "rust 2026");
        let payload = f
            .gateway
            .suspend(vec![request.clone()], suspend_context())
            .await
            .unwrap();

        assert_eq!(payload.status, ApprovalStatus::PendingApproval);
        assert_eq!(payload.approval_requests, vec![request]);
        assert!(payload.message.contains("Search the web for \"rust 2026\""));
        assert_eq!(payload.conversation_history.len(), 2);
        assert_eq!(
            payload.conversation_history[1],
            HistoryMessage::user("What's in the news?")
        );
    }

    #[tokio::test]
    async fn test_claim_requires_decisions() {
        let f = fixture(ScriptedProvider::new());
        let err = f.gateway.claim("s1", "org_1", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_resume_mixed_decisions() {
        let f = fixture(
            ScriptedProvider::new()
                .script("web_search_agent:web_search", Script::reply("Top story: Rust 2.0")),
        );
        let approved = search_request(&f.registry, "news");
        let rejected = search_request(&f.registry, "gossip");
        f.gateway
            .suspend(vec![approved.clone(), rejected.clone()], suspend_context())
            .await
            .unwrap();

        let decisions: HashMap<String, bool> = [
            (approved.id.clone(), true),
            (rejected.id.clone(), false),
        ]
        .into_iter()
        .collect();
        let context = f.gateway.claim("s1", "org_1", &decisions).await.unwrap();
        let mut tracker = TurnTracker::resumed("s1", context.requests.len());
        let resolved = f
            .gateway
            .resume(&context, &decisions, &mut tracker, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolved.tools_used, vec!["web_search"]);
        assert!(resolved.approval_rejected);
        assert_eq!(resolved.agent, "web_search_agent");
        assert!(resolved.text.starts_with("Top story: Rust 2.0\n\n"));
        assert!(resolved.text.contains("declined"));

        let runs = f.provider.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].agent, "web_search_agent:web_search");
        assert_eq!(runs[0].tools, vec!["web_search"]);
        assert_eq!(runs[0].input, "What's in the news?");
    }

    #[tokio::test]
    async fn test_resume_all_rejected_skips_provider() {
        let f = fixture(ScriptedProvider::new());
        let request = search_request(&f.registry, "news");
        f.gateway
            .suspend(vec![request.clone()], suspend_context())
            .await
            .unwrap();

        let decisions: HashMap<String, bool> = [(request.id.clone(), false)].into_iter().collect();
        let context = f.gateway.claim("s1", "org_1", &decisions).await.unwrap();
        let mut tracker = TurnTracker::resumed("s1", 1);
        let resolved = f
            .gateway
            .resume(&context, &decisions, &mut tracker, &CancellationToken::new())
            .await
            .unwrap();

        assert!(resolved.tools_used.is_empty());
        assert!(resolved.approval_rejected);
        assert_eq!(f.provider.run_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_provider_failure() {
        let f = fixture(ScriptedProvider::new().script(
            "web_search_agent:web_search",
            Script::FailAfter(vec![ProviderEvent::text("Top")], "reset".into()),
        ));
        let request = search_request(&f.registry, "news");
        f.gateway
            .suspend(vec![request.clone()], suspend_context())
            .await
            .unwrap();

        let decisions: HashMap<String, bool> = [(request.id.clone(), true)].into_iter().collect();
        let context = f.gateway.claim("s1", "org_1", &decisions).await.unwrap();
        let mut tracker = TurnTracker::resumed("s1", 1);
        let err = f
            .gateway
            .resume(&context, &decisions, &mut tracker, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }
}
