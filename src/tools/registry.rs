//! Tool registry for the declared tool set
//!
//! The registry holds every tool any agent may declare. Agent descriptors
//! reference tools by name and resolve their declarations here.

use std::collections::HashMap;

use serde_json::json;

use super::tool::ToolSpec;

/// Name of the network search tool
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Name of the session history lookup tool
pub const SESSION_HISTORY_TOOL: &str = "get_session_history";

/// Name of the credit balance lookup tool
pub const CREDIT_BALANCE_TOOL: &str = "get_credit_balance";

/// Registry that holds all declarable tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with the built-in tools
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(
            ToolSpec::new(
                WEB_SEARCH_TOOL,
                "Search the public web for current information, news and recent events.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query"
                        }
                    },
                    "required": ["query"]
                }),
            )
            .gated()
            .with_justification("Search the web for", "query"),
        );

        registry.register(ToolSpec::new(
            SESSION_HISTORY_TOOL,
            "Read earlier messages of the caller's conversations.",
            json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1 }
                }
            }),
        ));

        registry.register(ToolSpec::new(
            CREDIT_BALANCE_TOOL,
            "Read the caller organization's remaining credit balance.",
            json!({ "type": "object", "properties": {} }),
        ));

        registry
    }

    /// Register a tool declaration
    pub fn register(&mut self, spec: ToolSpec) {
        tracing::debug!(
            "Registering tool: {} (requires approval: {})",
            spec.name,
            spec.requires_approval
        );
        self.tools.insert(spec.name.clone(), spec);
    }

    /// Get a tool declaration by name
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Resolve declarations for a list of names, skipping unknown ones
    pub fn resolve(&self, names: &[&str]) -> Vec<ToolSpec> {
        names
            .iter()
            .filter_map(|name| {
                let spec = self.tools.get(*name).cloned();
                if spec.is_none() {
                    tracing::warn!("[ToolRegistry] Unknown tool declared: {}", name);
                }
                spec
            })
            .collect()
    }

    /// Check if a tool requires approval (unknown tools do)
    pub fn requires_approval(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map(|t| t.requires_approval)
            .unwrap_or(true)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
