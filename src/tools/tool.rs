//! Tool declarations
//!
//! Tools are declared to the capability provider, which executes them. The
//! orchestrator only needs to know each tool's schema and whether a call to it
//! must be confirmed by a human first.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declaration of a tool an agent may request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name the model uses to request the tool
    pub name: String,

    /// Description shown to the model
    pub description: String,

    /// JSON schema of the tool's arguments
    pub input_schema: Value,

    /// Whether a call must be confirmed by the caller before it runs
    pub requires_approval: bool,

    /// Phrase used to describe an invocation, e.g. "Search the web for"
    #[serde(skip)]
    action_phrase: String,

    /// Argument quoted in the justification, e.g. "query"
    #[serde(skip)]
    primary_argument: Option<String>,
}

impl ToolSpec {
    /// Create a tool that runs without confirmation
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        let name = name.into();
        Self {
            action_phrase: format!("Run {}", name),
            name,
            description: description.into(),
            input_schema,
            requires_approval: false,
            primary_argument: None,
        }
    }

    /// Require human confirmation before this tool runs
    pub fn gated(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Set the phrase and quoted argument used for justifications
    pub fn with_justification(
        mut self,
        action_phrase: impl Into<String>,
        primary_argument: impl Into<String>,
    ) -> Self {
        self.action_phrase = action_phrase.into();
        self.primary_argument = Some(primary_argument.into());
        self
    }

    /// Copy of this declaration with approval already granted
    pub fn pre_approved(&self) -> Self {
        let mut spec = self.clone();
        spec.requires_approval = false;
        spec
    }

    /// Human-readable description of what an invocation will do
    pub fn justification(&self, arguments: &Map<String, Value>) -> String {
        let primary = self
            .primary_argument
            .as_deref()
            .and_then(|key| arguments.get(key))
            .and_then(|v| v.as_str());

        match primary {
            Some(value) => format!("{} \"{}\"", self.action_phrase, value),
            None if arguments.is_empty() => self.action_phrase.clone(),
            None => format!(
                "{} with {}",
                self.action_phrase,
                Value::Object(arguments.clone())
            ),
        }
    }
}
