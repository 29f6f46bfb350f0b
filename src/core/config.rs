//! Orchestrator configuration
//!
//! Loaded from `ORCHESTRATOR_*` environment variables with sensible defaults,
//! then adjusted with the `with_*` builder methods.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Which capability provider backs the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// Remote provider reached over HTTP with a streaming response
    Http {
        /// Base URL of the provider service
        base_url: String,
        /// Bearer token sent with each request
        api_key: Option<String>,
    },
    /// In-process scripted provider (local development)
    Scripted,
}

/// Configuration for the orchestrator and its HTTP surface
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Capability provider selection
    pub provider: ProviderKind,

    /// Deadline for one provider stream to reach its end
    pub stream_timeout: Duration,

    /// Credits charged for a completed premium turn
    pub premium_turn_cost: i64,

    /// Maximum number of prior history entries forwarded to the provider
    pub history_limit: usize,

    /// How long a suspended turn waits for approval decisions
    pub pending_ttl: Duration,

    /// Directory for the file-backed session store (in-memory when unset)
    pub sessions_dir: Option<PathBuf>,

    /// Opening balance for organizations in the in-memory ledger
    pub default_balance: i64,

    /// Directory for rolling JSON log files (stdout only when unset)
    pub log_dir: Option<PathBuf>,
}

impl OrchestratorConfig {
    /// Create a configuration with default values and the scripted provider
    pub fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            provider: ProviderKind::Scripted,
            stream_timeout: Duration::from_secs(60),
            premium_turn_cost: 1,
            history_limit: 20,
            pending_ttl: Duration::from_secs(15 * 60),
            sessions_dir: None,
            default_balance: 0,
            log_dir: None,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - `ORCHESTRATOR_BIND_ADDR` (default `0.0.0.0:8080`)
    /// - `ORCHESTRATOR_PROVIDER` (`http` or `scripted`, default `scripted`)
    /// - `ORCHESTRATOR_PROVIDER_URL` (required for `http`)
    /// - `ORCHESTRATOR_PROVIDER_API_KEY` (optional)
    /// - `ORCHESTRATOR_STREAM_TIMEOUT_SECS` (default 60)
    /// - `ORCHESTRATOR_TURN_COST` (default 1)
    /// - `ORCHESTRATOR_HISTORY_LIMIT` (default 20)
    /// - `ORCHESTRATOR_PENDING_TTL_SECS` (default 900)
    /// - `ORCHESTRATOR_SESSIONS_DIR` (optional)
    /// - `ORCHESTRATOR_DEFAULT_BALANCE` (default 0)
    /// - `ORCHESTRATOR_LOG_DIR` (optional)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(addr) = env::var("ORCHESTRATOR_BIND_ADDR") {
            config.bind_addr = addr;
        }

        let provider = env::var("ORCHESTRATOR_PROVIDER").unwrap_or_else(|_| "scripted".into());
        config.provider = match provider.as_str() {
            "http" => ProviderKind::Http {
                base_url: env::var("ORCHESTRATOR_PROVIDER_URL")
                    .context("ORCHESTRATOR_PROVIDER_URL environment variable not set")?,
                api_key: env::var("ORCHESTRATOR_PROVIDER_API_KEY").ok(),
            },
            "scripted" => ProviderKind::Scripted,
            other => anyhow::bail!("Unknown ORCHESTRATOR_PROVIDER: {}", other),
        };

        if let Some(secs) = parse_var::<u64>("ORCHESTRATOR_STREAM_TIMEOUT_SECS")? {
            config.stream_timeout = Duration::from_secs(secs);
        }
        if let Some(cost) = parse_var::<i64>("ORCHESTRATOR_TURN_COST")? {
            config = config
                .with_turn_cost(cost)
                .context("ORCHESTRATOR_TURN_COST has an invalid value")?;
        }
        if let Some(limit) = parse_var::<usize>("ORCHESTRATOR_HISTORY_LIMIT")? {
            config.history_limit = limit;
        }
        if let Some(secs) = parse_var::<u64>("ORCHESTRATOR_PENDING_TTL_SECS")? {
            config.pending_ttl = Duration::from_secs(secs);
        }
        if let Some(balance) = parse_var::<i64>("ORCHESTRATOR_DEFAULT_BALANCE")? {
            config.default_balance = balance;
        }
        config.sessions_dir = env::var("ORCHESTRATOR_SESSIONS_DIR").ok().map(PathBuf::from);
        config.log_dir = env::var("ORCHESTRATOR_LOG_DIR").ok().map(PathBuf::from);

        Ok(config)
    }

    /// Set the stream deadline
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set the premium turn cost
    ///
    /// The cost must be positive; the ledger refuses non-positive charges.
    pub fn with_turn_cost(mut self, cost: i64) -> Result<Self> {
        if cost <= 0 {
            anyhow::bail!("turn cost must be positive, got {}", cost);
        }
        self.premium_turn_cost = cost;
        Ok(self)
    }

    /// Set the history bound
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the pending approval TTL
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Use a file-backed session store rooted at `dir`
    pub fn with_sessions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sessions_dir = Some(dir.into());
        self
    }

    /// Set the capability provider
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Short description of the provider for logs
    pub fn provider_label(&self) -> &str {
        match &self.provider {
            ProviderKind::Http { base_url, .. } => base_url,
            ProviderKind::Scripted => "scripted",
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value: {}", name, raw))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.premium_turn_cost, 1);
        assert_eq!(config.stream_timeout, Duration::from_secs(60));
        assert_eq!(config.provider, ProviderKind::Scripted);
        assert!(config.sessions_dir.is_none());
    }

    #[test]
    fn test_config_builders() {
        let config = OrchestratorConfig::new()
            .with_turn_cost(3)
            .unwrap()
            .with_history_limit(4)
            .with_stream_timeout(Duration::from_millis(250));
        assert_eq!(config.premium_turn_cost, 3);
        assert_eq!(config.history_limit, 4);
        assert_eq!(config.stream_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_non_positive_turn_cost_rejected() {
        assert!(OrchestratorConfig::new().with_turn_cost(0).is_err());
        assert!(OrchestratorConfig::new().with_turn_cost(-2).is_err());
        assert_eq!(
            OrchestratorConfig::new().with_turn_cost(1).unwrap().premium_turn_cost,
            1
        );
    }
}
