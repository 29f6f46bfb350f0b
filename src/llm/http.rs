//! HTTP capability provider
//!
//! Posts the agent descriptor and prompt to a provider service and parses its
//! server-sent-event response into `ProviderEvent`s.
//!
//! # Example
//!
//! ```ignore
//! use shadow_orchestrator::llm::HttpCapabilityProvider;
//!
//! let provider = HttpCapabilityProvider::new("https://agents.internal")?
//!     .with_api_key("secret");
//! let stream = provider.run(registry.entry(), &prompt).await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::provider::{CapabilityProvider, EventStream};
use super::types::{Prompt, RawProviderEvent};
use crate::agent::AgentDescriptor;

/// Path of the streaming run endpoint
const RUN_PATH: &str = "/v1/agents/run";

/// Limit on establishing the TCP/TLS connection to the provider
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for a provider run
#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    agent: &'a AgentDescriptor,
    prompt: &'a Prompt,
    stream: bool,
}

/// Capability provider reached over HTTP
pub struct HttpCapabilityProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCapabilityProvider {
    /// Create a provider for the service at `base_url`
    ///
    /// Only the connect phase is bounded here. The whole run, including the
    /// wait for response headers, is bounded by the stream aggregator.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build provider HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Set the bearer token sent with each request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn run_url(&self) -> String {
        format!("{}{}", self.base_url, RUN_PATH)
    }
}

#[async_trait::async_trait]
impl CapabilityProvider for HttpCapabilityProvider {
    async fn run(&self, agent: &AgentDescriptor, prompt: &Prompt) -> Result<EventStream> {
        let body = RunRequest {
            agent,
            prompt,
            stream: true,
        };
        let request_json =
            serde_json::to_string(&body).context("Failed to serialize provider run request")?;
        tracing::debug!("[HttpProvider] Request JSON: {}", request_json);

        let mut request_builder = self
            .client
            .post(self.run_url())
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");

        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }
        if let Some(sid) = &prompt.session_id {
            request_builder = request_builder.header("X-Session-Id", sid);
        }

        let response = request_builder
            .body(request_json)
            .send()
            .await
            .context("Failed to send run request to capability provider")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[HttpProvider] API error: {} - {}", status, error_text);
            anyhow::bail!("Capability provider error ({}): {}", status, error_text);
        }

        tracing::info!("[HttpProvider] Streaming response started for {}", agent.name);

        let byte_stream = response.bytes_stream();
        let stream_reader = StreamReader::new(
            byte_stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
        );
        let buf_reader = tokio::io::BufReader::new(stream_reader);

        let stream = async_stream::try_stream! {
            let mut lines = buf_reader.lines();

            while let Some(line) = lines.next_line().await? {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                let raw: RawProviderEvent = match serde_json::from_str(data) {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!("[HttpProvider] Failed to parse event: {}", e);
                        continue;
                    }
                };

                match raw {
                    RawProviderEvent::Event(event) => yield event,
                    RawProviderEvent::Error { error } => {
                        Err(anyhow::anyhow!("Capability provider stream error: {}", error))?;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_url_strips_trailing_slash() {
        let provider = HttpCapabilityProvider::new("http://localhost:9000/").unwrap();
        assert_eq!(provider.run_url(), "http://localhost:9000/v1/agents/run");
    }

    #[test]
    fn test_run_request_shape() {
        let registry = crate::agent::AgentRegistry::standard();
        let prompt = Prompt::new("hi", Vec::new()).with_session("s1");
        let body = RunRequest {
            agent: registry.entry(),
            prompt: &prompt,
            stream: true,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["agent"]["name"], "triage_agent");
        assert_eq!(value["prompt"]["input"], "hi");
        assert_eq!(value["prompt"]["session_id"], "s1");
    }
}
