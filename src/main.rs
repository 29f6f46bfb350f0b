use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use shadow_orchestrator::approval::InMemoryPendingStore;
use shadow_orchestrator::core::ProviderKind;
use shadow_orchestrator::credits::InMemoryCreditLedger;
use shadow_orchestrator::llm::{CapabilityProvider, HttpCapabilityProvider, ScriptedProvider};
use shadow_orchestrator::logging;
use shadow_orchestrator::server::{self, AppState};
use shadow_orchestrator::session::{FileSessionStore, InMemorySessionStore, SessionStore};
use shadow_orchestrator::{Orchestrator, OrchestratorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = OrchestratorConfig::from_env()?;
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    tracing::info!("=== Orchestrator Starting ===");
    tracing::info!(
        "[Config] Provider: {}, stream timeout: {:?}, bind address: {}",
        config.provider_label(),
        config.stream_timeout,
        config.bind_addr
    );

    let provider: Arc<dyn CapabilityProvider> = match &config.provider {
        ProviderKind::Http { base_url, api_key } => {
            let mut provider = HttpCapabilityProvider::new(base_url)?;
            if let Some(key) = api_key {
                provider = provider.with_api_key(key);
            }
            Arc::new(provider)
        }
        ProviderKind::Scripted => {
            tracing::warn!("No provider URL configured, using the scripted echo provider");
            Arc::new(ScriptedProvider::new())
        }
    };

    let sessions: Arc<dyn SessionStore> = match &config.sessions_dir {
        Some(dir) => {
            tracing::info!("Storing sessions in {}", dir.display());
            Arc::new(FileSessionStore::with_dir(dir))
        }
        None => Arc::new(InMemorySessionStore::new()),
    };

    let ledger = Arc::new(InMemoryCreditLedger::new(config.default_balance));
    let shutdown = CancellationToken::new();

    let orchestrator = Orchestrator::new(
        &config,
        provider,
        sessions,
        ledger,
        Arc::new(InMemoryPendingStore::new()),
    )
    .with_shutdown(shutdown.clone());

    let app = server::router(AppState::new(Arc::new(orchestrator)));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        signal.cancel();
    });

    server::serve(app, &config.bind_addr, shutdown).await?;

    tracing::info!("=== Orchestrator Shut Down ===");
    Ok(())
}
