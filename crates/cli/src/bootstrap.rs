//! Wiring: builds the store, the model provider, the MCP client and the
//! turn orchestrator from the loaded configuration.

use std::sync::Arc;

use anyhow::Context;

use lc_domain::config::Config;
use lc_mcp_client::McpClient;
use lc_providers::OpenAiCompatProvider;
use lc_runtime::{OrchestratorDeps, TurnOptions, TurnOrchestrator};
use lc_store::{SqliteMessageStore, TranscriptCache};

pub struct App {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub mcp: Arc<McpClient>,
    pub store: Arc<SqliteMessageStore>,
}

impl App {
    pub async fn shutdown(&self) {
        self.mcp.shutdown().await;
        self.store.close().await;
    }
}

pub async fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteMessageStore>> {
    let store = SqliteMessageStore::open(&config.store.path)
        .await
        .with_context(|| format!("opening message store {}", config.store.path))?;
    Ok(Arc::new(store))
}

/// Build everything a chat turn needs and load the stored transcript.
///
/// An unreachable MCP server is not fatal: the chat runs without tools.
pub async fn build_app(config: &Config) -> anyhow::Result<App> {
    let store = open_store(config).await?;
    let provider = OpenAiCompatProvider::from_config(&config.llm)
        .context("configuring the model provider")?;
    let mcp = Arc::new(McpClient::connect_or_empty(&config.mcp).await);

    let orchestrator = TurnOrchestrator::new(
        OrchestratorDeps {
            provider: Arc::new(provider),
            tools: mcp.clone(),
            store: store.clone(),
        },
        Arc::new(TranscriptCache::new()),
    )
    .with_options(TurnOptions::from(&config.llm));

    let tools = orchestrator.load_tools().await;
    let messages = orchestrator
        .hydrate()
        .await
        .context("loading the stored conversation")?;
    tracing::info!(
        store = %config.store.path,
        model = %config.llm.model,
        tools,
        messages,
        "localchat ready"
    );

    Ok(App {
        orchestrator: Arc::new(orchestrator),
        mcp,
        store,
    })
}
