mod commands;
mod config;
mod format;
mod llm;
mod platform;
mod router;
mod sender;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::llm::LlmClient;
use crate::sender::WhatsAppClient;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,whatsapp_router=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Provider: {}", config.llm.provider);
    info!("  Model: {}", config.llm.model);
    info!("  Send endpoint: {}", config.whatsapp.messages_url());
    info!(
        "  Signature checks: {}",
        if config.whatsapp.app_secret.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let state = Arc::new(AppState {
        verify_token: config.whatsapp.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
        generator: Arc::new(LlmClient::new(config.llm.clone())),
        sender: Arc::new(WhatsAppClient::new(&config.whatsapp)),
    });

    server::run(state, &config.server.bind_address).await
}
