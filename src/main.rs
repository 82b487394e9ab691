mod aggregator;
mod api;
mod config;
mod gitlab_ops;
mod gitlab_rest;
mod gitlab_types;
mod merge;
mod models;
mod render;
mod state;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::gitlab_rest::GitlabRestClient;
use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        info!("No .env loaded: {}", e);
    }

    // Missing url/token/username stops us here, before any request is served.
    let config = Config::new()
        .inspect_err(|e| error!("Invalid configuration: {}", e))
        .context("Failed to load config")?;
    let config = Arc::new(config);

    let fetcher = GitlabRestClient::from_config(&config.gitlab)
        .context("Failed to create GitLab client")?;
    let aggregator = Aggregator::new(Arc::new(fetcher), &config.gitlab);

    info!(
        "Dashboard for {} on {} ({} teammates)",
        config.gitlab.username,
        config.gitlab.url,
        config.gitlab.teammates.len()
    );

    let state = AppState {
        config: config.clone(),
        aggregator: Arc::new(aggregator),
    };

    // Start Web Server
    let app = api::app_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server running on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
