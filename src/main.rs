mod config;
mod error;
mod intake;
mod lead;
mod message;
mod notifier;
mod rate_limit;
mod server;
mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::intake::LeadIntake;
use crate::server::AppState;
use crate::telegram::TelegramApi;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lead_relay=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // .env.local wins over .env; both are optional
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bind: {}", config.server.bind);
    info!("  Client IP header: {}", config.server.client_ip_header);
    info!("  Telegram API: {}", config.telegram.api_url);
    info!("  Message format: {}", config.telegram.message_format);
    info!("  Verify token: {}", config.telegram.verify_token);
    info!("  Send timeout: {}s", config.telegram.send_timeout_secs);
    info!(
        "  Cooldown: {}ms, max tracked clients: {}",
        config.rate_limit.cooldown_ms, config.rate_limit.max_clients
    );
    match config.telegram.delivery() {
        Ok(delivery) => info!("  Destinations: {}", delivery.chat_ids.len()),
        Err(_) => warn!("Telegram token or chat ids missing; every lead will be answered with a config error"),
    }

    let api = TelegramApi::from_config(&config.telegram)?;
    let state = AppState {
        client_ip_header: config.server.client_ip_header.clone(),
        intake: LeadIntake::new(&config, Arc::new(api)),
    };
    let app = server::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    info!("Lead relay listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
