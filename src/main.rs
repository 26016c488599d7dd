mod attachments;
mod config;
mod error;
mod handlers;
mod middleware;
mod signal_cli;
mod types;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use config::Config;
use handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();

    let mut config = Config::parse();

    tokio::fs::create_dir_all(&config.attachment_tmp_dir)
        .await
        .with_context(|| {
            format!(
                "creating attachment dir {}",
                config.attachment_tmp_dir.display()
            )
        })?;
    // signal-cli gets absolute attachment paths regardless of our cwd.
    config.attachment_tmp_dir = tokio::fs::canonicalize(&config.attachment_tmp_dir).await?;

    info!("signal-cli config dir: {}", config.signal_cli_config.display());
    info!("Attachment dir: {}", config.attachment_tmp_dir.display());
    if config.api_key.is_some() {
        info!("API key authentication enabled");
    }

    let state = Arc::new(AppState::from_config(&config));
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Started Signal Messenger REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
