//! Citiverse - mail/OTP service process
//!
//! Opens the database, then serves the signup code endpoints until
//! interrupted.

use std::path::Path;

use citiverse_app::config::CONFIG_FILE;
use citiverse_app::{AppConfig, AppState};
use citiverse_net::OtpServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Citiverse");

    if let Err(e) = run().await {
        tracing::error!("Citiverse failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> citiverse_app::Result<()> {
    let config = AppConfig::load(Path::new(CONFIG_FILE))?;
    let state = AppState::new(&config)?;

    let server = OtpServer::start(config.server_config(), config.mailer()?).await?;
    tracing::info!(addr = %server.addr(), "Listening");

    if let Err(e) = state.otp.warmup().await {
        tracing::warn!(error = %e, "Warmup probe failed");
    }

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    tracing::info!("Stopped");
    Ok(())
}
