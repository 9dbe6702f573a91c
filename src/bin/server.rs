//! Polymarket Claimer Web Server
//!
//! Status/admin API plus the auto-claim scheduler.

use anyhow::Result;
use polymarket_claimer::api::{create_app, AppState};
use polymarket_claimer::Config;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Default to warn, claim activity at info. Override with RUST_LOG.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,polymarket_claimer=info,tower_http=warn")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let port = config.server_port;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║       POLYMARKET CLAIMER - WEB SERVER                         ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Redeem path: {:<46} ║", config.execution_strategy().name());
    println!("║  Wallet: {:<51} ║", config.wallet_address.as_deref().unwrap_or("NOT SET"));
    println!("║  Admin token: {:<46} ║", if config.admin_token.is_some() { "REQUIRED" } else { "OPEN" });
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    if !config.can_claim() {
        tracing::warn!("Signing key or wallet address missing, claim runs will fail until configured");
    }

    info!("Initializing application state...");
    let state = AppState::new(config).await?;

    let scheduler = state.claims.clone();
    tokio::spawn(async move {
        scheduler.run_scheduler().await;
    });

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    println!();
    println!("  API:    http://localhost:{}/api/claims/status", port);
    println!("  Health: http://localhost:{}/health", port);
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
