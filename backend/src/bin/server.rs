//! Site Explorer HTTP Server Binary
//!
//! Main entry point for the site explorer REST API. Loads configuration, connects the
//! remote gateway, sets up the HTTP router and starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin site-explorer-server
//!
//! # Point at a different extraction/imagery backend
//! GATEWAY_URL=http://gee-backend:5000 cargo run --bin site-explorer-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `GATEWAY_URL`: Remote backend base URL (default: http://localhost:5000)
//! - `GATEWAY_TIMEOUT_SECS`: Transport timeout for backend calls (default: none)
//! - `RUST_LOG`: Log level (default: info)
//!
//! Settings can also be placed in `site_explorer.toml`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use site_explorer::config::AppConfig;
use site_explorer::http::{create_router_with_limit, AppState};
use site_explorer::services::{ActionSettings, HttpGateway, RemoteGateway, SiteSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Site Explorer HTTP Server");

    let config = AppConfig::load()?;

    let gateway = HttpGateway::from_config(&config.gateway)?;
    info!(
        base_url = %gateway.base_url(),
        timeout_secs = ?config.gateway.timeout_secs,
        "Remote gateway configured"
    );

    let session = SiteSession::new(
        Arc::new(gateway) as Arc<dyn RemoteGateway>,
        ActionSettings::from(&config.actions),
    );
    let state = AppState::new(session);
    let app = create_router_with_limit(state, config.server.body_limit_bytes());

    let addr: SocketAddr = config.server.bind_address().parse()?;

    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
