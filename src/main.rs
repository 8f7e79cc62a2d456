//! SQL Quest · Game Backend
//!
//! - Answer validation (normalizer + matcher) and per-level challenge sessions
//! - Persistent campaign progression (lives, skips, completed levels)
//! - Axum HTTP + WebSocket API, static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   QUEST_CONFIG_PATH : path to TOML config (game settings + optional campaign)
//!   QUEST_DATA_DIR    : directory for saved progress (default ./data)
//!   QUEST_STORAGE     : "file" (default) or "memory"
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use sql_quest_backend::routes::build_router;
use sql_quest_backend::state::AppState;
use sql_quest_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Composition root: campaign, progression store, settings.
  let state = Arc::new(AppState::new()?);
  state.expire_restored_hint().await;

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "sql_quest", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "sql_quest", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "sql_quest", "Shutdown requested");
}
