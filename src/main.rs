//! Lingo backend entry point.
//!
//! Important env variables:
//!   PORT                   : u16 (default 5000)
//!   STATIC_DIR             : built web client (default ./static)
//!   APP_CONFIG_PATH        : path to TOML config (server, storage, prompts)
//!   STORAGE_BACKEND        : "memory" (default) or "firestore"; USE_FIREBASE=true also selects Firestore
//!   FIREBASE_PROJECT_ID    : Firestore project
//!   FIREBASE_ACCESS_TOKEN  : bearer token for Firestore REST calls
//!   FIRESTORE_EMULATOR_HOST: talk to a local emulator instead
//!   OPENAI_API_KEY         : enables OpenAI integration if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_MODEL           : default "gpt-4o"
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use lingo_backend::config::AppConfig;
use lingo_backend::routes::build_router;
use lingo_backend::state::AppState;
use lingo_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::load();

  // Shared state: storage backend, prompts, optional OpenAI client.
  let state = Arc::new(AppState::from_config(&cfg)?);
  state.seed().await?;

  let app = build_router(state.clone(), &cfg.server.static_dir);

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "lingo_backend", %addr, backend = state.storage.backend_name(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "lingo_backend", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "lingo_backend", "Shutdown signal received");
}
