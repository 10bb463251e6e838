//! affiliation-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) overlaid by the
//! process environment, opens the SQLite affiliation store and serves the
//! JSON API over HTTP.

mod config;
mod remotes;

use std::{
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use affil_api::AppState;
use affil_store_sqlite::SqliteStore;
use anyhow::Context as _;
use axum::{
  body::Body,
  http::{HeaderValue, Request},
};
use clap::Parser;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
  request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
  timeout::TimeoutLayer,
  trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Affiliation knowledge base server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Listen port; overrides `PORT`.
  #[arg(short, long)]
  port: Option<u16>,
}

/// Sequential `x-request-id` values, unique per process.
#[derive(Clone, Default)]
struct SequentialRequestId(Arc<AtomicU64>);

impl MakeRequestId for SequentialRequestId {
  fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
    let id = self.0.fetch_add(1, Ordering::Relaxed) + 1;
    HeaderValue::from_str(&format!("req-{id}")).ok().map(RequestId::new)
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  // Load configuration.
  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config).required(false))
    .add_source(::config::Environment::default().try_parsing(true))
    .build()
    .context("failed to read configuration")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  if let Some(port) = cli.port {
    server_cfg.port = port;
  }

  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(server_cfg.log_filter()?.into())
        .from_env_lossy(),
    )
    .init();

  for secret in server_cfg.secrets() {
    affil_core::redact::register(secret);
  }

  // Open SQLite store.
  let store_path = server_cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build application state.
  let state = AppState {
    store: Arc::new(store),
    index: remotes::contribution_index(&server_cfg)?,
    orgs:  remotes::organization_directory(&server_cfg)?,
    users: remotes::user_directory(&server_cfg)?,
  };

  let app = affil_api::api_router(state)
    .layer(TimeoutLayer::new(server_cfg.request_timeout()))
    .layer(ConcurrencyLimitLayer::new(server_cfg.max_inflight.max(1)))
    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
      let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
      tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        request_id = %request_id,
      )
    }))
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(SetRequestIdLayer::x_request_id(SequentialRequestId::default()));

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!(
    store = %store_path.display(),
    max_inflight = server_cfg.max_inflight,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    tracing::error!(%err, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
