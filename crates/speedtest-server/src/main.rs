//! Network speed test server
//!
//! Single binary that runs:
//! - Download/upload throughput endpoints with live progress
//! - WebSocket session channel and server-side latency probing
//! - Static file serving for the browser frontend

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use speedtest_server::config::{ConfigInput, ServerConfig};
use speedtest_server::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "speedtest-server", about = "Network speed test server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// Directory holding the frontend (index.html, script.js, ...).
    #[arg(long, env = "STATIC_DIR", default_value = "frontend")]
    static_dir: PathBuf,

    /// Optional TOML config file.
    #[arg(long, env = "SPEEDTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Largest accepted download/upload size in MiB.
    #[arg(long)]
    max_size_mb: Option<u64>,

    /// URL timed by latency tests.
    #[arg(long, env = "SPEEDTEST_LATENCY_TARGET")]
    latency_target: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut input = match &self.config {
            Some(path) => ConfigInput::load(path)?,
            None => ConfigInput::default(),
        };
        if self.max_size_mb.is_some() {
            input.throughput.max_size_mb = self.max_size_mb;
        }
        if self.latency_target.is_some() {
            input.latency.target_url = self.latency_target;
        }
        Ok(input.resolve(self.listen, self.static_dir)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ──────────────────────────────────────────────────
    let config = Cli::parse().into_config()?;
    tracing::info!(
        chunk_size = config.throughput.chunk_size.get(),
        max_size_mb = config.throughput.max_size_mb,
        latency_target = %config.latency.target_url,
        latency_samples = config.latency.samples.get(),
        "configuration loaded"
    );

    // ── Shared state ────────────────────────────────────────────
    let addr = config.listen;
    let static_dir = config.static_dir.clone();
    let state = AppState::new(config).context("failed to build latency probe client")?;

    // ── Router ──────────────────────────────────────────────────
    let index = ServeFile::new(static_dir.join("index.html"));
    let frontend = ServeDir::new(&static_dir).not_found_service(index);

    let app = Router::new()
        .merge(speedtest_server::app(state))
        .nest_service("/static", ServeDir::new(&static_dir))
        .fallback_service(frontend)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // ── Listen ──────────────────────────────────────────────────
    tracing::info!("speedtest-server listening on {addr}");
    if addr.ip().is_unspecified() {
        tracing::info!("local access: http://127.0.0.1:{}", addr.port());
    }
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
