//! Network speed test server library.
//!
//! Re-exports the measurement core (progress channel, throughput generator
//! and consumer, latency probe), the HTTP/WebSocket routes and the shared
//! state so they can be exercised by integration tests.

pub mod api;
pub mod config;
pub mod consumer;
pub mod generator;
pub mod latency;
pub mod progress;
pub mod state;
pub mod ws_session;

use axum::Router;
use axum::routing::get;

/// Application routes without static assets or middleware layers.
pub fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(api::router())
        .route("/ws/{client_id}", get(ws_session::handler))
        .with_state(state)
}
