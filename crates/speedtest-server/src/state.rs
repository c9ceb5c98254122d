//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::latency::{HttpProbe, LatencyProbe, ProbeError};
use crate::progress::ProgressChannel;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    /// Connected WebSocket clients, keyed by client id.
    progress: ProgressChannel,
    latency: LatencyProbe<HttpProbe>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, ProbeError> {
        let progress = ProgressChannel::new();
        let target = HttpProbe::new(config.latency.target_url.clone())?;
        let latency = LatencyProbe::new(target, &config.latency, progress.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                progress,
                latency,
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.inner.progress
    }

    pub fn latency(&self) -> &LatencyProbe<HttpProbe> {
        &self.inner.latency
    }
}
