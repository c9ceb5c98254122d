//! Round-trip latency probing.
//!
//! Issues a fixed number of sequential probes against a liveness endpoint,
//! timing each one. A failed or timed-out probe is recorded as lost and the
//! loop carries on. Progress is pushed after every probe; the aggregate
//! result is pushed as a final message and also returned to the caller.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use speedtest_common::models::{LatencyResult, LatencySample};
use speedtest_common::protocol::{LatencyProgress, ServerMessage, TransferProgress};
use speedtest_common::stats::{progress_percent, round2};

use crate::config::LatencyConfig;
use crate::progress::ProgressChannel;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

// ── Probe target ────────────────────────────────────────────────────

/// A single round trip to the timing target.
pub trait LivenessProbe: Send + Sync {
    fn probe(&self) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// Probes a liveness URL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Result<Self, ProbeError> {
        // Loopback probes must not be routed through an environment proxy.
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl LivenessProbe for HttpProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }
        // Read the body so the whole exchange is inside the timing window.
        response.bytes().await?;
        Ok(())
    }
}

// ── Runner ──────────────────────────────────────────────────────────

pub struct LatencyProbe<P> {
    target: P,
    samples: usize,
    timeout: Duration,
    pause: Duration,
    progress: ProgressChannel,
}

impl<P: LivenessProbe> LatencyProbe<P> {
    pub fn new(target: P, config: &LatencyConfig, progress: ProgressChannel) -> Self {
        Self {
            target,
            samples: config.samples.get(),
            timeout: config.timeout,
            pause: config.pause,
            progress,
        }
    }

    pub fn target(&self) -> &P {
        &self.target
    }

    /// Run the full probe sequence for `client_id`.
    pub async fn run(&self, client_id: &str) -> LatencyResult {
        tracing::info!(client_id = %client_id, samples = self.samples, "latency test started");
        let mut samples = Vec::with_capacity(self.samples);

        for index in 1..=self.samples {
            let (sample, error) = match self.probe_once().await {
                Ok(latency_ms) => (LatencySample::Reply { latency_ms }, None),
                Err(e) => {
                    tracing::debug!(client_id = %client_id, sample = index, error = %e, "probe failed");
                    (LatencySample::Lost, Some(format!("Ping {index} failed: {e}")))
                }
            };
            samples.push(sample);

            let update = sample_progress(index, self.samples, sample, error);
            let _ = self.progress.send_progress(client_id, update).await;

            if index < self.samples {
                tokio::time::sleep(self.pause).await;
            }
        }

        let result = LatencyResult::from_samples(&samples);
        tracing::info!(
            client_id = %client_id,
            avg_ms = result.avg_latency_ms,
            jitter_ms = result.jitter_ms,
            loss_percent = result.packet_loss_percent,
            "latency test completed"
        );

        let _ = self
            .progress
            .send(client_id, &ServerMessage::latency_completed(result.clone()))
            .await;
        result
    }

    /// One timed round trip, in milliseconds.
    async fn probe_once(&self) -> Result<f64, ProbeError> {
        let started = Instant::now();
        match tokio::time::timeout(self.timeout, self.target.probe()).await {
            Ok(Ok(())) => Ok(started.elapsed().as_secs_f64() * 1000.0),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

/// Progress after probe `index` of `total`.
fn sample_progress(
    index: usize,
    total: usize,
    sample: LatencySample,
    error: Option<String>,
) -> TransferProgress {
    TransferProgress::Latency(LatencyProgress {
        progress_percent: progress_percent(index as u64, total as u64),
        current_sample_latency_ms: sample.latency_ms().map(round2),
        sample: index,
        total_samples: total,
        error,
    })
}
