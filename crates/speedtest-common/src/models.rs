//! Result models for completed tests.
//!
//! These are the values returned synchronously to the request that ran a
//! test and carried in the final message pushed over the session channel.

use serde::{Deserialize, Serialize};

use crate::rating::Rating;
use crate::stats::{self, round2};

// ── Test kinds ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Download,
    Upload,
    Latency,
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestType::Download => write!(f, "download"),
            TestType::Upload => write!(f, "upload"),
            TestType::Latency => write!(f, "latency"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Completed,
}

// ── Latency ─────────────────────────────────────────────────────────

/// Outcome of a single round-trip probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencySample {
    /// The probe returned; round trip took `latency_ms`.
    Reply { latency_ms: f64 },
    /// The probe timed out or failed in transport.
    Lost,
}

impl LatencySample {
    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            LatencySample::Reply { latency_ms } => Some(*latency_ms),
            LatencySample::Lost => None,
        }
    }
}

/// Aggregate statistics over one latency run.
///
/// All millisecond figures are rounded to two decimals. With no successful
/// samples every figure is zero and packet loss is 100%.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyResult {
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub avg_latency_ms: f64,
    /// Population standard deviation of the successful samples.
    pub jitter_ms: f64,
    /// Failed probes as a percentage of all probes issued.
    pub packet_loss_percent: f64,
    pub successful_pings: usize,
    pub failed_pings: usize,
    pub total_samples: usize,
    /// Successful latencies in issue order.
    pub all_latencies: Vec<f64>,
    /// Rating of the average latency; absent when nothing came back.
    pub rating: Option<Rating>,
}

impl LatencyResult {
    /// Compute statistics from samples given in issue order.
    pub fn from_samples(samples: &[LatencySample]) -> Self {
        let latencies: Vec<f64> = samples.iter().filter_map(LatencySample::latency_ms).collect();
        let total = samples.len();
        let failed = total - latencies.len();

        let packet_loss_percent = if latencies.is_empty() {
            100.0
        } else {
            failed as f64 / total as f64 * 100.0
        };

        let (min, max, avg, jitter) = match (
            stats::mean(&latencies),
            stats::population_std_dev(&latencies),
        ) {
            (Some(avg), Some(jitter)) => {
                let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
                let max = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max, avg, jitter)
            }
            _ => (0.0, 0.0, 0.0, 0.0),
        };

        let avg_latency_ms = round2(avg);
        Self {
            min_latency_ms: round2(min),
            max_latency_ms: round2(max),
            avg_latency_ms,
            jitter_ms: round2(jitter),
            packet_loss_percent,
            successful_pings: latencies.len(),
            failed_pings: failed,
            total_samples: total,
            rating: (!latencies.is_empty()).then(|| Rating::latency(avg_latency_ms)),
            all_latencies: latencies.into_iter().map(round2).collect(),
        }
    }
}

// ── Upload ──────────────────────────────────────────────────────────

/// Synchronous result of an upload test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    /// True byte count received, never clamped to the declared size.
    pub bytes_received: u64,
    #[serde(rename = "elapsed_time")]
    pub elapsed_seconds: f64,
    pub speed_mbps: f64,
    pub status: TestStatus,
    pub rating: Rating,
}

impl UploadReport {
    pub fn new(bytes_received: u64, elapsed_seconds: f64) -> Self {
        let speed_mbps = stats::speed_mbps(bytes_received, elapsed_seconds);
        Self {
            bytes_received,
            elapsed_seconds,
            speed_mbps,
            status: TestStatus::Completed,
            rating: Rating::throughput(speed_mbps),
        }
    }
}
