//! WebSocket protocol messages between the browser and the server.
//!
//! Server → client messages are either incremental progress
//! (`{"type": "progress", "data": {...}}`) or a final result
//! (`{"type": "result", "test_type": "latency", "status": "completed", ...}`).
//! Client → server messages are commands (`{"type": "start_test", ...}`).

use serde::{Deserialize, Serialize};

use crate::models::{LatencyResult, TestStatus, TestType};

// ── Server → Client ─────────────────────────────────────────────────

/// All message types the server pushes over a session channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Incremental update emitted after every chunk or probe.
    Progress { data: TransferProgress },
    /// Final summary of a test run driven over the channel.
    Result(LatencyCompletion),
}

impl ServerMessage {
    pub fn progress(data: TransferProgress) -> Self {
        ServerMessage::Progress { data }
    }

    pub fn latency_completed(results: LatencyResult) -> Self {
        ServerMessage::Result(LatencyCompletion {
            test_type: TestType::Latency,
            status: TestStatus::Completed,
            results,
        })
    }

    /// Encode for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyCompletion {
    pub test_type: TestType,
    pub status: TestStatus,
    pub results: LatencyResult,
}

/// Progress of a running test, tagged by test type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "test_type", rename_all = "snake_case")]
pub enum TransferProgress {
    Download(ThroughputProgress),
    Upload(ThroughputProgress),
    Latency(LatencyProgress),
}

/// Running figures of a download or upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputProgress {
    /// Percentage of the declared size, in `[0, 100]`.
    #[serde(rename = "progress")]
    pub progress_percent: f64,
    pub speed_mbps: f64,
    pub bytes_transferred: u64,
    #[serde(rename = "elapsed_time")]
    pub elapsed_seconds: f64,
}

/// State after one latency probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyProgress {
    #[serde(rename = "progress")]
    pub progress_percent: f64,
    /// This probe's own round trip; `null` when the probe failed.
    #[serde(rename = "current_ping")]
    pub current_sample_latency_ms: Option<f64>,
    /// 1-based index of the probe just completed.
    pub sample: usize,
    pub total_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Client → Server ─────────────────────────────────────────────────

fn default_size_mb() -> u64 {
    10
}

/// Commands a client may send over its session channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartTest {
        test_type: TestType,
        #[serde(default = "default_size_mb")]
        size_mb: u64,
    },
}

impl ClientCommand {
    /// Decode a text frame. Anything that is not a known command is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
