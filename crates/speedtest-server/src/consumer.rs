//! Upload data consumer.
//!
//! Reads an inbound byte stream to exhaustion, counting bytes and reporting
//! running throughput after every received chunk. Progress is measured
//! against the declared size and clamped to 100%; the returned byte count is
//! the true total.

use futures::{Stream, StreamExt};
use tokio::time::Instant;

use speedtest_common::models::UploadReport;
use speedtest_common::protocol::{ThroughputProgress, TransferProgress};
use speedtest_common::stats::{format_bytes, progress_percent, speed_mbps};

use crate::progress::ProgressChannel;

pub struct ThroughputConsumer {
    declared_bytes: u64,
    client_id: Option<String>,
    progress: ProgressChannel,
}

impl ThroughputConsumer {
    pub fn new(declared_bytes: u64, client_id: Option<String>, progress: ProgressChannel) -> Self {
        Self {
            declared_bytes,
            client_id,
            progress,
        }
    }

    /// Drain `body`, returning the final figures once it ends. An error item
    /// aborts the read and is returned as-is.
    pub async fn consume<S, B, E>(self, body: S) -> Result<UploadReport, E>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
    {
        let started = Instant::now();
        let mut received: u64 = 0;
        let mut body = std::pin::pin!(body);

        while let Some(chunk) = body.next().await {
            received += chunk?.as_ref().len() as u64;

            if let Some(client_id) = self.client_id.as_deref() {
                let elapsed = started.elapsed().as_secs_f64();
                let update = TransferProgress::Upload(ThroughputProgress {
                    progress_percent: progress_percent(received, self.declared_bytes),
                    speed_mbps: speed_mbps(received, elapsed),
                    bytes_transferred: received,
                    elapsed_seconds: elapsed,
                });
                let _ = self.progress.send_progress(client_id, update).await;
            }
        }

        let report = UploadReport::new(received, started.elapsed().as_secs_f64());
        tracing::info!(
            received = %format_bytes(report.bytes_received),
            declared = %format_bytes(self.declared_bytes),
            speed_mbps = report.speed_mbps,
            "upload test completed"
        );
        Ok(report)
    }
}
