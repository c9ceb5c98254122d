//! Download data generator.
//!
//! Produces `total_bytes` of fresh random data as a lazy stream of chunks.
//! After each chunk it reports running throughput to the requesting client's
//! progress channel (if a client id was supplied). The stream is finite and
//! not restartable; a dropped or failed progress delivery never interrupts it.

use std::convert::Infallible;
use std::num::NonZeroUsize;

use bytes::Bytes;
use futures::Stream;
use rand::Rng;
use tokio::time::Instant;

use speedtest_common::protocol::{ThroughputProgress, TransferProgress};
use speedtest_common::stats::{progress_percent, speed_mbps};

use crate::progress::ProgressChannel;

/// Chunk lengths that add up to exactly `total` bytes.
///
/// Every chunk is `chunk_size` long except the last, which carries the
/// remainder when `total` is not a multiple of `chunk_size`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    remaining: u64,
    chunk_size: NonZeroUsize,
}

impl ChunkPlan {
    pub fn new(total: u64, chunk_size: NonZeroUsize) -> Self {
        Self {
            remaining: total,
            chunk_size,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(self.chunk_size.get() as u64);
        self.remaining -= len;
        Some(len as usize)
    }
}

pub struct ThroughputGenerator {
    total_bytes: u64,
    chunk_size: NonZeroUsize,
    client_id: Option<String>,
    progress: ProgressChannel,
}

impl ThroughputGenerator {
    pub fn new(
        total_bytes: u64,
        chunk_size: NonZeroUsize,
        client_id: Option<String>,
        progress: ProgressChannel,
    ) -> Self {
        Self {
            total_bytes,
            chunk_size,
            client_id,
            progress,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Consume the generator into its chunk stream. The clock starts when the
    /// first chunk is requested.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let state = StreamState {
            plan: ChunkPlan::new(self.total_bytes, self.chunk_size),
            total_bytes: self.total_bytes,
            sent: 0,
            started: None,
            client_id: self.client_id,
            progress: self.progress,
        };

        futures::stream::unfold(state, |mut state| async move {
            let len = state.plan.next()?;
            let started = *state.started.get_or_insert_with(Instant::now);

            let mut chunk = vec![0u8; len];
            rand::rng().fill_bytes(&mut chunk);
            state.sent += len as u64;

            if let Some(client_id) = state.client_id.as_deref() {
                let elapsed = started.elapsed().as_secs_f64();
                let update = TransferProgress::Download(ThroughputProgress {
                    progress_percent: progress_percent(state.sent, state.total_bytes),
                    speed_mbps: speed_mbps(state.sent, elapsed),
                    bytes_transferred: state.sent,
                    elapsed_seconds: elapsed,
                });
                let _ = state.progress.send_progress(client_id, update).await;
            }

            tracing::trace!(sent = state.sent, total = state.total_bytes, "download chunk");
            Some((Ok(Bytes::from(chunk)), state))
        })
    }
}

struct StreamState {
    plan: ChunkPlan,
    total_bytes: u64,
    sent: u64,
    started: Option<Instant>,
    client_id: Option<String>,
    progress: ProgressChannel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    proptest! {
        #[test]
        fn plan_sums_to_total(total in 0u64..1_000_000, chunk in 1usize..65_536) {
            let sizes: Vec<usize> = ChunkPlan::new(total, nz(chunk)).collect();
            prop_assert_eq!(sizes.iter().map(|&s| s as u64).sum::<u64>(), total);

            let remainder = (total % chunk as u64) as usize;
            if let Some(&last) = sizes.last() {
                if remainder == 0 {
                    prop_assert!(sizes.iter().all(|&s| s == chunk));
                } else {
                    prop_assert_eq!(last, remainder);
                    prop_assert!(sizes[..sizes.len() - 1].iter().all(|&s| s == chunk));
                }
            } else {
                prop_assert_eq!(total, 0);
            }
        }
    }

    #[test]
    fn plan_with_exact_multiple() {
        let sizes: Vec<usize> = ChunkPlan::new(3 * 1024, nz(1024)).collect();
        assert_eq!(sizes, vec![1024, 1024, 1024]);
    }

    #[tokio::test]
    async fn stream_yields_exact_byte_count() {
        let generator = ThroughputGenerator::new(10_000, nz(4096), None, ProgressChannel::new());
        let chunks: Vec<Bytes> = generator
            .into_stream()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        let lengths: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(lengths, vec![4096, 4096, 1808]);
    }

    #[tokio::test]
    async fn chunks_are_not_reused() {
        let generator = ThroughputGenerator::new(2 * 4096, nz(4096), None, ProgressChannel::new());
        let chunks: Vec<Bytes> = generator
            .into_stream()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_ne!(chunks[0], chunks[1]);
    }

    #[tokio::test]
    async fn reports_progress_per_chunk() {
        let progress = ProgressChannel::new();
        let (tx, mut rx) = mpsc::channel(16);
        progress.register("dl", tx);

        let generator = ThroughputGenerator::new(3000, nz(1000), Some("dl".into()), progress);
        let total: usize = generator
            .into_stream()
            .map(|chunk| chunk.unwrap().len())
            .fold(0, |acc, n| async move { acc + n })
            .await;
        assert_eq!(total, 3000);

        let mut seen = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(json["data"]["test_type"], "download");
            seen.push(json["data"]["bytes_transferred"].as_u64().unwrap());
        }
        assert_eq!(seen, vec![1000, 2000, 3000]);
    }

    #[tokio::test]
    async fn closed_channel_does_not_abort_stream() {
        let progress = ProgressChannel::new();
        let (tx, rx) = mpsc::channel(16);
        progress.register("gone", tx);
        drop(rx);

        let generator =
            ThroughputGenerator::new(5000, nz(1000), Some("gone".into()), progress.clone());
        let chunks = generator.into_stream().count().await;

        assert_eq!(chunks, 5);
        assert!(!progress.is_open("gone"));
        assert_eq!(progress.count(), 0);
    }

    #[tokio::test]
    async fn empty_download_yields_nothing() {
        let generator = ThroughputGenerator::new(0, nz(1024), None, ProgressChannel::new());
        assert_eq!(generator.into_stream().count().await, 0);
    }
}
