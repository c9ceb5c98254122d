//! Per-client progress delivery.
//!
//! `ProgressChannel` owns the mapping from client id to the outbound queue
//! of that client's WebSocket task. All access goes through
//! register/unregister/send so that at most one entry exists per client id.
//!
//! Delivery is best-effort: a send to an unknown client is a no-op, and a
//! send whose queue has been closed removes that client from the registry.
//! Callers are free to ignore the returned [`Delivery`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use speedtest_common::protocol::{ServerMessage, TransferProgress};

/// Identifies one registration of a client id. A reconnect with the same id
/// gets a new session, so a stale socket task cannot evict its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

/// Outcome of a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the client's socket task.
    Sent,
    /// No channel registered under this id; nothing happened.
    NotRegistered,
    /// The channel was dead; the client has been unregistered.
    Dropped,
}

/// Live handle to a connected client.
struct ClientSession {
    session: SessionId,
    tx: mpsc::Sender<String>,
}

/// Registry of connected clients, cheap to clone.
#[derive(Clone, Default)]
pub struct ProgressChannel {
    inner: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    clients: DashMap<String, ClientSession>,
    next_session: AtomicU64,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tx` as the outbound queue for `client_id`.
    ///
    /// Replaces any existing entry for the same id without draining it; the
    /// replaced queue closes once its last sender is gone.
    pub fn register(&self, client_id: &str, tx: mpsc::Sender<String>) -> SessionId {
        let session = SessionId(self.inner.next_session.fetch_add(1, Ordering::Relaxed));
        let previous = self
            .inner
            .clients
            .insert(client_id.to_string(), ClientSession { session, tx });

        if previous.is_some() {
            tracing::info!(client_id = %client_id, "client reconnected, replacing previous channel");
        } else {
            tracing::info!(client_id = %client_id, "client connected");
        }
        session
    }

    /// Remove `client_id` regardless of which session holds it.
    pub fn unregister(&self, client_id: &str) -> bool {
        let removed = self.inner.clients.remove(client_id).is_some();
        if removed {
            tracing::info!(client_id = %client_id, "client disconnected");
        }
        removed
    }

    /// Remove `client_id` only if it is still held by `session`.
    pub fn release(&self, client_id: &str, session: SessionId) -> bool {
        let removed = self
            .inner
            .clients
            .remove_if(client_id, |_, entry| entry.session == session)
            .is_some();
        if removed {
            tracing::info!(client_id = %client_id, "client disconnected");
        }
        removed
    }

    /// Deliver `message` to one client.
    pub async fn send(&self, client_id: &str, message: &ServerMessage) -> Delivery {
        // Clone the handle out so no map guard is held across the await.
        let Some((session, tx)) = self
            .inner
            .clients
            .get(client_id)
            .map(|entry| (entry.session, entry.tx.clone()))
        else {
            return Delivery::NotRegistered;
        };

        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(client_id = %client_id, error = %e, "failed to serialize message");
                return Delivery::Dropped;
            }
        };

        self.deliver(client_id, session, &tx, json).await
    }

    /// Wrap `progress` in a progress message and send it.
    pub async fn send_progress(&self, client_id: &str, progress: TransferProgress) -> Delivery {
        self.send(client_id, &ServerMessage::progress(progress)).await
    }

    /// Deliver `message` to every registered client. Returns how many
    /// clients it reached; dead channels are unregistered along the way.
    pub async fn broadcast(&self, message: &ServerMessage) -> usize {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize broadcast");
                return 0;
            }
        };

        let targets: Vec<(String, SessionId, mpsc::Sender<String>)> = self
            .inner
            .clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.session, entry.tx.clone()))
            .collect();

        let mut delivered = 0;
        for (client_id, session, tx) in targets {
            if self.deliver(&client_id, session, &tx, json.clone()).await == Delivery::Sent {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of registered clients.
    pub fn count(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn is_open(&self, client_id: &str) -> bool {
        self.inner
            .clients
            .get(client_id)
            .is_some_and(|entry| !entry.tx.is_closed())
    }

    async fn deliver(
        &self,
        client_id: &str,
        session: SessionId,
        tx: &mpsc::Sender<String>,
        json: String,
    ) -> Delivery {
        if tx.send(json).await.is_ok() {
            return Delivery::Sent;
        }
        tracing::warn!(client_id = %client_id, "channel closed, unregistering client");
        self.release(client_id, session);
        Delivery::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedtest_common::protocol::ThroughputProgress;

    fn sample_progress() -> TransferProgress {
        TransferProgress::Upload(ThroughputProgress {
            progress_percent: 25.0,
            speed_mbps: 100.0,
            bytes_transferred: 1024,
            elapsed_seconds: 0.1,
        })
    }

    #[tokio::test]
    async fn send_to_unknown_client_is_noop() {
        let channel = ProgressChannel::new();
        let delivery = channel.send_progress("nobody", sample_progress()).await;
        assert_eq!(delivery, Delivery::NotRegistered);
        assert_eq!(channel.count(), 0);
        assert!(!channel.is_open("nobody"));
    }

    #[tokio::test]
    async fn send_reaches_registered_client() {
        let channel = ProgressChannel::new();
        let (tx, mut rx) = mpsc::channel(8);
        channel.register("alice", tx);

        assert!(channel.is_open("alice"));
        assert_eq!(
            channel.send_progress("alice", sample_progress()).await,
            Delivery::Sent
        );

        let json: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"]["test_type"], "upload");
    }

    #[tokio::test]
    async fn failed_send_unregisters_client() {
        let channel = ProgressChannel::new();
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);
        channel.register("alice", tx_a);
        channel.register("bob", tx_b);
        assert_eq!(channel.count(), 2);

        // Simulate the socket task going away.
        drop(rx_a);
        assert!(!channel.is_open("alice"));

        let delivery = channel.send_progress("alice", sample_progress()).await;
        assert_eq!(delivery, Delivery::Dropped);
        assert_eq!(channel.count(), 1);
        assert!(channel.is_open("bob"));

        // A second send is now a no-op.
        assert_eq!(
            channel.send_progress("alice", sample_progress()).await,
            Delivery::NotRegistered
        );
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_entry() {
        let channel = ProgressChannel::new();
        let (old_tx, mut old_rx) = mpsc::channel(8);
        let (new_tx, mut new_rx) = mpsc::channel(8);

        let old_session = channel.register("alice", old_tx);
        let new_session = channel.register("alice", new_tx);
        assert_ne!(old_session, new_session);
        assert_eq!(channel.count(), 1);

        channel.send_progress("alice", sample_progress()).await;
        assert!(new_rx.recv().await.is_some());
        // The replaced queue lost its only sender.
        assert!(old_rx.recv().await.is_none());

        // The stale session cannot evict its replacement.
        assert!(!channel.release("alice", old_session));
        assert!(channel.is_open("alice"));
        assert!(channel.release("alice", new_session));
        assert_eq!(channel.count(), 0);
    }

    #[tokio::test]
    async fn broadcast_skips_dead_clients() {
        let channel = ProgressChannel::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(8);
        let (tx_c, mut rx_c) = mpsc::channel(8);
        channel.register("a", tx_a);
        channel.register("b", tx_b);
        channel.register("c", tx_c);
        drop(rx_b);

        let delivered = channel
            .broadcast(&ServerMessage::progress(sample_progress()))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(channel.count(), 2);
        assert!(!channel.is_open("b"));
        assert!(rx_a.recv().await.is_some());
        assert!(rx_c.recv().await.is_some());
    }

    #[test]
    fn unregister_is_idempotent() {
        let channel = ProgressChannel::new();
        let (tx, _rx) = mpsc::channel(1);
        channel.register("alice", tx);
        assert!(channel.unregister("alice"));
        assert!(!channel.unregister("alice"));
        assert_eq!(channel.count(), 0);
    }
}
