//! # Offline Write Queue
//!
//! Offline-first submission of opaque write payloads with durable queuing
//! and ordered replay when connectivity returns.
//!
//! ## Architecture
//!
//! The offline system consists of:
//! - **Outbox**: persistent FIFO of payloads not yet confirmed delivered
//! - **Dispatcher**: drains the outbox in order through the delivery handler
//! - **Connectivity Watcher**: turns platform signals into count refreshes
//!   and drain triggers
//! - **OfflineQueue**: the façade callers submit through
//!
//! ## Key Components
//!
//! - `outbox.rs`: persistent queue storage
//! - `dispatcher.rs`: replay engine and delivery handler trait
//! - `watcher.rs`: connectivity/visibility signal handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use apiary_offline::{OfflineConfig, OfflineQueue};
//! # async fn example(handler: Arc<dyn apiary_offline::DeliveryHandler>)
//! # -> apiary_offline::error::Result<()> {
//! let queue = OfflineQueue::open(OfflineConfig::default(), handler).await?;
//!
//! // Delivered immediately when online, queued otherwise
//! let outcome = queue.submit(serde_json::json!({"temp_c": 34.5})).await?;
//! if !outcome.sent {
//!     println!("{} readings waiting", queue.queued_count(None).await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod outbox;
pub mod watcher;

// Re-export main types
pub use dispatcher::{DeliveryHandler, Dispatcher, DrainOutcome};
pub use outbox::{Outbox, QueueItem};
pub use watcher::{ConnectivityState, ConnectivityWatcher, PlatformSignal};

use crate::config::OfflineConfig;
use crate::error::Result;
use crate::store::LocalStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Whether the payload was delivered immediately; `false` means it was
    /// queued (or permanently rejected) instead
    pub sent: bool,
}

/// Caller-facing entry point of the offline write queue
///
/// Owns the store, outbox, dispatcher, and watcher, and decides per
/// submission between immediate delivery and durable queuing. All delivery
/// failures are absorbed; only storage failures surface as errors so the
/// caller can learn about payload loss.
#[derive(Debug)]
pub struct OfflineQueue {
    outbox: Arc<Outbox>,
    dispatcher: Arc<Dispatcher>,
    watcher: Arc<ConnectivityWatcher>,
}

impl OfflineQueue {
    /// Open the queue: store, outbox collection, dispatcher, and watcher
    ///
    /// The pending count is recomputed immediately so a count indicator is
    /// accurate right after restart.
    pub async fn open(config: OfflineConfig, handler: Arc<dyn DeliveryHandler>) -> Result<Self> {
        Self::open_scoped(config, handler, None).await
    }

    /// Open the queue with the watcher count scoped to one owner tag
    pub async fn open_scoped(
        config: OfflineConfig,
        handler: Arc<dyn DeliveryHandler>,
        count_filter: Option<String>,
    ) -> Result<Self> {
        let store = LocalStore::open(&config).await?;
        let outbox = Arc::new(Outbox::open(store, config.collection).await?);
        let dispatcher = Arc::new(Dispatcher::new(outbox.clone(), handler));
        let watcher = Arc::new(ConnectivityWatcher::new(
            outbox.clone(),
            dispatcher.clone(),
            count_filter,
        ));
        watcher.refresh_count().await;

        Ok(Self {
            outbox,
            dispatcher,
            watcher,
        })
    }

    /// Submit a unit of work
    ///
    /// When the device believes it is online, delivery is attempted
    /// immediately and the outbox is never touched on success. A transient
    /// delivery failure, or being offline, queues the payload instead.
    /// A permanent rejection is not queued: retrying it can never succeed.
    pub async fn submit(&self, payload: Value) -> Result<SubmitOutcome> {
        self.submit_tagged(payload, None).await
    }

    /// Submit a unit of work carrying an owner tag
    pub async fn submit_tagged(&self, payload: Value, tag: Option<&str>) -> Result<SubmitOutcome> {
        if self.watcher.state().is_online {
            match self.dispatcher.handler().deliver(&payload).await {
                Ok(()) => return Ok(SubmitOutcome { sent: true }),
                Err(error) if error.is_permanent() => {
                    tracing::warn!(%error, "payload permanently rejected on submit, not queuing");
                    return Ok(SubmitOutcome { sent: false });
                }
                Err(error) => {
                    tracing::debug!(%error, "immediate delivery failed, queuing payload");
                }
            }
        }

        self.outbox.enqueue_tagged(payload, tag).await?;
        self.watcher.refresh_count().await;
        Ok(SubmitOutcome { sent: false })
    }

    /// Queue a payload directly, bypassing the online check
    pub async fn enqueue(&self, payload: Value) -> Result<i64> {
        self.enqueue_tagged(payload, None).await
    }

    /// Queue a tagged payload directly, bypassing the online check
    pub async fn enqueue_tagged(&self, payload: Value, tag: Option<&str>) -> Result<i64> {
        let local_id = self.outbox.enqueue_tagged(payload, tag).await?;
        self.watcher.refresh_count().await;
        Ok(local_id)
    }

    /// Run one drain pass now (manual "send now" trigger)
    pub async fn drain_queue_once(&self) -> DrainOutcome {
        self.watcher.retry().await
    }

    /// Number of queued items, optionally scoped to one owner tag
    pub async fn queued_count(&self, filter: Option<&str>) -> Result<u64> {
        self.outbox.pending_count(filter).await
    }

    /// Last known connectivity and replay state
    pub fn connectivity_state(&self) -> ConnectivityState {
        self.watcher.state()
    }

    /// Apply one platform signal (online/offline/visibility)
    pub async fn handle_signal(&self, signal: PlatformSignal) {
        self.watcher.handle(signal).await;
    }

    /// Spawn the watcher loop and return the sender hosts feed signals into
    ///
    /// Must be called from within a tokio runtime.
    pub fn signal_sender(&self, buffer: usize) -> mpsc::Sender<PlatformSignal> {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(self.watcher.clone().run(rx));
        tx
    }

    /// Remove every queued item (reset/testing paths)
    pub async fn clear(&self) -> Result<()> {
        self.outbox.clear().await?;
        self.watcher.refresh_count().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail_with: Option<DeliveryError>,
    }

    impl CountingHandler {
        fn succeeding() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_with: None,
            })
        }

        fn failing(error: DeliveryError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_with: Some(error),
            })
        }
    }

    #[async_trait]
    impl DeliveryHandler for CountingHandler {
        async fn deliver(&self, _payload: &Value) -> std::result::Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    async fn temp_queue(handler: Arc<dyn DeliveryHandler>) -> (tempfile::TempDir, OfflineQueue) {
        let dir = tempfile::tempdir().unwrap();
        let config = OfflineConfig::builder()
            .data_dir(dir.path())
            .build()
            .unwrap();
        let queue = OfflineQueue::open(config, handler).await.unwrap();
        (dir, queue)
    }

    #[tokio::test]
    async fn test_online_submit_bypasses_outbox() {
        let handler = CountingHandler::succeeding();
        let (_dir, queue) = temp_queue(handler.clone()).await;

        let outcome = queue.submit(json!({"temp_c": 34.5})).await.unwrap();
        assert!(outcome.sent);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.queued_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_submit_queues_exactly_one_item() {
        let handler = CountingHandler::succeeding();
        let (_dir, queue) = temp_queue(handler.clone()).await;

        queue.handle_signal(PlatformSignal::Offline).await;
        let outcome = queue.submit(json!({"temp_c": 34.5})).await.unwrap();
        assert!(!outcome.sent);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.queued_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_immediate_delivery_falls_back_to_queue() {
        let handler = CountingHandler::failing(DeliveryError::transient("503"));
        let (_dir, queue) = temp_queue(handler.clone()).await;

        let outcome = queue.submit(json!({"temp_c": 34.5})).await.unwrap();
        assert!(!outcome.sent);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.queued_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_permanent_rejection_on_submit_is_not_queued() {
        let handler = CountingHandler::failing(DeliveryError::permanent("422"));
        let (_dir, queue) = temp_queue(handler.clone()).await;

        let outcome = queue.submit(json!({"bad": true})).await.unwrap();
        assert!(!outcome.sent);
        assert_eq!(queue.queued_count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_bypasses_online_check() {
        let handler = CountingHandler::succeeding();
        let (_dir, queue) = temp_queue(handler.clone()).await;

        queue.enqueue(json!({"temp_c": 34.5})).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.queued_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_resets_queue_and_count() {
        let handler = CountingHandler::succeeding();
        let (_dir, queue) = temp_queue(handler).await;

        queue.enqueue(json!({"n": 1})).await.unwrap();
        queue.enqueue(json!({"n": 2})).await.unwrap();
        queue.clear().await.unwrap();
        assert_eq!(queue.queued_count(None).await.unwrap(), 0);
        assert_eq!(
            queue
                .drain_queue_once()
                .await,
            DrainOutcome::Drained {
                delivered: 0,
                dropped: 0
            }
        );
    }
}
