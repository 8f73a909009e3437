//! # Outbox
//!
//! Domain-neutral persistent FIFO queue of pending payloads, implemented as
//! a fixed (store, collection) binding over [`LocalStore`]. Payloads are
//! opaque JSON values; their domain meaning (sensor reading vs. inspection
//! record) is entirely the caller's concern.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use apiary_offline::offline::outbox::Outbox;
//! # async fn example(store: apiary_offline::store::LocalStore)
//! # -> apiary_offline::error::Result<()> {
//! let outbox = Outbox::open(store, "outbox").await?;
//!
//! outbox.enqueue(serde_json::json!({"temp_c": 34.5})).await?;
//! for item in outbox.all().await? {
//!     // deliver item.payload, then:
//!     outbox.remove(item.local_id).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::store::LocalStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One queued payload, as persisted in the outbox collection
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    /// Auto-assigned monotonic local identifier
    pub local_id: i64,
    /// Capture timestamp (RFC 3339)
    pub queued_at: String,
    /// Optional owner tag used for scoped counts and replays
    pub tag: Option<String>,
    /// Opaque caller-defined payload
    pub payload: Value,
}

/// Stored row shape; the local id lives in the row key, not the value
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    queued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    payload: Value,
}

/// Persistent FIFO queue of pending payloads
#[derive(Debug, Clone)]
pub struct Outbox {
    store: LocalStore,
    collection: String,
}

impl Outbox {
    /// Bind an outbox to a store, creating its collection if absent
    pub async fn open(store: LocalStore, collection: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        store.ensure_collection(&collection).await?;
        Ok(Self { store, collection })
    }

    /// Append a payload to the queue, returning its local id
    ///
    /// Storage failures propagate to the caller; a payload is never
    /// silently dropped.
    pub async fn enqueue(&self, payload: Value) -> Result<i64> {
        self.enqueue_tagged(payload, None).await
    }

    /// Append a payload with an owner tag
    pub async fn enqueue_tagged(&self, payload: Value, tag: Option<&str>) -> Result<i64> {
        let envelope = Envelope {
            queued_at: chrono::Utc::now().to_rfc3339(),
            tag: tag.map(str::to_string),
            payload,
        };
        let local_id = self.store.add(&self.collection, &envelope).await?;
        tracing::debug!(local_id, tag, "payload queued for later delivery");
        Ok(local_id)
    }

    /// Fetch every queued item in insertion order
    pub async fn all(&self) -> Result<Vec<QueueItem>> {
        let rows: Vec<(i64, Envelope)> = self.store.get_all(&self.collection).await?;
        Ok(rows
            .into_iter()
            .map(|(local_id, envelope)| QueueItem {
                local_id,
                queued_at: envelope.queued_at,
                tag: envelope.tag,
                payload: envelope.payload,
            })
            .collect())
    }

    /// Remove one item after confirmed delivery
    pub async fn remove(&self, local_id: i64) -> Result<()> {
        self.store.delete(&self.collection, local_id).await
    }

    /// Remove every queued item
    pub async fn clear(&self) -> Result<()> {
        self.store.clear(&self.collection).await
    }

    /// Number of queued items, optionally scoped to one owner tag
    pub async fn pending_count(&self, filter: Option<&str>) -> Result<u64> {
        match filter {
            None => self.store.count(&self.collection).await,
            Some(tag) => {
                let items = self.all().await?;
                Ok(items
                    .iter()
                    .filter(|item| item.tag.as_deref() == Some(tag))
                    .count() as u64)
            }
        }
    }
}
