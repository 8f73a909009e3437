//! Apiary Offline - Main Library
//!
//! Offline-first write queue for the apiary monitoring client. The client
//! keeps accepting writes (sensor readings, inspection records) while the
//! network is unreachable, persists them durably in a local SQLite outbox,
//! and replays them to the server in order once connectivity returns,
//! without duplicating or reordering data and without hammering a
//! still-degraded server.
//!
//! # Module Structure
//!
//! - **`store`** - Local persistent store
//!   - Named, auto-keyed collections over SQLite
//!   - Idempotent open, ordered reads
//!
//! - **`offline`** - Queue, replay, and triggers
//!   - `Outbox`: persistent FIFO of pending payloads
//!   - `Dispatcher`: in-order replay with fail-fast stop
//!   - `ConnectivityWatcher`: platform signal handling
//!   - `OfflineQueue`: the caller-facing façade
//!
//! - **`config`** / **`error`** - configuration and error types
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use apiary_offline::{
//!     DeliveryError, DeliveryHandler, OfflineConfig, OfflineQueue, PlatformSignal,
//! };
//!
//! struct HttpDelivery;
//!
//! #[async_trait::async_trait]
//! impl DeliveryHandler for HttpDelivery {
//!     async fn deliver(&self, payload: &serde_json::Value) -> Result<(), DeliveryError> {
//!         // POST the payload; map non-2xx/network errors to DeliveryError
//!         let _ = payload;
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> apiary_offline::error::Result<()> {
//! let queue = OfflineQueue::open(OfflineConfig::default(), Arc::new(HttpDelivery)).await?;
//!
//! queue.submit(serde_json::json!({"hive": "hive-1", "temp_c": 34.5})).await?;
//! queue.handle_signal(PlatformSignal::Online).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod offline;
pub mod store;

// Re-export the public surface
pub use config::{OfflineConfig, OfflineConfigBuilder};
pub use error::{DeliveryError, OfflineError};
pub use offline::{
    ConnectivityState, ConnectivityWatcher, DeliveryHandler, Dispatcher, DrainOutcome,
    OfflineQueue, Outbox, PlatformSignal, QueueItem, SubmitOutcome,
};
pub use store::LocalStore;
