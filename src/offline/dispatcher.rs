//! # Dispatcher
//!
//! Replays queued payloads through a caller-supplied delivery handler.
//! Items are processed strictly in insertion order; an item is removed only
//! after its delivery resolved successfully; the pass stops at the first
//! transient failure so a still-degraded server is not hammered with the
//! rest of the queue.
//!
//! No backoff or delay is scheduled here. The next attempt happens only
//! when something external triggers another drain (connectivity event,
//! visibility change, manual retry, or a flush check after restart).

use crate::error::DeliveryError;
use crate::offline::outbox::Outbox;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-supplied delivery operation for one payload
///
/// Implementations must resolve only on confirmed server acceptance and
/// report every other outcome as a [`DeliveryError`]: `Transient` for
/// "remote temporarily unavailable, try later", `Permanent` for payloads
/// the server will never accept.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Perform the remote write for one payload
    async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError>;
}

/// Result of one drain pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The pass reached the end of the queue
    Drained {
        /// Items delivered and removed
        delivered: usize,
        /// Items removed after a permanent rejection
        dropped: usize,
    },
    /// The pass stopped at the first transient failure
    Stopped {
        /// Items delivered and removed before the stop
        delivered: usize,
        /// Items removed after a permanent rejection before the stop
        dropped: usize,
    },
    /// Another pass was already in flight; nothing was attempted
    Busy,
}

/// Replay engine draining the outbox through a delivery handler
pub struct Dispatcher {
    outbox: Arc<Outbox>,
    handler: Arc<dyn DeliveryHandler>,
    in_flight: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher over an outbox with its delivery handler
    pub fn new(outbox: Arc<Outbox>, handler: Arc<dyn DeliveryHandler>) -> Self {
        Self {
            outbox,
            handler,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The delivery handler this dispatcher replays through
    pub fn handler(&self) -> &Arc<dyn DeliveryHandler> {
        &self.handler
    }

    /// Whether a drain pass is currently in flight
    pub fn is_draining(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Attempt delivery of every currently queued item, in order
    ///
    /// At most one pass runs at a time; an overlapping call returns
    /// [`DrainOutcome::Busy`] without touching the queue. Storage errors
    /// during the pass are logged and stop it; this method never returns
    /// an error.
    pub async fn drain_once(&self) -> DrainOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            tracing::debug!("drain pass already in flight, skipping trigger");
            return DrainOutcome::Busy;
        }

        // The guard clears the flag even when the pass future is dropped
        // mid-delivery (host timeout, aborted watcher task).
        let _guard = InFlightGuard {
            flag: &self.in_flight,
        };
        self.run_pass().await
    }

    async fn run_pass(&self) -> DrainOutcome {
        let items = match self.outbox.all().await {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(%error, "could not read outbox, stopping drain pass");
                return DrainOutcome::Stopped {
                    delivered: 0,
                    dropped: 0,
                };
            }
        };

        let mut delivered = 0;
        let mut dropped = 0;

        for item in items {
            match self.handler.deliver(&item.payload).await {
                Ok(()) => {
                    if let Err(error) = self.outbox.remove(item.local_id).await {
                        tracing::warn!(
                            local_id = item.local_id,
                            %error,
                            "delivered item could not be removed, stopping drain pass"
                        );
                        return DrainOutcome::Stopped { delivered, dropped };
                    }
                    delivered += 1;
                }
                Err(error) if error.is_permanent() => {
                    tracing::warn!(
                        local_id = item.local_id,
                        %error,
                        "payload permanently rejected, dropping item"
                    );
                    if let Err(error) = self.outbox.remove(item.local_id).await {
                        tracing::warn!(
                            local_id = item.local_id,
                            %error,
                            "rejected item could not be removed, stopping drain pass"
                        );
                        return DrainOutcome::Stopped { delivered, dropped };
                    }
                    dropped += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        local_id = item.local_id,
                        %error,
                        "delivery failed, leaving item queued and stopping drain pass"
                    );
                    return DrainOutcome::Stopped { delivered, dropped };
                }
            }
        }

        if delivered > 0 || dropped > 0 {
            tracing::info!(delivered, dropped, "drain pass finished");
        }
        DrainOutcome::Drained { delivered, dropped }
    }
}

/// Releases the in-flight slot when a pass settles or is cancelled
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
