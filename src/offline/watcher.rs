//! # Connectivity Watcher
//!
//! Bridges platform connectivity and visibility signals into queue-count
//! refreshes and dispatcher triggers. The crate does not probe the network
//! itself; the host application owns online/offline detection and feeds the
//! watcher either by calling the handler methods directly or through the
//! channel consumed by [`ConnectivityWatcher::run`].
//!
//! ## Behavior
//!
//! - transition to online: set the online flag, run one drain pass, then
//!   recompute the pending count
//! - transition to offline: clear the online flag only, no drain
//! - page/tab became visible: recompute the pending count only
//! - manual retry: same as the online path, regardless of connectivity

use crate::offline::dispatcher::{Dispatcher, DrainOutcome};
use crate::offline::outbox::Outbox;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Platform signals the watcher consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSignal {
    /// The device reports it is back online
    Online,
    /// The device reports it lost connectivity
    Offline,
    /// The host page/tab became visible again
    PageVisible,
}

/// Connectivity state exposed to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    /// Last known connectivity
    pub is_online: bool,
    /// Whether a watcher-triggered drain pass is in flight
    pub is_replaying: bool,
}

/// Translates platform signals into count refreshes and drain triggers
pub struct ConnectivityWatcher {
    outbox: Arc<Outbox>,
    dispatcher: Arc<Dispatcher>,
    /// Optional owner tag scoping the pending count
    filter: Option<String>,
    is_online: AtomicBool,
    queued_count: AtomicU64,
}

impl ConnectivityWatcher {
    /// Create a watcher over an outbox and dispatcher
    ///
    /// `filter` scopes the pending count to items carrying that owner tag.
    /// Connectivity is assumed online until the host reports otherwise.
    pub fn new(
        outbox: Arc<Outbox>,
        dispatcher: Arc<Dispatcher>,
        filter: Option<String>,
    ) -> Self {
        Self {
            outbox,
            dispatcher,
            filter,
            is_online: AtomicBool::new(true),
            queued_count: AtomicU64::new(0),
        }
    }

    /// Current connectivity state
    ///
    /// `is_replaying` is read straight from the dispatcher's in-flight
    /// guard, so it stays accurate when an overlapping trigger bounces off
    /// a pass that is still running.
    pub fn state(&self) -> ConnectivityState {
        ConnectivityState {
            is_online: self.is_online.load(Ordering::Acquire),
            is_replaying: self.dispatcher.is_draining(),
        }
    }

    /// Last recomputed pending count
    pub fn queued_count(&self) -> u64 {
        self.queued_count.load(Ordering::Acquire)
    }

    /// Recompute the pending count from the outbox
    ///
    /// A storage failure keeps the previous count; counting is advisory UI
    /// state and must not surface errors.
    pub async fn refresh_count(&self) -> u64 {
        match self.outbox.pending_count(self.filter.as_deref()).await {
            Ok(count) => {
                self.queued_count.store(count, Ordering::Release);
                count
            }
            Err(error) => {
                tracing::warn!(%error, "could not recompute pending count");
                self.queued_count.load(Ordering::Acquire)
            }
        }
    }

    /// Apply one platform signal
    pub async fn handle(&self, signal: PlatformSignal) {
        match signal {
            PlatformSignal::Online => self.set_online(true).await,
            PlatformSignal::Offline => self.set_online(false).await,
            PlatformSignal::PageVisible => {
                self.refresh_count().await;
            }
        }
    }

    /// Record a connectivity transition
    ///
    /// Coming online triggers a drain pass; going offline only clears the
    /// flag.
    pub async fn set_online(&self, online: bool) {
        self.is_online.store(online, Ordering::Release);
        if online {
            tracing::debug!("back online, replaying queued items");
            self.replay().await;
        }
    }

    /// Manual trigger: run one drain pass regardless of connectivity
    pub async fn retry(&self) -> DrainOutcome {
        self.replay().await
    }

    /// Run one dispatcher pass, then refresh the count
    ///
    /// The replay indicator is the dispatcher's own in-flight guard; a
    /// trigger that loses the guard race returns `Busy` without disturbing
    /// the indicator of the pass that is still running.
    async fn replay(&self) -> DrainOutcome {
        let outcome = self.dispatcher.drain_once().await;
        self.refresh_count().await;
        outcome
    }

    /// Consume platform signals until the channel closes
    ///
    /// Hosts spawn this on their runtime and keep the sender side.
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<PlatformSignal>) {
        tracing::info!("connectivity watcher started");
        self.refresh_count().await;
        while let Some(signal) = signals.recv().await {
            self.handle(signal).await;
        }
        tracing::info!("connectivity watcher stopped");
    }
}

impl std::fmt::Debug for ConnectivityWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityWatcher")
            .field("filter", &self.filter)
            .field("state", &self.state())
            .field("queued_count", &self.queued_count())
            .finish_non_exhaustive()
    }
}
