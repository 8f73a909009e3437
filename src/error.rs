//! Error Types
//!
//! This module defines the error types surfaced by the offline queue.
//!
//! # Error Categories
//!
//! - `OfflineError` - failures of the subsystem itself (storage, serialization,
//!   configuration)
//! - `DeliveryError` - failures reported by the caller-supplied delivery
//!   handler, split into transient and permanent outcomes
//!
//! # Usage
//!
//! ```rust
//! use apiary_offline::error::DeliveryError;
//!
//! // A handler signals that the server is unreachable right now
//! let err = DeliveryError::transient("connection refused");
//! assert!(!err.is_permanent());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across task
//! boundaries.
use thiserror::Error;

/// Result type for offline queue operations
pub type Result<T> = std::result::Result<T, OfflineError>;

/// Errors produced by the offline queue subsystem
#[derive(Debug, Error)]
pub enum OfflineError {
    /// Underlying SQLite storage error
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// JSON serialization or deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message
        message: String,
    },

    /// Filesystem error while preparing the database location
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OfflineError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Failure reported by a [`DeliveryHandler`](crate::offline::DeliveryHandler)
///
/// The dispatcher treats the two variants differently: a transient failure
/// stops the current drain pass and leaves the item queued for a later
/// attempt, while a permanent rejection removes the item and lets the pass
/// continue with the next one.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Remote temporarily unavailable (network error, 5xx, timeout)
    #[error("transient delivery failure: {message}")]
    Transient {
        /// Human-readable error message
        message: String,
    },

    /// Payload rejected for good (e.g. server-side validation failure)
    #[error("payload permanently rejected: {message}")]
    Permanent {
        /// Human-readable error message
        message: String,
    },
}

impl DeliveryError {
    /// Create a new transient delivery failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a new permanent rejection
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Whether this failure is a permanent rejection
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }
}
