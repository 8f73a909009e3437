//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests:
//! - temp-directory backed configurations
//! - a delivery handler driven by a script of per-call outcomes

use apiary_offline::{DeliveryError, DeliveryHandler, OfflineConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Install a fmt subscriber honoring RUST_LOG, once per test binary
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Build a configuration rooted in a fresh temporary directory
pub fn temp_config() -> (tempfile::TempDir, OfflineConfig) {
    init_tracing();
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = OfflineConfig::builder()
        .data_dir(dir.path())
        .build()
        .expect("valid config");
    (dir, config)
}

/// Delivery handler that replays a script of outcomes and records every call
///
/// Once the script is exhausted, further calls succeed.
pub struct ScriptedHandler {
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    calls: Mutex<Vec<Value>>,
}

impl ScriptedHandler {
    pub fn new(script: Vec<Result<(), DeliveryError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Handler that succeeds on every call
    pub fn always_ok() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Payloads the handler was invoked with, in call order
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    /// Replace the remaining script
    pub fn set_script(&self, script: Vec<Result<(), DeliveryError>>) {
        *self.script.lock().unwrap() = script.into();
    }
}

#[async_trait]
impl DeliveryHandler for ScriptedHandler {
    async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError> {
        self.calls.lock().unwrap().push(payload.clone());
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
