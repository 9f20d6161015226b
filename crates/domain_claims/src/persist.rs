//! Persist capability
//!
//! Writes structured data as two-space indented JSON to an object store and
//! reports the result as data. Failures (serialization, adapter errors,
//! timeouts) are caught here and turned into an `error` outcome; nothing is
//! retried and nothing is raised to the calling stage.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{OperationMetadata, PortError};

use crate::ports::ObjectStorePort;

/// Whether a write went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistStatus {
    Success,
    Error,
}

/// Result of a Persist call, reported inline by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    pub status: PersistStatus,
    pub message: String,
}

impl PersistOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: PersistStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: PersistStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PersistStatus::Success
    }
}

/// Persist settings
#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// Upper bound on a single storage write
    pub timeout: Duration,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// The Persist tool bound to a store
#[derive(Clone)]
pub struct Persist {
    store: Arc<dyn ObjectStorePort>,
    config: PersistConfig,
}

impl Persist {
    pub fn new(store: Arc<dyn ObjectStorePort>, config: PersistConfig) -> Self {
        Self { store, config }
    }

    /// The store this tool writes to
    pub fn store(&self) -> &Arc<dyn ObjectStorePort> {
        &self.store
    }

    /// Serializes `payload` and writes it to `bucket/key`
    pub async fn save<T>(&self, bucket: &str, key: &str, payload: &T) -> PersistOutcome
    where
        T: Serialize + ?Sized,
    {
        let body = match serde_json::to_string_pretty(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(bucket, key, error = %e, "Failed to serialize payload for storage");
                return PersistOutcome::error(e.to_string());
            }
        };

        let metadata = OperationMetadata::default()
            .with_context("bucket", bucket)
            .with_context("key", key);

        let write = self
            .store
            .put_object(bucket, key, body.into_bytes(), Some(metadata));

        let result = match tokio::time::timeout(self.config.timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(PortError::timeout(
                "put_object",
                self.config.timeout.as_millis() as u64,
            )),
        };

        match result {
            Ok(()) => {
                let uri = self.store.object_uri(bucket, key);
                info!(%uri, "Saved claim data");
                PersistOutcome::success(format!("Successfully saved to {}", uri))
            }
            Err(e) => {
                warn!(bucket, key, error = %e, transient = e.is_transient(), "Failed to save claim data");
                PersistOutcome::error(e.to_string())
            }
        }
    }
}
