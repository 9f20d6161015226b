//! Claims Domain Ports
//!
//! The only external resource the workflow touches is an object-storage
//! bucket. `ObjectStorePort` is the capability the validator's Persist tool
//! writes through; adapters live in `infra_storage`.
//!
//! ```rust,ignore
//! use domain_claims::ports::ObjectStorePort;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn ObjectStorePort> = Arc::new(MemoryObjectStore::with_buckets(["claims"]));
//! store.put_object("claims", "a.json", b"{}".to_vec(), None).await?;
//! ```

use async_trait::async_trait;

use core_kernel::{DomainPort, HealthCheckable, OperationMetadata, PortError};

/// Object storage capability
///
/// Writes are keyed by caller-supplied names. There is no locking and no
/// overwrite protection: the last writer wins.
#[async_trait]
pub trait ObjectStorePort: DomainPort + HealthCheckable {
    /// Writes `payload` to `bucket/key`, replacing any existing object
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Vec<u8>,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError>;

    /// Reads the object at `bucket/key`
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        metadata: Option<OperationMetadata>,
    ) -> Result<Vec<u8>, PortError>;

    /// Human-readable location of an object, used in persistence reports
    fn object_uri(&self, bucket: &str, key: &str) -> String;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    //! In-memory store with failure injection for tests

    use super::*;
    use chrono::Utc;
    use core_kernel::{AdapterHealth, AdapterType, HealthCheckResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;

    /// Mock object store
    ///
    /// Any bucket name is accepted. `fail_with` makes every write fail with
    /// the given message; `delay` slows writes down to exercise timeouts.
    #[derive(Debug, Default, Clone)]
    pub struct MockObjectStore {
        objects: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
        failure: Arc<RwLock<Option<String>>>,
        delay: Arc<RwLock<Option<Duration>>>,
        writes: Arc<AtomicUsize>,
        unhealthy: Arc<AtomicBool>,
    }

    impl MockObjectStore {
        /// Creates a new mock store
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes subsequent writes fail with `message`
        pub async fn fail_with(&self, message: impl Into<String>) {
            *self.failure.write().await = Some(message.into());
        }

        /// Delays subsequent writes
        pub async fn delay_writes(&self, delay: Duration) {
            *self.delay.write().await = Some(delay);
        }

        /// Reports the store as unhealthy
        pub fn set_unhealthy(&self) {
            self.unhealthy.store(true, Ordering::Relaxed);
        }

        /// Number of write attempts seen, failed or not
        pub fn write_attempts(&self) -> usize {
            self.writes.load(Ordering::Relaxed)
        }

        /// Number of stored objects
        pub async fn object_count(&self) -> usize {
            self.objects.read().await.len()
        }
    }

    impl DomainPort for MockObjectStore {}

    #[async_trait]
    impl HealthCheckable for MockObjectStore {
        async fn health_check(&self) -> HealthCheckResult {
            let status = if self.unhealthy.load(Ordering::Relaxed) {
                AdapterHealth::Unhealthy
            } else {
                AdapterHealth::Healthy
            };
            HealthCheckResult {
                adapter_id: "mock-object-store".to_string(),
                adapter_type: AdapterType::Mock,
                status,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl ObjectStorePort for MockObjectStore {
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            payload: Vec<u8>,
            _metadata: Option<OperationMetadata>,
        ) -> Result<(), PortError> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            let delay = *self.delay.read().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = self.failure.read().await.clone() {
                return Err(PortError::connection(message));
            }
            self.objects
                .write()
                .await
                .insert((bucket.to_string(), key.to_string()), payload);
            Ok(())
        }

        async fn get_object(
            &self,
            bucket: &str,
            key: &str,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Vec<u8>, PortError> {
            self.objects
                .read()
                .await
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| PortError::not_found("Object", format!("{}/{}", bucket, key)))
        }

        fn object_uri(&self, bucket: &str, key: &str) -> String {
            format!("mock://{}/{}", bucket, key)
        }
    }
}
