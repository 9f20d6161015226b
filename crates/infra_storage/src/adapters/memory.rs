//! In-memory object store
//!
//! Buckets must be registered up front; writes to any other bucket fail with
//! not found, like a cloud bucket that was never created.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, AdapterType, DomainPort, HealthCheckResult, HealthCheckable, OperationMetadata,
    PortError,
};
use domain_claims::ObjectStorePort;

use crate::error::StorageError;
use crate::naming::{validate_bucket_name, validate_key};

type Bucket = HashMap<String, Vec<u8>>;

/// Process-local object store
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl MemoryObjectStore {
    /// Creates a store with no buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given buckets; invalid names are skipped
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buckets = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| validate_bucket_name(name).is_ok())
            .map(|name| (name, Bucket::new()))
            .collect();
        Self {
            buckets: Arc::new(RwLock::new(buckets)),
        }
    }

    /// Registers a bucket; existing buckets keep their objects
    pub async fn create_bucket(&self, name: &str) -> Result<(), StorageError> {
        validate_bucket_name(name)?;
        self.buckets
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    pub async fn has_bucket(&self, name: &str) -> bool {
        self.buckets.read().await.contains_key(name)
    }

    /// Keys in a bucket, sorted
    pub async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, StorageError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        let mut keys: Vec<String> = objects.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn put(&self, bucket: &str, key: &str, payload: Vec<u8>) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), payload);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

impl DomainPort for MemoryObjectStore {}

#[async_trait]
impl HealthCheckable for MemoryObjectStore {
    async fn health_check(&self) -> HealthCheckResult {
        let buckets = self.buckets.read().await.len();
        HealthCheckResult {
            adapter_id: "memory-object-store".to_string(),
            adapter_type: AdapterType::Memory,
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: Some(format!("{} bucket(s)", buckets)),
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ObjectStorePort for MemoryObjectStore {
    #[instrument(skip(self, payload, _metadata), fields(bytes = payload.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Vec<u8>,
        _metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError> {
        self.put(bucket, key, payload).await?;
        debug!("Object stored in memory");
        Ok(())
    }

    #[instrument(skip(self, _metadata))]
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        _metadata: Option<OperationMetadata>,
    ) -> Result<Vec<u8>, PortError> {
        Ok(self.get(bucket, key).await?)
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, key)
    }
}
