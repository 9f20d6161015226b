//! Filesystem object store
//!
//! Each bucket is a directory under the root; object keys map to relative
//! paths inside it. Writes go to a uniquely named sibling file that is
//! synced and renamed into place; a failed write removes it again, so the
//! bucket only ever holds complete objects.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, AdapterType, DomainPort, HealthCheckResult, HealthCheckable, OperationMetadata,
    PortError,
};
use domain_claims::ObjectStorePort;

use crate::error::StorageError;
use crate::naming::{validate_bucket_name, validate_key};

/// Directory-backed object store
#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
    create_buckets: bool,
}

impl FilesystemObjectStore {
    /// Creates a store rooted at `root`; buckets must already exist
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_buckets: false,
        }
    }

    /// Creates missing bucket directories on first write
    pub fn with_auto_create(mut self, enabled: bool) -> Self {
        self.create_buckets = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory for a bucket
    pub async fn create_bucket(&self, name: &str) -> Result<(), StorageError> {
        validate_bucket_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(dir, e))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_bucket_name(bucket)?;
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.join(bucket), |path, part| path.join(part)))
    }

    async fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(bucket);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::BucketNotFound(bucket.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.create_buckets {
                    fs::create_dir_all(&dir)
                        .await
                        .map_err(|e| StorageError::io(&dir, e))?;
                    Ok(dir)
                } else {
                    Err(StorageError::BucketNotFound(bucket.to_string()))
                }
            }
            Err(e) => Err(StorageError::io(dir, e)),
        }
    }

    async fn put(&self, bucket: &str, key: &str, payload: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.object_path(bucket, key)?;
        self.bucket_dir(bucket).await?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = path.with_file_name(format!(".{}.{}.partial", file_name, Uuid::new_v4()));
        let written = match write_synced(&partial, payload).await {
            Ok(()) => fs::rename(&partial, &path)
                .await
                .map_err(|e| StorageError::io(&path, e)),
            Err(e) => Err(StorageError::io(&partial, e)),
        };
        if written.is_err() {
            if let Err(e) = fs::remove_file(&partial).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %e, "Failed to remove partial object");
                }
            }
        }
        written.map(|()| path)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if fs::metadata(self.root.join(bucket)).await.is_err() {
                    Err(StorageError::BucketNotFound(bucket.to_string()))
                } else {
                    Err(StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                }
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}

/// Writes `payload` and flushes it to disk before returning
async fn write_synced(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}

impl DomainPort for FilesystemObjectStore {}

#[async_trait]
impl HealthCheckable for FilesystemObjectStore {
    /// Checks that the root directory exists
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = fs::metadata(&self.root).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(meta) if meta.is_dir() => (AdapterHealth::Healthy, None),
            Ok(_) => (
                AdapterHealth::Unhealthy,
                Some(format!("{} is not a directory", self.root.display())),
            ),
            Err(e) => (
                AdapterHealth::Unhealthy,
                Some(format!("Storage root unavailable: {}", e)),
            ),
        };

        HealthCheckResult {
            adapter_id: "filesystem-object-store".to_string(),
            adapter_type: AdapterType::Filesystem,
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ObjectStorePort for FilesystemObjectStore {
    #[instrument(skip(self, payload, _metadata), fields(bytes = payload.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Vec<u8>,
        _metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError> {
        let path = self.put(bucket, key, &payload).await?;
        debug!(path = %path.display(), "Object written");
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
        let path = self.root.join(bucket).join(key);
        let display = path.display().to_string();
        if display.starts_with('/') {
            format!("file://{}", display)
        } else {
            format!("file:///{}", display)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_with_bucket() -> (TempDir, FilesystemObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.create_bucket("claims-intake").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_creates_nested_key() {
        let (dir, store) = store_with_bucket().await;
        store
            .put_object("claims-intake", "claims/2024/a.json", b"{\"a\":1}".to_vec(), None)
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join("claims-intake/claims/2024/a.json")).unwrap();
        assert_eq!(on_disk, b"{\"a\":1}");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("claims-intake/claims/2024"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_bucket_unchanged() {
        let (dir, store) = store_with_bucket().await;
        std::fs::create_dir(dir.path().join("claims-intake/a.json")).unwrap();

        let err = store
            .put_object("claims-intake", "a.json", b"{}".to_vec(), None)
            .await;
        assert!(err.is_err());

        let names: Vec<String> = std::fs::read_dir(dir.path().join("claims-intake"))
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_key() {
        let (dir, store) = store_with_bucket().await;
        let writes = (0..8u8).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .put_object("claims-intake", "same.json", vec![i; 64], None)
                    .await
            })
        });
        for handle in writes.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }

        let on_disk = std::fs::read(dir.path().join("claims-intake/same.json")).unwrap();
        assert_eq!(on_disk.len(), 64);
        assert!(on_disk.iter().all(|b| *b == on_disk[0]));
        let entries = std::fs::read_dir(dir.path().join("claims-intake")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        let err = store
            .put_object("claims-intake", "a.json", Vec::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store.get_object("claims-intake", "a.json", None).await.unwrap_err();
        assert!(err.to_string().contains("Bucket"));
    }

    #[tokio::test]
    async fn test_auto_create() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemObjectStore::new(dir.path()).with_auto_create(true);
        store
            .put_object("claims-intake", "a.json", b"x".to_vec(), None)
            .await
            .unwrap();
        assert!(dir.path().join("claims-intake/a.json").exists());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let (_dir, store) = store_with_bucket().await;
        let err = store.get_object("claims-intake", "nope.json", None).await.unwrap_err();
        assert!(err.to_string().contains("claims-intake/nope.json"));
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_bucket() {
        let (dir, store) = store_with_bucket().await;
        for key in ["../outside.json", "/abs.json", "a/./b.json"] {
            let err = store
                .put_object("claims-intake", key, Vec::new(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, PortError::Validation { .. }), "{}", key);
        }
        assert!(!dir.path().join("outside.json").exists());
    }

    #[tokio::test]
    async fn test_uri_and_health() {
        let (dir, store) = store_with_bucket().await;
        let uri = store.object_uri("claims-intake", "a.json");
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with("/claims-intake/a.json"));
        assert!(store.health_check().await.is_operational());

        drop(dir);
        assert!(!store.health_check().await.is_operational());
    }
}
