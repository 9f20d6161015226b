//! Storage backend selection

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use domain_claims::ObjectStorePort;

use crate::adapters::{FilesystemObjectStore, MemoryObjectStore};
use crate::error::StorageError;
use crate::naming::validate_bucket_name;

/// Which adapter backs the object store port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

impl FromStr for StorageBackend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "filesystem" | "fs" | "file" => Ok(StorageBackend::Filesystem),
            other => Err(StorageError::Configuration(format!(
                "unknown storage backend '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// Object store settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Buckets created at startup
    #[serde(default)]
    pub buckets: Vec<String>,
    /// Filesystem backend creates unknown buckets on first write
    #[serde(default)]
    pub create_buckets: bool,
}

impl StorageConfig {
    pub fn memory<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend: StorageBackend::Memory,
            buckets: buckets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn with_buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buckets = buckets.into_iter().map(Into::into).collect();
        self
    }
}

/// Builds the configured adapter and creates its startup buckets
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStorePort>, StorageError> {
    for bucket in &config.buckets {
        validate_bucket_name(bucket)?;
    }

    let store: Arc<dyn ObjectStorePort> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryObjectStore::with_buckets(config.buckets.clone())),
        StorageBackend::Filesystem => {
            let root = config.root.clone().ok_or_else(|| {
                StorageError::Configuration("filesystem backend requires a root directory".to_string())
            })?;
            let store = FilesystemObjectStore::new(root).with_auto_create(config.create_buckets);
            for bucket in &config.buckets {
                store.create_bucket(bucket).await?;
            }
            Arc::new(store)
        }
    };

    info!(
        backend = %config.backend,
        buckets = ?config.buckets,
        "Object store ready"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("FS".parse::<StorageBackend>().unwrap(), StorageBackend::Filesystem);
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[tokio::test]
    async fn test_filesystem_requires_root() {
        let config = StorageConfig {
            backend: StorageBackend::Filesystem,
            ..StorageConfig::default()
        };
        assert!(matches!(
            build_store(&config).await,
            Err(StorageError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_startup_bucket() {
        let config = StorageConfig::memory(["OK"]);
        assert!(matches!(
            build_store(&config).await,
            Err(StorageError::InvalidBucket { .. })
        ));
    }
}
