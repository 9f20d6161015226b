//! Storage error types

use std::path::PathBuf;

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur in the storage adapters
#[derive(Debug, Error)]
pub enum StorageError {
    /// Bucket name breaks the naming rules
    #[error("Invalid bucket name '{name}': {reason}")]
    InvalidBucket { name: String, reason: String },

    /// Object key breaks the naming rules
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// Filesystem operation failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn invalid_bucket(name: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::InvalidBucket {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    /// Checks if this error indicates a missing bucket or object
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. }
        )
    }
}

impl From<StorageError> for PortError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidBucket { .. } => {
                PortError::validation_field(error.to_string(), "bucket")
            }
            StorageError::InvalidKey { .. } => PortError::validation_field(error.to_string(), "key"),
            StorageError::BucketNotFound(name) => PortError::not_found("Bucket", name),
            StorageError::ObjectNotFound { bucket, key } => {
                PortError::not_found("Object", format!("{}/{}", bucket, key))
            }
            StorageError::Io { path, source } => {
                PortError::internal_with_source(format!("I/O error at {}", path.display()), source)
            }
            StorageError::Configuration(message) => PortError::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_port_not_found() {
        let port: PortError = StorageError::BucketNotFound("claims".to_string()).into();
        assert!(port.is_not_found());
        assert!(port.to_string().contains("claims"));

        let port: PortError = StorageError::ObjectNotFound {
            bucket: "claims".to_string(),
            key: "a.json".to_string(),
        }
        .into();
        assert!(port.to_string().contains("claims/a.json"));
    }

    #[test]
    fn test_invalid_key_maps_to_validation() {
        let port: PortError = StorageError::invalid_key("../x", "parent segments are not allowed").into();
        assert!(matches!(port, PortError::Validation { field: Some(ref f), .. } if f == "key"));
    }

    #[test]
    fn test_io_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let port: PortError = StorageError::io("/data/claims", io).into();
        assert!(std::error::Error::source(&port).is_some());
        assert!(!port.is_transient());
    }
}
