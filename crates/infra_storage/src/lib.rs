//! Object Storage Infrastructure
//!
//! This crate provides the adapters behind `domain_claims::ObjectStorePort`.
//!
//! # Adapters
//!
//! - [`MemoryObjectStore`]: process-local buckets, for tests and demos
//! - [`FilesystemObjectStore`]: one directory per bucket under a root
//!
//! Both follow the same naming rules as cloud buckets, so a key accepted
//! here is accepted by any backend the port may grow later.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_storage::{build_store, StorageConfig};
//!
//! let store = build_store(&StorageConfig::memory(["claims-intake"])).await?;
//! store.put_object("claims-intake", "claims/a.json", bytes, None).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod naming;

pub use adapters::{FilesystemObjectStore, MemoryObjectStore};
pub use config::{build_store, StorageBackend, StorageConfig};
pub use error::StorageError;
