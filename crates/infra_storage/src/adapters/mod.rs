//! Object store adapters
//!
//! Each adapter implements `domain_claims::ObjectStorePort` along with the
//! `DomainPort` marker and `HealthCheckable`.
//!
//! ```rust,ignore
//! use infra_storage::adapters::FilesystemObjectStore;
//! use domain_claims::ObjectStorePort;
//!
//! let store = FilesystemObjectStore::new("/var/lib/claims");
//! store.put_object("claims-intake", "claims/a.json", bytes, None).await?;
//! ```

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemObjectStore;
pub use memory::MemoryObjectStore;
