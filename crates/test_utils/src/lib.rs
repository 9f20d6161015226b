//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! claims delegation test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built claim inputs, adjudicated claims and rule texts
//! - `builders`: Builder patterns for drafts and adjudicated claims
//! - `assertions`: Assertion helpers for agent replies and EDI documents
//! - `generators`: Property-based test data generators

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use generators::*;
