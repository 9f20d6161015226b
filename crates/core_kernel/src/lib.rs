//! Core Kernel - Foundational types shared by the claims delegation system
//!
//! This crate provides the building blocks every other crate depends on:
//! - Strongly-typed identifiers for conversations and turns
//! - The port error taxonomy and marker traits for adapters
//! - Common error types

pub mod identifiers;
pub mod ports;
pub mod error;

pub use identifiers::{ConversationId, TurnId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    AdapterType, OperationMetadata,
};
pub use error::CoreError;
