//! Request handlers

pub mod agents;
pub mod conversations;
pub mod health;
pub mod storage;
