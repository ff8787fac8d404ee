// src/connection/mod.rs

//! The connection resilience layer: pooled records, per-session command
//! serialization, health checking/reconnection and queue-guarded transfers.

// Declare the private sub-modules of the `connection` module.
mod health;
mod queue;
mod record;
mod registry;
mod transfer;

// Publicly re-export the primary types from the sub-modules.
// This creates a clean public API for the `connection` module, hiding the
// internal file structure from the rest of the crate.
pub use queue::OperationQueue;
pub use record::{ConnectionKey, ConnectionRecord, ConnectionSummary, SharedSession};
pub use registry::ConnectionRegistry;
pub use transfer::{FileContent, MAX_TRANSFER_BYTES, SaveReceipt};
