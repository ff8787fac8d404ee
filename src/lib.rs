// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::connection::{ConnectionKey, ConnectionRegistry};
pub use crate::core::FtpBridgeError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
