// src/core/errors.rs

//! Defines the primary error type for the connection layer.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures the connection layer can report.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum FtpBridgeError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// No record exists for the given connection id; the caller must re-register.
    #[error("No connection registered for '{0}'")]
    ConnectionNotFound(String),

    /// Health check and reconnect both failed; terminal for this record.
    #[error("Connection '{0}' is no longer active and could not be repaired")]
    ConnectionInactive(String),

    /// Registration would exceed the per-host session cap of the legacy server.
    #[error("Connection limit reached for host '{host}' (max {limit})")]
    ConnectionLimitReached { host: String, limit: usize },

    /// A reconnect is currently in flight on this record. Transient; retryable.
    #[error("Reconnect in progress for '{0}'")]
    ReconnectInProgress(String),

    /// A single queued command failed. The record and its queue remain usable.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Rejected before any transfer command was issued.
    #[error("File '{path}' exceeds the transfer limit ({size} bytes, limit {limit})")]
    TransferTooLarge { path: String, size: u64, limit: u64 },

    /// The size or listing probe for a path failed.
    #[error("File '{0}' not found or inaccessible")]
    FileInaccessible(String),

    /// A transport or wire-level error reported by the protocol client.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for FtpBridgeError {
    fn clone(&self) -> Self {
        match self {
            FtpBridgeError::Io(e) => FtpBridgeError::Io(Arc::clone(e)),
            FtpBridgeError::ConnectionNotFound(s) => FtpBridgeError::ConnectionNotFound(s.clone()),
            FtpBridgeError::ConnectionInactive(s) => FtpBridgeError::ConnectionInactive(s.clone()),
            FtpBridgeError::ConnectionLimitReached { host, limit } => {
                FtpBridgeError::ConnectionLimitReached {
                    host: host.clone(),
                    limit: *limit,
                }
            }
            FtpBridgeError::ReconnectInProgress(s) => {
                FtpBridgeError::ReconnectInProgress(s.clone())
            }
            FtpBridgeError::OperationFailed(s) => FtpBridgeError::OperationFailed(s.clone()),
            FtpBridgeError::TransferTooLarge { path, size, limit } => {
                FtpBridgeError::TransferTooLarge {
                    path: path.clone(),
                    size: *size,
                    limit: *limit,
                }
            }
            FtpBridgeError::FileInaccessible(s) => FtpBridgeError::FileInaccessible(s.clone()),
            FtpBridgeError::Protocol(s) => FtpBridgeError::Protocol(s.clone()),
            FtpBridgeError::Timeout(s) => FtpBridgeError::Timeout(s.clone()),
            FtpBridgeError::Internal(s) => FtpBridgeError::Internal(s.clone()),
        }
    }
}

impl PartialEq for FtpBridgeError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FtpBridgeError::Io(e1), FtpBridgeError::Io(e2)) => e1.to_string() == e2.to_string(),
            (FtpBridgeError::ConnectionNotFound(s1), FtpBridgeError::ConnectionNotFound(s2)) => {
                s1 == s2
            }
            (FtpBridgeError::ConnectionInactive(s1), FtpBridgeError::ConnectionInactive(s2)) => {
                s1 == s2
            }
            (
                FtpBridgeError::ConnectionLimitReached { host: h1, limit: l1 },
                FtpBridgeError::ConnectionLimitReached { host: h2, limit: l2 },
            ) => h1 == h2 && l1 == l2,
            (FtpBridgeError::ReconnectInProgress(s1), FtpBridgeError::ReconnectInProgress(s2)) => {
                s1 == s2
            }
            (FtpBridgeError::OperationFailed(s1), FtpBridgeError::OperationFailed(s2)) => s1 == s2,
            (
                FtpBridgeError::TransferTooLarge {
                    path: p1,
                    size: s1,
                    limit: l1,
                },
                FtpBridgeError::TransferTooLarge {
                    path: p2,
                    size: s2,
                    limit: l2,
                },
            ) => p1 == p2 && s1 == s2 && l1 == l2,
            (FtpBridgeError::FileInaccessible(s1), FtpBridgeError::FileInaccessible(s2)) => {
                s1 == s2
            }
            (FtpBridgeError::Protocol(s1), FtpBridgeError::Protocol(s2)) => s1 == s2,
            (FtpBridgeError::Timeout(s1), FtpBridgeError::Timeout(s2)) => s1 == s2,
            (FtpBridgeError::Internal(s1), FtpBridgeError::Internal(s2)) => s1 == s2,
            _ => false,
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for FtpBridgeError {
    fn from(e: std::io::Error) -> Self {
        FtpBridgeError::Io(Arc::new(e))
    }
}

impl From<tokio::time::error::Elapsed> for FtpBridgeError {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        FtpBridgeError::Timeout(e.to_string())
    }
}
