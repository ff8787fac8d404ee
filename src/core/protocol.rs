// src/core/protocol.rs

//! The seam to the wire-level FTP client capability.
//!
//! The connection layer never speaks the protocol itself. It drives an
//! existing client implementation through the `FtpSession` trait and obtains
//! fresh sessions from a `SessionFactory`. Handshake, TLS setup and protocol
//! version negotiation are the factory's concern.

use crate::config::ConnectionPolicy;
use crate::core::FtpBridgeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// The network location of a legacy file-transfer server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An opaque credential reference. Ownership of the secret belongs to the
/// caller; this layer only forwards it to the factory and must never log it.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    secret: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
        }
    }

    /// Hands the secret to a session factory. Not for diagnostic surfaces.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// The secret must never reach logs or status endpoints, so `Debug` redacts it.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A single entry from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub permissions: Option<String>,
    pub is_directory: bool,
}

/// An authenticated control-channel session on a legacy server.
///
/// Sessions are stateful and non-reentrant: issuing two commands concurrently
/// desynchronizes the control channel. The connection layer therefore only
/// ever drives a session from inside its record's operation queue.
#[async_trait]
pub trait FtpSession: Send {
    /// `PWD`: the cheapest universally-supported probe command.
    async fn working_directory(&mut self) -> Result<String, FtpBridgeError>;

    /// Sends a raw protocol command (e.g. `NOOP`) and returns the reply line.
    async fn raw_command(&mut self, command: &str) -> Result<String, FtpBridgeError>;

    async fn list(&mut self, path: &str) -> Result<Vec<DirEntry>, FtpBridgeError>;

    async fn size(&mut self, path: &str) -> Result<u64, FtpBridgeError>;

    /// Streams the remote file at `path` into `sink`.
    async fn download_to(
        &mut self,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        path: &str,
    ) -> Result<(), FtpBridgeError>;

    /// Streams `source` to the remote file at `path`, replacing it.
    async fn upload_from(
        &mut self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        path: &str,
    ) -> Result<(), FtpBridgeError>;

    /// Best-effort `QUIT`. Implementations swallow transport errors here.
    async fn close(&mut self);
}

/// Builds authenticated sessions. Implementations own the handshake and apply
/// the timeout bounds from `policy` (connection, data channel, PASV).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        policy: &ConnectionPolicy,
    ) -> Result<Box<dyn FtpSession>, FtpBridgeError>;
}
