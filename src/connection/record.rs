// src/connection/record.rs

//! Defines `ConnectionRecord`, the unit of pooled state: identity, session
//! handle, activity clock, operation queue and keepalive timer.

use crate::config::ConnectionPolicy;
use crate::connection::OperationQueue;
use crate::core::FtpBridgeError;
use crate::core::protocol::{Credentials, Endpoint, FtpSession};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The composite key identifying a logical connection slot: one live record
/// exists per (host, port, user) at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl ConnectionKey {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
        }
    }
}

/// The string form doubles as the connection id handed to HTTP callers.
impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

impl FromStr for ConnectionKey {
    type Err = FtpBridgeError;

    /// Parses a connection id of the form `user@host:port`. The user part may
    /// itself contain `@`, so the split is taken from the right.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, addr) = s
            .rsplit_once('@')
            .ok_or_else(|| FtpBridgeError::Internal(format!("invalid connection id '{s}'")))?;
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| FtpBridgeError::Internal(format!("invalid connection id '{s}'")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| FtpBridgeError::Internal(format!("invalid port in connection id '{s}'")))?;
        if user.is_empty() || host.is_empty() {
            return Err(FtpBridgeError::Internal(format!(
                "invalid connection id '{s}'"
            )));
        }
        Ok(ConnectionKey::new(host, port, user))
    }
}

/// The exclusively-owned session handle. Swapped wholesale on reconnect; the
/// inner mutex is only ever contended by the record's single queue worker and
/// the reconnector's critical section.
pub type SharedSession = Arc<tokio::sync::Mutex<Box<dyn FtpSession>>>;

/// A credential-free snapshot of one record, for diagnostic/status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub connected: bool,
    pub reconnecting: bool,
    pub idle_secs: u64,
}

/// One pooled connection. All mutation of `session`, `queue` and the
/// keepalive handle happens either inside a queued operation or inside the
/// reconnector's critical section; no other code path may touch them.
pub struct ConnectionRecord {
    key: ConnectionKey,
    endpoint: Endpoint,
    credentials: Credentials,
    policy: ConnectionPolicy,
    /// Current session slot. Replaced, never mutated in place.
    session: RwLock<SharedSession>,
    /// Current queue slot. Reset to a fresh chain on reconnect.
    queue: RwLock<Arc<OperationQueue>>,
    /// Best-known liveness.
    connected: AtomicBool,
    /// Monotonic, non-decreasing. Touched on every completed operation,
    /// keepalive probes included, successful or not.
    last_activity: Mutex<Instant>,
    /// Observable guard flag; the gate below is what actually excludes.
    pub(crate) is_reconnecting: AtomicBool,
    /// Single-slot reconnect gate. Concurrent callers await the in-flight
    /// attempt's outcome instead of starting a redundant one.
    pub(crate) reconnect_gate: tokio::sync::Mutex<()>,
    /// Cancellable handle to the periodic keepalive probe.
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionRecord {
    pub(crate) fn new(
        key: ConnectionKey,
        endpoint: Endpoint,
        credentials: Credentials,
        policy: ConnectionPolicy,
        session: Box<dyn FtpSession>,
    ) -> Self {
        let queue = OperationQueue::new(key.to_string());
        Self {
            key,
            endpoint,
            credentials,
            policy,
            session: RwLock::new(Arc::new(tokio::sync::Mutex::new(session))),
            queue: RwLock::new(Arc::new(queue)),
            connected: AtomicBool::new(true),
            last_activity: Mutex::new(Instant::now()),
            is_reconnecting: AtomicBool::new(false),
            reconnect_gate: tokio::sync::Mutex::new(()),
            keepalive: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Time since the last completed operation.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Advances the activity clock. `Instant::now()` is monotonic, but the
    /// explicit `max` keeps the non-decreasing invariant independent of it.
    pub(crate) fn touch(&self) {
        let mut last = self.last_activity.lock();
        *last = (*last).max(Instant::now());
    }

    pub(crate) fn session(&self) -> SharedSession {
        Arc::clone(&self.session.read())
    }

    /// Installs a fresh session. Only the reconnector calls this, from inside
    /// its critical section.
    pub(crate) fn swap_session(&self, session: Box<dyn FtpSession>) {
        *self.session.write() = Arc::new(tokio::sync::Mutex::new(session));
    }

    pub(crate) fn queue(&self) -> Arc<OperationQueue> {
        Arc::clone(&self.queue.read())
    }

    /// Replaces the queue with an empty chain, aborting the old worker and
    /// abandoning whatever it still held.
    pub(crate) fn reset_queue(&self) {
        let fresh = Arc::new(OperationQueue::new(self.key.to_string()));
        let old = std::mem::replace(&mut *self.queue.write(), fresh);
        old.shutdown();
    }

    /// Installs a new keepalive task handle, cancelling the previous one so
    /// two probe loops never compete on the same key.
    pub(crate) fn set_keepalive(&self, handle: JoinHandle<()>) {
        if let Some(old) = self.keepalive.lock().replace(handle) {
            old.abort();
        }
    }

    pub(crate) fn cancel_keepalive(&self) {
        if let Some(handle) = self.keepalive.lock().take() {
            handle.abort();
        }
    }

    /// Submits an operation against the current session through the record's
    /// queue. Fails fast while a reconnect holds the record; updates the
    /// activity clock whether the operation succeeded or failed.
    pub async fn run_queued<T, F, Fut>(&self, op: F) -> Result<T, FtpBridgeError>
    where
        F: FnOnce(SharedSession) -> Fut,
        Fut: Future<Output = Result<T, FtpBridgeError>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_reconnecting.load(Ordering::SeqCst) {
            return Err(FtpBridgeError::ReconnectInProgress(self.key.to_string()));
        }
        let session = self.session();
        let queue = self.queue();
        let result = queue.enqueue(op(session)).await;
        self.touch();
        if result.is_ok() {
            self.set_connected(true);
        }
        result
    }

    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            id: self.key.to_string(),
            host: self.key.host.clone(),
            port: self.key.port,
            user: self.key.user.clone(),
            connected: self.is_connected(),
            reconnecting: self.is_reconnecting.load(Ordering::SeqCst),
            idle_secs: self.idle_for().as_secs(),
        }
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("key", &self.key)
            .field("connected", &self.is_connected())
            .field("reconnecting", &self.is_reconnecting.load(Ordering::SeqCst))
            .field("idle", &self.idle_for())
            .finish()
    }
}
