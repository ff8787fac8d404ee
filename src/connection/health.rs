// src/connection/health.rs

//! On-demand liveness probing and the guarded reconnect path.
//!
//! State machine per record: assumed healthy -> probe in flight (via the
//! queue) -> healthy again on success; on failure -> reconnecting (single
//! in-flight attempt behind the record's gate) -> healthy with a fresh
//! session, reset queue and restarted keepalive; or dead, with the record
//! left in the registry marked unhealthy for the caller to judge.

use crate::connection::record::{ConnectionKey, ConnectionRecord};
use crate::connection::registry::ConnectionRegistry;
use crate::core::FtpBridgeError;
use crate::core::tasks::keepalive::KeepaliveTask;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bound on closing the broken session before dialing a new one.
const DISCARD_TIMEOUT: Duration = Duration::from_secs(5);

impl ConnectionRegistry {
    /// Resolves a connection id to a usable record: absent keys surface as
    /// `ConnectionNotFound`, irreparable sessions as `ConnectionInactive`.
    /// This is the request path's entry point.
    pub async fn acquire(
        self: &Arc<Self>,
        key: &ConnectionKey,
    ) -> Result<Arc<ConnectionRecord>, FtpBridgeError> {
        let record = self.get(key)?;
        if self.ensure_active(&record).await {
            Ok(record)
        } else {
            Err(FtpBridgeError::ConnectionInactive(key.to_string()))
        }
    }

    /// Confirms a record is usable, repairing it if necessary. Returns `true`
    /// when the session is live (possibly after a reconnect), `false` when
    /// the record is terminally unhealthy.
    pub async fn ensure_active(self: &Arc<Self>, record: &Arc<ConnectionRecord>) -> bool {
        if self.probe(record).await {
            record.set_connected(true);
            return true;
        }
        self.reconnect(record).await
    }

    /// Liveness probe, always through the queue: a working-directory query
    /// first, then one fallback listing of the root before declaring the
    /// session dead. No deeper fallback chain; two strikes is the contract.
    pub(crate) async fn probe(&self, record: &Arc<ConnectionRecord>) -> bool {
        let pwd = record
            .run_queued(|session| async move { session.lock().await.working_directory().await })
            .await;
        match pwd {
            Ok(_) => true,
            Err(e) => {
                debug!(
                    "Working-directory probe failed for {} ({e}); trying root listing.",
                    record.key()
                );
                record
                    .run_queued(|session| async move { session.lock().await.list("/").await })
                    .await
                    .is_ok()
            }
        }
    }

    /// Discards the broken session and builds a fresh one with identical
    /// identity. At most one attempt runs per record; concurrent callers
    /// block on the gate and adopt the in-flight attempt's outcome.
    async fn reconnect(self: &Arc<Self>, record: &Arc<ConnectionRecord>) -> bool {
        let _gate = match record.reconnect_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(
                    "Reconnect already in flight for {}; awaiting its outcome.",
                    record.key()
                );
                let _guard = record.reconnect_gate.lock().await;
                return record.is_connected();
            }
        };

        record.is_reconnecting.store(true, Ordering::SeqCst);
        record.set_connected(false);

        // Reset the chain first so no queued operation can still reach the
        // old session, then close it. Close errors are ignored.
        record.reset_queue();
        let old_session = record.session();
        let _ = tokio::time::timeout(DISCARD_TIMEOUT, async {
            old_session.lock().await.close().await;
        })
        .await;

        let policy = record.policy().clone();
        let attempts = policy.max_retries.max(1);
        let mut fresh = None;
        for attempt in 1..=attempts {
            let dialed = tokio::time::timeout(
                policy.connection_timeout(),
                self.factory
                    .connect(record.endpoint(), record.credentials(), &policy),
            )
            .await;
            match dialed {
                Ok(Ok(session)) => {
                    fresh = Some(session);
                    break;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Reconnect attempt {attempt}/{attempts} for {} failed: {e}",
                        record.key()
                    );
                }
                Err(_) => {
                    warn!(
                        "Reconnect attempt {attempt}/{attempts} for {} timed out.",
                        record.key()
                    );
                }
            }
            if attempt < attempts {
                tokio::time::sleep(policy.retry_delay()).await;
            }
        }

        match fresh {
            Some(session) => {
                // Everything from the swap to the return is synchronous. That
                // keeps the record consistent even when this very call runs
                // inside the old keepalive task, which set_keepalive aborts:
                // the abort only lands at the next suspension point.
                record.swap_session(session);
                record.touch();
                record.set_connected(true);
                record.is_reconnecting.store(false, Ordering::SeqCst);
                let task = KeepaliveTask::new(Arc::clone(self), Arc::clone(record));
                record.set_keepalive(tokio::spawn(task.run()));
                info!("Reconnected {}.", record.key());
                true
            }
            None => {
                record.set_connected(false);
                record.is_reconnecting.store(false, Ordering::SeqCst);
                warn!(
                    "Reconnect for {} exhausted {attempts} attempts; record is inactive.",
                    record.key()
                );
                false
            }
        }
    }
}
