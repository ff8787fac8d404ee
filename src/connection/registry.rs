// src/connection/registry.rs

//! Defines `ConnectionRegistry`, the process-wide keyed store of connection
//! records. It is the only place records are admitted or removed, and the
//! single point of truth preventing duplicate sessions per key.
//!
//! The registry is an explicit, injectable object (built once, shared via
//! `Arc`) rather than ambient global state, so request handlers receive it by
//! constructor injection and tests can run isolated instances.

use crate::config::{ConnectionPolicy, PoolConfig};
use crate::connection::record::{ConnectionKey, ConnectionRecord, ConnectionSummary};
use crate::core::FtpBridgeError;
use crate::core::protocol::{Credentials, Endpoint, SessionFactory};
use crate::core::tasks::keepalive::KeepaliveTask;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bound on the best-effort `QUIT` during teardown; a dead peer must not
/// stall removal.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ConnectionRegistry {
    pub(crate) records: DashMap<ConnectionKey, Arc<ConnectionRecord>>,
    pub(crate) factory: Arc<dyn SessionFactory>,
    config: PoolConfig,
}

impl ConnectionRegistry {
    pub fn new(factory: Arc<dyn SessionFactory>, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            records: DashMap::new(),
            factory,
            config,
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Connects and admits a record under its composite key, replacing any
    /// stale entry, and starts its keepalive scheduler. Called after the HTTP
    /// layer has externally authenticated the user.
    pub async fn register(
        self: &Arc<Self>,
        endpoint: Endpoint,
        credentials: Credentials,
        policy: ConnectionPolicy,
    ) -> Result<ConnectionKey, FtpBridgeError> {
        let key = ConnectionKey::new(endpoint.host.clone(), endpoint.port, &credentials.user);

        // Pre-dial check, so a doomed registration fails before the handshake.
        // Re-registering the same key replaces the old session and so does not
        // count against the cap.
        if policy.max_connections_per_host > 0
            && self.host_count_excluding(&endpoint.host, &key) >= policy.max_connections_per_host
        {
            return Err(FtpBridgeError::ConnectionLimitReached {
                host: endpoint.host.clone(),
                limit: policy.max_connections_per_host,
            });
        }

        let session = tokio::time::timeout(
            policy.connection_timeout(),
            self.factory.connect(&endpoint, &credentials, &policy),
        )
        .await
        .map_err(|_| FtpBridgeError::Timeout(format!("connecting to {endpoint}")))??;

        let record = Arc::new(ConnectionRecord::new(
            key.clone(),
            endpoint.clone(),
            credentials,
            policy.clone(),
            session,
        ));

        if let Some((_, stale)) = self.records.remove(&key) {
            warn!("Replacing stale connection record for {key}.");
            teardown(&stale).await;
        }

        // Re-verify the cap at admission: the scan above ran before the
        // connect await, and other registrations may have landed since.
        if policy.max_connections_per_host > 0
            && self.host_count_excluding(&endpoint.host, &key) >= policy.max_connections_per_host
        {
            teardown(&record).await;
            return Err(FtpBridgeError::ConnectionLimitReached {
                host: endpoint.host,
                limit: policy.max_connections_per_host,
            });
        }

        // The keepalive is attached before the record becomes visible, so any
        // record displaced from the map always has a cancellable timer. No
        // await between the re-check above and the insert below.
        let task = KeepaliveTask::new(Arc::clone(self), Arc::clone(&record));
        record.set_keepalive(tokio::spawn(task.run()));

        if let Some(displaced) = self.records.insert(key.clone(), Arc::clone(&record)) {
            // A racing registration for this key was admitted while the
            // stale teardown above was suspended. It loses; quiesce it.
            warn!("Replacing concurrently admitted record for {key}.");
            teardown(&displaced).await;
        }

        info!("Registered connection {key}.");
        Ok(key)
    }

    /// Records on `host` other than `key` itself, for the per-host cap.
    fn host_count_excluding(&self, host: &str, key: &ConnectionKey) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.key().host == host && *entry.key() != *key)
            .count()
    }

    /// Looks a record up by key. Counts as activity: a caller about to use the
    /// record should not see it reaped from under them.
    pub fn lookup(&self, key: &ConnectionKey) -> Option<Arc<ConnectionRecord>> {
        let record = self.records.get(key).map(|entry| Arc::clone(entry.value()));
        if let Some(record) = &record {
            record.touch();
        }
        record
    }

    /// Like `lookup`, but an absent key surfaces as an error the HTTP layer
    /// can map directly.
    pub fn get(&self, key: &ConnectionKey) -> Result<Arc<ConnectionRecord>, FtpBridgeError> {
        self.lookup(key)
            .ok_or_else(|| FtpBridgeError::ConnectionNotFound(key.to_string()))
    }

    /// Removes a record: cancels its keepalive, aborts its queue worker,
    /// best-effort closes the session and deletes the entry. Close failures
    /// are logged, never surfaced.
    pub async fn remove(&self, key: &ConnectionKey) {
        if let Some((_, record)) = self.records.remove(key) {
            teardown(&record).await;
            info!("Removed connection {key}.");
        }
    }

    /// Removes a record only if it is still the one registered under its
    /// key. Background tasks use this so that holding a record which has
    /// since been replaced cannot evict its replacement.
    pub async fn remove_if_current(&self, record: &Arc<ConnectionRecord>) {
        let removed = self
            .records
            .remove_if(record.key(), |_, current| Arc::ptr_eq(current, record));
        if let Some((key, record)) = removed {
            teardown(&record).await;
            info!("Removed connection {key}.");
        }
    }

    /// A credential-redacted snapshot of every pooled connection.
    pub fn list(&self) -> Vec<ConnectionSummary> {
        self.records
            .iter()
            .map(|entry| entry.value().summary())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One reaper sweep: snapshot the expired keys first, then act, so the
    /// scan tolerates concurrent registration and removal. Returns the number
    /// of records evicted.
    pub async fn reap_idle(&self) -> usize {
        let expired: Vec<ConnectionKey> = self
            .records
            .iter()
            .filter(|entry| entry.value().idle_for() >= entry.value().policy().idle_timeout())
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in expired {
            // A request may have touched the record since the snapshot.
            if let Some(record) = self.records.get(&key).map(|e| Arc::clone(e.value())) {
                if record.idle_for() < record.policy().idle_timeout() {
                    continue;
                }
                debug!("Reaping idle connection {key}.");
                self.remove_if_current(&record).await;
                evicted += 1;
            }
        }
        evicted
    }
}

/// Quiesces a record that has left (or is about to leave) the registry.
/// Ordering matters when the keepalive task itself triggered the removal: the
/// session close must complete before the keepalive handle is aborted, since
/// aborting one's own task only lands at the next suspension point.
pub(crate) async fn teardown(record: &Arc<ConnectionRecord>) {
    record.queue().shutdown();
    record.set_connected(false);

    let session = record.session();
    let closed = tokio::time::timeout(CLOSE_TIMEOUT, async {
        session.lock().await.close().await;
    })
    .await;
    if closed.is_err() {
        warn!("Session close for {} timed out; dropping it.", record.key());
    }

    record.cancel_keepalive();
}
