// src/core/tasks/keepalive.rs

//! The per-record keepalive scheduler.
//!
//! Legacy servers silently drop sessions their idle timer deems dead, so each
//! record gets a periodic probe that exercises the control channel on a fixed
//! cadence. Probes go through the operation queue like any other command.
//! The task's handle lives in its record and is cancel-and-replaced whenever
//! the session is swapped, so two probe loops never compete on one key.

use crate::connection::{ConnectionRecord, ConnectionRegistry};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub struct KeepaliveTask {
    registry: Arc<ConnectionRegistry>,
    record: Arc<ConnectionRecord>,
}

impl KeepaliveTask {
    pub fn new(registry: Arc<ConnectionRegistry>, record: Arc<ConnectionRecord>) -> Self {
        Self { registry, record }
    }

    /// Runs the probe loop until the record is removed or the session is
    /// replaced (either aborts this task through the record's handle).
    /// Returns a boxed future: the loop reaches `ensure_active`, which
    /// spawns a replacement of this very task, and that recursion needs an
    /// explicitly `Send` type to resolve.
    pub fn run(self) -> BoxFuture<'static, ()> {
        Box::pin(self.run_inner())
    }

    async fn run_inner(self) {
        let cadence = self.record.policy().keepalive_interval();
        debug!(
            "Keepalive started for {} (interval {:?}).",
            self.record.key(),
            cadence
        );
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; the session
        // was just exercised, so skip it.
        interval.tick().await;

        loop {
            interval.tick().await;

            if self.record.is_reconnecting.load(Ordering::SeqCst) {
                continue;
            }

            if self.probe_once().await {
                continue;
            }

            warn!(
                "Keepalive probe failed for {}; attempting repair.",
                self.record.key()
            );
            if !self.registry.ensure_active(&self.record).await {
                warn!(
                    "Keepalive could not revive {}; evicting the record.",
                    self.record.key()
                );
                // Identity-checked: a probe loop left over from a replaced
                // record must never take the live one down with it.
                self.registry.remove_if_current(&self.record).await;
                return;
            }
            // On success ensure_active restarted the keepalive against the
            // fresh session, aborting this task at the next tick.
        }
    }

    /// One probe: `NOOP` first; some servers reject it, so fall back within
    /// the same tick to a working-directory query before giving up.
    async fn probe_once(&self) -> bool {
        let log_commands = self.record.policy().log_commands;
        if log_commands {
            debug!("{}: NOOP", self.record.key());
        }
        let noop = self
            .record
            .run_queued(|session| async move {
                session.lock().await.raw_command("NOOP").await.map(|_| ())
            })
            .await;
        match noop {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    "NOOP rejected for {} ({e}); falling back to PWD.",
                    self.record.key()
                );
                self.record
                    .run_queued(|session| async move {
                        session.lock().await.working_directory().await.map(|_| ())
                    })
                    .await
                    .is_ok()
            }
        }
    }
}
