// src/core/tasks/idle_reaper.rs

//! A task that periodically evicts connections unused beyond their idle
//! threshold, bounding resource usage against per-host connection caps.

use crate::connection::ConnectionRegistry;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct IdleReaperTask {
    registry: Arc<ConnectionRegistry>,
}

impl IdleReaperTask {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Runs the main loop for the idle reaper. Each sweep snapshots the
    /// expired keys before acting, so concurrent registration and removal
    /// never invalidate the scan. Evictions are logged, not reported: no
    /// caller is waiting on them.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let sweep = self.registry.config().reap_interval();
        info!("Idle reaper started. Sweep interval: {:?}", sweep);
        let mut interval = tokio::time::interval(sweep);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = self.registry.reap_idle().await;
                    if evicted > 0 {
                        debug!("Idle reaper evicted {evicted} connection(s).");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Idle reaper shutting down.");
                    return;
                }
            }
        }
    }
}
