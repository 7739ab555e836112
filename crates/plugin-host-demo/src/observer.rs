//! Logs every scheduler handshake transition through `tracing`, so running
//! the demo under `RUST_LOG=debug` shows the exact vsync/pacing interleaving
//! spec §4.3 describes.

use std::path::Path;

use plugin_host_core::record::{SchedulerEvent, SchedulerObserver};

pub struct TracingObserver;

impl SchedulerObserver for TracingObserver {
    fn on_event(&self, path: &Path, event: SchedulerEvent) {
        let plugin = path.display();
        match event {
            SchedulerEvent::WorkerSpawned => tracing::info!(%plugin, "worker spawned"),
            SchedulerEvent::AdvancedToVsync => tracing::debug!(%plugin, "parked at vsync boundary"),
            SchedulerEvent::CompletedMainLoop => tracing::debug!(%plugin, "parked at main-loop boundary"),
            SchedulerEvent::QueuedForRemoval => tracing::info!(%plugin, "queued for teardown"),
            SchedulerEvent::TornDown => tracing::info!(%plugin, "torn down"),
        }
    }
}
