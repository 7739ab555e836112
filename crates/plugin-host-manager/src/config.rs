//! Manager tuning knobs. The spec's only numeric constant (the pacing
//! interval) is fixed in `plugin-host-abi`; this module holds the
//! operational choices layered on top of it.

use std::time::Duration;

use plugin_host_abi::PACING_INTERVAL;

/// Tunables for a [`crate::manager::PluginManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory plugins are discovered under (spec §6, Filesystem
    /// conventions).
    pub plugins_dir: std::path::PathBuf,
    /// How often the pacing thread wakes to drive plugins parked at a
    /// main-loop boundary (spec §4.3.4).
    pub pacing_interval: Duration,
}

impl ManagerConfig {
    /// The production default: the nominal per-user plugins directory, and
    /// the spec's four-frame pacing interval.
    pub fn production() -> Self {
        let plugins_dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("yuzu")
            .join("plugins");
        Self {
            plugins_dir,
            pacing_interval: PACING_INTERVAL,
        }
    }

    /// A development/test preset with a much shorter pacing interval, so
    /// integration tests don't wait real frame times for the fallback
    /// driver to make progress.
    pub fn fast_pacing(plugins_dir: std::path::PathBuf) -> Self {
        Self {
            plugins_dir,
            pacing_interval: Duration::from_millis(1),
        }
    }
}
