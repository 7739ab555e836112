//! Convenience re-export surface for downstream crates.

pub use crate::bindings::bind_host_api;
pub use crate::config::ManagerConfig;
pub use crate::discovery::discover_plugin_files;
pub use crate::error::ManagerError;
pub use crate::manager::PluginManager;
pub use crate::overlay::{DockState, OverlaySurface};
