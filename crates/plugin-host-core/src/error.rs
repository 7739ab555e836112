//! Error taxonomy for loading and driving a plugin (spec §7).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a plugin library, before any worker
/// has been spawned.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The dynamic linker could not open the library file.
    #[error("failed to open plugin library at {path}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    /// The `get_plugin_interface_version` symbol was missing, or it
    /// returned a value other than the host's constant.
    #[error(
        "ABI mismatch loading {path}: host interface version {expected}, plugin reported {actual:?}"
    )]
    AbiMismatch {
        path: PathBuf,
        expected: u64,
        actual: Option<u64>,
    },

    /// A mandatory entry point (`start` or `on_main_loop`) was not exported.
    #[error("plugin at {path} is missing required entry point {symbol}")]
    MissingEntrypoint { path: PathBuf, symbol: &'static str },
}

/// Errors surfaced by the scheduler driver while a plugin is being run.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread for plugin {name}: {reason}")]
    WorkerSpawnFailed { name: String, reason: String },

    /// The worker thread panicked or otherwise could not be joined cleanly.
    #[error("worker thread for plugin {name} did not exit cleanly")]
    WorkerJoinFailed { name: String },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn abi_mismatch_message_carries_both_versions() {
        let err = LoadError::AbiMismatch {
            path: PathBuf::from("plugin_x.so"),
            expected: 1,
            actual: Some(2),
        };
        let message = err.to_string();
        assert!(message.contains('1'));
        assert!(message.contains('2'));
    }

    #[test]
    fn abi_mismatch_missing_symbol_reports_none() {
        let err = LoadError::AbiMismatch {
            path: PathBuf::from("plugin_x.so"),
            expected: 1,
            actual: None,
        };
        assert!(err.to_string().contains("None"));
    }
}
