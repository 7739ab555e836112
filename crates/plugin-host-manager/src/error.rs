//! Manager-facing error taxonomy (spec §7). These are the last-error-slot
//! contents; every one is a string by the time it's observable from the UI.

use std::path::PathBuf;

use plugin_host_core::LoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no plugin is loaded for path {0}")]
    NotLoaded(PathBuf),

    #[error("plugin at {0} is already loaded")]
    AlreadyLoaded(PathBuf),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn not_loaded_message_names_the_path() {
        let err = ManagerError::NotLoaded(PathBuf::from("plugin_x.so"));
        assert!(err.to_string().contains("plugin_x.so"));
    }
}
