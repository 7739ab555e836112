//! Filesystem plugin discovery (spec §6, Filesystem conventions).

use std::path::{Path, PathBuf};

use plugin_host_core::dylib::has_native_library_suffix;
use walkdir::WalkDir;

/// Only files matching the platform-native shared-library suffix *and*
/// whose basename starts with `plugin_` are offered for loading.
/// Subdirectories are recursed.
pub fn discover_plugin_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_native_library_suffix(path) && has_plugin_basename(path))
        .collect()
}

fn has_plugin_basename(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.starts_with("plugin_"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use plugin_host_core::dylib::native_library_suffix;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, b"").expect("write stub file");
    }

    #[test]
    fn finds_matching_files_recursively() {
        let dir = tempdir().expect("tempdir");
        let suffix = native_library_suffix();
        touch(&dir.path().join(format!("plugin_x.{suffix}")));
        touch(&dir.path().join("subdir").join(format!("plugin_y.{suffix}")));

        let mut found = discover_plugin_files(dir.path());
        found.sort();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn rejects_wrong_prefix_and_wrong_suffix() {
        let dir = tempdir().expect("tempdir");
        let suffix = native_library_suffix();
        touch(&dir.path().join(format!("helper_x.{suffix}")));
        touch(&dir.path().join("plugin_x.txt"));

        assert!(discover_plugin_files(dir.path()).is_empty());
    }
}
