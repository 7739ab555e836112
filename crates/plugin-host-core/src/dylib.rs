//! Dynamic-library facade: uniform open/resolve/close over the OS dynamic
//! linker (spec §4.1).
//!
//! The facade owns no state between calls beyond the open handle itself.
//! Opening is lazy-binding-equivalent (whatever `libloading`/the platform
//! loader does by default). Closing is destructive and must happen exactly
//! once per successful open — enforced here by [`DynamicLibrary`] owning the
//! handle and dropping it on `Drop`.

use std::ffi::OsStr;
use std::path::Path;

use libloading::{Library, Symbol};

/// An open shared library.
///
/// Wraps `libloading::Library` one-to-one; the wrapper exists so the rest
/// of this crate talks to "the dynamic-library facade" rather than to
/// `libloading` directly, keeping the seam spec §4.1 describes as a single
/// narrow type.
pub struct DynamicLibrary {
    inner: Library,
}

impl DynamicLibrary {
    /// Open a library by filesystem path.
    ///
    /// # Safety
    ///
    /// Loading an arbitrary shared library runs its initializers with the
    /// full privileges of this process. Plugins are trusted native code
    /// (spec §1, Non-goals); the caller is responsible for only pointing
    /// this at plugins it intends to trust.
    pub unsafe fn open(path: &Path) -> Result<Self, String> {
        // SAFETY: forwarded to the caller's safety contract above.
        let inner = unsafe { Library::new(path) }.map_err(|e| last_error_string(&e))?;
        Ok(Self { inner })
    }

    /// Resolve a named symbol to a typed function pointer, or `None` if the
    /// library does not export it.
    ///
    /// # Safety
    ///
    /// The caller must ensure `T` matches the actual signature of the
    /// exported symbol; a mismatch is instant undefined behavior on call.
    pub unsafe fn resolve<T>(&self, name: &str) -> Option<Symbol<'_, T>> {
        // libloading requires a NUL-terminated symbol name.
        let mut owned = name.as_bytes().to_vec();
        owned.push(0);
        // SAFETY: forwarded to the caller's safety contract above.
        unsafe { self.inner.get::<T>(&owned) }.ok()
    }
}

/// Trim a `libloading::Error` down to the platform error string spec §4.1
/// calls for, with no source chain or Rust-side formatting noise.
fn last_error_string(error: &libloading::Error) -> String {
    error.to_string().trim().to_owned()
}

/// Platform-native shared-library file suffix, used by plugin discovery
/// (spec §6) to filter candidate files.
pub const fn native_library_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Whether `path`'s extension matches [`native_library_suffix`].
pub fn has_native_library_suffix(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(native_library_suffix()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn opening_a_missing_path_reports_trimmed_error() {
        let result = unsafe { DynamicLibrary::open(Path::new("/nonexistent/plugin_x.so")) };
        let err = result.expect_err("missing library must fail to open");
        assert!(!err.is_empty());
        assert_eq!(err, err.trim());
    }

    #[test]
    fn suffix_filter_rejects_unrelated_extensions() {
        assert!(!has_native_library_suffix(Path::new("plugin_x.txt")));
        assert!(has_native_library_suffix(Path::new(
            format!("plugin_x.{}", native_library_suffix()).as_str()
        )));
    }
}
