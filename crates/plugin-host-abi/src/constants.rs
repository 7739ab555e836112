//! Host-side constants a plugin must agree with.

/// The interface version the host requires. A plugin whose
/// `get_plugin_interface_version` export returns anything else is rejected
/// before `start` is ever called (spec §3, ABI version equality).
pub const PLUGIN_INTERFACE_VERSION: u64 = 1;

/// Export name of the version query. Mandatory.
pub const SYM_GET_INTERFACE_VERSION: &str = "get_plugin_interface_version";

/// Export name of the one-time setup call. Mandatory.
pub const SYM_START: &str = "start";

/// Export name of the repeated main-loop call. Mandatory.
pub const SYM_ON_MAIN_LOOP: &str = "on_main_loop";

/// Export name of the optional teardown call.
pub const SYM_ON_CLOSE: &str = "on_close";

/// Prefix shared by every host-API pointer-slot symbol (`yuzu_<api>`).
pub const HOST_API_SYMBOL_PREFIX: &str = "yuzu_";

/// How often the pacing thread wakes to drive plugins while the emulator is
/// not producing frames. Nominally four frame-times at 60 Hz.
pub const PACING_INTERVAL: std::time::Duration = std::time::Duration::from_millis(4 * 1000 / 60);

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn pacing_interval_is_four_frames_at_60hz() {
        assert_eq!(PACING_INTERVAL.as_millis(), 66);
    }

    #[test]
    fn symbol_names_have_no_prefix_baked_in() {
        assert!(!SYM_START.starts_with(HOST_API_SYMBOL_PREFIX));
    }
}
