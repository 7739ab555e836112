//! The single-pass driving primitive (spec §4.3.2). Multi-plugin iteration
//! — which plugins get a vsync pass versus a pacing pass, and draining the
//! pending-removal list — belongs to the manager, which owns the plugin
//! list; this module only knows how to drive one already-identified
//! [`PluginRecord`] through one pass.

use std::sync::Arc;

use crate::record::{HandshakeState, PluginRecord};

/// What woke this pass: the emulator's vsync event, or the fallback pacing
/// thread (spec §4.3.3 / §4.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Vsync,
    MainLoopPace,
}

/// What the plugin did with the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The plugin called `advance_frame` and is now waiting for the next
    /// vsync trigger.
    ParkedVsync,
    /// `on_main_loop` returned; the plugin is eligible for another pass on
    /// the next pacing or vsync trigger.
    ParkedMainLoop,
    /// The worker observed a stop request and exited.
    Stopped,
}

/// Drive one plugin through a single pass, per spec §4.3.2:
///
/// 1. Ensure the worker is started.
/// 2. Wake it and wait for it to park again.
/// 3. Report which boundary it parked at.
///
/// A plugin parked at `ParkedVsync` only accepts [`TriggerKind::Vsync`];
/// one parked at `ParkedMainLoop` only accepts [`TriggerKind::MainLoopPace`].
/// Vsync-triggered loops never run a plugin parked at a main-loop boundary,
/// and pacing-triggered passes do the inverse (spec §4.3.5).
pub fn drive_single_pass(record: &Arc<PluginRecord>, trigger: TriggerKind) -> Option<PassOutcome> {
    let eligible = match (record.current_state(), trigger) {
        (HandshakeState::ParkedVsync, TriggerKind::Vsync) => true,
        (HandshakeState::ParkedMainLoop, TriggerKind::MainLoopPace) => true,
        _ => false,
    };
    if !eligible {
        return None;
    }

    record.ensure_worker_started().ok()?;

    Some(match record.drive_one_pass() {
        HandshakeState::ParkedVsync => PassOutcome::ParkedVsync,
        HandshakeState::ParkedMainLoop => PassOutcome::ParkedMainLoop,
        HandshakeState::Stopped => PassOutcome::Stopped,
        HandshakeState::Running => {
            unreachable!("drive_one_pass only returns once the worker has parked or stopped")
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::dylib::DynamicLibrary;
    use crate::testing::StubEmulator;
    use plugin_host_abi::PluginContext;
    use std::path::PathBuf;

    extern "C" fn noop_main_loop(_ctx: PluginContext) {}

    extern "C" fn one_advance_then_return(ctx: PluginContext) {
        // SAFETY: test-only; ctx always points at a live PluginRecord below.
        let record = unsafe { PluginRecord::from_context(ctx) };
        record.park_until_vsync();
    }

    fn library_stub() -> DynamicLibrary {
        #[cfg(unix)]
        let self_path = PathBuf::from("/proc/self/exe");
        #[cfg(not(unix))]
        let self_path = std::env::current_exe().expect("current exe path");
        unsafe { DynamicLibrary::open(&self_path) }.expect("opening our own executable as a library")
    }

    #[test]
    fn pacing_trigger_drives_a_parked_main_loop_plugin() {
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        let outcome = drive_single_pass(&record, TriggerKind::MainLoopPace);
        assert_eq!(outcome, Some(PassOutcome::ParkedMainLoop));
        record.teardown();
    }

    #[test]
    fn pacing_trigger_does_not_drive_a_plugin_parked_at_vsync() {
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            one_advance_then_return,
            None,
            StubEmulator::new(true),
            None,
        );
        assert_eq!(
            drive_single_pass(&record, TriggerKind::MainLoopPace),
            Some(PassOutcome::ParkedVsync)
        );
        assert_eq!(drive_single_pass(&record, TriggerKind::MainLoopPace), None);
        assert_eq!(
            drive_single_pass(&record, TriggerKind::Vsync),
            Some(PassOutcome::ParkedMainLoop)
        );
        record.teardown();
    }

    #[test]
    fn vsync_trigger_does_not_drive_a_plugin_parked_at_main_loop_boundary() {
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        // Fresh record parks at the main-loop boundary; a vsync trigger
        // must not touch it (spec §4.3.5).
        assert_eq!(drive_single_pass(&record, TriggerKind::Vsync), None);
        assert_eq!(
            drive_single_pass(&record, TriggerKind::MainLoopPace),
            Some(PassOutcome::ParkedMainLoop)
        );
        record.teardown();
    }
}
