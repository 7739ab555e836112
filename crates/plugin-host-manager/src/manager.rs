//! Lifecycle owner for the set of loaded plugins (spec §4.4).
//!
//! Owns the plugins list, the intended-loaded key-set, the pending-removal
//! list, the overlay canvas, the pacing thread, and the external callback
//! hooks. The scheduler core ([`plugin_host_core::scheduler`]) only knows
//! how to drive one already-identified record through one pass; this module
//! decides *which* records get driven by which trigger, and drains teardown.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::RgbaImage;
use parking_lot::Mutex;
use plugin_host_abi::constants::{
    PLUGIN_INTERFACE_VERSION, SYM_GET_INTERFACE_VERSION, SYM_ON_CLOSE, SYM_ON_MAIN_LOOP, SYM_START,
};
use plugin_host_abi::PluginContext;
use plugin_host_core::abi_check::{check_abi_compatibility, AbiCheckResult};
use plugin_host_core::dylib::DynamicLibrary;
use plugin_host_core::error::LoadError;
use plugin_host_core::facade::EmulatorFacade;
use plugin_host_core::record::{HandshakeState, PluginRecord, SchedulerObserver};
use plugin_host_core::scheduler::{drive_single_pass, PassOutcome, TriggerKind};

use crate::bindings::bind_host_api;
use crate::config::ManagerConfig;
use crate::discovery::discover_plugin_files;
use crate::error::ManagerError;
use crate::overlay::{DockState, OverlaySurface};

type RenderCallback = Box<dyn Fn(&RgbaImage) + Send + Sync>;
type ScreenshotCallback = Box<dyn Fn(u32, u32) -> Vec<u8> + Send + Sync>;
type ListChangedCallback = Box<dyn Fn() + Send + Sync>;

/// Owns every loaded plugin and the one pacing thread (spec §4.4, §5).
pub struct PluginManager {
    config: ManagerConfig,
    system: Arc<dyn EmulatorFacade>,
    observer: Option<Arc<dyn SchedulerObserver>>,

    plugins: Mutex<Vec<Arc<PluginRecord>>>,
    /// The intended-loaded key-set: source of truth for "should this plugin
    /// still run?" (spec §3, Key-set authority).
    key_set: Mutex<HashSet<PathBuf>>,
    pending_removal: Mutex<Vec<Arc<PluginRecord>>>,
    last_error: Mutex<Option<String>>,

    active: AtomicBool,
    pacing: Mutex<Option<JoinHandle<()>>>,
    /// Separate from `active`: controls the pacing thread's own lifetime,
    /// so it can be started at most once (per the `SetActive` open
    /// question's resolution, see DESIGN.md) yet still stop for good on
    /// `Drop` even if the manager is re-activated afterwards.
    pacing_run: Arc<AtomicBool>,

    overlay: Arc<Mutex<OverlaySurface>>,
    render_callback: Mutex<Option<RenderCallback>>,
    screenshot_callback: Mutex<Option<ScreenshotCallback>>,
    list_changed_callback: Mutex<Option<ListChangedCallback>>,
}

impl PluginManager {
    pub fn new(
        config: ManagerConfig,
        system: Arc<dyn EmulatorFacade>,
        observer: Option<Arc<dyn SchedulerObserver>>,
        initial_dock_state: DockState,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            system,
            observer,
            plugins: Mutex::new(Vec::new()),
            key_set: Mutex::new(HashSet::new()),
            pending_removal: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
            active: AtomicBool::new(false),
            pacing: Mutex::new(None),
            pacing_run: Arc::new(AtomicBool::new(false)),
            overlay: Arc::new(Mutex::new(OverlaySurface::new(initial_dock_state))),
            render_callback: Mutex::new(None),
            screenshot_callback: Mutex::new(None),
            list_changed_callback: Mutex::new(None),
        })
    }

    /// Candidate plugin files under the configured plugins directory (spec
    /// §6, Filesystem conventions). Purely informational; `load` still
    /// re-validates whatever path it's given.
    pub fn discover(&self) -> Vec<PathBuf> {
        discover_plugin_files(&self.config.plugins_dir)
    }

    /// The intended-loaded key-set, snapshotted under the manager's lock
    /// (spec §4.4, Enumerate).
    pub fn list(&self) -> Vec<PathBuf> {
        self.key_set.lock().iter().cloned().collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn set_render_callback(&self, callback: impl Fn(&RgbaImage) + Send + Sync + 'static) {
        *self.render_callback.lock() = Some(Box::new(callback));
    }

    pub fn set_screenshot_callback(&self, callback: impl Fn(u32, u32) -> Vec<u8> + Send + Sync + 'static) {
        *self.screenshot_callback.lock() = Some(Box::new(callback));
    }

    pub fn set_list_changed_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.list_changed_callback.lock() = Some(Box::new(callback));
    }

    fn notify_list_changed(&self) {
        if let Some(callback) = self.list_changed_callback.lock().as_ref() {
            callback();
        }
    }

    /// Update the overlay's recorded dock resolution (spec §4.5, scenario
    /// 6). A no-op if unchanged.
    pub fn sync_dock_state(&self, state: DockState) {
        self.overlay.lock().sync_dock_state(state);
    }

    /// Present the overlay canvas through the configured render callback.
    /// Returns `false` if the guest isn't running or no callback is set
    /// (spec §4.5, Property P5).
    pub fn render_overlay(&self) -> bool {
        let callback = self.render_callback.lock();
        match callback.as_deref() {
            Some(present) => self.overlay.lock().render(self.system.as_ref(), present),
            None => false,
        }
    }

    /// Capture a screenshot through the configured raw-pixel producer,
    /// optionally re-encoding to a named image format (spec §4.5).
    pub fn capture_overlay_screenshot(&self, width: u32, height: u32, encode_format: Option<&str>) -> Option<Vec<u8>> {
        let producer = self.screenshot_callback.lock();
        let raw = producer.as_deref()?(width, height);
        self.overlay
            .lock()
            .screenshot(self.system.as_ref(), &raw, width, height, encode_format)
    }

    /// Load a plugin: open its library, validate the entry points and ABI
    /// version, bind the host API table, call `start` exactly once, and
    /// insert it into the key-set (spec §4.4, Load).
    pub fn load(self: &Arc<Self>, path: &Path) -> Result<(), ManagerError> {
        let path = path.to_path_buf();
        if self.key_set.lock().contains(&path) {
            return Err(ManagerError::AlreadyLoaded(path));
        }

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("plugin")
            .to_owned();

        match self.open_and_start(&path, &name) {
            Ok(record) => {
                self.key_set.lock().insert(path.clone());
                self.plugins.lock().push(record);
                self.notify_list_changed();
                Ok(())
            }
            Err(err) => {
                *self.last_error.lock() = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn open_and_start(self: &Arc<Self>, path: &Path, name: &str) -> Result<Arc<PluginRecord>, ManagerError> {
        // SAFETY: plugins are trusted native code (spec §1, Non-goals).
        let library = unsafe { DynamicLibrary::open(path) }.map_err(|reason| LoadError::LoadFailure {
            path: path.to_path_buf(),
            reason,
        })?;

        // SAFETY: we only read the resolved pointer through its declared
        // `extern "C" fn() -> u64` signature, matching the plugin-facing
        // contract for this symbol.
        let reported_version = unsafe { library.resolve::<extern "C" fn() -> u64>(SYM_GET_INTERFACE_VERSION) }
            .map(|symbol| (*symbol)());

        match reported_version.map(check_abi_compatibility) {
            Some(AbiCheckResult::Compatible) => {}
            Some(AbiCheckResult::Mismatch { expected, actual }) => {
                return Err(LoadError::AbiMismatch {
                    path: path.to_path_buf(),
                    expected,
                    actual: Some(actual),
                }
                .into());
            }
            None => {
                return Err(LoadError::AbiMismatch {
                    path: path.to_path_buf(),
                    expected: PLUGIN_INTERFACE_VERSION,
                    actual: None,
                }
                .into());
            }
        }

        // SAFETY: see above; signature matches the plugin-facing contract.
        let start_fn = unsafe { library.resolve::<extern "C" fn(PluginContext)>(SYM_START) }
            .map(|symbol| *symbol)
            .ok_or_else(|| LoadError::MissingEntrypoint {
                path: path.to_path_buf(),
                symbol: "start",
            })?;

        // SAFETY: see above.
        let main_loop_fn = unsafe { library.resolve::<extern "C" fn(PluginContext)>(SYM_ON_MAIN_LOOP) }
            .map(|symbol| *symbol)
            .ok_or_else(|| LoadError::MissingEntrypoint {
                path: path.to_path_buf(),
                symbol: "on_main_loop",
            })?;

        // SAFETY: see above. `on_close` is optional (spec §6).
        let close_fn =
            unsafe { library.resolve::<extern "C" fn(PluginContext)>(SYM_ON_CLOSE) }.map(|symbol| *symbol);

        // SAFETY: `library` is moved into the record constructed below and
        // kept alive for the record's lifetime, which outlives every call
        // made through the pointers this publishes.
        unsafe { bind_host_api(&library, Arc::clone(&self.overlay)) };

        let record = PluginRecord::new(
            path.to_path_buf(),
            name.to_owned(),
            library,
            main_loop_fn,
            close_fn,
            Arc::clone(&self.system),
            self.observer.clone(),
        );

        start_fn(record.as_context());

        Ok(record)
    }

    /// Erase `path` from the key-set (spec §4.4, Remove). The scheduler
    /// completes teardown on the plugin's next main-loop boundary; this
    /// call never blocks on it.
    pub fn remove(&self, path: &Path) -> Result<(), ManagerError> {
        if self.key_set.lock().remove(path) {
            Ok(())
        } else {
            Err(ManagerError::NotLoaded(path.to_path_buf()))
        }
    }

    /// Flip the active flag; on the 0→1 transition, start the pacing
    /// thread. Resolves the spec's `SetActive` open question: the pacing
    /// thread is started at most once per manager for its entire lifetime,
    /// never re-spawned on a later 0→1 transition, and the key-set is never
    /// reset by activation — see DESIGN.md.
    pub fn set_active(self: &Arc<Self>, active: bool) {
        let was_active = self.active.swap(active, Ordering::SeqCst);
        if !was_active && active {
            self.start_pacing_thread();
        }
    }

    fn start_pacing_thread(self: &Arc<Self>) {
        let mut pacing = self.pacing.lock();
        if pacing.is_some() {
            return;
        }
        self.pacing_run.store(true, Ordering::SeqCst);

        let manager = Arc::clone(self);
        let run_flag = Arc::clone(&self.pacing_run);
        let interval = self.config.pacing_interval;

        match thread::Builder::new().name("plugin-host-pacing".into()).spawn(move || {
            while run_flag.load(Ordering::SeqCst) {
                thread::sleep(interval);
                if manager.active.load(Ordering::SeqCst) {
                    manager.pacing_tick();
                }
            }
        }) {
            Ok(handle) => *pacing = Some(handle),
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn plugin-host pacing thread");
                self.pacing_run.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Vsync entry point (spec §4.3.3), driven from the emulator's
    /// frame-producing pipeline. Drives every plugin currently parked at a
    /// vsync boundary through as many passes as it requests before
    /// yielding again, then drains teardown.
    pub fn on_vsync(&self) {
        let plugins = self.plugins.lock().clone();
        for record in &plugins {
            if record.current_state() != HandshakeState::ParkedVsync {
                continue;
            }
            loop {
                match drive_single_pass(record, TriggerKind::Vsync) {
                    Some(PassOutcome::ParkedVsync) | Some(PassOutcome::Stopped) | None => break,
                    Some(PassOutcome::ParkedMainLoop) => {
                        if self.queue_removal_if_unwanted(record) {
                            break;
                        }
                    }
                }
            }
        }
        self.drain_pending_removal();
    }

    /// Pacing entry point (spec §4.3.4), driven from the manager's own
    /// thread. Exactly one pass per plugin parked at a main-loop boundary.
    fn pacing_tick(&self) {
        let plugins = self.plugins.lock().clone();
        for record in &plugins {
            if record.current_state() != HandshakeState::ParkedMainLoop {
                continue;
            }
            if let Some(PassOutcome::ParkedMainLoop) = drive_single_pass(record, TriggerKind::MainLoopPace) {
                self.queue_removal_if_unwanted(record);
            }
        }
        self.drain_pending_removal();
    }

    /// Spec §4.3.2 step 4: if the worker just parked at a main-loop
    /// boundary and its path is no longer in the key-set, mark it stopped
    /// and queue it for teardown. Returns whether it was queued.
    fn queue_removal_if_unwanted(&self, record: &Arc<PluginRecord>) -> bool {
        if self.key_set.lock().contains(&record.path) {
            return false;
        }
        record.mark_stop_requested();
        self.pending_removal.lock().push(Arc::clone(record));
        true
    }

    /// Spec §4.3.3/§4.3.4 tail: invoke `on_close`, join the worker, close
    /// the library, remove from the plugins list, and notify list-changed
    /// (Property P2).
    fn drain_pending_removal(&self) {
        let removed: Vec<Arc<PluginRecord>> = std::mem::take(&mut *self.pending_removal.lock());
        if removed.is_empty() {
            return;
        }
        for record in &removed {
            record.teardown();
        }
        self.plugins
            .lock()
            .retain(|record| !removed.iter().any(|gone| Arc::ptr_eq(record, gone)));
        self.notify_list_changed();
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.pacing_run.store(false, Ordering::SeqCst);
        if let Some(handle) = self.pacing.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use plugin_host_core::dylib::DynamicLibrary;
    use plugin_host_core::record::PluginRecord;
    use plugin_host_core::testing::StubEmulator;
    use std::sync::atomic::{AtomicU32, AtomicUsize};

    // `open_and_start` requires a library exporting the real ABI entry
    // points by name, which only a compiled plugin artifact provides.
    // These scenario tests instead drive the manager's dispatch loop
    // directly against a hand-built `PluginRecord`, the same seam
    // `plugin-host-core`'s own tests use to exercise the handshake without
    // one.
    fn library_stub() -> DynamicLibrary {
        #[cfg(unix)]
        let self_path = std::path::PathBuf::from("/proc/self/exe");
        #[cfg(not(unix))]
        let self_path = std::env::current_exe().expect("current exe path");
        unsafe { DynamicLibrary::open(&self_path) }.expect("opening our own executable as a library")
    }

    extern "C" fn noop_main_loop(_ctx: plugin_host_abi::PluginContext) {}

    extern "C" fn one_advance_then_return(ctx: plugin_host_abi::PluginContext) {
        // SAFETY: test-only; ctx always points at a live PluginRecord below.
        let record = unsafe { PluginRecord::from_context(ctx) };
        record.park_until_vsync();
    }

    fn manager(config: ManagerConfig) -> Arc<PluginManager> {
        PluginManager::new(
            config,
            StubEmulator::new(true),
            None,
            DockState::Docked { width: 1280, height: 720 },
        )
    }

    #[test]
    fn loading_an_unopenable_path_reports_and_records_last_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let missing = dir.path().join("plugin_missing.so");

        let err = m.load(&missing).expect_err("missing library must fail to load");
        assert!(matches!(err, ManagerError::Load(LoadError::LoadFailure { .. })));
        assert!(m.last_error().is_some());
        assert!(m.list().is_empty());
    }

    #[test]
    fn loading_the_same_path_twice_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let missing = dir.path().join("plugin_missing.so");

        let _ = m.load(&missing);
        // Still not loaded (the open failed), so a second attempt hits the
        // same load failure, not "already loaded" -- confirm the key-set
        // was never polluted by the failed attempt.
        let err = m.load(&missing).expect_err("still missing");
        assert!(matches!(err, ManagerError::Load(LoadError::LoadFailure { .. })));
    }

    #[test]
    fn removing_an_unknown_path_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let err = m
            .remove(Path::new("plugin_never_loaded.so"))
            .expect_err("path was never in the key-set");
        assert!(matches!(err, ManagerError::NotLoaded(_)));
    }

    #[test]
    fn set_active_starts_the_pacing_thread_at_most_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));

        m.set_active(true);
        assert!(m.pacing.lock().is_some());
        m.set_active(false);
        m.set_active(true);
        // Re-activation does not spawn a second thread; the handle slot
        // still holds the original join handle.
        assert!(m.pacing.lock().is_some());
    }

    #[test]
    fn render_overlay_without_a_callback_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        assert!(!m.render_overlay());
    }

    #[test]
    fn render_overlay_invokes_the_configured_callback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_callback = Arc::clone(&calls);
        m.set_render_callback(move |_canvas| {
            calls_in_callback.fetch_add(1, Ordering::SeqCst);
        });
        assert!(m.render_overlay());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Scenario 1: cold start. A freshly-registered plugin appears in the
    /// loaded set and is left parked at its initial main-loop boundary
    /// until a trigger drives it.
    #[test]
    fn cold_start_registers_the_plugin_in_the_loaded_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let path = dir.path().join("plugin_x.so");

        let record = PluginRecord::new(
            path.clone(),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        m.key_set.lock().insert(path.clone());
        m.plugins.lock().push(record);

        assert_eq!(m.list(), vec![path]);
    }

    /// A plugin parked at a vsync boundary runs to completion under one
    /// `on_vsync` call, matching the frame-advance loop scenario: the
    /// manager's dispatch loop keeps driving single passes until the
    /// plugin parks at vsync again or completes its main loop.
    #[test]
    fn on_vsync_drives_a_parked_vsync_plugin_to_its_next_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let path = dir.path().join("plugin_x.so");

        let record = PluginRecord::new(
            path.clone(),
            "plugin_x".into(),
            library_stub(),
            one_advance_then_return,
            None,
            StubEmulator::new(true),
            None,
        );
        // Prime it to a vsync boundary the way an earlier pacing tick would.
        assert_eq!(
            drive_single_pass(&record, TriggerKind::MainLoopPace),
            Some(PassOutcome::ParkedVsync)
        );
        m.key_set.lock().insert(path.clone());
        m.plugins.lock().push(Arc::clone(&record));

        m.on_vsync();

        assert_eq!(record.current_state(), HandshakeState::ParkedMainLoop);
        record.teardown();
    }

    /// `on_vsync` never drives a plugin parked at a main-loop boundary
    /// (spec §4.3.5) -- only the pacing thread does.
    #[test]
    fn on_vsync_ignores_a_plugin_parked_at_main_loop_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let path = dir.path().join("plugin_x.so");

        let record = PluginRecord::new(
            path.clone(),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        m.key_set.lock().insert(path.clone());
        m.plugins.lock().push(Arc::clone(&record));

        m.on_vsync();

        assert_eq!(record.current_state(), HandshakeState::ParkedMainLoop);
        record.teardown();
    }

    /// Scenario 3 / Property P2: unloading while a plugin is parked at a
    /// main-loop boundary tears it down exactly once, firing the
    /// list-changed callback, and leaves it absent from both the plugins
    /// list and the loaded set.
    #[test]
    fn unloading_a_plugin_parked_at_main_loop_tears_it_down_on_next_pass() {
        static CLOSE_CALLS: AtomicU32 = AtomicU32::new(0);
        extern "C" fn count_close(_ctx: plugin_host_abi::PluginContext) {
            CLOSE_CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let m = manager(ManagerConfig::fast_pacing(dir.path().to_path_buf()));
        let path = dir.path().join("plugin_x.so");

        let record = PluginRecord::new(
            path.clone(),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            Some(count_close),
            StubEmulator::new(true),
            None,
        );
        m.key_set.lock().insert(path.clone());
        m.plugins.lock().push(Arc::clone(&record));

        let changes = Arc::new(AtomicUsize::new(0));
        let changes_in_callback = Arc::clone(&changes);
        m.set_list_changed_callback(move || {
            changes_in_callback.fetch_add(1, Ordering::SeqCst);
        });

        // User unticks the plugin.
        m.key_set.lock().remove(&path);

        // Next pass boundary: the pacing thread's trigger completes the
        // in-flight pass, observes the path is gone from the key-set, and
        // queues + drains teardown.
        m.pacing_tick();

        assert_eq!(CLOSE_CALLS.load(Ordering::SeqCst), 1);
        assert!(m.plugins.lock().is_empty());
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        // Property P2: a second trigger cannot find the record anymore,
        // so `on_close` stays at exactly one call.
        m.pacing_tick();
        assert_eq!(CLOSE_CALLS.load(Ordering::SeqCst), 1);
    }
}
