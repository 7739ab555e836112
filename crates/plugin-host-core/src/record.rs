//! Per-plugin state: library handle, worker thread, cooperative rendezvous
//! primitives, and the lazily-acquired HID facade handle (spec §3).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use plugin_host_abi::PluginContext;

use crate::dylib::DynamicLibrary;
use crate::facade::{EmulatorFacade, HidFacade};

/// Where the worker currently stands. Replaces the dual-boolean
/// `processed_main_loop` / `encountered_vsync` rendezvous from spec's
/// Design Notes with the single enum it recommends: the two can no longer
/// disagree, and there is no window where `encountered_vsync` is
/// momentarily both set and cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// The worker is executing plugin code.
    Running,
    /// Parked inside `advance_frame`, waiting for the next vsync.
    ParkedVsync,
    /// Parked after `on_main_loop` returned.
    ParkedMainLoop,
    /// The worker has exited.
    Stopped,
}

/// Observable scheduler events, for tests that want to assert the exact
/// handshake sequence without racily polling atomics from outside the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    WorkerSpawned,
    AdvancedToVsync,
    CompletedMainLoop,
    QueuedForRemoval,
    TornDown,
}

/// Receives [`SchedulerEvent`]s as they happen. Production code has no
/// reason to implement this beyond logging; tests use it to observe the
/// handshake deterministically.
pub trait SchedulerObserver: Send + Sync {
    fn on_event(&self, path: &Path, event: SchedulerEvent);
}

struct Inner {
    state: HandshakeState,
    /// Set by the scheduler to wake a parked worker; cleared by the worker
    /// as soon as it observes it.
    ready: bool,
    /// Set once the scheduler has decided this plugin must exit; the
    /// worker checks it only at a park point, never mid-pass.
    stop_requested: bool,
}

/// One loaded plugin's full lifecycle state (spec §3, `PluginRecord`).
pub struct PluginRecord {
    pub path: PathBuf,
    pub name: String,
    library: DynamicLibrary,
    main_loop_fn: extern "C" fn(PluginContext),
    close_fn: Option<extern "C" fn(PluginContext)>,
    inner: Mutex<Inner>,
    cv: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    hid_facade: Mutex<Option<Arc<dyn HidFacade>>>,
    system: Arc<dyn EmulatorFacade>,
    observer: Option<Arc<dyn SchedulerObserver>>,
}

// The record is shared between the manager thread, the scheduler-driving
// thread(s) and the plugin's own worker thread; every field it exposes
// across that boundary is behind a lock.
unsafe impl Send for PluginRecord {}
unsafe impl Sync for PluginRecord {}

impl PluginRecord {
    /// Construct a record around an already-loaded, already-verified
    /// library. `setup`/`start` has already been called by the manager
    /// before this is constructed (spec §4.4); the record only ever drives
    /// `on_main_loop` and, at teardown, `on_close`.
    pub fn new(
        path: PathBuf,
        name: String,
        library: DynamicLibrary,
        main_loop_fn: extern "C" fn(PluginContext),
        close_fn: Option<extern "C" fn(PluginContext)>,
        system: Arc<dyn EmulatorFacade>,
        observer: Option<Arc<dyn SchedulerObserver>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            path,
            name,
            library,
            main_loop_fn,
            close_fn,
            inner: Mutex::new(Inner {
                state: HandshakeState::ParkedMainLoop,
                ready: false,
                stop_requested: false,
            }),
            cv: Condvar::new(),
            worker: Mutex::new(None),
            hid_facade: Mutex::new(None),
            system,
            observer,
        })
    }

    /// The opaque context pointer plugins receive: the record's own address.
    /// ABI bindings cast it back via [`PluginRecord::from_context`].
    pub fn as_context(self: &Arc<Self>) -> PluginContext {
        Arc::as_ptr(self) as PluginContext
    }

    /// Recover a record reference from the opaque context pointer a plugin
    /// passed back into a host API call.
    ///
    /// # Safety
    ///
    /// `ctx` must have been produced by [`PluginRecord::as_context`] on a
    /// record that is still alive.
    pub unsafe fn from_context<'a>(ctx: PluginContext) -> &'a PluginRecord {
        // SAFETY: forwarded to the caller's safety contract above.
        unsafe { &*(ctx as *const PluginRecord) }
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&self.path, event);
        }
    }

    /// Spawn the dedicated worker thread if it has not been started yet.
    /// Idempotent: a plugin's worker lives for the record's lifetime once
    /// started (spec §3).
    pub fn ensure_worker_started(self: &Arc<Self>) -> Result<(), crate::error::DriverError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        let record = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(format!("plugin-worker-{}", self.name))
            .spawn(move || record.worker_loop())
            .map_err(|e| crate::error::DriverError::WorkerSpawnFailed {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        *worker = Some(handle);
        self.emit(SchedulerEvent::WorkerSpawned);
        Ok(())
    }

    /// Lazily acquire the HID facade once the guest process is running
    /// (spec Design Notes). A no-op once acquired, and a no-op while the
    /// guest still isn't running.
    pub fn ensure_hid_facade(&self) {
        let mut slot = self.hid_facade.lock();
        if slot.is_some() {
            return;
        }
        *slot = self.system.hid_facade();
    }

    /// The lazily-acquired HID facade, if bound yet.
    pub fn hid_facade(&self) -> Option<Arc<dyn HidFacade>> {
        self.hid_facade.lock().clone()
    }

    pub fn emulator_facade(&self) -> &Arc<dyn EmulatorFacade> {
        &self.system
    }

    /// The worker's main loop: parks for `ready`, runs one `on_main_loop`
    /// pass, parks again. This is the `{parked_initial, running_main_loop,
    /// parked_main_loop_done, exiting}` portion of spec §4.3.1; the
    /// `parked_vsync` transition happens inside [`PluginRecord::park_until_vsync`],
    /// called back into from within `on_main_loop_fn` itself.
    fn worker_loop(self: Arc<Self>) {
        loop {
            let mut guard = self.inner.lock();
            while !guard.ready {
                self.cv.wait(&mut guard);
            }
            guard.ready = false;

            if guard.stop_requested {
                guard.state = HandshakeState::Stopped;
                self.cv.notify_all();
                return;
            }

            guard.state = HandshakeState::Running;
            drop(guard);

            (self.main_loop_fn)(self.as_context());

            let mut guard = self.inner.lock();
            guard.state = HandshakeState::ParkedMainLoop;
            self.cv.notify_all();
            drop(guard);
            self.emit(SchedulerEvent::CompletedMainLoop);
        }
    }

    /// Called from inside `on_main_loop_fn`, on the worker thread, when the
    /// plugin invokes the `advance_frame` host API. The only suspension
    /// point inside a plugin call (spec §4.3.1, `running_main_loop ->
    /// parked_vsync`).
    pub fn park_until_vsync(&self) {
        let mut guard = self.inner.lock();
        guard.state = HandshakeState::ParkedVsync;
        self.cv.notify_all();
        self.emit(SchedulerEvent::AdvancedToVsync);

        while !guard.ready {
            self.cv.wait(&mut guard);
        }
        guard.ready = false;
        guard.state = HandshakeState::Running;
    }

    /// Wake the worker for one more pass and wait until it parks again at
    /// either boundary (or exits). This is the scheduler driver's
    /// single-pass primitive (spec §4.3.2, steps 2-3).
    pub(crate) fn drive_one_pass(&self) -> HandshakeState {
        {
            let mut guard = self.inner.lock();
            guard.ready = true;
            self.cv.notify_all();
        }

        let mut guard = self.inner.lock();
        loop {
            match guard.state {
                HandshakeState::ParkedVsync
                | HandshakeState::ParkedMainLoop
                | HandshakeState::Stopped => return guard.state,
                HandshakeState::Running => self.cv.wait(&mut guard),
            }
        }
    }

    /// The worker's currently-observed boundary, without driving a pass.
    /// Used by the vsync/pacing entry points to decide which plugins are
    /// eligible for this kind of trigger (spec §4.3.5).
    pub fn current_state(&self) -> HandshakeState {
        self.inner.lock().state
    }

    /// Mark this plugin as due for teardown at its next main-loop boundary
    /// (spec §4.3.2 step 4: "mark has_stopped"). Does not wake the worker;
    /// waking happens in [`PluginRecord::teardown`], once the caller is
    /// ready to actually join it.
    pub fn mark_stop_requested(&self) {
        self.inner.lock().stop_requested = true;
        self.emit(SchedulerEvent::QueuedForRemoval);
    }

    /// Run the unload pipeline's worker-facing half: invoke `on_close` (on
    /// the calling thread, never the worker's, per spec §4.3.5), wake the
    /// worker so it observes the stop request, and join it.
    ///
    /// Must only be called once the worker was last observed parked at a
    /// main-loop boundary (spec §3, Boundary-only teardown).
    pub fn teardown(&self) {
        if let Some(close_fn) = self.close_fn {
            close_fn(self.as_context_raw());
        }

        {
            let mut guard = self.inner.lock();
            guard.stop_requested = true;
            guard.ready = true;
            self.cv.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        self.emit(SchedulerEvent::TornDown);
    }

    fn as_context_raw(&self) -> PluginContext {
        self as *const PluginRecord as PluginContext
    }
}
