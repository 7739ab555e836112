//! Trivial stand-ins for the emulator kernel and HID collaborators, good
//! enough to drive the scheduler end-to-end from the command line.
//!
//! A real embedding's facade talks to actual guest memory and controller
//! shared memory; this one just counts frames and echoes logs through
//! `tracing`, so the demo can exercise load/vsync/pacing/unload without an
//! emulator attached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use plugin_host_abi::types::{HidPeripheral, JoyconSide};
use plugin_host_core::facade::{EmulatorFacade, HidFacade, LogSeverity, MemoryRegion};

/// A guest "system" that starts powered off and is flipped on by the demo's
/// `--boot` flag, incrementing its frame count once per vsync it's driven
/// through.
pub struct DemoEmulator {
    running: AtomicBool,
    frame_count: AtomicU64,
    hid: Arc<DemoHid>,
}

impl DemoEmulator {
    pub fn new(running: bool) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(running),
            frame_count: AtomicU64::new(0),
            hid: DemoHid::new(),
        })
    }

    pub fn on_vsync(&self) {
        if self.is_running() {
            self.frame_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl EmulatorFacade for DemoEmulator {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn hid_facade(&self) -> Option<Arc<dyn HidFacade>> {
        self.is_running().then(|| Arc::clone(&self.hid) as Arc<dyn HidFacade>)
    }

    fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("demo guest paused");
    }

    fn unpause(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("demo guest unpaused");
    }

    fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::SeqCst)
    }

    fn fps(&self) -> f64 {
        60.0
    }

    fn rom_title(&self) -> Option<String> {
        self.is_running().then(|| "demo-rom".to_owned())
    }

    fn process_id(&self) -> Option<u64> {
        self.is_running().then_some(1)
    }

    fn heap_region(&self) -> Option<MemoryRegion> {
        self.is_running().then_some(MemoryRegion {
            start: 0x1000_0000,
            size: 0x0100_0000,
        })
    }

    fn main_region(&self) -> Option<MemoryRegion> {
        self.is_running().then_some(MemoryRegion {
            start: 0x0800_0000,
            size: 0x0080_0000,
        })
    }

    fn stack_region(&self) -> Option<MemoryRegion> {
        self.is_running().then_some(MemoryRegion {
            start: 0x2000_0000,
            size: 0x0010_0000,
        })
    }

    fn clock_ticks(&self) -> u64 {
        self.frame_count() * 1_000_000 / 60
    }

    fn cpu_ticks(&self) -> u64 {
        self.frame_count() * 268_000_000 / 60
    }

    fn read_memory(&self, _address: u64, _buf: &mut [u8]) -> bool {
        self.is_running()
    }

    fn write_memory(&self, _address: u64, _data: &[u8]) -> bool {
        self.is_running()
    }

    fn log(&self, plugin_name: &str, severity: LogSeverity, message: &str) {
        match severity {
            LogSeverity::Trace => tracing::trace!(plugin = plugin_name, "{message}"),
            LogSeverity::Debug => tracing::debug!(plugin = plugin_name, "{message}"),
            LogSeverity::Info => tracing::info!(plugin = plugin_name, "{message}"),
            LogSeverity::Warning => tracing::warn!(plugin = plugin_name, "{message}"),
            LogSeverity::Error | LogSeverity::Critical => tracing::error!(plugin = plugin_name, "{message}"),
        }
    }
}

/// Per-player pad state, shared by every loaded plugin once the guest is
/// running. Everything below pad state is a trivial fake: it remembers
/// whatever a plugin last wrote and hands it back, without modeling real
/// controller/keyboard/mouse/touch behavior.
#[derive(Default)]
pub struct DemoHid {
    pad_state: Mutex<HashMap<u32, u32>>,
    joystick: Mutex<HashMap<(u32, u32), (f32, f32)>>,
    six_axis: Mutex<HashMap<(u32, JoyconSide), [f32; 6]>>,
    controller_type: Mutex<HashMap<u32, u32>>,
    handheld_enabled: AtomicBool,
    keyboard_modifiers: AtomicU32,
    keyboard_raw: Mutex<Vec<u8>>,
    mouse_position: Mutex<Option<(f32, f32)>>,
    mouse_raw: Mutex<Vec<u8>>,
    touch_slot: Mutex<HashMap<u32, (f32, f32)>>,
}

impl DemoHid {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl HidFacade for DemoHid {
    fn read_pad_state(&self, player: u32) -> Option<u32> {
        self.pad_state.lock().get(&player).copied()
    }

    fn write_pad_state(&self, player: u32, state: u32) -> bool {
        self.pad_state.lock().insert(player, state);
        true
    }

    fn read_joystick(&self, player: u32, stick: u32) -> Option<(f32, f32)> {
        self.joystick.lock().get(&(player, stick)).copied()
    }

    fn write_joystick(&self, player: u32, stick: u32, x: f32, y: f32) -> bool {
        self.joystick.lock().insert((player, stick), (x, y));
        true
    }

    fn read_six_axis(&self, player: u32, side: JoyconSide) -> Option<[f32; 6]> {
        self.six_axis.lock().get(&(player, side)).copied()
    }

    fn write_six_axis(&self, player: u32, side: JoyconSide, data: [f32; 6]) -> bool {
        self.six_axis.lock().insert((player, side), data);
        true
    }

    fn connect_controller(&self, _player: u32) -> bool {
        true
    }

    fn disconnect_controller(&self, _player: u32) -> bool {
        true
    }

    fn read_controller_type(&self, player: u32) -> u32 {
        self.controller_type.lock().get(&player).copied().unwrap_or(0)
    }

    fn write_controller_type(&self, player: u32, controller_type: u32) -> bool {
        self.controller_type.lock().insert(player, controller_type);
        true
    }

    fn set_handheld_enabled(&self, enabled: bool) {
        self.handheld_enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_controller_enabled(&self, _player: u32, _enabled: bool) -> bool {
        true
    }

    fn request_peripheral_update(&self) {
        tracing::debug!("demo guest: peripheral update requested");
    }

    fn read_keyboard_key(&self, _key: u32) -> bool {
        false
    }

    fn write_keyboard_key(&self, _key: u32, _pressed: bool) -> bool {
        true
    }

    fn read_keyboard_modifiers(&self) -> u32 {
        self.keyboard_modifiers.load(Ordering::SeqCst)
    }

    fn write_keyboard_modifiers(&self, modifiers: u32) {
        self.keyboard_modifiers.store(modifiers, Ordering::SeqCst);
    }

    fn read_keyboard_raw(&self) -> Vec<u8> {
        self.keyboard_raw.lock().clone()
    }

    fn write_keyboard_raw(&self, data: &[u8]) -> bool {
        *self.keyboard_raw.lock() = data.to_vec();
        true
    }

    fn read_mouse_button(&self, _button: u32) -> bool {
        false
    }

    fn write_mouse_button(&self, _button: u32, _pressed: bool) -> bool {
        true
    }

    fn read_mouse_position(&self) -> Option<(f32, f32)> {
        *self.mouse_position.lock()
    }

    fn write_mouse_position(&self, x: f32, y: f32) -> bool {
        *self.mouse_position.lock() = Some((x, y));
        true
    }

    fn read_mouse_raw(&self) -> Vec<u8> {
        self.mouse_raw.lock().clone()
    }

    fn write_mouse_raw(&self, data: &[u8]) -> bool {
        *self.mouse_raw.lock() = data.to_vec();
        true
    }

    fn read_touch_count(&self) -> u32 {
        self.touch_slot.lock().len() as u32
    }

    fn read_touch_slot(&self, slot: u32) -> Option<(f32, f32)> {
        self.touch_slot.lock().get(&slot).copied()
    }

    fn write_touch_slot(&self, slot: u32, x: f32, y: f32) -> bool {
        self.touch_slot.lock().insert(slot, (x, y));
        true
    }

    fn set_outside_input_enabled(&self, peripheral: HidPeripheral, enabled: bool) {
        tracing::debug!(?peripheral, enabled, "demo guest: outside-input gate changed");
    }
}
