//! Stub facades for exercising the scheduler and ABI bindings without a
//! real emulator. Gated behind the `test-util` feature so it never ships
//! in a production embedding.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use plugin_host_abi::types::{HidPeripheral, JoyconSide};

use crate::facade::{EmulatorFacade, HidFacade, LogSeverity, MemoryRegion};

/// An [`EmulatorFacade`] whose `is_running` flag is toggled externally and
/// whose other accessors return fixed, reasonable stand-ins.
pub struct StubEmulator {
    running: AtomicBool,
    hid: Option<Arc<dyn HidFacade>>,
}

impl StubEmulator {
    pub fn new(running: bool) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(running),
            hid: None,
        })
    }

    pub fn with_hid(running: bool, hid: Arc<dyn HidFacade>) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(running),
            hid: Some(hid),
        })
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl EmulatorFacade for StubEmulator {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn hid_facade(&self) -> Option<Arc<dyn HidFacade>> {
        self.hid.clone()
    }

    fn pause(&self) {}
    fn unpause(&self) {}
    fn frame_count(&self) -> u64 {
        0
    }
    fn fps(&self) -> f64 {
        60.0
    }
    fn rom_title(&self) -> Option<String> {
        self.is_running().then(|| "stub-rom".to_owned())
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
        0
    }
    fn cpu_ticks(&self) -> u64 {
        0
    }
    fn read_memory(&self, _address: u64, _buf: &mut [u8]) -> bool {
        self.is_running()
    }
    fn write_memory(&self, _address: u64, _data: &[u8]) -> bool {
        self.is_running()
    }
    fn log(&self, _plugin_name: &str, _severity: LogSeverity, _message: &str) {}
}

/// A [`HidFacade`] that remembers the last value written per slot, keyed
/// however the real entry point keys it (player, player+stick, player+side,
/// key code, slot index, ...).
#[derive(Default)]
pub struct StubHid {
    pad_state: parking_lot::Mutex<std::collections::HashMap<u32, u32>>,
    joystick: parking_lot::Mutex<std::collections::HashMap<(u32, u32), (f32, f32)>>,
    six_axis: parking_lot::Mutex<std::collections::HashMap<(u32, JoyconSide), [f32; 6]>>,
    connected: parking_lot::Mutex<std::collections::HashSet<u32>>,
    controller_type: parking_lot::Mutex<std::collections::HashMap<u32, u32>>,
    handheld_enabled: AtomicBool,
    controller_enabled: parking_lot::Mutex<std::collections::HashMap<u32, bool>>,
    peripheral_update_requests: AtomicU32,
    keyboard_key: parking_lot::Mutex<std::collections::HashSet<u32>>,
    keyboard_modifiers: AtomicU32,
    keyboard_raw: parking_lot::Mutex<Vec<u8>>,
    mouse_button: parking_lot::Mutex<std::collections::HashSet<u32>>,
    mouse_position: parking_lot::Mutex<Option<(f32, f32)>>,
    mouse_raw: parking_lot::Mutex<Vec<u8>>,
    touch_slot: parking_lot::Mutex<std::collections::HashMap<u32, (f32, f32)>>,
    outside_input_enabled: parking_lot::Mutex<std::collections::HashMap<HidPeripheral, bool>>,
}

impl StubHid {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl HidFacade for StubHid {
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

    fn connect_controller(&self, player: u32) -> bool {
        self.connected.lock().insert(player)
    }
    fn disconnect_controller(&self, player: u32) -> bool {
        self.connected.lock().remove(&player)
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
    fn set_controller_enabled(&self, player: u32, enabled: bool) -> bool {
        self.controller_enabled.lock().insert(player, enabled);
        true
    }
    fn request_peripheral_update(&self) {
        self.peripheral_update_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn read_keyboard_key(&self, key: u32) -> bool {
        self.keyboard_key.lock().contains(&key)
    }
    fn write_keyboard_key(&self, key: u32, pressed: bool) -> bool {
        if pressed {
            self.keyboard_key.lock().insert(key);
        } else {
            self.keyboard_key.lock().remove(&key);
        }
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

    fn read_mouse_button(&self, button: u32) -> bool {
        self.mouse_button.lock().contains(&button)
    }
    fn write_mouse_button(&self, button: u32, pressed: bool) -> bool {
        if pressed {
            self.mouse_button.lock().insert(button);
        } else {
            self.mouse_button.lock().remove(&button);
        }
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
        self.outside_input_enabled.lock().insert(peripheral, enabled);
    }
}
