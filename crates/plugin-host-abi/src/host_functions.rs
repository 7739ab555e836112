//! The host API table: the closed set of function-pointer shapes the host
//! fills in on the plugin side (spec §4.2).
//!
//! Each field's name, with the [`crate::constants::HOST_API_SYMBOL_PREFIX`]
//! prefix re-attached, is the well-known exported pointer-to-pointer symbol
//! the ABI-bindings module resolves in the plugin's library
//! (`yuzu_<field_name>`).

use std::ffi::{c_char, c_void};

use crate::types::PluginContext;

/// Meta: version query, setup, main-loop handle, close handle, free.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MetaApi {
    pub get_interface_version: Option<extern "C" fn() -> u64>,
    pub setup: Option<extern "C" fn(PluginContext)>,
    pub on_main_loop: Option<extern "C" fn(PluginContext)>,
    pub on_close: Option<extern "C" fn(PluginContext)>,
    /// Mirror of the host allocator; must be called to free any string the
    /// host returned from one of the other API groups.
    pub free: Option<extern "C" fn(*mut c_char)>,
}

/// Emulator control: pause/run, frame-advance, identity, logging.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EmuControlApi {
    pub pause: Option<extern "C" fn(PluginContext)>,
    pub unpause: Option<extern "C" fn(PluginContext)>,
    /// The only API that suspends the calling worker (spec §4.3.1).
    pub advance_frame: Option<extern "C" fn(PluginContext)>,
    pub get_frame_count: Option<extern "C" fn(PluginContext) -> u64>,
    pub get_fps: Option<extern "C" fn(PluginContext) -> f64>,
    pub is_emulating: Option<extern "C" fn(PluginContext) -> bool>,
    /// Returns a host-allocated, null-terminated string; must be freed via
    /// [`MetaApi::free`].
    pub get_rom_title: Option<extern "C" fn(PluginContext) -> *mut c_char>,
    pub get_process_id: Option<extern "C" fn(PluginContext) -> u64>,
    pub get_heap_region: Option<extern "C" fn(PluginContext, *mut u64, *mut u64) -> bool>,
    pub get_main_region: Option<extern "C" fn(PluginContext, *mut u64, *mut u64) -> bool>,
    pub get_stack_region: Option<extern "C" fn(PluginContext, *mut u64, *mut u64) -> bool>,
    pub log: Option<extern "C" fn(PluginContext, u32, *const c_char)>,
}

/// Guest memory: validity-checked byte-range read/write.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MemoryApi {
    pub read: Option<extern "C" fn(PluginContext, u64, *mut u8, u64) -> bool>,
    pub write: Option<extern "C" fn(PluginContext, u64, *const u8, u64) -> bool>,
}

/// Timing: clock ticks, CPU ticks.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TimingApi {
    pub get_clock_ticks: Option<extern "C" fn(PluginContext) -> u64>,
    pub get_cpu_ticks: Option<extern "C" fn(PluginContext) -> u64>,
}

/// Joypad/HID: raw and per-axis pad state, motion, keyboard, mouse, touch,
/// and outside-input gating.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HidApi {
    pub get_pad_state: Option<extern "C" fn(PluginContext, u32, *mut u32) -> bool>,
    pub set_pad_state: Option<extern "C" fn(PluginContext, u32, u32) -> bool>,
    pub get_joystick: Option<extern "C" fn(PluginContext, u32, u32, *mut f32, *mut f32) -> bool>,
    pub set_joystick: Option<extern "C" fn(PluginContext, u32, u32, f32, f32) -> bool>,
    pub get_six_axis: Option<
        extern "C" fn(PluginContext, u32, u32, *mut f32 /* 6 components */) -> bool,
    >,
    pub set_six_axis: Option<
        extern "C" fn(PluginContext, u32, u32, *const f32 /* 6 components */) -> bool,
    >,
    pub connect_controller: Option<extern "C" fn(PluginContext, u32) -> bool>,
    pub disconnect_controller: Option<extern "C" fn(PluginContext, u32) -> bool>,
    pub get_controller_type: Option<extern "C" fn(PluginContext, u32) -> u32>,
    pub set_controller_type: Option<extern "C" fn(PluginContext, u32, u32) -> bool>,
    pub set_handheld_enabled: Option<extern "C" fn(PluginContext, bool)>,
    pub set_controller_enabled: Option<extern "C" fn(PluginContext, u32, bool) -> bool>,
    pub request_peripheral_update: Option<extern "C" fn(PluginContext)>,
    pub get_keyboard_key: Option<extern "C" fn(PluginContext, u32) -> bool>,
    pub set_keyboard_key: Option<extern "C" fn(PluginContext, u32, bool) -> bool>,
    pub get_keyboard_modifiers: Option<extern "C" fn(PluginContext) -> u32>,
    pub set_keyboard_modifiers: Option<extern "C" fn(PluginContext, u32)>,
    pub get_keyboard_raw: Option<extern "C" fn(PluginContext, *mut u8, u64) -> bool>,
    pub set_keyboard_raw: Option<extern "C" fn(PluginContext, *const u8, u64) -> bool>,
    pub get_mouse_button: Option<extern "C" fn(PluginContext, u32) -> bool>,
    pub set_mouse_button: Option<extern "C" fn(PluginContext, u32, bool) -> bool>,
    pub get_mouse_position: Option<extern "C" fn(PluginContext, *mut f32, *mut f32) -> bool>,
    pub set_mouse_position: Option<extern "C" fn(PluginContext, f32, f32) -> bool>,
    pub get_mouse_raw: Option<extern "C" fn(PluginContext, *mut u8, u64) -> bool>,
    pub set_mouse_raw: Option<extern "C" fn(PluginContext, *const u8, u64) -> bool>,
    pub get_touch_count: Option<extern "C" fn(PluginContext) -> u32>,
    pub get_touch_slot: Option<extern "C" fn(PluginContext, u32, *mut f32, *mut f32) -> bool>,
    pub set_touch_slot: Option<extern "C" fn(PluginContext, u32, f32, f32) -> bool>,
    pub set_outside_input_enabled: Option<extern "C" fn(PluginContext, u32, bool)>,
}

/// Overlay: canvas access, drawing, presentation, screenshots, popups.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OverlayApi {
    pub get_width: Option<extern "C" fn(PluginContext) -> u32>,
    pub get_height: Option<extern "C" fn(PluginContext) -> u32>,
    pub clear: Option<extern "C" fn(PluginContext)>,
    pub draw_pixel: Option<extern "C" fn(PluginContext, u32, u32, u32)>,
    pub render: Option<extern "C" fn(PluginContext)>,
    pub save_screenshot: Option<extern "C" fn(PluginContext, *const c_char) -> bool>,
    pub draw_image: Option<extern "C" fn(PluginContext, *const c_char, u32, u32) -> bool>,
    pub popup: Option<extern "C" fn(PluginContext, u32, *const c_char, *const c_char)>,
    /// Returns a host-allocated byte buffer and writes its length through
    /// `out_len`; must be freed via [`MetaApi::free`]. `format` is an
    /// optional image-encoder format string (e.g. `"png"`); empty or
    /// unrecognized falls back to PNG.
    pub raw_screenshot: Option<
        extern "C" fn(PluginContext, *const c_char, *mut u64) -> *mut u8,
    >,
}

/// The full, closed host API table published into a plugin's symbol table.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HostApiTable {
    pub meta: MetaApi,
    pub emu_control: EmuControlApi,
    pub memory: MemoryApi,
    pub timing: TimingApi,
    pub hid: HidApi,
    pub overlay: OverlayApi,
}

impl Default for MetaApi {
    fn default() -> Self {
        Self {
            get_interface_version: None,
            setup: None,
            on_main_loop: None,
            on_close: None,
            free: None,
        }
    }
}

impl Default for EmuControlApi {
    fn default() -> Self {
        Self {
            pause: None,
            unpause: None,
            advance_frame: None,
            get_frame_count: None,
            get_fps: None,
            is_emulating: None,
            get_rom_title: None,
            get_process_id: None,
            get_heap_region: None,
            get_main_region: None,
            get_stack_region: None,
            log: None,
        }
    }
}

impl Default for MemoryApi {
    fn default() -> Self {
        Self {
            read: None,
            write: None,
        }
    }
}

impl Default for TimingApi {
    fn default() -> Self {
        Self {
            get_clock_ticks: None,
            get_cpu_ticks: None,
        }
    }
}

impl Default for HidApi {
    fn default() -> Self {
        Self {
            get_pad_state: None,
            set_pad_state: None,
            get_joystick: None,
            set_joystick: None,
            get_six_axis: None,
            set_six_axis: None,
            connect_controller: None,
            disconnect_controller: None,
            get_controller_type: None,
            set_controller_type: None,
            set_handheld_enabled: None,
            set_controller_enabled: None,
            request_peripheral_update: None,
            get_keyboard_key: None,
            set_keyboard_key: None,
            get_keyboard_modifiers: None,
            set_keyboard_modifiers: None,
            get_keyboard_raw: None,
            set_keyboard_raw: None,
            get_mouse_button: None,
            set_mouse_button: None,
            get_mouse_position: None,
            set_mouse_position: None,
            get_mouse_raw: None,
            set_mouse_raw: None,
            get_touch_count: None,
            get_touch_slot: None,
            set_touch_slot: None,
            set_outside_input_enabled: None,
        }
    }
}

impl Default for OverlayApi {
    fn default() -> Self {
        Self {
            get_width: None,
            get_height: None,
            clear: None,
            draw_pixel: None,
            render: None,
            save_screenshot: None,
            draw_image: None,
            popup: None,
            raw_screenshot: None,
        }
    }
}

/// Every `(group, field)` pair, paired with its well-known symbol name
/// (without the `yuzu_` prefix). Used by the ABI-bindings module to drive
/// symbol resolution generically instead of hand-listing each field twice.
pub const HOST_API_FIELD_NAMES: &[&str] = &[
    "get_plugin_interface_version",
    "setup",
    "on_main_loop",
    "on_close",
    "free",
    "pause",
    "unpause",
    "advance_frame",
    "get_frame_count",
    "get_fps",
    "is_emulating",
    "get_rom_title",
    "get_process_id",
    "get_heap_region",
    "get_main_region",
    "get_stack_region",
    "log",
    "memory_read",
    "memory_write",
    "get_clock_ticks",
    "get_cpu_ticks",
    "get_pad_state",
    "set_pad_state",
    "get_joystick",
    "set_joystick",
    "get_six_axis",
    "set_six_axis",
    "connect_controller",
    "disconnect_controller",
    "get_controller_type",
    "set_controller_type",
    "set_handheld_enabled",
    "set_controller_enabled",
    "request_peripheral_update",
    "get_keyboard_key",
    "set_keyboard_key",
    "get_keyboard_modifiers",
    "set_keyboard_modifiers",
    "get_keyboard_raw",
    "set_keyboard_raw",
    "get_mouse_button",
    "set_mouse_button",
    "get_mouse_position",
    "set_mouse_position",
    "get_mouse_raw",
    "set_mouse_raw",
    "get_touch_count",
    "get_touch_slot",
    "set_touch_slot",
    "set_outside_input_enabled",
    "overlay_get_width",
    "overlay_get_height",
    "overlay_clear",
    "overlay_draw_pixel",
    "overlay_render",
    "overlay_save_screenshot",
    "overlay_draw_image",
    "overlay_popup",
    "overlay_raw_screenshot",
];

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn host_api_table_defaults_to_all_none() {
        let table = HostApiTable::default();
        assert!(table.meta.get_interface_version.is_none());
        assert!(table.overlay.raw_screenshot.is_none());
        assert!(table.hid.get_six_axis.is_none());
    }

    #[test]
    fn field_name_table_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for name in HOST_API_FIELD_NAMES {
            assert!(seen.insert(*name), "duplicate field name {name}");
        }
    }
}
