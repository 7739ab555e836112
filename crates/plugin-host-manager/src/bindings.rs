//! ABI bindings (spec §4.6): resolves each host-API entry's well-known
//! `yuzu_<name>` pointer-to-pointer slot in the plugin's symbol table and
//! writes the host-implemented callable address into it.
//!
//! `get_plugin_interface_version`, `start`, `on_main_loop` and `on_close`
//! are the plugin's *own* exported entry points — the manager resolves
//! those directly while loading (spec §4.4), not through this publishing
//! step. This module covers the groups the host actually implements:
//! `free`, Emu control, guest memory, timing, HID, and overlay.

use std::collections::HashMap;
use std::ffi::{c_char, CStr};
use std::sync::{Arc, OnceLock};

use plugin_host_abi::host_functions::HostApiTable;
use plugin_host_abi::types::{HidPeripheral, JoyconSide, LogSeverity as AbiLogSeverity, PopupKind};
use plugin_host_abi::PluginContext;
use plugin_host_core::dylib::DynamicLibrary;
use plugin_host_core::facade::LogSeverity;
use plugin_host_core::PluginRecord;

use crate::overlay::OverlaySurface;

/// The process-wide overlay canvas. There is exactly one per manager (spec
/// §4.5); every plugin's published overlay callbacks reach the same
/// instance, guarded by the same mutex a render pass would hold.
static OVERLAY: OnceLock<Arc<parking_lot::Mutex<OverlaySurface>>> = OnceLock::new();

/// Lengths of the raw byte buffers handed out by `raw_screenshot`, keyed by
/// address. `host_free` consults this before falling back to the
/// `CString`-based free path, since a screenshot buffer is arbitrary binary
/// data and can't be bounded by a NUL terminator the way a string can.
static RAW_BUFFER_LENGTHS: OnceLock<parking_lot::Mutex<HashMap<usize, usize>>> = OnceLock::new();

fn raw_buffer_lengths() -> &'static parking_lot::Mutex<HashMap<usize, usize>> {
    RAW_BUFFER_LENGTHS.get_or_init(Default::default)
}

/// Leak `bytes` as a host-allocated buffer and record its length so
/// `host_free` can reclaim it later.
fn leak_raw_buffer(bytes: Vec<u8>) -> *mut u8 {
    let boxed = bytes.into_boxed_slice();
    let len = boxed.len();
    let ptr = Box::into_raw(boxed).cast::<u8>();
    raw_buffer_lengths().lock().insert(ptr as usize, len);
    ptr
}

/// Write `value` into the plugin-exported slot named `yuzu_<symbol>`, if
/// the plugin exports it. Missing slots are ignored (spec §4.2).
///
/// # Safety
///
/// `library` must be the library `ctx`-producing records were loaded from,
/// and must outlive every call made through the published pointers.
unsafe fn publish<F: Copy>(library: &DynamicLibrary, symbol: &str, value: F) {
    let full_name = format!("{}{symbol}", plugin_host_abi::HOST_API_SYMBOL_PREFIX);
    // SAFETY: forwarded to the caller's safety contract above.
    if let Some(slot) = unsafe { library.resolve::<*mut F>(&full_name) } {
        let raw: *mut F = *slot;
        if !raw.is_null() {
            // SAFETY: the plugin declared this slot as an `Option<extern "C"
            // fn(..)>` of matching signature per the plugin-facing contract.
            unsafe { *raw = value };
        }
    }
}

/// Publish every host-implemented entry of `table` into `library`'s symbol
/// table (spec §4.6). `overlay` is shared so the overlay callbacks can draw
/// into it from any plugin's worker thread.
///
/// # Safety
///
/// See [`publish`].
pub unsafe fn bind_host_api(library: &DynamicLibrary, overlay: Arc<parking_lot::Mutex<OverlaySurface>>) {
    let _ = OVERLAY.set(overlay);
    let table = build_host_api_table();
    macro_rules! pub_field {
        ($group:ident . $field:ident, $name:literal) => {
            if let Some(f) = table.$group.$field {
                // SAFETY: forwarded to the caller's safety contract above.
                unsafe { publish(library, $name, f) };
            }
        };
    }

    pub_field!(meta.free, "free");

    pub_field!(emu_control.pause, "pause");
    pub_field!(emu_control.unpause, "unpause");
    pub_field!(emu_control.advance_frame, "advance_frame");
    pub_field!(emu_control.get_frame_count, "get_frame_count");
    pub_field!(emu_control.get_fps, "get_fps");
    pub_field!(emu_control.is_emulating, "is_emulating");
    pub_field!(emu_control.get_rom_title, "get_rom_title");
    pub_field!(emu_control.get_process_id, "get_process_id");
    pub_field!(emu_control.get_heap_region, "get_heap_region");
    pub_field!(emu_control.get_main_region, "get_main_region");
    pub_field!(emu_control.get_stack_region, "get_stack_region");
    pub_field!(emu_control.log, "log");

    pub_field!(memory.read, "memory_read");
    pub_field!(memory.write, "memory_write");

    pub_field!(timing.get_clock_ticks, "get_clock_ticks");
    pub_field!(timing.get_cpu_ticks, "get_cpu_ticks");

    pub_field!(hid.get_pad_state, "get_pad_state");
    pub_field!(hid.set_pad_state, "set_pad_state");
    pub_field!(hid.get_joystick, "get_joystick");
    pub_field!(hid.set_joystick, "set_joystick");
    pub_field!(hid.get_six_axis, "get_six_axis");
    pub_field!(hid.set_six_axis, "set_six_axis");
    pub_field!(hid.connect_controller, "connect_controller");
    pub_field!(hid.disconnect_controller, "disconnect_controller");
    pub_field!(hid.get_controller_type, "get_controller_type");
    pub_field!(hid.set_controller_type, "set_controller_type");
    pub_field!(hid.set_handheld_enabled, "set_handheld_enabled");
    pub_field!(hid.set_controller_enabled, "set_controller_enabled");
    pub_field!(hid.request_peripheral_update, "request_peripheral_update");
    pub_field!(hid.get_keyboard_key, "get_keyboard_key");
    pub_field!(hid.set_keyboard_key, "set_keyboard_key");
    pub_field!(hid.get_keyboard_modifiers, "get_keyboard_modifiers");
    pub_field!(hid.set_keyboard_modifiers, "set_keyboard_modifiers");
    pub_field!(hid.get_keyboard_raw, "get_keyboard_raw");
    pub_field!(hid.set_keyboard_raw, "set_keyboard_raw");
    pub_field!(hid.get_mouse_button, "get_mouse_button");
    pub_field!(hid.set_mouse_button, "set_mouse_button");
    pub_field!(hid.get_mouse_position, "get_mouse_position");
    pub_field!(hid.set_mouse_position, "set_mouse_position");
    pub_field!(hid.get_mouse_raw, "get_mouse_raw");
    pub_field!(hid.set_mouse_raw, "set_mouse_raw");
    pub_field!(hid.get_touch_count, "get_touch_count");
    pub_field!(hid.get_touch_slot, "get_touch_slot");
    pub_field!(hid.set_touch_slot, "set_touch_slot");
    pub_field!(hid.set_outside_input_enabled, "set_outside_input_enabled");

    pub_field!(overlay.get_width, "overlay_get_width");
    pub_field!(overlay.get_height, "overlay_get_height");
    pub_field!(overlay.clear, "overlay_clear");
    pub_field!(overlay.draw_pixel, "overlay_draw_pixel");
    pub_field!(overlay.render, "overlay_render");
    pub_field!(overlay.save_screenshot, "overlay_save_screenshot");
    pub_field!(overlay.draw_image, "overlay_draw_image");
    pub_field!(overlay.popup, "overlay_popup");
    pub_field!(overlay.raw_screenshot, "overlay_raw_screenshot");
}

/// Build the closed host-API table (spec §4.2). Every callable here unpacks
/// the opaque context via [`PluginRecord::from_context`], guards on guest
/// readiness where the group requires it, and forwards to the emulator or
/// HID facade.
fn build_host_api_table() -> HostApiTable {
    let mut table = HostApiTable::default();

    table.meta.free = Some(host_free);

    table.emu_control.pause = Some(host_pause);
    table.emu_control.unpause = Some(host_unpause);
    table.emu_control.advance_frame = Some(host_advance_frame);
    table.emu_control.get_frame_count = Some(host_get_frame_count);
    table.emu_control.get_fps = Some(host_get_fps);
    table.emu_control.is_emulating = Some(host_is_emulating);
    table.emu_control.get_rom_title = Some(host_get_rom_title);
    table.emu_control.get_process_id = Some(host_get_process_id);
    table.emu_control.get_heap_region = Some(host_get_heap_region);
    table.emu_control.get_main_region = Some(host_get_main_region);
    table.emu_control.get_stack_region = Some(host_get_stack_region);
    table.emu_control.log = Some(host_log);

    table.memory.read = Some(host_memory_read);
    table.memory.write = Some(host_memory_write);

    table.timing.get_clock_ticks = Some(host_get_clock_ticks);
    table.timing.get_cpu_ticks = Some(host_get_cpu_ticks);

    table.hid.get_pad_state = Some(host_get_pad_state);
    table.hid.set_pad_state = Some(host_set_pad_state);
    table.hid.get_joystick = Some(host_get_joystick);
    table.hid.set_joystick = Some(host_set_joystick);
    table.hid.get_six_axis = Some(host_get_six_axis);
    table.hid.set_six_axis = Some(host_set_six_axis);
    table.hid.connect_controller = Some(host_connect_controller);
    table.hid.disconnect_controller = Some(host_disconnect_controller);
    table.hid.get_controller_type = Some(host_get_controller_type);
    table.hid.set_controller_type = Some(host_set_controller_type);
    table.hid.set_handheld_enabled = Some(host_set_handheld_enabled);
    table.hid.set_controller_enabled = Some(host_set_controller_enabled);
    table.hid.request_peripheral_update = Some(host_request_peripheral_update);
    table.hid.get_keyboard_key = Some(host_get_keyboard_key);
    table.hid.set_keyboard_key = Some(host_set_keyboard_key);
    table.hid.get_keyboard_modifiers = Some(host_get_keyboard_modifiers);
    table.hid.set_keyboard_modifiers = Some(host_set_keyboard_modifiers);
    table.hid.get_keyboard_raw = Some(host_get_keyboard_raw);
    table.hid.set_keyboard_raw = Some(host_set_keyboard_raw);
    table.hid.get_mouse_button = Some(host_get_mouse_button);
    table.hid.set_mouse_button = Some(host_set_mouse_button);
    table.hid.get_mouse_position = Some(host_get_mouse_position);
    table.hid.set_mouse_position = Some(host_set_mouse_position);
    table.hid.get_mouse_raw = Some(host_get_mouse_raw);
    table.hid.set_mouse_raw = Some(host_set_mouse_raw);
    table.hid.get_touch_count = Some(host_get_touch_count);
    table.hid.get_touch_slot = Some(host_get_touch_slot);
    table.hid.set_touch_slot = Some(host_set_touch_slot);
    table.hid.set_outside_input_enabled = Some(host_set_outside_input_enabled);

    table.overlay.get_width = Some(host_overlay_get_width);
    table.overlay.get_height = Some(host_overlay_get_height);
    table.overlay.clear = Some(host_overlay_clear);
    table.overlay.draw_pixel = Some(host_overlay_draw_pixel);
    table.overlay.render = Some(host_overlay_render);
    table.overlay.save_screenshot = Some(host_overlay_save_screenshot);
    table.overlay.draw_image = Some(host_overlay_draw_image);
    table.overlay.popup = Some(host_overlay_popup);
    table.overlay.raw_screenshot = Some(host_overlay_raw_screenshot);

    table
}

fn record<'a>(ctx: PluginContext) -> &'a PluginRecord {
    // SAFETY: every published callback receives back the context pointer a
    // `PluginRecord` handed to the plugin via `as_context`.
    unsafe { PluginRecord::from_context(ctx) }
}

extern "C" fn host_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    if let Some(len) = raw_buffer_lengths().lock().remove(&(ptr as usize)) {
        // SAFETY: `ptr` was produced by `leak_raw_buffer`'s `Box::into_raw`
        // of a `[u8]` of exactly `len` bytes, and its length-table entry is
        // removed here so the same pointer can't be freed twice this way.
        unsafe {
            drop(Box::from_raw(std::slice::from_raw_parts_mut(ptr.cast::<u8>(), len)));
        }
        return;
    }
    // SAFETY: otherwise only ever called with a pointer `host_get_rom_title`
    // (the sole remaining allocator on this path) produced via
    // `CString::into_raw`.
    unsafe {
        drop(std::ffi::CString::from_raw(ptr));
    }
}

extern "C" fn host_pause(ctx: PluginContext) {
    record(ctx).emulator_facade().pause();
}

extern "C" fn host_unpause(ctx: PluginContext) {
    record(ctx).emulator_facade().unpause();
}

/// The only host API call that suspends the calling worker (spec §4.3.1).
extern "C" fn host_advance_frame(ctx: PluginContext) {
    record(ctx).park_until_vsync();
}

extern "C" fn host_get_frame_count(ctx: PluginContext) -> u64 {
    record(ctx).emulator_facade().frame_count()
}

extern "C" fn host_get_fps(ctx: PluginContext) -> f64 {
    record(ctx).emulator_facade().fps()
}

extern "C" fn host_is_emulating(ctx: PluginContext) -> bool {
    record(ctx).emulator_facade().is_running()
}

extern "C" fn host_get_rom_title(ctx: PluginContext) -> *mut c_char {
    match record(ctx).emulator_facade().rom_title() {
        Some(title) => match std::ffi::CString::new(title) {
            Ok(c_string) => c_string.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        None => std::ptr::null_mut(),
    }
}

extern "C" fn host_get_process_id(ctx: PluginContext) -> u64 {
    record(ctx).emulator_facade().process_id().unwrap_or(0)
}

fn write_region(region: Option<plugin_host_core::facade::MemoryRegion>, start: *mut u64, size: *mut u64) -> bool {
    match region {
        Some(r) if !start.is_null() && !size.is_null() => {
            // SAFETY: plugin-facing contract requires valid, writable
            // `u64` out-parameters for these calls.
            unsafe {
                *start = r.start;
                *size = r.size;
            }
            true
        }
        _ => false,
    }
}

extern "C" fn host_get_heap_region(ctx: PluginContext, start: *mut u64, size: *mut u64) -> bool {
    write_region(record(ctx).emulator_facade().heap_region(), start, size)
}

extern "C" fn host_get_main_region(ctx: PluginContext, start: *mut u64, size: *mut u64) -> bool {
    write_region(record(ctx).emulator_facade().main_region(), start, size)
}

extern "C" fn host_get_stack_region(ctx: PluginContext, start: *mut u64, size: *mut u64) -> bool {
    write_region(record(ctx).emulator_facade().stack_region(), start, size)
}

extern "C" fn host_log(ctx: PluginContext, severity: u32, message: *const c_char) {
    if message.is_null() {
        return;
    }
    // SAFETY: plugin-facing contract requires a valid, NUL-terminated,
    // borrowed-for-the-call string (spec §4.2, string ownership).
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    let record = record(ctx);
    record
        .emulator_facade()
        .log(&record.name, map_severity(AbiLogSeverity::from_raw(severity)), &message);
}

fn map_severity(severity: AbiLogSeverity) -> LogSeverity {
    match severity {
        AbiLogSeverity::Trace => LogSeverity::Trace,
        AbiLogSeverity::Debug => LogSeverity::Debug,
        AbiLogSeverity::Info => LogSeverity::Info,
        AbiLogSeverity::Warning => LogSeverity::Warning,
        AbiLogSeverity::Error => LogSeverity::Error,
        AbiLogSeverity::Critical => LogSeverity::Critical,
    }
}

extern "C" fn host_memory_read(ctx: PluginContext, address: u64, out: *mut u8, len: u64) -> bool {
    if out.is_null() {
        return false;
    }
    // SAFETY: plugin-facing contract requires `out` to point at `len`
    // writable bytes.
    let buf = unsafe { std::slice::from_raw_parts_mut(out, len as usize) };
    record(ctx).emulator_facade().read_memory(address, buf)
}

extern "C" fn host_memory_write(ctx: PluginContext, address: u64, data: *const u8, len: u64) -> bool {
    if data.is_null() {
        return false;
    }
    // SAFETY: plugin-facing contract requires `data` to point at `len`
    // readable, borrowed-for-the-call bytes.
    let buf = unsafe { std::slice::from_raw_parts(data, len as usize) };
    record(ctx).emulator_facade().write_memory(address, buf)
}

extern "C" fn host_get_clock_ticks(ctx: PluginContext) -> u64 {
    record(ctx).emulator_facade().clock_ticks()
}

extern "C" fn host_get_cpu_ticks(ctx: PluginContext) -> u64 {
    record(ctx).emulator_facade().cpu_ticks()
}

extern "C" fn host_get_pad_state(ctx: PluginContext, player: u32, out: *mut u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    match hid.read_pad_state(player) {
        Some(state) if !out.is_null() => {
            // SAFETY: plugin-facing contract requires a valid `u32`
            // out-parameter.
            unsafe { *out = state };
            true
        }
        _ => false,
    }
}

extern "C" fn host_set_pad_state(ctx: PluginContext, player: u32, state: u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_pad_state(player, state),
        None => false,
    }
}

extern "C" fn host_get_joystick(ctx: PluginContext, player: u32, stick: u32, out_x: *mut f32, out_y: *mut f32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    match hid.read_joystick(player, stick) {
        Some((x, y)) if !out_x.is_null() && !out_y.is_null() => {
            // SAFETY: plugin-facing contract requires valid `f32`
            // out-parameters.
            unsafe {
                *out_x = x;
                *out_y = y;
            }
            true
        }
        _ => false,
    }
}

extern "C" fn host_set_joystick(ctx: PluginContext, player: u32, stick: u32, x: f32, y: f32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_joystick(player, stick, x, y),
        None => false,
    }
}

extern "C" fn host_get_six_axis(ctx: PluginContext, player: u32, side: u32, out: *mut f32) -> bool {
    let Some(side) = JoyconSide::from_raw(side) else {
        return false;
    };
    if out.is_null() {
        return false;
    }
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    match hid.read_six_axis(player, side) {
        Some(data) => {
            // SAFETY: plugin-facing contract requires `out` to point at 6
            // writable `f32` components.
            unsafe {
                for (i, value) in data.iter().enumerate() {
                    *out.add(i) = *value;
                }
            }
            true
        }
        None => false,
    }
}

extern "C" fn host_set_six_axis(ctx: PluginContext, player: u32, side: u32, data: *const f32) -> bool {
    let Some(side) = JoyconSide::from_raw(side) else {
        return false;
    };
    if data.is_null() {
        return false;
    }
    // SAFETY: plugin-facing contract requires `data` to point at 6 readable,
    // borrowed-for-the-call `f32` components.
    let values: [f32; 6] = unsafe {
        let slice = std::slice::from_raw_parts(data, 6);
        [slice[0], slice[1], slice[2], slice[3], slice[4], slice[5]]
    };
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_six_axis(player, side, values),
        None => false,
    }
}

extern "C" fn host_connect_controller(ctx: PluginContext, player: u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.connect_controller(player),
        None => false,
    }
}

extern "C" fn host_disconnect_controller(ctx: PluginContext, player: u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.disconnect_controller(player),
        None => false,
    }
}

extern "C" fn host_get_controller_type(ctx: PluginContext, player: u32) -> u32 {
    let record = record(ctx);
    record.ensure_hid_facade();
    record.hid_facade().map(|hid| hid.read_controller_type(player)).unwrap_or(0)
}

extern "C" fn host_set_controller_type(ctx: PluginContext, player: u32, controller_type: u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_controller_type(player, controller_type),
        None => false,
    }
}

extern "C" fn host_set_handheld_enabled(ctx: PluginContext, enabled: bool) {
    let record = record(ctx);
    record.ensure_hid_facade();
    if let Some(hid) = record.hid_facade() {
        hid.set_handheld_enabled(enabled);
    }
}

extern "C" fn host_set_controller_enabled(ctx: PluginContext, player: u32, enabled: bool) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.set_controller_enabled(player, enabled),
        None => false,
    }
}

extern "C" fn host_request_peripheral_update(ctx: PluginContext) {
    let record = record(ctx);
    record.ensure_hid_facade();
    if let Some(hid) = record.hid_facade() {
        hid.request_peripheral_update();
    }
}

extern "C" fn host_get_keyboard_key(ctx: PluginContext, key: u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    record.hid_facade().map(|hid| hid.read_keyboard_key(key)).unwrap_or(false)
}

extern "C" fn host_set_keyboard_key(ctx: PluginContext, key: u32, pressed: bool) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_keyboard_key(key, pressed),
        None => false,
    }
}

extern "C" fn host_get_keyboard_modifiers(ctx: PluginContext) -> u32 {
    let record = record(ctx);
    record.ensure_hid_facade();
    record.hid_facade().map(|hid| hid.read_keyboard_modifiers()).unwrap_or(0)
}

extern "C" fn host_set_keyboard_modifiers(ctx: PluginContext, modifiers: u32) {
    let record = record(ctx);
    record.ensure_hid_facade();
    if let Some(hid) = record.hid_facade() {
        hid.write_keyboard_modifiers(modifiers);
    }
}

extern "C" fn host_get_keyboard_raw(ctx: PluginContext, out: *mut u8, len: u64) -> bool {
    if out.is_null() {
        return false;
    }
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    let data = hid.read_keyboard_raw();
    let copy_len = data.len().min(len as usize);
    // SAFETY: plugin-facing contract requires `out` to point at `len`
    // writable bytes; `copy_len` never exceeds either buffer's length.
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), out, copy_len) };
    true
}

extern "C" fn host_set_keyboard_raw(ctx: PluginContext, data: *const u8, len: u64) -> bool {
    if data.is_null() {
        return false;
    }
    // SAFETY: plugin-facing contract requires `data` to point at `len`
    // readable, borrowed-for-the-call bytes.
    let buf = unsafe { std::slice::from_raw_parts(data, len as usize) };
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_keyboard_raw(buf),
        None => false,
    }
}

extern "C" fn host_get_mouse_button(ctx: PluginContext, button: u32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    record.hid_facade().map(|hid| hid.read_mouse_button(button)).unwrap_or(false)
}

extern "C" fn host_set_mouse_button(ctx: PluginContext, button: u32, pressed: bool) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_mouse_button(button, pressed),
        None => false,
    }
}

extern "C" fn host_get_mouse_position(ctx: PluginContext, out_x: *mut f32, out_y: *mut f32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    match hid.read_mouse_position() {
        Some((x, y)) if !out_x.is_null() && !out_y.is_null() => {
            // SAFETY: plugin-facing contract requires valid `f32`
            // out-parameters.
            unsafe {
                *out_x = x;
                *out_y = y;
            }
            true
        }
        _ => false,
    }
}

extern "C" fn host_set_mouse_position(ctx: PluginContext, x: f32, y: f32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_mouse_position(x, y),
        None => false,
    }
}

extern "C" fn host_get_mouse_raw(ctx: PluginContext, out: *mut u8, len: u64) -> bool {
    if out.is_null() {
        return false;
    }
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    let data = hid.read_mouse_raw();
    let copy_len = data.len().min(len as usize);
    // SAFETY: plugin-facing contract requires `out` to point at `len`
    // writable bytes; `copy_len` never exceeds either buffer's length.
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), out, copy_len) };
    true
}

extern "C" fn host_set_mouse_raw(ctx: PluginContext, data: *const u8, len: u64) -> bool {
    if data.is_null() {
        return false;
    }
    // SAFETY: plugin-facing contract requires `data` to point at `len`
    // readable, borrowed-for-the-call bytes.
    let buf = unsafe { std::slice::from_raw_parts(data, len as usize) };
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_mouse_raw(buf),
        None => false,
    }
}

extern "C" fn host_get_touch_count(ctx: PluginContext) -> u32 {
    let record = record(ctx);
    record.ensure_hid_facade();
    record.hid_facade().map(|hid| hid.read_touch_count()).unwrap_or(0)
}

extern "C" fn host_get_touch_slot(ctx: PluginContext, slot: u32, out_x: *mut f32, out_y: *mut f32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    let Some(hid) = record.hid_facade() else {
        return false;
    };
    match hid.read_touch_slot(slot) {
        Some((x, y)) if !out_x.is_null() && !out_y.is_null() => {
            // SAFETY: plugin-facing contract requires valid `f32`
            // out-parameters.
            unsafe {
                *out_x = x;
                *out_y = y;
            }
            true
        }
        _ => false,
    }
}

extern "C" fn host_set_touch_slot(ctx: PluginContext, slot: u32, x: f32, y: f32) -> bool {
    let record = record(ctx);
    record.ensure_hid_facade();
    match record.hid_facade() {
        Some(hid) => hid.write_touch_slot(slot, x, y),
        None => false,
    }
}

extern "C" fn host_set_outside_input_enabled(ctx: PluginContext, peripheral: u32, enabled: bool) {
    let Some(peripheral) = HidPeripheral::from_raw(peripheral) else {
        return;
    };
    let record = record(ctx);
    record.ensure_hid_facade();
    if let Some(hid) = record.hid_facade() {
        hid.set_outside_input_enabled(peripheral, enabled);
    }
}

extern "C" fn host_overlay_get_width(_ctx: PluginContext) -> u32 {
    OVERLAY.get().map(|overlay| overlay.lock().width()).unwrap_or(0)
}

extern "C" fn host_overlay_get_height(_ctx: PluginContext) -> u32 {
    OVERLAY.get().map(|overlay| overlay.lock().height()).unwrap_or(0)
}

extern "C" fn host_overlay_clear(ctx: PluginContext) {
    if let Some(overlay) = OVERLAY.get() {
        let system = record(ctx).emulator_facade();
        overlay.lock().clear(system.as_ref());
    }
}

/// `rgba` packs the pixel as `0xRRGGBBAA`, matching the plugin-facing
/// contract's single-word colour parameter.
extern "C" fn host_overlay_draw_pixel(ctx: PluginContext, x: u32, y: u32, rgba: u32) {
    if let Some(overlay) = OVERLAY.get() {
        let system = record(ctx).emulator_facade();
        let bytes = rgba.to_be_bytes();
        overlay.lock().draw_pixel(system.as_ref(), x, y, bytes);
    }
}

extern "C" fn host_overlay_render(ctx: PluginContext) {
    if let Some(overlay) = OVERLAY.get() {
        let system = record(ctx).emulator_facade();
        overlay.lock().render(system.as_ref(), |_canvas| {
            // Presentation is the embedding's responsibility; the overlay
            // surface only guarantees the canvas is current at this point.
        });
    }
}

extern "C" fn host_overlay_save_screenshot(ctx: PluginContext, path: *const c_char) -> bool {
    let Some(overlay) = OVERLAY.get() else {
        return false;
    };
    if path.is_null() {
        return false;
    }
    // SAFETY: plugin-facing contract requires a valid, NUL-terminated,
    // borrowed-for-the-call string.
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    let system = record(ctx).emulator_facade();
    overlay.lock().save_to_path(system.as_ref(), std::path::Path::new(&path))
}

extern "C" fn host_overlay_draw_image(ctx: PluginContext, path: *const c_char, x: u32, y: u32) -> bool {
    let Some(overlay) = OVERLAY.get() else {
        return false;
    };
    if path.is_null() {
        return false;
    }
    // SAFETY: see above.
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    let system = record(ctx).emulator_facade();
    overlay.lock().draw_image(system.as_ref(), std::path::Path::new(&path), x, y)
}

/// `format` names an image encoder (e.g. `"png"`); null, empty, or
/// unrecognized falls back to PNG (spec §4.5). Returns a host-allocated
/// buffer the caller must free via [`plugin_host_abi::host_functions::MetaApi::free`].
extern "C" fn host_overlay_raw_screenshot(ctx: PluginContext, format: *const c_char, out_len: *mut u64) -> *mut u8 {
    let Some(overlay) = OVERLAY.get() else {
        return std::ptr::null_mut();
    };
    let format = if format.is_null() {
        None
    } else {
        // SAFETY: plugin-facing contract requires a valid, NUL-terminated,
        // borrowed-for-the-call string.
        Some(unsafe { CStr::from_ptr(format) }.to_string_lossy().into_owned())
    };
    let format = format.filter(|name| !name.is_empty()).unwrap_or_else(|| "png".to_owned());
    let system = record(ctx).emulator_facade();
    let Some(bytes) = overlay.lock().raw_screenshot(system.as_ref(), Some(&format)) else {
        return std::ptr::null_mut();
    };
    if !out_len.is_null() {
        // SAFETY: plugin-facing contract requires a valid `u64`
        // out-parameter.
        unsafe { *out_len = bytes.len() as u64 };
    }
    leak_raw_buffer(bytes)
}

extern "C" fn host_overlay_popup(ctx: PluginContext, kind: u32, title: *const c_char, message: *const c_char) {
    let kind = PopupKind::from_raw(kind);
    let title = if title.is_null() {
        String::new()
    } else {
        // SAFETY: plugin-facing contract requires a valid, NUL-terminated,
        // borrowed-for-the-call string.
        unsafe { CStr::from_ptr(title) }.to_string_lossy().into_owned()
    };
    let message = if message.is_null() {
        String::new()
    } else {
        // SAFETY: see above.
        unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
    };
    let record = record(ctx);
    record.emulator_facade().log(
        &record.name,
        LogSeverity::Info,
        &format!("popup[{}] {title}: {message}", popup_kind_name(kind)),
    );
}

/// Severity/kind passthrough used by tests exercising [`PopupKind`] mapping
/// without a live overlay (the overlay's own popup plumbing lives in the
/// demo crate's facade implementation, which owns the dialog surface).
pub fn popup_kind_name(kind: PopupKind) -> &'static str {
    match kind {
        PopupKind::None => "none",
        PopupKind::Informational => "informational",
        PopupKind::Warning => "warning",
        PopupKind::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use plugin_host_core::testing::StubEmulator;
    use plugin_host_core::PluginRecord;
    use std::path::PathBuf;

    fn library_stub() -> DynamicLibrary {
        #[cfg(unix)]
        let self_path = PathBuf::from("/proc/self/exe");
        #[cfg(not(unix))]
        let self_path = std::env::current_exe().expect("current exe path");
        unsafe { DynamicLibrary::open(&self_path) }.expect("opening our own executable as a library")
    }

    extern "C" fn noop_main_loop(_ctx: PluginContext) {}

    #[test]
    fn get_frame_count_forwards_through_the_facade() {
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        let ctx = record.as_context();
        assert_eq!(host_get_frame_count(ctx), 0);
        assert!(host_is_emulating(ctx));
    }

    #[test]
    fn heap_region_reports_false_when_guest_not_running() {
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(false),
            None,
        );
        let ctx = record.as_context();
        let mut start = 0u64;
        let mut size = 0u64;
        assert!(!host_get_heap_region(ctx, &mut start, &mut size));
        assert_eq!((start, size), (0, 0));
    }

    #[test]
    fn rom_title_round_trips_through_host_free() {
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        let ctx = record.as_context();
        let title = host_get_rom_title(ctx);
        assert!(!title.is_null());
        let text = unsafe { CStr::from_ptr(title) }.to_str().unwrap().to_owned();
        assert_eq!(text, "stub-rom");
        host_free(title);
    }

    #[test]
    fn pad_state_round_trips_through_the_stub_hid() {
        let hid = plugin_host_core::testing::StubHid::new();
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::with_hid(true, hid),
            None,
        );
        let ctx = record.as_context();
        assert!(host_set_pad_state(ctx, 0, 0xABCD));
        let mut out = 0u32;
        assert!(host_get_pad_state(ctx, 0, &mut out));
        assert_eq!(out, 0xABCD);
    }

    #[test]
    fn joystick_round_trips_through_the_stub_hid() {
        let hid = plugin_host_core::testing::StubHid::new();
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::with_hid(true, hid),
            None,
        );
        let ctx = record.as_context();
        assert!(host_set_joystick(ctx, 0, 0, 0.5, -0.25));
        let (mut x, mut y) = (0.0f32, 0.0f32);
        assert!(host_get_joystick(ctx, 0, 0, &mut x, &mut y));
        assert_eq!((x, y), (0.5, -0.25));
    }

    #[test]
    fn six_axis_round_trips_through_the_stub_hid() {
        let hid = plugin_host_core::testing::StubHid::new();
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::with_hid(true, hid),
            None,
        );
        let ctx = record.as_context();
        let input = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(host_set_six_axis(ctx, 0, 0, input.as_ptr()));
        let mut out = [0.0f32; 6];
        assert!(host_get_six_axis(ctx, 0, 0, out.as_mut_ptr()));
        assert_eq!(out, input);
    }

    #[test]
    fn six_axis_rejects_an_unknown_joycon_side() {
        let hid = plugin_host_core::testing::StubHid::new();
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::with_hid(true, hid),
            None,
        );
        let ctx = record.as_context();
        let mut out = [0.0f32; 6];
        assert!(!host_get_six_axis(ctx, 0, 7, out.as_mut_ptr()));
    }

    #[test]
    fn keyboard_raw_copies_at_most_the_caller_buffer_length() {
        let hid = plugin_host_core::testing::StubHid::new();
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::with_hid(true, hid),
            None,
        );
        let ctx = record.as_context();
        assert!(host_set_keyboard_raw(ctx, [1u8, 2, 3, 4].as_ptr(), 4));
        let mut out = [0u8; 2];
        assert!(host_get_keyboard_raw(ctx, out.as_mut_ptr(), out.len() as u64));
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn outside_input_enabled_is_ignored_for_an_unknown_peripheral() {
        let hid = plugin_host_core::testing::StubHid::new();
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::with_hid(true, hid),
            None,
        );
        let ctx = record.as_context();
        // Should not panic; there's no observable state to assert beyond that.
        host_set_outside_input_enabled(ctx, 99, true);
    }

    #[test]
    fn raw_screenshot_round_trips_through_host_free() {
        let overlay = Arc::new(parking_lot::Mutex::new(OverlaySurface::new(crate::overlay::DockState::Docked {
            width: 2,
            height: 2,
        })));
        let _ = OVERLAY.set(overlay);
        let record = PluginRecord::new(
            PathBuf::from("plugin_x.so"),
            "plugin_x".into(),
            library_stub(),
            noop_main_loop,
            None,
            StubEmulator::new(true),
            None,
        );
        let ctx = record.as_context();
        let mut out_len = 0u64;
        let format = std::ffi::CString::new("png").unwrap();
        let ptr = host_overlay_raw_screenshot(ctx, format.as_ptr(), &mut out_len);
        assert!(!ptr.is_null());
        assert!(out_len > 0);
        host_free(ptr.cast::<c_char>());
    }
}
