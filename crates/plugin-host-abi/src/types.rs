//! Wire types shared by host and plugin across the C ABI.

use std::ffi::c_void;

/// Opaque context pointer a plugin must pass back on every host API call.
///
/// The host casts this back to its own `PluginRecord`; the plugin must
/// treat it as opaque and never dereference it.
pub type PluginContext = *mut c_void;

/// Severity taxonomy for the structured log channel (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogSeverity {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Critical = 5,
}

impl LogSeverity {
    /// Decode the raw severity value a plugin passes to the structured log API.
    /// Unknown values are clamped to `Critical` rather than rejected, since the
    /// ABI has no out-of-band error channel to report a malformed call on.
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warning,
            4 => Self::Error,
            _ => Self::Critical,
        }
    }
}

/// Popup dialog severity for the overlay popup API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PopupKind {
    None = 0,
    Informational = 1,
    Warning = 2,
    Critical = 3,
}

impl PopupKind {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Self::Informational,
            2 => Self::Warning,
            3 => Self::Critical,
            _ => Self::None,
        }
    }
}

/// Which joycon a six-axis motion read/write call targets, in addition to the
/// controller index (spec §4.2, Joypad/HID group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum JoyconSide {
    Left = 0,
    Right = 1,
}

impl JoyconSide {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

/// The HID peripherals individually gated by the outside-input APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HidPeripheral {
    Pad = 0,
    Keyboard = 1,
    Mouse = 2,
    Touch = 3,
}

impl HidPeripheral {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Pad),
            1 => Some(Self::Keyboard),
            2 => Some(Self::Mouse),
            3 => Some(Self::Touch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn unknown_severity_clamps_to_critical() {
        assert_eq!(LogSeverity::from_raw(99), LogSeverity::Critical);
    }

    #[test]
    fn known_severities_roundtrip() {
        assert_eq!(LogSeverity::from_raw(0), LogSeverity::Trace);
        assert_eq!(LogSeverity::from_raw(2), LogSeverity::Info);
    }

    #[test]
    fn popup_kind_defaults_to_none() {
        assert_eq!(PopupKind::from_raw(77), PopupKind::None);
    }

    #[test]
    fn joycon_side_rejects_out_of_range() {
        assert_eq!(JoyconSide::from_raw(2), None);
    }

    #[test]
    fn hid_peripheral_roundtrips_known_values() {
        assert_eq!(HidPeripheral::from_raw(0), Some(HidPeripheral::Pad));
        assert_eq!(HidPeripheral::from_raw(3), Some(HidPeripheral::Touch));
    }

    #[test]
    fn hid_peripheral_rejects_out_of_range() {
        assert_eq!(HidPeripheral::from_raw(4), None);
    }
}
