//! Common imports for crates consuming the ABI surface.

pub use crate::constants::{
    HOST_API_SYMBOL_PREFIX, PACING_INTERVAL, PLUGIN_INTERFACE_VERSION, SYM_GET_INTERFACE_VERSION,
    SYM_ON_CLOSE, SYM_ON_MAIN_LOOP, SYM_START,
};
pub use crate::host_functions::{
    EmuControlApi, HidApi, HostApiTable, MemoryApi, MetaApi, OverlayApi, TimingApi,
    HOST_API_FIELD_NAMES,
};
pub use crate::types::{HidPeripheral, JoyconSide, LogSeverity, PluginContext, PopupKind};
