//! Stable C ABI surface shared between the emulator plugin host and its
//! plugins.
//!
//! This crate defines the wire-level contract only: the interface-version
//! constant, the host API function-pointer table, and the small set of
//! types passed across that boundary. It depends on nothing dynamic-linker
//! or thread related — see `plugin-host-core` for the loader and scheduler,
//! and `plugin-host-manager` for the lifecycle owner.
//!
//! # Plugin-facing contract
//!
//! A plugin is a shared library exporting:
//! - `get_plugin_interface_version() -> u64`, equal to
//!   [`constants::PLUGIN_INTERFACE_VERSION`]
//! - `start(ctx: PluginContext)`, called once
//! - `on_main_loop(ctx: PluginContext)`, called repeatedly
//! - `on_close(ctx: PluginContext)`, optional, called once on unload
//! - one pointer-slot symbol per [`host_functions::HostApiTable`] entry,
//!   named `yuzu_<api>`

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(rust_2018_idioms)]

pub mod constants;
pub mod host_functions;
pub mod prelude;
pub mod types;

pub use constants::{HOST_API_SYMBOL_PREFIX, PACING_INTERVAL, PLUGIN_INTERFACE_VERSION};
pub use host_functions::{EmuControlApi, HidApi, HostApiTable, MemoryApi, MetaApi, OverlayApi, TimingApi};
pub use types::{HidPeripheral, JoyconSide, LogSeverity, PluginContext, PopupKind};
