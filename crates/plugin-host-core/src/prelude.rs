//! Convenience re-export surface for downstream crates.

pub use crate::abi_check::{check_abi_compatibility, AbiCheckResult};
pub use crate::dylib::{has_native_library_suffix, native_library_suffix, DynamicLibrary};
pub use crate::error::{DriverError, LoadError};
pub use crate::facade::{EmulatorFacade, HidFacade};
pub use crate::record::{HandshakeState, PluginRecord, SchedulerEvent, SchedulerObserver};
pub use crate::scheduler::{drive_single_pass, PassOutcome, TriggerKind};
