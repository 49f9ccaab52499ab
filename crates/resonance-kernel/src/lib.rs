//! Resonance Kernel: module lifecycle, discovery and eviction
//!
//! The `Kernel` is built once at startup and owns the Event Horizon and the
//! module manager. Modules receive a `ModuleContext` in `initialize` and
//! reach each other only through typed capabilities.

pub mod capability;
pub mod kernel;
pub mod manager;
pub mod module;

pub use capability::{CapabilityTable, ExposedItem};
pub use kernel::Kernel;
pub use manager::{LowMemoryReport, ModuleManager, ModuleSnapshot};
pub use module::{Module, ModuleContext};

pub use resonance_matcher::ModuleMatch;
