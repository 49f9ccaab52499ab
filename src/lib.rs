//! Resonance: module orchestration kernel for generative art sessions
//!
//! Re-exports the kernel entry points and ships the sample modules the
//! `resonance` binary runs its demonstration session against.

pub mod demo;

pub use resonance_core::{Error, KernelConfig, Result};
pub use resonance_kernel::{Kernel, Module, ModuleContext, ModuleManager};

/// Log filter used when `RUST_LOG` is unset: every kernel crate at info.
pub const DEFAULT_LOG_FILTER: &str =
    "resonance=info,resonance_core=info,resonance_bus=info,resonance_matcher=info,resonance_kernel=info";
