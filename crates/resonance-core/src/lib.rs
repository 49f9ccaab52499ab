//! Resonance Core - ids, data model, configuration and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::{BusConfig, KernelConfig, ManagerConfig, MatcherConfig, ResonanceConfig};
pub use error::{Error, Result};
pub use types::*;
