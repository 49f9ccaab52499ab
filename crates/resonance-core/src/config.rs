//! Kernel configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level kernel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    /// Event Horizon history and metrics window.
    pub bus: BusConfig,
    /// Resonance scoring weights.
    pub resonance: ResonanceConfig,
    /// Dissonance detection.
    pub matcher: MatcherConfig,
    /// Lifecycle thresholds.
    pub manager: ManagerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum events kept in history. Oldest are evicted first.
    pub history_capacity: usize,
    /// Trailing window for the resonance field, in seconds.
    pub field_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResonanceConfig {
    /// Weight for labels missing from the table.
    pub default_weight: f64,
    /// Extra or overriding per-label weights, merged over the built-in table.
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    /// Integrity score below which a manifest is flagged (and, if dissonant, rejected).
    pub integrity_threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Minimum telos similarity for orchestration to activate a module.
    pub orchestration_threshold: f64,
    /// Inactive modules older than this are purged.
    pub purge_inactive_after_secs: u64,
    /// Low-memory eviction stops once declared usage drops below this.
    pub low_memory_threshold_mb: u64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for BusConfig {
    fn default() -> Self {
        Self { history_capacity: 10_000, field_window_secs: 60 }
    }
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self { default_weight: 3.0, weights: BTreeMap::new() }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { integrity_threshold: 60 }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            orchestration_threshold: 60.0,
            purge_inactive_after_secs: 300,
            low_memory_threshold_mb: 100,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl KernelConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Strict parse; unknown sections are ignored, malformed values are errors.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl BusConfig {
    /// Field window as a signed duration. Saturates instead of wrapping.
    pub fn field_window(&self) -> chrono::Duration {
        saturating_secs(self.field_window_secs)
    }
}

impl ManagerConfig {
    /// Purge window as a signed duration. `u64::MAX` means "never".
    pub fn purge_window(&self) -> chrono::Duration {
        saturating_secs(self.purge_inactive_after_secs)
    }
}

fn saturating_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
