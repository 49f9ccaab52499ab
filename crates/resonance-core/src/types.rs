//! Core types for Resonance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Module identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Event types the kernel itself publishes.
pub mod event_types {
    pub const MODULE_REGISTERED: &str = "module-registered";
    pub const MODULE_REGISTRATION_REJECTED: &str = "module-registration-rejected";
    pub const MODULE_REGISTRATION_FAILED: &str = "module-registration-failed";
    pub const MODULE_ACTIVATED: &str = "module-activated";
    pub const MODULE_ACTIVATION_FAILED: &str = "module-activation-failed";
    pub const MODULE_DEACTIVATED: &str = "module-deactivated";
    pub const MODULE_DESTROYED: &str = "module-destroyed";
    pub const TELOS_ORCHESTRATION_COMPLETE: &str = "telos-orchestration-complete";
    pub const PURGE_CYCLE_COMPLETE: &str = "purge-cycle-complete";
    pub const LOW_MEMORY_HANDLED: &str = "low-memory-handled";
    /// Inbound: any producer may publish this to ask the manager to shed load.
    pub const MEMORY_PRESSURE: &str = "memory-pressure";
}

/// Source id used on events the module manager publishes.
pub const MANAGER_SOURCE: &str = "module-manager";

/// An event on the Event Horizon.
///
/// `resonance_signature` is derived by the bus at publish time; whatever the
/// producer put there is overwritten.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub source_module: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub resonance_signature: f64,
}

impl SemanticEvent {
    pub fn new(event_type: impl Into<String>, source_module: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            source_module: source_module.into(),
            labels: BTreeSet::new(),
            payload: serde_json::Value::Null,
            correlation_id: None,
            resonance_signature: 0.0,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Numeric payload field, if present.
    pub fn payload_number(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(|v| v.as_f64())
    }
}

/// Static descriptor a module author ships with the module.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModuleManifest {
    pub id: ModuleId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub essence_labels: BTreeSet<String>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub telos_alignment: BTreeSet<String>,
    /// Declarative only; the kernel never resolves these.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub resource_footprint_mb: u64,
    #[serde(default)]
    pub integrity_score: u8,
}

impl ModuleManifest {
    pub fn new(id: impl Into<ModuleId>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            essence_labels: BTreeSet::new(),
            capabilities: BTreeSet::new(),
            telos_alignment: BTreeSet::new(),
            dependencies: Vec::new(),
            resource_footprint_mb: 0,
            integrity_score: 100,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.essence_labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(caps.into_iter().map(Into::into));
        self
    }

    pub fn with_telos<I, S>(mut self, telos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.telos_alignment.extend(telos.into_iter().map(Into::into));
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_footprint_mb(mut self, mb: u64) -> Self {
        self.resource_footprint_mb = mb;
        self
    }

    pub fn with_integrity(mut self, score: u8) -> Self {
        self.integrity_score = score.min(100);
        self
    }
}

/// Module lifecycle status
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Registered,
    Active,
    Inactive,
    Destroyed,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Destroyed => "destroyed",
        }
    }

    /// `active` is only reachable from `registered` or `inactive`.
    pub fn can_activate(&self) -> bool {
        matches!(self, Self::Registered | Self::Inactive)
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-module runtime bookkeeping, owned by the module manager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModuleRuntimeState {
    pub status: ModuleStatus,
    pub last_activated: Option<DateTime<Utc>>,
    pub last_deactivated: Option<DateTime<Utc>>,
    pub resource_usage_mb: u64,
    pub error_count: u32,
}

impl ModuleRuntimeState {
    pub fn registered(manifest: &ModuleManifest) -> Self {
        Self {
            status: ModuleStatus::Registered,
            last_activated: None,
            last_deactivated: None,
            resource_usage_mb: manifest.resource_footprint_mb,
            error_count: 0,
        }
    }
}
