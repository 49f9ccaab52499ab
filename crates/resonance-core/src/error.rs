//! Error types for the Resonance kernel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("module {module} failed validation: {}", issues.join("; "))]
    Validation { module: String, issues: Vec<String> },

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("capability not found: {module}/{name}")]
    CapabilityNotFound { module: String, name: String },

    #[error("capability {module}/{name} does not have the requested type")]
    CapabilityType { module: String, name: String },

    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("lifecycle hook {hook} failed for {module}: {message}")]
    Lifecycle {
        module: String,
        hook: &'static str,
        message: String,
    },

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(module: impl Into<String>, issues: Vec<String>) -> Self {
        Self::Validation {
            module: module.into(),
            issues,
        }
    }

    pub fn capability_not_found(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::CapabilityNotFound {
            module: module.into(),
            name: name.into(),
        }
    }

    pub fn lifecycle(module: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            module: module.into(),
            hook,
            message: message.into(),
        }
    }

    /// True for every "target absent" failure (module, capability, subscription).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound(_) | Self::CapabilityNotFound { .. } | Self::SubscriptionNotFound(_)
        )
    }
}
