//! The module contract and the context handed to modules.

use crate::capability::CapabilityTable;
use crate::manager::ModuleManager;
use async_trait::async_trait;
use resonance_bus::EventHorizon;
use resonance_core::{Error, ModuleId, ModuleManifest, Result, SemanticEvent};
use std::sync::{Arc, Weak};

/// A loadable unit: renderer, telemetry collector, session orchestrator.
///
/// Hooks are called by the module manager while it holds this module's
/// lifecycle lock, so a hook must not drive its own module's lifecycle.
/// Hooks on other modules are fine.
#[async_trait]
pub trait Module: Send + Sync {
    /// Static descriptor. Must return the same value for the module's lifetime.
    fn manifest(&self) -> &ModuleManifest;

    /// Called once after the module enters the registry.
    async fn initialize(&self, _ctx: ModuleContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn activate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn deactivate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handles other modules may request. Read once, after `initialize`.
    fn capabilities(&self) -> CapabilityTable {
        CapabilityTable::new()
    }
}

/// What a module gets to talk to the rest of the kernel.
#[derive(Clone)]
pub struct ModuleContext {
    module_id: ModuleId,
    bus: Arc<EventHorizon>,
    manager: Weak<ModuleManager>,
}

impl ModuleContext {
    pub(crate) fn new(module_id: ModuleId, bus: Arc<EventHorizon>, manager: Weak<ModuleManager>) -> Self {
        Self { module_id, bus, manager }
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    pub fn bus(&self) -> &Arc<EventHorizon> {
        &self.bus
    }

    /// The manager, unless the kernel has already been torn down.
    pub fn manager(&self) -> Option<Arc<ModuleManager>> {
        self.manager.upgrade()
    }

    /// Publish an event sourced from this module.
    pub fn emit<I, S>(&self, event_type: &str, labels: I, payload: serde_json::Value) -> SemanticEvent
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bus.publish(
            SemanticEvent::new(event_type, self.module_id.as_str())
                .with_labels(labels)
                .with_payload(payload),
        )
    }

    /// Typed handle exposed by another module.
    pub fn capability<T: ?Sized + Send + Sync + 'static>(&self, module_id: &str, name: &str) -> Result<Arc<T>> {
        let manager = self
            .manager
            .upgrade()
            .ok_or_else(|| Error::ModuleNotFound(module_id.to_string()))?;
        manager.get_capability::<T>(module_id, name)
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext").field("module_id", &self.module_id).finish()
    }
}
