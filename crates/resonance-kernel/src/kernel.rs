//! Kernel: the one place the bus, matcher and manager are wired together.

use crate::manager::ModuleManager;
use resonance_bus::EventHorizon;
use resonance_core::KernelConfig;
use resonance_matcher::SemanticMatcher;
use std::sync::Arc;
use tracing::info;

pub struct Kernel {
    config: KernelConfig,
    bus: Arc<EventHorizon>,
    manager: Arc<ModuleManager>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let bus = Arc::new(EventHorizon::from_config(&config));
        let matcher = SemanticMatcher::new(&config.matcher);
        let manager = ModuleManager::new(bus.clone(), matcher, config.manager.clone());
        info!(
            "Kernel ready (history {} events, orchestration threshold {})",
            config.bus.history_capacity, config.manager.orchestration_threshold
        );
        Self { config, bus, manager }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventHorizon> {
        &self.bus
    }

    pub fn manager(&self) -> &Arc<ModuleManager> {
        &self.manager
    }

    /// Destroy every module, then wait for deferred handler work to finish.
    pub async fn shutdown(&self) {
        let modules = self.manager.module_count();
        self.manager.destroy_all().await;
        self.bus.supervisor().shutdown().await;
        let stats = self.bus.stats();
        info!(
            "Kernel shut down: {} modules destroyed, {} events published, {} handler failures",
            modules, stats.published, stats.handler_failures
        );
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}
