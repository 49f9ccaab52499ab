//! Module manager: registry, lifecycle state machine, discovery, eviction
//!
//! `registered → active ⇄ inactive → destroyed`. Destroyed modules leave
//! every map. Each module id has its own async lifecycle lock, so
//! concurrent calls on one id run one after another while different ids
//! proceed in parallel.

use crate::capability::{CapabilityTable, ExposedItem};
use crate::module::{Module, ModuleContext};
use chrono::Utc;
use dashmap::DashMap;
use resonance_bus::{Delivery, EventHorizon, SubscriptionId};
use resonance_core::event_types::*;
use resonance_core::{
    Error, ManagerConfig, ModuleId, ModuleManifest, ModuleRuntimeState, ModuleStatus, Result,
    SemanticEvent, MANAGER_SOURCE,
};
use resonance_matcher::{ModuleMatch, SemanticMatcher};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, error, info, warn};

struct ModuleEntry {
    module: Arc<dyn Module>,
    manifest: ModuleManifest,
    state: ModuleRuntimeState,
    capabilities: CapabilityTable,
}

/// Point-in-time view of one module.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModuleSnapshot {
    pub manifest: ModuleManifest,
    pub state: ModuleRuntimeState,
}

/// Outcome of a low-memory pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LowMemoryReport {
    pub evicted: Vec<ModuleId>,
    pub final_usage_mb: u64,
}

pub struct ModuleManager {
    bus: Arc<EventHorizon>,
    matcher: SemanticMatcher,
    config: ManagerConfig,
    modules: DashMap<ModuleId, ModuleEntry>,
    locks: DashMap<ModuleId, Arc<tokio::sync::Mutex<()>>>,
    pressure_subscription: Mutex<Option<SubscriptionId>>,
    self_ref: Weak<ModuleManager>,
}

impl ModuleManager {
    /// Build the manager and start listening for `memory-pressure` events.
    pub fn new(bus: Arc<EventHorizon>, matcher: SemanticMatcher, config: ManagerConfig) -> Arc<Self> {
        let manager = Arc::new_cyclic(|weak| Self {
            bus,
            matcher,
            config,
            modules: DashMap::new(),
            locks: DashMap::new(),
            pressure_subscription: Mutex::new(None),
            self_ref: weak.clone(),
        });
        manager.listen_for_memory_pressure();
        manager
    }

    pub fn bus(&self) -> &Arc<EventHorizon> {
        &self.bus
    }

    pub fn matcher(&self) -> &SemanticMatcher {
        &self.matcher
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Validate, insert and initialize `module`.
    ///
    /// A dissonant manifest below the integrity threshold is rejected before
    /// it touches the registry. An existing module with the same id is
    /// destroyed first. A failing `initialize` removes the module again.
    pub async fn register_module(&self, module: Arc<dyn Module>) -> Result<()> {
        let manifest = module.manifest().clone();
        let id = manifest.id.clone();

        let report = self.matcher.detect_dissonance(&manifest);
        if report.is_dissonant {
            if manifest.integrity_score < self.matcher.integrity_threshold() {
                warn!("Rejecting module {}: {}", id, report.issues.join("; "));
                self.announce(
                    MODULE_REGISTRATION_REJECTED,
                    json!({ "module_id": id, "issues": report.issues }),
                );
                return Err(Error::validation(id.as_str(), report.issues));
            }
            warn!("Module {} registered despite dissonance: {}", id, report.issues.join("; "));
        }

        let lock = self.lifecycle_lock(id.as_str());
        let result = {
            let _guard = lock.lock().await;
            self.register_locked(module, manifest).await
        };
        self.release_lock(id.as_str());
        result
    }

    async fn register_locked(&self, module: Arc<dyn Module>, manifest: ModuleManifest) -> Result<()> {
        let id = manifest.id.clone();
        if self.modules.contains_key(&id) {
            info!("Module {} already registered, replacing", id);
            self.destroy_locked(id.as_str()).await;
        }

        self.modules.insert(
            id.clone(),
            ModuleEntry {
                module: module.clone(),
                state: ModuleRuntimeState::registered(&manifest),
                manifest: manifest.clone(),
                capabilities: CapabilityTable::new(),
            },
        );

        if let Err(e) = module.initialize(self.context_for(&id)).await {
            self.modules.remove(&id);
            error!("Module {} failed to initialize: {:#}", id, e);
            self.announce(
                MODULE_REGISTRATION_FAILED,
                json!({ "module_id": id, "error": format!("{e:#}") }),
            );
            return Err(Error::lifecycle(id.as_str(), "initialize", format!("{e:#}")));
        }

        let capabilities = module.capabilities();
        if let Some(mut entry) = self.modules.get_mut(&id) {
            entry.capabilities = capabilities;
        }

        info!("Module {} v{} registered", id, manifest.version);
        self.announce(
            MODULE_REGISTERED,
            json!({
                "module_id": id,
                "name": manifest.name,
                "version": manifest.version,
                "essence_labels": manifest.essence_labels,
            }),
        );
        Ok(())
    }

    /// Run the activate hook. Already active is a logged no-op; a failing
    /// hook is counted, announced and returned.
    pub async fn activate_module(&self, id: &str) -> Result<()> {
        self.ensure_known(id)?;
        let lock = self.lifecycle_lock(id);
        let result = {
            let _guard = lock.lock().await;
            self.activate_locked(id).await.map(|_| ())
        };
        self.release_lock(id);
        result
    }

    /// Run the deactivate hook. Not active is a logged no-op.
    pub async fn deactivate_module(&self, id: &str) -> Result<()> {
        self.ensure_known(id)?;
        let lock = self.lifecycle_lock(id);
        let result = {
            let _guard = lock.lock().await;
            self.deactivate_locked(id).await
        };
        self.release_lock(id);
        result
    }

    /// Deactivate if needed, run the destroy hook, drop every trace of the
    /// module. Unknown ids are ignored.
    pub async fn destroy_module(&self, id: &str) {
        self.destroy_where(id, |_| true).await;
    }

    /// Destroy every module. Used by kernel teardown.
    pub async fn destroy_all(&self) {
        for id in self.module_ids() {
            self.destroy_module(id.as_str()).await;
        }
        let sub = self
            .pressure_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sub) = sub {
            let _ = self.bus.unsubscribe(&sub);
        }
    }

    async fn activate_locked(&self, id: &str) -> Result<bool> {
        let (module, status) = self.handle(id).ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
        if !status.can_activate() {
            warn!("Module {} is already {}, activation skipped", id, status);
            return Ok(false);
        }

        match module.activate().await {
            Ok(()) => {
                self.update_state(id, |s| {
                    s.status = ModuleStatus::Active;
                    s.last_activated = Some(Utc::now());
                });
                info!("Module {} activated", id);
                self.announce(MODULE_ACTIVATED, json!({ "module_id": id }));
                Ok(true)
            }
            Err(e) => {
                let message = format!("{e:#}");
                let mut errors = 0;
                self.update_state(id, |s| {
                    s.error_count += 1;
                    errors = s.error_count;
                });
                error!("Module {} failed to activate: {}", id, message);
                self.announce(
                    MODULE_ACTIVATION_FAILED,
                    json!({ "module_id": id, "error": message, "error_count": errors }),
                );
                Err(Error::lifecycle(id, "activate", message))
            }
        }
    }

    async fn deactivate_locked(&self, id: &str) -> Result<()> {
        let (module, status) = self.handle(id).ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
        if status != ModuleStatus::Active {
            warn!("Module {} is {}, deactivation skipped", id, status);
            return Ok(());
        }

        if let Err(e) = module.deactivate().await {
            // The module still leaves the active set.
            warn!("Module {} deactivate hook failed: {:#}", id, e);
            self.update_state(id, |s| s.error_count += 1);
        }
        self.update_state(id, |s| {
            s.status = ModuleStatus::Inactive;
            s.last_deactivated = Some(Utc::now());
        });
        info!("Module {} deactivated", id);
        self.announce(MODULE_DEACTIVATED, json!({ "module_id": id }));
        Ok(())
    }

    async fn destroy_locked(&self, id: &str) {
        let Some((module, status)) = self.handle(id) else {
            debug!("Destroy of unknown module {} ignored", id);
            return;
        };

        if status == ModuleStatus::Active {
            if let Err(e) = self.deactivate_locked(id).await {
                warn!("Module {} could not be deactivated before destroy: {}", id, e);
            }
        }
        if let Err(e) = module.destroy().await {
            warn!("Module {} destroy hook failed: {:#}", id, e);
        }

        let freed = self
            .modules
            .remove(id)
            .map(|(_, entry)| entry.state.resource_usage_mb)
            .unwrap_or(0);
        info!("Module {} destroyed ({} MB freed)", id, freed);
        self.announce(MODULE_DESTROYED, json!({ "module_id": id, "freed_mb": freed }));
    }

    /// Destroy `id` under its lock if its current state satisfies `pred`.
    async fn destroy_where<F>(&self, id: &str, pred: F) -> bool
    where
        F: Fn(&ModuleRuntimeState) -> bool + Send,
    {
        if !self.modules.contains_key(id) {
            debug!("Destroy of unknown module {} ignored", id);
            return false;
        }
        let lock = self.lifecycle_lock(id);
        let guard = lock.lock().await;

        let eligible = self.modules.get(id).map(|e| pred(&e.state)).unwrap_or(false);
        if eligible {
            self.destroy_locked(id).await;
        }
        drop(guard);

        self.release_lock(id);
        eligible
    }

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    /// Untyped handle `name` exposed by `module_id`.
    pub fn get_exposed_item(&self, module_id: &str, name: &str) -> Result<ExposedItem> {
        let entry = self
            .modules
            .get(module_id)
            .ok_or_else(|| Error::ModuleNotFound(module_id.to_string()))?;
        entry
            .capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| Error::capability_not_found(module_id, name))
    }

    /// Typed handle `name` exposed by `module_id`.
    pub fn get_capability<T: ?Sized + Send + Sync + 'static>(&self, module_id: &str, name: &str) -> Result<Arc<T>> {
        self.get_exposed_item(module_id, name)?
            .downcast::<T>()
            .ok_or_else(|| Error::CapabilityType {
                module: module_id.to_string(),
                name: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Discovery and orchestration
    // ------------------------------------------------------------------

    pub fn find_modules_by_label<Q>(&self, labels: Q, min_similarity: f64) -> Vec<ModuleMatch>
    where
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        self.matcher
            .find_modules_by_label(&self.manifests(), labels, min_similarity)
    }

    pub fn find_modules_by_telos<Q>(&self, telos: Q, min_similarity: f64) -> Vec<ModuleMatch>
    where
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        self.matcher
            .find_modules_by_telos(&self.manifests(), telos, min_similarity)
    }

    /// Activate every module whose telos alignment meets the orchestration
    /// threshold. Returns the ids this call activated.
    ///
    /// A failing activation is skipped; it was already announced on the bus.
    pub async fn orchestrate_by_telos<Q>(&self, user_telos: Q) -> Vec<ModuleId>
    where
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        let telos: Vec<String> = user_telos.into_iter().map(|t| t.as_ref().to_string()).collect();
        let matches = self.find_modules_by_telos(&telos, self.config.orchestration_threshold);

        let mut activated = Vec::new();
        for m in matches {
            if self.handle(m.id.as_str()).is_some_and(|(_, s)| s == ModuleStatus::Active) {
                continue;
            }
            let lock = self.lifecycle_lock(m.id.as_str());
            let outcome = {
                let _guard = lock.lock().await;
                self.activate_locked(m.id.as_str()).await
            };
            self.release_lock(m.id.as_str());
            match outcome {
                Ok(true) => activated.push(m.id),
                Ok(false) => {}
                Err(e) => warn!("Orchestration skipped {}: {}", m.id, e),
            }
        }

        info!("Telos orchestration {:?} activated {} modules", telos, activated.len());
        self.announce(
            TELOS_ORCHESTRATION_COMPLETE,
            json!({ "telos": telos, "activated": activated }),
        );
        activated
    }

    // ------------------------------------------------------------------
    // Resource management
    // ------------------------------------------------------------------

    /// Destroy inactive modules whose last deactivation is older than the
    /// purge window. Modules that were never activated have no
    /// deactivation time and are kept.
    pub async fn purge_cycle(&self) -> Vec<ModuleId> {
        let window = self.config.purge_window();
        let stale = move |s: &ModuleRuntimeState| {
            s.status == ModuleStatus::Inactive
                && s.last_deactivated.is_some_and(|t| Utc::now() - t > window)
        };

        let candidates: Vec<ModuleId> = self
            .modules
            .iter()
            .filter(|e| stale(&e.state))
            .map(|e| e.key().clone())
            .collect();

        let mut purged = Vec::new();
        for id in candidates {
            // re-checked under the lock: the module may have been reactivated
            if self.destroy_where(id.as_str(), stale).await {
                purged.push(id);
            }
        }

        info!("Purge cycle removed {} modules", purged.len());
        self.announce(
            PURGE_CYCLE_COMPLETE,
            json!({ "purged_count": purged.len(), "purged": purged }),
        );
        purged
    }

    /// Evict non-active modules, largest declared footprint first, until
    /// total usage drops below the threshold. Active modules are never
    /// evicted.
    pub async fn handle_low_memory(&self) -> LowMemoryReport {
        let threshold = self.config.low_memory_threshold_mb;
        let mut candidates: Vec<(ModuleId, u64)> = self
            .modules
            .iter()
            .map(|e| (e.key().clone(), e.manifest.resource_footprint_mb))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut usage = self.get_total_memory_usage();
        let mut evicted = Vec::new();
        for (id, footprint) in candidates {
            if usage < threshold {
                break;
            }
            if self
                .destroy_where(id.as_str(), |s| s.status != ModuleStatus::Active)
                .await
            {
                debug!("Evicted {} ({} MB) under memory pressure", id, footprint);
                evicted.push(id);
                usage = self.get_total_memory_usage();
            }
        }

        if usage >= threshold {
            warn!("Memory usage {} MB still at or above {} MB after eviction", usage, threshold);
        }
        info!("Low-memory pass evicted {} modules, usage now {} MB", evicted.len(), usage);
        self.announce(
            LOW_MEMORY_HANDLED,
            json!({ "final_usage_mb": usage, "threshold_mb": threshold, "evicted": evicted }),
        );
        LowMemoryReport { evicted, final_usage_mb: usage }
    }

    fn listen_for_memory_pressure(&self) {
        let weak = self.self_ref.clone();
        let sub = self.bus.subscribe(MEMORY_PRESSURE, move |_e: &SemanticEvent| {
            let Some(manager) = weak.upgrade() else {
                return Ok(Delivery::Done);
            };
            Ok(Delivery::deferred(async move {
                manager.handle_low_memory().await;
                Ok(())
            }))
        });
        *self
            .pressure_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sub);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_module_state(&self, id: &str) -> Option<ModuleRuntimeState> {
        self.modules.get(id).map(|e| e.state.clone())
    }

    /// Ids of active modules, sorted.
    pub fn get_active_modules(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self
            .modules
            .iter()
            .filter(|e| e.state.status == ModuleStatus::Active)
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every registered module, sorted by id.
    pub fn get_all_modules(&self) -> Vec<ModuleSnapshot> {
        let mut all: Vec<ModuleSnapshot> = self
            .modules
            .iter()
            .map(|e| ModuleSnapshot {
                manifest: e.manifest.clone(),
                state: e.state.clone(),
            })
            .collect();
        all.sort_by(|a, b| a.manifest.id.cmp(&b.manifest.id));
        all
    }

    /// Sum of declared footprints of every registered module.
    pub fn get_total_memory_usage(&self) -> u64 {
        self.modules.iter().map(|e| e.state.resource_usage_mb).sum()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_known(&self, id: &str) -> Result<()> {
        if self.modules.contains_key(id) {
            Ok(())
        } else {
            Err(Error::ModuleNotFound(id.to_string()))
        }
    }

    fn lifecycle_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(ModuleId::new(id))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Forget the lock of a module that is gone, unless someone else still
    /// holds or waits on it. The caller's own clone counts as one reference.
    fn release_lock(&self, id: &str) {
        self.locks
            .remove_if(id, |_, l| Arc::strong_count(l) <= 2 && !self.modules.contains_key(id));
    }

    fn handle(&self, id: &str) -> Option<(Arc<dyn Module>, ModuleStatus)> {
        self.modules
            .get(id)
            .map(|e| (e.module.clone(), e.state.status))
    }

    fn update_state(&self, id: &str, f: impl FnOnce(&mut ModuleRuntimeState)) {
        if let Some(mut entry) = self.modules.get_mut(id) {
            f(&mut entry.state);
        }
    }

    fn module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn manifests(&self) -> Vec<ModuleManifest> {
        let mut manifests: Vec<ModuleManifest> = self.modules.iter().map(|e| e.manifest.clone()).collect();
        manifests.sort_by(|a, b| a.id.cmp(&b.id));
        manifests
    }

    fn context_for(&self, id: &ModuleId) -> ModuleContext {
        ModuleContext::new(id.clone(), self.bus.clone(), self.self_ref.clone())
    }

    /// Lifecycle events go out after every map guard has been released, so
    /// handlers may query the manager.
    fn announce(&self, event_type: &str, payload: serde_json::Value) {
        self.bus.publish(
            SemanticEvent::new(event_type, MANAGER_SOURCE)
                .with_labels(["lifecycle"])
                .with_payload(payload),
        );
    }
}
