//! Tests for resonance-kernel: lifecycle state machine, capabilities, orchestration, eviction

use async_trait::async_trait;
use resonance_bus::HistoryFilter;
use resonance_core::event_types::*;
use resonance_core::{
    Error, KernelConfig, ManagerConfig, ModuleId, ModuleManifest, ModuleStatus, SemanticEvent,
};
use resonance_kernel::*;
use serde_json::json;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

// ===========================================================================
// Test module
// ===========================================================================

#[derive(Default)]
struct Behaviour {
    fail_initialize: bool,
    fail_activate: bool,
    fail_deactivate: bool,
    activate_delay: Option<Duration>,
}

struct TestModule {
    manifest: ModuleManifest,
    behaviour: Behaviour,
    calls: Arc<Mutex<Vec<String>>>,
    ctx: OnceLock<ModuleContext>,
    capabilities: CapabilityTable,
}

impl TestModule {
    fn new(manifest: ModuleManifest) -> Self {
        Self {
            manifest,
            behaviour: Behaviour::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
            ctx: OnceLock::new(),
            capabilities: CapabilityTable::new(),
        }
    }

    fn with(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    fn exposing(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = capabilities;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Status the manager reports for this module right now.
    fn observed_status(&self) -> String {
        self.ctx
            .get()
            .and_then(|ctx| ctx.manager())
            .and_then(|m| m.get_module_state(self.manifest.id.as_str()))
            .map(|s| s.status.to_string())
            .unwrap_or_else(|| "gone".to_string())
    }
}

#[async_trait]
impl Module for TestModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn initialize(&self, ctx: ModuleContext) -> anyhow::Result<()> {
        self.record("initialize");
        let _ = self.ctx.set(ctx);
        if self.behaviour.fail_initialize {
            anyhow::bail!("no canvas available");
        }
        Ok(())
    }

    async fn activate(&self) -> anyhow::Result<()> {
        if let Some(delay) = self.behaviour.activate_delay {
            tokio::time::sleep(delay).await;
        }
        self.record("activate");
        if self.behaviour.fail_activate {
            anyhow::bail!("sensor offline");
        }
        Ok(())
    }

    async fn deactivate(&self) -> anyhow::Result<()> {
        self.record("deactivate");
        if self.behaviour.fail_deactivate {
            anyhow::bail!("could not release sensor");
        }
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.record(format!("destroy({})", self.observed_status()));
        Ok(())
    }

    fn capabilities(&self) -> CapabilityTable {
        self.capabilities.clone()
    }
}

fn manifest(id: &str, telos: &[&str], footprint_mb: u64) -> ModuleManifest {
    ModuleManifest::new(id, id, "1.0.0")
        .with_labels(["session"])
        .with_capabilities(["orchestrate"])
        .with_telos(telos.iter().copied())
        .with_footprint_mb(footprint_mb)
}

fn kernel_with(manager: ManagerConfig) -> Kernel {
    Kernel::new(KernelConfig { manager, ..KernelConfig::default() })
}

fn events_of(kernel: &Kernel, event_type: &str) -> Vec<SemanticEvent> {
    kernel.bus().query_history(&HistoryFilter::new().types([event_type]))
}

fn names(ids: &[ModuleId]) -> Vec<&str> {
    ids.iter().map(|id| id.as_str()).collect()
}

async fn register(kernel: &Kernel, module: TestModule) -> Arc<TestModule> {
    let module = Arc::new(module);
    kernel.manager().register_module(module.clone()).await.unwrap();
    module
}

// ===========================================================================
// Registration
// ===========================================================================

#[tokio::test]
async fn registration_publishes_and_starts_registered() {
    let kernel = Kernel::default();
    let m = register(&kernel, TestModule::new(manifest("mandala", &["healing"], 40))).await;

    let state = kernel.manager().get_module_state("mandala").unwrap();
    assert_eq!(state.status, ModuleStatus::Registered);
    assert_eq!(state.resource_usage_mb, 40);
    assert_eq!(state.error_count, 0);
    assert_eq!(m.calls(), vec!["initialize"]);

    let events = events_of(&kernel, MODULE_REGISTERED);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_module, "module-manager");
    assert!(events[0].labels.contains("lifecycle"));
    assert_eq!(events[0].payload["module_id"], json!("mandala"));
}

#[tokio::test]
async fn dissonant_low_integrity_manifest_is_rejected() {
    let kernel = Kernel::default();
    let module = Arc::new(TestModule::new(
        ModuleManifest::new("shady", "Shady", "0.0.1")
            .with_capabilities(["orchestrate"])
            .with_telos(["healing"])
            .with_integrity(40),
    ));

    let err = kernel.manager().register_module(module.clone()).await.unwrap_err();
    match err {
        Error::Validation { module, issues } => {
            assert_eq!(module, "shady");
            assert!(issues.iter().any(|i| i.contains("integrity")));
            assert!(issues.iter().any(|i| i.contains("essence labels")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(kernel.manager().get_all_modules().is_empty());
    assert!(module.calls().is_empty(), "initialize must not run");
    assert_eq!(events_of(&kernel, MODULE_REGISTRATION_REJECTED).len(), 1);
    assert!(events_of(&kernel, MODULE_REGISTERED).is_empty());
}

#[tokio::test]
async fn dissonant_but_trusted_manifest_is_admitted() {
    let kernel = Kernel::default();
    // visual label with no rendering capability, integrity still high
    let m = ModuleManifest::new("sketch", "Sketch", "0.1.0")
        .with_labels(["visual"])
        .with_capabilities(["export-png"])
        .with_telos(["creativity"]);
    register(&kernel, TestModule::new(m)).await;
    assert_eq!(kernel.manager().module_count(), 1);
}

#[tokio::test]
async fn failed_initialize_leaves_no_trace() {
    let kernel = Kernel::default();
    let module = Arc::new(
        TestModule::new(manifest("broken", &["healing"], 10))
            .with(Behaviour { fail_initialize: true, ..Behaviour::default() }),
    );

    let err = kernel.manager().register_module(module).await.unwrap_err();
    assert!(matches!(err, Error::Lifecycle { hook: "initialize", .. }));
    assert!(kernel.manager().get_module_state("broken").is_none());
    assert_eq!(events_of(&kernel, MODULE_REGISTRATION_FAILED).len(), 1);
}

#[tokio::test]
async fn reregistering_an_id_replaces_the_old_instance() {
    let kernel = Kernel::default();
    let first = register(&kernel, TestModule::new(manifest("aura", &["healing"], 20))).await;
    kernel.manager().activate_module("aura").await.unwrap();

    let second = register(&kernel, TestModule::new(manifest("aura", &["healing"], 30))).await;

    assert_eq!(
        first.calls(),
        vec!["initialize", "activate", "deactivate", "destroy(inactive)"]
    );
    assert_eq!(second.calls(), vec!["initialize"]);
    let state = kernel.manager().get_module_state("aura").unwrap();
    assert_eq!(state.status, ModuleStatus::Registered);
    assert_eq!(state.resource_usage_mb, 30);
    assert_eq!(kernel.manager().module_count(), 1);

    let order: Vec<String> = kernel
        .bus()
        .query_history(&HistoryFilter::new().labels(["lifecycle"]))
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        order,
        vec![
            MODULE_REGISTERED,
            MODULE_ACTIVATED,
            MODULE_DEACTIVATED,
            MODULE_DESTROYED,
            MODULE_REGISTERED
        ]
    );
}

// ===========================================================================
// Activation and deactivation
// ===========================================================================

#[tokio::test]
async fn activating_unknown_module_is_not_found() {
    let kernel = Kernel::default();
    let err = kernel.manager().activate_module("ghost").await.unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound(ref id) if id == "ghost"));
    assert!(err.is_not_found());
    assert!(kernel.manager().deactivate_module("ghost").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn double_activation_is_a_noop() {
    let kernel = Kernel::default();
    let m = register(&kernel, TestModule::new(manifest("pulse", &["healing"], 10))).await;

    kernel.manager().activate_module("pulse").await.unwrap();
    kernel.manager().activate_module("pulse").await.unwrap();

    assert_eq!(m.calls(), vec!["initialize", "activate"]);
    assert_eq!(events_of(&kernel, MODULE_ACTIVATED).len(), 1);
    let state = kernel.manager().get_module_state("pulse").unwrap();
    assert_eq!(state.status, ModuleStatus::Active);
    assert!(state.last_activated.is_some());
}

#[tokio::test]
async fn concurrent_activation_runs_the_hook_once() {
    let kernel = Kernel::default();
    let m = register(
        &kernel,
        TestModule::new(manifest("slow", &["healing"], 10)).with(Behaviour {
            activate_delay: Some(Duration::from_millis(30)),
            ..Behaviour::default()
        }),
    )
    .await;

    let manager = kernel.manager();
    let (a, b) = tokio::join!(manager.activate_module("slow"), manager.activate_module("slow"));
    a.unwrap();
    b.unwrap();

    assert_eq!(m.calls().iter().filter(|c| *c == "activate").count(), 1);
    assert_eq!(events_of(&kernel, MODULE_ACTIVATED).len(), 1);
}

#[tokio::test]
async fn activation_failure_is_counted_and_retryable() {
    let kernel = Kernel::default();
    register(
        &kernel,
        TestModule::new(manifest("sensor", &["healing"], 10))
            .with(Behaviour { fail_activate: true, ..Behaviour::default() }),
    )
    .await;

    for _ in 0..2 {
        let err = kernel.manager().activate_module("sensor").await.unwrap_err();
        assert!(matches!(err, Error::Lifecycle { hook: "activate", .. }));
    }

    let state = kernel.manager().get_module_state("sensor").unwrap();
    assert_eq!(state.status, ModuleStatus::Registered);
    assert_eq!(state.error_count, 2);
    let failures = events_of(&kernel, MODULE_ACTIVATION_FAILED);
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[1].payload["error_count"], json!(2));
}

#[tokio::test]
async fn deactivate_hook_failure_still_deactivates() {
    let kernel = Kernel::default();
    register(
        &kernel,
        TestModule::new(manifest("grip", &["healing"], 10))
            .with(Behaviour { fail_deactivate: true, ..Behaviour::default() }),
    )
    .await;
    kernel.manager().activate_module("grip").await.unwrap();
    kernel.manager().deactivate_module("grip").await.unwrap();

    let state = kernel.manager().get_module_state("grip").unwrap();
    assert_eq!(state.status, ModuleStatus::Inactive);
    assert!(state.last_deactivated.is_some());
    assert_eq!(state.error_count, 1);
}

#[tokio::test]
async fn deactivating_an_idle_module_is_a_noop() {
    let kernel = Kernel::default();
    let m = register(&kernel, TestModule::new(manifest("idle", &["healing"], 10))).await;
    kernel.manager().deactivate_module("idle").await.unwrap();

    assert_eq!(m.calls(), vec!["initialize"]);
    assert!(events_of(&kernel, MODULE_DEACTIVATED).is_empty());
    assert_eq!(
        kernel.manager().get_module_state("idle").unwrap().status,
        ModuleStatus::Registered
    );
}

#[tokio::test]
async fn inactive_module_can_be_reactivated() {
    let kernel = Kernel::default();
    register(&kernel, TestModule::new(manifest("tide", &["healing"], 10))).await;
    let manager = kernel.manager();
    manager.activate_module("tide").await.unwrap();
    manager.deactivate_module("tide").await.unwrap();
    manager.activate_module("tide").await.unwrap();
    assert_eq!(names(&manager.get_active_modules()), vec!["tide"]);
}

// ===========================================================================
// Destruction
// ===========================================================================

#[tokio::test]
async fn destroying_active_module_deactivates_before_destroy_hook() {
    let kernel = Kernel::default();
    let m = register(&kernel, TestModule::new(manifest("bloom", &["healing"], 25))).await;
    kernel.manager().activate_module("bloom").await.unwrap();

    kernel.manager().destroy_module("bloom").await;

    assert_eq!(
        m.calls(),
        vec!["initialize", "activate", "deactivate", "destroy(inactive)"]
    );
    assert!(kernel.manager().get_module_state("bloom").is_none());
    assert!(kernel.manager().get_exposed_item("bloom", "anything").unwrap_err().is_not_found());
    assert_eq!(kernel.manager().get_total_memory_usage(), 0);

    let destroyed = events_of(&kernel, MODULE_DESTROYED);
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].payload["freed_mb"], json!(25));
}

#[tokio::test]
async fn destroying_unknown_module_is_silent() {
    let kernel = Kernel::default();
    kernel.manager().destroy_module("nobody").await;
    assert!(events_of(&kernel, MODULE_DESTROYED).is_empty());
}

// ===========================================================================
// Capabilities
// ===========================================================================

trait Palette: Send + Sync {
    fn colors(&self) -> Vec<&'static str>;
}

struct Dawn;

impl Palette for Dawn {
    fn colors(&self) -> Vec<&'static str> {
        vec!["gold", "violet"]
    }
}

#[tokio::test]
async fn capabilities_are_typed() {
    let kernel = Kernel::default();
    let palette: Arc<dyn Palette> = Arc::new(Dawn);
    register(
        &kernel,
        TestModule::new(manifest("painter", &["creativity"], 10))
            .exposing(CapabilityTable::new().with("palette", palette)),
    )
    .await;
    let manager = kernel.manager();

    let got = manager.get_capability::<dyn Palette>("painter", "palette").unwrap();
    assert_eq!(got.colors(), vec!["gold", "violet"]);
    assert_eq!(manager.get_exposed_item("painter", "palette").unwrap().type_name(), std::any::type_name::<dyn Palette>());

    assert!(matches!(
        manager.get_capability::<String>("painter", "palette"),
        Err(Error::CapabilityType { .. })
    ));
    assert!(matches!(
        manager.get_capability::<dyn Palette>("painter", "brush"),
        Err(Error::CapabilityNotFound { .. })
    ));
    assert!(matches!(
        manager.get_capability::<dyn Palette>("nobody", "palette"),
        Err(Error::ModuleNotFound(_))
    ));
}

#[tokio::test]
async fn modules_reach_each_other_through_context() {
    let kernel = Kernel::default();
    let palette: Arc<dyn Palette> = Arc::new(Dawn);
    register(
        &kernel,
        TestModule::new(manifest("painter", &["creativity"], 10))
            .exposing(CapabilityTable::new().with("palette", palette)),
    )
    .await;
    let viewer = register(&kernel, TestModule::new(manifest("viewer", &["creativity"], 10))).await;

    let ctx = viewer.ctx.get().unwrap();
    assert_eq!(ctx.module_id().as_str(), "viewer");
    let colors = ctx.capability::<dyn Palette>("painter", "palette").unwrap().colors();
    assert_eq!(colors, vec!["gold", "violet"]);

    let emitted = ctx.emit("frame-rendered", ["visual"], json!({ "fps": 60 }));
    assert_eq!(emitted.source_module, "viewer");
    assert_eq!(emitted.resonance_signature, 4.0);
}

// ===========================================================================
// Discovery and orchestration
// ===========================================================================

#[tokio::test]
async fn orchestration_activates_aligned_modules_only() {
    let kernel = Kernel::default();
    let healer = register(&kernel, TestModule::new(manifest("healer", &["healing"], 10))).await;
    // related telos scores 50, below the default threshold of 60
    let relaxer = register(&kernel, TestModule::new(manifest("relaxer", &["relaxation"], 10))).await;
    register(&kernel, TestModule::new(manifest("focus", &["insight"], 10))).await;
    register(
        &kernel,
        TestModule::new(manifest("flaky", &["healing"], 10))
            .with(Behaviour { fail_activate: true, ..Behaviour::default() }),
    )
    .await;

    let activated = kernel.manager().orchestrate_by_telos(["healing"]).await;

    assert_eq!(names(&activated), vec!["healer"]);
    assert_eq!(healer.calls(), vec!["initialize", "activate"]);
    assert_eq!(relaxer.calls(), vec!["initialize"]);
    assert_eq!(kernel.manager().get_module_state("flaky").unwrap().error_count, 1);

    let done = events_of(&kernel, TELOS_ORCHESTRATION_COMPLETE);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].payload["activated"], json!(["healer"]));

    // already active modules are not counted again
    let again = kernel.manager().orchestrate_by_telos(["healing"]).await;
    assert!(again.is_empty());
}

#[tokio::test]
async fn discovery_ranks_registered_manifests() {
    let kernel = Kernel::default();
    register(&kernel, TestModule::new(manifest("healer", &["healing"], 10))).await;
    register(&kernel, TestModule::new(manifest("relaxer", &["relaxation"], 10))).await;

    let found = kernel.manager().find_modules_by_telos(["healing"], 0.1);
    let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["healer", "relaxer"]);
    assert_eq!(found[0].score, 100.0);
    assert_eq!(found[1].score, 50.0);

    let by_label = kernel.manager().find_modules_by_label(["session"], 100.0);
    assert_eq!(by_label.len(), 2);
}

// ===========================================================================
// Resource management
// ===========================================================================

#[tokio::test]
async fn purge_removes_only_stale_inactive_modules() {
    let kernel = kernel_with(ManagerConfig { purge_inactive_after_secs: 0, ..ManagerConfig::default() });
    let manager = kernel.manager();
    register(&kernel, TestModule::new(manifest("live", &["healing"], 10))).await;
    register(&kernel, TestModule::new(manifest("resting", &["healing"], 10))).await;
    register(&kernel, TestModule::new(manifest("fresh", &["healing"], 10))).await;

    manager.activate_module("live").await.unwrap();
    manager.activate_module("resting").await.unwrap();
    manager.deactivate_module("resting").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let purged = manager.purge_cycle().await;

    assert_eq!(names(&purged), vec!["resting"]);
    assert!(manager.get_module_state("live").is_some());
    // never activated, so never deactivated: not eligible
    assert!(manager.get_module_state("fresh").is_some());
    let done = events_of(&kernel, PURGE_CYCLE_COMPLETE);
    assert_eq!(done[0].payload["purged_count"], json!(1));
}

#[tokio::test]
async fn purge_respects_the_window() {
    let kernel = Kernel::default();
    let manager = kernel.manager();
    register(&kernel, TestModule::new(manifest("resting", &["healing"], 10))).await;
    manager.activate_module("resting").await.unwrap();
    manager.deactivate_module("resting").await.unwrap();

    assert!(manager.purge_cycle().await.is_empty());
    assert_eq!(manager.module_count(), 1);
}

#[tokio::test]
async fn purge_never_touches_a_reactivated_module() {
    let kernel = kernel_with(ManagerConfig { purge_inactive_after_secs: 0, ..ManagerConfig::default() });
    let manager = kernel.manager();
    register(&kernel, TestModule::new(manifest("phoenix", &["healing"], 10))).await;

    manager.activate_module("phoenix").await.unwrap();
    manager.deactivate_module("phoenix").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.activate_module("phoenix").await.unwrap();

    // stale deactivation timestamp, but the module is active again
    let state = manager.get_module_state("phoenix").unwrap();
    assert!(state.last_deactivated.is_some());

    assert!(manager.purge_cycle().await.is_empty());
    assert_eq!(
        manager.get_module_state("phoenix").unwrap().status,
        ModuleStatus::Active
    );
}

#[tokio::test]
async fn unbounded_purge_window_never_purges() {
    for secs in [u64::MAX, 100_000_000_000_000_000] {
        let kernel = kernel_with(ManagerConfig { purge_inactive_after_secs: secs, ..ManagerConfig::default() });
        let manager = kernel.manager();
        register(&kernel, TestModule::new(manifest("resting", &["healing"], 10))).await;
        manager.activate_module("resting").await.unwrap();
        manager.deactivate_module("resting").await.unwrap();

        assert!(manager.purge_cycle().await.is_empty(), "window {secs}");
        assert_eq!(manager.module_count(), 1);
    }
}

#[tokio::test]
async fn low_memory_evicts_largest_idle_modules_first() {
    let kernel = kernel_with(ManagerConfig { low_memory_threshold_mb: 100, ..ManagerConfig::default() });
    let manager = kernel.manager();
    register(&kernel, TestModule::new(manifest("canvas", &["healing"], 80))).await;
    register(&kernel, TestModule::new(manifest("archive", &["healing"], 50))).await;
    register(&kernel, TestModule::new(manifest("drone", &["healing"], 30))).await;
    register(&kernel, TestModule::new(manifest("tick", &["healing"], 10))).await;
    manager.activate_module("canvas").await.unwrap();
    manager.activate_module("drone").await.unwrap();
    manager.deactivate_module("drone").await.unwrap();
    assert_eq!(manager.get_total_memory_usage(), 170);

    let report = manager.handle_low_memory().await;

    assert_eq!(names(&report.evicted), vec!["archive", "drone"]);
    assert_eq!(report.final_usage_mb, 90);
    assert!(manager.get_module_state("canvas").is_some());
    assert!(manager.get_module_state("tick").is_some());
    let handled = events_of(&kernel, LOW_MEMORY_HANDLED);
    assert_eq!(handled[0].payload["final_usage_mb"], json!(90));
}

#[tokio::test]
async fn low_memory_never_evicts_active_modules() {
    let kernel = kernel_with(ManagerConfig { low_memory_threshold_mb: 10, ..ManagerConfig::default() });
    let manager = kernel.manager();
    register(&kernel, TestModule::new(manifest("a", &["healing"], 40))).await;
    register(&kernel, TestModule::new(manifest("b", &["healing"], 40))).await;
    manager.activate_module("a").await.unwrap();
    manager.activate_module("b").await.unwrap();

    let report = manager.handle_low_memory().await;
    assert!(report.evicted.is_empty());
    assert_eq!(report.final_usage_mb, 80);
    assert_eq!(manager.module_count(), 2);
}

#[tokio::test]
async fn memory_pressure_event_triggers_eviction() {
    let kernel = kernel_with(ManagerConfig { low_memory_threshold_mb: 50, ..ManagerConfig::default() });
    register(&kernel, TestModule::new(manifest("heavy", &["healing"], 70))).await;

    kernel
        .bus()
        .publish(SemanticEvent::new(MEMORY_PRESSURE, "host").with_payload(json!({ "available_mb": 12 })));
    kernel.bus().supervisor().drain().await;

    assert_eq!(kernel.manager().module_count(), 0);
    assert_eq!(events_of(&kernel, LOW_MEMORY_HANDLED).len(), 1);
}

// ===========================================================================
// Queries and teardown
// ===========================================================================

#[tokio::test]
async fn snapshots_are_sorted_by_id() {
    let kernel = Kernel::default();
    register(&kernel, TestModule::new(manifest("zen", &["healing"], 5))).await;
    register(&kernel, TestModule::new(manifest("aura", &["healing"], 7))).await;

    let all = kernel.manager().get_all_modules();
    let ids: Vec<&str> = all.iter().map(|s| s.manifest.id.as_str()).collect();
    assert_eq!(ids, vec!["aura", "zen"]);
    assert_eq!(kernel.manager().get_total_memory_usage(), 12);
    assert!(kernel.manager().get_active_modules().is_empty());
}

#[tokio::test]
async fn shutdown_destroys_everything_and_detaches() {
    let kernel = Kernel::default();
    let a = register(&kernel, TestModule::new(manifest("a", &["healing"], 10))).await;
    let b = register(&kernel, TestModule::new(manifest("b", &["healing"], 10))).await;
    kernel.manager().activate_module("a").await.unwrap();
    assert_eq!(kernel.bus().subscriber_count(), 1);

    kernel.shutdown().await;

    assert_eq!(kernel.manager().module_count(), 0);
    assert_eq!(a.calls().last().unwrap(), "destroy(inactive)");
    assert_eq!(b.calls().last().unwrap(), "destroy(registered)");
    assert_eq!(kernel.bus().subscriber_count(), 0);
    assert_eq!(events_of(&kernel, MODULE_DESTROYED).len(), 2);
}
