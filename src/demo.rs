//! Sample modules and the demonstration session.

use async_trait::async_trait;
use resonance_bus::ResonanceField;
use resonance_core::{ModuleId, ModuleManifest, SemanticEvent};
use resonance_kernel::{CapabilityTable, Kernel, Module, ModuleContext};
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Something that can turn a coherence reading into a frame.
pub trait Renderer: Send + Sync {
    fn render(&self, coherence: f64) -> String;
}

struct MandalaBrush {
    petals: u32,
}

impl Renderer for MandalaBrush {
    fn render(&self, coherence: f64) -> String {
        let open = (coherence.clamp(0.0, 1.0) * self.petals as f64).round() as u32;
        format!("mandala {}/{} petals open", open, self.petals)
    }
}

/// Source of heart coherence readings.
pub trait CoherenceSource: Send + Sync {
    fn read(&self) -> f64;
}

struct SteadyHeart(f64);

impl CoherenceSource for SteadyHeart {
    fn read(&self) -> f64 {
        self.0
    }
}

/// Generic sample module: a manifest, a context slot, and an optional
/// capability table. Activation emits one `<id>-awakened` event.
pub struct SampleModule {
    manifest: ModuleManifest,
    capabilities: CapabilityTable,
    ctx: OnceLock<ModuleContext>,
}

impl SampleModule {
    fn new(manifest: ModuleManifest, capabilities: CapabilityTable) -> Self {
        Self {
            manifest,
            capabilities,
            ctx: OnceLock::new(),
        }
    }
}

#[async_trait]
impl Module for SampleModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    async fn initialize(&self, ctx: ModuleContext) -> anyhow::Result<()> {
        if self.ctx.set(ctx).is_err() {
            anyhow::bail!("{} initialized twice", self.manifest.id);
        }
        Ok(())
    }

    async fn activate(&self) -> anyhow::Result<()> {
        if let Some(ctx) = self.ctx.get() {
            ctx.emit(
                format!("{}-awakened", self.manifest.id).as_str(),
                self.manifest.essence_labels.iter().cloned(),
                json!({ "footprint_mb": self.manifest.resource_footprint_mb }),
            );
        }
        Ok(())
    }

    fn capabilities(&self) -> CapabilityTable {
        self.capabilities.clone()
    }
}

fn sample(manifest: ModuleManifest, capabilities: CapabilityTable) -> Arc<dyn Module> {
    Arc::new(SampleModule::new(manifest, capabilities))
}

/// The built-in sample set.
pub fn sample_modules() -> Vec<Arc<dyn Module>> {
    let brush: Arc<dyn Renderer> = Arc::new(MandalaBrush { petals: 12 });
    let heart: Arc<dyn CoherenceSource> = Arc::new(SteadyHeart(0.8));

    vec![
        sample(
            ModuleManifest::new("mandala", "Mandala Renderer", "0.3.1")
                .with_labels(["visual", "geometry", "sacred"])
                .with_capabilities(["render-mandala"])
                .with_telos(["healing", "coherence-building"])
                .with_footprint_mb(40),
            CapabilityTable::new().with("renderer", brush),
        ),
        sample(
            ModuleManifest::new("heart-sensor", "Heart Coherence Sensor", "1.2.0")
                .with_labels(["biometric", "heart", "coherence"])
                .with_capabilities(["biometric-stream"])
                .with_telos(["healing", "relaxation"])
                .with_footprint_mb(15),
            CapabilityTable::new().with("coherence", heart),
        ),
        sample(
            ModuleManifest::new("breath-guide", "Breath Guide", "0.9.0")
                .with_labels(["breath", "meditation", "audio"])
                .with_capabilities(["audio-guidance"])
                .with_telos(["meditation-support", "relaxation"])
                .with_footprint_mb(20),
            CapabilityTable::new(),
        ),
        sample(
            ModuleManifest::new("star-chart", "Star Chart", "0.1.0")
                .with_labels(["cosmic", "astrology"])
                .with_capabilities(["chart-render"])
                .with_telos(["self-discovery"])
                .with_footprint_mb(60),
            CapabilityTable::new(),
        ),
    ]
}

/// Register the sample modules, orchestrate for `telos`, publish a short
/// burst of readings, and return the resulting field.
pub async fn run_session(kernel: &Kernel, telos: &[String]) -> anyhow::Result<(Vec<ModuleId>, ResonanceField)> {
    let manager = kernel.manager();
    for module in sample_modules() {
        let id = module.manifest().id.clone();
        if let Err(e) = manager.register_module(module).await {
            warn!("Sample module {} not registered: {}", id, e);
        }
    }

    let activated = manager.orchestrate_by_telos(telos).await;
    info!("Activated {:?}", activated);

    let active = manager.get_active_modules();
    if active.iter().any(|id| id.as_str() == "heart-sensor") {
        let source = manager.get_capability::<dyn CoherenceSource>("heart-sensor", "coherence")?;
        let coherence = source.read();
        kernel.bus().publish(
            SemanticEvent::new("coherence-reading", "heart-sensor")
                .with_labels(["heart", "coherence"])
                .with_payload(json!({ "coherenceScore": coherence, "amplitude": 0.5 })),
        );

        if active.iter().any(|id| id.as_str() == "mandala") {
            let renderer = manager.get_capability::<dyn Renderer>("mandala", "renderer")?;
            let frame = renderer.render(coherence);
            info!("{}", frame);
            kernel.bus().publish(
                SemanticEvent::new("visual-frame", "mandala")
                    .with_labels(["visual", "geometry"])
                    .with_payload(json!({ "frame": frame })),
            );
        }
    }

    let field = kernel.bus().resonance_field();
    Ok((activated, field))
}
