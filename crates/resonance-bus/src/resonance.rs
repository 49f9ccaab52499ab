//! Resonance signature scoring.

use resonance_core::{ResonanceConfig, SemanticEvent};
use std::collections::HashMap;

pub const MAX_RESONANCE: f64 = 100.0;

const BUILTIN_WEIGHTS: &[(&str, f64)] = &[
    ("consciousness", 10.0),
    ("sacred", 9.0),
    ("transcendence", 9.0),
    ("coherence", 8.0),
    ("harmony", 7.0),
    ("resonance", 7.0),
    ("cosmic", 6.0),
    ("biometric", 6.0),
    ("heart", 6.0),
    ("breath", 5.0),
    ("meditation", 5.0),
    ("emotion", 5.0),
    ("visual", 4.0),
    ("audio", 4.0),
    ("fractal", 4.0),
    ("geometry", 4.0),
    ("lifecycle", 1.0),
];

/// Per-label weights: the built-in table with config overrides merged on top.
#[derive(Debug, Clone)]
pub struct ResonanceWeights {
    table: HashMap<String, f64>,
    default_weight: f64,
}

impl Default for ResonanceWeights {
    fn default() -> Self {
        Self::new(&ResonanceConfig::default())
    }
}

impl ResonanceWeights {
    pub fn new(config: &ResonanceConfig) -> Self {
        let mut table: HashMap<String, f64> = BUILTIN_WEIGHTS
            .iter()
            .map(|(label, w)| (label.to_string(), *w))
            .collect();
        table.extend(config.weights.iter().map(|(k, v)| (k.clone(), *v)));
        Self {
            table,
            default_weight: config.default_weight,
        }
    }

    pub fn weight(&self, label: &str) -> f64 {
        self.table.get(label).copied().unwrap_or(self.default_weight)
    }

    /// Σ label weights × (1 + amplitude) × coherenceScore, clamped to [0, 100].
    ///
    /// Missing or non-numeric payload fields leave the factor out.
    pub fn score(&self, event: &SemanticEvent) -> f64 {
        let mut score: f64 = event.labels.iter().map(|l| self.weight(l)).sum();
        if let Some(amplitude) = event.payload_number("amplitude") {
            score *= 1.0 + amplitude;
        }
        if let Some(coherence) = event.payload_number("coherenceScore") {
            score *= coherence;
        }
        if !score.is_finite() {
            return 0.0;
        }
        score.clamp(0.0, MAX_RESONANCE)
    }
}
