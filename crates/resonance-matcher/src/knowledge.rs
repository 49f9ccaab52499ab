//! Static relatedness tables for essence labels and telos.

use std::collections::{BTreeSet, HashMap};

const LABEL_RELATIONS: &[(&str, &[&str])] = &[
    ("visual", &["render", "color", "geometry", "fractal", "light"]),
    ("audio", &["sound", "frequency", "rhythm", "music"]),
    ("biometric", &["heart", "breath", "sensor", "physiology"]),
    ("heart", &["biometric", "coherence", "emotion", "rhythm"]),
    ("breath", &["biometric", "meditation", "rhythm"]),
    ("coherence", &["harmony", "heart", "resonance"]),
    ("harmony", &["coherence", "resonance", "music"]),
    ("resonance", &["harmony", "frequency", "coherence"]),
    ("sacred", &["geometry", "cosmic", "transcendence"]),
    ("geometry", &["sacred", "fractal", "visual"]),
    ("fractal", &["geometry", "visual", "recursion"]),
    ("cosmic", &["astrology", "sacred", "stars"]),
    ("astrology", &["cosmic", "stars", "timing"]),
    ("meditation", &["breath", "consciousness", "stillness"]),
    ("consciousness", &["meditation", "transcendence", "awareness"]),
    ("emotion", &["heart", "color", "mood"]),
    ("color", &["visual", "emotion", "light"]),
    ("session", &["orchestration", "timing"]),
    ("telemetry", &["sensor", "biometric", "metrics"]),
];

const TELOS_RELATIONS: &[(&str, &[&str])] = &[
    ("healing", &["relaxation", "coherence-building", "emotional-release"]),
    ("self-discovery", &["reflection", "insight", "astrological-insight"]),
    ("creativity", &["expression", "play", "visual-exploration"]),
    ("relaxation", &["stress-reduction", "breath-regulation", "healing"]),
    ("meditation-support", &["breath-regulation", "focus", "relaxation"]),
    ("transcendence", &["awe", "unity", "self-discovery"]),
    ("insight", &["reflection", "pattern-recognition"]),
    ("connection", &["unity", "empathy", "shared-experience"]),
];

/// Directed neighbor table. Relatedness is checked in both directions.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    neighbors: HashMap<String, BTreeSet<String>>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: &[(&str, &[&str])]) -> Self {
        let mut graph = Self::new();
        for (term, related) in table {
            for r in related.iter() {
                graph.relate(term, r);
            }
        }
        graph
    }

    /// Built-in essence label knowledge.
    pub fn labels() -> Self {
        Self::from_table(LABEL_RELATIONS)
    }

    /// Built-in telos knowledge.
    pub fn telos() -> Self {
        Self::from_table(TELOS_RELATIONS)
    }

    /// Add `related` to the neighbor list of `term`.
    pub fn relate(&mut self, term: &str, related: &str) {
        self.neighbors
            .entry(term.to_string())
            .or_default()
            .insert(related.to_string());
    }

    pub fn neighbors(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.neighbors.get(term)
    }

    /// `b` listed under `a`, `a` listed under `b`, or a shared neighbor.
    pub fn related(&self, a: &str, b: &str) -> bool {
        let na = self.neighbors.get(a);
        let nb = self.neighbors.get(b);
        if na.is_some_and(|n| n.contains(b)) || nb.is_some_and(|n| n.contains(a)) {
            return true;
        }
        match (na, nb) {
            (Some(na), Some(nb)) => !na.is_disjoint(nb),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
