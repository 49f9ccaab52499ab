//! Similarity scoring and manifest consistency checks.

use crate::knowledge::RelationGraph;
use resonance_core::{MatcherConfig, ModuleId, ModuleManifest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const EXACT_SCORE: f64 = 10.0;
const RELATED_SCORE: f64 = 5.0;
const MAX_SIMILARITY: f64 = 100.0;

/// Label rules: a manifest carrying the label must declare a capability
/// whose identifier contains one of the keywords.
const LABEL_CAPABILITY_RULES: &[(&str, &[&str])] = &[
    ("visual", &["render", "visual"]),
    ("biometric", &["biometric", "sensor"]),
    ("audio", &["audio", "sound"]),
];

/// A module scored against a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleMatch {
    pub id: ModuleId,
    pub score: f64,
}

/// Result of checking a manifest for internal inconsistencies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DissonanceReport {
    pub is_dissonant: bool,
    pub issues: Vec<String>,
}

pub struct SemanticMatcher {
    labels: RelationGraph,
    telos: RelationGraph,
    integrity_threshold: u8,
}

impl Default for SemanticMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl SemanticMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self::with_graphs(RelationGraph::labels(), RelationGraph::telos(), config)
    }

    pub fn with_graphs(labels: RelationGraph, telos: RelationGraph, config: &MatcherConfig) -> Self {
        Self {
            labels,
            telos,
            integrity_threshold: config.integrity_threshold,
        }
    }

    pub fn integrity_threshold(&self) -> u8 {
        self.integrity_threshold
    }

    pub fn labels_related(&self, a: &str, b: &str) -> bool {
        self.labels.related(a, b)
    }

    pub fn telos_related(&self, a: &str, b: &str) -> bool {
        self.telos.related(a, b)
    }

    /// Essence label similarity in [0, 100].
    pub fn label_similarity<A, B>(&self, a: A, b: B) -> f64
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        similarity(&self.labels, &to_set(a), &to_set(b))
    }

    /// Telos similarity in [0, 100].
    pub fn telos_similarity<A, B>(&self, a: A, b: B) -> f64
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        similarity(&self.telos, &to_set(a), &to_set(b))
    }

    /// Score every manifest's essence labels against `required`; keep
    /// `score >= min_similarity`, highest first.
    pub fn find_modules_by_label<'a, M, Q>(&self, manifests: M, required: Q, min_similarity: f64) -> Vec<ModuleMatch>
    where
        M: IntoIterator<Item = &'a ModuleManifest>,
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        let query = to_set(required);
        rank(manifests, min_similarity, |m| similarity(&self.labels, &m.essence_labels, &query))
    }

    /// Same as [`find_modules_by_label`](Self::find_modules_by_label) over telos alignment.
    pub fn find_modules_by_telos<'a, M, Q>(&self, manifests: M, telos: Q, min_similarity: f64) -> Vec<ModuleMatch>
    where
        M: IntoIterator<Item = &'a ModuleManifest>,
        Q: IntoIterator,
        Q::Item: AsRef<str>,
    {
        let query = to_set(telos);
        rank(manifests, min_similarity, |m| similarity(&self.telos, &m.telos_alignment, &query))
    }

    /// Flag inconsistencies. Never rejects; the caller decides.
    pub fn detect_dissonance(&self, manifest: &ModuleManifest) -> DissonanceReport {
        let mut issues = Vec::new();

        if manifest.integrity_score < self.integrity_threshold {
            issues.push(format!(
                "integrity score {} below threshold {}",
                manifest.integrity_score, self.integrity_threshold
            ));
        }
        if manifest.essence_labels.is_empty() {
            issues.push("no essence labels declared".to_string());
        }
        if manifest.capabilities.is_empty() {
            issues.push("no capabilities declared".to_string());
        }
        if manifest.telos_alignment.is_empty() {
            issues.push("no telos alignment declared".to_string());
        }

        for (label, keywords) in LABEL_CAPABILITY_RULES {
            if !manifest.essence_labels.contains(*label) {
                continue;
            }
            let backed = manifest
                .capabilities
                .iter()
                .any(|cap| keywords.iter().any(|k| cap.contains(k)));
            if !backed {
                issues.push(format!(
                    "'{}' label without a capability mentioning {}",
                    label,
                    keywords.join(" or ")
                ));
            }
        }

        if !issues.is_empty() {
            tracing::debug!("Manifest {} dissonant: {:?}", manifest.id, issues);
        }

        DissonanceReport {
            is_dissonant: !issues.is_empty(),
            issues,
        }
    }
}

fn to_set<I>(items: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}

/// Pairwise score divided by |A|·|B|, scaled ×10.
///
/// Not normalized against the best achievable score: two identical sets of
/// size n score 100/n. Callers depend on this scale.
fn similarity(graph: &RelationGraph, a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for x in a {
        for y in b {
            total += if x == y {
                EXACT_SCORE
            } else if graph.related(x, y) {
                RELATED_SCORE
            } else {
                0.0
            };
        }
    }
    let pairs = (a.len() * b.len()) as f64;
    (total / pairs * 10.0).min(MAX_SIMILARITY)
}

fn rank<'a, M, F>(manifests: M, min_similarity: f64, score: F) -> Vec<ModuleMatch>
where
    M: IntoIterator<Item = &'a ModuleManifest>,
    F: Fn(&ModuleManifest) -> f64,
{
    let mut matches: Vec<ModuleMatch> = manifests
        .into_iter()
        .map(|m| ModuleMatch { id: m.id.clone(), score: score(m) })
        .filter(|m| m.score >= min_similarity)
        .collect();
    // stable: equal scores keep input order
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}
