//! History filtering and windowed field metrics.

use chrono::{DateTime, Utc};
use resonance_core::SemanticEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

const DOMINANT_LABELS: usize = 5;

/// History query. Every set field narrows the result (logical AND);
/// `limit` is applied last and keeps the most recent matches.
#[derive(Clone, Debug, Default)]
pub struct HistoryFilter {
    pub types: Option<BTreeSet<String>>,
    /// Matches events carrying at least one of these labels.
    pub labels: Option<BTreeSet<String>>,
    pub sources: Option<BTreeSet<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, event: &SemanticEvent) -> bool {
        if let Some(types) = &self.types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(labels) = &self.labels {
            if labels.is_disjoint(&event.labels) {
                return false;
            }
        }
        if let Some(sources) = &self.sources {
            if !sources.contains(&event.source_module) {
                return false;
            }
        }
        if self.start.is_some_and(|start| event.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        true
    }

    /// Filter `events` (oldest first) and apply the tail limit.
    pub fn apply<'a, I>(&self, events: I) -> Vec<SemanticEvent>
    where
        I: IntoIterator<Item = &'a SemanticEvent>,
    {
        let mut out: Vec<SemanticEvent> = events.into_iter().filter(|e| self.matches(e)).cloned().collect();
        if let Some(limit) = self.limit {
            if out.len() > limit {
                let excess = out.len() - limit;
                out.drain(..excess);
            }
        }
        out
    }
}

/// Aggregate view over the trailing window.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResonanceField {
    /// Mean resonance of windowed events, 0 when the window is empty.
    pub global_coherence: f64,
    /// Distinct sources, first-seen order.
    pub active_modules: Vec<String>,
    /// Events per second over the window length.
    pub event_density: f64,
    /// Top labels by frequency, ties broken by first appearance.
    pub dominant_labels: Vec<String>,
}

impl ResonanceField {
    /// Compute the field from events already restricted to the window.
    pub fn compute<'a, I>(windowed: I, window_secs: u64) -> Self
    where
        I: IntoIterator<Item = &'a SemanticEvent>,
    {
        let mut count = 0usize;
        let mut total = 0.0;
        let mut active_modules: Vec<String> = Vec::new();
        // label -> (frequency, first-seen rank)
        let mut label_counts: HashMap<&str, (usize, usize)> = HashMap::new();

        for event in windowed {
            count += 1;
            total += event.resonance_signature;
            if !active_modules.iter().any(|m| m == &event.source_module) {
                active_modules.push(event.source_module.clone());
            }
            for label in &event.labels {
                let rank = label_counts.len();
                label_counts.entry(label.as_str()).or_insert((0, rank)).0 += 1;
            }
        }

        let mut ranked: Vec<(&str, usize, usize)> =
            label_counts.into_iter().map(|(l, (n, first))| (l, n, first)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let window = window_secs.max(1) as f64;
        Self {
            global_coherence: if count == 0 { 0.0 } else { total / count as f64 },
            active_modules,
            event_density: count as f64 / window,
            dominant_labels: ranked
                .into_iter()
                .take(DOMINANT_LABELS)
                .map(|(l, _, _)| l.to_string())
                .collect(),
        }
    }
}
