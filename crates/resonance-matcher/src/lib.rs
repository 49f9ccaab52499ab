//! Resonance Matcher: label/telos relatedness, similarity scoring, dissonance detection
//!
//! The knowledge tables are static. Modules are discovered by comparing a
//! query set against a manifest's essence labels or telos alignment.

pub mod knowledge;
pub mod matcher;

pub use knowledge::RelationGraph;
pub use matcher::{DissonanceReport, ModuleMatch, SemanticMatcher};
