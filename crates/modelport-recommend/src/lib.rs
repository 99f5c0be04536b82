//! Hardware-aware model recommendations for ModelPort
//!
//! Scores every catalog entry against a hardware snapshot and ranks the
//! results. Scores are recomputed from the given snapshot on every call and
//! never cached across hardware changes.

pub mod engine;
pub mod requirements;

pub use engine::{ModelRecommendation, RecommendationEngine};
pub use requirements::SystemRequirements;
