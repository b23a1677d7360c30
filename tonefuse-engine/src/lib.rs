//! # tonefuse Analysis Engine
//!
//! Turns heterogeneous, partially-contradictory raw audio-analysis tags into
//! a clean, bounded, explainable feature representation per track:
//! - **TagNormalizer** — binary/opposing/continuous tags into [0,1] scores
//!   plus a confidence estimate
//! - **GenreFusion** — weighted voting across genre classifier taxonomies
//! - **GlobalScorer** — six holistic scores from fixed linear formulas
//! - **SyntheticTagGenerator** — threshold-driven descriptor tags with
//!   explanations
//! - **Pipeline** — sequences the components per track or batch and assembles
//!   the result bundle for the persistence collaborator
//!
//! The engine performs no I/O and holds no shared mutable state; every call
//! is a pure function of its explicit arguments. Weights and thresholds are
//! injected through [`config::EngineConfig`] and validated once at pipeline
//! construction.

pub mod config;
pub mod genre;
pub mod normalizer;
pub mod pipeline;
pub mod scorer;
pub mod tagger;

pub use config::{ConfigError, EngineConfig, NormalizationConfig, TagThresholds, TaxonomyWeights};
pub use genre::GenreFusion;
pub use normalizer::{NormalizeError, TagNormalizer};
pub use pipeline::Pipeline;
pub use scorer::GlobalScorer;
pub use tagger::SyntheticTagGenerator;
