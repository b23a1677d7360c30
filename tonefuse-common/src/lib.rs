//! # tonefuse Common Library
//!
//! Shared code for the tonefuse services including:
//! - Record types exchanged between the analysis engine and its collaborators
//! - Musical key, scale, and Camelot wheel types
//! - Common error types

pub mod error;
pub mod features;
pub mod key;

pub use error::{Error, Result};
pub use features::{
    BundleStatus, Contribution, GenreResult, GlobalScores, NormalizedFeatureSet, RawFeatureSet,
    ResultBundle, SyntheticTag, TagCategory, TagValue,
};
pub use key::{CamelotCode, PitchClass, Scale};
