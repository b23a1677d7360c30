//! Record types exchanged between the analysis engine and its collaborators
//!
//! The engine consumes one [`RawFeatureSet`] per track per analysis pass and
//! hands exactly one [`ResultBundle`] to the persistence collaborator. All
//! types here are serde-serializable; the bundle is the JSON transport
//! contract. Maps are `BTreeMap` so that serialized output is deterministic
//! for identical input.

use crate::key::{CamelotCode, PitchClass, Scale};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A raw tag value as produced by an upstream extractor.
///
/// Upstream sources disagree about shape: the same logical tag may arrive as
/// a boolean, a classifier probability, a free-text label, or a
/// label-to-weight map (one per genre taxonomy). Shape validation is the
/// engine's job, not the deserializer's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Boolean-like tag ("danceable": true)
    Flag(bool),
    /// Numeric tag (probability or BPM)
    Scalar(f64),
    /// Free-text tag ("genre": "rock")
    Text(String),
    /// Genre-label-to-weight map from one classifier taxonomy
    Weights(BTreeMap<String, f64>),
}

impl TagValue {
    /// Human-readable shape name for error reporting.
    pub fn shape_name(&self) -> &'static str {
        match self {
            TagValue::Flag(_) => "boolean",
            TagValue::Scalar(_) => "number",
            TagValue::Text(_) => "text",
            TagValue::Weights(_) => "weight map",
        }
    }
}

/// Raw per-track analysis tags from one upstream extraction pass.
///
/// Every known tag has an explicit optional field; tags the engine does not
/// know yet land in the bounded `extra` map so new upstream versions do not
/// break deserialization. Input-only: the engine never mutates a raw set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFeatureSet {
    /// Track identifier
    pub track_id: Uuid,
    /// Provenance label (e.g. "fingerprint-service", "spectral-analysis")
    pub source: String,

    /// Tempo in BPM
    pub tempo: Option<TagValue>,
    /// Musical key (pitch class spelling, e.g. "C#", "Bb")
    pub key: Option<TagValue>,
    /// Musical scale ("major" / "minor")
    pub scale: Option<TagValue>,

    // Opposing mood pairs
    pub mood_happy: Option<TagValue>,
    pub mood_not_happy: Option<TagValue>,
    pub mood_sad: Option<TagValue>,
    pub mood_not_sad: Option<TagValue>,
    pub mood_aggressive: Option<TagValue>,
    pub mood_not_aggressive: Option<TagValue>,
    pub mood_party: Option<TagValue>,
    pub mood_not_party: Option<TagValue>,
    pub mood_relaxed: Option<TagValue>,
    pub mood_not_relaxed: Option<TagValue>,

    // Other opposing pairs
    pub acoustic: Option<TagValue>,
    pub not_acoustic: Option<TagValue>,
    pub danceable: Option<TagValue>,
    pub not_danceable: Option<TagValue>,
    pub instrumental: Option<TagValue>,
    pub voice: Option<TagValue>,
    pub tonal: Option<TagValue>,
    pub atonal: Option<TagValue>,

    // Genre classifier taxonomies (label -> weight maps)
    pub genre_tzanetakis: Option<TagValue>,
    pub genre_dortmund: Option<TagValue>,
    pub genre_rosamerica: Option<TagValue>,
    pub genre_electronic: Option<TagValue>,
    /// Free-text genre field from standard tags
    pub genre: Option<TagValue>,

    /// Unknown tags, carried for forward compatibility (bounded)
    pub extra: BTreeMap<String, TagValue>,
}

impl Default for RawFeatureSet {
    fn default() -> Self {
        Self::empty(Uuid::nil(), "unknown")
    }
}

impl RawFeatureSet {
    /// Create a raw set with every tag absent.
    pub fn empty(track_id: Uuid, source: impl Into<String>) -> Self {
        Self {
            track_id,
            source: source.into(),
            tempo: None,
            key: None,
            scale: None,
            mood_happy: None,
            mood_not_happy: None,
            mood_sad: None,
            mood_not_sad: None,
            mood_aggressive: None,
            mood_not_aggressive: None,
            mood_party: None,
            mood_not_party: None,
            mood_relaxed: None,
            mood_not_relaxed: None,
            acoustic: None,
            not_acoustic: None,
            danceable: None,
            not_danceable: None,
            instrumental: None,
            voice: None,
            tonal: None,
            atonal: None,
            genre_tzanetakis: None,
            genre_dortmund: None,
            genre_rosamerica: None,
            genre_electronic: None,
            genre: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Normalized per-track features, every continuous value bounded to [0,1].
///
/// Absent features stay `None`; a missing tag is a normal input state and is
/// distinct from a measured 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatureSet {
    /// Track identifier
    pub track_id: Uuid,

    /// Raw BPM as reported upstream, unclamped
    pub bpm: Option<f64>,
    /// BPM scaled into [0,1] over the configured clamp range
    pub bpm_norm: Option<f64>,

    /// Detected key, if recognizable
    pub key: Option<PitchClass>,
    /// Detected scale, if recognizable
    pub scale: Option<Scale>,
    /// Camelot wheel position, present when both key and scale are
    pub camelot: Option<CamelotCode>,

    /// Opposition-resolved continuous features, each in [0,1]
    pub danceability: Option<f64>,
    pub mood_happy: Option<f64>,
    pub mood_sad: Option<f64>,
    pub mood_aggressive: Option<f64>,
    pub mood_party: Option<f64>,
    pub mood_relaxed: Option<f64>,
    pub instrumental: Option<f64>,
    pub acoustic: Option<f64>,
    pub tonal: Option<f64>,

    /// Overall confidence in this feature set, in [0,1]
    pub confidence: f64,
    /// When this analysis pass ran
    pub analyzed_at: DateTime<Utc>,
}

impl NormalizedFeatureSet {
    /// Feature set with everything absent and zero confidence.
    pub fn empty(track_id: Uuid, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            track_id,
            bpm: None,
            bpm_norm: None,
            key: None,
            scale: None,
            camelot: None,
            danceability: None,
            mood_happy: None,
            mood_sad: None,
            mood_aggressive: None,
            mood_party: None,
            mood_relaxed: None,
            instrumental: None,
            acoustic: None,
            tonal: None,
            confidence: 0.0,
            analyzed_at,
        }
    }

    /// True when no field carried any information at all.
    ///
    /// Zero-information sets must not produce descriptors downstream.
    pub fn is_zero_information(&self) -> bool {
        self.bpm.is_none()
            && self.key.is_none()
            && self.scale.is_none()
            && self.danceability.is_none()
            && self.mood_happy.is_none()
            && self.mood_sad.is_none()
            && self.mood_aggressive.is_none()
            && self.mood_party.is_none()
            && self.mood_relaxed.is_none()
            && self.instrumental.is_none()
            && self.acoustic.is_none()
            && self.tonal.is_none()
    }
}

/// Fused genre classification for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreResult {
    /// Winning genre label, absent when no source voted
    pub primary: Option<String>,
    /// Runner-up labels, strongest first, capped
    pub secondary: Vec<String>,
    /// Margin between the top two aggregates, in [0,1]
    pub confidence: f64,
}

impl GenreResult {
    /// Result for a track no source voted on.
    pub fn empty() -> Self {
        Self {
            primary: None,
            secondary: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Six holistic scores derived from a normalized feature set.
///
/// All values are in [0,1] except `mood_valence`, which spans [-1,1]
/// (negative = dark, positive = bright). Pure function of the feature set;
/// recomputed whenever the features change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalScores {
    pub energy_score: f64,
    pub mood_valence: f64,
    pub dance_score: f64,
    pub acousticness: f64,
    pub complexity_score: f64,
    pub emotional_intensity: f64,
}

/// Category of a synthetic descriptor tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Mood,
    Energy,
    Atmosphere,
    Usage,
}

/// One feature's contribution to a synthetic tag score.
///
/// The emitted score is reconstructable by hand as the sum of
/// `value * weight` over the explanation rows; fixed offsets appear as a
/// `"constant"` row with value 1.0, and trigger-only inputs carry weight 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub value: f64,
    pub weight: f64,
}

impl Contribution {
    pub fn new(feature: impl Into<String>, value: f64, weight: f64) -> Self {
        Self {
            feature: feature.into(),
            value,
            weight,
        }
    }
}

/// Human-facing descriptor derived from normalized features and global
/// scores. Regenerated fresh on every run, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTag {
    pub name: String,
    pub category: TagCategory,
    /// Tag strength in [0,1]
    pub score: f64,
    /// Contributing features, sufficient to reconstruct the score
    pub explanation: Vec<Contribution>,
}

/// Per-item outcome recorded in a result bundle: `"ok"` on the wire, or an
/// `error` object carrying the kind and message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    /// Processing succeeded
    Ok,
    /// Processing failed for this item; the batch continues
    Error { kind: String, message: String },
}

impl BundleStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, BundleStatus::Ok)
    }
}

/// Complete per-track output handed to the persistence collaborator.
///
/// The engine owns the bundle until handoff; afterwards ownership transfers
/// and the engine retains no reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Track identifier
    pub track_id: Uuid,
    /// Provenance label passed through from the raw set
    pub source: String,
    /// Per-item outcome
    pub status: BundleStatus,
    /// Normalized features (absent when processing failed)
    pub features: Option<NormalizedFeatureSet>,
    /// Fused genre classification (absent when processing failed)
    pub genres: Option<GenreResult>,
    /// Holistic scores (absent when processing failed)
    pub scores: Option<GlobalScores>,
    /// Synthetic descriptor tags, possibly empty
    pub synthetic_tags: Vec<SyntheticTag>,
}

impl ResultBundle {
    /// Serialize to the JSON transport representation.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::Error::Serialization(format!("Failed to serialize bundle: {}", e)))
    }

    /// Parse from the JSON transport representation.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::Serialization(format!("Failed to parse bundle: {}", e)))
    }
}
