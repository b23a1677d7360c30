//! Tag Normalizer
//!
//! Converts raw binary/opposing/continuous tags into bounded [0,1] scores
//! plus a confidence estimate. This is the entry point of the analysis
//! pipeline: everything downstream (scoring, tag synthesis) consumes its
//! output.
//!
//! # Normalization rules
//! - Binary tags map `true` to 1.0 and `false` to 0.0; an absent tag stays
//!   absent rather than becoming 0.0, and only substitutes 0.0 inside an
//!   opposition or formula.
//! - Opposing pairs ("happy"/"not happy") resolve to
//!   `max(positive - negative, 0)`, so the result is never negative.
//! - Tempo is clamped to the configured BPM range and scaled into [0,1];
//!   the raw BPM is retained unclamped alongside.
//! - Key and scale pass through when recognizable; the Camelot code is
//!   derived from the fixed 24-entry wheel when both are present.
//!
//! # Confidence
//! `0.5 * consensus + 0.3 * coverage + 0.2 * signal_strength` (weights
//! configurable). Consensus is the mean opposition gap over pairs with at
//! least one side present: a large gap between "happy" and "not happy" is a
//! confident signal, near-equal sides are ambiguous. Coverage is the
//! populated fraction of the canonical field set. Signal strength penalizes
//! low variance across the four unrelated mood axes, which indicates a weak
//! or washed-out analysis.
//!
//! Missing tags are a normal input state and never an error; only a present
//! field with the wrong shape (e.g. a textual tempo) is malformed.

use crate::config::NormalizationConfig;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tonefuse_common::features::{NormalizedFeatureSet, RawFeatureSet, TagValue};
use tonefuse_common::key::{CamelotCode, PitchClass, Scale};
use tracing::debug;

/// Canonical fields counted for coverage: the nine opposing features
/// (populated when at least one side is present) plus tempo, key, and scale.
pub const EXPECTED_FIELDS: usize = 12;

/// Normalization errors
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A present field has the wrong type or shape
    #[error("Malformed input: field '{field}' {detail}")]
    MalformedInput { field: &'static str, detail: String },
}

impl NormalizeError {
    fn malformed(field: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            detail: detail.into(),
        }
    }

    /// Stable error kind recorded in bundle statuses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed_input",
        }
    }
}

/// Resolve an opposing tag pair into one non-negative score.
pub fn resolve_opposition(positive: f64, negative: f64) -> f64 {
    (positive - negative).max(0.0)
}

/// Scale a BPM value into [0,1] over the given clamp range.
pub fn normalize_tempo(bpm: f64, min_bpm: f64, max_bpm: f64) -> f64 {
    (bpm.clamp(min_bpm, max_bpm) - min_bpm) / (max_bpm - min_bpm)
}

/// One resolved opposition: the feature score and the gap between sides.
struct Opposition {
    score: f64,
    gap: f64,
}

/// Tag Normalizer
///
/// Pure and total over its input: identical raw sets (and timestamp) yield
/// identical output. Never fails on missing data, only on present fields
/// with the wrong shape.
#[derive(Debug, Clone)]
pub struct TagNormalizer {
    config: NormalizationConfig,
}

impl TagNormalizer {
    pub fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    /// Normalize one raw feature set.
    ///
    /// The caller supplies the analysis timestamp so that repeated calls on
    /// identical input are byte-identical.
    ///
    /// # Errors
    /// Returns `NormalizeError::MalformedInput` when a present field has the
    /// wrong shape. Missing fields never fail.
    pub fn normalize(
        &self,
        raw: &RawFeatureSet,
        analyzed_at: DateTime<Utc>,
    ) -> Result<NormalizedFeatureSet, NormalizeError> {
        if raw.extra.len() > self.config.max_extension_tags {
            return Err(NormalizeError::malformed(
                "extra",
                format!(
                    "extension map holds {} tags, limit is {}",
                    raw.extra.len(),
                    self.config.max_extension_tags
                ),
            ));
        }

        // Opposing pairs. Each resolves independently; a pair with neither
        // side present stays absent.
        let happy = resolve_pair("mood_happy", &raw.mood_happy, "mood_not_happy", &raw.mood_not_happy)?;
        let sad = resolve_pair("mood_sad", &raw.mood_sad, "mood_not_sad", &raw.mood_not_sad)?;
        let aggressive = resolve_pair(
            "mood_aggressive",
            &raw.mood_aggressive,
            "mood_not_aggressive",
            &raw.mood_not_aggressive,
        )?;
        let party = resolve_pair("mood_party", &raw.mood_party, "mood_not_party", &raw.mood_not_party)?;
        let relaxed = resolve_pair(
            "mood_relaxed",
            &raw.mood_relaxed,
            "mood_not_relaxed",
            &raw.mood_not_relaxed,
        )?;
        let acoustic = resolve_pair("acoustic", &raw.acoustic, "not_acoustic", &raw.not_acoustic)?;
        let danceability = resolve_pair("danceable", &raw.danceable, "not_danceable", &raw.not_danceable)?;
        let instrumental = resolve_pair("instrumental", &raw.instrumental, "voice", &raw.voice)?;
        let tonal = resolve_pair("tonal", &raw.tonal, "atonal", &raw.atonal)?;

        let pairs = [
            &happy,
            &sad,
            &aggressive,
            &party,
            &relaxed,
            &acoustic,
            &danceability,
            &instrumental,
            &tonal,
        ];

        // Tempo: raw BPM retained unclamped, normalized over the clamp range.
        let bpm = read_bpm(&raw.tempo)?;
        let bpm_norm = bpm.map(|b| normalize_tempo(b, self.config.min_bpm, self.config.max_bpm));

        // Key/scale pass through only when recognizable.
        let key_text = read_text("key", &raw.key)?;
        let scale_text = read_text("scale", &raw.scale)?;
        let key = key_text.and_then(|s| {
            let parsed = PitchClass::parse(s);
            if parsed.is_none() {
                debug!(key = %s, "unrecognized key spelling, dropping");
            }
            parsed
        });
        let scale = scale_text.and_then(|s| {
            let parsed = Scale::parse(s);
            if parsed.is_none() {
                debug!(scale = %s, "unrecognized scale, dropping");
            }
            parsed
        });
        let camelot = match (key, scale) {
            (Some(k), Some(s)) => Some(CamelotCode::from_key(k, s)),
            _ => None,
        };

        // Coverage over the canonical field set.
        let populated = pairs.iter().filter(|p| p.is_some()).count()
            + usize::from(bpm.is_some())
            + usize::from(key_text.is_some())
            + usize::from(scale_text.is_some());

        if populated == 0 {
            debug!(track_id = %raw.track_id, "no populated fields, returning empty feature set");
            return Ok(NormalizedFeatureSet::empty(raw.track_id, analyzed_at));
        }

        let coverage = populated as f64 / EXPECTED_FIELDS as f64;

        // Consensus: mean opposition gap over pairs with at least one side.
        let gaps: Vec<f64> = pairs.iter().filter_map(|p| p.as_ref().map(|o| o.gap)).collect();
        let consensus = if gaps.is_empty() {
            0.0
        } else {
            gaps.iter().sum::<f64>() / gaps.len() as f64
        };

        // Signal strength: low variance across unrelated moods reads as a
        // weak, ambiguous signal. Absent moods substitute 0.0 here.
        let moods = [
            score_of(&happy),
            score_of(&aggressive),
            score_of(&party),
            score_of(&relaxed),
        ];
        let signal_strength = (1.0 - population_stdev(&moods)).clamp(0.0, 1.0);

        let confidence = (self.config.consensus_weight * consensus
            + self.config.coverage_weight * coverage
            + self.config.signal_weight * signal_strength)
            .clamp(0.0, 1.0);

        debug!(
            track_id = %raw.track_id,
            populated,
            consensus,
            coverage,
            signal_strength,
            confidence,
            "normalized feature set"
        );

        Ok(NormalizedFeatureSet {
            track_id: raw.track_id,
            bpm,
            bpm_norm,
            key,
            scale,
            camelot,
            danceability: danceability.map(|o| o.score),
            mood_happy: happy.map(|o| o.score),
            mood_sad: sad.map(|o| o.score),
            mood_aggressive: aggressive.map(|o| o.score),
            mood_party: party.map(|o| o.score),
            mood_relaxed: relaxed.map(|o| o.score),
            instrumental: instrumental.map(|o| o.score),
            acoustic: acoustic.map(|o| o.score),
            tonal: tonal.map(|o| o.score),
            confidence,
            analyzed_at,
        })
    }
}

/// Resolve one opposing pair. Absent when neither side is present; a missing
/// side substitutes 0.0 for the computation only.
fn resolve_pair(
    pos_field: &'static str,
    pos: &Option<TagValue>,
    neg_field: &'static str,
    neg: &Option<TagValue>,
) -> Result<Option<Opposition>, NormalizeError> {
    let p = read_side(pos_field, pos)?;
    let n = read_side(neg_field, neg)?;
    if p.is_none() && n.is_none() {
        return Ok(None);
    }
    let p = p.unwrap_or(0.0);
    let n = n.unwrap_or(0.0);
    Ok(Some(Opposition {
        score: resolve_opposition(p, n),
        gap: (p - n).abs(),
    }))
}

/// Read one opposition side: boolean flags map to 1.0/0.0, numeric
/// probabilities are clamped into [0,1]. Anything else is malformed.
fn read_side(field: &'static str, value: &Option<TagValue>) -> Result<Option<f64>, NormalizeError> {
    match value {
        None => Ok(None),
        Some(TagValue::Flag(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Some(TagValue::Scalar(x)) => {
            if !x.is_finite() {
                return Err(NormalizeError::malformed(field, "must be a finite number"));
            }
            let clamped = x.clamp(0.0, 1.0);
            if clamped != *x {
                debug!(field, value = *x, "clamped out-of-range tag probability");
            }
            Ok(Some(clamped))
        }
        Some(other) => Err(NormalizeError::malformed(
            field,
            format!("expects a boolean or number, got {}", other.shape_name()),
        )),
    }
}

fn read_bpm(value: &Option<TagValue>) -> Result<Option<f64>, NormalizeError> {
    match value {
        None => Ok(None),
        Some(TagValue::Scalar(x)) if x.is_finite() => Ok(Some(*x)),
        Some(TagValue::Scalar(_)) => {
            Err(NormalizeError::malformed("tempo", "must be a finite number"))
        }
        Some(other) => Err(NormalizeError::malformed(
            "tempo",
            format!("expects a number, got {}", other.shape_name()),
        )),
    }
}

fn read_text<'a>(
    field: &'static str,
    value: &'a Option<TagValue>,
) -> Result<Option<&'a str>, NormalizeError> {
    match value {
        None => Ok(None),
        Some(TagValue::Text(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(NormalizeError::malformed(
            field,
            format!("expects text, got {}", other.shape_name()),
        )),
    }
}

fn score_of(pair: &Option<Opposition>) -> f64 {
    pair.as_ref().map(|o| o.score).unwrap_or(0.0)
}

/// Population standard deviation.
fn population_stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn normalizer() -> TagNormalizer {
        TagNormalizer::new(NormalizationConfig::default())
    }

    fn raw() -> RawFeatureSet {
        RawFeatureSet::empty(Uuid::new_v4(), "spectral-analysis")
    }

    fn run(raw: &RawFeatureSet) -> NormalizedFeatureSet {
        normalizer().normalize(raw, Utc::now()).unwrap()
    }

    #[test]
    fn test_opposition_never_negative() {
        assert_eq!(resolve_opposition(0.8, 0.1), 0.7);
        assert_eq!(resolve_opposition(0.1, 0.8), 0.0);
        assert_eq!(resolve_opposition(0.0, 0.0), 0.0);
        assert_eq!(resolve_opposition(1.0, 1.0), 0.0);
        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            for n in [0.0, 0.25, 0.5, 0.75, 1.0] {
                assert!(resolve_opposition(p, n) >= 0.0);
            }
        }
    }

    #[test]
    fn test_binary_pair_resolves_to_full_score() {
        let mut input = raw();
        input.danceable = Some(TagValue::Flag(true));
        input.not_danceable = Some(TagValue::Flag(false));
        let features = run(&input);
        assert_eq!(features.danceability, Some(1.0));
    }

    #[test]
    fn test_missing_side_defaults_to_zero_in_opposition() {
        let mut input = raw();
        input.mood_happy = Some(TagValue::Scalar(0.8));
        let features = run(&input);
        // 0.8 - 0.0, not absent
        assert_eq!(features.mood_happy, Some(0.8));
    }

    #[test]
    fn test_absent_pair_stays_absent() {
        let mut input = raw();
        input.tempo = Some(TagValue::Scalar(120.0));
        let features = run(&input);
        assert_eq!(features.mood_happy, None);
        assert_eq!(features.danceability, None);
    }

    #[test]
    fn test_tempo_normalization_monotone_and_clamped() {
        assert_eq!(normalize_tempo(40.0, 60.0, 200.0), 0.0);
        assert_eq!(normalize_tempo(60.0, 60.0, 200.0), 0.0);
        assert_eq!(normalize_tempo(200.0, 60.0, 200.0), 1.0);
        assert_eq!(normalize_tempo(250.0, 60.0, 200.0), 1.0);
        assert!((normalize_tempo(130.0, 60.0, 200.0) - 0.5).abs() < 1e-9);

        let mut last = -1.0;
        for bpm in (60..=200).step_by(5) {
            let norm = normalize_tempo(bpm as f64, 60.0, 200.0);
            assert!(norm >= last, "tempo normalization must be non-decreasing");
            last = norm;
        }
    }

    #[test]
    fn test_raw_bpm_retained_unclamped() {
        let mut input = raw();
        input.tempo = Some(TagValue::Scalar(230.0));
        let features = run(&input);
        assert_eq!(features.bpm, Some(230.0));
        assert_eq!(features.bpm_norm, Some(1.0));
    }

    #[test]
    fn test_non_numeric_tempo_is_malformed() {
        let mut input = raw();
        input.tempo = Some(TagValue::Text("fast".to_string()));
        let err = normalizer().normalize(&input, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
        assert!(err.to_string().contains("tempo"));
    }

    #[test]
    fn test_nan_tempo_is_malformed() {
        let mut input = raw();
        input.tempo = Some(TagValue::Scalar(f64::NAN));
        assert!(normalizer().normalize(&input, Utc::now()).is_err());
    }

    #[test]
    fn test_wrong_shape_opposition_side_is_malformed() {
        let mut input = raw();
        input.mood_happy = Some(TagValue::Text("very".to_string()));
        assert!(normalizer().normalize(&input, Utc::now()).is_err());
    }

    #[test]
    fn test_key_and_camelot_derivation() {
        let mut input = raw();
        input.key = Some(TagValue::Text("A".to_string()));
        input.scale = Some(TagValue::Text("minor".to_string()));
        let features = run(&input);
        assert_eq!(features.key, Some(PitchClass::A));
        assert_eq!(features.scale, Some(Scale::Minor));
        assert_eq!(features.camelot.unwrap().to_string(), "8A");
    }

    #[test]
    fn test_unrecognized_key_yields_absent_camelot() {
        let mut input = raw();
        input.key = Some(TagValue::Text("H".to_string()));
        input.scale = Some(TagValue::Text("minor".to_string()));
        let features = run(&input);
        assert_eq!(features.key, None);
        assert_eq!(features.camelot, None);
        // Unrecognized but present: not an error.
        assert!(features.confidence > 0.0);
    }

    #[test]
    fn test_key_without_scale_yields_absent_camelot() {
        let mut input = raw();
        input.key = Some(TagValue::Text("F#".to_string()));
        let features = run(&input);
        assert_eq!(features.key, Some(PitchClass::FSharp));
        assert_eq!(features.camelot, None);
    }

    #[test]
    fn test_empty_input_zero_confidence_all_absent() {
        let input = raw();
        let features = run(&input);
        assert_eq!(features.confidence, 0.0);
        assert!(features.is_zero_information());
    }

    #[test]
    fn test_confidence_terms() {
        // One fully-confident opposition pair, nothing else populated:
        // consensus = |1.0 - 0.0| = 1.0 over one pair
        // coverage = 1/12
        // signal_strength = 1 - stdev(0,0,0,0) = 1.0 (danceable is not a mood)
        let mut input = raw();
        input.danceable = Some(TagValue::Flag(true));
        input.not_danceable = Some(TagValue::Flag(false));
        let features = run(&input);
        let expected = 0.5 * 1.0 + 0.3 * (1.0 / 12.0) + 0.2 * 1.0;
        assert!((features.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_penalizes_ambiguous_oppositions() {
        let mut ambiguous = raw();
        ambiguous.mood_happy = Some(TagValue::Scalar(0.5));
        ambiguous.mood_not_happy = Some(TagValue::Scalar(0.5));

        let mut confident = raw();
        confident.mood_happy = Some(TagValue::Scalar(1.0));
        confident.mood_not_happy = Some(TagValue::Scalar(0.0));

        let low = run(&ambiguous).confidence;
        let high = run(&confident).confidence;
        assert!(
            high > low,
            "clear opposition gap should score higher confidence ({} vs {})",
            high,
            low
        );
    }

    #[test]
    fn test_out_of_range_probability_clamped() {
        let mut input = raw();
        input.mood_happy = Some(TagValue::Scalar(1.3));
        let features = run(&input);
        assert_eq!(features.mood_happy, Some(1.0));
    }

    #[test]
    fn test_extension_map_bound_enforced() {
        let mut input = raw();
        for i in 0..40 {
            input
                .extra
                .insert(format!("vendor_tag_{}", i), TagValue::Flag(true));
        }
        let err = normalizer().normalize(&input, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("extension map"));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let mut input = raw();
        input.tempo = Some(TagValue::Scalar(174.0));
        input.mood_happy = Some(TagValue::Scalar(0.7));
        input.mood_not_happy = Some(TagValue::Scalar(0.2));
        input.key = Some(TagValue::Text("Eb".to_string()));
        input.scale = Some(TagValue::Text("major".to_string()));

        let at = Utc::now();
        let a = normalizer().normalize(&input, at).unwrap();
        let b = normalizer().normalize(&input, at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_features_bounded() {
        let mut input = raw();
        input.tempo = Some(TagValue::Scalar(500.0));
        input.mood_happy = Some(TagValue::Flag(true));
        input.mood_sad = Some(TagValue::Scalar(0.9));
        input.mood_not_sad = Some(TagValue::Scalar(0.1));
        input.acoustic = Some(TagValue::Scalar(1.5));
        input.tonal = Some(TagValue::Flag(true));
        input.atonal = Some(TagValue::Flag(true));
        let features = run(&input);

        for value in [
            features.bpm_norm,
            features.danceability,
            features.mood_happy,
            features.mood_sad,
            features.mood_aggressive,
            features.mood_party,
            features.mood_relaxed,
            features.instrumental,
            features.acoustic,
            features.tonal,
        ]
        .into_iter()
        .flatten()
        {
            assert!((0.0..=1.0).contains(&value), "feature out of range: {}", value);
        }
        assert!((0.0..=1.0).contains(&features.confidence));
    }
}
