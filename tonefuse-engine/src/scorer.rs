//! Global Scorer
//!
//! Applies fixed linear formulas to a normalized feature set to produce six
//! holistic scores. Pure and total: an absent feature contributes 0.0 rather
//! than failing, and every output except valence is clamped into [0,1] so a
//! future formula tweak cannot leak an out-of-range score downstream.

use tonefuse_common::features::{GlobalScores, NormalizedFeatureSet};
use tracing::debug;

/// Global Scorer
///
/// Stateless; the scores are a pure function of the feature set and are
/// recomputed whenever it changes.
#[derive(Debug, Clone, Default)]
pub struct GlobalScorer;

impl GlobalScorer {
    pub fn new() -> Self {
        Self
    }

    /// Compute the six holistic scores.
    pub fn score(&self, features: &NormalizedFeatureSet) -> GlobalScores {
        let danceability = features.danceability.unwrap_or(0.0);
        let acoustic = features.acoustic.unwrap_or(0.0);
        let instrumental = features.instrumental.unwrap_or(0.0);
        let tonal = features.tonal.unwrap_or(0.0);
        let bpm_norm = features.bpm_norm.unwrap_or(0.0);
        let happy = features.mood_happy.unwrap_or(0.0);
        let aggressive = features.mood_aggressive.unwrap_or(0.0);
        let party = features.mood_party.unwrap_or(0.0);
        let relaxed = features.mood_relaxed.unwrap_or(0.0);

        let energy_score =
            (0.4 * danceability + 0.3 * (1.0 - acoustic) + 0.3 * bpm_norm).clamp(0.0, 1.0);

        let mood_valence =
            (((happy - aggressive) + (party - relaxed)) / 2.0).clamp(-1.0, 1.0);

        let dance_score = (danceability + 0.2 * bpm_norm).clamp(0.0, 1.0);

        let acousticness = (acoustic + 0.3 * (1.0 - instrumental)).clamp(0.0, 1.0);

        let complexity_score =
            (0.5 * tonal + 0.3 * (1.0 - instrumental) + 0.2 * bpm_norm).clamp(0.0, 1.0);

        let emotional_intensity = happy.max(aggressive).max(party).max(relaxed).clamp(0.0, 1.0);

        let scores = GlobalScores {
            energy_score,
            mood_valence,
            dance_score,
            acousticness,
            complexity_score,
            emotional_intensity,
        };
        debug!(
            track_id = %features.track_id,
            energy = scores.energy_score,
            valence = scores.mood_valence,
            "computed global scores"
        );
        scores
    }
}

// ============================================================================
// Tests
// ============================================================================
