//! Synthetic Tag Generator
//!
//! Applies threshold rules over normalized features and global scores to
//! emit human-facing descriptive tags ("dark", "workout", "dancefloor").
//! These descriptors are derived, never directly observed in the audio, and
//! are regenerated fresh on every run.
//!
//! Every emitted tag carries an explanation: the contributing
//! (feature, value, weight) rows whose `value * weight` sum reconstructs the
//! score by hand. Formulas with a constant term include a `"constant"` row
//! with value 1.0; inputs that only gate the trigger appear with weight 0.0.
//!
//! All trigger constants come from [`TagThresholds`] so they can be tuned
//! and tested independently of the rule logic.

use crate::config::TagThresholds;
use tonefuse_common::features::{
    Contribution, GlobalScores, NormalizedFeatureSet, SyntheticTag, TagCategory,
};
use tracing::debug;

/// Synthetic Tag Generator
///
/// Pure: identical features, scores, and thresholds always emit the same
/// tags in the same fixed rule order.
#[derive(Debug, Clone)]
pub struct SyntheticTagGenerator {
    thresholds: TagThresholds,
}

impl SyntheticTagGenerator {
    pub fn new(thresholds: TagThresholds) -> Self {
        Self { thresholds }
    }

    /// Generate descriptor tags for one track.
    pub fn generate(
        &self,
        features: &NormalizedFeatureSet,
        scores: &GlobalScores,
    ) -> Vec<SyntheticTag> {
        // A zero-information track must not pick up descriptors from the
        // low-threshold rules firing on defaulted zeros.
        if features.is_zero_information() {
            debug!(track_id = %features.track_id, "zero-information input, no tags");
            return Vec::new();
        }

        let t = &self.thresholds;
        let valence = scores.mood_valence;
        let energy = scores.energy_score;
        let dance = scores.dance_score;
        let acousticness = scores.acousticness;
        let mood_aggressive = features.mood_aggressive.unwrap_or(0.0);
        let mood_party = features.mood_party.unwrap_or(0.0);

        let mut tags = Vec::new();
        let mut emit =
            |name: &str, category: TagCategory, score: f64, explanation: Vec<Contribution>| {
                tags.push(SyntheticTag {
                    name: name.to_string(),
                    category,
                    score: score.clamp(0.0, 1.0),
                    explanation,
                });
            };

        // Mood
        if valence < 0.0 {
            emit(
                "dark",
                TagCategory::Mood,
                (-valence).max(0.0),
                vec![Contribution::new("mood_valence", valence, -1.0)],
            );
        }
        if valence > 0.0 {
            emit(
                "bright",
                TagCategory::Mood,
                valence.max(0.0),
                vec![Contribution::new("mood_valence", valence, 1.0)],
            );
        }
        if valence < 0.0 {
            emit(
                "melancholic",
                TagCategory::Mood,
                (1.0 - valence) / 2.0,
                vec![
                    Contribution::new("constant", 1.0, 0.5),
                    Contribution::new("mood_valence", valence, -0.5),
                ],
            );
        }
        if mood_aggressive > t.aggressive {
            emit(
                "aggressive",
                TagCategory::Mood,
                mood_aggressive,
                vec![Contribution::new("mood_aggressive", mood_aggressive, 1.0)],
            );
        }
        if valence > t.uplifting {
            emit(
                "uplifting",
                TagCategory::Mood,
                valence,
                vec![Contribution::new("mood_valence", valence, 1.0)],
            );
        }

        // Energy
        if energy > t.energetic {
            emit(
                "energetic",
                TagCategory::Energy,
                energy,
                vec![Contribution::new("energy_score", energy, 1.0)],
            );
        }
        if energy < t.chill {
            emit(
                "chill",
                TagCategory::Energy,
                1.0 - energy,
                vec![
                    Contribution::new("constant", 1.0, 1.0),
                    Contribution::new("energy_score", energy, -1.0),
                ],
            );
        }

        // Atmosphere
        if dance > t.dancefloor {
            emit(
                "dancefloor",
                TagCategory::Atmosphere,
                dance,
                vec![Contribution::new("dance_score", dance, 1.0)],
            );
        }
        if acousticness > t.ambient {
            emit(
                "ambient",
                TagCategory::Atmosphere,
                acousticness,
                vec![Contribution::new("acousticness", acousticness, 1.0)],
            );
        }
        if energy > t.epic_energy && valence > t.epic_valence {
            emit(
                "epic",
                TagCategory::Atmosphere,
                energy,
                vec![
                    Contribution::new("energy_score", energy, 1.0),
                    Contribution::new("mood_valence", valence, 0.0),
                ],
            );
        }

        // Usage
        if dance > t.workout_dance && energy > t.workout_energy {
            emit(
                "workout",
                TagCategory::Usage,
                dance,
                vec![
                    Contribution::new("dance_score", dance, 1.0),
                    Contribution::new("energy_score", energy, 0.0),
                ],
            );
        }
        if dance < t.focus {
            emit(
                "focus",
                TagCategory::Usage,
                1.0 - dance,
                vec![
                    Contribution::new("constant", 1.0, 1.0),
                    Contribution::new("dance_score", dance, -1.0),
                ],
            );
        }
        if acousticness > t.background_acoustic && energy < t.background_energy {
            emit(
                "background",
                TagCategory::Usage,
                acousticness,
                vec![
                    Contribution::new("acousticness", acousticness, 1.0),
                    Contribution::new("energy_score", energy, 0.0),
                ],
            );
        }
        if mood_party > t.party {
            emit(
                "party",
                TagCategory::Usage,
                mood_party,
                vec![Contribution::new("mood_party", mood_party, 1.0)],
            );
        }

        debug!(track_id = %features.track_id, count = tags.len(), "generated synthetic tags");
        tags
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn generator() -> SyntheticTagGenerator {
        SyntheticTagGenerator::new(TagThresholds::default())
    }

    fn features() -> NormalizedFeatureSet {
        // Carries a tempo so the set is not zero-information.
        let mut f = NormalizedFeatureSet::empty(Uuid::new_v4(), Utc::now());
        f.bpm = Some(120.0);
        f.bpm_norm = Some(0.43);
        f
    }

    fn scores() -> GlobalScores {
        GlobalScores {
            energy_score: 0.5,
            mood_valence: 0.0,
            dance_score: 0.5,
            acousticness: 0.0,
            complexity_score: 0.0,
            emotional_intensity: 0.0,
        }
    }

    fn names(tags: &[SyntheticTag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    fn find<'a>(tags: &'a [SyntheticTag], name: &str) -> &'a SyntheticTag {
        tags.iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("tag '{}' not emitted", name))
    }

    #[test]
    fn test_zero_information_emits_nothing() {
        let empty = NormalizedFeatureSet::empty(Uuid::new_v4(), Utc::now());
        let tags = generator().generate(&empty, &scores());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_negative_valence_emits_dark_and_melancholic() {
        let mut s = scores();
        s.mood_valence = -0.4;
        let tags = generator().generate(&features(), &s);
        let names = names(&tags);
        assert!(names.contains(&"dark"));
        assert!(names.contains(&"melancholic"));
        assert!(!names.contains(&"bright"));

        let dark = find(&tags, "dark");
        assert!((dark.score - 0.4).abs() < 1e-9);
        let melancholic = find(&tags, "melancholic");
        assert!((melancholic.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_uplifting_energetic_epic_scenario() {
        let mut s = scores();
        s.mood_valence = 0.6;
        s.energy_score = 0.75;
        let tags = generator().generate(&features(), &s);
        let names = names(&tags);
        assert!(names.contains(&"uplifting"));
        assert!(names.contains(&"energetic"));
        assert!(names.contains(&"epic"));

        assert!((find(&tags, "uplifting").score - 0.6).abs() < 1e-9);
        assert!((find(&tags, "energetic").score - 0.75).abs() < 1e-9);
        assert!((find(&tags, "epic").score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_epic_requires_both_conditions() {
        // High energy, neutral valence: no epic.
        let mut s = scores();
        s.energy_score = 0.8;
        s.mood_valence = 0.1;
        let tags = generator().generate(&features(), &s);
        assert!(!names(&tags).contains(&"epic"));
        assert!(names(&tags).contains(&"energetic"));
    }

    #[test]
    fn test_thresholds_are_strict_inequalities() {
        let mut s = scores();
        s.energy_score = 0.6; // exactly at the energetic threshold
        let tags = generator().generate(&features(), &s);
        assert!(!names(&tags).contains(&"energetic"));
    }

    #[test]
    fn test_chill_and_focus_on_low_scores() {
        let mut s = scores();
        s.energy_score = 0.2;
        s.dance_score = 0.1;
        let tags = generator().generate(&features(), &s);
        assert!((find(&tags, "chill").score - 0.8).abs() < 1e-9);
        assert!((find(&tags, "focus").score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_party_tag_from_mood_feature() {
        let mut f = features();
        f.mood_party = Some(0.85);
        let tags = generator().generate(&f, &scores());
        assert!((find(&tags, "party").score - 0.85).abs() < 1e-9);
        assert_eq!(find(&tags, "party").category, TagCategory::Usage);
    }

    #[test]
    fn test_explanations_reconstruct_scores() {
        let mut f = features();
        f.mood_party = Some(0.85);
        f.mood_aggressive = Some(0.7);
        let mut s = scores();
        s.mood_valence = -0.3;
        s.energy_score = 0.2;
        s.dance_score = 0.1;
        s.acousticness = 0.65;

        for tag in generator().generate(&f, &s) {
            let reconstructed: f64 = tag
                .explanation
                .iter()
                .map(|c| c.value * c.weight)
                .sum();
            assert!(
                (reconstructed.clamp(0.0, 1.0) - tag.score).abs() < 1e-9,
                "tag '{}' score {} not reconstructable from explanation ({})",
                tag.name,
                tag.score,
                reconstructed
            );
            assert!((0.0..=1.0).contains(&tag.score));
            assert!(!tag.explanation.is_empty());
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let mut thresholds = TagThresholds::default();
        thresholds.energetic = 0.3;
        let generator = SyntheticTagGenerator::new(thresholds);

        let mut s = scores();
        s.energy_score = 0.4;
        let tags = generator.generate(&features(), &s);
        assert!(names(&tags).contains(&"energetic"));
    }

    #[test]
    fn test_tags_regenerated_identically() {
        let f = features();
        let mut s = scores();
        s.mood_valence = -0.2;
        s.acousticness = 0.7;
        let first = generator().generate(&f, &s);
        let second = generator().generate(&f, &s);
        assert_eq!(first, second);
    }
}
