//! Genre Taxonomy Fusion
//!
//! Merges votes from the four genre classifier taxonomies and the free-text
//! genre field into one primary genre, ranked secondary genres, and a
//! confidence margin.
//!
//! # Voting
//! Every source contributes (label, score) pairs; the aggregate per label is
//! the weighted sum over sources. Labels are matched by exact string
//! equality only, with no alias resolution across taxonomies: "hiphop" from
//! one classifier and "hip-hop" from another stay separate candidates.
//!
//! Ties on aggregate score are broken by the fixed source priority order
//! (classifier taxonomies before the free-text field), then lexicographic
//! label order, so fusion is fully deterministic.

use crate::config::TaxonomyWeights;
use std::collections::BTreeMap;
use tonefuse_common::features::{GenreResult, RawFeatureSet, TagValue};
use tracing::{debug, warn};

/// One genre vote source, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomySource {
    Tzanetakis,
    Dortmund,
    Rosamerica,
    Electronic,
    FreeText,
}

impl TaxonomySource {
    fn name(self) -> &'static str {
        match self {
            Self::Tzanetakis => "tzanetakis",
            Self::Dortmund => "dortmund",
            Self::Rosamerica => "rosamerica",
            Self::Electronic => "electronic",
            Self::FreeText => "freetext",
        }
    }

    /// Tie-break priority: lower wins.
    fn priority(self) -> u8 {
        match self {
            Self::Tzanetakis => 0,
            Self::Dortmund => 1,
            Self::Rosamerica => 2,
            Self::Electronic => 3,
            Self::FreeText => 4,
        }
    }
}

/// Accumulated state for one candidate label.
struct Candidate {
    aggregate: f64,
    best_priority: u8,
}

/// Genre Taxonomy Fusion
///
/// Deterministic and infallible: no votes yields an empty result, and a
/// genre field with an unexpected shape is skipped rather than failing the
/// track (shape policing of the canonical tag set is the normalizer's job).
#[derive(Debug, Clone)]
pub struct GenreFusion {
    weights: TaxonomyWeights,
}

impl GenreFusion {
    pub fn new(weights: TaxonomyWeights) -> Self {
        Self { weights }
    }

    fn weight_for(&self, source: TaxonomySource) -> f64 {
        match source {
            TaxonomySource::Tzanetakis => self.weights.tzanetakis,
            TaxonomySource::Dortmund => self.weights.dortmund,
            TaxonomySource::Rosamerica => self.weights.rosamerica,
            TaxonomySource::Electronic => self.weights.electronic,
            TaxonomySource::FreeText => self.weights.freetext,
        }
    }

    /// Fuse genre votes from all sources in one raw feature set.
    pub fn fuse(&self, raw: &RawFeatureSet) -> GenreResult {
        let sources: [(TaxonomySource, &Option<TagValue>); 5] = [
            (TaxonomySource::Tzanetakis, &raw.genre_tzanetakis),
            (TaxonomySource::Dortmund, &raw.genre_dortmund),
            (TaxonomySource::Rosamerica, &raw.genre_rosamerica),
            (TaxonomySource::Electronic, &raw.genre_electronic),
            (TaxonomySource::FreeText, &raw.genre),
        ];

        let mut tally: BTreeMap<String, Candidate> = BTreeMap::new();
        let mut add_vote = |label: &str, score: f64, source: TaxonomySource, weight: f64| {
            let label = label.trim();
            if label.is_empty() {
                warn!(source = source.name(), "skipping empty genre label");
                return;
            }
            let contribution = score.clamp(0.0, 1.0) * weight;
            let entry = tally.entry(label.to_string()).or_insert(Candidate {
                aggregate: 0.0,
                best_priority: source.priority(),
            });
            entry.aggregate += contribution;
            entry.best_priority = entry.best_priority.min(source.priority());
        };

        for (source, field) in sources {
            let weight = self.weight_for(source);
            match field {
                None => continue,
                Some(TagValue::Weights(votes)) => {
                    for (label, score) in votes {
                        if !score.is_finite() {
                            warn!(
                                source = source.name(),
                                label = %label,
                                "skipping non-finite genre vote"
                            );
                            continue;
                        }
                        add_vote(label, *score, source, weight);
                    }
                }
                Some(TagValue::Text(label)) if source == TaxonomySource::FreeText => {
                    // A bare genre string is a single full-strength vote.
                    add_vote(label, 1.0, source, weight);
                }
                Some(other) => {
                    warn!(
                        source = source.name(),
                        shape = other.shape_name(),
                        "skipping genre field with unexpected shape"
                    );
                }
            }
        }

        if tally.is_empty() {
            return GenreResult::empty();
        }

        let mut ranked: Vec<(String, Candidate)> = tally.into_iter().collect();
        ranked.sort_by(|(label_a, a), (label_b, b)| {
            b.aggregate
                .partial_cmp(&a.aggregate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.best_priority.cmp(&b.best_priority))
                .then(label_a.cmp(label_b))
        });

        let max = ranked[0].1.aggregate;
        let second = ranked.get(1).map(|(_, c)| c.aggregate).unwrap_or(0.0);
        let confidence = if max > 0.0 {
            ((max - second) / max).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let floor = self.weights.secondary_ratio * max;
        let secondary: Vec<String> = ranked[1..]
            .iter()
            .filter(|(_, c)| c.aggregate >= floor)
            .take(self.weights.secondary_limit)
            .map(|(label, _)| label.clone())
            .collect();

        debug!(
            primary = %ranked[0].0,
            aggregate = max,
            confidence,
            secondary = secondary.len(),
            "fused genre votes"
        );

        GenreResult {
            primary: Some(ranked[0].0.clone()),
            secondary,
            confidence,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn fusion() -> GenreFusion {
        GenreFusion::new(TaxonomyWeights::default())
    }

    fn raw() -> RawFeatureSet {
        RawFeatureSet::empty(Uuid::new_v4(), "standard-tags")
    }

    fn weights(pairs: &[(&str, f64)]) -> Option<TagValue> {
        let map: BTreeMap<String, f64> = pairs
            .iter()
            .map(|(label, score)| (label.to_string(), *score))
            .collect();
        Some(TagValue::Weights(map))
    }

    #[test]
    fn test_no_votes_yields_empty_result() {
        let result = fusion().fuse(&raw());
        assert_eq!(result, GenreResult::empty());
    }

    #[test]
    fn test_votes_aggregate_across_sources() {
        // rock = 1.0 * 0.9 + 1.0 * 0.7 = 1.6, no competitor
        let mut input = raw();
        input.genre_tzanetakis = weights(&[("rock", 0.9)]);
        input.genre_dortmund = weights(&[("rock", 0.7)]);
        let result = fusion().fuse(&input);
        assert_eq!(result.primary.as_deref(), Some("rock"));
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert!(result.secondary.is_empty());
    }

    #[test]
    fn test_free_text_is_discounted() {
        // Classifier says "jazz" at 0.7 (aggregate 0.7), free text says
        // "rock" (aggregate 0.8): free text wins but only barely.
        let mut input = raw();
        input.genre_rosamerica = weights(&[("jazz", 0.7)]);
        input.genre = Some(TagValue::Text("rock".to_string()));
        let result = fusion().fuse(&input);
        assert_eq!(result.primary.as_deref(), Some("rock"));
        let expected_confidence = (0.8 - 0.7) / 0.8;
        assert!((result.confidence - expected_confidence).abs() < 1e-9);
    }

    #[test]
    fn test_exact_string_matching_no_alias_merging() {
        let mut input = raw();
        input.genre_tzanetakis = weights(&[("hiphop", 0.6)]);
        input.genre_dortmund = weights(&[("hip-hop", 0.6)]);
        let result = fusion().fuse(&input);
        // Two distinct candidates, tie broken by priority (tzanetakis first).
        assert_eq!(result.primary.as_deref(), Some("hiphop"));
        assert_eq!(result.secondary, vec!["hip-hop".to_string()]);
        assert!((result.confidence - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_between_same_priority_breaks_lexicographically() {
        let mut input = raw();
        input.genre_tzanetakis = weights(&[("rock", 0.5), ("blues", 0.5)]);
        let result = fusion().fuse(&input);
        assert_eq!(result.primary.as_deref(), Some("blues"));
    }

    #[test]
    fn test_secondary_ranking_and_cap() {
        let mut input = raw();
        input.genre_tzanetakis = weights(&[
            ("rock", 1.0),
            ("metal", 0.9),
            ("punk", 0.8),
            ("blues", 0.7),
            ("jazz", 0.6),
            ("pop", 0.5),
            ("ska", 0.4),
        ]);
        let result = fusion().fuse(&input);
        assert_eq!(result.primary.as_deref(), Some("rock"));
        // All competitors clear the 0.3 ratio floor; cap keeps five.
        assert_eq!(
            result.secondary,
            vec!["metal", "punk", "blues", "jazz", "pop"]
        );
    }

    #[test]
    fn test_secondary_ratio_floor() {
        let mut input = raw();
        input.genre_tzanetakis = weights(&[("rock", 1.0), ("jazz", 0.31), ("ska", 0.29)]);
        let result = fusion().fuse(&input);
        assert_eq!(result.secondary, vec!["jazz"]);
    }

    #[test]
    fn test_wrong_shape_field_is_skipped() {
        let mut input = raw();
        input.genre_dortmund = Some(TagValue::Scalar(0.8));
        input.genre_tzanetakis = weights(&[("rock", 0.9)]);
        let result = fusion().fuse(&input);
        assert_eq!(result.primary.as_deref(), Some("rock"));
    }

    #[test]
    fn test_empty_labels_ignored() {
        let mut input = raw();
        input.genre = Some(TagValue::Text("   ".to_string()));
        let result = fusion().fuse(&input);
        assert_eq!(result, GenreResult::empty());
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let mut input = raw();
        input.genre_tzanetakis = weights(&[("rock", 0.5), ("metal", 0.5)]);
        input.genre_electronic = weights(&[("techno", 0.4)]);
        input.genre = Some(TagValue::Text("rock".to_string()));

        let first = fusion().fuse(&input);
        for _ in 0..10 {
            assert_eq!(fusion().fuse(&input), first);
        }
    }

    #[test]
    fn test_custom_weights_respected() {
        let mut config = TaxonomyWeights::default();
        config.freetext = 0.0;
        let fusion = GenreFusion::new(config);

        let mut input = raw();
        input.genre = Some(TagValue::Text("rock".to_string()));
        input.genre_dortmund = weights(&[("jazz", 0.2)]);
        let result = fusion.fuse(&input);
        // Free text carries zero weight; jazz wins despite the weak vote.
        assert_eq!(result.primary.as_deref(), Some("jazz"));
    }
}
