//! Analysis Pipeline
//!
//! Sequences the engine components per track and assembles one result bundle:
//! normalization, then genre fusion and global scoring over the normalized
//! features, then synthetic tag generation. Batches fan items out across a
//! bounded worker pool; items are independent, share no state, and may
//! complete out of input order (each bundle carries its track identifier).
//!
//! # Error handling
//! - Per-item error isolation: a malformed item is captured into its own
//!   bundle status and never aborts the batch.
//! - Configuration is validated once at construction; an invalid table is
//!   fatal and nothing is processed.
//! - No retries: the computation is deterministic, so retrying identical
//!   input cannot change the outcome.
//!
//! # Cancellation
//! Cooperative and batch-granular: once the supplied token fires, pending
//! items are dropped from the result. In-flight items finish, since a single
//! item is pure arithmetic.
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(EngineConfig::default())?;
//! let bundles = pipeline.process_batch(raw_sets).await;
//! for bundle in &bundles {
//!     store.persist(bundle.to_json()?).await?;
//! }
//! ```

use crate::config::{ConfigError, EngineConfig};
use crate::genre::GenreFusion;
use crate::normalizer::TagNormalizer;
use crate::scorer::GlobalScorer;
use crate::tagger::SyntheticTagGenerator;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tonefuse_common::features::{BundleStatus, RawFeatureSet, ResultBundle};
use tracing::{debug, error, info, warn};

/// Analysis pipeline over validated configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: TagNormalizer,
    genres: GenreFusion,
    scorer: GlobalScorer,
    tagger: SyntheticTagGenerator,
    concurrency: usize,
}

impl Pipeline {
    /// Build a pipeline from a configuration, validating every table.
    ///
    /// # Errors
    /// Returns `ConfigError` for any invalid weight or threshold; nothing is
    /// processed until the configuration is corrected.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(concurrency = config.concurrency, "analysis pipeline ready");
        Ok(Self {
            normalizer: TagNormalizer::new(config.normalization),
            genres: GenreFusion::new(config.taxonomy),
            scorer: GlobalScorer::new(),
            tagger: SyntheticTagGenerator::new(config.thresholds),
            concurrency: config.concurrency,
        })
    }

    /// Process a single track into a result bundle.
    ///
    /// Infallible by design: a malformed item yields a bundle whose status
    /// carries the error kind and message.
    pub fn process_one(&self, raw: &RawFeatureSet) -> ResultBundle {
        let analyzed_at = Utc::now();
        match self.normalizer.normalize(raw, analyzed_at) {
            Ok(features) => {
                let genres = self.genres.fuse(raw);
                let scores = self.scorer.score(&features);
                let synthetic_tags = self.tagger.generate(&features, &scores);
                debug!(
                    track_id = %raw.track_id,
                    confidence = features.confidence,
                    tags = synthetic_tags.len(),
                    "track processed"
                );
                ResultBundle {
                    track_id: raw.track_id,
                    source: raw.source.clone(),
                    status: BundleStatus::Ok,
                    features: Some(features),
                    genres: Some(genres),
                    scores: Some(scores),
                    synthetic_tags,
                }
            }
            Err(e) => {
                warn!(track_id = %raw.track_id, error = %e, "track rejected");
                ResultBundle {
                    track_id: raw.track_id,
                    source: raw.source.clone(),
                    status: BundleStatus::Error {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                    features: None,
                    genres: None,
                    scores: None,
                    synthetic_tags: Vec::new(),
                }
            }
        }
    }

    /// Process a batch of tracks with bounded concurrency.
    ///
    /// Semantically equivalent to mapping [`Self::process_one`] over the
    /// items independently; results may arrive out of input order.
    pub async fn process_batch(&self, items: Vec<RawFeatureSet>) -> Vec<ResultBundle> {
        self.process_batch_with_cancel(items, CancellationToken::new())
            .await
    }

    /// Process a batch, dropping pending items once `cancel` fires.
    pub async fn process_batch_with_cancel(
        &self,
        items: Vec<RawFeatureSet>,
        cancel: CancellationToken,
    ) -> Vec<ResultBundle> {
        let total = items.len();
        let bundles: Vec<ResultBundle> = stream::iter(items.into_iter().map(|raw| {
            let worker = self.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    debug!(track_id = %raw.track_id, "dropping pending item after cancellation");
                    return None;
                }
                let track_id = raw.track_id;
                let source = raw.source.clone();
                match tokio::task::spawn_blocking(move || worker.process_one(&raw)).await {
                    Ok(bundle) => Some(bundle),
                    Err(e) => {
                        // A panicking worker poisons only its own item.
                        error!(track_id = %track_id, error = %e, "analysis worker failed");
                        Some(ResultBundle {
                            track_id,
                            source,
                            status: BundleStatus::Error {
                                kind: "internal".to_string(),
                                message: format!("analysis worker failed: {}", e),
                            },
                            features: None,
                            genres: None,
                            scores: None,
                            synthetic_tags: Vec::new(),
                        })
                    }
                }
            }
        }))
        .buffer_unordered(self.concurrency)
        .filter_map(|bundle| async move { bundle })
        .collect()
        .await;

        info!(completed = bundles.len(), total, "batch processing finished");
        bundles
    }
}

// ============================================================================
// Tests
// ============================================================================
