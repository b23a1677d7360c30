//! Engine configuration tables
//!
//! Weights and thresholds are injected as explicit immutable configuration
//! rather than module-level constants, so tests can override any table
//! without global state. Defaults carry the production constants. An invalid
//! table is fatal at construction: [`crate::Pipeline::new`] refuses to build
//! until the configuration is corrected, before any item is processed.
//!
//! Tables can also be loaded from a TOML file:
//!
//! ```toml
//! concurrency = 8
//!
//! [taxonomy]
//! freetext = 0.6
//!
//! [thresholds]
//! energetic = 0.7
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration errors, fatal at engine construction
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A weight or threshold is outside its valid domain
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed (includes unknown table keys)
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// TagNormalizer configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizationConfig {
    /// Confidence weight for opposition-gap consensus
    pub consensus_weight: f64,
    /// Confidence weight for populated-field coverage
    pub coverage_weight: f64,
    /// Confidence weight for cross-mood signal strength
    pub signal_weight: f64,
    /// Lower BPM clamp bound
    pub min_bpm: f64,
    /// Upper BPM clamp bound
    pub max_bpm: f64,
    /// Maximum number of unknown tags carried in the extension map
    pub max_extension_tags: usize,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            consensus_weight: 0.5,
            coverage_weight: 0.3,
            signal_weight: 0.2,
            min_bpm: 60.0,
            max_bpm: 200.0,
            max_extension_tags: 32,
        }
    }
}

impl NormalizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in [
            ("consensus_weight", self.consensus_weight),
            ("coverage_weight", self.coverage_weight),
            ("signal_weight", self.signal_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        let sum = self.consensus_weight + self.coverage_weight + self.signal_weight;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::Invalid(format!(
                "confidence weights must sum to 1.0, got {}",
                sum
            )));
        }
        if !self.min_bpm.is_finite() || !self.max_bpm.is_finite() || self.min_bpm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "BPM clamp bounds must be positive numbers, got {}..{}",
                self.min_bpm, self.max_bpm
            )));
        }
        if self.min_bpm >= self.max_bpm {
            return Err(ConfigError::Invalid(format!(
                "BPM clamp range is degenerate: {}..{}",
                self.min_bpm, self.max_bpm
            )));
        }
        Ok(())
    }
}

/// GenreFusion configuration: per-source vote weights and secondary ranking
///
/// Classifier taxonomies carry full weight; the free-text genre field is the
/// least reliable source (user-editable, no fixed vocabulary) and is
/// discounted. Unknown taxonomy names in a config file are rejected at parse
/// time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaxonomyWeights {
    pub tzanetakis: f64,
    pub dortmund: f64,
    pub rosamerica: f64,
    pub electronic: f64,
    pub freetext: f64,
    /// Secondary labels must reach this fraction of the winning aggregate
    pub secondary_ratio: f64,
    /// Cap on the number of secondary labels
    pub secondary_limit: usize,
}

impl Default for TaxonomyWeights {
    fn default() -> Self {
        Self {
            tzanetakis: 1.0,
            dortmund: 1.0,
            rosamerica: 1.0,
            electronic: 1.0,
            freetext: 0.8,
            secondary_ratio: 0.3,
            secondary_limit: 5,
        }
    }
}

impl TaxonomyWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in [
            ("tzanetakis", self.tzanetakis),
            ("dortmund", self.dortmund),
            ("rosamerica", self.rosamerica),
            ("electronic", self.electronic),
            ("freetext", self.freetext),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "taxonomy weight '{}' must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if !self.secondary_ratio.is_finite()
            || !(0.0..=1.0).contains(&self.secondary_ratio)
        {
            return Err(ConfigError::Invalid(format!(
                "secondary_ratio must be within [0,1], got {}",
                self.secondary_ratio
            )));
        }
        Ok(())
    }
}

/// SyntheticTagGenerator trigger thresholds
///
/// One constant per rule-table trigger. Valence-domain thresholds span
/// [-1,1]; everything else lives in [0,1].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagThresholds {
    pub aggressive: f64,
    pub uplifting: f64,
    pub energetic: f64,
    pub chill: f64,
    pub dancefloor: f64,
    pub ambient: f64,
    pub epic_energy: f64,
    pub epic_valence: f64,
    pub workout_dance: f64,
    pub workout_energy: f64,
    pub focus: f64,
    pub background_acoustic: f64,
    pub background_energy: f64,
    pub party: f64,
}

impl Default for TagThresholds {
    fn default() -> Self {
        Self {
            aggressive: 0.6,
            uplifting: 0.5,
            energetic: 0.6,
            chill: 0.4,
            dancefloor: 0.7,
            ambient: 0.6,
            epic_energy: 0.7,
            epic_valence: 0.3,
            workout_dance: 0.6,
            workout_energy: 0.5,
            focus: 0.4,
            background_acoustic: 0.5,
            background_energy: 0.4,
            party: 0.6,
        }
    }
}

impl TagThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("aggressive", self.aggressive),
            ("energetic", self.energetic),
            ("chill", self.chill),
            ("dancefloor", self.dancefloor),
            ("ambient", self.ambient),
            ("epic_energy", self.epic_energy),
            ("workout_dance", self.workout_dance),
            ("workout_energy", self.workout_energy),
            ("focus", self.focus),
            ("background_acoustic", self.background_acoustic),
            ("background_energy", self.background_energy),
            ("party", self.party),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "threshold '{}' must be within [0,1], got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("uplifting", self.uplifting),
            ("epic_valence", self.epic_valence),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "threshold '{}' must be within [-1,1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub normalization: NormalizationConfig,
    pub taxonomy: TaxonomyWeights,
    pub thresholds: TagThresholds,
    /// Bounded worker count for batch processing
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationConfig::default(),
            taxonomy: TaxonomyWeights::default(),
            thresholds: TagThresholds::default(),
            concurrency: 4,
        }
    }
}

impl EngineConfig {
    /// Validate every table. Called by [`crate::Pipeline::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.normalization.validate()?;
        self.taxonomy.validate()?;
        self.thresholds.validate()?;
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse configuration from a TOML string. Missing tables fall back to
    /// defaults; unknown keys are rejected.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        debug!(concurrency = config.concurrency, "parsed engine config");
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
