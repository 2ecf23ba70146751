//! # Mosaic Config
//!
//! One YAML file, five sections, every field optional:
//!
//! ```yaml
//! encoder:
//!   distance_aware: true
//!   distance_scale: 4.0
//! index:
//!   max_depth: 32
//! matcher:
//!   first_search_length: 32
//!   pog_bonus: 25.0
//!   tolerance_schedule: [1, 2, 4, 8, 16, 32]
//! filter:
//!   buffer_size: 8
//! construct:
//!   bounds: [512.0, 382.0]
//!   beat_length_ms: 500.0
//!   slider_multiplier: 1.4
//! ```
//!
//! Lookup order: explicit path, `MOSAIC_CONFIG`, then
//! `<config dir>/mosaic/config.yaml`. A missing file means defaults.

pub use mosaic_core::EncoderSettings;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "MOSAIC_CONFIG";

/// Result type for mosaic-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mosaic-config
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Corpus index settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Suffixes are indexed up to this many symbols
    pub max_depth: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Longest window tried by the windowed search
    pub first_search_length: usize,

    /// Added to the score of the continuation candidate
    pub pog_bonus: f64,

    /// Upper bound on committed context per window
    pub max_lookback: usize,

    /// Occurrences examined per position before giving up
    pub max_search: usize,

    /// Spacing-bucket tolerances, narrowest first (distance-aware encoding only)
    pub tolerance_schedule: Vec<u8>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            first_search_length: 32,
            pog_bonus: 25.0,
            max_lookback: 4,
            max_search: 400,
            tolerance_schedule: vec![1, 2, 4, 8, 16, 32],
        }
    }
}

/// Score-ordering filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub buffer_size: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { buffer_size: 8 }
    }
}

/// Replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructConfig {
    /// Positions are clamped into [0, bounds]
    pub bounds: [f64; 2],

    /// Milliseconds per beat when no timing is supplied
    pub beat_length_ms: Option<f64>,

    /// Time of the first beat when `beat_length_ms` is set
    pub offset_ms: f64,

    /// Global slider multiplier used for slider velocity changes
    pub slider_multiplier: f64,
}

impl Default for ConstructConfig {
    fn default() -> Self {
        Self {
            bounds: [512.0, 382.0],
            beat_length_ms: None,
            offset_ms: 0.0,
            slider_multiplier: 1.4,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub encoder: EncoderSettings,
    pub index: IndexConfig,
    pub matcher: MatcherConfig,
    pub filter: FilterConfig,
    pub construct: ConstructConfig,
}

impl MosaicConfig {
    /// Parse YAML and validate
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: MosaicConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a specific file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&text)?;
        tracing::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolve the config file and load it, falling back to defaults when none exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_path(path);
        }

        let path = Self::default_path();
        if path.exists() {
            Self::from_path(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Default storage path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mosaic")
            .join("config.yaml")
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.encoder.gap_range == 0 {
            return Err(invalid("encoder.gap_range", "must be at least 1"));
        }
        // 5 categories share the rhythm byte
        if self.encoder.gap_range as usize * mosaic_core::CATEGORY_COUNT as usize > 256 {
            return Err(invalid("encoder.gap_range", "rhythm byte overflows"));
        }
        if !(self.encoder.distance_scale > 0.0) {
            return Err(invalid("encoder.distance_scale", "must be positive"));
        }
        if self.index.max_depth == 0 {
            return Err(invalid("index.max_depth", "must be at least 1"));
        }
        if self.matcher.first_search_length == 0 {
            return Err(invalid("matcher.first_search_length", "must be at least 1"));
        }
        if self.matcher.max_search == 0 {
            return Err(invalid("matcher.max_search", "must be at least 1"));
        }
        if self.matcher.tolerance_schedule.windows(2).any(|w| w[0] > w[1]) {
            return Err(invalid("matcher.tolerance_schedule", "must be narrowest first"));
        }
        if self.filter.buffer_size == 0 {
            return Err(invalid("filter.buffer_size", "must be at least 1"));
        }
        if self.construct.bounds.iter().any(|b| !(*b > 0.0)) {
            return Err(invalid("construct.bounds", "must be positive"));
        }
        if let Some(beat) = self.construct.beat_length_ms {
            if !(beat > 0.0) {
                return Err(invalid("construct.beat_length_ms", "must be positive"));
            }
        }
        if !(self.construct.slider_multiplier.is_finite() && self.construct.slider_multiplier > 0.0) {
            return Err(invalid("construct.slider_multiplier", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> Error {
    Error::Invalid {
        field,
        reason: reason.to_string(),
    }
}
