//! Pipeline configuration: file locations and model tunables

use crate::error::{LtvError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Repeat customers must show |corr(frequency, monetary value)| below this for
/// the Gamma-Gamma model to be fit.
pub const INDEPENDENCE_THRESHOLD: f64 = 0.1;

/// Non-positive average transaction values are raised to this before monetary fitting.
pub const MONETARY_FLOOR: f64 = 0.0001;

/// Unit in which recency and T_cal are measured.
///
/// The lifetime-value horizon is always counted in months; this sets how many
/// data time units make up one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Day,
    Week,
    Month,
    Hour,
}

impl TimeUnit {
    /// Data time units per month
    pub fn periods_per_month(self) -> f64 {
        match self {
            TimeUnit::Day => 30.0,
            TimeUnit::Week => 4.345,
            TimeUnit::Month => 1.0,
            TimeUnit::Hour => 30.0 * 24.0,
        }
    }
}

/// Locations of the two persisted parameter artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub frequency_model: PathBuf,
    pub monetary_model: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            frequency_model: PathBuf::from("mbg.json"),
            monetary_model: PathBuf::from("ggf.json"),
        }
    }
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            frequency_model: dir.join("mbg.json"),
            monetary_model: dir.join("ggf.json"),
        }
    }
}

/// Settings for lifetime-value scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Prediction horizon in months
    pub horizon: u32,
    /// Per-month discount rate
    pub discount_rate: f64,
    pub time_unit: TimeUnit,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            discount_rate: 0.00764,
            time_unit: TimeUnit::Day,
        }
    }
}

/// Complete pipeline configuration.
///
/// Every field has a default, so a JSON config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub train_data: PathBuf,
    pub score_data: PathBuf,
    pub predictions: PathBuf,
    pub artifacts: ArtifactPaths,
    /// L2 penalty for the Modified BG/NBD fit
    pub frequency_penalty: f64,
    /// L2 penalty for the Gamma-Gamma fit
    pub monetary_penalty: f64,
    pub scoring: ScoringConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_data: PathBuf::from("./data/train_data.csv"),
            score_data: PathBuf::from("./data/score_data.csv"),
            predictions: PathBuf::from("data/predictions.csv"),
            artifacts: ArtifactPaths::default(),
            frequency_penalty: 0.1,
            monetary_penalty: 0.0,
            scoring: ScoringConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| LtvError::data_source(path, e))?;
        let config: PipelineConfig =
            serde_json::from_str(&contents).map_err(|e| LtvError::data_source(path, e))?;
        config.validate().map_err(|reason| LtvError::data_source(path, reason))?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.frequency_penalty.is_finite() && self.frequency_penalty >= 0.0) {
            return Err(format!(
                "frequency_penalty must be non-negative, got {}",
                self.frequency_penalty
            ));
        }
        if !(self.monetary_penalty.is_finite() && self.monetary_penalty >= 0.0) {
            return Err(format!(
                "monetary_penalty must be non-negative, got {}",
                self.monetary_penalty
            ));
        }
        if !(self.scoring.discount_rate.is_finite() && self.scoring.discount_rate > -1.0) {
            return Err(format!(
                "discount_rate must be greater than -1, got {}",
                self.scoring.discount_rate
            ));
        }
        Ok(())
    }
}
