//! ltvforge: customer lifetime value from calibration/holdout summaries
//!
//! Fits a Modified BG/NBD model for purchase frequency and a Gamma-Gamma model
//! for spend, persists their parameters, and scores customers with probability
//! alive and a discounted lifetime value.

pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod persist;
pub mod score;
pub mod train;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Args, Command};
pub use config::{ArtifactPaths, PipelineConfig, ScoringConfig, TimeUnit};
pub use data::{load_data, load_data_if_present, CustomerData, DatasetKind};
pub use error::{LtvError, Result};
pub use model::{GammaGamma, ModifiedBetaGeo, ParametricModel, TransactionModel};
pub use persist::{load_models, save_models};
pub use score::{run_scoring, score, ScoringOutcome, ScoringSummary};
pub use train::{run_training, train, TrainingOutcome};
pub use viz::plot_probability_alive_matrix;
