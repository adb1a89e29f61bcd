//! Command-line interface definitions and argument parsing

use crate::config::{PipelineConfig, TimeUnit};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Customer lifetime value with Modified BG/NBD and Gamma-Gamma models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON file with pipeline settings; flags below override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Frequency model artifact
    #[arg(long, global = true)]
    pub frequency_model: Option<PathBuf>,

    /// Monetary model artifact
    #[arg(long, global = true)]
    pub monetary_model: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fit both models on a calibration/holdout summary and save their parameters
    Train {
        /// Training CSV
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Predict probability alive and lifetime value for every customer
    Score {
        /// Scoring CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Horizon in months
        #[arg(long)]
        horizon: Option<u32>,

        /// Monthly discount rate
        #[arg(long)]
        discount_rate: Option<f64>,

        /// Unit of recency and T_cal in the input
        #[arg(long, value_enum)]
        time_unit: Option<TimeUnit>,
    },
    /// Render the frequency model's probability-alive matrix
    PlotAlive {
        /// Output PNG
        #[arg(short, long, default_value = "alive_matrix.png")]
        output: PathBuf,

        /// Highest frequency shown; defaults to the training data maximum
        #[arg(long)]
        max_frequency: Option<usize>,

        /// Highest recency shown; defaults to the training data maximum T_cal
        #[arg(long)]
        max_recency: Option<usize>,
    },
}

impl Args {
    /// Resolve the pipeline configuration: defaults, then the config file, then flags.
    pub fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = &self.frequency_model {
            config.artifacts.frequency_model = path.clone();
        }
        if let Some(path) = &self.monetary_model {
            config.artifacts.monetary_model = path.clone();
        }

        match &self.command {
            Command::Train { input } => {
                if let Some(input) = input {
                    config.train_data = input.clone();
                }
            }
            Command::Score {
                input,
                output,
                horizon,
                discount_rate,
                time_unit,
            } => {
                if let Some(input) = input {
                    config.score_data = input.clone();
                }
                if let Some(output) = output {
                    config.predictions = output.clone();
                }
                if let Some(horizon) = horizon {
                    config.scoring.horizon = *horizon;
                }
                if let Some(rate) = discount_rate {
                    config.scoring.discount_rate = *rate;
                }
                if let Some(unit) = time_unit {
                    config.scoring.time_unit = *unit;
                }
            }
            Command::PlotAlive { .. } => {}
        }

        config
            .validate()
            .map_err(|reason| crate::LtvError::data_source("<command line>", reason))?;
        Ok(config)
    }
}
