//! ltvforge: train and score customer lifetime value models
//!
//! This is the main entrypoint that dispatches the train, score and plot
//! subcommands.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use ltvforge::data::{load_data_if_present, DatasetKind};
use ltvforge::persist::load_model;
use ltvforge::{
    plot_probability_alive_matrix, run_scoring, run_training, Args, Command, ModifiedBetaGeo,
    PipelineConfig, ScoringOutcome, TrainingOutcome,
};
use std::path::Path;
use std::time::Instant;

/// Grid used for the plot when there is no training data to size it from
const DEFAULT_MAX_FREQUENCY: usize = 20;
const DEFAULT_MAX_RECENCY: usize = 100;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let config = args.pipeline_config()?;
    log::debug!("Resolved configuration: {:?}", config);

    match &args.command {
        Command::Train { .. } => run_train(&config),
        Command::Score { .. } => run_score(&config),
        Command::PlotAlive {
            output,
            max_frequency,
            max_recency,
        } => run_plot(&config, output, *max_frequency, *max_recency),
    }
}

fn run_train(config: &PipelineConfig) -> Result<()> {
    let start_time = Instant::now();

    match run_training(config)? {
        TrainingOutcome::InputMissing => {}
        TrainingOutcome::IndependenceViolated { .. } => {
            println!("Training stopped: spend is not independent of frequency");
        }
        TrainingOutcome::Persisted { report, .. } => {
            println!("✓ Models trained and saved");
            println!("  Absolute error: {:.3}", report.absolute_error);
            println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());
        }
    }

    Ok(())
}

fn run_score(config: &PipelineConfig) -> Result<()> {
    let start_time = Instant::now();

    if let ScoringOutcome::Scored(summary) = run_scoring(config)? {
        println!("✓ Scored {} customers", summary.customers);
        println!("  Predictions saved to: {}", summary.output.display());
        println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}

fn run_plot(
    config: &PipelineConfig,
    output: &Path,
    max_frequency: Option<usize>,
    max_recency: Option<usize>,
) -> Result<()> {
    let model: ModifiedBetaGeo = load_model(&config.artifacts.frequency_model)?;

    let (data_frequency, data_recency) = match (max_frequency, max_recency) {
        (Some(frequency), Some(recency)) => (frequency, recency),
        _ => load_data_if_present(&config.train_data, DatasetKind::Training)?
            .map(|data| {
                (
                    data.frequency.fold(0.0_f64, |acc, &x| acc.max(x)) as usize,
                    data.t_cal.fold(0.0_f64, |acc, &t| acc.max(t)).ceil() as usize,
                )
            })
            .unwrap_or((DEFAULT_MAX_FREQUENCY, DEFAULT_MAX_RECENCY)),
    };
    let max_frequency = max_frequency.unwrap_or(data_frequency);
    let max_recency = max_recency.unwrap_or(data_recency);

    plot_probability_alive_matrix(&model, max_frequency, max_recency, output)
        .with_context(|| format!("rendering {}", output.display()))?;
    println!("✓ Probability alive matrix saved to: {}", output.display());

    Ok(())
}
