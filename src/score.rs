//! Scoring with persisted model parameters

use crate::config::{ArtifactPaths, PipelineConfig, ScoringConfig};
use crate::data::{load_data, CustomerData, DatasetKind, CUSTOMER_ID};
use crate::error::{LtvError, Result};
use crate::model::{GammaGamma, ModifiedBetaGeo, TransactionModel};
use crate::persist::{load_models, write_atomically};
use ndarray::Array1;
use polars::prelude::*;
use std::path::{Path, PathBuf};

pub const P_ALIVE: &str = "p_alive";
pub const PREDICTION: &str = "prediction";

/// Per-customer predictions, aligned with the scored table
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub customer_ids: Vec<String>,
    pub p_alive: Array1<f64>,
    /// Discounted lifetime value, rounded to cents
    pub prediction: Array1<f64>,
}

/// Summary of a scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSummary {
    pub customers: usize,
    pub output: PathBuf,
}

/// How a triggered scoring run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringOutcome {
    /// Some prerequisite file was absent; nothing was done
    PrerequisitesMissing(Vec<PathBuf>),
    Scored(ScoringSummary),
}

/// Round half to even at two decimals
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Probability each customer is still active.
pub fn alive<M: TransactionModel>(data: &CustomerData, model: &M) -> Array1<f64> {
    data.frequency
        .iter()
        .zip(data.recency.iter())
        .zip(data.t_cal.iter())
        .map(|((&x, &rec), &t)| model.conditional_probability_alive(x, rec, t))
        .collect()
}

/// Discounted lifetime value of each customer over the configured horizon.
pub fn ltv_predict<M: TransactionModel>(
    data: &CustomerData,
    transaction_model: &M,
    monetary_model: &GammaGamma,
    scoring: &ScoringConfig,
) -> Array1<f64> {
    (0..data.len())
        .map(|row| {
            monetary_model.customer_lifetime_value(
                transaction_model,
                data.frequency[row],
                data.recency[row],
                data.t_cal[row],
                data.monetary_value[row],
                scoring.horizon,
                scoring.discount_rate,
                scoring.time_unit,
            )
        })
        .collect()
}

/// Apply both models to every customer.
pub fn predict(
    data: &CustomerData,
    frequency_model: &ModifiedBetaGeo,
    monetary_model: &GammaGamma,
    scoring: &ScoringConfig,
) -> Predictions {
    Predictions {
        customer_ids: data.customer_ids.clone(),
        p_alive: alive(data, frequency_model),
        prediction: ltv_predict(data, frequency_model, monetary_model, scoring).mapv(round_cents),
    }
}

/// Write predictions as a `customer_id,p_alive,prediction` UTF-8 CSV, replacing
/// any existing file.
pub fn write_predictions(predictions: &Predictions, output: &Path) -> Result<()> {
    let polars_error = |e: PolarsError| {
        LtvError::persistence(output, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    };

    let mut df = DataFrame::new(vec![
        Series::new(CUSTOMER_ID, predictions.customer_ids.as_slice()),
        Series::new(P_ALIVE, predictions.p_alive.to_vec()),
        Series::new(PREDICTION, predictions.prediction.to_vec()),
    ])
    .map_err(polars_error)?;

    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut df)
        .map_err(polars_error)?;

    write_atomically(output, &buffer)
}

/// Score a customer file with persisted parameters.
///
/// Models are loaded before anything else, so a missing or corrupt artifact
/// leaves the output untouched.
pub fn score(
    artifacts: &ArtifactPaths,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    scoring: &ScoringConfig,
) -> Result<ScoringSummary> {
    let (frequency_model, monetary_model) = load_models(artifacts)?;

    let input = input.as_ref();
    let data = load_data(input, DatasetKind::Scoring)?;
    data.check_support()
        .map_err(|reason| LtvError::data_source(input, reason))?;
    log::info!("Data loaded successfully...");

    let predictions = predict(&data, &frequency_model, &monetary_model, scoring);
    log::info!("Data scored successfully...");

    let output = output.as_ref();
    write_predictions(&predictions, output)?;
    log::info!("Predictions saved to {}", output.display());

    Ok(ScoringSummary {
        customers: data.len(),
        output: output.to_path_buf(),
    })
}

/// Score the configured input if both artifacts and the input file exist.
///
/// Absent prerequisites are reported with a warning and skipped rather than
/// treated as failures.
pub fn run_scoring(config: &PipelineConfig) -> Result<ScoringOutcome> {
    let missing: Vec<PathBuf> = [
        &config.artifacts.frequency_model,
        &config.artifacts.monetary_model,
        &config.score_data,
    ]
    .into_iter()
    .filter(|path| !path.exists())
    .cloned()
    .collect();

    if !missing.is_empty() {
        log::warn!(
            "Scoring skipped, missing: {}",
            missing
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        return Ok(ScoringOutcome::PrerequisitesMissing(missing));
    }

    score(
        &config.artifacts,
        &config.score_data,
        &config.predictions,
        &config.scoring,
    )
    .map(ScoringOutcome::Scored)
}
