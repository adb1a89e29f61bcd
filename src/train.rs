//! Training and validation pipeline
//!
//! Load → fit Modified BG/NBD → check the Gamma-Gamma independence assumption →
//! fit Gamma-Gamma → report validation error → persist parameters.

use crate::config::{PipelineConfig, INDEPENDENCE_THRESHOLD};
use crate::data::{load_data_if_present, CustomerData, DatasetKind};
use crate::error::{LtvError, Result};
use crate::model::{GammaGamma, ModifiedBetaGeo, ParametricModel};
use crate::persist::save_models;

/// Holdout comparison for the monetary model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationReport {
    /// Mean conditional expected average profit over repeat customers
    pub expected_average_profit: f64,
    /// Mean observed average transaction value in the holdout window
    pub holdout_average_profit: f64,
    /// Absolute difference between the two means
    pub absolute_error: f64,
}

/// How a training run ended
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    /// No training file at the configured location; nothing was done
    InputMissing,
    /// Spend is correlated with frequency; no monetary model was fit or saved
    IndependenceViolated { correlation: f64 },
    /// Both models were fit and their parameters persisted
    Persisted {
        frequency_model: ModifiedBetaGeo,
        monetary_model: GammaGamma,
        report: ValidationReport,
    },
}

/// Fit the Modified BG/NBD model on every customer.
pub fn fit_frequency_model(data: &CustomerData, penalty: f64) -> Result<ModifiedBetaGeo> {
    let model = ModifiedBetaGeo::fit(
        data.frequency.view(),
        data.recency.view(),
        data.t_cal.view(),
        penalty,
    )?;
    log::info!("MBG parameters fit on training data: {:?}", model.params());
    Ok(model)
}

/// Pearson correlation between frequency and monetary value.
///
/// `NaN` when there are fewer than two customers or either column is constant.
pub fn check_independence(repeat: &CustomerData) -> f64 {
    let n = repeat.len();
    if n < 2 {
        return f64::NAN;
    }

    let x = &repeat.frequency;
    let y = &repeat.monetary_value;
    let mean_x = x.sum() / n as f64;
    let mean_y = y.sum() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x > 0.0 && var_y > 0.0 {
        cov / (var_x.sqrt() * var_y.sqrt())
    } else {
        f64::NAN
    }
}

/// Whether a correlation is low enough to fit the Gamma-Gamma model.
/// An undefined correlation never passes.
pub fn independence_holds(correlation: f64) -> bool {
    correlation.abs() < INDEPENDENCE_THRESHOLD
}

/// Fit the Gamma-Gamma model on repeat customers (monetary values already clamped).
pub fn fit_monetary_model(repeat: &CustomerData, penalty: f64) -> Result<GammaGamma> {
    let model = GammaGamma::fit(repeat.frequency.view(), repeat.monetary_value.view(), penalty)?;
    log::info!(
        "Gamma Gamma parameters fit on repeat customer data: {:?}",
        model.params()
    );
    Ok(model)
}

/// Compare the monetary model against the holdout window.
///
/// The error is taken between the two population means, not per customer.
pub fn report_validation(
    repeat: &CustomerData,
    monetary_model: &GammaGamma,
) -> Result<ValidationReport> {
    let holdout = repeat.monetary_holdout.as_ref().ok_or_else(|| {
        LtvError::InvalidInput("monetary_holdout is required for validation".to_string())
    })?;
    if repeat.is_empty() {
        return Err(LtvError::InvalidInput(
            "no repeat customers to validate against".to_string(),
        ));
    }

    let n = repeat.len() as f64;
    let expected_average_profit = repeat
        .frequency
        .iter()
        .zip(repeat.monetary_value.iter())
        .map(|(&x, &m)| monetary_model.conditional_expected_average_profit(x, m))
        .sum::<f64>()
        / n;
    let holdout_average_profit = holdout.sum() / n;
    log::info!(
        "Expected conditional average profit: {:.2}, Average future profit: {:.2}",
        expected_average_profit,
        holdout_average_profit
    );

    let absolute_error = (expected_average_profit - holdout_average_profit).abs();
    log::info!("Absolute error: {:.3}", absolute_error);

    Ok(ValidationReport {
        expected_average_profit,
        holdout_average_profit,
        absolute_error,
    })
}

/// Fit, validate and persist both models from an already loaded training set.
pub fn train(data: &CustomerData, config: &PipelineConfig) -> Result<TrainingOutcome> {
    let frequency_model = fit_frequency_model(data, config.frequency_penalty)?;

    let repeat = data.repeat_customers();
    let correlation = check_independence(&repeat);
    if !independence_holds(correlation) {
        log::warn!(
            "Pearson correlation co-efficient {:.5} appears to be too high (independence assumption violated...)",
            correlation
        );
        return Ok(TrainingOutcome::IndependenceViolated { correlation });
    }

    let monetary_model = fit_monetary_model(&repeat, config.monetary_penalty)?;
    let report = report_validation(&repeat, &monetary_model)?;
    save_models(&frequency_model, &monetary_model, &config.artifacts)?;

    Ok(TrainingOutcome::Persisted {
        frequency_model,
        monetary_model,
        report,
    })
}

/// Run training from the configured training file.
///
/// A missing file is not an error: the run is skipped without logging.
pub fn run_training(config: &PipelineConfig) -> Result<TrainingOutcome> {
    let Some(data) = load_data_if_present(&config.train_data, DatasetKind::Training)? else {
        return Ok(TrainingOutcome::InputMissing);
    };
    log::info!("Training started on {} customers", data.len());
    train(&data, config)
}
