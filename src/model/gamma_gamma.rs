//! Gamma-Gamma model of average transaction value (Fader, Hardie & Lee, 2005)
//!
//! Transaction values are Gamma(p, nu) around a customer-level rate nu, which is
//! itself Gamma(q, v) across customers. The model assumes spend is independent of
//! purchase frequency, hence the correlation gate in the training pipeline.

use super::optim::{nelder_mead, NelderMeadOptions};
use super::special::ln_gamma;
use super::{require_positive, ParametricModel, TransactionModel};
use crate::config::TimeUnit;
use crate::error::{LtvError, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

const MODEL: &str = "GammaGamma";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaGammaParams {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

/// Fitted Gamma-Gamma spend model
#[derive(Debug, Clone, PartialEq)]
pub struct GammaGamma {
    params: GammaGammaParams,
    penalizer_coef: f64,
}

impl GammaGamma {
    /// Fit on repeat customers only.
    ///
    /// # Arguments
    /// * `frequency` - Repeat transaction counts, all strictly positive
    /// * `monetary_value` - Average transaction value, all strictly positive
    /// * `penalizer_coef` - L2 penalty on the parameters
    pub fn fit(
        frequency: ArrayView1<f64>,
        monetary_value: ArrayView1<f64>,
        penalizer_coef: f64,
    ) -> Result<Self> {
        check_inputs(frequency, monetary_value)?;

        let objective = |log_params: &[f64]| {
            let params = GammaGammaParams {
                p: log_params[0].exp(),
                q: log_params[1].exp(),
                v: log_params[2].exp(),
            };
            negative_log_likelihood(&params, frequency, monetary_value, penalizer_coef)
        };

        let minimum = nelder_mead(objective, &[0.0; 3], NelderMeadOptions::default())
            .map_err(|e| LtvError::model_fit(MODEL, e))?;
        if !minimum.converged {
            return Err(LtvError::model_fit(
                MODEL,
                format!(
                    "optimizer did not converge after {} iterations",
                    minimum.iterations
                ),
            ));
        }
        if !minimum.value.is_finite() {
            return Err(LtvError::model_fit(MODEL, "log-likelihood is not finite"));
        }
        if !minimum.is_bounded() {
            return Err(LtvError::model_fit(
                MODEL,
                format!(
                    "parameters diverged (log-parameters {:?}); the data do not identify the model",
                    minimum.x
                ),
            ));
        }
        log::debug!(
            "{} converged in {} iterations (objective {:.6})",
            MODEL,
            minimum.iterations,
            minimum.value
        );

        let params = GammaGammaParams {
            p: minimum.x[0].exp(),
            q: minimum.x[1].exp(),
            v: minimum.x[2].exp(),
        };
        Self::from_parts(params, penalizer_coef).map_err(|reason| LtvError::model_fit(MODEL, reason))
    }

    /// Expected average transaction value given a customer's history.
    ///
    /// A credibility-weighted blend of the population mean and the customer's own
    /// observed average.
    pub fn conditional_expected_average_profit(&self, frequency: f64, monetary_value: f64) -> f64 {
        let GammaGammaParams { p, q, v } = self.params;
        let individual_weight = p * frequency / (p * frequency + q - 1.0);
        let population_mean = v * p / (q - 1.0);
        (1.0 - individual_weight) * population_mean + individual_weight * monetary_value
    }

    /// Discounted expected spend over the next `horizon` months.
    ///
    /// Expected purchases are taken month by month from the transaction model and
    /// valued at the conditional expected average profit.
    #[allow(clippy::too_many_arguments)]
    pub fn customer_lifetime_value<M: TransactionModel>(
        &self,
        transaction_model: &M,
        frequency: f64,
        recency: f64,
        t_cal: f64,
        monetary_value: f64,
        horizon: u32,
        discount_rate: f64,
        time_unit: TimeUnit,
    ) -> f64 {
        let adjusted_value = self.conditional_expected_average_profit(frequency, monetary_value);
        let factor = time_unit.periods_per_month();

        let expected_up_to = |t: f64| {
            transaction_model
                .conditional_expected_number_of_purchases_up_to_time(t, frequency, recency, t_cal)
        };

        (1..=horizon)
            .map(|month| {
                let t = month as f64 * factor;
                let expected_transactions = expected_up_to(t) - expected_up_to(t - factor);
                adjusted_value * expected_transactions / (1.0 + discount_rate).powi(month as i32)
            })
            .sum()
    }
}

fn negative_log_likelihood(
    params: &GammaGammaParams,
    frequency: ArrayView1<f64>,
    monetary_value: ArrayView1<f64>,
    penalizer_coef: f64,
) -> f64 {
    let GammaGammaParams { p, q, v } = *params;
    let n = frequency.len() as f64;
    let ln_gamma_q = ln_gamma(q);
    let ln_v = v.ln();

    let total: f64 = frequency
        .iter()
        .zip(monetary_value.iter())
        .map(|(&x, &m)| {
            let px = p * x;
            ln_gamma(px + q) - ln_gamma(px) - ln_gamma_q + q * ln_v + (px - 1.0) * m.ln()
                + px * x.ln()
                - (px + q) * (x * m + v).ln()
        })
        .sum();

    let penalty = penalizer_coef * (p * p + q * q + v * v);
    -total / n + penalty
}

fn check_inputs(frequency: ArrayView1<f64>, monetary_value: ArrayView1<f64>) -> Result<()> {
    let fail = |reason: &str| Err(LtvError::model_fit(MODEL, reason));

    if frequency.is_empty() {
        return fail("no repeat customers to fit on");
    }
    if frequency.len() != monetary_value.len() {
        return fail("frequency and monetary_value have different lengths");
    }

    for (&x, &m) in frequency.iter().zip(monetary_value.iter()) {
        if !(x.is_finite() && m.is_finite()) {
            return fail("there exist non-finite values in frequency or monetary_value");
        }
        if x <= 0.0 || x.fract() != 0.0 {
            return fail("frequency must be a positive integer for every customer");
        }
        if m <= 0.0 {
            return fail("there exist non-positive (<= 0) values in the monetary_value vector");
        }
    }

    Ok(())
}

impl ParametricModel for GammaGamma {
    const KIND: &'static str = MODEL;

    type Params = GammaGammaParams;

    fn params(&self) -> GammaGammaParams {
        self.params
    }

    fn penalizer_coef(&self) -> f64 {
        self.penalizer_coef
    }

    fn from_parts(
        params: GammaGammaParams,
        penalizer_coef: f64,
    ) -> std::result::Result<Self, String> {
        require_positive("p", params.p)?;
        require_positive("q", params.q)?;
        require_positive("v", params.v)?;
        if !(penalizer_coef.is_finite() && penalizer_coef >= 0.0) {
            return Err(format!("penalizer_coef must be non-negative, got {penalizer_coef}"));
        }
        Ok(Self {
            params,
            penalizer_coef,
        })
    }
}
