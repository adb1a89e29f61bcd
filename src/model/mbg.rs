//! Modified BG/NBD model (Batislam, Denizel & Filiztekin, 2007)
//!
//! Purchases follow a Poisson process with Gamma(r, alpha) distributed rates; after
//! every purchase, including the first, a customer drops out with a
//! Beta(a, b) distributed probability.

use super::optim::{nelder_mead, NelderMeadOptions};
use super::special::{hyp2f1, ln_1p_exp, ln_gamma};
use super::{require_positive, ParametricModel, TransactionModel};
use crate::error::{LtvError, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

const MODEL: &str = "ModifiedBetaGeo";

/// Shape and scale parameters of the Modified BG/NBD model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MbgParams {
    pub r: f64,
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

/// Fitted Modified BG/NBD model
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedBetaGeo {
    params: MbgParams,
    penalizer_coef: f64,
}

impl ModifiedBetaGeo {
    /// Fit the model on calibration data.
    ///
    /// # Arguments
    /// * `frequency` - Repeat transaction counts (integers, zero allowed)
    /// * `recency` - Time of last purchase since the first one
    /// * `t_cal` - Customer age at the end of the calibration window
    /// * `penalizer_coef` - L2 penalty on the parameters
    pub fn fit(
        frequency: ArrayView1<f64>,
        recency: ArrayView1<f64>,
        t_cal: ArrayView1<f64>,
        penalizer_coef: f64,
    ) -> Result<Self> {
        check_inputs(frequency, recency, t_cal)?;

        // Rescale time so alpha starts in the same range as the other parameters
        let max_t = t_cal.iter().cloned().fold(0.0, f64::max);
        if max_t <= 0.0 {
            return Err(LtvError::model_fit(
                MODEL,
                "calibration window length is zero for every customer",
            ));
        }
        let scale = 10.0 / max_t;
        let scaled_recency = recency.mapv(|v| v * scale);
        let scaled_t = t_cal.mapv(|v| v * scale);

        let objective = |log_params: &[f64]| {
            let params = MbgParams {
                r: log_params[0].exp(),
                alpha: log_params[1].exp(),
                a: log_params[2].exp(),
                b: log_params[3].exp(),
            };
            negative_log_likelihood(
                &params,
                frequency,
                scaled_recency.view(),
                scaled_t.view(),
                penalizer_coef,
            )
        };

        let minimum = nelder_mead(objective, &[0.0; 4], NelderMeadOptions::default())
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

        let params = MbgParams {
            r: minimum.x[0].exp(),
            alpha: minimum.x[1].exp() / scale,
            a: minimum.x[2].exp(),
            b: minimum.x[3].exp(),
        };
        log::debug!(
            "{} converged in {} iterations (objective {:.6})",
            MODEL,
            minimum.iterations,
            minimum.value
        );

        Self::from_parts(params, penalizer_coef).map_err(|reason| LtvError::model_fit(MODEL, reason))
    }

    /// Per-customer log-likelihood contributions are averaged, matching the penalty scale.
    pub fn log_likelihood(
        &self,
        frequency: ArrayView1<f64>,
        recency: ArrayView1<f64>,
        t_cal: ArrayView1<f64>,
    ) -> f64 {
        -negative_log_likelihood(&self.params, frequency, recency, t_cal, 0.0)
    }
}

fn negative_log_likelihood(
    params: &MbgParams,
    frequency: ArrayView1<f64>,
    recency: ArrayView1<f64>,
    t_cal: ArrayView1<f64>,
    penalizer_coef: f64,
) -> f64 {
    let MbgParams { r, alpha, a, b } = *params;
    let n = frequency.len() as f64;

    let ln_gamma_r = ln_gamma(r);
    let ln_gamma_b = ln_gamma(b);
    let ln_gamma_ab = ln_gamma(a + b);
    let ln_alpha = alpha.ln();
    let ln_a = a.ln();

    let total: f64 = frequency
        .iter()
        .zip(recency.iter())
        .zip(t_cal.iter())
        .map(|((&x, &rec), &t)| {
            let ln_alpha_t = (alpha + t).ln();
            let a1 = ln_gamma(r + x) - ln_gamma_r + r * ln_alpha;
            let a2 = ln_gamma_ab + ln_gamma(b + x + 1.0) - ln_gamma_b - ln_gamma(a + b + x + 1.0);
            let a3 = -(r + x) * ln_alpha_t;
            let a4 = ln_a - (b + x).ln() + (r + x) * (ln_alpha_t - (alpha + rec).ln());
            a1 + a2 + a3 + ln_1p_exp(a4)
        })
        .sum();

    let penalty = penalizer_coef * (r * r + alpha * alpha + a * a + b * b);
    -total / n + penalty
}

fn check_inputs(
    frequency: ArrayView1<f64>,
    recency: ArrayView1<f64>,
    t_cal: ArrayView1<f64>,
) -> Result<()> {
    let fail = |reason: &str| Err(LtvError::model_fit(MODEL, reason));

    if frequency.is_empty() {
        return fail("no customers to fit on");
    }
    if frequency.len() != recency.len() || frequency.len() != t_cal.len() {
        return fail("frequency, recency and T_cal have different lengths");
    }

    for ((&x, &rec), &t) in frequency.iter().zip(recency.iter()).zip(t_cal.iter()) {
        if !(x.is_finite() && rec.is_finite() && t.is_finite()) {
            return fail("there exist non-finite values in frequency, recency or T_cal");
        }
        if x < 0.0 || x.fract() != 0.0 {
            return fail("there exist negative or non-integer values in the frequency vector");
        }
        if rec < 0.0 {
            return fail("there exist negative recency values (last order set before first order)");
        }
        if rec > t {
            return fail("some values in the recency vector are larger than T_cal");
        }
        if x == 0.0 && rec != 0.0 {
            return fail("there exist non-zero recency values when frequency is zero");
        }
    }

    Ok(())
}

impl TransactionModel for ModifiedBetaGeo {
    fn conditional_probability_alive(&self, frequency: f64, recency: f64, t_cal: f64) -> f64 {
        let MbgParams { r, alpha, a, b } = self.params;
        let ln_odds_dead = a.ln() - (b + frequency).ln()
            + (r + frequency) * ((alpha + t_cal).ln() - (alpha + recency).ln());
        (-ln_1p_exp(ln_odds_dead)).exp()
    }

    fn conditional_expected_number_of_purchases_up_to_time(
        &self,
        t: f64,
        frequency: f64,
        recency: f64,
        t_cal: f64,
    ) -> f64 {
        let MbgParams { r, alpha, a, b } = self.params;
        let x = frequency;

        let hyp_term = hyp2f1(r + x, b + x + 1.0, a + b + x, t / (alpha + t_cal + t));
        let first_term = (a + b + x) / (a - 1.0);
        let second_term = 1.0 - hyp_term * ((alpha + t_cal) / (alpha + t + t_cal)).powf(r + x);
        let numerator = first_term * second_term;

        let denominator = 1.0 + (a / (b + x)) * ((alpha + t_cal) / (alpha + recency)).powf(r + x);

        numerator / denominator
    }
}

impl ParametricModel for ModifiedBetaGeo {
    const KIND: &'static str = MODEL;

    type Params = MbgParams;

    fn params(&self) -> MbgParams {
        self.params
    }

    fn penalizer_coef(&self) -> f64 {
        self.penalizer_coef
    }

    fn from_parts(params: MbgParams, penalizer_coef: f64) -> std::result::Result<Self, String> {
        require_positive("r", params.r)?;
        require_positive("alpha", params.alpha)?;
        require_positive("a", params.a)?;
        require_positive("b", params.b)?;
        if !(penalizer_coef.is_finite() && penalizer_coef >= 0.0) {
            return Err(format!("penalizer_coef must be non-negative, got {penalizer_coef}"));
        }
        Ok(Self {
            params,
            penalizer_coef,
        })
    }
}
