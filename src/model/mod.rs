//! Purchase-frequency and monetary-value models
//!
//! * [`ModifiedBetaGeo`]: Modified BG/NBD model of repeat purchasing and dropout
//! * [`GammaGamma`]: Gamma-Gamma model of average transaction value
//!
//! Both are fit by maximizing a (optionally L2-penalized) log-likelihood over
//! log-parameters with [`optim::nelder_mead`].

pub mod gamma_gamma;
pub mod mbg;
pub mod optim;
pub mod special;

pub use gamma_gamma::{GammaGamma, GammaGammaParams};
pub use mbg::{MbgParams, ModifiedBetaGeo};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A model that predicts future transaction counts for a customer.
///
/// Lifetime value is computed against this seam so the monetary model does not
/// depend on a particular frequency model.
pub trait TransactionModel {
    /// Probability the customer is still active at the end of the calibration window.
    fn conditional_probability_alive(&self, frequency: f64, recency: f64, t_cal: f64) -> f64;

    /// Expected number of repeat purchases in the next `t` periods.
    fn conditional_expected_number_of_purchases_up_to_time(
        &self,
        t: f64,
        frequency: f64,
        recency: f64,
        t_cal: f64,
    ) -> f64;
}

/// A fitted model that is fully described by a small set of parameters.
///
/// This is what gets persisted: parameters and the penalty used at fit time, never
/// the data the model was fit on.
pub trait ParametricModel: Sized {
    /// Tag written into persisted artifacts
    const KIND: &'static str;

    type Params: Serialize + DeserializeOwned + Copy + std::fmt::Debug;

    fn params(&self) -> Self::Params;

    fn penalizer_coef(&self) -> f64;

    /// Rebuild a model from persisted parts, rejecting parameters outside the
    /// model's support.
    fn from_parts(params: Self::Params, penalizer_coef: f64) -> Result<Self, String>;
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("parameter {name} must be positive and finite, got {value}"))
    }
}
