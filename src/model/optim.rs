//! Likelihood minimization with argmin's Nelder-Mead simplex
//!
//! Both likelihoods are optimized over log-parameters, so the search space is
//! unconstrained and a gradient-free simplex is sufficient.

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;

/// Natural-scale parameters above this are treated as a diverged fit.
pub const MAX_PARAMETER: f64 = 1e6;

/// Settings for [`nelder_mead`].
#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    /// Edge length of the initial simplex around the starting point
    pub initial_step: f64,
    /// Stop once the standard deviation of the objective across the simplex falls below this
    pub sd_tolerance: f64,
    pub max_iterations: u64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            initial_step: 0.5,
            sd_tolerance: 1e-10,
            max_iterations: 20_000,
        }
    }
}

/// Outcome of a minimization run.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: u64,
    pub converged: bool,
}

impl Minimum {
    /// Whether every log-parameter maps back to a finite value no larger than
    /// [`MAX_PARAMETER`].
    ///
    /// A flat likelihood ridge lets the simplex settle while a parameter runs off
    /// to infinity; the objective spread alone does not catch that.
    pub fn is_bounded(&self) -> bool {
        self.x
            .iter()
            .all(|&log_param| log_param.is_finite() && log_param.exp() <= MAX_PARAMETER)
    }
}

/// Adapts a plain objective to argmin; non-finite values become +inf so the
/// simplex backs away from regions where the likelihood is undefined.
struct Objective<F> {
    objective: F,
}

impl<F> CostFunction for Objective<F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        let value = (self.objective)(param);
        Ok(if value.is_finite() { value } else { f64::INFINITY })
    }
}

/// Minimize `objective` starting from `start`.
///
/// The initial simplex is `start` plus one step along each axis.
pub fn nelder_mead<F>(
    objective: F,
    start: &[f64],
    options: NelderMeadOptions,
) -> Result<Minimum, Error>
where
    F: Fn(&[f64]) -> f64,
{
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.to_vec());
    for i in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[i] += options.initial_step;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex).with_sd_tolerance(options.sd_tolerance)?;
    let result = Executor::new(Objective { objective }, solver)
        .configure(|state| state.max_iters(options.max_iterations))
        .run()?;

    let state = result.state();
    let converged = matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged)
    );

    Ok(Minimum {
        x: state
            .get_best_param()
            .cloned()
            .unwrap_or_else(|| start.to_vec()),
        value: state.get_best_cost(),
        iterations: state.get_iter(),
        converged,
    })
}
