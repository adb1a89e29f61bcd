//! Special functions used by the likelihoods and prediction formulas

pub use statrs::function::gamma::ln_gamma;

const HYP2F1_TOLERANCE: f64 = 1e-15;
const HYP2F1_MAX_TERMS: usize = 1_000_000;

/// Gauss hypergeometric function 2F1(a, b; c; z) for 0 <= z < 1.
///
/// When c - a - b < 0 the direct series decays slowly near z = 1, so Euler's
/// transformation 2F1(a, b; c; z) = (1 - z)^(c-a-b) 2F1(c-a, c-b; c; z) is applied
/// first.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    debug_assert!((0.0..1.0).contains(&z), "hyp2f1 evaluated outside [0, 1): {z}");
    if z == 0.0 {
        return 1.0;
    }

    let excess = c - a - b;
    if excess < 0.0 {
        (1.0 - z).powf(excess) * hyp2f1_series(c - a, c - b, c, z)
    } else {
        hyp2f1_series(a, b, c, z)
    }
}

fn hyp2f1_series(a: f64, b: f64, c: f64, z: f64) -> f64 {
    let mut term = 1.0;
    let mut sum = 1.0;
    for n in 0..HYP2F1_MAX_TERMS {
        let k = n as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        sum += term;
        if term == 0.0 || term.abs() <= HYP2F1_TOLERANCE * sum.abs() {
            break;
        }
    }
    sum
}

/// ln(1 + e^x) without overflow for large x.
pub fn ln_1p_exp(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}
