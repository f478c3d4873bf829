//! Gaussian log-likelihood with a finite floor.
//!
//! ```text
//! ln L = −½ Σ [ (pred − obs)² / σ² + ln(2π σ²) ]
//! ```
//!
//! σ is the last parameter. Degenerate proposals (NaN curves from an empty
//! normalization, σ → 0, overflow) are expected while sampling. They score
//! `LOGL_SENTINEL` instead of poisoning the evidence integral with NaN.
//! Rust floats never trap, so under/overflow needs no masking here.

use crate::domain::TimeSeriesData;
use crate::models::ForwardModel;

/// Score given to any proposal whose log-likelihood is not finite.
pub const LOGL_SENTINEL: f64 = -1e300;

/// Log-likelihood of `params` for `data` under `model`.
pub fn log_likelihood<M: ForwardModel + ?Sized>(
    model: &M,
    params: &[f64],
    data: &TimeSeriesData,
) -> f64 {
    if params.len() != model.ndim() {
        return LOGL_SENTINEL;
    }
    let signal = model.signal(params, data);
    if signal.predicted.len() != data.rho.len() {
        return LOGL_SENTINEL;
    }
    let sigma = params[params.len() - 1];
    gaussian_log_likelihood(&signal.predicted, &data.rho, sigma)
}

/// Independent-Gaussian log-likelihood with shared scale `sigma`.
pub fn gaussian_log_likelihood(predicted: &[f64], observed: &[f64], sigma: f64) -> f64 {
    let var = sigma * sigma;
    let norm = (2.0 * std::f64::consts::PI * var).ln();
    let total: f64 = predicted
        .iter()
        .zip(observed)
        .map(|(p, o)| (p - o) * (p - o) / var + norm)
        .sum();
    let logl = -0.5 * total;
    if logl.is_finite() { logl } else { LOGL_SENTINEL }
}
