//! Closed-form bolus shapes for arterial input functions.
//!
//! The building blocks are:
//!
//! - `single_bolus`: generalized gamma pulse `(t−t0)^a · exp(−(b(t−t0))^p)`
//! - `steady_state`: rising exponential `1 − exp(−g(t−t0))`
//!
//! Each is normalized to a unit peak on the grid it is evaluated on. Mixtures
//! combine time-shifted boluses with a steady-state term using chained
//! complementary weights, so the weights sum to 1 whenever every fraction lies
//! in `[0, 1]`.
//!
//! Numerical notes:
//! - The pulse is evaluated in the complex domain and the real part kept, so
//!   non-integer exponents never raise on a zero base.
//! - A curve whose maximum is 0 normalizes to NaN. That is intentional: the
//!   likelihood maps NaN predictions to its sentinel.

use nalgebra::Complex;

use crate::math::nan_max;

/// Smallest shape exponent allowed for delayed boluses.
pub const MIN_SHAPE: f64 = 0.25;

/// Shape parameters shared by the bolus mixtures.
///
/// Built from the physical parameter vector by `from_vector`; `b` and `g` are
/// rates (the vector stores their reciprocals).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BolusParams {
    pub t0: f64,
    pub tau2: f64,
    pub tau3: f64,
    pub a: f64,
    pub b: f64,
    pub p: f64,
    pub dp2: f64,
    pub dp3: f64,
    pub g: f64,
    pub f2: f64,
    pub f3: f64,
    pub f_ss: f64,
}

impl BolusParams {
    /// Read `t0, τ2, τ3, α−1, 1/β, p, δp2, δp3, 1/γ, f2, f3, f_ss` from the
    /// first 12 entries of `v`.
    ///
    /// # Panics
    /// Panics if `v` has fewer than 12 entries.
    pub fn from_vector(v: &[f64]) -> Self {
        Self {
            t0: v[0],
            tau2: v[1],
            tau3: v[2],
            a: v[3],
            b: 1.0 / v[4],
            p: v[5],
            dp2: v[6],
            dp3: v[7],
            g: 1.0 / v[8],
            f2: v[9],
            f3: v[10],
            f_ss: v[11],
        }
    }
}

/// `z^e` with numpy's conventions for a zero base.
fn cpow(z: Complex<f64>, e: f64) -> Complex<f64> {
    if z.re == 0.0 && z.im == 0.0 {
        return if e == 0.0 {
            Complex::new(1.0, 0.0)
        } else if e > 0.0 {
            Complex::new(0.0, 0.0)
        } else {
            Complex::new(f64::NAN, f64::NAN)
        };
    }
    z.powf(e)
}

/// Clip negatives to zero while letting NaN through.
fn clip_negative(x: f64) -> f64 {
    if x < 0.0 { 0.0 } else { x }
}

fn normalize_peak(mut values: Vec<f64>) -> Vec<f64> {
    let peak = nan_max(&values);
    for v in &mut values {
        *v /= peak;
    }
    values
}

/// Generalized gamma pulse starting at `t0`, normalized to unit peak.
pub fn single_bolus(t: &[f64], t0: f64, a: f64, b: f64, p: f64) -> Vec<f64> {
    let rho = t
        .iter()
        .map(|&ti| {
            if ti < t0 {
                return 0.0;
            }
            let dt = Complex::new(ti - t0, 0.0);
            let pulse = cpow(dt, a) * (-cpow(dt * b, p)).exp();
            clip_negative(pulse.re)
        })
        .collect();
    normalize_peak(rho)
}

/// Rising exponential coincident with the first bolus, normalized to unit peak.
pub fn steady_state(t: &[f64], t0: f64, g: f64) -> Vec<f64> {
    let rho = t
        .iter()
        .map(|&ti| clip_negative(1.0 - (-g * (ti - t0)).exp()))
        .collect();
    normalize_peak(rho)
}

fn combine(terms: &[(f64, Vec<f64>)], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for (weight, curve) in terms {
        for (o, c) in out.iter_mut().zip(curve) {
            *o += weight * c;
        }
    }
    out
}

/// One bolus plus steady state.
pub fn two_bolus_mixture(t: &[f64], bp: &BolusParams) -> Vec<f64> {
    let f1 = 1.0 - bp.f_ss;
    combine(
        &[
            (f1, single_bolus(t, bp.t0, bp.a, bp.b, bp.p)),
            (bp.f_ss, steady_state(t, bp.t0, bp.g)),
        ],
        t.len(),
    )
}

/// Two sequential boluses plus steady state.
pub fn three_bolus_mixture(t: &[f64], bp: &BolusParams) -> Vec<f64> {
    let f_ss = bp.f_ss * (1.0 - bp.f2);
    let f1 = (1.0 - bp.f_ss) * (1.0 - bp.f2);
    let p2 = (bp.p + bp.dp2).max(MIN_SHAPE);
    combine(
        &[
            (f1, single_bolus(t, bp.t0, bp.a, bp.b, bp.p)),
            (bp.f2, single_bolus(t, bp.t0 + bp.tau2, bp.a, bp.b, p2)),
            (f_ss, steady_state(t, bp.t0, bp.g)),
        ],
        t.len(),
    )
}

/// Three sequential boluses plus steady state.
pub fn four_bolus_mixture(t: &[f64], bp: &BolusParams) -> Vec<f64> {
    let f_ss = bp.f_ss * (1.0 - bp.f2) * (1.0 - bp.f3);
    let f1 = (1.0 - bp.f_ss) * (1.0 - bp.f2) * (1.0 - bp.f3);
    let f2 = bp.f2 * (1.0 - bp.f3);
    let p2 = (bp.p + bp.dp2).max(MIN_SHAPE);
    let p3 = (bp.p + bp.dp2 + bp.dp3).max(MIN_SHAPE);
    combine(
        &[
            (f1, single_bolus(t, bp.t0, bp.a, bp.b, bp.p)),
            (f2, single_bolus(t, bp.t0 + bp.tau2, bp.a, bp.b, p2)),
            (bp.f3, single_bolus(t, bp.t0 + bp.tau2 + bp.tau3, bp.a, bp.b, p3)),
            (f_ss, steady_state(t, bp.t0, bp.g)),
        ],
        t.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    fn truths() -> BolusParams {
        BolusParams::from_vector(&[
            15.7, 8.73, 14.77, 0.29, 3.04, 2.23, 0.0, 0.0, 53.11, 0.31, 0.1, 0.07,
        ])
    }

    #[test]
    fn single_bolus_is_zero_before_arrival_and_peaks_at_one() {
        let t = grid(120);
        let rho = single_bolus(&t, 20.0, 2.0, 0.25, 1.0);
        assert!(rho[..=20].iter().all(|&v| v == 0.0));
        let peak = rho.iter().copied().fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-12, "peak {peak}");
        // Gamma variate (p = 1) peaks at t0 + a/b.
        let argmax = rho.iter().position(|&v| v == peak).unwrap();
        assert_eq!(argmax, 28, "argmax {argmax}");
    }

    #[test]
    fn zero_exponent_keeps_unit_onset() {
        // a = 0 makes (t−t0)^0 = 1 even at the onset sample.
        let t = grid(10);
        let rho = single_bolus(&t, 0.0, 0.0, 0.5, 1.0);
        assert!((rho[0] - 1.0).abs() < 1e-12);
        assert!(rho.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn all_zero_curve_normalizes_to_nan() {
        // Arrival after the last sample leaves nothing to normalize.
        let t = grid(10);
        let rho = single_bolus(&t, 100.0, 1.0, 1.0, 1.0);
        assert!(rho.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn steady_state_rises_to_unit_peak() {
        let t = grid(200);
        let rho = steady_state(&t, 10.0, 1.0 / 50.0);
        assert!(rho[..=10].iter().all(|&v| v == 0.0));
        assert!((rho[199] - 1.0).abs() < 1e-12);
        assert!(rho.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn mixture_weights_sum_to_one_at_late_times() {
        // Far past every bolus only the steady-state term survives, scaled by
        // its chained weight.
        let bp = truths();
        let t = grid(3000);
        let rho = four_bolus_mixture(&t, &bp);
        let f_ss = bp.f_ss * (1.0 - bp.f2) * (1.0 - bp.f3);
        assert!((rho[2999] - f_ss).abs() < 1e-6, "tail {} vs {f_ss}", rho[2999]);
        assert!(rho.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
    }

    #[test]
    fn delayed_bolus_shape_is_floored() {
        let mut bp = truths();
        bp.dp2 = -10.0;
        let t = grid(200);
        let rho = three_bolus_mixture(&t, &bp);
        assert!(rho.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn two_bolus_has_no_delayed_component() {
        let bp = truths();
        let t = grid(200);
        let two = two_bolus_mixture(&t, &bp);
        let expected: Vec<f64> = single_bolus(&t, bp.t0, bp.a, bp.b, bp.p)
            .iter()
            .zip(steady_state(&t, bp.t0, bp.g))
            .map(|(b, s)| (1.0 - bp.f_ss) * b + bp.f_ss * s)
            .collect();
        for (x, y) in two.iter().zip(&expected) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
