use serde::{Deserialize, Serialize};

use crate::domain::TracerClass;

/// Per-coordinate affine map from `[0, 1]` to a physical range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorTable {
    scale: Vec<f64>,
    offset: Vec<f64>,
}

impl PriorTable {
    /// Build from `(scale, offset)` rows.
    pub fn from_rows(rows: &[(f64, f64)]) -> Self {
        Self {
            scale: rows.iter().map(|r| r.0).collect(),
            offset: rows.iter().map(|r| r.1).collect(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.scale.len()
    }

    /// Map a unit-cube sample to physical parameters.
    ///
    /// # Panics
    /// Panics in debug builds if `u.len() != self.ndim()`.
    pub fn transform(&self, u: &[f64]) -> Vec<f64> {
        debug_assert_eq!(u.len(), self.ndim());
        u.iter()
            .zip(self.scale.iter().zip(&self.offset))
            .map(|(ui, (s, o))| ui * s + o)
            .collect()
    }

    /// Inverse of `transform`. Coordinates with zero scale map to 0.
    pub fn inverse(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.ndim());
        v.iter()
            .zip(self.scale.iter().zip(&self.offset))
            .map(|(vi, (s, o))| if *s == 0.0 { 0.0 } else { (vi - o) / s })
            .collect()
    }

    /// Physical `(low, high)` bounds of coordinate `i`.
    pub fn bounds(&self, i: usize) -> (f64, f64) {
        let a = self.offset[i];
        let b = self.offset[i] + self.scale[i];
        (a.min(b), a.max(b))
    }

    /// Upper bound on the noise scale (always the last coordinate).
    pub fn noise_bound(&self) -> f64 {
        self.ndim().checked_sub(1).map_or(0.0, |i| self.bounds(i).1)
    }
}

/// Largest noise scale for sampled arterial inputs, as a fraction of the peak.
pub const ARTERY_SIGMA_MAX: f64 = 0.1;

/// Largest noise scale for image-derived (boxcar) inputs.
pub const BOXCAR_SIGMA_MAX: f64 = 0.02;

/// Sampled-artery prior: `t0, τ2, τ3, α−1, 1/β, p, δp2, δp3, 1/γ, f2, f3, f_ss, A, σ`.
pub fn artery_table(tracer: TracerClass) -> PriorTable {
    let fractions = match tracer {
        TracerClass::CarbonMonoxide => [(0.75, 0.25), (0.75, 0.0), (0.75, 0.0)],
        TracerClass::Oxygen => [(0.75, 0.25), (0.5, 0.0), (0.25, 0.0)],
        TracerClass::Default => [(0.5, 0.0), (0.25, 0.0), (0.25, 0.0)],
    };
    let mut rows = vec![
        (60.0, 0.0),
        (60.0, 0.0),
        (60.0, 0.0),
        (20.0, 0.0),
        (30.0, 1.0),
        (9.75, 0.25),
        (10.0, -10.0),
        (10.0, -10.0),
        (300.0, 0.01),
    ];
    rows.extend_from_slice(&fractions);
    rows.push((4.0, 0.5));
    rows.push((ARTERY_SIGMA_MAX, 0.0));
    PriorTable::from_rows(&rows)
}

/// Image-derived input prior; tighter timing, tracer independent.
pub fn boxcar_table() -> PriorTable {
    PriorTable::from_rows(&[
        (30.0, 5.0),
        (20.0, 5.0),
        (20.0, 5.0),
        (5.0, 0.0),
        (10.0, 0.1),
        (3.0, 0.5),
        (0.05, -0.025),
        (0.05, -0.025),
        (100.0, 5.0),
        (0.75, 0.25),
        (0.25, 0.0),
        (0.125, 0.0),
        (3.0, 1.0),
        (BOXCAR_SIGMA_MAX, 0.0),
    ])
}

/// One-tissue compartment prior: `K1, k2, Δt, σ`.
pub fn one_tissue_table() -> PriorTable {
    PriorTable::from_rows(&[(0.05, 0.0), (0.05, 0.0), (20.0, -10.0), (0.1, 0.0)])
}
