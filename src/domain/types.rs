//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - moved into worker threads by value during fan-out
//! - written into checkpoints and result bundles
//! - reloaded later for inspection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::sampler::PosteriorResult;

/// Tracer family, resolved once from a tracer tag.
///
/// Prior ranges for the bolus fractions differ by tracer; everything else is
/// shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracerClass {
    /// `[15O]CO` (also tagged `oc`).
    CarbonMonoxide,
    /// `[15O]O2`.
    Oxygen,
    Default,
}

impl TracerClass {
    /// Resolve a tracer tag such as `"oo"`, `"CO"` or `"trc-oc"`.
    ///
    /// Unknown tags map to `Default`; this never fails.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        let tag = tag.strip_prefix("trc-").unwrap_or(&tag);
        match tag {
            "co" | "oc" => TracerClass::CarbonMonoxide,
            "oo" => TracerClass::Oxygen,
            _ => TracerClass::Default,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TracerClass::CarbonMonoxide => "CO",
            TracerClass::Oxygen => "OO",
            TracerClass::Default => "default",
        }
    }
}

/// Proposal strategy used by the nested sampler to draw a replacement live point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    /// Rejection sampling from the whole unit cube.
    Unif,
    /// Gaussian random walk from a randomly chosen live point.
    Rwalk,
    /// Random-direction slice sampling.
    Rslice,
}

impl SampleMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleMethod::Unif => "unif",
            SampleMethod::Rwalk => "rwalk",
            SampleMethod::Rslice => "rslice",
        }
    }
}

impl fmt::Display for SampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unif" => Ok(SampleMethod::Unif),
            "rwalk" => Ok(SampleMethod::Rwalk),
            "rslice" => Ok(SampleMethod::Rslice),
            other => Err(AppError::config(format!(
                "Unknown sampling method '{other}' (expected unif, rwalk or rslice)."
            ))),
        }
    }
}

/// Immutable measurement record for one fit.
///
/// `rho` is decay-corrected upstream and normalized to unit maximum; nothing in
/// this crate re-derives either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesData {
    /// Mid-frame times (s).
    pub times_mid: Vec<f64>,
    /// Frame durations (s).
    pub taus: Vec<f64>,
    /// Observed normalized signal, one value per frame.
    pub rho: Vec<f64>,
    /// Tracer half-life (s).
    pub halflife: f64,
    /// Dispersion kernel on the 1-s grid (sampled arterial lines only).
    pub kernel: Option<Vec<f64>>,
    /// Frames integrate activity over their duration (image-derived inputs).
    pub boxcar: bool,
}

impl TimeSeriesData {
    pub fn new(
        times_mid: Vec<f64>,
        taus: Vec<f64>,
        rho: Vec<f64>,
        halflife: f64,
    ) -> Result<Self, AppError> {
        if times_mid.is_empty() {
            return Err(AppError::config("Time series has no frames."));
        }
        if taus.len() != times_mid.len() || rho.len() != times_mid.len() {
            return Err(AppError::config(format!(
                "Frame arrays disagree: times_mid={}, taus={}, rho={}.",
                times_mid.len(),
                taus.len(),
                rho.len()
            )));
        }
        if times_mid.iter().chain(taus.iter()).any(|v| !v.is_finite()) {
            return Err(AppError::config("Frame timing contains non-finite values."));
        }
        if taus.iter().any(|&tau| tau < 0.0) {
            return Err(AppError::config("Frame durations must be non-negative."));
        }
        Ok(Self {
            times_mid,
            taus,
            rho,
            halflife,
            kernel: None,
            boxcar: false,
        })
    }

    pub fn with_kernel(mut self, kernel: Vec<f64>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn with_boxcar(mut self, boxcar: bool) -> Self {
        self.boxcar = boxcar;
        self
    }

    /// Same timing, different observed curve (used to split regions).
    pub fn with_rho(&self, rho: Vec<f64>) -> Result<Self, AppError> {
        if rho.len() != self.times_mid.len() {
            return Err(AppError::config(format!(
                "Signal has {} frames, timing has {}.",
                rho.len(),
                self.times_mid.len()
            )));
        }
        Ok(Self {
            rho,
            ..self.clone()
        })
    }

    pub fn len(&self) -> usize {
        self.times_mid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times_mid.is_empty()
    }

    pub fn frame_starts(&self) -> Vec<f64> {
        self.times_mid
            .iter()
            .zip(&self.taus)
            .map(|(t, tau)| t - tau / 2.0)
            .collect()
    }

    pub fn frame_ends(&self) -> Vec<f64> {
        self.times_mid
            .iter()
            .zip(&self.taus)
            .map(|(t, tau)| t + tau / 2.0)
            .collect()
    }

    /// Dense 1-s grid `0, 1, …, ⌈t_last⌉` on which ideal curves are evaluated.
    ///
    /// Boxcar data needs the grid to cover the end of the last frame; sampled
    /// data only needs the last mid-frame time.
    pub fn ideal_times(&self) -> Vec<f64> {
        let t_last = if self.boxcar {
            self.frame_ends().into_iter().fold(0.0, f64::max)
        } else {
            self.times_mid.iter().copied().fold(0.0, f64::max)
        };
        let n = t_last.max(0.0).ceil() as usize;
        (0..=n).map(|i| i as f64).collect()
    }

    /// Frames longer than the spacing of mid-frame times are treated as boxcar
    /// acquisitions when tissue curves are sampled.
    pub fn frames_overlap(&self) -> bool {
        if self.len() < 3 {
            return false;
        }
        self.taus[2] > self.times_mid[2] - self.times_mid[1]
    }

    /// Interpolate the observed curve onto a uniform grid `0, dt, 2dt, … < t_end`.
    pub fn interp_to_grid(&self, dt: f64, t_end: f64) -> Result<(Vec<f64>, Vec<f64>), AppError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(AppError::config(format!("Invalid grid spacing dt={dt}.")));
        }
        let n = (t_end / dt).ceil().max(1.0) as usize;
        let grid: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let values = crate::math::interp(&grid, &self.times_mid, &self.rho);
        Ok((grid, values))
    }
}

/// Output of a forward-model evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Prediction on the measurement frames.
    pub predicted: Vec<f64>,
    /// Dense, unsampled curve (diagnostics).
    pub ideal: Vec<f64>,
    /// Times of `ideal`.
    pub ideal_times: Vec<f64>,
}

/// Posterior quantiles, one entry per parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    pub low: Vec<f64>,
    pub median: Vec<f64>,
    pub high: Vec<f64>,
}

/// Everything one region's fit produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitPackage {
    pub region: usize,
    pub logz: f64,
    pub information: f64,
    pub qm: Vec<f64>,
    pub ql: Vec<f64>,
    pub qh: Vec<f64>,
    pub rho_pred: Vec<f64>,
    /// `Σ(predicted − observed) / Σ observed`: signed net bias, not RMS.
    pub resid: f64,
    pub res: PosteriorResult,
}

/// Signed net-bias residual fraction.
pub fn residual_fraction(predicted: &[f64], observed: &[f64]) -> f64 {
    let num: f64 = predicted.iter().zip(observed).map(|(p, o)| p - o).sum();
    let den: f64 = observed.iter().sum();
    num / den
}
