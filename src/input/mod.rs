//! Measurements and input-function sources.
//!
//! A `Measurement` is what the (external) loader hands over: frame timing,
//! a region x frame signal matrix, a half-life and optionally a dispersion
//! kernel. Input-function sources turn one into the `TimeSeriesData` a fit
//! consumes; the acquisition method decides how frames are sampled.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::TimeSeriesData;
use crate::error::AppError;
use crate::models::ArteryModel;

/// Externally loaded, decay-corrected measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub times_mid: Vec<f64>,
    pub taus: Vec<f64>,
    /// Regions x frames. A single time series is one row.
    pub img: DMatrix<f64>,
    pub halflife: f64,
    pub kernel: Option<Vec<f64>>,
}

impl Measurement {
    pub fn new(
        times_mid: Vec<f64>,
        taus: Vec<f64>,
        img: DMatrix<f64>,
        halflife: f64,
    ) -> Result<Self, AppError> {
        if img.nrows() == 0 {
            return Err(AppError::config("Measurement has no region data."));
        }
        if img.ncols() != times_mid.len() || taus.len() != times_mid.len() {
            return Err(AppError::config(format!(
                "Measurement shape mismatch: img has {} frames, times_mid={}, taus={}.",
                img.ncols(),
                times_mid.len(),
                taus.len()
            )));
        }
        if !(halflife.is_finite() && halflife > 0.0) {
            return Err(AppError::config(format!("Invalid half-life {halflife}.")));
        }
        Ok(Self {
            times_mid,
            taus,
            img,
            halflife,
            kernel: None,
        })
    }

    /// One region's time series.
    pub fn from_series(
        times_mid: Vec<f64>,
        taus: Vec<f64>,
        values: Vec<f64>,
        halflife: f64,
    ) -> Result<Self, AppError> {
        let img = DMatrix::from_row_slice(1, values.len(), &values);
        Self::new(times_mid, taus, img, halflife)
    }

    pub fn with_kernel(mut self, kernel: Vec<f64>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn n_regions(&self) -> usize {
        self.img.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.img.ncols()
    }

    /// Largest finite sample over every region and frame; `-inf` when there
    /// is none.
    pub fn peak(&self) -> f64 {
        self.img
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn checked_peak(&self) -> Result<f64, AppError> {
        let peak = self.peak();
        if peak.is_finite() && peak > 0.0 {
            Ok(peak)
        } else {
            Err(AppError::config(format!(
                "Measurement peak is {peak}; cannot normalize."
            )))
        }
    }

    /// Region `region` divided by `scale`.
    pub fn region_series(&self, region: usize, scale: f64) -> Result<TimeSeriesData, AppError> {
        if region >= self.n_regions() {
            return Err(AppError::config(format!(
                "Region {region} out of range (measurement has {}).",
                self.n_regions()
            )));
        }
        let rho: Vec<f64> = self.img.row(region).iter().map(|v| v / scale).collect();
        TimeSeriesData::new(self.times_mid.clone(), self.taus.clone(), rho, self.halflife)
    }

    /// Every region scaled by the global peak, so relative amplitudes between
    /// regions survive normalization.
    pub fn normalized_regions(&self) -> Result<Vec<TimeSeriesData>, AppError> {
        let peak = self.checked_peak()?;
        (0..self.n_regions())
            .map(|r| self.region_series(r, peak))
            .collect()
    }
}

/// Where an input function comes from and how its frames were acquired.
pub trait InputFunctionSource {
    fn measurement(&self) -> &Measurement;

    /// Input-function samples divided by `scale`, flagged for the acquisition.
    fn series_scaled(&self, scale: f64) -> Result<TimeSeriesData, AppError>;

    /// Forward model to fit this input function with, if it is fitted at all.
    fn artery_model(&self) -> Option<ArteryModel>;

    /// Normalized to unit maximum.
    fn series(&self) -> Result<TimeSeriesData, AppError> {
        let peak = self.measurement().checked_peak()?;
        self.series_scaled(peak)
    }
}

fn single_row(m: &Measurement, kind: &str) -> Result<(), AppError> {
    if m.n_regions() != 1 {
        return Err(AppError::config(format!(
            "{kind} input function must be a single time series (got {} rows).",
            m.n_regions()
        )));
    }
    Ok(())
}

/// Image-derived input function; frames integrate over their duration.
#[derive(Debug, Clone)]
pub struct BoxcarSource {
    measurement: Measurement,
}

impl BoxcarSource {
    pub fn new(measurement: Measurement) -> Result<Self, AppError> {
        single_row(&measurement, "Boxcar")?;
        Ok(Self { measurement })
    }
}

impl InputFunctionSource for BoxcarSource {
    fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    fn series_scaled(&self, scale: f64) -> Result<TimeSeriesData, AppError> {
        Ok(self.measurement.region_series(0, scale)?.with_boxcar(true))
    }

    fn artery_model(&self) -> Option<ArteryModel> {
        Some(ArteryModel::image_derived())
    }
}

/// Sampled arterial line, blurred by a catheter dispersion kernel.
#[derive(Debug, Clone)]
pub struct KernelSource {
    measurement: Measurement,
    kernel: Vec<f64>,
}

impl KernelSource {
    /// The kernel is rescaled to unit sum.
    pub fn new(measurement: Measurement) -> Result<Self, AppError> {
        single_row(&measurement, "Sampled arterial")?;
        let raw = measurement
            .kernel
            .as_ref()
            .ok_or_else(|| AppError::config("Sampled arterial input needs a dispersion kernel."))?;
        let total: f64 = raw.iter().sum();
        if raw.is_empty() || !(total.is_finite() && total > 0.0) {
            return Err(AppError::config(format!(
                "Dispersion kernel must have a positive finite sum (got {total})."
            )));
        }
        let kernel = raw.iter().map(|k| k / total).collect();
        Ok(Self {
            measurement,
            kernel,
        })
    }

    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }
}

impl InputFunctionSource for KernelSource {
    fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    fn series_scaled(&self, scale: f64) -> Result<TimeSeriesData, AppError> {
        Ok(self
            .measurement
            .region_series(0, scale)?
            .with_kernel(self.kernel.clone()))
    }

    fn artery_model(&self) -> Option<ArteryModel> {
        Some(ArteryModel::sampled())
    }
}

/// Already decay-corrected samples used as-is.
#[derive(Debug, Clone)]
pub struct TrivialSource {
    measurement: Measurement,
}

impl TrivialSource {
    pub fn new(measurement: Measurement) -> Result<Self, AppError> {
        single_row(&measurement, "Trivial")?;
        Ok(Self { measurement })
    }
}

impl InputFunctionSource for TrivialSource {
    fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    fn series_scaled(&self, scale: f64) -> Result<TimeSeriesData, AppError> {
        self.measurement.region_series(0, scale)
    }

    fn artery_model(&self) -> Option<ArteryModel> {
        None
    }
}
