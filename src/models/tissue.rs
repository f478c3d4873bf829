//! One-tissue compartment model driven by a fitted or measured input function.
//!
//! `C_T(t) = K1 · (C_A(t − Δt) ⊛ e^{−k2 t})`, evaluated on a 1-s grid. The model
//! holds its input function by value, so tissue fits over many regions share
//! nothing mutable.

use crate::domain::{Signal, TimeSeriesData, TracerClass};
use crate::error::AppError;
use crate::math::{convolve_causal, interp, windowed_average};
use crate::models::ForwardModel;
use crate::prior::{PriorTable, one_tissue_table};

pub const ONE_TISSUE_LABELS: [&str; 4] = ["K1", "k2", "delta t", "sigma"];

/// Grid spacing (s). Boxcar averaging treats grid indices as seconds.
const DT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OneTissueModel {
    times: Vec<f64>,
    input: Vec<f64>,
}

impl OneTissueModel {
    /// Resample `input` onto a 1-s grid long enough to cover every frame of `tissue`.
    pub fn new(input: &TimeSeriesData, tissue: &TimeSeriesData) -> Result<Self, AppError> {
        let t_end = tissue
            .frame_ends()
            .into_iter()
            .chain(tissue.times_mid.iter().copied())
            .fold(0.0, f64::max)
            .ceil()
            + DT;
        let (times, input) = input.interp_to_grid(DT, t_end)?;
        Ok(Self { times, input })
    }

    pub fn input(&self) -> &[f64] {
        &self.input
    }
}

impl ForwardModel for OneTissueModel {
    fn name(&self) -> &'static str {
        "OneTissue"
    }

    fn labels(&self) -> &'static [&'static str] {
        &ONE_TISSUE_LABELS
    }

    fn prior_table(&self, _tracer: TracerClass) -> PriorTable {
        one_tissue_table()
    }

    fn signal(&self, params: &[f64], data: &TimeSeriesData) -> Signal {
        let (k1, k2, delay) = (params[0], params[1], params[2]);

        let shifted_times: Vec<f64> = self.times.iter().map(|t| t - delay).collect();
        let arterial = interp(&shifted_times, &self.times, &self.input);
        let response: Vec<f64> = self
            .times
            .iter()
            .map(|t| k1 * (-k2 * t).exp() * DT)
            .collect();
        let ideal = convolve_causal(&arterial, &response);

        let predicted = if data.boxcar || data.frames_overlap() {
            windowed_average(&ideal, &data.frame_starts(), &data.frame_ends())
        } else {
            interp(&data.times_mid, &self.times, &ideal)
        };

        Signal {
            predicted,
            ideal,
            ideal_times: self.times.clone(),
        }
    }
}
