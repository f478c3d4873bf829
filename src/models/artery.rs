//! Arterial input-function model: three generalized-gamma boluses plus a
//! rising steady state, sampled the way the acquisition sampled it.

use serde::{Deserialize, Serialize};

use crate::domain::{Signal, TimeSeriesData, TracerClass};
use crate::math::{
    BolusParams, convolve_causal, four_bolus_mixture, interp, nan_max, windowed_average,
};
use crate::models::ForwardModel;
use crate::prior::{PriorTable, artery_table, boxcar_table};

pub const ARTERY_LABELS: [&str; 14] = [
    "t0", "tau2", "tau3", "alpha-1", "1/beta", "p", "delta p2", "delta p3", "1/gamma", "f2",
    "f3", "f_ss", "A", "sigma",
];

/// Index of the amplitude parameter.
const AMPLITUDE: usize = 12;

/// How the input function was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArteryKind {
    /// Image-derived input function; frames average over their duration.
    ImageDerived,
    /// Sampled arterial line (e.g. a coincidence counter on the radial artery).
    Sampled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArteryModel {
    kind: ArteryKind,
}

impl ArteryModel {
    pub fn new(kind: ArteryKind) -> Self {
        Self { kind }
    }

    pub fn image_derived() -> Self {
        Self::new(ArteryKind::ImageDerived)
    }

    pub fn sampled() -> Self {
        Self::new(ArteryKind::Sampled)
    }

    pub fn kind(&self) -> ArteryKind {
        self.kind
    }
}

impl ForwardModel for ArteryModel {
    fn name(&self) -> &'static str {
        match self.kind {
            ArteryKind::ImageDerived => "Boxcar",
            ArteryKind::Sampled => "RadialArtery",
        }
    }

    fn labels(&self) -> &'static [&'static str] {
        &ARTERY_LABELS
    }

    fn prior_table(&self, tracer: TracerClass) -> PriorTable {
        match self.kind {
            ArteryKind::ImageDerived => boxcar_table(),
            ArteryKind::Sampled => artery_table(tracer),
        }
    }

    fn signal(&self, params: &[f64], data: &TimeSeriesData) -> Signal {
        let ideal_times = data.ideal_times();
        let bolus = BolusParams::from_vector(params);
        let amplitude = params[AMPLITUDE];
        let ideal: Vec<f64> = four_bolus_mixture(&ideal_times, &bolus)
            .into_iter()
            .map(|v| amplitude * v)
            .collect();

        let sampled = if data.boxcar {
            windowed_average(&ideal, &data.frame_starts(), &data.frame_ends())
        } else if let Some(kernel) = &data.kernel {
            let dispersed = convolve_causal(&ideal, kernel);
            interp(&data.times_mid, &ideal_times, &dispersed)
        } else {
            interp(&data.times_mid, &ideal_times, &ideal)
        };

        // Unit peak of the ideal curve; the amplitude only matters relative to it.
        let scale = 1.0 / nan_max(&ideal);
        Signal {
            predicted: sampled.into_iter().map(|v| v * scale).collect(),
            ideal: ideal.into_iter().map(|v| v * scale).collect(),
            ideal_times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn truths() -> Vec<f64> {
        vec![
            15.7, 8.73, 14.77, 0.29, 3.04, 2.23, 0.0, 0.0, 53.11, 0.31, 0.1, 0.07, 1.98, 0.01,
        ]
    }

    fn frames(boxcar: bool) -> TimeSeriesData {
        let mut taus = vec![5.0; 12];
        taus.extend(vec![10.0; 10]);
        taus.extend(vec![20.0; 10]);
        let mut t = 0.0;
        let mut mid = Vec::new();
        for tau in &taus {
            mid.push(t + tau / 2.0);
            t += tau;
        }
        let n = mid.len();
        TimeSeriesData::new(mid, taus, vec![0.0; n], 122.2416)
            .unwrap()
            .with_boxcar(boxcar)
    }

    #[test]
    fn boxcar_signal_has_one_value_per_frame() {
        let data = frames(true);
        let s = ArteryModel::image_derived().signal(&truths(), &data);
        assert_eq!(s.predicted.len(), 32);
        assert_eq!(s.ideal.len(), s.ideal_times.len());
        let peak = s.ideal.iter().copied().fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-12);
        assert!(s.predicted.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
        // Frames before arrival see nothing.
        assert_eq!(s.predicted[0], 0.0);
        assert_eq!(s.predicted[2], 0.0);
    }

    #[test]
    fn unit_kernel_matches_plain_sampling() {
        let plain = frames(false);
        let kerneled = frames(false).with_kernel(vec![1.0]);
        let model = ArteryModel::sampled();
        let a = model.signal(&truths(), &plain);
        let b = model.signal(&truths(), &kerneled);
        assert_eq!(a.predicted, b.predicted);
    }

    #[test]
    fn dispersion_delays_the_peak() {
        let data = frames(false);
        let dispersed = frames(false).with_kernel(vec![0.0, 0.0, 0.0, 0.5, 0.5]);
        let model = ArteryModel::sampled();
        let a = model.signal(&truths(), &data);
        let b = model.signal(&truths(), &dispersed);
        let argmax = |v: &[f64]| {
            v.iter()
                .enumerate()
                .fold((0, f64::MIN), |acc, (i, &x)| if x > acc.1 { (i, x) } else { acc })
                .0
        };
        assert!(argmax(&b.predicted) >= argmax(&a.predicted));
        assert_ne!(a.predicted, b.predicted);
    }

    #[test]
    fn prior_table_follows_acquisition() {
        let idif = ArteryModel::image_derived().prior_table(TracerClass::Oxygen);
        let line = ArteryModel::sampled().prior_table(TracerClass::Oxygen);
        assert_eq!(idif.bounds(0), (5.0, 35.0));
        assert_eq!(line.bounds(0), (0.0, 60.0));
        assert_eq!(ArteryModel::sampled().ndim(), 14);
    }
}
