//! Synthetic input functions generated from known parameters score best at
//! those parameters.

use approx::assert_relative_eq;

use pet_kinetics::domain::{TimeSeriesData, TracerClass};
use pet_kinetics::fit::{LOGL_SENTINEL, Solver, log_likelihood};
use pet_kinetics::config::SolverConfig;
use pet_kinetics::models::{ARTERY_LABELS, ArteryModel, ForwardModel};

const TRUTHS: [f64; 14] = [
    15.7, 8.73, 14.77, 0.29, 3.04, 2.23, 0.0, 0.0, 53.11, 0.31, 0.1, 0.07, 1.98, 0.01,
];

/// 12 x 5 s, 10 x 10 s, 10 x 20 s.
fn frame_template() -> (Vec<f64>, Vec<f64>) {
    let taus: Vec<f64> = [vec![5.0; 12], vec![10.0; 10], vec![20.0; 10]].concat();
    let mut t = 0.0;
    let mut mid = Vec::with_capacity(taus.len());
    for tau in &taus {
        mid.push(t + tau / 2.0);
        t += tau;
    }
    (mid, taus)
}

fn synthetic(model: &ArteryModel, boxcar: bool, kernel: Option<Vec<f64>>) -> TimeSeriesData {
    let (mid, taus) = frame_template();
    let n = mid.len();
    let mut template = TimeSeriesData::new(mid, taus, vec![0.0; n], 122.2416)
        .unwrap()
        .with_boxcar(boxcar);
    if let Some(k) = kernel {
        template = template.with_kernel(k);
    }
    let rho = model.signal(&TRUTHS, &template).predicted;
    template.with_rho(rho).unwrap()
}

/// Coordinates whose perturbation changes the predicted curve. The amplitude
/// cancels under unit-peak normalization and the zero exponent offsets stay
/// zero when scaled.
fn informative() -> impl Iterator<Item = usize> {
    (0..TRUTHS.len()).filter(|&i| i != 12 && TRUTHS[i] != 0.0)
}

fn check_truths_are_preferred(model: ArteryModel, data: &TimeSeriesData) {
    let at_truth = log_likelihood(&model, &TRUTHS, data);
    let (_, taus) = frame_template();
    let perfect = -0.5 * taus.len() as f64 * (2.0 * std::f64::consts::PI * 0.01f64.powi(2)).ln();
    assert_relative_eq!(at_truth, perfect, max_relative = 1e-12);

    for i in informative() {
        let mut shifted = TRUTHS;
        shifted[i] *= 1.5;
        let logl = log_likelihood(&model, &shifted, data);
        assert!(logl > LOGL_SENTINEL);
        assert!(
            at_truth - logl > 0.1,
            "{} shifted by 50% scores {logl}, truth scores {at_truth}",
            ARTERY_LABELS[i]
        );
    }
}

#[test]
fn image_derived_truths_maximize_likelihood() {
    let model = ArteryModel::image_derived();
    let data = synthetic(&model, true, None);
    assert_eq!(data.len(), 32);
    check_truths_are_preferred(model, &data);
}

#[test]
fn sampled_truths_maximize_likelihood() {
    let model = ArteryModel::sampled();
    let data = synthetic(&model, false, Some(vec![0.2, 0.5, 0.3]));
    check_truths_are_preferred(model, &data);
}

#[test]
fn amplitude_cancels_under_normalization() {
    let model = ArteryModel::sampled();
    let data = synthetic(&model, false, None);
    let mut scaled = TRUTHS;
    scaled[12] *= 1.5;
    assert_relative_eq!(
        log_likelihood(&model, &scaled, &data),
        log_likelihood(&model, &TRUTHS, &data),
        max_relative = 1e-9
    );
}

#[test]
fn solver_loglike_matches_free_function() {
    let model = ArteryModel::image_derived();
    let data = synthetic(&model, true, None);
    let solver = Solver::new(
        model,
        data.clone(),
        TracerClass::Oxygen,
        SolverConfig::default().with_nlive(50),
    )
    .unwrap();
    assert_eq!(solver.loglike(&TRUTHS), log_likelihood(&model, &TRUTHS, &data));
    assert_eq!(solver.prior().ndim(), model.ndim());
}
