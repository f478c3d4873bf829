//! Resampling operators between the dense 1-s grid and acquisition frames.

/// Maximum that propagates NaN (unlike `f64::max`).
pub fn nan_max(values: &[f64]) -> f64 {
    values.iter().fold(f64::NEG_INFINITY, |m, &v| {
        if m.is_nan() || v.is_nan() { f64::NAN } else { m.max(v) }
    })
}

/// Mean of `curve` over each frame's sample window.
///
/// Frame `i` averages indices `[trunc(start_i), trunc(end_i))`, clamped to the
/// curve. The dense curve is assumed to hold one sample per second starting at
/// t = 0, so times double as indices. An empty window averages to NaN.
pub fn windowed_average(curve: &[f64], frame_start: &[f64], frame_end: &[f64]) -> Vec<f64> {
    frame_start
        .iter()
        .zip(frame_end)
        .map(|(&t0, &tf)| {
            let lo = (t0.max(0.0) as usize).min(curve.len());
            let hi = (tf.max(0.0) as usize).min(curve.len());
            if hi <= lo {
                return f64::NAN;
            }
            let window = &curve[lo..hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Causal discrete convolution, truncated to the length of `signal`.
pub fn convolve_causal(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let mut out = vec![0.0; n];
    for (i, o) in out.iter_mut().enumerate() {
        let kmax = kernel.len().min(i + 1);
        let mut acc = 0.0;
        for (k, kv) in kernel.iter().enumerate().take(kmax) {
            acc += kv * signal[i - k];
        }
        *o = acc;
    }
    out
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be increasing. Outside its range the end values are held.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    if xp.is_empty() {
        return vec![f64::NAN; x.len()];
    }
    let last = xp.len() - 1;
    x.iter()
        .map(|&xi| {
            if xi <= xp[0] {
                return fp[0];
            }
            if xi >= xp[last] {
                return fp[last];
            }
            // First knot strictly greater than xi.
            let hi = xp.partition_point(|&v| v <= xi);
            let lo = hi - 1;
            let span = xp[hi] - xp[lo];
            if span.abs() < 1e-12 {
                return fp[lo];
            }
            let u = (xi - xp[lo]) / span;
            fp[lo] + u * (fp[hi] - fp[lo])
        })
        .collect()
}
