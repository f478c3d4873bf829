//! Log-domain accumulation used by the evidence integrator.

/// `ln(e^a + e^b)` without overflow.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// `ln(e^a − e^b)` for `a ≥ b`; NaN when `b > a`.
pub fn log_sub_exp(a: f64, b: f64) -> f64 {
    if b > a {
        return f64::NAN;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    a + (-(b - a).exp()).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_matches_direct_sum() {
        let v = log_add_exp(1.0_f64.ln(), 3.0_f64.ln());
        assert!((v - 4.0_f64.ln()).abs() < 1e-12);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 2.0), 2.0);
    }

    #[test]
    fn add_survives_large_magnitudes() {
        let v = log_add_exp(-1e300, -1e300);
        assert!(v.is_finite());
        assert!((log_add_exp(1000.0, 1000.0) - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn sub_inverts_add() {
        let s = log_add_exp(0.5, -1.0);
        assert!((log_sub_exp(s, -1.0) - 0.5).abs() < 1e-12);
        assert!(log_sub_exp(0.0, 1.0).is_nan());
    }
}
