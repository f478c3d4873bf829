//! Formatted text output.
//!
//! Formatting lives here so the fitting code stays free of presentation
//! details and output changes stay localized.

use nalgebra::DMatrix;

use crate::domain::ResultBundle;

/// One line per parameter: `Parameter <label>: qm [ql, qh]`.
///
/// Labels are padded to a common width; magnitudes of 1000 or more drop to
/// one decimal.
pub fn format_quantiles(labels: &[&str], qm: &[f64], ql: &[f64], qh: &[f64]) -> String {
    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for (i, label) in labels.iter().enumerate() {
        let (Some(&m), Some(&l), Some(&h)) = (qm.get(i), ql.get(i), qh.get(i)) else {
            break;
        };
        out.push_str(&format!(
            "Parameter {label:<width$}: {} [{}, {}]\n",
            fmt_q(m),
            fmt_q(l),
            fmt_q(h)
        ));
    }
    out
}

/// Region table for a finished batch, the quantiles of every fitted region,
/// then the failure list.
pub fn format_bundle_summary(bundle: &ResultBundle, tag: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== {tag}: {} of {} regions fitted ===\n",
        bundle.succeeded().len(),
        bundle.n_regions()
    ));
    out.push_str(
        format!("{:>6} {:>12} {:>12} {:>10}\n", "region", "logz", "information", "resid").trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:->6} {:->12} {:->12} {:->10}\n", "", "", "", "").trim_end());
    out.push('\n');

    for r in 0..bundle.n_regions() {
        if bundle.res[r].is_none() {
            out.push_str(&format!("{r:>6} {:>12} {:>12} {:>10}\n", "failed", "-", "-"));
            continue;
        }
        out.push_str(&format!(
            "{r:>6} {:>12.4} {:>12.4} {:>10.4}\n",
            bundle.logz[r], bundle.information[r], bundle.resid[r]
        ));
    }

    let labels: Vec<&str> = bundle.labels.iter().map(String::as_str).collect();
    for r in bundle.succeeded() {
        let row = |m: &DMatrix<f64>| m.row(r).iter().copied().collect::<Vec<f64>>();
        out.push_str(&format!("\nRegion {r}:\n"));
        out.push_str(&format_quantiles(
            &labels,
            &row(&bundle.qm),
            &row(&bundle.ql),
            &row(&bundle.qh),
        ));
    }

    if !bundle.failures.is_empty() {
        out.push_str("\nFailures:\n");
        for f in &bundle.failures {
            out.push_str(&format!("- region {}: {}\n", f.region, f.reason));
        }
    }
    out
}

fn fmt_q(v: f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.4}")
    }
}
