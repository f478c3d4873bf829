//! Export per-region quantiles to CSV.
//!
//! One row per (region, parameter); failed regions are skipped so the file
//! loads cleanly in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ResultBundle;
use crate::error::AppError;

pub fn write_quantiles_csv(path: &Path, bundle: &ResultBundle) -> Result<(), AppError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "region,label,qm,ql,qh,logz,information,resid")?;

    for region in bundle.succeeded() {
        for (j, label) in bundle.labels.iter().enumerate() {
            writeln!(
                out,
                "{},{},{:.10},{:.10},{:.10},{:.6},{:.6},{:.6}",
                region,
                label,
                bundle.qm[(region, j)],
                bundle.ql[(region, j)],
                bundle.qh[(region, j)],
                bundle.logz[region],
                bundle.information[region],
                bundle.resid[region],
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
