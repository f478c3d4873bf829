//! Result persistence.
//!
//! The fitting core only produces a keyed `ResultBundle`; a `ResultSink`
//! decides how it lands on disk. `JsonSink` writes one JSON file per key plus
//! a quantile table:
//!
//! - `<prefix>-<tag>-logz.json`, `-information.json`, `-resid.json`: one value per region
//! - `<prefix>-<tag>-qm.json`, `-ql.json`, `-qh.json`, `-rho_pred.json`: one row per region
//! - `<prefix>-<tag>-res.json`: raw posteriors (`null` for failed regions)
//! - `<prefix>-<tag>-quantiles.csv`
//!
//! NaN entries (failed regions) serialize as `null`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::Serialize;
use tracing::info;

use crate::domain::{BUNDLE_KEYS, BundleValue, ResultBundle};
use crate::error::AppError;
use crate::io::write_quantiles_csv;

pub trait ResultSink {
    fn persist(&self, bundle: &ResultBundle, tag: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct JsonSink {
    dir: PathBuf,
    prefix: String,
}

impl JsonSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Path of the artifact for `key` (`quantiles.csv` for the table).
    pub fn artifact_path(&self, tag: &str, key: &str) -> PathBuf {
        let stem = if tag.is_empty() {
            format!("{}-{key}", self.prefix)
        } else {
            format!("{}-{tag}-{key}", self.prefix)
        };
        let name = if key.contains('.') {
            stem
        } else {
            format!("{stem}.json")
        };
        self.dir.join(name)
    }
}

impl ResultSink for JsonSink {
    fn persist(&self, bundle: &ResultBundle, tag: &str) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)?;
        for key in BUNDLE_KEYS {
            let path = self.artifact_path(tag, key);
            match bundle.get(key) {
                Some(BundleValue::Vector(v)) => write_json(&path, &v)?,
                Some(BundleValue::Matrix(m)) => write_json(&path, &matrix_rows(m))?,
                Some(BundleValue::Posteriors(p)) => write_json(&path, &p)?,
                None => {}
            }
        }
        write_quantiles_csv(&self.artifact_path(tag, "quantiles.csv"), bundle)?;
        info!(dir = %self.dir.display(), prefix = %self.prefix, tag, "persisted result bundle");
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()?;
    Ok(())
}

fn matrix_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}
