//! Row-aligned aggregate of per-region fits.
//!
//! Row `i` of every array corresponds to input region `i`. Regions whose fit
//! failed keep their row, filled with NaN (and `None` in `res`), so downstream
//! image-shaped writers never have to re-index.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::FitPackage;
use crate::error::AppError;
use crate::sampler::PosteriorResult;

/// Keys understood by the persistence collaborator.
pub const BUNDLE_KEYS: [&str; 8] = [
    "logz",
    "information",
    "qm",
    "ql",
    "qh",
    "rho_pred",
    "resid",
    "res",
];

/// Result of one region's fit, tagged with its input index.
#[derive(Debug)]
pub struct RegionOutcome {
    pub region: usize,
    pub result: Result<FitPackage, AppError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFailure {
    pub region: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBundle {
    pub labels: Vec<String>,
    pub logz: Vec<f64>,
    pub information: Vec<f64>,
    /// regions × parameters
    pub qm: DMatrix<f64>,
    pub ql: DMatrix<f64>,
    pub qh: DMatrix<f64>,
    /// regions × frames
    pub rho_pred: DMatrix<f64>,
    pub resid: Vec<f64>,
    pub res: Vec<Option<PosteriorResult>>,
    pub failures: Vec<RegionFailure>,
}

/// Borrowed view of one bundle entry.
#[derive(Debug, Clone, Copy)]
pub enum BundleValue<'a> {
    Vector(&'a [f64]),
    Matrix(&'a DMatrix<f64>),
    Posteriors(&'a [Option<PosteriorResult>]),
}

impl ResultBundle {
    /// Stack region outcomes into row-aligned arrays.
    ///
    /// A region whose package is malformed (wrong parameter or frame count) is
    /// treated like a failed fit: logged, NaN-filled, and listed in `failures`.
    pub fn assemble(
        labels: &[&str],
        n_frames: usize,
        mut outcomes: Vec<RegionOutcome>,
    ) -> ResultBundle {
        outcomes.sort_by_key(|o| o.region);
        let n_regions = outcomes.iter().map(|o| o.region + 1).max().unwrap_or(0);
        let ndim = labels.len();

        let mut bundle = ResultBundle {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            logz: vec![f64::NAN; n_regions],
            information: vec![f64::NAN; n_regions],
            qm: DMatrix::from_element(n_regions, ndim, f64::NAN),
            ql: DMatrix::from_element(n_regions, ndim, f64::NAN),
            qh: DMatrix::from_element(n_regions, ndim, f64::NAN),
            rho_pred: DMatrix::from_element(n_regions, n_frames, f64::NAN),
            resid: vec![f64::NAN; n_regions],
            res: vec![None; n_regions],
            failures: Vec::new(),
        };

        for outcome in outcomes {
            let region = outcome.region;
            let placed = outcome
                .result
                .and_then(|package| bundle.place(region, ndim, n_frames, package));
            if let Err(err) = placed {
                error!(region, error = %err, "region dropped from result bundle");
                bundle.failures.push(RegionFailure {
                    region,
                    reason: err.to_string(),
                });
            }
        }

        bundle
    }

    fn place(
        &mut self,
        region: usize,
        ndim: usize,
        n_frames: usize,
        package: FitPackage,
    ) -> Result<(), AppError> {
        let missing = |what: &str, got: usize, want: usize| AppError::Aggregation {
            region,
            reason: format!("{what} has {got} entries, expected {want}"),
        };
        for (name, q) in [("qm", &package.qm), ("ql", &package.ql), ("qh", &package.qh)] {
            if q.len() != ndim {
                return Err(missing(name, q.len(), ndim));
            }
        }
        if package.rho_pred.len() != n_frames {
            return Err(missing("rho_pred", package.rho_pred.len(), n_frames));
        }

        self.logz[region] = package.logz;
        self.information[region] = package.information;
        for j in 0..ndim {
            self.qm[(region, j)] = package.qm[j];
            self.ql[(region, j)] = package.ql[j];
            self.qh[(region, j)] = package.qh[j];
        }
        for j in 0..n_frames {
            self.rho_pred[(region, j)] = package.rho_pred[j];
        }
        self.resid[region] = package.resid;
        self.res[region] = Some(package.res);
        Ok(())
    }

    pub fn n_regions(&self) -> usize {
        self.logz.len()
    }

    /// Indices of regions that produced a result, in input order.
    pub fn succeeded(&self) -> Vec<usize> {
        self.res
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|_| i))
            .collect()
    }

    /// Keyed view matching `BUNDLE_KEYS`.
    pub fn get(&self, key: &str) -> Option<BundleValue<'_>> {
        match key {
            "logz" => Some(BundleValue::Vector(&self.logz)),
            "information" => Some(BundleValue::Vector(&self.information)),
            "qm" => Some(BundleValue::Matrix(&self.qm)),
            "ql" => Some(BundleValue::Matrix(&self.ql)),
            "qh" => Some(BundleValue::Matrix(&self.qh)),
            "rho_pred" => Some(BundleValue::Matrix(&self.rho_pred)),
            "resid" => Some(BundleValue::Vector(&self.resid)),
            "res" => Some(BundleValue::Posteriors(&self.res)),
            _ => None,
        }
    }
}
