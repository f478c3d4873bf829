//! Parallel fan-out over regions.
//!
//! Every region gets its own solver, its own data and its own checkpoint
//! file; workers share nothing mutable. Results are re-associated with their
//! region index before stacking, and a failing region only costs its own row.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::info;

use crate::config::{FanOutConfig, SolverConfig};
use crate::domain::{FitPackage, RegionOutcome, ResultBundle, TimeSeriesData, TracerClass};
use crate::error::AppError;
use crate::fit::Solver;
use crate::input::Measurement;
use crate::models::ForwardModel;

pub struct FanOut {
    regions: Vec<TimeSeriesData>,
    tag: String,
    config: FanOutConfig,
}

impl FanOut {
    /// One fit per row of `measurement`, each normalized by the global peak.
    pub fn new(measurement: &Measurement, tag: &str, config: FanOutConfig) -> Result<Self, AppError> {
        Self::from_regions(measurement.normalized_regions()?, tag, config)
    }

    pub fn from_regions(
        regions: Vec<TimeSeriesData>,
        tag: &str,
        config: FanOutConfig,
    ) -> Result<Self, AppError> {
        let Some(first) = regions.first() else {
            return Err(AppError::config("No region data to fit."));
        };
        let n_frames = first.len();
        if let Some(bad) = regions.iter().position(|r| r.len() != n_frames) {
            return Err(AppError::config(format!(
                "Region {bad} has {} frames, region 0 has {n_frames}.",
                regions[bad].len()
            )));
        }
        Ok(Self {
            regions,
            tag: tag.to_string(),
            config,
        })
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn n_frames(&self) -> usize {
        self.regions.first().map_or(0, TimeSeriesData::len)
    }

    pub fn regions(&self) -> &[TimeSeriesData] {
        &self.regions
    }

    /// `<dir>/<tag>-region<NNNN>.checkpoint.json`, one file per region.
    pub fn checkpoint_path(&self, region: usize) -> Option<PathBuf> {
        self.config
            .checkpoint_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-region{region:04}.checkpoint.json", self.tag)))
    }

    /// Run `fit_fn` for every region on the worker pool and stack the results.
    ///
    /// Errors (and panics) inside `fit_fn` are confined to their region.
    pub fn run_with<F>(&self, labels: &[&str], fit_fn: F) -> Result<ResultBundle, AppError>
    where
        F: Fn(usize, TimeSeriesData) -> Result<FitPackage, AppError> + Sync,
    {
        let workers = self.config.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| AppError::config(format!("Cannot start {workers} workers: {e}")))?;

        info!(
            tag = %self.tag,
            regions = self.n_regions(),
            workers,
            "fan-out started"
        );

        let outcomes: Vec<RegionOutcome> = pool.install(|| {
            self.regions
                .par_iter()
                .enumerate()
                .map(|(region, data)| {
                    let result = catch_unwind(AssertUnwindSafe(|| fit_fn(region, data.clone())))
                        .unwrap_or_else(|panic| Err(AppError::Sampler(panic_message(&*panic))));
                    RegionOutcome { region, result }
                })
                .collect()
        });

        let bundle = ResultBundle::assemble(labels, self.n_frames(), outcomes);
        info!(
            tag = %self.tag,
            succeeded = bundle.succeeded().len(),
            failed = bundle.failures.len(),
            "fan-out finished"
        );
        Ok(bundle)
    }

    /// Fit `model` to every region with a fresh solver per region.
    pub fn run_model<M>(
        &self,
        model: &M,
        tracer: TracerClass,
        solver: &SolverConfig,
    ) -> Result<ResultBundle, AppError>
    where
        M: ForwardModel + Clone,
    {
        solver.validate()?;
        self.run_with(model.labels(), |region, data| {
            let checkpoint = self.checkpoint_path(region);
            let mut s = Solver::new(model.clone(), data, tracer, solver.clone())?;
            s.fit(
                region,
                checkpoint.as_deref(),
                self.config.resume,
                self.config.print_progress,
            )
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("region fit panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::PosteriorResult;

    fn regions(n: usize) -> Vec<TimeSeriesData> {
        (0..n)
            .map(|r| {
                TimeSeriesData::new(
                    vec![5.0, 15.0, 25.0],
                    vec![10.0; 3],
                    vec![r as f64, 1.0, 0.5],
                    122.24,
                )
                .unwrap()
            })
            .collect()
    }

    fn package(region: usize, data: &TimeSeriesData) -> FitPackage {
        FitPackage {
            region,
            logz: -(region as f64),
            information: 1.0,
            qm: vec![region as f64],
            ql: vec![region as f64 - 0.5],
            qh: vec![region as f64 + 0.5],
            rho_pred: data.rho.clone(),
            resid: 0.0,
            res: PosteriorResult::single(vec![0.5], vec![region as f64], 0.0),
        }
    }

    #[test]
    fn checkpoint_paths_are_per_region() {
        let cfg = FanOutConfig {
            checkpoint_dir: Some(PathBuf::from("/tmp/ck")),
            ..FanOutConfig::default()
        };
        let f = FanOut::from_regions(regions(2), "Boxcar", cfg).unwrap();
        assert_eq!(
            f.checkpoint_path(7).unwrap(),
            PathBuf::from("/tmp/ck/Boxcar-region0007.checkpoint.json")
        );
        assert_ne!(f.checkpoint_path(0), f.checkpoint_path(1));

        let none = FanOut::from_regions(regions(1), "x", FanOutConfig::default()).unwrap();
        assert!(none.checkpoint_path(0).is_none());
    }

    #[test]
    fn rows_follow_region_index() {
        let cfg = FanOutConfig {
            workers: Some(3),
            ..FanOutConfig::default()
        };
        let f = FanOut::from_regions(regions(6), "t", cfg).unwrap();
        let bundle = f
            .run_with(&["c"], |region, data| {
                // Finish out of order.
                std::thread::sleep(std::time::Duration::from_millis((6 - region as u64) * 5));
                Ok(package(region, &data))
            })
            .unwrap();
        for r in 0..6 {
            assert_eq!(bundle.qm[(r, 0)], r as f64);
            assert_eq!(bundle.rho_pred[(r, 0)], r as f64);
        }
    }

    #[test]
    fn panicking_region_is_confined() {
        let f = FanOut::from_regions(regions(3), "t", FanOutConfig::default()).unwrap();
        let bundle = f
            .run_with(&["c"], |region, data| {
                if region == 1 {
                    panic!("boom");
                }
                Ok(package(region, &data))
            })
            .unwrap();
        assert_eq!(bundle.succeeded(), vec![0, 2]);
        assert!(bundle.failures[0].reason.contains("boom"));
    }

    #[test]
    fn empty_or_ragged_regions_rejected() {
        assert!(FanOut::from_regions(Vec::new(), "t", FanOutConfig::default()).is_err());
        let mut rs = regions(2);
        rs[1] = TimeSeriesData::new(vec![1.0], vec![1.0], vec![1.0], 1.0).unwrap();
        assert!(FanOut::from_regions(rs, "t", FanOutConfig::default()).is_err());
    }
}
