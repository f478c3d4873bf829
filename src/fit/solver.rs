//! One region, one fit.
//!
//! A `Solver` binds a forward model, its prior table and one region's data to
//! a nested sampler, then turns the weighted posterior into a `FitPackage`:
//!
//! - log-evidence and information (final entries of the running series)
//! - 2.5 / 50 / 97.5 % weighted quantiles per parameter
//! - the predicted curve at the posterior median and its residual fraction

use std::path::Path;

use tracing::{info, info_span};

use crate::config::SolverConfig;
use crate::domain::{FitPackage, Quantiles, TimeSeriesData, TracerClass, residual_fraction};
use crate::error::AppError;
use crate::fit::{LOGL_SENTINEL, log_likelihood};
use crate::math::interp;
use crate::models::ForwardModel;
use crate::prior::PriorTable;
use crate::sampler::{NestedSampler, PosteriorResult, Sampler};

/// Reported quantiles, as fractions.
pub const DEFAULT_QUANTILES: [f64; 3] = [0.025, 0.5, 0.975];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Configured,
    Resuming,
    Running,
    Completed,
    Failed,
}

pub struct Solver<M: ForwardModel> {
    model: M,
    data: TimeSeriesData,
    tracer: TracerClass,
    prior: PriorTable,
    config: SolverConfig,
    state: SolverState,
}

impl<M: ForwardModel> Solver<M> {
    pub fn new(
        model: M,
        data: TimeSeriesData,
        tracer: TracerClass,
        config: SolverConfig,
    ) -> Result<Self, AppError> {
        config.validate()?;
        if data.is_empty() {
            return Err(AppError::config("No frames to fit."));
        }
        let prior = model.prior_table(tracer);
        if prior.ndim() != model.ndim() {
            return Err(AppError::config(format!(
                "{} prior has {} coordinates, model has {} parameters.",
                model.name(),
                prior.ndim(),
                model.ndim()
            )));
        }
        Ok(Self {
            model,
            data,
            tracer,
            prior,
            config,
            state: SolverState::Configured,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn data(&self) -> &TimeSeriesData {
        &self.data
    }

    pub fn prior(&self) -> &PriorTable {
        &self.prior
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn loglike(&self, params: &[f64]) -> f64 {
        log_likelihood(&self.model, params, &self.data)
    }

    /// Run the sampler to completion and return its weighted posterior.
    ///
    /// With `resume`, the sampler is rebuilt from `checkpoint`; a missing path
    /// or file is an error rather than a silent fresh start.
    pub fn run(
        &mut self,
        checkpoint: Option<&Path>,
        resume: bool,
        print_progress: bool,
    ) -> Result<PosteriorResult, AppError> {
        let outcome = self.run_inner(checkpoint, resume, print_progress);
        self.state = match outcome {
            Ok(_) => SolverState::Completed,
            Err(_) => SolverState::Failed,
        };
        outcome
    }

    fn run_inner(
        &mut self,
        checkpoint: Option<&Path>,
        resume: bool,
        print_progress: bool,
    ) -> Result<PosteriorResult, AppError> {
        let model = &self.model;
        let data = &self.data;
        let prior = &self.prior;
        let loglike = |v: &[f64]| log_likelihood(model, v, data);
        let transform = |u: &[f64]| prior.transform(u);

        let mut sampler = if resume {
            let path = checkpoint.ok_or_else(|| AppError::Resume {
                path: Default::default(),
                reason: "resume requested without a checkpoint path".to_string(),
            })?;
            self.state = SolverState::Resuming;
            NestedSampler::restore(path, loglike, transform, model.ndim(), &self.config)?
        } else {
            NestedSampler::new(loglike, transform, model.ndim(), &self.config)?
        };

        self.state = SolverState::Running;
        info!(
            model = model.name(),
            tracer = self.tracer.display_name(),
            method = %self.config.method,
            nlive = self.config.nlive,
            seed = self.config.seed,
            resume,
            "nested sampling started"
        );
        sampler.run(checkpoint, false, print_progress)?;
        let result = sampler.results()?;
        info!(
            model = model.name(),
            niter = result.niter,
            ncall = result.ncall,
            logz = result.logz_final(),
            logz_err = result.logz_err(),
            information = result.information_final(),
            ess = result.effective_sample_size(),
            "nested sampling finished"
        );
        Ok(result)
    }

    /// Summarize a posterior for region `region`.
    pub fn package(&self, region: usize, result: PosteriorResult) -> Result<FitPackage, AppError> {
        let aggregation = |reason: String| AppError::Aggregation { region, reason };
        let q = quantile(&result, &DEFAULT_QUANTILES).map_err(|e| aggregation(e.to_string()))?;
        if q.median.len() != self.model.ndim() {
            return Err(aggregation(format!(
                "posterior has {} parameters, model has {}",
                q.median.len(),
                self.model.ndim()
            )));
        }
        let signal = self.model.signal(&q.median, &self.data);
        let resid = residual_fraction(&signal.predicted, &self.data.rho);
        Ok(FitPackage {
            region,
            logz: result.logz_final(),
            information: result.information_final(),
            qm: q.median,
            ql: q.low,
            qh: q.high,
            rho_pred: signal.predicted,
            resid,
            res: result,
        })
    }

    /// `run` then `package`.
    pub fn fit(
        &mut self,
        region: usize,
        checkpoint: Option<&Path>,
        resume: bool,
        print_progress: bool,
    ) -> Result<FitPackage, AppError> {
        let _span = info_span!("region", region).entered();
        let result = self.run(checkpoint, resume, print_progress)?;
        self.package(region, result)
    }
}

/// Per-parameter weighted quantiles at `fractions` (low, median, high).
///
/// A posterior whose weight sits on one sample returns that sample for all
/// three. An empty posterior, or one where every sample sits on the
/// likelihood floor, has no usable weights.
pub fn quantile(result: &PosteriorResult, fractions: &[f64; 3]) -> Result<Quantiles, AppError> {
    if result.is_empty() {
        return Err(AppError::NumericDegeneracy("posterior has no samples".to_string()));
    }
    if result.logl.iter().all(|&l| !(l > LOGL_SENTINEL)) {
        return Err(AppError::NumericDegeneracy(
            "no sample scored above the likelihood floor".to_string(),
        ));
    }
    if fractions.iter().any(|q| !(0.0..=1.0).contains(q)) {
        return Err(AppError::config(format!(
            "Quantile fractions must lie in [0, 1]: {fractions:?}."
        )));
    }
    let weights = result.importance_weights();
    let ndim = result.ndim();
    let mut out = Quantiles {
        low: Vec::with_capacity(ndim),
        median: Vec::with_capacity(ndim),
        high: Vec::with_capacity(ndim),
    };
    for d in 0..ndim {
        let column: Vec<f64> = result.samples.iter().map(|s| s[d]).collect();
        out.low.push(weighted_quantile(&column, fractions[0], &weights));
        out.median.push(weighted_quantile(&column, fractions[1], &weights));
        out.high.push(weighted_quantile(&column, fractions[2], &weights));
    }
    Ok(out)
}

/// Weighted quantile by linear interpolation of the sorted weighted CDF.
///
/// The CDF starts at 0 on the smallest sample and reaches 1 on the largest
/// one, excluding the largest sample's own weight.
pub fn weighted_quantile(x: &[f64], q: f64, weights: &[f64]) -> f64 {
    let n = x.len().min(weights.len());
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return x[0];
    }
    if let Some(i) = dominant(&weights[..n]) {
        return x[i];
    }

    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
    let sorted_x: Vec<f64> = idx.iter().map(|&i| x[i]).collect();

    let mut cdf = Vec::with_capacity(n);
    cdf.push(0.0);
    let mut running = 0.0;
    for &i in &idx[..n - 1] {
        running += weights[i];
        cdf.push(running);
    }
    if !(running > 0.0) {
        return sorted_x[n - 1];
    }
    cdf.iter_mut().skip(1).for_each(|c| *c /= running);

    interp(&[q], &cdf, &sorted_x)[0]
}

fn dominant(weights: &[f64]) -> Option<usize> {
    weights
        .iter()
        .position(|&w| w >= 1.0 - 1e-12)
}
