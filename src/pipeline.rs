//! Shared fit workflows.
//!
//! Front-ends (scripts, a future CLI) call these instead of wiring solvers by
//! hand:
//!
//! - input function: source → artery model → one-region fan-out
//! - tissue: input function + region matrix → one-tissue model → fan-out
//!
//! Persisting the resulting bundle is left to a `ResultSink`.

use std::path::Path;

use tracing::info;

use crate::config::{FanOutConfig, SolverConfig, tracer_from_path};
use crate::domain::{ResultBundle, TracerClass};
use crate::error::AppError;
use crate::fit::FanOut;
use crate::input::{InputFunctionSource, Measurement};
use crate::io::ResultSink;
use crate::models::{ForwardModel, OneTissueModel};
use crate::report::format_bundle_summary;

/// Solver and fan-out settings for one workflow run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSettings {
    pub solver: SolverConfig,
    pub fanout: FanOutConfig,
}

impl RunSettings {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            solver: SolverConfig::from_env()?,
            fanout: FanOutConfig::from_env()?,
        })
    }
}

/// Fit the input function's own forward model.
///
/// The bundle tag is the model name (`Boxcar` or `RadialArtery`).
pub fn fit_input_function(
    source: &dyn InputFunctionSource,
    tracer: TracerClass,
    settings: &RunSettings,
) -> Result<ResultBundle, AppError> {
    let model = source
        .artery_model()
        .ok_or_else(|| AppError::config("This input function is used as measured; there is nothing to fit."))?;
    let data = source.series()?;
    FanOut::from_regions(vec![data], model.name(), settings.fanout.clone())?.run_model(
        &model,
        tracer,
        &settings.solver,
    )
}

/// Fit a one-tissue model to every region of `tissue`.
///
/// The input function is scaled by the tissue peak, not its own, so `K1`
/// keeps its physical meaning across regions.
pub fn fit_tissue(
    input: &dyn InputFunctionSource,
    tissue: &Measurement,
    tracer: TracerClass,
    settings: &RunSettings,
) -> Result<ResultBundle, AppError> {
    let regions = tissue.normalized_regions()?;
    let input_series = input.series_scaled(tissue.peak())?;
    let Some(first) = regions.first() else {
        return Err(AppError::config("No region data to fit."));
    };
    let model = OneTissueModel::new(&input_series, first)?;
    FanOut::from_regions(regions, model.name(), settings.fanout.clone())?.run_model(
        &model,
        tracer,
        &settings.solver,
    )
}

/// Fit the input function named by `path` and persist the bundle.
///
/// The tracer class comes from the `trc-<tag>` entity of the file name. With
/// `print_progress` the quantile table is logged once the bundle is written.
pub fn run_input_function(
    path: &Path,
    source: &dyn InputFunctionSource,
    settings: &RunSettings,
    sink: &dyn ResultSink,
) -> Result<ResultBundle, AppError> {
    let tracer = tracer_from_path(path)?;
    let bundle = fit_input_function(source, tracer, settings)?;
    let tag = source
        .artery_model()
        .map(|m| m.name())
        .unwrap_or_default();
    sink.persist(&bundle, tag)?;
    if settings.fanout.print_progress {
        info!("\n{}", format_bundle_summary(&bundle, tag));
    }
    Ok(bundle)
}
