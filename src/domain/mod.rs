//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`TracerClass`, `SampleMethod`)
//! - the per-fit data record (`TimeSeriesData`) and forward-model output (`Signal`)
//! - fit outputs (`FitPackage`) and their row-aligned aggregate (`ResultBundle`)

pub mod bundle;
pub mod types;

pub use bundle::*;
pub use types::*;
