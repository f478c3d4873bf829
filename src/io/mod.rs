//! Input/output helpers.
//!
//! - result persistence behind the `ResultSink` trait (`sink`)
//! - quantile table export (`export`)

pub mod export;
pub mod sink;

pub use export::*;
pub use sink::*;
