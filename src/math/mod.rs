//! Mathematical utilities: bolus shapes, resampling operators, log-domain sums.

pub mod bolus;
pub mod logsum;
pub mod window;

pub use bolus::*;
pub use logsum::*;
pub use window::*;
