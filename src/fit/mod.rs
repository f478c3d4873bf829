//! Fitting orchestration.
//!
//! Responsibilities:
//!
//! - score parameter vectors against one region's data (`likelihood`)
//! - drive a nested sampler for one region and summarize it (`solver`)
//! - run many regions in parallel and stack the results (`fanout`)

pub mod fanout;
pub mod likelihood;
pub mod solver;

pub use fanout::*;
pub use likelihood::*;
pub use solver::*;
