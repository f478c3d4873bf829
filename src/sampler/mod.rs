//! Static nested sampling.
//!
//! The fitter only needs the narrow contract of [`Sampler`]: run (optionally
//! checkpointing and resuming), then hand back a weighted posterior.
//!
//! - `nested`: the iteration loop and evidence bookkeeping
//! - `proposal`: constrained replacement draws (`unif`, `rwalk`, `rslice`)
//! - `checkpoint`: JSON snapshots written atomically
//! - `results`: the weighted sample set returned to callers

pub mod checkpoint;
pub mod nested;
pub mod proposal;
pub mod results;

pub use checkpoint::*;
pub use nested::*;
pub use proposal::*;
pub use results::*;

use std::path::Path;

use crate::error::AppError;

/// A nested sampler as seen by the fitter.
pub trait Sampler {
    /// Advance until the stopping rule or a configured cap is reached.
    ///
    /// With `resume`, state is first reloaded from `checkpoint`. When a
    /// checkpoint path is given, snapshots are written there periodically and
    /// on return.
    fn run(
        &mut self,
        checkpoint: Option<&Path>,
        resume: bool,
        print_progress: bool,
    ) -> Result<(), AppError>;

    /// Weighted samples including the final live points.
    fn results(&self) -> Result<PosteriorResult, AppError>;
}
