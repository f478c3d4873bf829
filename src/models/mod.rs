//! Forward models: physical parameters + timing → predicted curve.
//!
//! Each kinetic model is one `ForwardModel` implementation. Acquisition
//! differences (boxcar frames, dispersed arterial sampling) live in the
//! `TimeSeriesData` flags, not in separate model types.

pub mod artery;
pub mod model;
pub mod tissue;

pub use artery::*;
pub use model::*;
pub use tissue::*;
