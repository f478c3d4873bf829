//! Prior transforms: unit hypercube → bounded physical parameters.
//!
//! Every coordinate maps through `v = u · scale + offset`. Which table applies
//! depends on the forward model and, for sampled arterial inputs, on the tracer
//! class. The class is resolved once (see `TracerClass::from_tag`), never per call.

pub mod table;

pub use table::*;
