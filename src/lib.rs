//! `pet-kinetics` library crate.
//!
//! Bayesian fitting of PET input functions and tissue kinetics by nested
//! sampling. Layout, leaves first:
//!
//! - `math`, `prior`, `models`: closed-form curves and their parameter ranges
//! - `sampler`: static nested sampling with checkpoint/resume
//! - `fit`: likelihood, per-region solver, parallel fan-out
//! - `input`, `io`, `report`: measurements in, bundles and tables out

pub mod config;
pub mod domain;
pub mod error;
pub mod fit;
pub mod input;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod pipeline;
pub mod prior;
pub mod report;
pub mod sampler;
