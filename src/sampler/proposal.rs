//! Constrained replacement draws.
//!
//! Every proposal returns a fresh point with `logl > loglstar`, evaluated
//! through the caller's `eval`. Points outside the unit cube are rejected
//! without spending a likelihood call.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Likelihood calls one replacement may spend before the run is abandoned.
pub const MAX_CALLS_PER_DRAW: usize = 100_000;

const MAX_SCALE: f64 = 1.0;
const MIN_SCALE: f64 = 1e-9;

/// A point in both parametrizations with its log-likelihood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePoint {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub logl: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub point: LivePoint,
    pub ncall: usize,
}

pub fn in_unit_cube(u: &[f64]) -> bool {
    u.iter().all(|x| (0.0..=1.0).contains(x))
}

fn budget_exhausted(method: &str, ncall: usize) -> AppError {
    AppError::Sampler(format!(
        "{method} proposal found no point above the likelihood bound after {ncall} calls"
    ))
}

/// Rejection sampling from the whole cube.
pub fn draw_unif<R, E>(rng: &mut R, ndim: usize, loglstar: f64, eval: &mut E) -> Result<Draw, AppError>
where
    R: Rng,
    E: FnMut(&[f64]) -> LivePoint,
{
    let mut ncall = 0;
    while ncall < MAX_CALLS_PER_DRAW {
        let u: Vec<f64> = (0..ndim).map(|_| rng.r#gen::<f64>()).collect();
        let point = eval(&u);
        ncall += 1;
        if point.logl > loglstar {
            return Ok(Draw { point, ncall });
        }
    }
    Err(budget_exhausted("unif", ncall))
}

/// Gaussian random walk started at `start`, at least `walks` steps and at
/// least one accepted move.
///
/// `scale` adapts toward a 50% acceptance rate and is carried between draws.
pub fn draw_rwalk<R, E>(
    rng: &mut R,
    start: &[f64],
    loglstar: f64,
    walks: usize,
    scale: &mut f64,
    eval: &mut E,
) -> Result<Draw, AppError>
where
    R: Rng,
    E: FnMut(&[f64]) -> LivePoint,
{
    let ndim = start.len();
    let mut current = start.to_vec();
    let mut accepted: Option<LivePoint> = None;
    let (mut n_accept, mut n_reject, mut steps, mut ncall) = (0usize, 0usize, 0usize, 0usize);

    while steps < walks || accepted.is_none() {
        if ncall >= MAX_CALLS_PER_DRAW || steps >= MAX_CALLS_PER_DRAW {
            return Err(budget_exhausted("rwalk", ncall));
        }
        steps += 1;
        // Stuck: shrink before the next batch.
        if accepted.is_none() && steps > walks && (steps - 1) % walks == 0 {
            *scale = (*scale * 0.5).max(MIN_SCALE);
        }
        let proposal: Vec<f64> = current
            .iter()
            .map(|x| x + *scale * rng.sample::<f64, _>(StandardNormal))
            .collect();
        if !in_unit_cube(&proposal) {
            n_reject += 1;
            continue;
        }
        let point = eval(&proposal);
        ncall += 1;
        if point.logl > loglstar {
            n_accept += 1;
            current.clone_from(&point.u);
            accepted = Some(point);
        } else {
            n_reject += 1;
        }
    }

    let facc = n_accept as f64 / (n_accept + n_reject) as f64;
    let norm = 0.5 * ndim.max(1) as f64;
    *scale = (*scale * ((facc - 0.5) / norm).exp()).clamp(MIN_SCALE, MAX_SCALE);

    match accepted {
        Some(point) => Ok(Draw { point, ncall }),
        None => Err(budget_exhausted("rwalk", ncall)),
    }
}

/// Random-direction slice sampling: `slices` one-dimensional slice updates
/// with step-out and shrinkage, starting at `start`.
///
/// `width` is the initial bracket length and adapts so that step-outs and
/// contractions balance.
pub fn draw_rslice<R, E>(
    rng: &mut R,
    start: &[f64],
    loglstar: f64,
    slices: usize,
    width: &mut f64,
    eval: &mut E,
) -> Result<Draw, AppError>
where
    R: Rng,
    E: FnMut(&[f64]) -> LivePoint,
{
    let ndim = start.len();
    let mut current = start.to_vec();
    let mut last: Option<LivePoint> = None;
    let (mut nexpand, mut ncontract, mut ncall) = (0usize, 0usize, 0usize);

    for _ in 0..slices {
        let mut dir: Vec<f64> = (0..ndim).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        let norm = dir.iter().map(|d| d * d).sum::<f64>().sqrt();
        if !(norm > 0.0) {
            continue;
        }
        dir.iter_mut().for_each(|d| *d *= *width / norm);

        let r: f64 = rng.r#gen();
        let mut tl = -r;
        let mut tr = 1.0 - r;

        while above(&current, &dir, tl, loglstar, eval, &mut ncall) {
            if ncall >= MAX_CALLS_PER_DRAW {
                return Err(budget_exhausted("rslice", ncall));
            }
            tl -= 1.0;
            nexpand += 1;
        }
        while above(&current, &dir, tr, loglstar, eval, &mut ncall) {
            if ncall >= MAX_CALLS_PER_DRAW {
                return Err(budget_exhausted("rslice", ncall));
            }
            tr += 1.0;
            nexpand += 1;
        }

        loop {
            if ncall >= MAX_CALLS_PER_DRAW {
                return Err(budget_exhausted("rslice", ncall));
            }
            let t = tl + rng.r#gen::<f64>() * (tr - tl);
            let x = point_at(&current, &dir, t);
            if in_unit_cube(&x) {
                let point = eval(&x);
                ncall += 1;
                if point.logl > loglstar {
                    current.clone_from(&point.u);
                    last = Some(point);
                    break;
                }
            }
            if t < 0.0 {
                tl = t;
            } else {
                tr = t;
            }
            ncontract += 1;
        }
    }

    let nexpand = nexpand.max(1);
    let mult = 2.0 * nexpand as f64 / (nexpand + ncontract) as f64;
    let max_width = 2.0 * (ndim.max(1) as f64).sqrt();
    *width = (*width * mult).clamp(MIN_SCALE, max_width);

    last.map(|point| Draw { point, ncall })
        .ok_or_else(|| AppError::Sampler("rslice drew no valid slice direction".to_string()))
}

fn point_at(origin: &[f64], dir: &[f64], t: f64) -> Vec<f64> {
    origin.iter().zip(dir).map(|(o, d)| o + t * d).collect()
}

fn above<E>(origin: &[f64], dir: &[f64], t: f64, loglstar: f64, eval: &mut E, ncall: &mut usize) -> bool
where
    E: FnMut(&[f64]) -> LivePoint,
{
    let x = point_at(origin, dir, t);
    if !in_unit_cube(&x) {
        return false;
    }
    *ncall += 1;
    eval(&x).logl > loglstar
}
