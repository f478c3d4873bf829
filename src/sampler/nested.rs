//! Static nested sampling loop.
//!
//! Each iteration removes the worst live point, shrinks the prior volume by
//! the expected factor `nlive / (nlive + 1)`, folds the removed point into the
//! evidence with the trapezoid rule and replaces it by a constrained draw.
//! At the end the surviving live points are added in order of increasing
//! likelihood, filling the remaining volume.
//!
//! Random streams are derived from `(seed, iteration)`, so a run resumed from
//! a checkpoint follows the same path as one that was never interrupted.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::SolverConfig;
use crate::domain::SampleMethod;
use crate::error::AppError;
use crate::fit::LOGL_SENTINEL;
use crate::math::{log_add_exp, log_sub_exp};
use crate::sampler::{
    Checkpoint, Draw, LivePoint, PosteriorResult, Sampler, draw_rslice, draw_rwalk, draw_unif,
};

const PROGRESS_EVERY: usize = 100;
const INITIAL_WALK_SCALE: f64 = 0.1;
const INITIAL_SLICE_WIDTH: f64 = 0.5;

/// Running evidence and information integrals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvidenceAccumulator {
    pub logz: f64,
    pub h: f64,
    pub loglstar: f64,
    pub logvol: f64,
}

impl Default for EvidenceAccumulator {
    fn default() -> Self {
        Self {
            logz: LOGL_SENTINEL,
            h: 0.0,
            loglstar: LOGL_SENTINEL,
            logvol: 0.0,
        }
    }
}

impl EvidenceAccumulator {
    /// Fold in a point at `logl` whose shell ends at `logvol`; returns its
    /// log-weight.
    pub fn add(&mut self, logl: f64, logvol: f64) -> f64 {
        let logdvol = log_sub_exp(self.logvol, logvol) + 0.5f64.ln();
        let logwt = log_add_exp(logl, self.loglstar) + logdvol;
        let logz_new = log_add_exp(self.logz, logwt);
        let lzterm = (self.loglstar - logz_new).exp() * self.loglstar
            + (logl - logz_new).exp() * logl;
        let h_new = logdvol.exp() * lzterm + (self.logz - logz_new).exp() * (self.h + self.logz)
            - logz_new;
        self.logz = logz_new;
        self.h = h_new;
        self.loglstar = logl;
        self.logvol = logvol;
        logwt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadPoint {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub logl: f64,
    pub logvol: f64,
    pub logwt: f64,
    pub logz: f64,
    pub h: f64,
}

/// Everything needed to continue a run; this is what a checkpoint stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    pub ndim: usize,
    pub nlive: usize,
    pub seed: u64,
    pub method: SampleMethod,
    pub live: Vec<LivePoint>,
    pub dead: Vec<DeadPoint>,
    pub evidence: EvidenceAccumulator,
    pub niter: usize,
    pub ncall: usize,
    pub walk_scale: f64,
    pub slice_width: f64,
    /// Set once the remaining-evidence criterion is met.
    pub converged: bool,
}

impl SamplerState {
    pub fn empty(ndim: usize, nlive: usize, seed: u64, method: SampleMethod) -> Self {
        Self {
            ndim,
            nlive,
            seed,
            method,
            live: Vec::new(),
            dead: Vec::new(),
            evidence: EvidenceAccumulator::default(),
            niter: 0,
            ncall: 0,
            walk_scale: INITIAL_WALK_SCALE,
            slice_width: INITIAL_SLICE_WIDTH,
            converged: false,
        }
    }

    /// `ln(Z + L_max X) − ln Z`: how much the evidence could still grow.
    pub fn remaining_logz(&self) -> f64 {
        let lmax = self
            .live
            .iter()
            .map(|p| p.logl)
            .fold(LOGL_SENTINEL, f64::max);
        let ev = &self.evidence;
        log_add_exp(ev.logz, lmax + ev.logvol) - ev.logz
    }

    fn check(&self, path: &Path) -> Result<(), AppError> {
        let corrupt = |reason: String| AppError::Resume {
            path: path.to_path_buf(),
            reason,
        };
        if !self.live.is_empty() && self.live.len() != self.nlive {
            return Err(corrupt(format!(
                "{} live points stored, nlive is {}",
                self.live.len(),
                self.nlive
            )));
        }
        if self.live.iter().any(|p| p.u.len() != self.ndim) {
            return Err(corrupt(format!("live point dimension differs from ndim={}", self.ndim)));
        }
        Ok(())
    }

    fn check_ndim(&self, path: &Path, ndim: usize) -> Result<(), AppError> {
        if self.ndim == ndim {
            return Ok(());
        }
        Err(AppError::Resume {
            path: path.to_path_buf(),
            reason: format!("checkpoint has ndim={}, model has ndim={ndim}", self.ndim),
        })
    }
}

/// Nested sampler over a likelihood `L` of physical parameters and a prior
/// transform `P` from the unit cube.
pub struct NestedSampler<L, P> {
    loglike: L,
    prior: P,
    config: SolverConfig,
    state: SamplerState,
}

impl<L, P> NestedSampler<L, P>
where
    L: Fn(&[f64]) -> f64,
    P: Fn(&[f64]) -> Vec<f64>,
{
    pub fn new(loglike: L, prior: P, ndim: usize, config: &SolverConfig) -> Result<Self, AppError> {
        config.validate()?;
        if ndim == 0 {
            return Err(AppError::config("Sampler needs at least one dimension."));
        }
        Ok(Self {
            loglike,
            prior,
            config: config.clone(),
            state: SamplerState::empty(ndim, config.nlive, config.seed, config.method),
        })
    }

    /// Rebuild an `ndim`-dimensional sampler from a checkpoint. Stored
    /// `nlive`, `seed` and `method` take precedence over `config`.
    pub fn restore(
        path: &Path,
        loglike: L,
        prior: P,
        ndim: usize,
        config: &SolverConfig,
    ) -> Result<Self, AppError> {
        let checkpoint = Checkpoint::read(path)?;
        let state = checkpoint.state;
        state.check(path)?;
        state.check_ndim(path, ndim)?;
        let mut sampler = Self::new(loglike, prior, ndim, config)?;
        sampler.adopt(state, path);
        info!(
            path = %path.display(),
            iteration = sampler.state.niter,
            saved_at = %checkpoint.saved_at,
            "restored nested sampler from checkpoint"
        );
        Ok(sampler)
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    pub fn niter(&self) -> usize {
        self.state.niter
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        Checkpoint::new(self.state.clone()).write(path)?;
        debug!(path = %path.display(), iteration = self.state.niter, "wrote checkpoint");
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), AppError> {
        let checkpoint = Checkpoint::read(path)?;
        let state = checkpoint.state;
        state.check(path)?;
        state.check_ndim(path, self.state.ndim)?;
        self.adopt(state, path);
        info!(path = %path.display(), iteration = self.state.niter, "resuming nested sampler");
        Ok(())
    }

    fn adopt(&mut self, state: SamplerState, path: &Path) {
        if state.nlive != self.config.nlive || state.method != self.config.method {
            warn!(
                path = %path.display(),
                nlive = state.nlive,
                method = %state.method,
                "checkpoint settings differ from configuration; keeping the checkpoint's"
            );
        }
        self.config.nlive = state.nlive;
        self.config.method = state.method;
        self.config.seed = state.seed;
        self.state = state;
    }

    fn evaluate(&self, u: &[f64]) -> LivePoint {
        let v = (self.prior)(u);
        let logl = (self.loglike)(&v);
        LivePoint {
            u: u.to_vec(),
            v,
            logl: if logl.is_finite() { logl } else { LOGL_SENTINEL },
        }
    }

    fn initialize(&mut self) {
        let mut rng = StdRng::seed_from_u64(stream_seed(self.state.seed, u64::MAX));
        let ndim = self.state.ndim;
        let live: Vec<LivePoint> = (0..self.state.nlive)
            .map(|_| {
                let u: Vec<f64> = (0..ndim).map(|_| rng.r#gen::<f64>()).collect();
                self.evaluate(&u)
            })
            .collect();
        self.state.ncall += live.len();
        self.state.live = live;
    }

    fn step(&mut self) -> Result<(), AppError> {
        let nlive = self.state.nlive as f64;
        let worst = self
            .state
            .live
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.logl.total_cmp(&b.1.logl))
            .map(|(i, _)| i)
            .ok_or_else(|| AppError::Sampler("no live points".to_string()))?;

        let removed = self.state.live[worst].clone();
        let logvol = self.state.evidence.logvol - ((nlive + 1.0) / nlive).ln();
        let logwt = self.state.evidence.add(removed.logl, logvol);
        self.state.dead.push(DeadPoint {
            u: removed.u,
            v: removed.v,
            logl: removed.logl,
            logvol,
            logwt,
            logz: self.state.evidence.logz,
            h: self.state.evidence.h,
        });

        let mut rng = StdRng::seed_from_u64(stream_seed(self.state.seed, self.state.niter as u64));
        let draw = self.propose(&mut rng, worst)?;
        self.state.ncall += draw.ncall;
        self.state.live[worst] = draw.point;
        self.state.niter += 1;
        Ok(())
    }

    fn propose(&mut self, rng: &mut StdRng, worst: usize) -> Result<Draw, AppError> {
        let loglstar = self.state.evidence.loglstar;
        let ndim = self.state.ndim;
        // Walks need a start strictly inside the constraint.
        let starts: Vec<usize> = (0..self.state.live.len())
            .filter(|&i| i != worst && self.state.live[i].logl > loglstar)
            .collect();
        let start = if starts.is_empty() {
            None
        } else {
            Some(self.state.live[starts[rng.gen_range(0..starts.len())]].u.clone())
        };

        let mut walk_scale = self.state.walk_scale;
        let mut slice_width = self.state.slice_width;
        let mut eval = |u: &[f64]| self.evaluate(u);
        let draw = match (self.state.method, start) {
            (SampleMethod::Rwalk, Some(start)) => draw_rwalk(
                rng,
                &start,
                loglstar,
                self.config.walks,
                &mut walk_scale,
                &mut eval,
            ),
            (SampleMethod::Rslice, Some(start)) => draw_rslice(
                rng,
                &start,
                loglstar,
                self.config.effective_slices(ndim),
                &mut slice_width,
                &mut eval,
            ),
            _ => draw_unif(rng, ndim, loglstar, &mut eval),
        };
        self.state.walk_scale = walk_scale;
        self.state.slice_width = slice_width;
        draw.map_err(|e| match e {
            AppError::Sampler(msg) => {
                AppError::Sampler(format!("iteration {}: {msg}", self.state.niter))
            }
            other => other,
        })
    }

    fn report(&self, print_progress: bool) {
        let st = &self.state;
        let remaining = st.remaining_logz();
        if print_progress {
            info!(
                iteration = st.niter,
                ncall = st.ncall,
                logz = st.evidence.logz,
                dlogz = remaining,
                "nested sampling"
            );
        } else {
            trace!(
                iteration = st.niter,
                ncall = st.ncall,
                logz = st.evidence.logz,
                dlogz = remaining,
                "nested sampling"
            );
        }
    }
}

impl<L, P> Sampler for NestedSampler<L, P>
where
    L: Fn(&[f64]) -> f64,
    P: Fn(&[f64]) -> Vec<f64>,
{
    fn run(
        &mut self,
        checkpoint: Option<&Path>,
        resume: bool,
        print_progress: bool,
    ) -> Result<(), AppError> {
        if resume {
            let path = checkpoint.ok_or_else(|| AppError::Resume {
                path: PathBuf::new(),
                reason: "resume requested without a checkpoint path".to_string(),
            })?;
            self.load(path)?;
        }
        if self.state.live.is_empty() {
            self.initialize();
        }

        let dlogz = self.config.effective_dlogz();
        let every = Duration::from_secs(self.config.checkpoint_every_secs);
        let mut last_save = Instant::now();

        loop {
            if self.state.converged {
                break;
            }
            if self.config.max_iter.is_some_and(|m| self.state.niter >= m) {
                break;
            }
            if self.config.max_call.is_some_and(|m| self.state.ncall >= m) {
                break;
            }
            if self.state.remaining_logz() < dlogz {
                self.state.converged = true;
                break;
            }
            self.step()?;
            if self.state.niter % PROGRESS_EVERY == 0 {
                self.report(print_progress);
            }
            if let Some(path) = checkpoint {
                if last_save.elapsed() >= every {
                    self.save(path)?;
                    last_save = Instant::now();
                }
            }
        }

        if let Some(path) = checkpoint {
            self.save(path)?;
        }
        Ok(())
    }

    fn results(&self) -> Result<PosteriorResult, AppError> {
        let st = &self.state;
        if st.live.is_empty() {
            return Err(AppError::Sampler("sampler has not been run".to_string()));
        }
        let total = st.dead.len() + st.live.len();
        let mut out = PosteriorResult {
            samples: Vec::with_capacity(total),
            samples_u: Vec::with_capacity(total),
            logl: Vec::with_capacity(total),
            logwt: Vec::with_capacity(total),
            logvol: Vec::with_capacity(total),
            logz: Vec::with_capacity(total),
            information: Vec::with_capacity(total),
            nlive: st.nlive,
            niter: st.niter,
            ncall: st.ncall,
        };
        for d in &st.dead {
            out.samples.push(d.v.clone());
            out.samples_u.push(d.u.clone());
            out.logl.push(d.logl);
            out.logwt.push(d.logwt);
            out.logvol.push(d.logvol);
            out.logz.push(d.logz);
            out.information.push(d.h);
        }

        // Remaining live points share the last volume in equal expected slices.
        let mut ev = st.evidence;
        let base = ev.logvol;
        let nlive = st.live.len() as f64;
        let mut order: Vec<&LivePoint> = st.live.iter().collect();
        order.sort_by(|a, b| a.logl.total_cmp(&b.logl));
        for (k, p) in order.into_iter().enumerate() {
            let logvol = base + (1.0 - (k + 1) as f64 / (nlive + 1.0)).ln();
            let logwt = ev.add(p.logl, logvol);
            out.samples.push(p.v.clone());
            out.samples_u.push(p.u.clone());
            out.logl.push(p.logl);
            out.logwt.push(logwt);
            out.logvol.push(logvol);
            out.logz.push(ev.logz);
            out.information.push(ev.h);
        }
        Ok(out)
    }
}

/// Seed for the random stream of one iteration.
fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ stream.wrapping_add(1).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Isotropic unit Gaussian on the box [−10, 10]²: ln Z = −ln 400.
    fn gaussian_problem() -> (impl Fn(&[f64]) -> f64, impl Fn(&[f64]) -> Vec<f64>) {
        let loglike = |v: &[f64]| {
            -0.5 * v.iter().map(|x| x * x).sum::<f64>() - (2.0 * std::f64::consts::PI).ln()
        };
        let prior = |u: &[f64]| u.iter().map(|x| 20.0 * x - 10.0).collect::<Vec<f64>>();
        (loglike, prior)
    }

    fn run_gaussian(method: SampleMethod) -> PosteriorResult {
        let (loglike, prior) = gaussian_problem();
        let cfg = SolverConfig::default()
            .with_method(method)
            .with_nlive(200)
            .with_seed(42);
        let mut sampler = NestedSampler::new(loglike, prior, 2, &cfg).unwrap();
        sampler.run(None, false, false).unwrap();
        assert!(sampler.state().converged);
        sampler.results().unwrap()
    }

    #[test]
    fn accumulator_matches_two_point_trapezoid() {
        let mut ev = EvidenceAccumulator::default();
        let x1 = (0.5f64).ln();
        let lw = ev.add(0.0, x1);
        // First shell: ½ (1 − ½) · (e^0 + e^−1e300) = 0.25.
        assert!((lw - 0.25f64.ln()).abs() < 1e-12);
        assert!((ev.logz - 0.25f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn evidence_of_gaussian_rslice() {
        let res = run_gaussian(SampleMethod::Rslice);
        let expected = -(400.0f64).ln();
        assert!(
            (res.logz_final() - expected).abs() < 0.6,
            "logz {} vs {expected}",
            res.logz_final()
        );
        assert!(res.information_final() > 0.0);
    }

    #[test]
    fn evidence_of_gaussian_unif() {
        let res = run_gaussian(SampleMethod::Unif);
        let expected = -(400.0f64).ln();
        assert!((res.logz_final() - expected).abs() < 0.6, "logz {}", res.logz_final());
    }

    #[test]
    fn posterior_mean_near_origin_rwalk() {
        let res = run_gaussian(SampleMethod::Rwalk);
        let w = res.importance_weights();
        for d in 0..2 {
            let mean: f64 = res.samples.iter().zip(&w).map(|(s, w)| s[d] * w).sum();
            assert!(mean.abs() < 0.3, "dim {d} mean {mean}");
        }
    }

    #[test]
    fn results_include_final_live_points() {
        let res = run_gaussian(SampleMethod::Rslice);
        assert_eq!(res.len(), res.niter + 200);
        assert!(res.logvol.windows(2).all(|w| w[1] < w[0]), "volumes must shrink");
    }

    #[test]
    fn same_seed_same_run() {
        let a = run_gaussian(SampleMethod::Rslice);
        let b = run_gaussian(SampleMethod::Rslice);
        assert_eq!(a.logz_final(), b.logz_final());
        assert_eq!(a.ncall, b.ncall);
    }

    #[test]
    fn resumed_run_matches_uninterrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gauss.checkpoint.json");

        let (loglike, prior) = gaussian_problem();
        let base = SolverConfig::default().with_nlive(50).with_seed(5);
        let mut capped = NestedSampler::new(loglike, prior, 2, &base.clone().with_max_iter(60)).unwrap();
        capped.run(Some(&path), false, false).unwrap();
        assert_eq!(capped.niter(), 60);
        assert!(!capped.state().converged);

        let (loglike, prior) = gaussian_problem();
        let mut resumed = NestedSampler::new(loglike, prior, 2, &base).unwrap();
        resumed.run(Some(&path), true, false).unwrap();

        let (loglike, prior) = gaussian_problem();
        let mut straight = NestedSampler::new(loglike, prior, 2, &base).unwrap();
        straight.run(None, false, false).unwrap();

        let a = resumed.results().unwrap();
        let b = straight.results().unwrap();
        assert_eq!(a.niter, b.niter);
        assert!((a.logz_final() - b.logz_final()).abs() < 1e-9);
    }

    #[test]
    fn resume_without_checkpoint_fails() {
        let (loglike, prior) = gaussian_problem();
        let cfg = SolverConfig::default().with_nlive(10);
        let mut s = NestedSampler::new(loglike, prior, 2, &cfg).unwrap();
        let err = s.run(None, true, false).unwrap_err();
        assert!(matches!(err, AppError::Resume { .. }), "got {err:?}");

        let dir = tempfile::tempdir().unwrap();
        let err = s.run(Some(&dir.path().join("missing.json")), true, false).unwrap_err();
        assert!(matches!(err, AppError::Resume { .. }), "got {err:?}");
    }

    #[test]
    fn results_before_run_is_error() {
        let (loglike, prior) = gaussian_problem();
        let s = NestedSampler::new(loglike, prior, 2, &SolverConfig::default()).unwrap();
        assert!(s.results().is_err());
    }

    #[test]
    fn sentinel_likelihood_never_produces_nan() {
        let cfg = SolverConfig::default()
            .with_method(SampleMethod::Unif)
            .with_nlive(20)
            .with_max_iter(50);
        // Half of the cube is degenerate.
        let loglike = |v: &[f64]| if v[0] < 0.5 { f64::NAN } else { -v[0] };
        let prior = |u: &[f64]| u.to_vec();
        let mut s = NestedSampler::new(loglike, prior, 1, &cfg).unwrap();
        s.run(None, false, false).unwrap();
        let res = s.results().unwrap();
        assert!(res.logz.iter().all(|z| z.is_finite()));
        assert!(res.logl.iter().all(|l| *l >= LOGL_SENTINEL));
    }
}
