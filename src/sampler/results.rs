use serde::{Deserialize, Serialize};

/// Weighted samples from a finished (or capped) nested-sampling run.
///
/// All vectors are indexed by dead-point order: the final live points come
/// last, sorted by increasing log-likelihood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorResult {
    /// Physical parameter vectors.
    pub samples: Vec<Vec<f64>>,
    /// The same points in the unit cube.
    pub samples_u: Vec<Vec<f64>>,
    pub logl: Vec<f64>,
    pub logwt: Vec<f64>,
    pub logvol: Vec<f64>,
    /// Running evidence estimate after each sample.
    pub logz: Vec<f64>,
    /// Running information (KL divergence prior → posterior, nats).
    pub information: Vec<f64>,
    pub nlive: usize,
    pub niter: usize,
    pub ncall: usize,
}

impl PosteriorResult {
    /// A one-point result carrying all the weight.
    pub fn single(u: Vec<f64>, v: Vec<f64>, logl: f64) -> Self {
        Self {
            samples: vec![v],
            samples_u: vec![u],
            logl: vec![logl],
            logwt: vec![logl],
            logvol: vec![0.0],
            logz: vec![logl],
            information: vec![0.0],
            nlive: 1,
            niter: 1,
            ncall: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn logz_final(&self) -> f64 {
        self.logz.last().copied().unwrap_or(f64::NEG_INFINITY)
    }

    pub fn information_final(&self) -> f64 {
        self.information.last().copied().unwrap_or(0.0)
    }

    /// Approximate statistical error on `logz_final`, `sqrt(H / nlive)`.
    pub fn logz_err(&self) -> f64 {
        (self.information_final().max(0.0) / self.nlive.max(1) as f64).sqrt()
    }

    /// Normalized posterior weights `exp(logwt − logz)`.
    pub fn importance_weights(&self) -> Vec<f64> {
        let lz = self.logz_final();
        let raw: Vec<f64> = self.logwt.iter().map(|lw| (lw - lz).exp()).collect();
        let total: f64 = raw.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            // Collapsed weights: put everything on the best sample.
            let mut w = vec![0.0; raw.len()];
            if let Some(best) = argmax(&self.logl) {
                w[best] = 1.0;
            }
            return w;
        }
        raw.into_iter().map(|w| w / total).collect()
    }

    /// Kish effective sample size of the importance weights.
    pub fn effective_sample_size(&self) -> f64 {
        let sq: f64 = self.importance_weights().iter().map(|w| w * w).sum();
        if sq > 0.0 { 1.0 / sq } else { 0.0 }
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}
