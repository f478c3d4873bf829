//! Run configuration.
//!
//! Every knob has a default and can be overridden from `PET_KINETICS_*`
//! environment variables. A `.env` file in the working directory is loaded
//! first through `dotenvy`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{SampleMethod, TracerClass};
use crate::error::AppError;

pub const DEFAULT_NLIVE: usize = 300;
pub const DEFAULT_SEED: u64 = 916_301;
pub const DEFAULT_WALKS: usize = 25;
pub const DEFAULT_CHECKPOINT_EVERY_SECS: u64 = 60;

/// Nested-sampler settings for one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub method: SampleMethod,
    pub nlive: usize,
    pub seed: u64,
    /// Stop once the estimated remaining evidence falls below this (in log
    /// units). `None` means `1e-3 * (nlive - 1) + 0.01`.
    pub dlogz: Option<f64>,
    pub max_iter: Option<usize>,
    pub max_call: Option<usize>,
    pub checkpoint_every_secs: u64,
    /// Slice repetitions for `rslice`; `None` means `3 + ndim`.
    pub slices: Option<usize>,
    pub walks: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SampleMethod::Rslice,
            nlive: DEFAULT_NLIVE,
            seed: DEFAULT_SEED,
            dlogz: None,
            max_iter: None,
            max_call: None,
            checkpoint_every_secs: DEFAULT_CHECKPOINT_EVERY_SECS,
            slices: None,
            walks: DEFAULT_WALKS,
        }
    }
}

impl SolverConfig {
    /// Defaults overridden by `PET_KINETICS_*` variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<usize>("PET_KINETICS_NLIVE")? {
            cfg.nlive = v;
        }
        if let Some(v) = env_parse::<u64>("PET_KINETICS_SEED")? {
            cfg.seed = v;
        }
        if let Some(v) = env_parse::<SampleMethod>("PET_KINETICS_METHOD")? {
            cfg.method = v;
        }
        if let Some(v) = env_parse::<f64>("PET_KINETICS_DLOGZ")? {
            cfg.dlogz = Some(v);
        }
        if let Some(v) = env_parse::<u64>("PET_KINETICS_CHECKPOINT_EVERY")? {
            cfg.checkpoint_every_secs = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_method(mut self, method: SampleMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_nlive(mut self, nlive: usize) -> Self {
        self.nlive = nlive;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_dlogz(mut self, dlogz: f64) -> Self {
        self.dlogz = Some(dlogz);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn effective_dlogz(&self) -> f64 {
        self.dlogz
            .unwrap_or(1e-3 * (self.nlive.saturating_sub(1)) as f64 + 0.01)
    }

    pub fn effective_slices(&self, ndim: usize) -> usize {
        self.slices.unwrap_or(3 + ndim)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.nlive < 2 {
            return Err(AppError::config(format!(
                "nlive must be at least 2 (got {}).",
                self.nlive
            )));
        }
        if let Some(d) = self.dlogz {
            if !d.is_finite() || d < 0.0 {
                return Err(AppError::config(format!(
                    "dlogz must be finite and non-negative (got {d})."
                )));
            }
        }
        if self.slices == Some(0) {
            return Err(AppError::config("slices must be positive."));
        }
        if self.walks == 0 {
            return Err(AppError::config("walks must be positive."));
        }
        Ok(())
    }
}

/// Settings for a multi-region batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FanOutConfig {
    /// Worker threads; `None` uses every available core.
    pub workers: Option<usize>,
    pub checkpoint_dir: Option<PathBuf>,
    pub resume: bool,
    pub print_progress: bool,
}

impl FanOutConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<usize>("PET_KINETICS_WORKERS")? {
            cfg.workers = Some(v);
        }
        if let Ok(dir) = std::env::var("PET_KINETICS_CHECKPOINT_DIR") {
            if !dir.trim().is_empty() {
                cfg.checkpoint_dir = Some(PathBuf::from(dir.trim()));
            }
        }
        Ok(cfg)
    }

    pub fn effective_workers(&self) -> usize {
        self.workers
            .filter(|&w| w > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }
}

/// Tracer class from a BIDS-style file name (`sub-01_trc-oo_pet.nii.gz`).
pub fn tracer_from_path(path: &Path) -> Result<TracerClass, AppError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::config(format!("no file name in '{}'", path.display())))?;
    name.split(['_', '.'])
        .find_map(|part| part.strip_prefix("trc-"))
        .filter(|tag| !tag.is_empty())
        .map(TracerClass::from_tag)
        .ok_or_else(|| {
            AppError::config(format!(
                "no tracer tag (trc-<tag>) derivable from '{}'",
                path.display()
            ))
        })
}

fn env_parse<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::config(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SolverConfig::default();
        assert_eq!(cfg.nlive, 300);
        assert_eq!(cfg.seed, 916_301);
        assert_eq!(cfg.method, SampleMethod::Rslice);
        assert!((cfg.effective_dlogz() - 0.309).abs() < 1e-12);
        assert_eq!(cfg.effective_slices(14), 17);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(SolverConfig::default().with_nlive(1).validate().is_err());
        assert!(SolverConfig::default().with_dlogz(f64::NAN).validate().is_err());
        assert!(SolverConfig::default().with_dlogz(-1.0).validate().is_err());
        let mut cfg = SolverConfig::default();
        cfg.walks = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tracer_tag_from_bids_name() {
        let p = Path::new("/data/sub-108293_ses-1_trc-oo_proc-MipIdif_idif.nii.gz");
        assert_eq!(tracer_from_path(p).unwrap(), TracerClass::Oxygen);
        let p = Path::new("sub-1_trc-co_pet.json");
        assert_eq!(tracer_from_path(p).unwrap(), TracerClass::CarbonMonoxide);
        let p = Path::new("sub-1_trc-ho_pet.json");
        assert_eq!(tracer_from_path(p).unwrap(), TracerClass::Default);
    }

    #[test]
    fn missing_tracer_tag_is_configuration_error() {
        let err = tracer_from_path(Path::new("sub-1_pet.nii.gz")).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn workers_fall_back_to_available_cores() {
        let cfg = FanOutConfig::default();
        assert!(cfg.effective_workers() >= 1);
        let cfg = FanOutConfig {
            workers: Some(3),
            ..FanOutConfig::default()
        };
        assert_eq!(cfg.effective_workers(), 3);
    }
}
