//! Checkpoint files.
//!
//! A checkpoint is the complete sampler state serialized as JSON. Writes go
//! to a sibling temp file first and are renamed into place, so a crash while
//! saving leaves the previous checkpoint intact.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::sampler::SamplerState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub saved_at: DateTime<Utc>,
    pub state: SamplerState,
}

impl Checkpoint {
    pub fn new(state: SamplerState) -> Self {
        Self {
            saved_at: Utc::now(),
            state,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut out, self)?;
            out.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a checkpoint. Every failure here is a resume failure.
    pub fn read(path: &Path) -> Result<Self, AppError> {
        let resume_err = |reason: String| AppError::Resume {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| resume_err(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| resume_err(format!("unreadable checkpoint: {e}")))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
