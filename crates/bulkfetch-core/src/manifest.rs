//! Where tasks come from.
//!
//! Enumerating a remote catalogue is site specific, so the run only depends on
//! [`TaskSource`]. [`ManifestFile`] reads a prepared JSON list.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::forbidden::ForbiddenSet;
use crate::task::{Credentials, DownloadTask};

/// Produces the tasks for a run.
pub trait TaskSource {
    fn tasks(&self, credentials: &Credentials) -> Result<Vec<DownloadTask>>;
}

/// JSON array of `{"url": ..., "dest": ..., "file_id": ...}` objects.
/// Relative destinations are placed under `out_dir`.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub out_dir: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Parse manifest text; destinations are resolved against `out_dir`.
    pub fn parse(text: &str, out_dir: &Path) -> Result<Vec<DownloadTask>> {
        let mut tasks: Vec<DownloadTask> = serde_json::from_str(text).context("parsing manifest")?;
        for (i, task) in tasks.iter_mut().enumerate() {
            if task.url.trim().is_empty() {
                bail!("manifest entry {} (file_id {}) has an empty url", i, task.file_id);
            }
            if task.dest.as_os_str().is_empty() {
                bail!("manifest entry {} (file_id {}) has an empty dest", i, task.file_id);
            }
            if task.dest.is_relative() {
                task.dest = out_dir.join(&task.dest);
            }
        }
        Ok(tasks)
    }
}

impl TaskSource for ManifestFile {
    fn tasks(&self, _credentials: &Credentials) -> Result<Vec<DownloadTask>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading manifest {}", self.path.display()))?;
        let tasks = Self::parse(&text, &self.out_dir)
            .with_context(|| format!("in {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), tasks = tasks.len(), "manifest loaded");
        Ok(tasks)
    }
}

/// Drop tasks whose file is already known to be forbidden.
/// Returns the remaining tasks and how many were dropped.
pub fn filter_forbidden(tasks: Vec<DownloadTask>, forbidden: &ForbiddenSet) -> (Vec<DownloadTask>, usize) {
    let before = tasks.len();
    let kept: Vec<DownloadTask> = tasks.into_iter().filter(|t| !forbidden.contains(t.file_id)).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
