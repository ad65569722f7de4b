use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::DownloadError;
use crate::progress::Outcome;
use crate::utils::{get_filename_from_url, resolve_directory};

/// Routing key for everything a download emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DownloadId(Uuid);

impl DownloadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DownloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting for a slot under the concurrency cap.
    Queued,
    Running,
    Finished(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub directory: PathBuf,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            directory: directory.into(),
        }
    }

    /// Builds a request from raw user input, where `current` names the
    /// directory of the running program.
    pub fn from_input(url: &str, directory: &str) -> Self {
        Self::new(url.trim(), resolve_directory(directory.trim()))
    }

    pub fn filename(&self) -> Result<String, DownloadError> {
        get_filename_from_url(&self.url)
    }

    pub fn destination(&self) -> Result<PathBuf, DownloadError> {
        Ok(self.directory.join(self.filename()?))
    }
}
