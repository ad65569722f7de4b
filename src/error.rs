use reqwest::StatusCode;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    /// The URL could not be parsed or has no usable file name.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// An error occurred while making the HTTP request or reading the body.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server responded with HTTP status {0}")]
    HttpStatus(StatusCode),

    /// The body ended before the declared content length was reached.
    #[error("Connection closed after {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    /// No body data arrived within the read timeout.
    #[error("No data received for {0:?}")]
    ReadTimeout(Duration),

    /// Failed to create or write the output file.
    #[error("File system error: {0}")]
    Filesystem(#[from] io::Error),

    /// Another in-flight download already writes to this path.
    #[error("Destination {0:?} is already being downloaded")]
    DuplicateDestination(PathBuf),
}

/// Coarse classification delivered to observers with a failed outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    NetworkFailure,
    FilesystemFailure,
    DuplicateDestination,
}

impl DownloadError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        DownloadError::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            DownloadError::Http(_)
            | DownloadError::HttpStatus(_)
            | DownloadError::Truncated { .. }
            | DownloadError::ReadTimeout(_) => ErrorKind::NetworkFailure,
            DownloadError::Filesystem(_) => ErrorKind::FilesystemFailure,
            DownloadError::DuplicateDestination(_) => ErrorKind::DuplicateDestination,
        }
    }
}
