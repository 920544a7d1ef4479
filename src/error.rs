//! Error types for the uploader.
//!
//! Three layers: `ConfigError` aborts before any upload starts, `UploadError`
//! belongs to a single file, and `Error` is what a whole run returns.

use std::path::PathBuf;
use thiserror::Error;

/// Option building and startup configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid access policy {0:?} (expected \"anyone\" or \"only_me\")")]
    InvalidAccessPolicy(String),

    #[error("invalid created-at timestamp {0:?} (expected RFC 3339)")]
    InvalidCreatedAt(String),

    #[error("parallel must be between 1 and {max}, got {0}", max = tokio::sync::Semaphore::MAX_PERMITS)]
    InvalidParallel(usize),

    #[error("invalid timeout {0:?} (expected whole seconds)")]
    InvalidTimeout(String),

    #[error("environment variable {0} is not set")]
    MissingToken(&'static str),

    /// The user aborted the interactive prompt session.
    #[error("interactive prompt cancelled")]
    Cancelled,

    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),
}

/// Failure of a single file's upload. Never aborts sibling uploads.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode EXIF from {}: {source}", .path.display())]
    Exif {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },

    /// Multipart body could not be assembled.
    #[error("failed to encode request: {0}")]
    Encoding(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("upload rejected with HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("upload cancelled")]
    Cancelled,
}

/// Outcome of a whole run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A directory walk failed part way; the whole target is abandoned.
    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{failed} of {total} uploads failed (first: {first})")]
    UploadsFailed {
        failed: usize,
        total: usize,
        first: Box<UploadError>,
    },

    #[error("cancelled with {skipped} uploads not attempted")]
    Cancelled { skipped: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
