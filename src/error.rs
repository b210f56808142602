use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds raised by the update pipeline.
///
/// Every variant is caught at the add-on boundary by the engine and turned
/// into a notice; none of them stops the pass from moving to the next add-on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("Unsupported repo: {reference}")]
    UnsupportedRepository { reference: String },

    #[error("Failed to fetch release: {status} {status_text}")]
    ReleaseFetchFailed { status: u16, status_text: String },

    #[error("Malformed release payload: {0}")]
    MalformedRelease(String),

    #[error("Release has no downloadable assets")]
    NoAssetsPublished,

    #[error("Release is missing required files: {}", missing.join(", "))]
    MissingRequiredAssets { missing: Vec<String> },

    #[error("Failed to download {file}: {reason}")]
    AssetDownloadFailed { file: String, reason: String },

    #[error("Failed to write {file}: {reason}")]
    AssetWriteFailed { file: String, reason: String },

    #[error("Destination {} is unavailable: {reason}", path.display())]
    DestinationUnavailable { path: PathBuf, reason: String },

    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Timed out while {operation}")]
    TimedOut { operation: String },

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, UpdateError>;
