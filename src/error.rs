//! Error types for the drive_backup crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while backing up to or restoring from Google Drive.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Invalid selection {index}: choose a number between 1 and {count}")]
    InvalidSelection { index: usize, count: usize },

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("Failed to walk directory: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

impl BackupError {
    /// True for errors caused by local input (bad paths, bad selections)
    /// rather than by the remote store or the session.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BackupError::PathNotFound(_)
                | BackupError::NotADirectory(_)
                | BackupError::NotAFile(_)
                | BackupError::InvalidSelection { .. }
        )
    }
}

/// Result type alias for BackupError.
pub type Result<T> = std::result::Result<T, BackupError>;
