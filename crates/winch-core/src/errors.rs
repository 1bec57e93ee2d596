use std::io;
use std::path::Path;

/// Canonical result type for winch code
pub type Result<T> = std::result::Result<T, WinchError>;

/// Common error type for winch operations
#[derive(Debug, thiserror::Error)]
pub enum WinchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("GitHub error: {0}")]
    GitHub(String),

    #[error("Release error: {0}")]
    Release(String),

    #[error("Pre-release error: {0}")]
    Prerelease(String),

    #[error("Lint error: {0}")]
    Lint(String),

    #[error("Reference error: {0}")]
    Refs(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Helper to create an IO error with file path context
pub fn io_error_with_path<P: AsRef<Path>>(error: io::Error, path: P) -> io::Error {
    io::Error::new(
        error.kind(),
        format!("{}: {}", path.as_ref().display(), error),
    )
}
