//! Error taxonomy for the install pipeline
//!
//! Every variant is fatal. Search-path registration problems are not errors;
//! they are reported through [`super::path::Registration`].

use std::path::PathBuf;

/// Errors raised by the install pipeline
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Host OS or CPU architecture has no published artifact
    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Latest release could not be determined
    #[error("Failed to resolve latest release of {repo}: {message}")]
    ReleaseResolution { repo: String, message: String },

    /// Artifact transfer failed
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// Downloaded artifact does not match the expected digest
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// Archive is corrupt or does not contain the executable
    #[error("Failed to extract {archive}: {message}")]
    Extraction { archive: PathBuf, message: String },

    /// Invalid configuration value or unreadable config file
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    pub fn release(repo: impl Into<String>, message: impl ToString) -> Self {
        Self::ReleaseResolution {
            repo: repo.into(),
            message: message.to_string(),
        }
    }

    pub fn download(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn extraction(archive: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.to_string(),
        }
    }

    /// Process exit status for this error (0 is reserved for success)
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedPlatform { .. } => 2,
            Self::ReleaseResolution { .. } => 3,
            Self::Download { .. } | Self::ChecksumMismatch { .. } => 4,
            Self::Extraction { .. } => 5,
            Self::Config(_) | Self::Io(_) => 1,
        }
    }
}

pub type Result<T, E = InstallError> = std::result::Result<T, E>;
