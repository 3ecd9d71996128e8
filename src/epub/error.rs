//! EPUB error types
//!
//! Two tiers: [`EpubError`] aborts a conversion, [`ArchiveError`] describes a
//! single entry and is usually logged and skipped by the caller.

use thiserror::Error;

/// Fatal conversion errors
#[derive(Debug, Error)]
pub enum EpubError {
    /// The upload is not a readable zip archive
    #[error("Invalid EPUB archive: {0}")]
    ArchiveInvalid(String),

    /// A required metadata file is absent or declares nothing usable
    #[error("Missing EPUB metadata: {0}")]
    MetadataMissing(String),

    /// A required metadata file could not be parsed
    #[error("Unreadable EPUB metadata: {0}")]
    MetadataMalformed(String),

    /// Unexpected failure while reading an archive entry
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EpubError {
    /// Short machine-readable category
    pub fn code(&self) -> &'static str {
        match self {
            EpubError::ArchiveInvalid(_) => "archive_invalid",
            EpubError::MetadataMissing(_) => "metadata_missing",
            EpubError::MetadataMalformed(_) => "metadata_malformed",
            EpubError::Io(_) => "io_error",
        }
    }

    /// Whether the error was caused by the uploaded bytes rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EpubError::Io(_))
    }
}

/// Errors for a single archive entry
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Failed to read entry {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Entry {name} is corrupt or unsupported: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("Entry {0} is not valid UTF-8")]
    Encoding(String),
}

impl ArchiveError {
    /// Promote an entry error for a required metadata file
    pub(crate) fn into_metadata_error(self, what: &str) -> EpubError {
        match self {
            ArchiveError::NotFound(name) => {
                EpubError::MetadataMissing(format!("{} not found at {}", what, name))
            }
            ArchiveError::Read { source, .. } => EpubError::Io(source),
            ArchiveError::Corrupt { name, reason } => {
                EpubError::ArchiveInvalid(format!("{} at {}: {}", what, name, reason))
            }
            ArchiveError::Encoding(name) => {
                EpubError::MetadataMalformed(format!("{} at {} is not valid UTF-8", what, name))
            }
        }
    }
}

/// Result type alias for fatal conversion errors
pub type Result<T> = std::result::Result<T, EpubError>;
