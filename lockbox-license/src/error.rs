//! Error types for the licensing module.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Token is not a well-formed compact RS256 token.
    #[error("invalid premium key format: {0}")]
    Malformed(String),

    /// RSA signature verification failed.
    #[error("premium key signature invalid")]
    InvalidSignature,

    /// A mandatory claim is absent or blank.
    #[error("premium key is missing the `{0}` claim")]
    MissingClaim(&'static str),

    /// The `nbf` claim lies in the future.
    #[error("premium key is not valid before {0}")]
    NotYetValid(DateTime<Utc>),

    /// The `exp` claim lies in the past.
    #[error("premium key expired on {0}")]
    Expired(DateTime<Utc>),

    /// The verification key could not be loaded.
    #[error("invalid verification key: {0}")]
    KeyMaterial(String),

    /// Configuration store error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// IO error while reading a key file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background worker failed before reporting a result.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Caller-visible failure categories.
///
/// Malformed, forged and incomplete keys all collapse into `InvalidLicense`
/// so presentation layers cannot tell an attacker which check tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The key file is not a valid premium key.
    InvalidLicense,
    /// The key is genuine but past its expiration.
    Expired,
    /// Reading or writing settings failed; retrying may help.
    Storage,
}

impl LicenseError {
    /// Returns the caller-visible category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Malformed(_)
            | Self::InvalidSignature
            | Self::MissingClaim(_)
            | Self::NotYetValid(_)
            | Self::KeyMaterial(_) => ErrorCategory::InvalidLicense,
            Self::Expired(_) => ErrorCategory::Expired,
            Self::Storage(_) | Self::Io(_) | Self::Task(_) => ErrorCategory::Storage,
        }
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }
}

/// Errors raised by a [`ConfigStore`](crate::ConfigStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No value is stored under the key.
    #[error("no value stored for key: {0}")]
    NotFound(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not a JSON object of strings.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
