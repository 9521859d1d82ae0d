//! Token error types.
//!
//! The core keeps every failure distinguishable so callers and tests can
//! assert on the cause. Request handlers are expected to collapse anything
//! for which [`TokenError::is_unauthenticated`] returns `true` into a single
//! generic "unauthenticated" response.

use std::fmt;

use crate::token::jwt::JwtError;

/// Errors that can occur while minting, parsing, validating or revoking tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The variety has no lifetime entry or is not a recognised name.
    #[error("Unknown token variety: {variety}")]
    UnknownVariety {
        /// The offending variety name.
        variety: String,
    },

    /// The signed string is malformed, forged, or lacks required claims.
    #[error("Token verification failed: {message}")]
    Verification {
        /// Description of the verification failure.
        message: String,
    },

    /// The signed expiration instant has passed.
    #[error("Token expired")]
    Expired,

    /// No live record matches the token's identifier and variety.
    #[error("Token record not found")]
    RecordNotFound,

    /// The token's record has been revoked.
    #[error("Token revoked")]
    Revoked,

    /// The token is of a different variety than the operation requires.
    #[error("Token variety mismatch: expected {expected}, got {actual}")]
    VarietyMismatch {
        /// The variety (or varieties) the caller asked for.
        expected: String,
        /// The variety the token carries.
        actual: String,
    },

    /// The token is not one of the refresh varieties.
    #[error("Not a refresh token: {variety}")]
    NotRefreshToken {
        /// The variety the token carries.
        variety: String,
    },

    /// The claim set could not be signed.
    #[error("Token signing failed: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The record store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The token service configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl TokenError {
    /// Creates a new `UnknownVariety` error.
    #[must_use]
    pub fn unknown_variety(variety: impl Into<String>) -> Self {
        Self::UnknownVariety {
            variety: variety.into(),
        }
    }

    /// Creates a new `Verification` error.
    #[must_use]
    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
        }
    }

    /// Creates a new `VarietyMismatch` error.
    #[must_use]
    pub fn variety_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::VarietyMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `NotRefreshToken` error.
    #[must_use]
    pub fn not_refresh_token(variety: impl Into<String>) -> Self {
        Self::NotRefreshToken {
            variety: variety.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the boundary layer should answer "unauthenticated".
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Verification { .. }
                | Self::Expired
                | Self::RecordNotFound
                | Self::Revoked
                | Self::VarietyMismatch { .. }
                | Self::NotRefreshToken { .. }
        )
    }

    /// Returns `true` if this is an internal failure (never the caller's fault).
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::UnknownVariety { .. }
                | Self::Signing { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Verification { .. } | Self::Expired | Self::RecordNotFound => {
                ErrorCategory::Token
            }
            Self::Revoked => ErrorCategory::Token,
            Self::VarietyMismatch { .. } | Self::NotRefreshToken { .. } => ErrorCategory::Variety,
            Self::UnknownVariety { .. } | Self::Configuration { .. } => {
                ErrorCategory::Configuration
            }
            Self::Signing { .. } => ErrorCategory::Internal,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
        }
    }
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::EncodingError { message } => Self::Signing { message },
            JwtError::InvalidKey { message } => Self::Configuration { message },
            other => Self::verification(other.to_string()),
        }
    }
}

/// Categories of token errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The presented token itself is unusable.
    Token,
    /// The token is valid but was presented for the wrong purpose.
    Variety,
    /// Misconfiguration, including unregistered varieties.
    Configuration,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Internal errors such as signing failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Variety => write!(f, "variety"),
            Self::Configuration => write!(f, "configuration"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
