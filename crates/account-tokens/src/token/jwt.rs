//! JWT signing and verification.
//!
//! Tokens are signed with a shared secret (HMAC). The claim set is an open
//! JSON object because callers may attach arbitrary extra claims; the
//! structural keys are enforced by [`Token`](crate::token::Token) and the
//! [`TokenService`](crate::TokenService), not here.
//!
//! Expiration is deliberately not checked by the verifier. The token service
//! compares `exp` against its own [`Clock`](crate::clock::Clock) so that
//! expiry is deterministic under test.
//!
//! ## Example
//!
//! ```ignore
//! use account_tokens::token::jwt::{HmacJwtSigner, SigningAlgorithm, TokenSigner};
//!
//! let signer = HmacJwtSigner::from_secret("change-me", SigningAlgorithm::HS256)?;
//! let token = signer.sign(&claims)?;
//! let decoded = signer.verify(&token)?;
//! ```

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// A decoded or to-be-signed claim set.
pub type ClaimMap = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// A required claim is missing.
    #[error("Missing required claim: {claim}")]
    MissingClaim {
        /// Name of the missing claim.
        claim: String,
    },

    /// Invalid key material.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `MissingClaim` error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim {
            claim: claim.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if the presented token is at fault.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::DecodingError { .. }
                | Self::InvalidSignature
                | Self::InvalidClaims { .. }
                | Self::MissingClaim { .. }
        )
    }

    /// Returns `true` if this is a key-related error.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::MissingRequiredClaim(claim) => Self::missing_claim(claim.clone()),
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::decoding_error(err.to_string()),
            ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(JwtError::invalid_key(format!(
                "Unsupported signing algorithm: {other}"
            ))),
        }
    }
}

// ============================================================================
// Signer
// ============================================================================

/// Produces and verifies compact signed representations of a claim set.
pub trait TokenSigner: Send + Sync {
    /// Signs `claims` into a compact token string.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    fn sign(&self, claims: &ClaimMap) -> Result<String, JwtError>;

    /// Verifies the signature of `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed or the signature is invalid.
    fn verify(&self, token: &str) -> Result<ClaimMap, JwtError>;
}

/// HMAC-based [`TokenSigner`] backed by `jsonwebtoken`.
///
/// Thread-safe (`Send + Sync`) and meant to be shared behind an `Arc`.
pub struct HmacJwtSigner {
    algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl HmacJwtSigner {
    /// Creates a signer from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the secret is empty.
    pub fn from_secret(secret: &str, algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::invalid_key("Signing secret must not be empty"));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        // Checked by the token service against its own clock.
        validation.validate_exp = false;
        // Extra claims may carry an `aud`; audiences are not part of this scheme.
        validation.validate_aud = false;
        validation
    }
}

impl fmt::Debug for HmacJwtSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacJwtSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenSigner for HmacJwtSigner {
    fn sign(&self, claims: &ClaimMap) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm.to_jwt_algorithm());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<ClaimMap, JwtError> {
        decode::<ClaimMap>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
