//! # account-tokens
//!
//! Purpose-bound signed tokens for the account service.
//!
//! Every token carries a *variety* (what it may be used for) and is backed by
//! a persisted record that tracks revocation and last use. A token is only
//! accepted when its signature verifies, it has not expired, its record
//! exists with the same variety, it has not been revoked, and its variety is
//! exactly the one the caller asked for.
//!
//! ## Modules
//!
//! - [`types`] - Varieties and the persisted token record
//! - [`registry`] - Variety lifetime table
//! - [`token`] - Token value object, JWT signer and the token service
//! - [`storage`] - Record storage trait and the in-memory implementation
//! - [`clock`] - Injectable time source
//! - [`config`] - Serde configuration types
//! - [`error`] - Error taxonomy

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod storage;
pub mod token;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{SigningConfig, TokensConfig};
pub use error::{ErrorCategory, TokenError};
pub use registry::VarietyRegistry;
pub use storage::{InMemoryTokenStorage, TokenRecordStorage};
pub use token::{
    ClaimMap, EncodedTokenPair, HmacJwtSigner, JwtError, SigningAlgorithm, Token, TokenConfig,
    TokenPair, TokenService, TokenSigner,
};
pub use types::{RefreshableKind, TokenKind, TokenRecord, Variety};

/// Type alias for token operation results.
pub type TokenResult<T> = Result<T, TokenError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use account_tokens::prelude::*;
/// ```
pub mod prelude {
    pub use crate::TokenResult;
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::{SigningConfig, TokensConfig};
    pub use crate::error::{ErrorCategory, TokenError};
    pub use crate::registry::VarietyRegistry;
    pub use crate::storage::{InMemoryTokenStorage, TokenRecordStorage};
    pub use crate::token::{
        ClaimMap, EncodedTokenPair, HmacJwtSigner, JwtError, SigningAlgorithm, Token, TokenConfig,
        TokenPair, TokenService, TokenSigner,
    };
    pub use crate::types::{RefreshableKind, TokenKind, TokenRecord, Variety};
}
