//! Token issuance, signing and verification.
//!
//! This module provides:
//!
//! - The [`Token`] value object and its claim layout
//! - HMAC JWT signing and verification
//! - The [`TokenService`] that ties storage, signing and lifetimes together

pub mod claims;
pub mod jwt;
pub mod service;

pub use claims::{EncodedTokenPair, RESERVED_CLAIMS, Token, TokenPair};
pub use jwt::{ClaimMap, HmacJwtSigner, JwtError, SigningAlgorithm, TokenSigner};
pub use service::{TokenConfig, TokenService};
