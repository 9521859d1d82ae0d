//! Token value object and its claim layout.
//!
//! A [`Token`] is rebuilt on every parse from the verified claims plus the
//! persisted [`TokenRecord`]. It is never stored itself.
//!
//! # Wire shape
//!
//! | Claim      | Type   | Required |
//! |------------|--------|----------|
//! | `variety`  | string | yes      |
//! | `identity` | string | yes      |
//! | `exp`      | number | yes      |
//! | `id`       | string | yes      |
//! | `username` | string | no       |
//!
//! Any other keys are caller-supplied extra claims and pass through verbatim.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::TokenResult;
use crate::token::jwt::{ClaimMap, TokenSigner};
use crate::types::{TokenRecord, Variety};

/// Claim holding the variety name.
pub const CLAIM_VARIETY: &str = "variety";
/// Claim holding the owning identity.
pub const CLAIM_IDENTITY: &str = "identity";
/// Claim holding the expiration as epoch seconds.
pub const CLAIM_EXPIRES_AT: &str = "exp";
/// Claim holding the record identifier.
pub const CLAIM_ID: &str = "id";
/// Claim holding the email, when present.
pub const CLAIM_USERNAME: &str = "username";
/// Alternate email claim accepted on parse.
pub const CLAIM_EMAIL: &str = "email";

/// Keys that extra claims can never override.
pub const RESERVED_CLAIMS: [&str; 5] = [
    CLAIM_VARIETY,
    CLAIM_IDENTITY,
    CLAIM_EXPIRES_AT,
    CLAIM_ID,
    CLAIM_USERNAME,
];

/// In-memory representation of one issued token.
#[derive(Clone)]
pub struct Token {
    /// Identifier of the backing record.
    pub id: Uuid,
    /// What the token may be used for.
    pub variety: Variety,
    /// The identity the token was issued to.
    pub identity: String,
    /// Email bound to the token, if any.
    pub email: Option<String>,
    /// Absolute expiration instant (whole seconds).
    pub expires_at: OffsetDateTime,
    /// Revoked flag, mirrored from the record.
    pub revoked: bool,
    /// Last-use timestamp, mirrored from the record.
    pub last_used_at: Option<OffsetDateTime>,
    /// Caller-supplied extra claims.
    pub extra: ClaimMap,
    /// The record as read at mint or parse time.
    pub record: TokenRecord,
    signer: Arc<dyn TokenSigner>,
}

impl Token {
    pub(crate) fn new(
        record: TokenRecord,
        email: Option<String>,
        expires_at: OffsetDateTime,
        extra: ClaimMap,
        signer: Arc<dyn TokenSigner>,
    ) -> Self {
        Self {
            id: record.id,
            variety: record.variety,
            identity: record.identity.clone(),
            email: email.filter(|e| !e.is_empty()),
            expires_at,
            revoked: record.revoked,
            last_used_at: record.last_used_at,
            extra,
            record,
            signer,
        }
    }

    /// Renders the signable claim set.
    ///
    /// Extra claims go in first and are then overwritten by the structural
    /// keys, so a colliding extra claim never survives.
    #[must_use]
    pub fn to_claims(&self) -> ClaimMap {
        let mut claims = self.extra.clone();
        claims.insert(CLAIM_VARIETY.into(), Value::String(self.variety.name()));
        claims.insert(CLAIM_IDENTITY.into(), Value::String(self.identity.clone()));
        claims.insert(
            CLAIM_EXPIRES_AT.into(),
            Value::from(self.expires_at.unix_timestamp()),
        );
        claims.insert(CLAIM_ID.into(), Value::String(self.id.to_string()));
        match &self.email {
            Some(email) => {
                claims.insert(CLAIM_USERNAME.into(), Value::String(email.clone()));
            }
            None => {
                claims.remove(CLAIM_USERNAME);
            }
        }
        claims
    }

    /// Signs the claim set.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if the signer fails.
    pub fn encode(&self) -> TokenResult<String> {
        Ok(self.signer.sign(&self.to_claims())?)
    }

    /// Returns `true` if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("variety", &self.variety)
            .field("identity", &self.identity)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .field("last_used_at", &self.last_used_at)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

/// A base token minted together with its refresh companion.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// The `AUTH` or `ACCESS` token.
    pub base: Token,
    /// The matching `REFRESH_*` token.
    pub refresh: Token,
}

impl TokenPair {
    /// Signs both tokens.
    ///
    /// Expirations come from the minted tokens themselves.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if either token cannot be signed.
    pub fn encode(&self) -> TokenResult<EncodedTokenPair> {
        Ok(EncodedTokenPair {
            base: self.base.encode()?,
            base_expires_at: self.base.expires_at,
            refresh: self.refresh.encode()?,
            refresh_expires_at: self.refresh.expires_at,
        })
    }
}

/// Signed form of a [`TokenPair`], shaped for login responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedTokenPair {
    /// Signed base token.
    pub base: String,
    /// When the base token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub base_expires_at: OffsetDateTime,
    /// Signed refresh token.
    pub refresh: String,
    /// When the refresh token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}
