//! Persisted token record.
//!
//! The record is the durable side of a token: it tracks revocation and usage
//! independently of the signed string. Records are created once per minted
//! token, only ever mutated to flip `revoked` to `true` or to bump
//! `last_used_at`, and are soft-deleted rather than removed.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::variety::Variety;

/// A token record as stored by a [`TokenRecordStorage`](crate::storage::TokenRecordStorage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Unique identifier, assigned at creation and never reused.
    pub id: Uuid,

    /// The identity (user ID) the token was issued to.
    pub identity: String,

    /// What the token may be used for.
    pub variety: Variety,

    /// Whether the token has been revoked. Only ever goes `false` -> `true`.
    pub revoked: bool,

    /// When the token last passed validation.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_used_at: Option<OffsetDateTime>,

    /// When the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the record was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// When the record was soft-deleted.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub deleted_at: Option<OffsetDateTime>,
}

impl TokenRecord {
    /// Creates a fresh, unrevoked, never-used record.
    #[must_use]
    pub fn new(variety: Variety, identity: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.into(),
            variety,
            revoked: false,
            last_used_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns `true` if the record has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns `true` if the record can still back a valid token.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.revoked && !self.is_deleted()
    }
}
