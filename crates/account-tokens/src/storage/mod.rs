//! Token record storage.
//!
//! The token service never touches a database directly; it consumes the
//! [`TokenRecordStorage`] trait. Two implementations exist:
//!
//! - [`InMemoryTokenStorage`] in this crate, for tests and single-process use
//! - `PostgresTokenStorage` in `account-tokens-postgres`
//!
//! # Consistency
//!
//! Implementations must be strongly consistent for a single caller: a record
//! returned by [`create`](TokenRecordStorage::create) must be visible to an
//! immediately following [`find`](TokenRecordStorage::find). Updates to a
//! single record must be atomic so a concurrent `mark_used` cannot undo a
//! `revoke`.

pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::TokenResult;
use crate::types::{TokenRecord, Variety};

pub use memory::InMemoryTokenStorage;

/// Storage trait for token records.
///
/// Soft-deleted records are invisible to every operation except
/// [`soft_delete`](TokenRecordStorage::soft_delete) itself.
#[async_trait]
pub trait TokenRecordStorage: Send + Sync {
    /// Creates a fresh, unrevoked record for `(variety, identity)`.
    ///
    /// The store assigns the identifier; identifiers are never reused.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be persisted.
    async fn create(
        &self,
        variety: Variety,
        identity: &str,
        at: OffsetDateTime,
    ) -> TokenResult<TokenRecord>;

    /// Finds a live record by identifier and variety.
    ///
    /// A record whose variety differs from `variety` is reported as `None`,
    /// exactly like a missing one.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    async fn find(&self, id: Uuid, variety: Variety) -> TokenResult<Option<TokenRecord>>;

    /// Sets the record's last-use timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if no live record has this identifier.
    async fn mark_used(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()>;

    /// Flips the record's revoked flag to `true`.
    ///
    /// Returns `true` only for the call that performed the flip. Revoking an
    /// already revoked record succeeds without modifying it and returns
    /// `false`. The check and the flip must be one atomic step, so of several
    /// concurrent callers exactly one observes `true`.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if no live record has this identifier.
    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<bool>;

    /// Revokes every live, unrevoked record owned by `identity`.
    ///
    /// Returns the number of records flipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    async fn revoke_all_for_identity(&self, identity: &str, at: OffsetDateTime)
    -> TokenResult<u64>;

    /// Marks the record deleted. Its identifier stays reserved.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if no live record has this identifier.
    async fn soft_delete(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()>;
}
