//! In-memory token record storage.
//!
//! Backed by a [`DashMap`], so updates to one record take that record's shard
//! lock and are atomic with respect to each other.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::TokenResult;
use crate::error::TokenError;
use crate::storage::TokenRecordStorage;
use crate::types::{TokenRecord, Variety};

/// Process-local [`TokenRecordStorage`].
#[derive(Debug, Default)]
pub struct InMemoryTokenStorage {
    records: DashMap<Uuid, TokenRecord>,
}

impl InMemoryTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw record, including soft-deleted ones.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<TokenRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Number of records, including soft-deleted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn update_live<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut TokenRecord) -> T,
    ) -> TokenResult<T> {
        match self.records.get_mut(&id) {
            Some(mut record) if !record.is_deleted() => Ok(apply(record.value_mut())),
            _ => Err(TokenError::RecordNotFound),
        }
    }
}

#[async_trait]
impl TokenRecordStorage for InMemoryTokenStorage {
    async fn create(
        &self,
        variety: Variety,
        identity: &str,
        at: OffsetDateTime,
    ) -> TokenResult<TokenRecord> {
        let record = TokenRecord::new(variety, identity, at);
        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(TokenError::storage(format!(
                "Duplicate token id: {}",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn find(&self, id: Uuid, variety: Variety) -> TokenResult<Option<TokenRecord>> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.variety == variety && !r.is_deleted())
            .map(|r| r.value().clone()))
    }

    async fn mark_used(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()> {
        self.update_live(id, |record| {
            record.last_used_at = Some(at);
            record.updated_at = at;
        })
    }

    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<bool> {
        self.update_live(id, |record| {
            if record.revoked {
                return false;
            }
            record.revoked = true;
            record.updated_at = at;
            true
        })
    }

    async fn revoke_all_for_identity(
        &self,
        identity: &str,
        at: OffsetDateTime,
    ) -> TokenResult<u64> {
        let mut revoked = 0;
        for mut entry in self.records.iter_mut() {
            let record = entry.value_mut();
            if record.identity == identity && record.is_live() {
                record.revoked = true;
                record.updated_at = at;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn soft_delete(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()> {
        self.update_live(id, |record| {
            record.deleted_at = Some(at);
            record.updated_at = at;
        })
    }
}
