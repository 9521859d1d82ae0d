//! Arc-owning [`TokenRecordStorage`] adapter.
//!
//! Wraps the lifetime-based [`TokenRecordRows`] and owns an `Arc<PgPool>`,
//! so it can be handed to the token service as `Arc<dyn TokenRecordStorage>`.

use std::sync::Arc;

use account_tokens::{TokenRecord, TokenRecordStorage, TokenResult, Variety};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::PgPool;
use crate::records::TokenRecordRows;

/// PostgreSQL-backed token record storage.
#[derive(Debug, Clone)]
pub struct PostgresTokenStorage {
    pool: Arc<PgPool>,
}

impl PostgresTokenStorage {
    /// Create a new Arc-owning token record storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn rows(&self) -> TokenRecordRows<'_> {
        TokenRecordRows::new(&self.pool)
    }
}

#[async_trait]
impl TokenRecordStorage for PostgresTokenStorage {
    async fn create(
        &self,
        variety: Variety,
        identity: &str,
        at: OffsetDateTime,
    ) -> TokenResult<TokenRecord> {
        let row = self
            .rows()
            .insert(Uuid::new_v4(), variety, identity, at)
            .await?;
        Ok(row.into_record()?)
    }

    async fn find(&self, id: Uuid, variety: Variety) -> TokenResult<Option<TokenRecord>> {
        match self.rows().find(id, variety).await? {
            Some(row) => Ok(Some(row.into_record()?)),
            None => Ok(None),
        }
    }

    async fn mark_used(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()> {
        Ok(self.rows().mark_used(id, at).await?)
    }

    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<bool> {
        Ok(self.rows().revoke(id, at).await?)
    }

    async fn revoke_all_for_identity(
        &self,
        identity: &str,
        at: OffsetDateTime,
    ) -> TokenResult<u64> {
        Ok(self.rows().revoke_all_for_identity(identity, at).await?)
    }

    async fn soft_delete(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()> {
        Ok(self.rows().soft_delete(id, at).await?)
    }
}
