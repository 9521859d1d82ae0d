//! Token record rows.
//!
//! Borrowing operations over the `tokens` table. Every statement filters on
//! `deleted_at IS NULL`, so soft-deleted rows are invisible.

use account_tokens::{TokenRecord, Variety};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

// =============================================================================
// Types
// =============================================================================

type RowTuple = (
    Uuid,
    String,
    String,
    bool,
    Option<OffsetDateTime>,
    OffsetDateTime,
    OffsetDateTime,
    Option<OffsetDateTime>,
);

/// Token record as stored in the database.
#[derive(Debug, Clone)]
pub struct TokenRow {
    /// Record UUID
    pub id: Uuid,
    /// Owning identity
    pub identity: String,
    /// Variety name
    pub variety: String,
    /// Revoked flag
    pub revoked: bool,
    /// Last successful validation
    pub last_used_at: Option<OffsetDateTime>,
    /// Creation timestamp
    pub created_at: OffsetDateTime,
    /// Last modification timestamp
    pub updated_at: OffsetDateTime,
    /// Soft-delete timestamp
    pub deleted_at: Option<OffsetDateTime>,
}

impl TokenRow {
    fn from_tuple(row: RowTuple) -> Self {
        Self {
            id: row.0,
            identity: row.1,
            variety: row.2,
            revoked: row.3,
            last_used_at: row.4,
            created_at: row.5,
            updated_at: row.6,
            deleted_at: row.7,
        }
    }

    /// Converts the row into a domain record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the stored variety name is not recognised.
    pub fn into_record(self) -> StorageResult<TokenRecord> {
        let variety: Variety = self.variety.parse().map_err(|_| {
            StorageError::invalid_input(format!(
                "Token {} has unknown variety '{}'",
                self.id, self.variety
            ))
        })?;

        Ok(TokenRecord {
            id: self.id,
            identity: self.identity,
            variety,
            revoked: self.revoked,
            last_used_at: self.last_used_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

// =============================================================================
// Token Record Rows
// =============================================================================

/// Token record operations over a borrowed pool.
pub struct TokenRecordRows<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRecordRows<'a> {
    /// Create a new instance with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a fresh, unrevoked record.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the identifier is taken, or a database error.
    #[instrument(skip(self))]
    pub async fn insert(
        &self,
        id: Uuid,
        variety: Variety,
        identity: &str,
        at: OffsetDateTime,
    ) -> StorageResult<TokenRow> {
        let row: RowTuple = query_as(
            r#"
            INSERT INTO tokens (id, identity, variety, revoked, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, $4, $4)
            RETURNING id, identity, variety, revoked, last_used_at, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(identity)
        .bind(variety.name())
        .bind(at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict(format!("Token with id '{}' already exists", id));
            }
            StorageError::from(e)
        })?;

        Ok(TokenRow::from_tuple(row))
    }

    /// Find a live record by identifier and variety.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    #[instrument(skip(self))]
    pub async fn find(&self, id: Uuid, variety: Variety) -> StorageResult<Option<TokenRow>> {
        let row: Option<RowTuple> = query_as(
            r#"
            SELECT id, identity, variety, revoked, last_used_at, created_at, updated_at, deleted_at
            FROM tokens
            WHERE id = $1
              AND variety = $2
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(variety.name())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(TokenRow::from_tuple))
    }

    /// Set the last-use timestamp.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live record matches.
    #[instrument(skip(self))]
    pub async fn mark_used(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        let result = query(
            r#"
            UPDATE tokens
            SET last_used_at = $2,
                updated_at = $2
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("Token {}", id)));
        }
        Ok(())
    }

    /// Set the revoked flag.
    ///
    /// Returns `true` if this statement flipped the flag. The `revoked = FALSE`
    /// predicate is re-checked under the row lock, so of several concurrent
    /// callers only one updates the row. An already revoked row keeps its
    /// `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live record matches.
    #[instrument(skip(self))]
    pub async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<bool> {
        let result = query(
            r#"
            UPDATE tokens
            SET revoked = TRUE,
                updated_at = $2
            WHERE id = $1
              AND revoked = FALSE
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let live: Option<(Uuid,)> = query_as(
            r#"
            SELECT id
            FROM tokens
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match live {
            Some(_) => Ok(false),
            None => Err(StorageError::not_found(format!("Token {}", id))),
        }
    }

    /// Revoke every live, unrevoked record of an identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    #[instrument(skip(self))]
    pub async fn revoke_all_for_identity(
        &self,
        identity: &str,
        at: OffsetDateTime,
    ) -> StorageResult<u64> {
        let result = query(
            r#"
            UPDATE tokens
            SET revoked = TRUE,
                updated_at = $2
            WHERE identity = $1
              AND revoked = FALSE
              AND deleted_at IS NULL
            "#,
        )
        .bind(identity)
        .bind(at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete a record (soft delete).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live record matches.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        let result = query(
            r#"
            UPDATE tokens
            SET deleted_at = $2,
                updated_at = $2
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("Token {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(variety: &str) -> TokenRow {
        let now = datetime!(2024-01-15 10:00 UTC);
        TokenRow::from_tuple((
            Uuid::new_v4(),
            "u1".to_string(),
            variety.to_string(),
            false,
            None,
            now,
            now,
            None,
        ))
    }

    #[test]
    fn test_row_into_record() {
        let row = row("REFRESH_ACCESS");
        let id = row.id;

        let record = row.into_record().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.variety, Variety::REFRESH_ACCESS);
        assert_eq!(record.identity, "u1");
        assert!(record.is_live());
    }

    #[test]
    fn test_row_with_unknown_variety() {
        let err = row("REFRESH_DEVICE").into_record().unwrap_err();
        assert!(matches!(err, StorageError::InvalidInput(_)));
    }
}
