//! Table bootstrap.
//!
//! Idempotent DDL run at startup or through the CLI `migrate` command.

use sqlx_core::query::query;
use tracing::{info, instrument};

use crate::{PgPool, StorageResult};

/// DDL statements, executed in order.
pub const STATEMENTS: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS tokens (
        id UUID PRIMARY KEY,
        identity TEXT NOT NULL,
        variety TEXT NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE,
        last_used_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tokens_identity
        ON tokens (identity)
        WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tokens_deleted_at
        ON tokens (deleted_at)
    "#,
];

/// Creates the `tokens` table and indexes if they do not exist.
///
/// # Errors
///
/// Returns an error if any statement fails.
#[instrument(skip(pool))]
pub async fn migrate(pool: &PgPool) -> StorageResult<()> {
    for statement in STATEMENTS {
        query(statement).execute(pool).await?;
    }
    info!("Token schema is up to date");
    Ok(())
}
