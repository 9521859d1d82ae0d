//! PostgreSQL storage backend for account tokens
//!
//! Persists token records in a single `tokens` table. Records are never
//! physically removed; deletion sets `deleted_at` and every read or update
//! ignores deleted rows.
//!
//! # Example
//!
//! ```ignore
//! use account_tokens_postgres::{PostgresTokenStore, PostgresTokenStorage};
//!
//! let store = PostgresTokenStore::connect("postgres://localhost/accounts", 10).await?;
//! store.migrate().await?;
//!
//! let storage: Arc<dyn TokenRecordStorage> = Arc::new(PostgresTokenStorage::new(store.pool_arc()));
//! ```

pub mod adapter;
pub mod records;
pub mod schema;

use std::sync::Arc;

use account_tokens::TokenError;
use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;
use tracing::error;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use adapter::PostgresTokenStorage;
pub use records::{TokenRecordRows, TokenRow};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during token storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored or supplied data is invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Message surfaced for every storage failure other than a missing record.
/// Driver and SQL details stay in the logs.
pub const STORAGE_FAILURE_MESSAGE: &str = "Token storage is unavailable";

impl From<StorageError> for TokenError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => TokenError::RecordNotFound,
            other => {
                error!(error = %other, "Token storage operation failed");
                TokenError::storage(STORAGE_FAILURE_MESSAGE)
            }
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Token Store
// =============================================================================

/// Owns the connection pool and hands out record operations.
#[derive(Debug, Clone)]
pub struct PostgresTokenStore {
    pool: Arc<PgPool>,
}

impl PostgresTokenStore {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str, pool_size: u32) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates the `tokens` table and its indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        schema::migrate(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the Arc-wrapped pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    /// Get token record operations.
    #[must_use]
    pub fn records(&self) -> TokenRecordRows<'_> {
        TokenRecordRows::new(&self.pool)
    }

    /// Builds an Arc-owning [`TokenRecordStorage`](account_tokens::TokenRecordStorage).
    #[must_use]
    pub fn storage(&self) -> PostgresTokenStorage {
        PostgresTokenStorage::new(self.pool_arc())
    }
}

// =============================================================================
// Tests
// =============================================================================
