mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::sync::Arc;

use account_tokens::{InMemoryTokenStorage, SystemClock, TokenRecordStorage, TokenService};
use account_tokens_postgres::PostgresTokenStore;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use cli::{Cli, Commands};
use config::{AppConfig, StorageBackend};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::loader::load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    observability::init_tracing_with_level(&config.logging.level);

    let registry = Arc::new(config.tokens.registry()?);

    if matches!(cli.command, Commands::Varieties) {
        return commands::admin::varieties(&registry);
    }

    let backend = Backend::connect(&config).await?;

    if matches!(cli.command, Commands::Migrate) {
        return commands::admin::migrate(backend.postgres()).await;
    }

    let service = TokenService::new(
        backend.storage(),
        Arc::new(config.tokens.signer()?),
        registry,
        Arc::new(SystemClock),
        config.tokens.token_config(),
    );

    match &cli.command {
        Commands::Mint(args) => commands::tokens::mint(&service, args).await?,
        Commands::Pair(args) => commands::tokens::pair(&service, args).await?,
        Commands::Inspect(args) => commands::tokens::inspect(&service, args).await?,
        Commands::Validate(args) => commands::tokens::validate(&service, args).await?,
        Commands::Refresh(args) => commands::tokens::refresh(&service, args).await?,
        Commands::Revoke(args) => commands::tokens::revoke(&service, args).await?,
        Commands::RevokeIdentity(args) => {
            commands::tokens::revoke_identity(&service, args).await?;
        }
        Commands::Varieties | Commands::Migrate => {}
    }

    Ok(())
}

/// Record store selected by `storage.backend`.
enum Backend {
    Memory(Arc<InMemoryTokenStorage>),
    Postgres(PostgresTokenStore),
}

impl Backend {
    async fn connect(config: &AppConfig) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                debug!("Using in-memory token storage");
                Ok(Self::Memory(Arc::new(InMemoryTokenStorage::new())))
            }
            StorageBackend::Postgres => {
                let url = config
                    .storage
                    .url
                    .as_deref()
                    .context("storage.url is required for the postgres backend")?;
                let store = PostgresTokenStore::connect(url, config.storage.pool_size)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                info!(pool_size = config.storage.pool_size, "Connected to PostgreSQL");
                Ok(Self::Postgres(store))
            }
        }
    }

    fn storage(&self) -> Arc<dyn TokenRecordStorage> {
        match self {
            Self::Memory(storage) => storage.clone(),
            Self::Postgres(store) => Arc::new(store.storage()),
        }
    }

    fn postgres(&self) -> Option<&PostgresTokenStore> {
        match self {
            Self::Postgres(store) => Some(store),
            Self::Memory(_) => None,
        }
    }
}
