//! CLI configuration.
//!
//! Sources, lowest priority first: legacy `JWT_SECRET` / `DB_DSN`
//! variables, the TOML file, then `ACCOUNT__SECTION__KEY` variables.

use account_tokens::TokensConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub tokens: TokensConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; records vanish when the command exits.
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Connection URL, required for the postgres backend.
    pub url: Option<String>,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: None,
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.tokens.validate().map_err(|e| e.to_string())?;

        if self.storage.backend == StorageBackend::Postgres
            && self.storage.url.as_deref().is_none_or(str::is_empty)
        {
            return Err("storage.url is required for the postgres backend".into());
        }
        if self.storage.pool_size == 0 {
            return Err("storage.pool_size must be > 0".into());
        }

        Ok(())
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    const DEFAULT_PATH: &str = "account.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();

        // Variables from the pre-1.0 deployment, used only when nothing else sets the key.
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            builder = builder
                .set_default("tokens.signing.secret", secret)
                .map_err(|e| format!("config default error: {e}"))?;
        }
        if let Ok(dsn) = std::env::var("DB_DSN") {
            builder = builder
                .set_default("storage.url", dsn)
                .and_then(|b| b.set_default("storage.backend", "postgres"))
                .map_err(|e| format!("config default error: {e}"))?;
        }

        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }

        // Environment variable overrides, e.g., ACCOUNT__TOKENS__SIGNING__SECRET=...
        builder = builder.add_source(
            Environment::with_prefix("ACCOUNT")
                .try_parsing(true)
                .separator("__"),
        );

        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
