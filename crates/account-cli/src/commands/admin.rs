use account_tokens::VarietyRegistry;
use account_tokens_postgres::PostgresTokenStore;
use anyhow::{Result, bail};
use serde::Serialize;

use crate::output::{print_json, print_success};

#[derive(Serialize)]
struct VarietyEntry {
    variety: String,
    lifetime: String,
    seconds: i64,
    refresh: bool,
}

pub fn varieties(registry: &VarietyRegistry) -> Result<()> {
    let entries: Vec<VarietyEntry> = registry
        .entries()
        .into_iter()
        .map(|(variety, lifetime)| VarietyEntry {
            variety: variety.name(),
            lifetime: lifetime.to_string(),
            seconds: lifetime.whole_seconds(),
            refresh: variety.is_refresh(),
        })
        .collect();
    print_json(&entries)
}

pub async fn migrate(store: Option<&PostgresTokenStore>) -> Result<()> {
    let Some(store) = store else {
        bail!("migrate requires storage.backend = \"postgres\"");
    };
    store.migrate().await?;
    print_success("Token schema is up to date");
    Ok(())
}
