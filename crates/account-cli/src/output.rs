use account_tokens::{ClaimMap, Token};
use colored::Colorize;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// JSON view of a parsed or minted token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    pub id: Uuid,
    pub variety: String,
    pub identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub revoked: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_used_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "ClaimMap::is_empty")]
    pub extra: ClaimMap,
}

impl From<&Token> for TokenView {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id,
            variety: token.variety.name(),
            identity: token.identity.clone(),
            email: token.email.clone(),
            expires_at: token.expires_at,
            revoked: token.revoked,
            last_used_at: token.last_used_at,
            extra: token.extra.clone(),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
