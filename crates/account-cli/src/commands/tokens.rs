use account_tokens::{ClaimMap, TokenService, Variety};
use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::{MintArgs, PairArgs, PairKind, RevokeIdentityArgs, TokenArgs, ValidateArgs};
use crate::output::{TokenView, print_json, print_success};

#[derive(Serialize)]
struct Minted {
    token: String,
    #[serde(flatten)]
    details: TokenView,
}

pub async fn mint(service: &TokenService, args: &MintArgs) -> Result<()> {
    let variety: Variety = args.variety.parse()?;
    let extra = parse_claims(&args.claims)?;

    let token = service
        .mint(variety, &args.identity, args.email.as_deref(), extra)
        .await?;

    print_json(&Minted {
        token: token.encode()?,
        details: TokenView::from(&token),
    })
}

pub async fn pair(service: &TokenService, args: &PairArgs) -> Result<()> {
    let email = args.email.as_deref();
    let pair = match args.kind {
        PairKind::Auth => service.create_auth_pair(&args.identity, email).await?,
        PairKind::Access => service.create_access_pair(&args.identity, email).await?,
    };
    print_json(&pair.encode()?)
}

pub async fn inspect(service: &TokenService, args: &TokenArgs) -> Result<()> {
    let token = service.parse(&args.token).await?;
    print_json(&TokenView::from(&token))
}

pub async fn validate(service: &TokenService, args: &ValidateArgs) -> Result<()> {
    let expected = args
        .varieties
        .iter()
        .map(|v| v.parse::<Variety>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut token = service.parse(&args.token).await?;
    service
        .validate_any_and_mark_used(&mut token, &expected)
        .await?;

    print_success(&format!("Token is a valid {}", token.variety));
    print_json(&TokenView::from(&token))
}

pub async fn refresh(service: &TokenService, args: &TokenArgs) -> Result<()> {
    let pair = service.refresh_pair(&args.token).await?;
    print_json(&pair.encode()?)
}

pub async fn revoke(service: &TokenService, args: &TokenArgs) -> Result<()> {
    let mut token = service.parse(&args.token).await?;
    service.revoke(&mut token).await?;
    print_success(&format!("Revoked {} token {}", token.variety, token.id));
    Ok(())
}

pub async fn revoke_identity(service: &TokenService, args: &RevokeIdentityArgs) -> Result<()> {
    let count = service.revoke_all_for_identity(&args.identity).await?;
    print_json(&json!({ "identity": args.identity, "revoked": count }))
}

/// Parses `key=value` pairs; values that are valid JSON keep their type.
fn parse_claims(raw: &[String]) -> Result<ClaimMap> {
    let mut claims = ClaimMap::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid claim '{pair}', expected key=value");
        };
        if key.is_empty() {
            bail!("invalid claim '{pair}', key is empty");
        }
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        claims.insert(key.to_string(), value);
    }
    Ok(claims)
}
