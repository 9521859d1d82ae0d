use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "account-tokens")]
#[command(about = "Mint, inspect and revoke account tokens")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./account.toml when present)
    #[arg(short, long, global = true, env = "ACCOUNT_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every variety and its lifetime
    Varieties,
    /// Mint a single token
    Mint(MintArgs),
    /// Mint a base token together with its refresh companion
    Pair(PairArgs),
    /// Verify a token and show its claims and record state
    Inspect(TokenArgs),
    /// Validate a token for a variety and record its use
    Validate(ValidateArgs),
    /// Exchange a refresh token for a new pair
    Refresh(TokenArgs),
    /// Revoke a token
    Revoke(TokenArgs),
    /// Revoke every outstanding token of an identity
    RevokeIdentity(RevokeIdentityArgs),
    /// Create the token table (postgres backend only)
    Migrate,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PairKind {
    /// AUTH + REFRESH_AUTH
    Auth,
    /// ACCESS + REFRESH_ACCESS
    Access,
}

#[derive(clap::Args)]
pub struct MintArgs {
    /// Variety name (e.g. ACCESS, REFRESH_AUTH, PHONE_OTP)
    #[arg(short, long)]
    pub variety: String,
    /// Identity the token is issued to
    #[arg(short, long)]
    pub identity: String,
    /// Email bound to the token
    #[arg(short, long)]
    pub email: Option<String>,
    /// Extra claims as key=value (values are parsed as JSON when possible)
    #[arg(long = "claim")]
    pub claims: Vec<String>,
}

#[derive(clap::Args)]
pub struct PairArgs {
    /// Which pair to mint
    #[arg(short, long, default_value = "auth")]
    pub kind: PairKind,
    /// Identity the tokens are issued to
    #[arg(short, long)]
    pub identity: String,
    /// Email bound to the tokens
    #[arg(short, long)]
    pub email: Option<String>,
}

#[derive(clap::Args)]
pub struct TokenArgs {
    /// Signed token string
    pub token: String,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Signed token string
    pub token: String,
    /// Variety the token must have (repeat to accept several)
    #[arg(short, long = "variety", required = true)]
    pub varieties: Vec<String>,
}

#[derive(clap::Args)]
pub struct RevokeIdentityArgs {
    /// Identity whose tokens are revoked
    pub identity: String,
}
