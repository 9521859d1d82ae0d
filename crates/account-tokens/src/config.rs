//! Token service configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [tokens]
//! rotate_refresh_tokens = true
//!
//! [tokens.signing]
//! secret = "change-me"
//! algorithm = "HS256"
//!
//! [tokens.lifetimes]
//! ACCESS = "10m"
//! REFRESH_ACCESS = "1h"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TokenResult;
use crate::error::TokenError;
use crate::registry::VarietyRegistry;
use crate::token::jwt::{HmacJwtSigner, SigningAlgorithm};
use crate::token::service::TokenConfig;

/// Token issuance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokensConfig {
    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Revoke a refresh token when it is exchanged for a new pair.
    pub rotate_refresh_tokens: bool,

    /// Lifetime overrides keyed by variety name (`ACCESS`, `REFRESH_AUTH`, ...).
    /// Varieties not listed keep their built-in lifetime.
    #[serde(with = "lifetimes_serde")]
    pub lifetimes: BTreeMap<String, Duration>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            signing: SigningConfig::default(),
            rotate_refresh_tokens: true,
            lifetimes: BTreeMap::new(),
        }
    }
}

impl TokensConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an empty secret and `UnknownVariety` or
    /// `Configuration` for a bad lifetime override.
    pub fn validate(&self) -> TokenResult<()> {
        if self.signing.secret.is_empty() {
            return Err(TokenError::configuration("signing secret cannot be empty"));
        }
        self.registry().map(|_| ())
    }

    /// Builds the variety registry with overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown variety name or non-positive lifetime.
    pub fn registry(&self) -> TokenResult<VarietyRegistry> {
        VarietyRegistry::with_overrides(&self.lifetimes)
    }

    /// Builds the JWT signer.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the secret is empty.
    pub fn signer(&self) -> TokenResult<HmacJwtSigner> {
        Ok(HmacJwtSigner::from_secret(
            &self.signing.secret,
            self.signing.algorithm,
        )?)
    }

    /// Returns the runtime service configuration.
    #[must_use]
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new().with_rotate_refresh_tokens(self.rotate_refresh_tokens)
    }
}

/// Token signing configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Shared HMAC secret.
    pub secret: String,

    /// Signing algorithm: HS256, HS384, or HS512.
    pub algorithm: SigningAlgorithm,
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

mod lifetimes_serde {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        lifetimes: &BTreeMap<String, Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            lifetimes
                .iter()
                .map(|(name, lifetime)| (name, humantime_serde::Serde::from(*lifetime))),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Duration>, D::Error> {
        let raw = BTreeMap::<String, humantime_serde::Serde<Duration>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(name, lifetime)| (name, lifetime.into_inner()))
            .collect())
    }
}
