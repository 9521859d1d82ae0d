//! Token service for minting, parsing, validating and revoking tokens.
//!
//! The service owns no mutable state of its own. Everything durable lives in
//! the [`TokenRecordStorage`], signing is delegated to a [`TokenSigner`] and
//! time comes from an injected [`Clock`].
//!
//! # Usage
//!
//! ```ignore
//! use account_tokens::prelude::*;
//!
//! let service = TokenService::new(storage, signer, registry, clock, TokenConfig::default());
//!
//! let token = service.mint(Variety::ACCESS, "u1", None, ClaimMap::new()).await?;
//! let signed = token.encode()?;
//!
//! let mut parsed = service.parse(&signed).await?;
//! service.validate_and_mark_used(&mut parsed, Variety::ACCESS).await?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::TokenResult;
use crate::clock::Clock;
use crate::error::TokenError;
use crate::registry::VarietyRegistry;
use crate::storage::TokenRecordStorage;
use crate::token::claims::{
    CLAIM_EMAIL, CLAIM_EXPIRES_AT, CLAIM_ID, CLAIM_IDENTITY, CLAIM_USERNAME, CLAIM_VARIETY,
    RESERVED_CLAIMS, Token, TokenPair,
};
use crate::token::jwt::{ClaimMap, TokenSigner};
use crate::types::{RefreshableKind, Variety};

/// Token service for issuing and checking purpose-bound tokens.
pub struct TokenService {
    /// Record store.
    storage: Arc<dyn TokenRecordStorage>,

    /// Signs and verifies the compact form.
    signer: Arc<dyn TokenSigner>,

    /// Variety lifetimes.
    registry: Arc<VarietyRegistry>,

    /// Time source for expirations and usage stamps.
    clock: Arc<dyn Clock>,

    /// Service configuration.
    config: TokenConfig,
}

/// Configuration for the token service.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Whether to rotate refresh tokens on use.
    /// When true, the presented refresh token is revoked before the new
    /// pair is minted.
    pub rotate_refresh_tokens: bool,
}

impl TokenConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rotate_refresh_tokens: true,
        }
    }

    /// Sets whether to rotate refresh tokens on use.
    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenService {
    /// Creates a new token service.
    ///
    /// # Arguments
    ///
    /// * `storage` - Store for token records
    /// * `signer` - Signer/verifier for the compact form
    /// * `registry` - Variety lifetime table
    /// * `clock` - Time source
    /// * `config` - Service configuration
    #[must_use]
    pub fn new(
        storage: Arc<dyn TokenRecordStorage>,
        signer: Arc<dyn TokenSigner>,
        registry: Arc<VarietyRegistry>,
        clock: Arc<dyn Clock>,
        config: TokenConfig,
    ) -> Self {
        Self {
            storage,
            signer,
            registry,
            clock,
            config,
        }
    }

    /// Mints a token of `variety` for `identity`.
    ///
    /// Creates the backing record and computes the expiration. Signing is
    /// deferred until [`Token::encode`] is called.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariety` if the variety has no lifetime, or
    /// `Configuration` if the lifetime pushes the expiration out of range. No
    /// record is created in either case. Returns a storage error if the
    /// record cannot be persisted.
    pub async fn mint(
        &self,
        variety: Variety,
        identity: &str,
        email: Option<&str>,
        extra: ClaimMap,
    ) -> TokenResult<Token> {
        let lifetime = self.registry.lifetime(variety)?;
        let now = self.clock.now();
        let expires_at = now.checked_add(lifetime).map(whole_seconds).ok_or_else(|| {
            TokenError::configuration(format!(
                "Lifetime of {variety} puts the expiration out of range"
            ))
        })?;
        let record = self.storage.create(variety, identity, now).await?;

        debug!(token.id = %record.id, %variety, %expires_at, "Minted token");

        Ok(Token::new(
            record,
            email.map(str::to_string),
            expires_at,
            extra,
            self.signer.clone(),
        ))
    }

    /// Verifies a signed string and resolves its record.
    ///
    /// Parsing is read-only; the same string may be parsed any number of
    /// times.
    ///
    /// # Errors
    ///
    /// - `Verification` if the signature is invalid or a required claim is
    ///   missing or mistyped
    /// - `Expired` if `exp` is at or before the current instant
    /// - `RecordNotFound` if no live record matches the identifier and variety
    pub async fn parse(&self, signed: &str) -> TokenResult<Token> {
        let mut claims = self.signer.verify(signed)?;

        let variety: Variety = string_claim(&claims, CLAIM_VARIETY)?
            .parse()
            .map_err(|_| TokenError::verification("Claim 'variety' is not a known variety"))?;
        let identity = string_claim(&claims, CLAIM_IDENTITY)?.to_owned();
        let id = Uuid::parse_str(string_claim(&claims, CLAIM_ID)?)
            .map_err(|_| TokenError::verification("Claim 'id' is not a valid identifier"))?;
        let expires_at = claims
            .get(CLAIM_EXPIRES_AT)
            .and_then(Value::as_i64)
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
            .ok_or_else(|| TokenError::verification("Claim 'exp' is missing or invalid"))?;
        let email = optional_string_claim(&claims, CLAIM_USERNAME)?
            .or(optional_string_claim(&claims, CLAIM_EMAIL)?);

        if expires_at <= self.clock.now() {
            debug!(token.id = %id, %variety, "Rejected expired token");
            return Err(TokenError::Expired);
        }

        let record = self
            .storage
            .find(id, variety)
            .await?
            .filter(|record| record.identity == identity)
            .ok_or(TokenError::RecordNotFound)?;

        for key in RESERVED_CLAIMS {
            claims.remove(key);
        }

        Ok(Token::new(
            record,
            email,
            expires_at,
            claims,
            self.signer.clone(),
        ))
    }

    /// Checks that `token` is unrevoked and exactly of `expected` variety,
    /// then records its use.
    ///
    /// Every success writes a last-use timestamp, so this must be called at
    /// most once per authorization decision.
    ///
    /// # Errors
    ///
    /// - `Revoked` if the token has been revoked
    /// - `VarietyMismatch` if the variety differs from `expected`
    pub async fn validate_and_mark_used(
        &self,
        token: &mut Token,
        expected: Variety,
    ) -> TokenResult<()> {
        self.validate_any_and_mark_used(token, &[expected]).await
    }

    /// Like [`validate_and_mark_used`](Self::validate_and_mark_used) but
    /// accepts any of `expected`. Exactly one usage write happens on success.
    ///
    /// # Errors
    ///
    /// - `Revoked` if the token has been revoked
    /// - `VarietyMismatch` if the variety is not in `expected`
    pub async fn validate_any_and_mark_used(
        &self,
        token: &mut Token,
        expected: &[Variety],
    ) -> TokenResult<()> {
        if token.revoked {
            debug!(token.id = %token.id, variety = %token.variety, "Rejected revoked token");
            return Err(TokenError::Revoked);
        }

        if !expected.contains(&token.variety) {
            let expected = expected
                .iter()
                .map(Variety::name)
                .collect::<Vec<_>>()
                .join(" or ");
            debug!(token.id = %token.id, variety = %token.variety, %expected, "Rejected token of wrong variety");
            return Err(TokenError::variety_mismatch(expected, token.variety.name()));
        }

        let now = self.clock.now();
        self.storage.mark_used(token.id, now).await?;

        token.last_used_at = Some(now);
        token.record.last_used_at = Some(now);
        token.record.updated_at = now;

        debug!(token.id = %token.id, variety = %token.variety, "Token validated");
        Ok(())
    }

    /// Parses a refresh token, validates it and resolves the base variety it
    /// renews.
    ///
    /// # Errors
    ///
    /// Any [`parse`](Self::parse) error, `NotRefreshToken` if the variety is
    /// not a refresh variety, or any validation error.
    pub async fn validate_refresh(&self, signed: &str) -> TokenResult<(Token, Variety)> {
        let mut token = self.parse(signed).await?;

        let base = token
            .variety
            .refreshed_base()
            .ok_or_else(|| TokenError::not_refresh_token(token.variety.name()))?;
        let expected = base
            .refresh_companion()
            .ok_or_else(|| TokenError::not_refresh_token(token.variety.name()))?;

        self.validate_and_mark_used(&mut token, expected).await?;
        Ok((token, base))
    }

    /// Mints a base token and its refresh companion.
    ///
    /// # Errors
    ///
    /// Returns an error if either mint fails.
    pub async fn create_paired_tokens(
        &self,
        kind: RefreshableKind,
        identity: &str,
        email: Option<&str>,
    ) -> TokenResult<TokenPair> {
        let base = self
            .mint(Variety::Base(kind.base()), identity, email, ClaimMap::new())
            .await?;
        let refresh = self
            .mint(Variety::Refresh(kind), identity, email, ClaimMap::new())
            .await?;

        info!(%identity, base = %base.variety, "Issued token pair");
        Ok(TokenPair { base, refresh })
    }

    /// Mints an `AUTH` / `REFRESH_AUTH` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if either mint fails.
    pub async fn create_auth_pair(
        &self,
        identity: &str,
        email: Option<&str>,
    ) -> TokenResult<TokenPair> {
        self.create_paired_tokens(RefreshableKind::Auth, identity, email)
            .await
    }

    /// Mints an `ACCESS` / `REFRESH_ACCESS` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if either mint fails.
    pub async fn create_access_pair(
        &self,
        identity: &str,
        email: Option<&str>,
    ) -> TokenResult<TokenPair> {
        self.create_paired_tokens(RefreshableKind::Access, identity, email)
            .await
    }

    /// Exchanges a refresh token for a fresh pair of the same kind.
    ///
    /// The new pair is minted before the presented token is touched, so a
    /// failed mint leaves the refresh token usable. With rotation enabled the
    /// presented token is then revoked, and only the exchange whose revocation
    /// flips the stored record keeps its pair. Any concurrent exchange of the
    /// same token fails with `Revoked` and its pair is soft-deleted.
    ///
    /// # Errors
    ///
    /// Any [`validate_refresh`](Self::validate_refresh) error, `Revoked` if
    /// another exchange consumed the token first, or an error from minting
    /// or revoking.
    pub async fn refresh_pair(&self, signed: &str) -> TokenResult<TokenPair> {
        let (mut presented, base) = self.validate_refresh(signed).await?;
        let Variety::Refresh(kind) = presented.variety else {
            return Err(TokenError::not_refresh_token(presented.variety.name()));
        };

        debug!(token.id = %presented.id, %base, "Refreshing token pair");
        let pair = self
            .create_paired_tokens(kind, &presented.identity, presented.email.as_deref())
            .await?;

        if self.config.rotate_refresh_tokens {
            match self.claim_revocation(&mut presented).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(token.id = %presented.id, "Refresh token already consumed");
                    self.discard_pair(&pair).await;
                    return Err(TokenError::Revoked);
                }
                Err(err) => {
                    self.discard_pair(&pair).await;
                    return Err(err);
                }
            }
        }

        Ok(pair)
    }

    /// Revokes `token`. Revoking an already revoked token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the record no longer exists, or a storage
    /// error.
    pub async fn revoke(&self, token: &mut Token) -> TokenResult<()> {
        if token.revoked {
            return Ok(());
        }

        if self.claim_revocation(token).await? {
            info!(token.id = %token.id, variety = %token.variety, "Token revoked");
        }
        Ok(())
    }

    /// Revokes the stored record and mirrors the flag onto `token`.
    ///
    /// Returns `true` if this call flipped the record.
    async fn claim_revocation(&self, token: &mut Token) -> TokenResult<bool> {
        let now = self.clock.now();
        let flipped = self.storage.revoke(token.id, now).await?;

        token.revoked = true;
        token.record.revoked = true;
        if flipped {
            token.record.updated_at = now;
        }
        Ok(flipped)
    }

    async fn discard_pair(&self, pair: &TokenPair) {
        let now = self.clock.now();
        for token in [&pair.base, &pair.refresh] {
            if let Err(err) = self.storage.soft_delete(token.id, now).await {
                warn!(token.id = %token.id, error = %err, "Failed to discard unissued token");
            }
        }
    }

    /// Revokes every outstanding token of `identity`.
    ///
    /// Returns the number of records revoked.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn revoke_all_for_identity(&self, identity: &str) -> TokenResult<u64> {
        let count = self
            .storage
            .revoke_all_for_identity(identity, self.clock.now())
            .await?;
        info!(%identity, count, "Revoked all tokens for identity");
        Ok(count)
    }

    /// Signs `token`.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if the signer fails.
    pub fn encode(&self, token: &Token) -> TokenResult<String> {
        token.encode()
    }

    /// Gets the variety registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<VarietyRegistry> {
        &self.registry
    }

    /// Gets the service configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

fn whole_seconds(at: OffsetDateTime) -> OffsetDateTime {
    at - Duration::nanoseconds(i64::from(at.nanosecond()))
}

fn string_claim<'a>(claims: &'a ClaimMap, key: &str) -> TokenResult<&'a str> {
    match claims.get(key) {
        Some(Value::String(value)) => Ok(value.as_str()),
        Some(_) => Err(TokenError::verification(format!(
            "Claim '{key}' must be a string"
        ))),
        None => Err(TokenError::verification(format!("Missing claim '{key}'"))),
    }
}

fn optional_string_claim(claims: &ClaimMap, key: &str) -> TokenResult<Option<String>> {
    match claims.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(TokenError::verification(format!(
            "Claim '{key}' must be a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::InMemoryTokenStorage;
    use crate::token::jwt::{HmacJwtSigner, JwtError, SigningAlgorithm};
    use crate::types::TokenRecord;
    use std::sync::atomic::{AtomicBool, Ordering};
    use serde_json::json;
    use time::macros::datetime;

    const SECRET: &str = "service-test-secret";

    struct FailingSigner;

    impl TokenSigner for FailingSigner {
        fn sign(&self, _claims: &ClaimMap) -> Result<String, JwtError> {
            Err(JwtError::encoding_error("key unavailable"))
        }

        fn verify(&self, _token: &str) -> Result<ClaimMap, JwtError> {
            Err(JwtError::InvalidSignature)
        }
    }

    /// Delegating store that yields after every lookup and can refuse inserts.
    #[derive(Default)]
    struct ScriptedStorage {
        inner: InMemoryTokenStorage,
        reject_creates: AtomicBool,
    }

    #[async_trait::async_trait]
    impl TokenRecordStorage for ScriptedStorage {
        async fn create(
            &self,
            variety: Variety,
            identity: &str,
            at: OffsetDateTime,
        ) -> TokenResult<TokenRecord> {
            if self.reject_creates.load(Ordering::SeqCst) {
                return Err(TokenError::storage("insert refused"));
            }
            self.inner.create(variety, identity, at).await
        }

        async fn find(&self, id: Uuid, variety: Variety) -> TokenResult<Option<TokenRecord>> {
            let found = self.inner.find(id, variety).await;
            tokio::task::yield_now().await;
            found
        }

        async fn mark_used(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()> {
            self.inner.mark_used(id, at).await
        }

        async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<bool> {
            self.inner.revoke(id, at).await
        }

        async fn revoke_all_for_identity(
            &self,
            identity: &str,
            at: OffsetDateTime,
        ) -> TokenResult<u64> {
            self.inner.revoke_all_for_identity(identity, at).await
        }

        async fn soft_delete(&self, id: Uuid, at: OffsetDateTime) -> TokenResult<()> {
            self.inner.soft_delete(id, at).await
        }
    }

    fn create_scripted_service() -> (TokenService, Arc<ScriptedStorage>) {
        let storage = Arc::new(ScriptedStorage::default());
        let service = TokenService::new(
            storage.clone(),
            Arc::new(HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap()),
            Arc::new(VarietyRegistry::standard()),
            Arc::new(FixedClock::new(datetime!(2024-06-01 12:00 UTC))),
            TokenConfig::default(),
        );
        (service, storage)
    }

    fn create_test_service() -> (TokenService, Arc<InMemoryTokenStorage>, Arc<FixedClock>) {
        create_test_service_with(TokenConfig::default())
    }

    fn create_test_service_with(
        config: TokenConfig,
    ) -> (TokenService, Arc<InMemoryTokenStorage>, Arc<FixedClock>) {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let clock = Arc::new(FixedClock::new(datetime!(2024-06-01 12:00 UTC)));
        let signer = Arc::new(HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap());

        let service = TokenService::new(
            storage.clone(),
            signer,
            Arc::new(VarietyRegistry::standard()),
            clock.clone(),
            config,
        );

        (service, storage, clock)
    }

    #[tokio::test]
    async fn test_mint_computes_expiration() {
        let (service, storage, clock) = create_test_service();

        let token = service
            .mint(Variety::PHONE_OTP, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        assert_eq!(token.expires_at, clock.now() + Duration::minutes(5));
        assert_eq!(token.identity, "u1");
        assert!(!token.revoked);
        assert!(token.last_used_at.is_none());
        assert!(storage.get(token.id).is_some());
    }

    #[tokio::test]
    async fn test_mint_unknown_variety_creates_no_record() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let service = TokenService::new(
            storage.clone(),
            Arc::new(HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap()),
            Arc::new(VarietyRegistry::standard().without(Variety::DEVICE)),
            Arc::new(FixedClock::new(datetime!(2024-06-01 12:00 UTC))),
            TokenConfig::default(),
        );

        let result = service
            .mint(Variety::DEVICE, "u1", None, ClaimMap::new())
            .await;

        assert!(matches!(result, Err(TokenError::UnknownVariety { .. })));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_parse_round_trip_with_email_and_extra() {
        let (service, _, _) = create_test_service();
        let mut extra = ClaimMap::new();
        extra.insert("department".into(), json!("billing"));

        let token = service
            .mint(Variety::REGISTER, "u1", Some("u1@example.com"), extra)
            .await
            .unwrap();
        let parsed = service.parse(&token.encode().unwrap()).await.unwrap();

        assert_eq!(parsed.id, token.id);
        assert_eq!(parsed.variety, Variety::REGISTER);
        assert_eq!(parsed.email.as_deref(), Some("u1@example.com"));
        assert_eq!(parsed.expires_at, token.expires_at);
        assert_eq!(parsed.extra.get("department"), Some(&json!("billing")));
        assert!(!parsed.extra.contains_key("variety"));
    }

    #[tokio::test]
    async fn test_parse_accepts_email_claim() {
        let (service, _, _) = create_test_service();
        let token = service
            .mint(Variety::AUTH, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        let mut claims = token.to_claims();
        claims.insert("email".into(), json!("legacy@example.com"));
        let signer = HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap();
        let signed = signer.sign(&claims).unwrap();

        let parsed = service.parse(&signed).await.unwrap();
        assert_eq!(parsed.email.as_deref(), Some("legacy@example.com"));
    }

    #[tokio::test]
    async fn test_parse_rejects_expired() {
        let (service, _, clock) = create_test_service();
        let token = service
            .mint(Variety::ACCESS, "u1", None, ClaimMap::new())
            .await
            .unwrap();
        let signed = token.encode().unwrap();

        clock.advance(Duration::minutes(15) - Duration::seconds(1));
        assert!(service.parse(&signed).await.is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            service.parse(&signed).await,
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_parse_rejects_malformed_claims() {
        let (service, _, clock) = create_test_service();
        let signer = HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap();
        let exp = (clock.now() + Duration::hours(1)).unix_timestamp();

        let cases = [
            json!({"variety": "ACCESS", "identity": "u1", "exp": exp}),
            json!({"variety": "ACCESS", "identity": "u1", "exp": exp, "id": "nope"}),
            json!({"variety": "BOGUS", "identity": "u1", "exp": exp, "id": Uuid::new_v4().to_string()}),
            json!({"variety": "ACCESS", "identity": 7, "exp": exp, "id": Uuid::new_v4().to_string()}),
            json!({"variety": "ACCESS", "identity": "u1", "exp": "soon", "id": Uuid::new_v4().to_string()}),
        ];

        for case in cases {
            let claims = case.as_object().unwrap().clone();
            let signed = signer.sign(&claims).unwrap();
            let err = service.parse(&signed).await.unwrap_err();
            assert!(
                matches!(err, TokenError::Verification { .. }),
                "{case}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_parse_rejects_identity_mismatch() {
        let (service, _, _) = create_test_service();
        let token = service
            .mint(Variety::AUTH, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        let mut claims = token.to_claims();
        claims.insert("identity".into(), json!("u2"));
        let signer = HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap();

        let result = service.parse(&signer.sign(&claims).unwrap()).await;
        assert!(matches!(result, Err(TokenError::RecordNotFound)));
    }

    #[tokio::test]
    async fn test_parse_variety_confusion_is_not_found() {
        let (service, _, _) = create_test_service();
        let token = service
            .mint(Variety::ACCESS, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        let mut claims = token.to_claims();
        claims.insert("variety".into(), json!("REFRESH_ACCESS"));
        let signer = HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap();

        let result = service.parse(&signer.sign(&claims).unwrap()).await;
        assert!(matches!(result, Err(TokenError::RecordNotFound)));
    }

    #[tokio::test]
    async fn test_validate_marks_used() {
        let (service, storage, clock) = create_test_service();
        let mut token = service
            .mint(Variety::ACCESS, "u1", None, ClaimMap::new())
            .await
            .unwrap();
        clock.advance(Duration::minutes(2));

        service
            .validate_and_mark_used(&mut token, Variety::ACCESS)
            .await
            .unwrap();

        assert_eq!(token.last_used_at, Some(clock.now()));
        assert_eq!(storage.get(token.id).unwrap().last_used_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_validate_variety_mismatch_writes_nothing() {
        let (service, storage, _) = create_test_service();
        let mut token = service
            .mint(Variety::AUTH, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        let err = service
            .validate_and_mark_used(&mut token, Variety::ACCESS)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TokenError::VarietyMismatch { ref expected, ref actual }
                if expected == "ACCESS" && actual == "AUTH"
        ));
        assert!(storage.get(token.id).unwrap().last_used_at.is_none());
    }

    #[tokio::test]
    async fn test_validate_any() {
        let (service, _, _) = create_test_service();
        let accepted = [Variety::FIRST_LOGIN, Variety::AUTH];

        let mut token = service
            .mint(Variety::AUTH, "u1", None, ClaimMap::new())
            .await
            .unwrap();
        service
            .validate_any_and_mark_used(&mut token, &accepted)
            .await
            .unwrap();

        let mut token = service
            .mint(Variety::ACCESS, "u1", None, ClaimMap::new())
            .await
            .unwrap();
        let err = service
            .validate_any_and_mark_used(&mut token, &accepted)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::VarietyMismatch { ref expected, .. } if expected == "FIRST_LOGIN or AUTH"
        ));
    }

    #[tokio::test]
    async fn test_revoked_wins_over_mismatch() {
        let (service, _, _) = create_test_service();
        let mut token = service
            .mint(Variety::AUTH, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        service.revoke(&mut token).await.unwrap();

        let err = service
            .validate_and_mark_used(&mut token, Variety::ACCESS)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Revoked));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (service, storage, clock) = create_test_service();
        let mut token = service
            .mint(Variety::DEVICE, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        service.revoke(&mut token).await.unwrap();
        let revoked_at = storage.get(token.id).unwrap().updated_at;
        clock.advance(Duration::minutes(1));
        service.revoke(&mut token).await.unwrap();

        assert!(token.revoked);
        assert_eq!(storage.get(token.id).unwrap().updated_at, revoked_at);
    }

    #[tokio::test]
    async fn test_revoke_soft_deleted_record() {
        let (service, storage, clock) = create_test_service();
        let mut token = service
            .mint(Variety::DEVICE, "u1", None, ClaimMap::new())
            .await
            .unwrap();
        storage.soft_delete(token.id, clock.now()).await.unwrap();

        let result = service.revoke(&mut token).await;
        assert!(matches!(result, Err(TokenError::RecordNotFound)));
        assert!(!token.revoked);
    }

    #[tokio::test]
    async fn test_validate_refresh_resolves_base() {
        let (service, _, _) = create_test_service();
        let pair = service.create_access_pair("u1", None).await.unwrap();

        let (token, base) = service
            .validate_refresh(&pair.refresh.encode().unwrap())
            .await
            .unwrap();

        assert_eq!(base, Variety::ACCESS);
        assert_eq!(token.variety, Variety::REFRESH_ACCESS);
        assert!(token.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_validate_refresh_rejects_base_token() {
        let (service, _, _) = create_test_service();
        let pair = service.create_auth_pair("u1", None).await.unwrap();

        let err = service
            .validate_refresh(&pair.base.encode().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::NotRefreshToken { ref variety } if variety == "AUTH"));
    }

    #[tokio::test]
    async fn test_refresh_pair_rotates() {
        let (service, storage, _) = create_test_service();
        let pair = service
            .create_auth_pair("u1", Some("u1@example.com"))
            .await
            .unwrap();
        let signed = pair.refresh.encode().unwrap();

        let fresh = service.refresh_pair(&signed).await.unwrap();

        assert_eq!(fresh.base.variety, Variety::AUTH);
        assert_eq!(fresh.refresh.variety, Variety::REFRESH_AUTH);
        assert_eq!(fresh.base.email.as_deref(), Some("u1@example.com"));
        assert!(storage.get(pair.refresh.id).unwrap().revoked);

        let replay = service.refresh_pair(&signed).await;
        assert!(matches!(replay, Err(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_issues_one_pair() {
        let (service, storage) = create_scripted_service();
        let pair = service.create_auth_pair("u1", None).await.unwrap();
        let signed = pair.refresh.encode().unwrap();

        let (first, second) =
            tokio::join!(service.refresh_pair(&signed), service.refresh_pair(&signed));

        let (winner, loser) = match (first, second) {
            (Ok(pair), Err(err)) | (Err(err), Ok(pair)) => (pair, err),
            (first, second) => panic!(
                "expected exactly one exchange to succeed, got {:?} and {:?}",
                first.map(|p| p.base.id),
                second.map(|p| p.base.id)
            ),
        };
        assert!(matches!(loser, TokenError::Revoked));
        assert!(storage.inner.get(pair.refresh.id).unwrap().revoked);
        assert!(storage.inner.get(winner.refresh.id).unwrap().is_live());
        assert_eq!(storage.inner.len(), 6);

        // Live and unrevoked: the original AUTH token and the winning pair.
        let outstanding = service.revoke_all_for_identity("u1").await.unwrap();
        assert_eq!(outstanding, 3);
    }

    #[tokio::test]
    async fn test_refresh_pair_mint_failure_keeps_refresh_token() {
        let (service, storage) = create_scripted_service();
        let pair = service.create_access_pair("u1", None).await.unwrap();
        let signed = pair.refresh.encode().unwrap();

        storage.reject_creates.store(true, Ordering::SeqCst);
        let result = service.refresh_pair(&signed).await;
        assert!(matches!(result, Err(TokenError::Storage { .. })));
        assert!(!storage.inner.get(pair.refresh.id).unwrap().revoked);

        storage.reject_creates.store(false, Ordering::SeqCst);
        let fresh = service.refresh_pair(&signed).await.unwrap();
        assert_eq!(fresh.base.variety, Variety::ACCESS);
        assert!(storage.inner.get(pair.refresh.id).unwrap().revoked);
    }

    #[tokio::test]
    async fn test_mint_expiration_out_of_range() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        let service = TokenService::new(
            storage.clone(),
            Arc::new(HmacJwtSigner::from_secret(SECRET, SigningAlgorithm::HS256).unwrap()),
            Arc::new(VarietyRegistry::standard()),
            Arc::new(FixedClock::new(datetime!(9999-12-31 23:59:59 UTC))),
            TokenConfig::default(),
        );

        let result = service
            .mint(Variety::ACCESS, "u1", None, ClaimMap::new())
            .await;

        assert!(matches!(result, Err(TokenError::Configuration { .. })));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_pair_without_rotation() {
        let (service, storage, _) =
            create_test_service_with(TokenConfig::new().with_rotate_refresh_tokens(false));
        let pair = service.create_access_pair("u1", None).await.unwrap();
        let signed = pair.refresh.encode().unwrap();

        service.refresh_pair(&signed).await.unwrap();
        service.refresh_pair(&signed).await.unwrap();

        assert!(!storage.get(pair.refresh.id).unwrap().revoked);
        assert_eq!(storage.len(), 6);
    }

    #[tokio::test]
    async fn test_revoke_all_for_identity() {
        let (service, _, _) = create_test_service();
        let pair = service.create_auth_pair("u1", None).await.unwrap();
        let other = service.create_auth_pair("u2", None).await.unwrap();

        assert_eq!(service.revoke_all_for_identity("u1").await.unwrap(), 2);

        let parsed = service.parse(&pair.base.encode().unwrap()).await.unwrap();
        assert!(parsed.revoked);
        let parsed = service.parse(&other.base.encode().unwrap()).await.unwrap();
        assert!(!parsed.revoked);
    }

    #[tokio::test]
    async fn test_signing_failure_is_propagated() {
        let service = TokenService::new(
            Arc::new(InMemoryTokenStorage::new()),
            Arc::new(FailingSigner),
            Arc::new(VarietyRegistry::standard()),
            Arc::new(FixedClock::new(datetime!(2024-06-01 12:00 UTC))),
            TokenConfig::default(),
        );

        let token = service
            .mint(Variety::ACCESS, "u1", None, ClaimMap::new())
            .await
            .unwrap();

        let err = service.encode(&token).unwrap_err();
        assert!(matches!(err, TokenError::Signing { .. }));
        assert!(err.is_internal());
    }

    #[test]
    fn test_whole_seconds() {
        let at = datetime!(2024-06-01 12:00:00.987 UTC);
        assert_eq!(whole_seconds(at), datetime!(2024-06-01 12:00 UTC));
    }

    #[test]
    fn test_token_config_defaults() {
        assert!(TokenConfig::default().rotate_refresh_tokens);
        assert!(!TokenConfig::new().with_rotate_refresh_tokens(false).rotate_refresh_tokens);
    }
}
