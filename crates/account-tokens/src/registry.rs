//! Variety lifetime table.
//!
//! Built once at startup and handed to the [`TokenService`](crate::TokenService)
//! behind an `Arc`. There is no global table; tests and configuration build
//! their own.

use std::collections::{BTreeMap, HashMap};

use time::Duration;

use crate::TokenResult;
use crate::error::TokenError;
use crate::types::Variety;

/// Longest lifetime a variety may be given (one hundred years).
pub const MAX_LIFETIME: Duration = Duration::days(36_525);

/// Maps each variety to its time-to-live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarietyRegistry {
    lifetimes: HashMap<Variety, Duration>,
}

impl VarietyRegistry {
    /// Creates a registry with no entries. Every lookup fails until populated.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lifetimes: HashMap::new(),
        }
    }

    /// Creates the standard table used by the account service.
    #[must_use]
    pub fn standard() -> Self {
        let lifetimes = HashMap::from([
            (Variety::PHONE_OTP, Duration::minutes(5)),
            (Variety::AUTHORIZE_OTP, Duration::minutes(5)),
            (Variety::FIRST_LOGIN, Duration::minutes(30)),
            (Variety::REGISTER, Duration::minutes(15)),
            (Variety::AUTH, Duration::hours(24)),
            (Variety::REFRESH_AUTH, Duration::days(7)),
            (Variety::ACCESS, Duration::minutes(15)),
            (Variety::REFRESH_ACCESS, Duration::hours(2)),
            (Variety::DEVICE, Duration::days(1000)),
            (Variety::FORGOT_OTP, Duration::hours(24)),
            (Variety::RESET_PASSWORD, Duration::hours(1)),
            (Variety::CHANGE_NUMBER_OTP, Duration::hours(1)),
        ]);
        Self { lifetimes }
    }

    /// Builds the standard table with lifetimes overridden by name.
    ///
    /// Names are matched case-insensitively, since environment-derived
    /// configuration keys arrive lowercased.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariety` for a name that is not a variety and
    /// `Configuration` for a zero or out-of-range lifetime.
    pub fn with_overrides(
        overrides: &BTreeMap<String, std::time::Duration>,
    ) -> TokenResult<Self> {
        let mut registry = Self::standard();
        for (name, lifetime) in overrides {
            let variety: Variety = name.to_ascii_uppercase().parse()?;
            let lifetime = Duration::try_from(*lifetime).map_err(|e| {
                TokenError::configuration(format!("Lifetime for {name} is out of range: {e}"))
            })?;
            registry = registry.with_lifetime(variety, lifetime)?;
        }
        Ok(registry)
    }

    /// Sets the lifetime of `variety`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the lifetime is not positive or exceeds
    /// [`MAX_LIFETIME`].
    pub fn with_lifetime(mut self, variety: Variety, lifetime: Duration) -> TokenResult<Self> {
        if !lifetime.is_positive() {
            return Err(TokenError::configuration(format!(
                "Lifetime for {variety} must be positive, got {lifetime}"
            )));
        }
        if lifetime > MAX_LIFETIME {
            return Err(TokenError::configuration(format!(
                "Lifetime for {variety} exceeds the maximum of {MAX_LIFETIME}, got {lifetime}"
            )));
        }
        self.lifetimes.insert(variety, lifetime);
        Ok(self)
    }

    /// Removes `variety` from the table.
    #[must_use]
    pub fn without(mut self, variety: Variety) -> Self {
        self.lifetimes.remove(&variety);
        self
    }

    /// Returns the lifetime of `variety`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariety` if the variety has no entry.
    pub fn lifetime(&self, variety: Variety) -> TokenResult<Duration> {
        self.lifetimes
            .get(&variety)
            .copied()
            .ok_or_else(|| TokenError::unknown_variety(variety.name()))
    }

    /// Returns `true` if `variety` has an entry.
    #[must_use]
    pub fn contains(&self, variety: Variety) -> bool {
        self.lifetimes.contains_key(&variety)
    }

    /// Returns all entries in canonical variety order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Variety, Duration)> {
        let mut entries: Vec<_> = self.lifetimes.iter().map(|(v, d)| (*v, *d)).collect();
        entries.sort_by_key(|(variety, _)| *variety);
        entries
    }
}

impl Default for VarietyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let registry = VarietyRegistry::standard();

        let expected = [
            (Variety::PHONE_OTP, Duration::minutes(5)),
            (Variety::AUTHORIZE_OTP, Duration::minutes(5)),
            (Variety::FIRST_LOGIN, Duration::minutes(30)),
            (Variety::REGISTER, Duration::minutes(15)),
            (Variety::AUTH, Duration::hours(24)),
            (Variety::REFRESH_AUTH, Duration::days(7)),
            (Variety::ACCESS, Duration::minutes(15)),
            (Variety::REFRESH_ACCESS, Duration::hours(2)),
            (Variety::DEVICE, Duration::hours(24 * 1000)),
            (Variety::FORGOT_OTP, Duration::hours(24)),
            (Variety::RESET_PASSWORD, Duration::hours(1)),
            (Variety::CHANGE_NUMBER_OTP, Duration::hours(1)),
        ];

        for (variety, lifetime) in expected {
            assert_eq!(registry.lifetime(variety).unwrap(), lifetime, "{variety}");
        }
        assert_eq!(registry.entries().len(), Variety::ALL.len());
    }

    #[test]
    fn test_every_variety_is_registered() {
        let registry = VarietyRegistry::default();
        for variety in Variety::ALL {
            assert!(registry.contains(variety), "{variety} has no lifetime");
        }
    }

    #[test]
    fn test_missing_entry_is_unknown_variety() {
        let registry = VarietyRegistry::standard().without(Variety::DEVICE);
        let err = registry.lifetime(Variety::DEVICE).unwrap_err();
        assert!(matches!(err, TokenError::UnknownVariety { ref variety } if variety == "DEVICE"));

        assert!(VarietyRegistry::empty().lifetime(Variety::ACCESS).is_err());
    }

    #[test]
    fn test_with_lifetime_rejects_non_positive() {
        let result = VarietyRegistry::standard().with_lifetime(Variety::ACCESS, Duration::ZERO);
        assert!(matches!(result, Err(TokenError::Configuration { .. })));

        let registry = VarietyRegistry::standard()
            .with_lifetime(Variety::ACCESS, Duration::minutes(1))
            .unwrap();
        assert_eq!(registry.lifetime(Variety::ACCESS).unwrap(), Duration::minutes(1));
    }

    #[test]
    fn test_overrides_by_name() {
        let overrides = BTreeMap::from([
            ("ACCESS".to_string(), std::time::Duration::from_secs(600)),
            ("refresh_access".to_string(), std::time::Duration::from_secs(3600)),
        ]);
        let registry = VarietyRegistry::with_overrides(&overrides).unwrap();

        assert_eq!(registry.lifetime(Variety::ACCESS).unwrap(), Duration::minutes(10));
        assert_eq!(registry.lifetime(Variety::REFRESH_ACCESS).unwrap(), Duration::hours(1));
        assert_eq!(registry.lifetime(Variety::AUTH).unwrap(), Duration::hours(24));
    }

    #[test]
    fn test_overrides_reject_huge_lifetimes() {
        let four_hundred_thousand_years = std::time::Duration::from_secs(400_000 * 365 * 86_400);
        let overrides = BTreeMap::from([("ACCESS".to_string(), four_hundred_thousand_years)]);

        let err = VarietyRegistry::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, TokenError::Configuration { .. }));

        assert!(
            VarietyRegistry::standard()
                .with_lifetime(Variety::DEVICE, MAX_LIFETIME)
                .is_ok()
        );
        assert!(
            VarietyRegistry::standard()
                .with_lifetime(Variety::DEVICE, MAX_LIFETIME + Duration::SECOND)
                .is_err()
        );
    }

    #[test]
    fn test_overrides_reject_unknown_names() {
        let overrides = BTreeMap::from([(
            "AccessToken".to_string(),
            std::time::Duration::from_secs(600),
        )]);
        let err = VarietyRegistry::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, TokenError::UnknownVariety { .. }));
    }

    #[test]
    fn test_entries_are_ordered() {
        let entries = VarietyRegistry::standard().entries();
        let varieties: Vec<Variety> = entries.into_iter().map(|(v, _)| v).collect();
        let mut sorted = varieties.clone();
        sorted.sort();
        assert_eq!(varieties, sorted);
    }
}
