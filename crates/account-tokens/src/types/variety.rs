//! Token varieties.
//!
//! A variety is the purpose a token was minted for. Base varieties are
//! standalone; refresh varieties exist only for [`RefreshableKind`] and
//! renew exactly one base variety. The relationship is carried by the type
//! rather than by the `REFRESH_` naming convention, which only matters on
//! the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TokenError;

const REFRESH_PREFIX: &str = "REFRESH_";

/// Base token purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    /// One-time code sent to a phone.
    PhoneOtp,
    /// One-time code confirming an authorization.
    AuthorizeOtp,
    /// Token handed out on first login, before the password is set.
    FirstLogin,
    /// Registration token.
    Register,
    /// Long-lived authentication token.
    Auth,
    /// Short-lived access token.
    Access,
    /// Device binding token.
    Device,
    /// One-time code for the forgot-password flow.
    ForgotOtp,
    /// Token authorizing a password reset.
    ResetPassword,
    /// One-time code confirming a phone number change.
    ChangeNumberOtp,
}

impl TokenKind {
    /// All base kinds, in declaration order.
    pub const ALL: [TokenKind; 10] = [
        Self::PhoneOtp,
        Self::AuthorizeOtp,
        Self::FirstLogin,
        Self::Register,
        Self::Auth,
        Self::Access,
        Self::Device,
        Self::ForgotOtp,
        Self::ResetPassword,
        Self::ChangeNumberOtp,
    ];

    /// Returns the canonical wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhoneOtp => "PHONE_OTP",
            Self::AuthorizeOtp => "AUTHORIZE_OTP",
            Self::FirstLogin => "FIRST_LOGIN",
            Self::Register => "REGISTER",
            Self::Auth => "AUTH",
            Self::Access => "ACCESS",
            Self::Device => "DEVICE",
            Self::ForgotOtp => "FORGOT_OTP",
            Self::ResetPassword => "RESET_PASSWORD",
            Self::ChangeNumberOtp => "CHANGE_NUMBER_OTP",
        }
    }

    /// Returns the refreshable counterpart, if this kind has a refresh companion.
    #[must_use]
    pub fn refreshable(self) -> Option<RefreshableKind> {
        match self {
            Self::Auth => Some(RefreshableKind::Auth),
            Self::Access => Some(RefreshableKind::Access),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TokenError::unknown_variety(s))
    }
}

/// Base kinds that have a refresh companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefreshableKind {
    /// The long-lived, low-frequency pair.
    Auth,
    /// The short-lived, high-frequency pair.
    Access,
}

impl RefreshableKind {
    /// Returns the base kind this refreshes.
    #[must_use]
    pub fn base(self) -> TokenKind {
        match self {
            Self::Auth => TokenKind::Auth,
            Self::Access => TokenKind::Access,
        }
    }
}

impl From<RefreshableKind> for TokenKind {
    fn from(kind: RefreshableKind) -> Self {
        kind.base()
    }
}

impl fmt::Display for RefreshableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base().as_str())
    }
}

/// The purpose tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variety {
    /// A standalone purpose.
    Base(TokenKind),
    /// The renewal companion of a base purpose.
    Refresh(RefreshableKind),
}

impl Variety {
    /// `PHONE_OTP`, 5 minutes by default.
    pub const PHONE_OTP: Variety = Variety::Base(TokenKind::PhoneOtp);
    /// `AUTHORIZE_OTP`, 5 minutes by default.
    pub const AUTHORIZE_OTP: Variety = Variety::Base(TokenKind::AuthorizeOtp);
    /// `FIRST_LOGIN`, 30 minutes by default.
    pub const FIRST_LOGIN: Variety = Variety::Base(TokenKind::FirstLogin);
    /// `REGISTER`, 15 minutes by default.
    pub const REGISTER: Variety = Variety::Base(TokenKind::Register);
    /// `AUTH`, 24 hours by default.
    pub const AUTH: Variety = Variety::Base(TokenKind::Auth);
    /// `REFRESH_AUTH`, renews [`Variety::AUTH`]; 7 days by default.
    pub const REFRESH_AUTH: Variety = Variety::Refresh(RefreshableKind::Auth);
    /// `ACCESS`, 15 minutes by default.
    pub const ACCESS: Variety = Variety::Base(TokenKind::Access);
    /// `REFRESH_ACCESS`, renews [`Variety::ACCESS`]; 2 hours by default.
    pub const REFRESH_ACCESS: Variety = Variety::Refresh(RefreshableKind::Access);
    /// `DEVICE`, 1000 days by default.
    pub const DEVICE: Variety = Variety::Base(TokenKind::Device);
    /// `FORGOT_OTP`, 24 hours by default.
    pub const FORGOT_OTP: Variety = Variety::Base(TokenKind::ForgotOtp);
    /// `RESET_PASSWORD`, 1 hour by default.
    pub const RESET_PASSWORD: Variety = Variety::Base(TokenKind::ResetPassword);
    /// `CHANGE_NUMBER_OTP`, 1 hour by default.
    pub const CHANGE_NUMBER_OTP: Variety = Variety::Base(TokenKind::ChangeNumberOtp);

    /// Every variety the system knows about.
    pub const ALL: [Variety; 12] = [
        Self::PHONE_OTP,
        Self::AUTHORIZE_OTP,
        Self::FIRST_LOGIN,
        Self::REGISTER,
        Self::AUTH,
        Self::REFRESH_AUTH,
        Self::ACCESS,
        Self::REFRESH_ACCESS,
        Self::DEVICE,
        Self::FORGOT_OTP,
        Self::RESET_PASSWORD,
        Self::CHANGE_NUMBER_OTP,
    ];

    /// Returns `true` for refresh varieties.
    #[must_use]
    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }

    /// Returns the base variety a refresh variety renews.
    #[must_use]
    pub fn refreshed_base(&self) -> Option<Variety> {
        match self {
            Self::Refresh(kind) => Some(Self::Base(kind.base())),
            Self::Base(_) => None,
        }
    }

    /// Returns the refresh companion of a base variety.
    #[must_use]
    pub fn refresh_companion(&self) -> Option<Variety> {
        match self {
            Self::Base(kind) => kind.refreshable().map(Self::Refresh),
            Self::Refresh(_) => None,
        }
    }

    /// Returns the canonical wire name.
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Variety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(kind) => f.write_str(kind.as_str()),
            Self::Refresh(kind) => write!(f, "{REFRESH_PREFIX}{kind}"),
        }
    }
}

impl FromStr for Variety {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(REFRESH_PREFIX) {
            Some(base) => base
                .parse::<TokenKind>()
                .ok()
                .and_then(TokenKind::refreshable)
                .map(Self::Refresh)
                .ok_or_else(|| TokenError::unknown_variety(s)),
            None => s.parse().map(Self::Base),
        }
    }
}

impl From<TokenKind> for Variety {
    fn from(kind: TokenKind) -> Self {
        Self::Base(kind)
    }
}

impl Serialize for Variety {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Variety {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
