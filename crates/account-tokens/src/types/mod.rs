//! Domain types for token issuance.

pub mod record;
pub mod variety;

pub use record::TokenRecord;
pub use variety::{RefreshableKind, TokenKind, Variety};
