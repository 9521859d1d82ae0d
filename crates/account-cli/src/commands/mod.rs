pub mod admin;
pub mod tokens;
