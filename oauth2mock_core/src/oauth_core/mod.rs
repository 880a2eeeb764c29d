//! OAuth2 authorization and token issuance engine.

pub mod claims;
pub mod clock;
pub mod config;
pub mod consent;
pub mod credentials;
pub mod error;
pub mod grant_helpers;
#[cfg(feature = "jwt")]
pub mod jwt;
pub mod memory;
pub mod oauth_provider;
pub mod token_issuer;
pub mod types;
