//! Small helpers shared by the oauth2mock crates.
//!
//! Nothing in here knows about clients, users or scopes. The engine crate
//! wraps these primitives with its own types and error taxonomy.

#[cfg(feature = "secrets")]
pub mod secrets;
#[cfg(feature = "redirect")]
pub mod redirect;

#[cfg(feature = "secrets")]
pub use secrets::{hash_secret, random_code, verify_secret};
#[cfg(feature = "redirect")]
pub use redirect::{matches_wildcard, WildcardPattern};

/// Failures raised by the helpers in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operating system random source refused to produce bytes.
    #[error("random source unavailable")]
    Rng,
    /// A random code of zero bytes was requested.
    #[error("code length must be at least one byte")]
    InvalidLength,
    /// A stored hash could not be decoded or has the wrong shape.
    #[error("malformed secret hash")]
    InvalidHash,
    /// A redirect pattern could not be turned into a regular expression.
    #[cfg(feature = "redirect")]
    #[error("invalid redirect pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
