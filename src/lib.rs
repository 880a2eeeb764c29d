//! oauth2mock: a programmable OAuth2 / OpenID Connect identity provider
//! for exercising relying-party integrations.
//!
//! The engine lives in [`oauth2mock_core`]; this crate assembles it from a
//! configuration document and owns the background tasks.

pub mod logging;
pub mod server;

pub use oauth2mock_core::*;
pub use logging::init_tracing;
pub use server::AuthServer;
