#![cfg(feature = "openid")]
//! OpenID Connect extras: the discovery document.

pub mod discovery;
