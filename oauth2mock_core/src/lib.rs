pub mod oauth_core;

#[cfg(feature = "openid")]
pub mod openid;

pub use oauth_core::claims::{ClaimLayer, InMemoryClaimsResolver, SubjectClaims};
pub use oauth_core::clock::{Clock, ManualClock, SystemClock};
pub use oauth_core::config::{ConfigDocument, InMemoryProviders, IssuerSettings};
pub use oauth_core::consent::{Consent, ConsentDecision, GrantKind, InMemoryConsentStore, ScopePolicy};
pub use oauth_core::credentials::{AuthenticationScheme, Credentials, SchemeKind};
pub use oauth_core::error::{ErrorKind, OAuthError, Result};
pub use oauth_core::grant_helpers::{AuthorizationCodeFlow, ClientCredentialsFlow, IssuanceContext, PasswordFlow};
#[cfg(feature = "jwt")]
pub use oauth_core::jwt::{JwtSigner, RsaPublicComponents};
pub use oauth_core::memory::{InMemoryAuthorizationStore, InMemoryClientStore, InMemoryUserStore, Sweeper};
pub use oauth_core::oauth_provider::{AuthorizationStore, ClaimsResolver, ClientStore, ConsentStore, Signer, UserStore};
pub use oauth_core::token_issuer::{Providers, TokenIssuer, RESERVED_CLAIMS};
pub use oauth_core::types::{
    AuthorizationRequest, ClaimSet, Client, Grant, GrantType, Purpose, TokenRequest, TokenResponse, User,
};
