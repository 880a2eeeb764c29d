//! Assembly of a running identity provider from one configuration document.

use std::sync::Arc;

use oauth2mock_core::openid::discovery::OidcDiscovery;
use oauth2mock_core::{Clock, ConfigDocument, InMemoryProviders, Result, Signer, Sweeper, SystemClock, TokenIssuer};
use tracing::info;

/// A configured token issuer plus the code sweeper it depends on.
///
/// Must be started inside a Tokio runtime. Call [`shutdown`](Self::shutdown)
/// to stop the sweeper; dropping the server stops it too.
pub struct AuthServer {
    issuer: TokenIssuer,
    stores: InMemoryProviders,
    discovery: OidcDiscovery,
    sweeper: Option<Sweeper>,
}

impl AuthServer {
    pub async fn start(doc: ConfigDocument, signer: Arc<dyn Signer>) -> Result<Self> {
        Self::start_with_clock(doc, signer, Arc::new(SystemClock)).await
    }

    pub async fn from_json(raw: &str, signer: Arc<dyn Signer>) -> Result<Self> {
        Self::start(ConfigDocument::from_json(raw)?, signer).await
    }

    pub async fn start_with_clock(doc: ConfigDocument, signer: Arc<dyn Signer>, clock: Arc<dyn Clock>) -> Result<Self> {
        let stores = InMemoryProviders::from_document(&doc, clock).await?;
        let discovery = OidcDiscovery::new(&doc.settings.issuer, signer.as_ref());
        let sweeper = stores.authorizations.start_sweeper(doc.settings.sweep_interval());
        let issuer = TokenIssuer::new(stores.providers(signer), doc.settings);
        info!(issuer = %issuer.settings().issuer, "authorization server started");
        Ok(Self { issuer, stores, discovery, sweeper: Some(sweeper) })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn stores(&self) -> &InMemoryProviders {
        &self.stores
    }

    pub fn discovery(&self) -> &OidcDiscovery {
        &self.discovery
    }

    pub fn jwks(&self) -> Result<Vec<u8>> {
        self.issuer.providers().signer.jwks()
    }

    /// Hot-swaps scope policy, standing consents and claims from `doc`.
    pub async fn reload(&self, doc: &ConfigDocument) {
        self.stores.reload(doc).await;
        info!("configuration reloaded");
    }

    /// Stops the sweeper and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
        info!("authorization server stopped");
    }
}
