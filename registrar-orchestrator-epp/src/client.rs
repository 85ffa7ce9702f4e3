//! The `DomainRegistryClient` contract consumed by provider adapters.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RegistryConfig;
use crate::error::{EppError, Result};
use crate::extension::ExtensionBinding;
use crate::session::EppSession;
use crate::transport::{Connector, TlsConnector};
use crate::types::{Command, Response};

/// Connect, execute and disconnect against one registry.
///
/// Implementations are stateless apart from the binding; all connection state
/// lives in the [`EppSession`] they hand out, which the caller owns.
#[async_trait]
pub trait DomainRegistryClient: Send + Sync {
    /// Registry tag, e.g. `"nominet"`.
    fn registry(&self) -> &str;

    /// Open a session: TCP + TLS, greeting, login.
    async fn connect(&self, config: &RegistryConfig) -> Result<EppSession>;

    /// Run one command, reconnecting first if the session dropped.
    async fn execute(&self, session: &mut EppSession, command: Command) -> Result<Response>;

    /// Log out and close. Idempotent, never fails.
    async fn disconnect(&self, session: &mut EppSession);
}

/// [`DomainRegistryClient`] backed by an [`ExtensionBinding`].
#[derive(Clone)]
pub struct EppClient {
    binding: Arc<ExtensionBinding>,
    connector: Option<Arc<dyn Connector>>,
}

impl std::fmt::Debug for EppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EppClient")
            .field("registry", &self.binding.name())
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

impl EppClient {
    /// Client that connects with TLS built from each config's `tls` section.
    pub fn new(binding: Arc<ExtensionBinding>) -> Self {
        Self {
            binding,
            connector: None,
        }
    }

    /// Client that opens streams through `connector` instead of TCP + TLS.
    pub fn with_connector(binding: Arc<ExtensionBinding>, connector: Arc<dyn Connector>) -> Self {
        Self {
            binding,
            connector: Some(connector),
        }
    }

    pub fn binding(&self) -> &Arc<ExtensionBinding> {
        &self.binding
    }

    /// A disconnected session; nothing touches the network until `connect()`.
    pub fn session(&self, config: &RegistryConfig) -> Result<EppSession> {
        config
            .validate()
            .map_err(|e| EppError::config(self.binding.name(), e.to_string()))?;
        let connector: Arc<dyn Connector> = match &self.connector {
            Some(connector) => connector.clone(),
            None => Arc::new(TlsConnector::from_settings(self.binding.name(), &config.tls)?),
        };
        Ok(EppSession::new(config.clone(), self.binding.clone(), connector))
    }
}

#[async_trait]
impl DomainRegistryClient for EppClient {
    fn registry(&self) -> &str {
        self.binding.name()
    }

    async fn connect(&self, config: &RegistryConfig) -> Result<EppSession> {
        let mut session = self.session(config)?;
        session.connect().await?;
        Ok(session)
    }

    async fn execute(&self, session: &mut EppSession, command: Command) -> Result<Response> {
        session.connect().await?;
        session.execute(command).await
    }

    async fn disconnect(&self, session: &mut EppSession) {
        session.disconnect().await;
    }
}
