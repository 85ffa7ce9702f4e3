//! Client factory functions and metadata.

use std::sync::Arc;

use crate::client::{DomainRegistryClient, EppClient};
use crate::config::RegistryConfig;
use crate::error::{EppError, Result};
use crate::extension::ExtensionBinding;
use crate::registries::{RegistryKind, RegistryMetadata};

/// Shared binding for `kind`.
pub fn binding_for(kind: RegistryKind) -> Arc<ExtensionBinding> {
    Arc::new(kind.binding())
}

/// Creates a [`DomainRegistryClient`] for the registry named in `config`.
///
/// The config is validated here, so a bad hostname or empty password fails
/// before any connection attempt.
///
/// # Examples
///
/// ```rust,no_run
/// use registrar_orchestrator_epp::{create_client, RegistryConfig, RegistryKind};
///
/// # async fn run() -> registrar_orchestrator_epp::Result<()> {
/// let config = RegistryConfig::new(RegistryKind::Generic, "epp.example.net", "registrar", "secret");
/// let client = create_client(&config)?;
/// let mut session = client.connect(&config).await?;
/// client.disconnect(&mut session).await;
/// # Ok(())
/// # }
/// ```
pub fn create_client(config: &RegistryConfig) -> Result<Arc<dyn DomainRegistryClient>> {
    config
        .validate()
        .map_err(|e| EppError::config(config.registry.as_str(), e.to_string()))?;
    Ok(Arc::new(EppClient::new(binding_for(config.registry))))
}

/// Returns metadata for all registries enabled via feature flags.
pub fn supported_registries() -> Vec<RegistryMetadata> {
    RegistryKind::all()
        .into_iter()
        .map(RegistryKind::metadata)
        .collect()
}
