//! Per-registry extension bindings
//!
//! Each registry is data (namespaces, service extensions, redaction rules) plus a
//! few strategy functions (parser overrides, encode hooks, error enrichment)
//! assembled into an [`ExtensionBinding`]. The generic RFC binding is always
//! available; the others are behind cargo features.

use serde::{Deserialize, Serialize};

use crate::extension::ExtensionBinding;

pub mod generic;

#[cfg(feature = "eurid")]
pub mod eurid;
#[cfg(feature = "hexonet")]
pub mod hexonet;
#[cfg(feature = "nominet")]
pub mod nominet;
#[cfg(feature = "sidn")]
pub mod sidn;

/// Registry selector used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// Plain RFC 5730-5733 with secDNS and RGP.
    Generic,
    #[cfg(feature = "hexonet")]
    Hexonet,
    #[cfg(feature = "nominet")]
    Nominet,
    #[cfg(feature = "eurid")]
    Eurid,
    #[cfg(feature = "sidn")]
    Sidn,
}

impl RegistryKind {
    /// Every registry compiled into this build.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Generic,
            #[cfg(feature = "hexonet")]
            Self::Hexonet,
            #[cfg(feature = "nominet")]
            Self::Nominet,
            #[cfg(feature = "eurid")]
            Self::Eurid,
            #[cfg(feature = "sidn")]
            Self::Sidn,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            #[cfg(feature = "hexonet")]
            Self::Hexonet => "hexonet",
            #[cfg(feature = "nominet")]
            Self::Nominet => "nominet",
            #[cfg(feature = "eurid")]
            Self::Eurid => "eurid",
            #[cfg(feature = "sidn")]
            Self::Sidn => "sidn",
        }
    }

    /// Build the binding for this registry.
    pub fn binding(self) -> ExtensionBinding {
        match self {
            Self::Generic => generic::binding(),
            #[cfg(feature = "hexonet")]
            Self::Hexonet => hexonet::binding(),
            #[cfg(feature = "nominet")]
            Self::Nominet => nominet::binding(),
            #[cfg(feature = "eurid")]
            Self::Eurid => eurid::binding(),
            #[cfg(feature = "sidn")]
            Self::Sidn => sidn::binding(),
        }
    }

    pub fn metadata(self) -> RegistryMetadata {
        let (name, description) = match self {
            Self::Generic => ("Generic EPP", "RFC 5730-5733 registry with secDNS and RGP"),
            #[cfg(feature = "hexonet")]
            Self::Hexonet => ("Hexonet", "ISPAPI keyvalue extension, transfer-list query, renewal mode"),
            #[cfg(feature = "nominet")]
            Self::Nominet => ("Nominet (.uk)", "Release to another registrar (IPS tag), nom-ext namespaces"),
            #[cfg(feature = "eurid")]
            Self::Eurid => ("EURid (.eu)", "Auth code request on domain info"),
            #[cfg(feature = "sidn")]
            Self::Sidn => ("SIDN (.nl)", "Error detail from sidn-ext-epp messages"),
        };
        let binding = self.binding();
        RegistryMetadata {
            kind: self,
            name: name.to_string(),
            description: description.to_string(),
            default_port: crate::config::DEFAULT_PORT,
            service_extensions: binding.service_extensions().to_vec(),
        }
    }
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one registry binding, for listings and diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMetadata {
    pub kind: RegistryKind,
    pub name: String,
    pub description: String,
    pub default_port: u16,
    pub service_extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_names_match_kind() {
        for kind in RegistryKind::all() {
            assert_eq!(kind.binding().name(), kind.as_str());
        }
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        for kind in RegistryKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn metadata_lists_service_extensions() {
        let meta = RegistryKind::Generic.metadata();
        assert_eq!(meta.default_port, 700);
        assert!(!meta.service_extensions.is_empty());
    }
}
