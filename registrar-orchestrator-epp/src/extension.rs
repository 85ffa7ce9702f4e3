//! Per-registry extension bindings
//!
//! A binding is the data that turns the generic session into a registry-specific
//! one: the namespaces to declare, the service extensions to advertise at login,
//! response parser overrides keyed by [`CommandKind`], encode hooks that splice
//! extension XML into outgoing commands, and the redaction rules for trace logs.
//!
//! Bindings are built once with [`ExtensionBinding::builder`] and shared behind an
//! `Arc`; nothing mutates them afterwards.

use std::collections::HashMap;

use crate::types::{
    Command, CommandKind, ExtensionData, ObjectType, ResponseData, CONTACT_NS, DOMAIN_NS, HOST_NS,
};
use crate::utils::log_sanitizer::{DEFAULT_SECRET_ELEMENTS, Redactor};
use crate::xml::{XmlElement, XmlError};

/// The decoded pieces of a successful response handed to a parser.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParts<'a> {
    pub result_code: u16,
    pub message: &'a str,
    /// First child of `<resData>`, if present.
    pub res_data: Option<&'a XmlElement>,
    pub extension: &'a ExtensionData,
}

/// Replaces the default `<resData>` decoding for one command kind.
pub type ResponseParser = fn(&ResponseParts<'_>) -> Result<ResponseData, XmlError>;

/// Mutates the `<command>` element after the base structure is built.
pub type EncodeHook = fn(&Command, &mut XmlElement) -> Result<(), XmlError>;

/// Extracts extra error detail from a failed response (e.g. SIDN's `<sidn-ext-epp:msg>`).
pub type ResultDetailHook = fn(&ResponseParts<'_>) -> Option<String>;

/// A `(prefix, namespace URI)` pair declared on the `<epp>` root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

/// Immutable registry binding. See the module docs.
#[derive(Debug, Clone)]
pub struct ExtensionBinding {
    name: String,
    namespaces: Vec<NamespaceDecl>,
    object_uris: Vec<String>,
    service_extensions: Vec<String>,
    parsers: HashMap<CommandKind, ResponseParser>,
    encode_hooks: Vec<(Option<CommandKind>, EncodeHook)>,
    result_detail: Option<ResultDetailHook>,
    redactor: Redactor,
}

impl ExtensionBinding {
    pub fn builder(name: impl Into<String>) -> ExtensionBindingBuilder {
        ExtensionBindingBuilder::new(name)
    }

    /// Registry tag used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespaces(&self) -> &[NamespaceDecl] {
        &self.namespaces
    }

    /// Object URIs advertised at login when the greeting lists none.
    pub fn object_uris(&self) -> &[String] {
        &self.object_uris
    }

    /// Service extension URIs this binding wants enabled at login.
    pub fn service_extensions(&self) -> &[String] {
        &self.service_extensions
    }

    pub fn parser_for(&self, kind: CommandKind) -> Option<ResponseParser> {
        self.parsers.get(&kind).copied()
    }

    /// Hooks registered for `kind`, plus hooks registered for every command.
    pub fn encode_hooks_for(&self, kind: CommandKind) -> impl Iterator<Item = EncodeHook> + '_ {
        self.encode_hooks
            .iter()
            .filter(move |(target, _)| target.is_none_or(|t| t == kind))
            .map(|(_, hook)| *hook)
    }

    pub fn result_detail(&self, parts: &ResponseParts<'_>) -> Option<String> {
        self.result_detail.and_then(|hook| hook(parts))
    }

    /// Mask secrets in `xml` before it is logged or attached to an error.
    pub fn redact(&self, xml: &str) -> String {
        self.redactor.redact(xml)
    }

    /// Service extensions to request at login, given what the server offered.
    ///
    /// An empty server list means the greeting did not advertise extensions; the
    /// binding's list is then sent unchanged.
    pub fn negotiate(&self, offered: &[String]) -> Vec<String> {
        if offered.is_empty() {
            return self.service_extensions.clone();
        }
        let (kept, dropped): (Vec<_>, Vec<_>) = self
            .service_extensions
            .iter()
            .cloned()
            .partition(|uri| offered.contains(uri));
        for uri in &dropped {
            log::warn!("[{}] Server does not offer extension {uri}; not requesting it", self.name);
        }
        kept
    }
}

/// Builder for [`ExtensionBinding`].
#[derive(Debug, Clone)]
pub struct ExtensionBindingBuilder {
    name: String,
    namespaces: Vec<NamespaceDecl>,
    object_uris: Vec<String>,
    service_extensions: Vec<String>,
    parsers: HashMap<CommandKind, ResponseParser>,
    encode_hooks: Vec<(Option<CommandKind>, EncodeHook)>,
    result_detail: Option<ResultDetailHook>,
    secret_elements: Vec<String>,
    secret_keys: Vec<String>,
}

impl ExtensionBindingBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: Vec::new(),
            object_uris: [DOMAIN_NS, CONTACT_NS, HOST_NS]
                .iter()
                .map(ToString::to_string)
                .collect(),
            service_extensions: Vec::new(),
            parsers: HashMap::new(),
            encode_hooks: Vec::new(),
            result_detail: None,
            secret_elements: DEFAULT_SECRET_ELEMENTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            secret_keys: Vec::new(),
        }
    }

    /// Declare a namespace and request it as a service extension at login.
    #[must_use]
    pub fn register_extension(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        self.namespaces.push(NamespaceDecl {
            prefix: prefix.into(),
            uri: uri.clone(),
        });
        if !self.service_extensions.contains(&uri) {
            self.service_extensions.push(uri);
        }
        self
    }

    /// Request a service extension at login without declaring a prefix for it.
    #[must_use]
    pub fn register_service_extension(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        if !self.service_extensions.contains(&uri) {
            self.service_extensions.push(uri);
        }
        self
    }

    /// Restrict the object URIs advertised at login (defaults to domain, contact, host).
    #[must_use]
    pub fn object_types(mut self, types: &[ObjectType]) -> Self {
        self.object_uris = types.iter().map(|t| t.namespace().to_string()).collect();
        self
    }

    /// Install a response parser override for `kind`.
    #[must_use]
    pub fn register_command_response_type(mut self, kind: CommandKind, parser: ResponseParser) -> Self {
        self.parsers.insert(kind, parser);
        self
    }

    /// Install an encode hook for `kind`, or for every command when `None`.
    #[must_use]
    pub fn register_encode_hook(mut self, kind: Option<CommandKind>, hook: EncodeHook) -> Self {
        self.encode_hooks.push((kind, hook));
        self
    }

    #[must_use]
    pub fn register_result_detail(mut self, hook: ResultDetailHook) -> Self {
        self.result_detail = Some(hook);
        self
    }

    /// Mask the content of every element with this local name in trace logs.
    #[must_use]
    pub fn redact_element(mut self, local_name: impl Into<String>) -> Self {
        self.secret_elements.push(local_name.into());
        self
    }

    /// Mask the `value` attribute of key/value elements with this key.
    #[must_use]
    pub fn redact_key_value(mut self, key: impl Into<String>) -> Self {
        self.secret_keys.push(key.into());
        self
    }

    pub fn build(self) -> ExtensionBinding {
        ExtensionBinding {
            redactor: Redactor::new(&self.secret_elements, &self.secret_keys),
            name: self.name,
            namespaces: self.namespaces,
            object_uris: self.object_uris,
            service_extensions: self.service_extensions,
            parsers: self.parsers,
            encode_hooks: self.encode_hooks,
            result_detail: self.result_detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SEC_DNS_NS;

    fn noop_hook(_: &Command, _: &mut XmlElement) -> Result<(), XmlError> {
        Ok(())
    }

    fn none_parser(_: &ResponseParts<'_>) -> Result<ResponseData, XmlError> {
        Ok(ResponseData::None)
    }

    #[test]
    fn register_extension_declares_and_advertises() {
        let binding = ExtensionBinding::builder("test")
            .register_extension("secDNS", SEC_DNS_NS)
            .register_service_extension("urn:example:ext-1.0")
            .build();
        assert_eq!(binding.namespaces().len(), 1);
        assert_eq!(binding.namespaces()[0].prefix, "secDNS");
        assert_eq!(
            binding.service_extensions(),
            [SEC_DNS_NS.to_string(), "urn:example:ext-1.0".to_string()]
        );
        assert_eq!(binding.object_uris().len(), 3);
    }

    #[test]
    fn parser_lookup_by_kind() {
        let binding = ExtensionBinding::builder("test")
            .register_command_response_type(CommandKind::Custom("x"), none_parser)
            .build();
        assert!(binding.parser_for(CommandKind::Custom("x")).is_some());
        assert!(binding.parser_for(CommandKind::Custom("y")).is_none());
    }

    #[test]
    fn encode_hooks_filter_by_kind() {
        let binding = ExtensionBinding::builder("test")
            .register_encode_hook(None, noop_hook)
            .register_encode_hook(Some(CommandKind::Poll), noop_hook)
            .build();
        assert_eq!(binding.encode_hooks_for(CommandKind::Poll).count(), 2);
        assert_eq!(binding.encode_hooks_for(CommandKind::Logout).count(), 1);
    }

    #[test]
    fn negotiate_intersects_with_greeting() {
        let binding = ExtensionBinding::builder("test")
            .register_extension("secDNS", SEC_DNS_NS)
            .register_service_extension("urn:example:ext-1.0")
            .build();
        assert_eq!(binding.negotiate(&[]).len(), 2);
        assert_eq!(
            binding.negotiate(&[SEC_DNS_NS.to_string()]),
            [SEC_DNS_NS.to_string()]
        );
    }

    #[test]
    fn redaction_rules_extend_defaults() {
        let binding = ExtensionBinding::builder("test")
            .redact_element("authCode")
            .redact_key_value("AUTH")
            .build();
        let out = binding.redact(
            r#"<pw>a-secret</pw><x:authCode>b-secret</x:authCode><kv key="AUTH" value="c-secret"/>"#,
        );
        assert!(!out.contains("secret"));
    }
}
