use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::result_code::{self, ResultCategory};
use crate::xml::XmlElement;

// ============ Namespaces ============

/// Base EPP namespace (RFC 5730).
pub const EPP_NS: &str = "urn:ietf:params:xml:ns:epp-1.0";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const EPP_SCHEMA_LOCATION: &str = "urn:ietf:params:xml:ns:epp-1.0 epp-1.0.xsd";
/// Domain mapping (RFC 5731).
pub const DOMAIN_NS: &str = "urn:ietf:params:xml:ns:domain-1.0";
/// Contact mapping (RFC 5733).
pub const CONTACT_NS: &str = "urn:ietf:params:xml:ns:contact-1.0";
/// Host mapping (RFC 5732).
pub const HOST_NS: &str = "urn:ietf:params:xml:ns:host-1.0";
/// DNSSEC extension (RFC 5910).
pub const SEC_DNS_NS: &str = "urn:ietf:params:xml:ns:secDNS-1.1";
/// Registry grace period extension (RFC 3915).
pub const RGP_NS: &str = "urn:ietf:params:xml:ns:rgp-1.0";

/// Common EPP status values (RFC 5731 section 2.3).
pub mod status {
    pub const CLIENT_TRANSFER_PROHIBITED: &str = "clientTransferProhibited";
    pub const CLIENT_UPDATE_PROHIBITED: &str = "clientUpdateProhibited";
    pub const CLIENT_DELETE_PROHIBITED: &str = "clientDeleteProhibited";
    pub const CLIENT_HOLD: &str = "clientHold";
    pub const OK: &str = "ok";
    pub const PENDING_TRANSFER: &str = "pendingTransfer";
}

// ============ Command Types ============

/// Object mapping a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Domain,
    Contact,
    Host,
}

impl ObjectType {
    /// Conventional namespace prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Contact => "contact",
            Self::Host => "host",
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            Self::Domain => DOMAIN_NS,
            Self::Contact => CONTACT_NS,
            Self::Host => HOST_NS,
        }
    }

    /// Element that identifies an object of this type (`name` or `id`).
    pub fn key_element(self) -> &'static str {
        match self {
            Self::Domain | Self::Host => "name",
            Self::Contact => "id",
        }
    }

    /// Identify the mapping of a response element by its declared namespace,
    /// falling back to the conventional prefix.
    pub fn of_element(element: &XmlElement) -> Option<Self> {
        let by_uri = element.declared_namespace().and_then(|uri| {
            [Self::Domain, Self::Contact, Self::Host]
                .into_iter()
                .find(|t| t.namespace() == uri)
        });
        by_uri.or_else(|| match element.prefix() {
            Some("domain") => Some(Self::Domain),
            Some("contact") => Some(Self::Contact),
            Some("host") => Some(Self::Host),
            _ => None,
        })
    }
}

/// Identity of a command, used to look up encode hooks and response parser overrides.
///
/// `Custom` names registry-specific actions (e.g. Hexonet's transfer-list query)
/// whose wire structure reuses a base command body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Hello,
    Login,
    Logout,
    Check(ObjectType),
    Info(ObjectType),
    Create(ObjectType),
    Update(ObjectType),
    Delete(ObjectType),
    DomainRenew,
    DomainTransfer,
    Poll,
    Custom(&'static str),
}

impl CommandKind {
    /// Whether the session must be logged in before sending this command.
    pub fn requires_login(self) -> bool {
        !matches!(self, Self::Hello | Self::Login | Self::Logout)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hello => f.write_str("hello"),
            Self::Login => f.write_str("login"),
            Self::Logout => f.write_str("logout"),
            Self::Check(t) => write!(f, "{}:check", t.prefix()),
            Self::Info(t) => write!(f, "{}:info", t.prefix()),
            Self::Create(t) => write!(f, "{}:create", t.prefix()),
            Self::Update(t) => write!(f, "{}:update", t.prefix()),
            Self::Delete(t) => write!(f, "{}:delete", t.prefix()),
            Self::DomainRenew => f.write_str("domain:renew"),
            Self::DomainTransfer => f.write_str("domain:transfer"),
            Self::Poll => f.write_str("poll"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Transfer operation (`op` attribute of `<transfer>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOp {
    Request,
    Query,
    Approve,
    Reject,
    Cancel,
}

impl TransferOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Query => "query",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Year,
    Month,
}

/// Registration period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub value: u8,
    pub unit: PeriodUnit,
}

impl Period {
    pub fn years(value: u8) -> Self {
        Self {
            value,
            unit: PeriodUnit::Year,
        }
    }

    pub fn months(value: u8) -> Self {
        Self {
            value,
            unit: PeriodUnit::Month,
        }
    }

    pub(crate) fn unit_attr(self) -> &'static str {
        match self.unit {
            PeriodUnit::Year => "y",
            PeriodUnit::Month => "m",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Admin,
    Tech,
    Billing,
}

impl ContactType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Tech => "tech",
            Self::Billing => "billing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "tech" => Some(Self::Tech),
            "billing" => Some(Self::Billing),
            _ => None,
        }
    }
}

/// A contact linked to a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainContact {
    pub contact_type: ContactType,
    pub id: String,
}

impl DomainContact {
    pub fn new(contact_type: ContactType, id: impl Into<String>) -> Self {
        Self {
            contact_type,
            id: id.into(),
        }
    }
}

/// `hosts` attribute of a domain info command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostsFilter {
    #[default]
    All,
    Del,
    Sub,
    None,
}

impl HostsFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Del => "del",
            Self::Sub => "sub",
            Self::None => "none",
        }
    }
}

// ============ Command Payloads ============

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub client_id: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
    pub version: String,
    pub language: String,
    pub object_uris: Vec<String>,
    #[serde(default)]
    pub extension_uris: Vec<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("client_id", &self.client_id)
            .field("password", &"***")
            .field("new_password", &self.new_password.as_ref().map(|_| "***"))
            .field("version", &self.version)
            .field("language", &self.language)
            .field("object_uris", &self.object_uris)
            .field("extension_uris", &self.extension_uris)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInfoRequest {
    pub name: String,
    #[serde(default)]
    pub hosts: HostsFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<String>,
}

impl DomainInfoRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: HostsFilter::All,
            auth_info: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCreateRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrant: Option<String>,
    #[serde(default)]
    pub contacts: Vec<DomainContact>,
    pub auth_info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRenewRequest {
    pub name: String,
    /// Current expiry date, required by the registry to prevent double renewals.
    pub current_expiry: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTransferRequest {
    pub op: TransferOp,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<String>,
}

/// Items added to or removed from a domain in one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainChangeSet {
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<DomainContact>,
    #[serde(default)]
    pub statuses: Vec<String>,
}

impl DomainChangeSet {
    pub fn is_empty(&self) -> bool {
        self.nameservers.is_empty() && self.contacts.is_empty() && self.statuses.is_empty()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainUpdateRequest {
    pub name: String,
    #[serde(default)]
    pub add: DomainChangeSet,
    #[serde(default)]
    pub remove: DomainChangeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<String>,
}

impl DomainUpdateRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostalInfoType {
    /// Internationalized form (7-bit ASCII only).
    #[default]
    Int,
    /// Localized form (full UTF-8).
    Loc,
}

impl PostalInfoType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Loc => "loc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalInfo {
    #[serde(default)]
    pub kind: PostalInfoType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default)]
    pub street: Vec<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country_code: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCreateRequest {
    pub id: String,
    pub postal_info: PostalInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
    pub email: String,
    pub auth_info: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdateRequest {
    pub id: String,
    #[serde(default)]
    pub add_statuses: Vec<String>,
    #[serde(default)]
    pub remove_statuses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_info: Option<PostalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<String>,
}

impl ContactUpdateRequest {
    pub(crate) fn has_changes(&self) -> bool {
        self.postal_info.is_some()
            || self.voice.is_some()
            || self.fax.is_some()
            || self.email.is_some()
            || self.auth_info.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCreateRequest {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOp {
    Request,
    Ack(String),
}

// ============ Commands ============

/// A namespace-qualified block placed inside `<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionBlock {
    /// `<prefix:extension xmlns:prefix="ns"><prefix:kv key=".." value=".."/>...`
    KeyValue {
        prefix: String,
        namespace: String,
        pairs: Vec<(String, String)>,
    },
    /// A pre-built element, inserted as-is.
    Element(XmlElement),
}

impl ExtensionBlock {
    pub fn key_value<K, V>(
        prefix: impl Into<String>,
        namespace: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::KeyValue {
            prefix: prefix.into(),
            namespace: namespace.into(),
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Wire structure of a command.
#[derive(Debug, Clone)]
pub enum CommandBody {
    Hello,
    Login(LoginRequest),
    Logout,
    Check {
        object: ObjectType,
        names: Vec<String>,
    },
    DomainInfo(DomainInfoRequest),
    DomainCreate(DomainCreateRequest),
    DomainRenew(DomainRenewRequest),
    DomainTransfer(DomainTransferRequest),
    DomainUpdate(DomainUpdateRequest),
    DomainDelete {
        name: String,
    },
    ContactInfo {
        id: String,
        auth_info: Option<String>,
    },
    ContactCreate(ContactCreateRequest),
    ContactUpdate(ContactUpdateRequest),
    HostInfo {
        name: String,
    },
    HostCreate(HostCreateRequest),
    Poll(PollOp),
    /// A registry-specific verb element placed directly inside `<command>`.
    Raw(XmlElement),
}

impl CommandBody {
    fn default_kind(&self) -> CommandKind {
        match self {
            Self::Hello => CommandKind::Hello,
            Self::Login(_) => CommandKind::Login,
            Self::Logout => CommandKind::Logout,
            Self::Check { object, .. } => CommandKind::Check(*object),
            Self::DomainInfo(_) => CommandKind::Info(ObjectType::Domain),
            Self::DomainCreate(_) => CommandKind::Create(ObjectType::Domain),
            Self::DomainRenew(_) => CommandKind::DomainRenew,
            Self::DomainTransfer(_) => CommandKind::DomainTransfer,
            Self::DomainUpdate(_) => CommandKind::Update(ObjectType::Domain),
            Self::DomainDelete { .. } => CommandKind::Delete(ObjectType::Domain),
            Self::ContactInfo { .. } => CommandKind::Info(ObjectType::Contact),
            Self::ContactCreate(_) => CommandKind::Create(ObjectType::Contact),
            Self::ContactUpdate(_) => CommandKind::Update(ObjectType::Contact),
            Self::HostInfo { .. } => CommandKind::Info(ObjectType::Host),
            Self::HostCreate(_) => CommandKind::Create(ObjectType::Host),
            Self::Poll(_) => CommandKind::Poll,
            Self::Raw(_) => CommandKind::Custom("raw"),
        }
    }
}

/// An immutable request: what to send, plus optional extension blocks.
///
/// Built fresh per call and consumed by [`EppSession::execute`](crate::EppSession::execute).
#[derive(Debug, Clone)]
pub struct Command {
    kind: CommandKind,
    body: CommandBody,
    extensions: Vec<ExtensionBlock>,
}

impl Command {
    pub fn new(body: CommandBody) -> Self {
        Self {
            kind: body.default_kind(),
            body,
            extensions: Vec::new(),
        }
    }

    pub fn hello() -> Self {
        Self::new(CommandBody::Hello)
    }

    pub fn login(request: LoginRequest) -> Self {
        Self::new(CommandBody::Login(request))
    }

    pub fn logout() -> Self {
        Self::new(CommandBody::Logout)
    }

    pub fn check<S: Into<String>>(object: ObjectType, names: impl IntoIterator<Item = S>) -> Self {
        Self::new(CommandBody::Check {
            object,
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn domain_info(request: DomainInfoRequest) -> Self {
        Self::new(CommandBody::DomainInfo(request))
    }

    pub fn domain_create(request: DomainCreateRequest) -> Self {
        Self::new(CommandBody::DomainCreate(request))
    }

    pub fn domain_renew(request: DomainRenewRequest) -> Self {
        Self::new(CommandBody::DomainRenew(request))
    }

    pub fn domain_transfer(request: DomainTransferRequest) -> Self {
        Self::new(CommandBody::DomainTransfer(request))
    }

    pub fn domain_update(request: DomainUpdateRequest) -> Self {
        Self::new(CommandBody::DomainUpdate(request))
    }

    pub fn domain_delete(name: impl Into<String>) -> Self {
        Self::new(CommandBody::DomainDelete { name: name.into() })
    }

    pub fn contact_info(id: impl Into<String>, auth_info: Option<String>) -> Self {
        Self::new(CommandBody::ContactInfo {
            id: id.into(),
            auth_info,
        })
    }

    pub fn contact_create(request: ContactCreateRequest) -> Self {
        Self::new(CommandBody::ContactCreate(request))
    }

    pub fn contact_update(request: ContactUpdateRequest) -> Self {
        Self::new(CommandBody::ContactUpdate(request))
    }

    pub fn host_info(name: impl Into<String>) -> Self {
        Self::new(CommandBody::HostInfo { name: name.into() })
    }

    pub fn host_create(request: HostCreateRequest) -> Self {
        Self::new(CommandBody::HostCreate(request))
    }

    pub fn poll_request() -> Self {
        Self::new(CommandBody::Poll(PollOp::Request))
    }

    pub fn poll_ack(message_id: impl Into<String>) -> Self {
        Self::new(CommandBody::Poll(PollOp::Ack(message_id.into())))
    }

    /// A registry-specific verb element, identified by `name`.
    pub fn raw(name: &'static str, verb: XmlElement) -> Self {
        Self::new(CommandBody::Raw(verb)).with_kind(CommandKind::Custom(name))
    }

    /// Re-label the command so bindings can attach hooks or parsers to it.
    #[must_use]
    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, block: ExtensionBlock) -> Self {
        self.extensions.push(block);
        self
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn body(&self) -> &CommandBody {
        &self.body
    }

    pub fn extensions(&self) -> &[ExtensionBlock] {
        &self.extensions
    }

    /// Name or ID of the primary object, for log messages.
    pub fn object_name(&self) -> Option<&str> {
        match &self.body {
            CommandBody::Check { names, .. } => names.first().map(String::as_str),
            CommandBody::DomainInfo(r) => Some(&r.name),
            CommandBody::DomainCreate(r) => Some(&r.name),
            CommandBody::DomainRenew(r) => Some(&r.name),
            CommandBody::DomainTransfer(r) => Some(&r.name),
            CommandBody::DomainUpdate(r) => Some(&r.name),
            CommandBody::DomainDelete { name } | CommandBody::HostInfo { name } => Some(name),
            CommandBody::ContactInfo { id, .. } => Some(id),
            CommandBody::ContactCreate(r) => Some(&r.id),
            CommandBody::ContactUpdate(r) => Some(&r.id),
            CommandBody::HostCreate(r) => Some(&r.name),
            CommandBody::Hello
            | CommandBody::Login(_)
            | CommandBody::Logout
            | CommandBody::Poll(_)
            | CommandBody::Raw(_) => None,
        }
    }
}

// ============ Response Types ============

/// One entry of a `<chkData>` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInfo {
    pub name: String,
    pub roid: Option<String>,
    pub statuses: Vec<String>,
    pub registrant: Option<String>,
    pub contacts: Vec<DomainContact>,
    pub nameservers: Vec<String>,
    /// Subordinate hosts.
    pub hosts: Vec<String>,
    pub sponsoring_client_id: Option<String>,
    pub creating_client_id: Option<String>,
    pub updating_client_id: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub transferred_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub auth_info: Option<String>,
}

impl DomainInfo {
    pub fn has_status(&self, status: &str) -> bool {
        self.statuses.iter().any(|s| s == status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCreated {
    pub name: String,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRenewed {
    pub name: String,
    #[serde(with = "crate::utils::datetime")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInfo {
    pub name: String,
    /// `pending`, `clientApproved`, `serverApproved`, ...
    pub status: String,
    pub requested_by: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub requested_at: Option<DateTime<Utc>>,
    pub action_by: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub action_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub id: String,
    pub roid: Option<String>,
    pub statuses: Vec<String>,
    pub postal_info: Vec<PostalInfo>,
    pub voice: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
    pub sponsoring_client_id: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub auth_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCreated {
    /// Domain/host name or contact ID.
    pub id: String,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub name: String,
    pub roid: Option<String>,
    pub statuses: Vec<String>,
    pub addresses: Vec<String>,
    pub sponsoring_client_id: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of a registrar transfer-list query (Hexonet `QueryTransferList`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferListResult {
    pub count: u32,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TransferListResult {
    /// Whether a transfer for the queried domain is already in progress.
    pub fn transfer_exists(&self) -> bool {
        self.count > 0
    }

    /// When the in-progress transfer was created.
    pub fn transfer_date(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Result of a .uk release (IPS tag change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResult {
    pub name: String,
    pub registrar_tag: String,
    /// The receiving registrar must accept the release before it completes (1001).
    pub pending: bool,
}

/// Server greeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Greeting {
    pub server_id: String,
    #[serde(with = "crate::utils::datetime")]
    pub server_date: Option<DateTime<Utc>>,
    pub versions: Vec<String>,
    pub languages: Vec<String>,
    pub object_uris: Vec<String>,
    pub extension_uris: Vec<String>,
}

impl Greeting {
    pub fn supports_extension(&self, uri: &str) -> bool {
        self.extension_uris.iter().any(|u| u == uri)
    }
}

/// `<msgQ>` block of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQueue {
    pub count: u32,
    pub id: Option<String>,
    #[serde(with = "crate::utils::datetime")]
    pub queued_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// A dequeued poll message.
#[derive(Debug, Clone)]
pub struct PollMessage {
    pub id: String,
    /// Messages remaining in the queue, this one included.
    pub count: u32,
    pub queued_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub data: ResponseData,
}

/// Data collected from the `<extension>` block of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionData {
    /// `key`/`value` attribute pairs from any depth, in document order.
    pub values: Vec<(String, String)>,
    /// Top-level extension elements, kept whole for registry parsers.
    pub elements: Vec<XmlElement>,
}

impl ExtensionData {
    /// First value for `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Top-level extension element by local name.
    pub fn element(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements.iter().find(|e| e.local_name() == local_name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.elements.is_empty()
    }
}

/// Parsed `<resData>` (or registry-specific) payload.
#[derive(Debug, Clone, Default)]
pub enum ResponseData {
    #[default]
    None,
    Greeting(Greeting),
    Check(Vec<CheckResult>),
    DomainInfo(Box<DomainInfo>),
    DomainCreated(DomainCreated),
    DomainRenewed(DomainRenewed),
    Transfer(TransferInfo),
    ContactInfo(Box<ContactInfo>),
    HostInfo(HostInfo),
    /// Contact or host creation.
    Created(ObjectCreated),
    TransferList(TransferListResult),
    /// An unrecognized `<resData>` child, kept whole.
    Raw(XmlElement),
}

/// A parsed registry response.
#[derive(Debug, Clone)]
pub struct Response {
    pub result_code: u16,
    pub message: String,
    /// `<extValue><reason>` text, if the registry gave one.
    pub reason: Option<String>,
    pub message_queue: Option<MessageQueue>,
    pub client_transaction_id: Option<String>,
    pub server_transaction_id: Option<String>,
    pub data: ResponseData,
    pub extension: ExtensionData,
    /// The document as received.
    pub raw_xml: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        result_code::is_success(self.result_code)
    }

    pub fn category(&self) -> ResultCategory {
        ResultCategory::from_code(self.result_code)
    }

    pub fn check_results(&self) -> Option<&[CheckResult]> {
        match &self.data {
            ResponseData::Check(results) => Some(results.as_slice()),
            _ => None,
        }
    }

    pub fn domain_info(&self) -> Option<&DomainInfo> {
        match &self.data {
            ResponseData::DomainInfo(info) => Some(info.as_ref()),
            _ => None,
        }
    }

    pub fn transfer_list(&self) -> Option<&TransferListResult> {
        match &self.data {
            ResponseData::TransferList(result) => Some(result),
            _ => None,
        }
    }
}

/// Outcome of a domain info lookup.
///
/// A missing domain (2303) is an ordinary branch, e.g. "not registered here yet,
/// continue with a transfer".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainLookup {
    Found(Box<DomainInfo>),
    NotFound,
}

impl DomainLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_info(self) -> Option<DomainInfo> {
        match self {
            Self::Found(info) => Some(*info),
            Self::NotFound => None,
        }
    }
}

// ============ Debug without secrets ============

/// Auth codes show up in `Debug` output only as `***`.
fn masked(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "***")
}

impl std::fmt::Debug for DomainInfoRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainInfoRequest")
            .field("name", &self.name)
            .field("hosts", &self.hosts)
            .field("auth_info", &masked(self.auth_info.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for DomainCreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainCreateRequest")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("nameservers", &self.nameservers)
            .field("registrant", &self.registrant)
            .field("contacts", &self.contacts)
            .field("auth_info", &"***")
            .finish()
    }
}

impl std::fmt::Debug for DomainTransferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainTransferRequest")
            .field("op", &self.op)
            .field("name", &self.name)
            .field("period", &self.period)
            .field("auth_info", &masked(self.auth_info.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for DomainUpdateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainUpdateRequest")
            .field("name", &self.name)
            .field("add", &self.add)
            .field("remove", &self.remove)
            .field("registrant", &self.registrant)
            .field("auth_info", &masked(self.auth_info.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for ContactCreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactCreateRequest")
            .field("id", &self.id)
            .field("postal_info", &self.postal_info)
            .field("voice", &self.voice)
            .field("fax", &self.fax)
            .field("email", &self.email)
            .field("auth_info", &"***")
            .finish()
    }
}

impl std::fmt::Debug for ContactUpdateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactUpdateRequest")
            .field("id", &self.id)
            .field("add_statuses", &self.add_statuses)
            .field("remove_statuses", &self.remove_statuses)
            .field("postal_info", &self.postal_info)
            .field("voice", &self.voice)
            .field("fax", &self.fax)
            .field("email", &self.email)
            .field("auth_info", &masked(self.auth_info.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for DomainInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainInfo")
            .field("name", &self.name)
            .field("roid", &self.roid)
            .field("statuses", &self.statuses)
            .field("registrant", &self.registrant)
            .field("contacts", &self.contacts)
            .field("nameservers", &self.nameservers)
            .field("hosts", &self.hosts)
            .field("sponsoring_client_id", &self.sponsoring_client_id)
            .field("creating_client_id", &self.creating_client_id)
            .field("updating_client_id", &self.updating_client_id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("expires_at", &self.expires_at)
            .field("transferred_at", &self.transferred_at)
            .field("auth_info", &masked(self.auth_info.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for ContactInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactInfo")
            .field("id", &self.id)
            .field("roid", &self.roid)
            .field("statuses", &self.statuses)
            .field("postal_info", &self.postal_info)
            .field("voice", &self.voice)
            .field("fax", &self.fax)
            .field("email", &self.email)
            .field("sponsoring_client_id", &self.sponsoring_client_id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("auth_info", &masked(self.auth_info.as_ref()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kind_follows_body() {
        assert_eq!(
            Command::check(ObjectType::Domain, ["a.com"]).kind(),
            CommandKind::Check(ObjectType::Domain)
        );
        assert_eq!(Command::poll_ack("12").kind(), CommandKind::Poll);
        assert_eq!(
            Command::domain_info(DomainInfoRequest::new("a.com"))
                .with_kind(CommandKind::Custom("authcode"))
                .kind(),
            CommandKind::Custom("authcode")
        );
    }

    #[test]
    fn command_kind_display() {
        assert_eq!(CommandKind::Info(ObjectType::Contact).to_string(), "contact:info");
        assert_eq!(CommandKind::DomainTransfer.to_string(), "domain:transfer");
        assert_eq!(CommandKind::Custom("nominet:release").to_string(), "nominet:release");
    }

    #[test]
    fn only_session_commands_skip_login() {
        assert!(!CommandKind::Hello.requires_login());
        assert!(!CommandKind::Logout.requires_login());
        assert!(CommandKind::Poll.requires_login());
        assert!(CommandKind::Custom("x").requires_login());
    }

    #[test]
    fn login_request_debug_hides_passwords() {
        let login = LoginRequest {
            client_id: "registrar".into(),
            password: "hunter2".into(),
            new_password: Some("hunter3".into()),
            version: "1.0".into(),
            language: "en".into(),
            object_uris: vec![DOMAIN_NS.into()],
            extension_uris: vec![],
        };
        let debug = format!("{login:?}");
        assert!(!debug.contains("hunter"));
        assert!(debug.contains("registrar"));
    }

    #[test]
    fn extension_data_lookup_is_case_insensitive() {
        let data = ExtensionData {
            values: vec![("COUNT".into(), "1".into())],
            elements: vec![],
        };
        assert_eq!(data.get("count"), Some("1"));
        assert_eq!(data.get("missing"), None);
    }

    #[test]
    fn transfer_list_result_accessors() {
        let none = TransferListResult {
            count: 0,
            created_at: None,
        };
        assert!(!none.transfer_exists());
        assert!(none.transfer_date().is_none());
    }

    #[test]
    fn domain_info_serializes_without_auth_info() {
        let info = DomainInfo {
            name: "example.com".into(),
            auth_info: Some("secret".into()),
            ..DomainInfo::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"name\":\"example.com\""));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn debug_output_masks_auth_codes() {
        let info = DomainInfo {
            name: "example.com".into(),
            auth_info: Some("XYZ-123-ABC".into()),
            ..DomainInfo::default()
        };
        let printed = format!("{info:?}");
        assert!(printed.contains("example.com"));
        assert!(!printed.contains("XYZ-123-ABC"));
        assert!(printed.contains("***"));

        let contact = ContactInfo {
            id: "jd1234".into(),
            auth_info: Some("c0ntact-pw".into()),
            ..ContactInfo::default()
        };
        assert!(!format!("{contact:?}").contains("c0ntact-pw"));

        let mut transfer = DomainTransferRequest {
            op: TransferOp::Request,
            name: "example.com".into(),
            period: None,
            auth_info: Some("XYZ-123-ABC".into()),
        };
        assert!(!format!("{transfer:?}").contains("XYZ-123-ABC"));
        transfer.auth_info = None;
        assert!(format!("{transfer:?}").contains("auth_info: None"));

        let mut update = DomainUpdateRequest::new("example.com");
        update.auth_info = Some("n3w-code".into());
        let command = Command::domain_update(update);
        assert!(!format!("{command:?}").contains("n3w-code"));
    }

    #[test]
    fn object_type_from_element() {
        let el = XmlElement::new("x:infData").with_attr("xmlns:x", CONTACT_NS);
        assert_eq!(ObjectType::of_element(&el), Some(ObjectType::Contact));
        let el = XmlElement::new("host:chkData");
        assert_eq!(ObjectType::of_element(&el), Some(ObjectType::Host));
        assert_eq!(ObjectType::of_element(&XmlElement::new("chkData")), None);
    }
}
