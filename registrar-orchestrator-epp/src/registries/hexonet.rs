//! Hexonet (ISPAPI) binding
//!
//! Hexonet tunnels its proprietary API through the `keyvalue` extension: a base
//! EPP command carries `<keyvalue:kv key=".." value=".."/>` pairs naming the real
//! ISPAPI command, and the answer comes back as key/value pairs in `<extension>`.

use crate::error::Result;
use crate::extension::{ExtensionBinding, ResponseParts};
use crate::session::EppSession;
use crate::types::{
    Command, CommandKind, DomainUpdateRequest, ExtensionBlock, ObjectType, RGP_NS, ResponseData,
    SEC_DNS_NS, TransferListResult,
};
use crate::utils::datetime::parse_epp_datetime;
use crate::xml::XmlError;

pub const NAME: &str = "hexonet";

pub const KEYVALUE_NS: &str = "http://schema.ispapi.net/epp/xml/keyvalue-1.0";
const KEYVALUE_PREFIX: &str = "keyvalue";

/// `QueryTransferList` for one domain, sent as a domain check.
pub const QUERY_TRANSFER_LIST: CommandKind = CommandKind::Custom("hexonet:QueryTransferList");

/// `ModifyDomain` with `RENEWALMODE`, sent as a domain update.
pub const SET_RENEWAL_MODE: CommandKind = CommandKind::Custom("hexonet:SetRenewalMode");

/// What Hexonet does when a domain reaches its expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalMode {
    AutoRenew,
    AutoExpire,
    AutoDelete,
    /// Account default.
    Default,
}

impl RenewalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoRenew => "AUTORENEW",
            Self::AutoExpire => "AUTOEXPIRE",
            Self::AutoDelete => "AUTODELETE",
            Self::Default => "DEFAULT",
        }
    }
}

pub fn binding() -> ExtensionBinding {
    ExtensionBinding::builder(NAME)
        .register_extension(KEYVALUE_PREFIX, KEYVALUE_NS)
        .register_extension("secDNS", SEC_DNS_NS)
        .register_extension("rgp", RGP_NS)
        .register_command_response_type(QUERY_TRANSFER_LIST, parse_transfer_list)
        .redact_key_value("AUTH")
        .redact_key_value("AUTHCODE")
        .redact_key_value("PASSWORD")
        .build()
}

fn key_values<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> ExtensionBlock {
    ExtensionBlock::key_value(KEYVALUE_PREFIX, KEYVALUE_NS, pairs)
}

/// Ask whether a transfer for `domain` is already in progress.
pub fn query_transfer_list(domain: &str) -> Command {
    Command::check(ObjectType::Domain, [domain])
        .with_kind(QUERY_TRANSFER_LIST)
        .with_extension(key_values([
            ("COMMAND", "QueryTransferList"),
            ("DOMAIN", domain),
        ]))
}

/// Change the renewal mode of `domain`.
pub fn renewal_mode_command(domain: &str, mode: RenewalMode) -> Command {
    Command::domain_update(DomainUpdateRequest::new(domain))
        .with_kind(SET_RENEWAL_MODE)
        .with_extension(key_values([
            ("COMMAND", "ModifyDomain"),
            ("DOMAIN", domain),
            ("RENEWALMODE", mode.as_str()),
        ]))
}

fn parse_transfer_list(parts: &ResponseParts<'_>) -> std::result::Result<ResponseData, XmlError> {
    let count = match parts.extension.get("COUNT") {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| XmlError::new(format!("COUNT is not a number: {value}")))?,
        None => 0,
    };
    let created_at = parts
        .extension
        .get("CREATEDDATE")
        .and_then(parse_epp_datetime);
    Ok(ResponseData::TransferList(TransferListResult { count, created_at }))
}

/// Run [`query_transfer_list`] on a logged-in session.
pub async fn transfer_list(session: &mut EppSession, domain: &str) -> Result<TransferListResult> {
    let response = session.execute(query_transfer_list(domain)).await?;
    if let Some(result) = response.transfer_list() {
        return Ok(result.clone());
    }
    log::debug!(
        "[{}] QueryTransferList for {domain} returned no keyvalue data; treating as no transfer",
        session.registry()
    );
    Ok(TransferListResult {
        count: 0,
        created_at: None,
    })
}

/// Run [`renewal_mode_command`] on a logged-in session.
pub async fn set_renewal_mode(session: &mut EppSession, domain: &str, mode: RenewalMode) -> Result<()> {
    session.execute(renewal_mode_command(domain, mode)).await?;
    Ok(())
}
