//! EPP command encoding and response decoding
//!
//! Encoding builds the base RFC 5730-5733 structure, appends the command's own
//! extension blocks, then runs the binding's encode hooks. Extension elements always
//! end up in front of `<clTRID>`, which several registries require.
//!
//! Decoding reads the result block, message queue and transaction IDs, collects
//! extension key/value data, and turns `<resData>` into [`ResponseData`], unless the
//! binding installed a parser override for the command kind.

use std::sync::Arc;

use crate::error::{EppError, Result};
use crate::extension::{ExtensionBinding, ResponseParts};
use crate::types::{
    CheckResult, Command, CommandBody, CommandKind, ContactCreateRequest, ContactInfo,
    ContactUpdateRequest, DomainContact, DomainCreateRequest, DomainCreated, DomainInfo,
    DomainRenewRequest, DomainRenewed, DomainTransferRequest, DomainUpdateRequest,
    DomainChangeSet, EPP_NS, EPP_SCHEMA_LOCATION, ExtensionBlock, ExtensionData, Greeting,
    HostCreateRequest, HostInfo, LoginRequest, MessageQueue, ObjectCreated, ObjectType, Period,
    PollOp, PostalInfo, PostalInfoType, Response, ResponseData, TransferInfo, XSI_NS,
};
use crate::utils::datetime::parse_epp_datetime;
use crate::utils::log_sanitizer::truncate_for_log;
use crate::xml::{XmlElement, XmlError};

/// Encoder/decoder parameterized by a registry binding.
#[derive(Debug, Clone)]
pub struct Codec {
    binding: Arc<ExtensionBinding>,
}

impl Codec {
    pub fn new(binding: Arc<ExtensionBinding>) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &ExtensionBinding {
        &self.binding
    }

    fn protocol_error(&self, detail: impl std::fmt::Display, raw: &str) -> EppError {
        EppError::protocol(
            self.binding.name(),
            detail.to_string(),
            Some(self.binding.redact(raw)),
        )
    }

    // ============ Encoding ============

    /// Serialize `command` into a complete EPP document.
    ///
    /// `cltrid` is omitted for `<hello/>`, which carries no transaction ID.
    pub fn encode(&self, command: &Command, cltrid: Option<&str>) -> Result<String> {
        let mut root = XmlElement::new("epp")
            .with_attr("xmlns", EPP_NS)
            .with_attr("xmlns:xsi", XSI_NS)
            .with_attr("xsi:schemaLocation", EPP_SCHEMA_LOCATION);
        for ns in self.binding.namespaces() {
            root.set_attr(format!("xmlns:{}", ns.prefix), &ns.uri);
        }

        if matches!(command.body(), CommandBody::Hello) {
            root.push(XmlElement::new("hello"));
        } else {
            root.push(self.encode_command(command, cltrid)?);
        }

        root.to_document()
            .map_err(|e| EppError::protocol(self.binding.name(), format!("encode failed: {e}"), None))
    }

    fn encode_command(&self, command: &Command, cltrid: Option<&str>) -> Result<XmlElement> {
        let mut element = XmlElement::new("command").with_child(encode_body(command.body()));

        if !command.extensions().is_empty() {
            let mut extension = XmlElement::new("extension");
            for block in command.extensions() {
                extension.push(encode_extension_block(block));
            }
            element.push(extension);
        }

        if let Some(id) = cltrid {
            element.push(XmlElement::new("clTRID").with_text(id));
        }

        for hook in self.binding.encode_hooks_for(command.kind()) {
            hook(command, &mut element).map_err(|e| {
                EppError::protocol(
                    self.binding.name(),
                    format!("{} extension hook failed: {e}", command.kind()),
                    None,
                )
            })?;
        }
        Ok(element)
    }

    // ============ Decoding ============

    /// Parse a `<greeting>` document.
    pub fn decode_greeting(&self, xml: &str) -> Result<Greeting> {
        let root = XmlElement::parse(xml).map_err(|e| self.protocol_error(e, xml))?;
        let greeting = envelope(&root)
            .and_then(|epp| epp.child("greeting").ok_or_else(|| XmlError::missing("greeting")))
            .map_err(|e| self.protocol_error(e, xml))?;
        Ok(parse_greeting(greeting))
    }

    /// Parse a `<response>` document for a command of the given kind.
    pub fn decode(&self, xml: &str, kind: CommandKind) -> Result<Response> {
        let root = XmlElement::parse(xml).map_err(|e| self.protocol_error(e, xml))?;
        self.decode_response(&root, xml, kind).map_err(|e| {
            log::error!(
                "[{}] Failed to decode {kind} response: {e}; body: {}",
                self.binding.name(),
                truncate_for_log(&self.binding.redact(xml))
            );
            self.protocol_error(e, xml)
        })
    }

    fn decode_response(
        &self,
        root: &XmlElement,
        xml: &str,
        kind: CommandKind,
    ) -> std::result::Result<Response, XmlError> {
        let response = envelope(root)?
            .child("response")
            .ok_or_else(|| XmlError::missing("response"))?;
        let result = response
            .child("result")
            .ok_or_else(|| XmlError::missing("result"))?;
        let result_code = result
            .attr("code")
            .ok_or_else(|| XmlError::new("<result> has no code attribute"))?
            .parse::<u16>()
            .map_err(|_| XmlError::new("<result> code is not a number"))?;
        let message = result.child_text("msg").unwrap_or_default();
        let reason = result
            .child("extValue")
            .and_then(|ext| ext.child_text("reason"));

        let message_queue = response.child("msgQ").map(parse_message_queue);
        let (client_transaction_id, server_transaction_id) = response
            .child("trID")
            .map(|tr| (tr.child_text("clTRID"), tr.child_text("svTRID")))
            .unwrap_or_default();

        let extension = response
            .child("extension")
            .map(parse_extension)
            .unwrap_or_default();

        let data = if crate::result_code::is_success(result_code) {
            let parts = ResponseParts {
                result_code,
                message: &message,
                res_data: response.child("resData").and_then(|rd| rd.elements().next()),
                extension: &extension,
            };
            match self.binding.parser_for(kind) {
                Some(parser) => parser(&parts)?,
                None => parse_res_data(parts.res_data)?,
            }
        } else {
            ResponseData::None
        };

        Ok(Response {
            result_code,
            message,
            reason,
            message_queue,
            client_transaction_id,
            server_transaction_id,
            data,
            extension,
            raw_xml: xml.to_string(),
        })
    }
}

// ============ Encode helpers ============

fn text_el(name: &str, text: impl Into<String>) -> XmlElement {
    XmlElement::new(name).with_text(text)
}

fn object_el(object: ObjectType, verb: &str) -> XmlElement {
    XmlElement::new(format!("{}:{verb}", object.prefix()))
        .with_attr(format!("xmlns:{}", object.prefix()), object.namespace())
}

fn period_el(prefix: &str, period: Period) -> XmlElement {
    XmlElement::new(format!("{prefix}:period"))
        .with_attr("unit", period.unit_attr())
        .with_text(period.value.to_string())
}

fn auth_info_el(prefix: &str, password: &str) -> XmlElement {
    XmlElement::new(format!("{prefix}:authInfo")).with_child(text_el(&format!("{prefix}:pw"), password))
}

fn contact_els(contacts: &[DomainContact]) -> impl Iterator<Item = XmlElement> + '_ {
    contacts.iter().map(|c| {
        XmlElement::new("domain:contact")
            .with_attr("type", c.contact_type.as_str())
            .with_text(&c.id)
    })
}

fn ns_el(nameservers: &[String]) -> Option<XmlElement> {
    (!nameservers.is_empty()).then(|| {
        XmlElement::new("domain:ns")
            .with_children(nameservers.iter().map(|ns| text_el("domain:hostObj", ns)))
    })
}

fn encode_body(body: &CommandBody) -> XmlElement {
    match body {
        CommandBody::Hello => XmlElement::new("hello"),
        CommandBody::Login(login) => encode_login(login),
        CommandBody::Logout => XmlElement::new("logout"),
        CommandBody::Check { object, names } => {
            let key = format!("{}:{}", object.prefix(), object.key_element());
            XmlElement::new("check").with_child(
                object_el(*object, "check").with_children(names.iter().map(|n| text_el(&key, n))),
            )
        }
        CommandBody::DomainInfo(request) => {
            let info = object_el(ObjectType::Domain, "info")
                .with_child(
                    text_el("domain:name", &request.name).with_attr("hosts", request.hosts.as_str()),
                )
                .with_optional_child(
                    request
                        .auth_info
                        .as_deref()
                        .map(|pw| auth_info_el("domain", pw)),
                );
            XmlElement::new("info").with_child(info)
        }
        CommandBody::DomainCreate(request) => encode_domain_create(request),
        CommandBody::DomainRenew(request) => encode_domain_renew(request),
        CommandBody::DomainTransfer(request) => encode_domain_transfer(request),
        CommandBody::DomainUpdate(request) => encode_domain_update(request),
        CommandBody::DomainDelete { name } => XmlElement::new("delete")
            .with_child(object_el(ObjectType::Domain, "delete").with_child(text_el("domain:name", name))),
        CommandBody::ContactInfo { id, auth_info } => XmlElement::new("info").with_child(
            object_el(ObjectType::Contact, "info")
                .with_child(text_el("contact:id", id))
                .with_optional_child(auth_info.as_deref().map(|pw| auth_info_el("contact", pw))),
        ),
        CommandBody::ContactCreate(request) => encode_contact_create(request),
        CommandBody::ContactUpdate(request) => encode_contact_update(request),
        CommandBody::HostInfo { name } => XmlElement::new("info")
            .with_child(object_el(ObjectType::Host, "info").with_child(text_el("host:name", name))),
        CommandBody::HostCreate(request) => encode_host_create(request),
        CommandBody::Poll(PollOp::Request) => XmlElement::new("poll").with_attr("op", "req"),
        CommandBody::Poll(PollOp::Ack(id)) => XmlElement::new("poll")
            .with_attr("op", "ack")
            .with_attr("msgID", id),
        CommandBody::Raw(verb) => verb.clone(),
    }
}

fn encode_login(login: &LoginRequest) -> XmlElement {
    let mut services = XmlElement::new("svcs")
        .with_children(login.object_uris.iter().map(|uri| text_el("objURI", uri)));
    if !login.extension_uris.is_empty() {
        services.push(
            XmlElement::new("svcExtension")
                .with_children(login.extension_uris.iter().map(|uri| text_el("extURI", uri))),
        );
    }

    XmlElement::new("login")
        .with_child(text_el("clID", &login.client_id))
        .with_child(text_el("pw", &login.password))
        .with_optional_child(login.new_password.as_deref().map(|pw| text_el("newPW", pw)))
        .with_child(
            XmlElement::new("options")
                .with_child(text_el("version", &login.version))
                .with_child(text_el("lang", &login.language)),
        )
        .with_child(services)
}

fn encode_domain_create(request: &DomainCreateRequest) -> XmlElement {
    let create = object_el(ObjectType::Domain, "create")
        .with_child(text_el("domain:name", &request.name))
        .with_optional_child(request.period.map(|p| period_el("domain", p)))
        .with_optional_child(ns_el(&request.nameservers))
        .with_optional_child(
            request
                .registrant
                .as_deref()
                .map(|id| text_el("domain:registrant", id)),
        )
        .with_children(contact_els(&request.contacts))
        .with_child(auth_info_el("domain", &request.auth_info));
    XmlElement::new("create").with_child(create)
}

fn encode_domain_renew(request: &DomainRenewRequest) -> XmlElement {
    let renew = object_el(ObjectType::Domain, "renew")
        .with_child(text_el("domain:name", &request.name))
        .with_child(text_el(
            "domain:curExpDate",
            request.current_expiry.format("%Y-%m-%d").to_string(),
        ))
        .with_optional_child(request.period.map(|p| period_el("domain", p)));
    XmlElement::new("renew").with_child(renew)
}

fn encode_domain_transfer(request: &DomainTransferRequest) -> XmlElement {
    let transfer = object_el(ObjectType::Domain, "transfer")
        .with_child(text_el("domain:name", &request.name))
        .with_optional_child(request.period.map(|p| period_el("domain", p)))
        .with_optional_child(
            request
                .auth_info
                .as_deref()
                .map(|pw| auth_info_el("domain", pw)),
        );
    XmlElement::new("transfer")
        .with_attr("op", request.op.as_str())
        .with_child(transfer)
}

fn change_set_el(name: &str, set: &DomainChangeSet) -> Option<XmlElement> {
    (!set.is_empty()).then(|| {
        XmlElement::new(name)
            .with_optional_child(ns_el(&set.nameservers))
            .with_children(contact_els(&set.contacts))
            .with_children(
                set.statuses
                    .iter()
                    .map(|s| XmlElement::new("domain:status").with_attr("s", s)),
            )
    })
}

fn encode_domain_update(request: &DomainUpdateRequest) -> XmlElement {
    let change = (request.registrant.is_some() || request.auth_info.is_some()).then(|| {
        XmlElement::new("domain:chg")
            .with_optional_child(
                request
                    .registrant
                    .as_deref()
                    .map(|id| text_el("domain:registrant", id)),
            )
            .with_optional_child(
                request
                    .auth_info
                    .as_deref()
                    .map(|pw| auth_info_el("domain", pw)),
            )
    });

    let update = object_el(ObjectType::Domain, "update")
        .with_child(text_el("domain:name", &request.name))
        .with_optional_child(change_set_el("domain:add", &request.add))
        .with_optional_child(change_set_el("domain:rem", &request.remove))
        .with_optional_child(change);
    XmlElement::new("update").with_child(update)
}

fn postal_info_el(info: &PostalInfo) -> XmlElement {
    let address = XmlElement::new("contact:addr")
        .with_children(info.street.iter().map(|s| text_el("contact:street", s)))
        .with_child(text_el("contact:city", &info.city))
        .with_optional_child(info.province.as_deref().map(|sp| text_el("contact:sp", sp)))
        .with_optional_child(info.postal_code.as_deref().map(|pc| text_el("contact:pc", pc)))
        .with_child(text_el("contact:cc", &info.country_code));

    XmlElement::new("contact:postalInfo")
        .with_attr("type", info.kind.as_str())
        .with_child(text_el("contact:name", &info.name))
        .with_optional_child(info.organization.as_deref().map(|o| text_el("contact:org", o)))
        .with_child(address)
}

fn encode_contact_create(request: &ContactCreateRequest) -> XmlElement {
    let create = object_el(ObjectType::Contact, "create")
        .with_child(text_el("contact:id", &request.id))
        .with_child(postal_info_el(&request.postal_info))
        .with_optional_child(request.voice.as_deref().map(|v| text_el("contact:voice", v)))
        .with_optional_child(request.fax.as_deref().map(|f| text_el("contact:fax", f)))
        .with_child(text_el("contact:email", &request.email))
        .with_child(auth_info_el("contact", &request.auth_info));
    XmlElement::new("create").with_child(create)
}

fn encode_contact_update(request: &ContactUpdateRequest) -> XmlElement {
    let statuses = |name: &str, values: &[String]| {
        (!values.is_empty()).then(|| {
            XmlElement::new(name).with_children(
                values
                    .iter()
                    .map(|s| XmlElement::new("contact:status").with_attr("s", s)),
            )
        })
    };

    let change = request.has_changes().then(|| {
        XmlElement::new("contact:chg")
            .with_optional_child(request.postal_info.as_ref().map(postal_info_el))
            .with_optional_child(request.voice.as_deref().map(|v| text_el("contact:voice", v)))
            .with_optional_child(request.fax.as_deref().map(|f| text_el("contact:fax", f)))
            .with_optional_child(request.email.as_deref().map(|e| text_el("contact:email", e)))
            .with_optional_child(
                request
                    .auth_info
                    .as_deref()
                    .map(|pw| auth_info_el("contact", pw)),
            )
    });

    let update = object_el(ObjectType::Contact, "update")
        .with_child(text_el("contact:id", &request.id))
        .with_optional_child(statuses("contact:add", &request.add_statuses))
        .with_optional_child(statuses("contact:rem", &request.remove_statuses))
        .with_optional_child(change);
    XmlElement::new("update").with_child(update)
}

fn encode_host_create(request: &HostCreateRequest) -> XmlElement {
    let create = object_el(ObjectType::Host, "create")
        .with_child(text_el("host:name", &request.name))
        .with_children(request.addresses.iter().map(|ip| {
            XmlElement::new("host:addr")
                .with_attr("ip", if ip.is_ipv4() { "v4" } else { "v6" })
                .with_text(ip.to_string())
        }));
    XmlElement::new("create").with_child(create)
}

fn encode_extension_block(block: &ExtensionBlock) -> XmlElement {
    match block {
        ExtensionBlock::KeyValue {
            prefix,
            namespace,
            pairs,
        } => XmlElement::new(format!("{prefix}:extension"))
            .with_attr(format!("xmlns:{prefix}"), namespace)
            .with_children(pairs.iter().map(|(key, value)| {
                XmlElement::new(format!("{prefix}:kv"))
                    .with_attr("key", key)
                    .with_attr("value", value)
            })),
        ExtensionBlock::Element(element) => element.clone(),
    }
}

/// Return the `<extension>` element of a `<command>`, creating it in front of `<clTRID>`.
///
/// Encode hooks use this so extension content never trails the transaction ID.
pub fn extension_slot(
    command: &mut XmlElement,
) -> std::result::Result<&mut XmlElement, XmlError> {
    command.ensure_child_before("extension", "clTRID")
}

// ============ Decode helpers ============

fn envelope(root: &XmlElement) -> std::result::Result<&XmlElement, XmlError> {
    if root.local_name() == "epp" {
        Ok(root)
    } else {
        Err(XmlError::new(format!(
            "expected <epp> root element, found <{}>",
            root.name
        )))
    }
}

fn texts(element: &XmlElement, local_name: &str) -> Vec<String> {
    element.children_named(local_name).map(XmlElement::text).collect()
}

fn date(element: &XmlElement, local_name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    element
        .child_text(local_name)
        .and_then(|value| parse_epp_datetime(&value))
}

fn parse_greeting(greeting: &XmlElement) -> Greeting {
    let menu = greeting.child("svcMenu");
    let from_menu = |name: &str| menu.map(|m| texts(m, name)).unwrap_or_default();
    Greeting {
        server_id: greeting.child_text("svID").unwrap_or_default(),
        server_date: date(greeting, "svDate"),
        versions: from_menu("version"),
        languages: from_menu("lang"),
        object_uris: from_menu("objURI"),
        extension_uris: menu
            .and_then(|m| m.child("svcExtension"))
            .map(|ext| texts(ext, "extURI"))
            .unwrap_or_default(),
    }
}

fn parse_message_queue(queue: &XmlElement) -> MessageQueue {
    MessageQueue {
        count: queue
            .attr("count")
            .and_then(|c| c.parse().ok())
            .unwrap_or_default(),
        id: queue.attr("id").map(ToString::to_string),
        queued_at: date(queue, "qDate"),
        message: queue.child_text("msg"),
    }
}

/// Collect `key`/`value` attribute pairs from any depth and keep the top-level blocks.
pub(crate) fn parse_extension(extension: &XmlElement) -> ExtensionData {
    let values = extension
        .descendants()
        .into_iter()
        .filter_map(|e| Some((e.attr("key")?.to_string(), e.attr("value")?.to_string())))
        .collect();
    ExtensionData {
        values,
        elements: extension.elements().cloned().collect(),
    }
}

/// Default `<resData>` decoding, dispatched on the payload element.
pub fn parse_res_data(
    res_data: Option<&XmlElement>,
) -> std::result::Result<ResponseData, XmlError> {
    let Some(payload) = res_data else {
        return Ok(ResponseData::None);
    };
    let Some(object) = ObjectType::of_element(payload) else {
        return Ok(ResponseData::Raw(payload.clone()));
    };

    let data = match (object, payload.local_name()) {
        (_, "chkData") => ResponseData::Check(parse_check(object, payload)?),
        (ObjectType::Domain, "infData") => {
            ResponseData::DomainInfo(Box::new(parse_domain_info(payload)?))
        }
        (ObjectType::Domain, "creData") => ResponseData::DomainCreated(DomainCreated {
            name: payload.required_text("name")?,
            created_at: date(payload, "crDate"),
            expires_at: date(payload, "exDate"),
        }),
        (ObjectType::Domain, "renData") => ResponseData::DomainRenewed(DomainRenewed {
            name: payload.required_text("name")?,
            expires_at: date(payload, "exDate"),
        }),
        (ObjectType::Domain, "trnData") => ResponseData::Transfer(parse_transfer(payload)?),
        (ObjectType::Contact, "infData") => {
            ResponseData::ContactInfo(Box::new(parse_contact_info(payload)?))
        }
        (ObjectType::Contact, "creData") => ResponseData::Created(ObjectCreated {
            id: payload.required_text("id")?,
            created_at: date(payload, "crDate"),
        }),
        (ObjectType::Host, "infData") => ResponseData::HostInfo(parse_host_info(payload)?),
        (ObjectType::Host, "creData") => ResponseData::Created(ObjectCreated {
            id: payload.required_text("name")?,
            created_at: date(payload, "crDate"),
        }),
        _ => ResponseData::Raw(payload.clone()),
    };
    Ok(data)
}

fn parse_check(
    object: ObjectType,
    payload: &XmlElement,
) -> std::result::Result<Vec<CheckResult>, XmlError> {
    payload
        .children_named("cd")
        .map(|cd| {
            let key = cd
                .child(object.key_element())
                .ok_or_else(|| XmlError::missing(object.key_element()))?;
            Ok(CheckResult {
                name: key.text(),
                available: matches!(key.attr("avail"), Some("1" | "true")),
                reason: cd.child_text("reason"),
            })
        })
        .collect()
}

fn parse_domain_info(payload: &XmlElement) -> std::result::Result<DomainInfo, XmlError> {
    Ok(DomainInfo {
        name: payload.required_text("name")?,
        roid: payload.child_text("roid"),
        statuses: payload
            .children_named("status")
            .filter_map(|s| s.attr("s").map(ToString::to_string))
            .collect(),
        registrant: payload.child_text("registrant"),
        contacts: payload
            .children_named("contact")
            .filter_map(|c| {
                let contact_type = c.attr("type").and_then(crate::types::ContactType::parse)?;
                Some(DomainContact::new(contact_type, c.text()))
            })
            .collect(),
        nameservers: payload
            .child("ns")
            .map(|ns| {
                ns.elements()
                    .filter_map(|host| match host.local_name() {
                        "hostObj" => Some(host.text()),
                        "hostAttr" => host.child_text("hostName"),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        hosts: texts(payload, "host"),
        sponsoring_client_id: payload.child_text("clID"),
        creating_client_id: payload.child_text("crID"),
        updating_client_id: payload.child_text("upID"),
        created_at: date(payload, "crDate"),
        updated_at: date(payload, "upDate"),
        expires_at: date(payload, "exDate"),
        transferred_at: date(payload, "trDate"),
        auth_info: payload.child("authInfo").and_then(|a| a.child_text("pw")),
    })
}

fn parse_transfer(payload: &XmlElement) -> std::result::Result<TransferInfo, XmlError> {
    Ok(TransferInfo {
        name: payload.required_text("name")?,
        status: payload.required_text("trStatus")?,
        requested_by: payload.child_text("reID"),
        requested_at: date(payload, "reDate"),
        action_by: payload.child_text("acID"),
        action_at: date(payload, "acDate"),
        expires_at: date(payload, "exDate"),
    })
}

fn parse_postal_info(element: &XmlElement) -> PostalInfo {
    let address = element.child("addr");
    PostalInfo {
        kind: match element.attr("type") {
            Some("loc") => PostalInfoType::Loc,
            _ => PostalInfoType::Int,
        },
        name: element.child_text("name").unwrap_or_default(),
        organization: element.child_text("org"),
        street: address.map(|a| texts(a, "street")).unwrap_or_default(),
        city: address.and_then(|a| a.child_text("city")).unwrap_or_default(),
        province: address.and_then(|a| a.child_text("sp")),
        postal_code: address.and_then(|a| a.child_text("pc")),
        country_code: address.and_then(|a| a.child_text("cc")).unwrap_or_default(),
    }
}

fn parse_contact_info(payload: &XmlElement) -> std::result::Result<ContactInfo, XmlError> {
    Ok(ContactInfo {
        id: payload.required_text("id")?,
        roid: payload.child_text("roid"),
        statuses: payload
            .children_named("status")
            .filter_map(|s| s.attr("s").map(ToString::to_string))
            .collect(),
        postal_info: payload
            .children_named("postalInfo")
            .map(parse_postal_info)
            .collect(),
        voice: payload.child_text("voice"),
        fax: payload.child_text("fax"),
        email: payload.child_text("email"),
        sponsoring_client_id: payload.child_text("clID"),
        created_at: date(payload, "crDate"),
        updated_at: date(payload, "upDate"),
        auth_info: payload.child("authInfo").and_then(|a| a.child_text("pw")),
    })
}

fn parse_host_info(payload: &XmlElement) -> std::result::Result<HostInfo, XmlError> {
    Ok(HostInfo {
        name: payload.required_text("name")?,
        roid: payload.child_text("roid"),
        statuses: payload
            .children_named("status")
            .filter_map(|s| s.attr("s").map(ToString::to_string))
            .collect(),
        addresses: texts(payload, "addr"),
        sponsoring_client_id: payload.child_text("clID"),
        created_at: date(payload, "crDate"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainInfoRequest, DomainUpdateRequest, TransferOp, status};
    use chrono::NaiveDate;

    fn codec() -> Codec {
        Codec::new(Arc::new(ExtensionBinding::builder("test").build()))
    }

    fn command_children(xml: &str) -> Vec<String> {
        let root = XmlElement::parse(xml).unwrap();
        root.child("command")
            .unwrap()
            .elements()
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn hello_has_no_command_or_cltrid() {
        let xml = codec().encode(&Command::hello(), None).unwrap();
        let root = XmlElement::parse(&xml).unwrap();
        assert!(root.child("hello").is_some());
        assert!(root.child("command").is_none());
        assert!(!xml.contains("clTRID"));
    }

    #[test]
    fn check_command_layout() {
        let xml = codec()
            .encode(
                &Command::check(ObjectType::Domain, ["a.com", "b.net"]),
                Some("T-1"),
            )
            .unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>"));
        let root = XmlElement::parse(&xml).unwrap();
        assert_eq!(root.attr("xmlns"), Some(EPP_NS));
        let check = root.find_path(&["command", "check", "check"]).unwrap();
        assert_eq!(check.name, "domain:check");
        let names: Vec<_> = check.children_named("name").map(XmlElement::text).collect();
        assert_eq!(names, ["a.com", "b.net"]);
        assert_eq!(command_children(&xml), ["check", "clTRID"]);
    }

    #[test]
    fn extension_block_precedes_cltrid() {
        let command = Command::domain_info(DomainInfoRequest::new("example.com")).with_extension(
            ExtensionBlock::key_value("keyvalue", "urn:example:kv", [("COMMAND", "X")]),
        );
        let xml = codec().encode(&command, Some("T-2")).unwrap();
        assert_eq!(command_children(&xml), ["info", "extension", "clTRID"]);
        assert!(xml.contains(r#"<keyvalue:kv key="COMMAND" value="X"/>"#));
    }

    #[test]
    fn hook_added_extension_precedes_cltrid() {
        fn hook(_: &Command, command: &mut XmlElement) -> std::result::Result<(), XmlError> {
            extension_slot(command)?.push(XmlElement::new("ext:flag"));
            Ok(())
        }
        let codec = Codec::new(Arc::new(
            ExtensionBinding::builder("test")
                .register_encode_hook(Some(CommandKind::Info(ObjectType::Domain)), hook)
                .build(),
        ));
        let xml = codec
            .encode(&Command::domain_info(DomainInfoRequest::new("a.com")), Some("T-3"))
            .unwrap();
        assert_eq!(command_children(&xml), ["info", "extension", "clTRID"]);

        let xml = codec
            .encode(&Command::check(ObjectType::Domain, ["a.com"]), Some("T-4"))
            .unwrap();
        assert_eq!(command_children(&xml), ["check", "clTRID"]);
    }

    #[test]
    fn binding_namespaces_declared_on_root() {
        let codec = Codec::new(Arc::new(
            ExtensionBinding::builder("test")
                .register_extension("secDNS", crate::types::SEC_DNS_NS)
                .build(),
        ));
        let xml = codec.encode(&Command::logout(), Some("T")).unwrap();
        let root = XmlElement::parse(&xml).unwrap();
        assert_eq!(root.attr("xmlns:secDNS"), Some(crate::types::SEC_DNS_NS));
    }

    #[test]
    fn login_layout() {
        let login = LoginRequest {
            client_id: "reg".into(),
            password: "pw1".into(),
            new_password: Some("pw2".into()),
            version: "1.0".into(),
            language: "en".into(),
            object_uris: vec![crate::types::DOMAIN_NS.into()],
            extension_uris: vec![crate::types::SEC_DNS_NS.into()],
        };
        let xml = codec().encode(&Command::login(login), Some("T-5")).unwrap();
        let root = XmlElement::parse(&xml).unwrap();
        let login = root.find_path(&["command", "login"]).unwrap();
        let order: Vec<_> = login.elements().map(|e| e.name.clone()).collect();
        assert_eq!(order, ["clID", "pw", "newPW", "options", "svcs"]);
        assert_eq!(
            login
                .find_path(&["svcs", "svcExtension", "extURI"])
                .map(XmlElement::text)
                .as_deref(),
            Some(crate::types::SEC_DNS_NS)
        );
    }

    #[test]
    fn renew_and_transfer_payloads() {
        let renew = Command::domain_renew(DomainRenewRequest {
            name: "a.com".into(),
            current_expiry: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            period: Some(Period::years(2)),
        });
        let xml = codec().encode(&renew, Some("T")).unwrap();
        assert!(xml.contains("<domain:curExpDate>2025-03-01</domain:curExpDate>"));
        assert!(xml.contains(r#"<domain:period unit="y">2</domain:period>"#));

        let transfer = Command::domain_transfer(DomainTransferRequest {
            op: TransferOp::Request,
            name: "a.com".into(),
            period: None,
            auth_info: Some("code".into()),
        });
        let xml = codec().encode(&transfer, Some("T")).unwrap();
        assert!(xml.contains(r#"<transfer op="request">"#));
        assert!(xml.contains("<domain:pw>code</domain:pw>"));
    }

    #[test]
    fn update_omits_empty_sections() {
        let mut request = DomainUpdateRequest::new("a.com");
        request
            .add
            .statuses
            .push(status::CLIENT_TRANSFER_PROHIBITED.to_string());
        let xml = codec().encode(&Command::domain_update(request), Some("T")).unwrap();
        assert!(xml.contains(r#"<domain:add><domain:status s="clientTransferProhibited"/></domain:add>"#));
        assert!(!xml.contains("domain:rem"));
        assert!(!xml.contains("domain:chg"));
    }

    #[test]
    fn poll_ack_attributes() {
        let xml = codec().encode(&Command::poll_ack("42"), Some("T")).unwrap();
        assert!(xml.contains(r#"<poll op="ack" msgID="42"/>"#));
    }

    const CHECK_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <response>
    <result code="1000"><msg>Command completed successfully</msg></result>
    <resData>
      <domain:chkData xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">
        <domain:cd><domain:name avail="1">free.com</domain:name></domain:cd>
        <domain:cd><domain:name avail="0">taken.com</domain:name><domain:reason>In use</domain:reason></domain:cd>
      </domain:chkData>
    </resData>
    <trID><clTRID>ABC-1</clTRID><svTRID>SRV-9</svTRID></trID>
  </response>
</epp>"#;

    #[test]
    fn decode_check_response() {
        let response = codec()
            .decode(CHECK_RESPONSE, CommandKind::Check(ObjectType::Domain))
            .unwrap();
        assert_eq!(response.result_code, 1000);
        assert_eq!(response.client_transaction_id.as_deref(), Some("ABC-1"));
        assert_eq!(response.server_transaction_id.as_deref(), Some("SRV-9"));
        let results = response.check_results().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].available);
        assert!(!results[1].available);
        assert_eq!(results[1].reason.as_deref(), Some("In use"));
    }

    #[test]
    fn decode_domain_info() {
        let xml = r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><response>
  <result code="1000"><msg>ok</msg></result>
  <resData><domain:infData xmlns:domain="urn:ietf:params:xml:ns:domain-1.0">
    <domain:name>example.com</domain:name>
    <domain:roid>EXAMPLE1-REP</domain:roid>
    <domain:status s="ok"/>
    <domain:registrant>jd1234</domain:registrant>
    <domain:contact type="admin">sh8013</domain:contact>
    <domain:ns><domain:hostObj>ns1.example.com</domain:hostObj><domain:hostObj>ns2.example.com</domain:hostObj></domain:ns>
    <domain:clID>ClientX</domain:clID>
    <domain:crDate>1999-04-03T22:00:00.0Z</domain:crDate>
    <domain:exDate>2005-04-03T22:00:00.0Z</domain:exDate>
    <domain:authInfo><domain:pw>2fooBAR</domain:pw></domain:authInfo>
  </domain:infData></resData>
</response></epp>"#;
        let response = codec().decode(xml, CommandKind::Info(ObjectType::Domain)).unwrap();
        let info = response.domain_info().unwrap();
        assert_eq!(info.name, "example.com");
        assert_eq!(info.nameservers, ["ns1.example.com", "ns2.example.com"]);
        assert_eq!(info.contacts[0].id, "sh8013");
        assert_eq!(info.auth_info.as_deref(), Some("2fooBAR"));
        assert!(info.has_status("ok"));
        assert!(info.expires_at.is_some());
    }

    #[test]
    fn decode_error_keeps_reason_and_skips_res_data() {
        let xml = r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><response>
  <result code="2306"><msg>Parameter value policy error</msg>
    <extValue><value><domain:period/></value><reason>Period too long</reason></extValue>
  </result>
</response></epp>"#;
        let response = codec().decode(xml, CommandKind::DomainRenew).unwrap();
        assert_eq!(response.result_code, 2306);
        assert_eq!(response.reason.as_deref(), Some("Period too long"));
        assert!(matches!(response.data, ResponseData::None));
    }

    #[test]
    fn decode_message_queue() {
        let xml = r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><response>
  <result code="1301"><msg>Command completed successfully; ack to dequeue</msg></result>
  <msgQ count="5" id="12345"><qDate>2000-06-08T22:00:00.0Z</qDate><msg>Transfer requested.</msg></msgQ>
</response></epp>"#;
        let response = codec().decode(xml, CommandKind::Poll).unwrap();
        let queue = response.message_queue.unwrap();
        assert_eq!(queue.count, 5);
        assert_eq!(queue.id.as_deref(), Some("12345"));
        assert_eq!(queue.message.as_deref(), Some("Transfer requested."));
        assert!(queue.queued_at.is_some());
    }

    #[test]
    fn decode_extension_key_values() {
        let xml = r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><response>
  <result code="1000"><msg>ok</msg></result>
  <extension><keyvalue:extension xmlns:keyvalue="urn:example:kv">
    <keyvalue:kv key="COUNT" value="1"/>
    <keyvalue:kv key="CREATEDDATE" value="2023-01-01T00:00:00Z"/>
  </keyvalue:extension></extension>
</response></epp>"#;
        let response = codec().decode(xml, CommandKind::Check(ObjectType::Domain)).unwrap();
        assert_eq!(response.extension.get("COUNT"), Some("1"));
        assert_eq!(response.extension.get("CREATEDDATE"), Some("2023-01-01T00:00:00Z"));
        assert!(response.extension.element("extension").is_some());
    }

    #[test]
    fn decode_rejects_malformed_documents() {
        let codec = codec();
        for xml in [
            "garbage",
            "<epp><response></epp>",
            r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><greeting/></epp>"#,
            r#"<epp><response><result><msg>no code</msg></result></response></epp>"#,
            r#"<other><response/></other>"#,
        ] {
            let err = codec.decode(xml, CommandKind::Poll).unwrap_err();
            assert!(matches!(err, EppError::Protocol { .. }), "{xml}: {err:?}");
        }
    }

    #[test]
    fn decode_greeting_lists() {
        let xml = r#"<epp xmlns="urn:ietf:params:xml:ns:epp-1.0"><greeting>
  <svID>Example EPP server</svID><svDate>2000-06-08T22:00:00.0Z</svDate>
  <svcMenu><version>1.0</version><lang>en</lang><lang>fr</lang>
    <objURI>urn:ietf:params:xml:ns:domain-1.0</objURI>
    <svcExtension><extURI>urn:ietf:params:xml:ns:secDNS-1.1</extURI></svcExtension>
  </svcMenu>
</greeting></epp>"#;
        let greeting = codec().decode_greeting(xml).unwrap();
        assert_eq!(greeting.server_id, "Example EPP server");
        assert_eq!(greeting.languages, ["en", "fr"]);
        assert_eq!(greeting.object_uris, ["urn:ietf:params:xml:ns:domain-1.0"]);
        assert!(greeting.supports_extension("urn:ietf:params:xml:ns:secDNS-1.1"));
    }
}
