//! EURid (.eu) binding
//!
//! EURid only hands out a transfer code when the domain info carries an
//! `authInfo:request` extension; the code then comes back in the usual
//! `<domain:authInfo><domain:pw>`.

use crate::codec::extension_slot;
use crate::extension::ExtensionBinding;
use crate::operations::AUTH_CODE_QUERY;
use crate::types::{Command, SEC_DNS_NS};
use crate::xml::{XmlElement, XmlError};

pub const NAME: &str = "eurid";

pub const AUTH_INFO_NS: &str = "http://www.eurid.eu/xml/epp/authInfo-1.1";
pub const DOMAIN_EXT_NS: &str = "http://www.eurid.eu/xml/epp/domain-ext-2.4";
pub const CONTACT_EXT_NS: &str = "http://www.eurid.eu/xml/epp/contact-ext-1.3";

pub fn binding() -> ExtensionBinding {
    ExtensionBinding::builder(NAME)
        .register_extension("authInfo", AUTH_INFO_NS)
        .register_extension("domain-ext", DOMAIN_EXT_NS)
        .register_extension("contact-ext", CONTACT_EXT_NS)
        .register_extension("secDNS", SEC_DNS_NS)
        .register_encode_hook(Some(AUTH_CODE_QUERY), request_auth_code)
        .build()
}

fn request_auth_code(_: &Command, command: &mut XmlElement) -> Result<(), XmlError> {
    extension_slot(command)?.push(
        XmlElement::new("authInfo:info")
            .with_attr("xmlns:authInfo", AUTH_INFO_NS)
            .with_child(XmlElement::new("authInfo:request")),
    );
    Ok(())
}
