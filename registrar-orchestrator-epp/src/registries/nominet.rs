//! Nominet (.uk) binding
//!
//! Adds the nom-ext contact/domain extensions, the warning extension and
//! the `std-release` command used to move a domain to another registrar's IPS
//! tag. A release either completes (1000) or waits for the receiving registrar
//! to accept it (1001, "handshake").

use crate::error::Result;
use crate::extension::ExtensionBinding;
use crate::session::EppSession;
use crate::types::{Command, CommandKind, ReleaseResult, SEC_DNS_NS};
use crate::xml::XmlElement;

pub const NAME: &str = "nominet";

pub const RELEASE_NS: &str = "http://www.nominet.org.uk/epp/xml/std-release-1.0";
pub const DOMAIN_NOM_EXT_NS: &str = "http://www.nominet.org.uk/epp/xml/domain-nom-ext-1.2";
pub const CONTACT_NOM_EXT_NS: &str = "http://www.nominet.org.uk/epp/xml/contact-nom-ext-1.0";
pub const WARNING_NS: &str = "http://www.nominet.org.uk/epp/xml/std-warning-1.1";

/// `<r:release>` inside `<update>`.
pub const RELEASE: CommandKind = CommandKind::Custom("nominet:release");

/// "Command completed successfully; action pending"
const PENDING: u16 = 1001;

pub fn binding() -> ExtensionBinding {
    ExtensionBinding::builder(NAME)
        .register_extension("domain-ext", DOMAIN_NOM_EXT_NS)
        .register_extension("contact-ext", CONTACT_NOM_EXT_NS)
        .register_extension("warning", WARNING_NS)
        .register_extension("secDNS", SEC_DNS_NS)
        .register_service_extension(RELEASE_NS)
        .build()
}

/// Release `domain` to the registrar with IPS tag `registrar_tag`.
///
/// Tags are upper-cased; Nominet compares them case-sensitively.
pub fn release_command(domain: &str, registrar_tag: &str) -> Command {
    let release = XmlElement::new("r:release")
        .with_attr("xmlns:r", RELEASE_NS)
        .with_child(XmlElement::new("r:domainName").with_text(domain))
        .with_child(
            XmlElement::new("r:registrarTag").with_text(normalize_tag(registrar_tag)),
        );
    Command::raw("nominet:release", XmlElement::new("update").with_child(release))
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_ascii_uppercase()
}

/// Run [`release_command`] on a logged-in session.
pub async fn release(
    session: &mut EppSession,
    domain: &str,
    registrar_tag: &str,
) -> Result<ReleaseResult> {
    let response = session.execute(release_command(domain, registrar_tag)).await?;
    Ok(ReleaseResult {
        name: domain.to_string(),
        registrar_tag: normalize_tag(registrar_tag),
        pending: response.result_code == PENDING,
    })
}
