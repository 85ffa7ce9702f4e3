//! SIDN (.nl) binding
//!
//! SIDN explains failures in `<sidn-ext-epp:ext><sidn-ext-epp:response>` with
//! one `<sidn-ext-epp:msg code=".." field="..">` per problem; those are folded
//! into the error message.

use crate::extension::{ExtensionBinding, ResponseParts};
use crate::types::SEC_DNS_NS;

pub const NAME: &str = "sidn";

pub const SIDN_EXT_NS: &str = "http://rxsd.domain-registry.nl/sidn-ext-epp-1.0";

pub fn binding() -> ExtensionBinding {
    ExtensionBinding::builder(NAME)
        .register_extension("sidn-ext-epp", SIDN_EXT_NS)
        .register_extension("secDNS", SEC_DNS_NS)
        .register_result_detail(message_detail)
        .build()
}

fn message_detail(parts: &ResponseParts<'_>) -> Option<String> {
    let messages: Vec<String> = parts
        .extension
        .elements
        .iter()
        .flat_map(|element| element.descendants())
        .filter(|e| e.local_name() == "msg")
        .map(|msg| {
            let text = msg.text();
            let mut line = match msg.attr("code") {
                Some(code) => format!("{code}: {text}"),
                None => text,
            };
            if let Some(field) = msg.attr("field") {
                line.push_str(&format!(" (field: {field})"));
            }
            line
        })
        .collect();
    (!messages.is_empty()).then(|| messages.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtensionData;
    use crate::xml::XmlElement;

    fn parts(extension: &ExtensionData) -> ResponseParts<'_> {
        ResponseParts {
            result_code: 2004,
            message: "Parameter value range error",
            res_data: None,
            extension,
        }
    }

    #[test]
    fn messages_joined() {
        let ext = XmlElement::parse(
            r#"<sidn-ext-epp:ext xmlns:sidn-ext-epp="http://rxsd.domain-registry.nl/sidn-ext-epp-1.0">
  <sidn-ext-epp:response>
    <sidn-ext-epp:msg field="Registrant" code="T0002">Contact not found</sidn-ext-epp:msg>
    <sidn-ext-epp:msg code="C0010">Invalid postal code</sidn-ext-epp:msg>
  </sidn-ext-epp:response>
</sidn-ext-epp:ext>"#,
        )
        .unwrap();
        let extension = ExtensionData {
            values: Vec::new(),
            elements: vec![ext],
        };
        assert_eq!(
            message_detail(&parts(&extension)).as_deref(),
            Some("T0002: Contact not found (field: Registrant); C0010: Invalid postal code")
        );
    }

    #[test]
    fn no_messages_no_detail() {
        assert!(message_detail(&parts(&ExtensionData::default())).is_none());
    }
}
