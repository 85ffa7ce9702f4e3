//! Plain RFC 5730-5733 registry.

use crate::extension::ExtensionBinding;
use crate::types::{RGP_NS, SEC_DNS_NS};

pub const NAME: &str = "generic";

pub fn binding() -> ExtensionBinding {
    ExtensionBinding::builder(NAME)
        .register_extension("secDNS", SEC_DNS_NS)
        .register_extension("rgp", RGP_NS)
        .build()
}
