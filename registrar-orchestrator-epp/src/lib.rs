//! # registrar-orchestrator-epp
//!
//! An EPP (RFC 5730-5734) client core for domain registrar integrations: a
//! persistent, authenticated TLS session that frames XML commands, correlates
//! responses, maps result codes into a typed error taxonomy, and lets each
//! registry plug in its own XML extensions without forking the core.
//!
//! ## Supported Registries
//!
//! | Registry | Feature Flag | Extensions |
//! |----------|-------------|------------|
//! | Generic RFC registry | *(always)* | secDNS-1.1, rgp-1.0 |
//! | [Hexonet](https://www.hexonet.net/) | `hexonet` | ISPAPI keyvalue, transfer-list query, renewal mode |
//! | [Nominet](https://www.nominet.uk/) (.uk) | `nominet` | std-release (IPS tag), nom-ext |
//! | [EURid](https://eurid.eu/) (.eu) | `eurid` | authInfo request, domain-ext, contact-ext |
//! | [SIDN](https://www.sidn.nl/) (.nl) | `sidn` | sidn-ext-epp error messages |
//!
//! ## Feature Flags
//!
//! - **`all-registries`** *(default)*: Enable every registry binding listed above.
//! - **`hexonet`**, **`nominet`**, **`eurid`**, **`sidn`**: Enable a single binding.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! registrar-orchestrator-epp = { version = "0.1", default-features = false, features = ["nominet"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use registrar_orchestrator_epp::{create_client, Command, DomainLookup, ObjectType, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Load the registry config and build a client for it
//!     let config = RegistryConfig::from_file("nominet.toml")?;
//!     let client = create_client(&config)?;
//!
//!     // 2. Connect: TLS, greeting, login
//!     let mut session = client.connect(&config).await?;
//!
//!     // 3. Run commands through the client (reconnects if the session dropped)...
//!     let response = client
//!         .execute(&mut session, Command::check(ObjectType::Domain, ["example.co.uk"]))
//!         .await?;
//!     println!("{:?}", response.check_results());
//!
//!     // ...or through the typed session operations
//!     match session.domain_info("example.co.uk").await? {
//!         DomainLookup::Found(info) => println!("expires {:?}", info.expires_at),
//!         DomainLookup::NotFound => println!("not registered"),
//!     }
//!
//!     // 4. Log out and close
//!     client.disconnect(&mut session).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T, EppError>`](EppError):
//!
//! - [`EppError::Connection`]: network/TLS failure, sub-classified by [`ConnectionFailureKind`]
//!   (IP whitelist suspected, credentials suspected, timeout, ...)
//! - [`EppError::Authentication`]: login rejected; retrying with the same credentials will not help
//! - [`EppError::Protocol`]: the registry sent a malformed document
//! - [`EppError::Validation`], [`EppError::Permission`], [`EppError::Registry`]: non-success
//!   result codes, with the code, message and redacted raw XML
//!
//! Nothing is retried automatically. A session whose connection dropped goes back
//! to [`SessionState::Disconnected`] and [`EppSession::connect`] reconnects it.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade. Frame traces
//! (one `debug` record per command/response pair) use the
//! `registrar_orchestrator_epp::trace` target; secrets are redacted before any XML
//! is logged.

pub mod codec;
mod client;
mod config;
mod error;
pub mod extension;
mod factory;
mod operations;
pub mod registries;
mod result_code;
mod session;
mod trace;
pub mod transport;
mod types;
mod utils;
pub mod xml;

// Re-export error types
pub use error::{ConnectionFailureKind, EppError, Result};
pub use result_code::{ResultCategory, describe as describe_result_code, is_success};

// Re-export the client contract and factory
pub use client::{DomainRegistryClient, EppClient};
pub use factory::{binding_for, create_client, supported_registries};

// Re-export configuration
pub use config::{ConfigError, Credentials, DEFAULT_PORT, RegistryConfig, TlsSettings};

// Re-export the session
pub use operations::AUTH_CODE_QUERY;
pub use session::{EppSession, SessionState, TransactionIdGenerator};
pub use trace::TRACE_TARGET;

// Re-export extension bindings
pub use extension::{ExtensionBinding, ExtensionBindingBuilder, ResponseParts};
pub use registries::{RegistryKind, RegistryMetadata};

// Re-export types
pub use types::{
    CONTACT_NS, CheckResult, Command, CommandBody, CommandKind, ContactCreateRequest,
    ContactInfo, ContactType, ContactUpdateRequest, DOMAIN_NS, DomainChangeSet, DomainContact,
    DomainCreateRequest, DomainCreated, DomainInfo, DomainInfoRequest, DomainLookup,
    DomainRenewRequest, DomainRenewed, DomainTransferRequest, DomainUpdateRequest, EPP_NS,
    ExtensionBlock, ExtensionData, Greeting, HOST_NS, HostCreateRequest, HostInfo, HostsFilter,
    LoginRequest, MessageQueue, ObjectCreated, ObjectType, Period, PeriodUnit, PollMessage,
    PollOp, PostalInfo, PostalInfoType, RGP_NS, ReleaseResult, Response, ResponseData,
    SEC_DNS_NS, TransferInfo, TransferListResult, TransferOp, status,
};

// Re-export utils
pub use utils::datetime;
pub use utils::log_sanitizer::{REDACTED, Redactor};
