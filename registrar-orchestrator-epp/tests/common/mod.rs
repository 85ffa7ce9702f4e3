//! Shared test utilities: an in-memory scripted registry.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use registrar_orchestrator_epp::transport::{Connector, Endpoint, EppStream, FrameTransport};
use registrar_orchestrator_epp::{
    EppClient, EppSession, RegistryConfig, RegistryKind, Result, binding_for,
};
use tokio::io::DuplexStream;

/// Assert that a `Result` is `Ok` and unwrap it (fails the test otherwise).
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Assert that a `Result` is `Err` and return the error.
#[macro_export]
macro_rules! require_err {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_err(), "expected Err(..), got {res:?}");
        let Err(err) = res else {
            return;
        };
        err
    }};
}

pub const GREETING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <greeting>
    <svID>Mock Registry EPP</svID>
    <svDate>2026-03-01T12:00:00.0Z</svDate>
    <svcMenu>
      <version>1.0</version>
      <lang>en</lang>
      <objURI>urn:ietf:params:xml:ns:domain-1.0</objURI>
      <objURI>urn:ietf:params:xml:ns:contact-1.0</objURI>
      <objURI>urn:ietf:params:xml:ns:host-1.0</objURI>
      <svcExtension>
        <extURI>urn:ietf:params:xml:ns:secDNS-1.1</extURI>
        <extURI>urn:ietf:params:xml:ns:rgp-1.0</extURI>
        <extURI>http://schema.ispapi.net/epp/xml/keyvalue-1.0</extURI>
      </svcExtension>
    </svcMenu>
  </greeting>
</epp>"#;

/// Placeholder replaced with the clTRID of the request being answered.
pub const CLTRID: &str = "{cltrid}";

/// A `<response>` with `body` (resData, extension, msgQ ...) after the result.
pub fn response_with(code: u16, msg: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<epp xmlns="urn:ietf:params:xml:ns:epp-1.0">
  <response>
    <result code="{code}"><msg>{msg}</msg></result>
    {body}
    <trID><clTRID>{CLTRID}</clTRID><svTRID>SRV-{code}</svTRID></trID>
  </response>
</epp>"#
    )
}

pub fn response(code: u16, msg: &str) -> String {
    response_with(code, msg, "")
}

pub fn ok() -> String {
    response(1000, "Command completed successfully")
}

pub fn check_data(name: &str, available: bool) -> String {
    response_with(
        1000,
        "Command completed successfully",
        &format!(
            r#"<resData><domain:chkData xmlns:domain="urn:ietf:params:xml:ns:domain-1.0"><domain:cd><domain:name avail="{}">{name}</domain:name></domain:cd></domain:chkData></resData>"#,
            u8::from(available)
        ),
    )
}

/// State shared between the mock server tasks and the test.
#[derive(Debug, Default)]
struct Script {
    login_reply: Option<String>,
    replies: VecDeque<String>,
    requests: Vec<String>,
}

/// A registry that answers over in-memory duplex streams.
///
/// Every connection gets the greeting first. `<hello/>` is answered with the
/// greeting, `<login>` with the login reply (1000 by default; an empty reply
/// drops the connection), `<logout/>` with
/// 1500 and a close. Everything else consumes the next scripted reply; once the
/// script runs out the server answers 1500 and closes.
#[derive(Clone, Default)]
pub struct MockRegistry {
    script: Arc<Mutex<Script>>,
    connects: Arc<AtomicUsize>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_login(&self, code: u16, msg: &str) -> &Self {
        self.lock().login_reply = Some(response(code, msg));
        self
    }

    /// Drop the connection instead of answering `<login>`.
    pub fn close_on_login(&self) -> &Self {
        self.lock().login_reply = Some(String::new());
        self
    }

    pub fn reply(&self, xml: impl Into<String>) -> &Self {
        self.lock().replies.push_back(xml.into());
        self
    }

    /// Number of connections opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every frame received, across all connections.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Requests other than login/logout/hello.
    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| classify(r) == RequestKind::Command)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn serve(self, stream: DuplexStream) {
        let mut transport = FrameTransport::new(stream, "mock", Duration::from_secs(5));
        if transport.send_frame(GREETING.as_bytes()).await.is_err() {
            return;
        }

        while let Ok(frame) = transport.receive_frame().await {
            let request = String::from_utf8_lossy(&frame).into_owned();
            let kind = classify(&request);
            let (reply, close) = {
                let mut script = self.lock();
                script.requests.push(request.clone());
                match kind {
                    RequestKind::Hello => (GREETING.to_string(), false),
                    RequestKind::Login => (script.login_reply.clone().unwrap_or_else(ok), false),
                    RequestKind::Logout => (response(1500, "Command completed successfully; ending session"), true),
                    RequestKind::Command => match script.replies.pop_front() {
                        Some(reply) => (reply, false),
                        None => (response(1500, "Script exhausted; ending session"), true),
                    },
                }
            };

            if reply.is_empty() {
                break;
            }
            let reply = match cltrid_of(&request) {
                Some(id) => reply.replace(CLTRID, id),
                None => reply.replace(CLTRID, ""),
            };
            let closes = close || reply.contains(r#"code="2502""#) || reply.contains(r#"code="2500""#);
            if transport.send_frame(reply.as_bytes()).await.is_err() || closes {
                break;
            }
        }
        transport.shutdown().await;
    }
}

#[async_trait]
impl Connector for MockRegistry {
    async fn connect(&self, _registry: &str, _endpoint: &Endpoint) -> Result<Box<dyn EppStream>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(self.clone().serve(server));
        Ok(Box::new(client))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Hello,
    Login,
    Logout,
    Command,
}

fn classify(request: &str) -> RequestKind {
    if request.contains("<hello") {
        RequestKind::Hello
    } else if request.contains("<login") {
        RequestKind::Login
    } else if request.contains("<logout") {
        RequestKind::Logout
    } else {
        RequestKind::Command
    }
}

fn cltrid_of(request: &str) -> Option<&str> {
    let start = request.find("<clTRID>")? + "<clTRID>".len();
    let end = request[start..].find("</clTRID>")? + start;
    Some(&request[start..end])
}

pub fn config(kind: RegistryKind) -> RegistryConfig {
    let mut config = RegistryConfig::new(kind, "epp.test.invalid", "registrar-1", "s3cret-pw");
    config.read_timeout_secs = 5;
    config
}

pub fn client(kind: RegistryKind, registry: &MockRegistry) -> EppClient {
    EppClient::with_connector(binding_for(kind), Arc::new(registry.clone()))
}

/// A disconnected session wired to `registry`.
pub fn session(kind: RegistryKind, registry: &MockRegistry) -> EppSession {
    match client(kind, registry).session(&config(kind)) {
        Ok(session) => session,
        Err(e) => panic!("test config rejected: {e}"),
    }
}
