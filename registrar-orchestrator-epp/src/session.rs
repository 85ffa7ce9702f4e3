//! EPP session state machine
//!
//! `Disconnected -> Connected` (stream open, greeting read) `-> LoggedIn` (login
//! answered 1000) `-> Disconnected` (logout, session-closing result code, or a
//! transport failure). One command is in flight at a time: every operation takes
//! `&mut self`.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::codec::Codec;
use crate::config::RegistryConfig;
use crate::error::{ConnectionFailureKind, EppError, Result};
use crate::extension::{ExtensionBinding, ResponseParts};
use crate::result_code::{RawResult, ResultContext, map_login_result, map_result};
use crate::trace::TracedTransport;
use crate::transport::{Connector, EppStream, FrameTransport};
use crate::types::{
    Command, CommandKind, ExtensionData, Greeting, LoginRequest, Response, ResponseData,
};

/// Maximum clTRID length allowed by the EPP schema.
const MAX_CLTRID_LEN: usize = 64;

/// Prefix share of a clTRID; the rest is `-<token>-<counter>`.
const MAX_PREFIX_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    /// Stream open and greeting received, not logged in.
    Connected,
    LoggedIn,
}

/// Generates `<prefix>-<8 hex session token>-<counter>` transaction IDs.
///
/// The token is random per generator, so IDs from two sessions with the same
/// prefix never collide; the counter makes IDs within one session unique.
#[derive(Debug, Clone)]
pub struct TransactionIdGenerator {
    prefix: String,
    token: String,
    counter: u64,
}

impl TransactionIdGenerator {
    pub fn new(prefix: &str) -> Self {
        let prefix: String = prefix
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .take(MAX_PREFIX_LEN)
            .collect();
        let token = uuid::Uuid::new_v4().simple().to_string();
        Self {
            prefix,
            token: token[..8].to_string(),
            counter: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        let id = format!("{}-{}-{:06}", self.prefix, self.token, self.counter);
        debug_assert!(id.len() <= MAX_CLTRID_LEN);
        id
    }
}

/// One authenticated connection to one registry endpoint.
///
/// Owned by a single caller. Dropping a logged-in session inside a tokio runtime
/// sends a best-effort `<logout>` on a background task.
pub struct EppSession {
    config: RegistryConfig,
    binding: Arc<ExtensionBinding>,
    codec: Codec,
    connector: Arc<dyn Connector>,
    transport: Option<TracedTransport<Box<dyn EppStream>>>,
    state: SessionState,
    greeting: Option<Greeting>,
    negotiated_extensions: Vec<String>,
    transaction_ids: TransactionIdGenerator,
    login_rejected: Option<EppError>,
    last_activity: Option<Instant>,
}

impl std::fmt::Debug for EppSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EppSession")
            .field("registry", &self.binding.name())
            .field("endpoint", &self.config.endpoint().address())
            .field("state", &self.state)
            .field("negotiated_extensions", &self.negotiated_extensions)
            .finish_non_exhaustive()
    }
}

impl EppSession {
    pub fn new(
        config: RegistryConfig,
        binding: Arc<ExtensionBinding>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let transaction_ids = TransactionIdGenerator::new(&config.transaction_prefix());
        Self {
            codec: Codec::new(binding.clone()),
            config,
            binding,
            connector,
            transport: None,
            state: SessionState::Disconnected,
            greeting: None,
            negotiated_extensions: Vec::new(),
            transaction_ids,
            login_rejected: None,
            last_activity: None,
        }
    }

    /// Registry tag of the binding.
    pub fn registry(&self) -> &str {
        self.binding.name()
    }

    pub fn binding(&self) -> &ExtensionBinding {
        &self.binding
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::LoggedIn
    }

    /// Greeting from the current (or last) connection.
    pub fn greeting(&self) -> Option<&Greeting> {
        self.greeting.as_ref()
    }

    /// Service extensions requested at the last successful login.
    pub fn negotiated_extensions(&self) -> &[String] {
        &self.negotiated_extensions
    }

    // ============ Lifecycle ============

    /// Make sure the session is connected and logged in.
    ///
    /// Idempotent: a logged-in session returns immediately without touching the
    /// network (unless the configured liveness probe is due), so callers can call
    /// this before every batch of commands. A rejected login is remembered and
    /// returned again without reconnecting.
    pub async fn connect(&mut self) -> Result<()> {
        if let Some(rejected) = &self.login_rejected {
            return Err(rejected.clone());
        }

        if self.state == SessionState::LoggedIn {
            if !self.liveness_probe_due() {
                return Ok(());
            }
            match self.hello().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!("[{}] Liveness probe failed, reconnecting: {e}", self.registry());
                    self.close().await;
                }
            }
        }

        if self.state == SessionState::Disconnected {
            self.open().await?;
        }
        self.login().await
    }

    fn liveness_probe_due(&self) -> bool {
        match (self.config.liveness_probe_after(), self.last_activity) {
            (Some(after), Some(last)) => last.elapsed() >= after,
            _ => false,
        }
    }

    async fn open(&mut self) -> Result<()> {
        let registry = self.registry().to_string();
        let endpoint = self.config.endpoint();
        let stream = self.connector.connect(&registry, &endpoint).await?;

        let framed = FrameTransport::new(stream, registry.as_str(), self.config.read_timeout());
        let mut transport = TracedTransport::new(framed, self.binding.clone(), self.config.debug);
        let xml = transport.receive_greeting().await?;
        let greeting = self.codec.decode_greeting(&xml)?;

        info!(
            "[{registry}] Connected to {} (server: {})",
            endpoint.address(),
            greeting.server_id
        );
        self.transport = Some(transport);
        self.greeting = Some(greeting);
        self.state = SessionState::Connected;
        self.touch();
        Ok(())
    }

    async fn login(&mut self) -> Result<()> {
        let greeting = self.greeting.clone().unwrap_or_default();
        let object_uris = if greeting.object_uris.is_empty() {
            self.binding.object_uris().to_vec()
        } else {
            greeting.object_uris.clone()
        };
        let extension_uris = self.binding.negotiate(&greeting.extension_uris);

        let command = Command::login(LoginRequest {
            client_id: self.config.credentials.username.clone(),
            password: self.config.credentials.password.clone(),
            new_password: self.config.credentials.new_password.clone(),
            version: self.config.version.clone(),
            language: self.config.language.clone(),
            object_uris,
            extension_uris: extension_uris.clone(),
        });

        let response = match self.round_trip(&command).await {
            Ok(response) => response,
            Err(EppError::Connection {
                kind: ConnectionFailureKind::Closed,
                detail,
                ..
            }) => {
                return Err(EppError::connection(
                    self.registry(),
                    ConnectionFailureKind::CredentialSuspect,
                    detail,
                ));
            }
            Err(e) => return Err(e),
        };

        let raw = self.raw_result(&response);
        let context = self.context(&command, &response);
        if let Err(e) = map_login_result(self.registry(), &raw, &context) {
            self.login_rejected = Some(e.clone());
            self.close().await;
            return Err(e);
        }

        if let Some(new_password) = self.config.credentials.new_password.take() {
            info!("[{}] Password changed at login", self.registry());
            self.config.credentials.password = new_password;
        }
        info!(
            "[{}] Logged in as {} ({} extensions)",
            self.registry(),
            self.config.credentials.username,
            extension_uris.len()
        );
        self.negotiated_extensions = extension_uris;
        self.state = SessionState::LoggedIn;
        Ok(())
    }

    /// Send `<logout>` (best-effort) and close the stream regardless of the outcome.
    pub async fn logout(&mut self) {
        if self.state == SessionState::LoggedIn
            && let Err(e) = self.send_logout().await
        {
            warn!("[{}] Logout failed: {e}", self.registry());
        }
        self.close().await;
    }

    /// Idempotent teardown; never fails.
    pub async fn disconnect(&mut self) {
        self.logout().await;
    }

    async fn send_logout(&mut self) -> Result<Response> {
        let command = Command::logout();
        let response = self.round_trip(&command).await?;
        self.check_result(&command, &response)?;
        Ok(response)
    }

    async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await;
            info!("[{}] Disconnected", self.registry());
        }
        self.state = SessionState::Disconnected;
    }

    /// Forget the stream without a logout; used when it is known to be unusable.
    fn mark_disconnected(&mut self) {
        if self.transport.take().is_some() {
            warn!("[{}] Session dropped to disconnected", self.registry());
        }
        self.state = SessionState::Disconnected;
    }

    fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    // ============ Commands ============

    /// Send `<hello/>` and return the fresh greeting. Allowed before login.
    pub async fn hello(&mut self) -> Result<Greeting> {
        let (greeting, _) = self.hello_exchange().await?;
        Ok(greeting)
    }

    async fn hello_exchange(&mut self) -> Result<(Greeting, String)> {
        let xml = self.codec.encode(&Command::hello(), None)?;
        let reply = self.exchange(CommandKind::Hello, None, &xml).await?;
        let greeting = self.codec.decode_greeting(&reply)?;
        self.greeting = Some(greeting.clone());
        Ok((greeting, reply))
    }

    /// Send one command and return its response.
    ///
    /// Non-success result codes come back as errors (see
    /// [`map_result`](crate::result_code)); a session-closing code or a transport
    /// failure also drops the session to [`SessionState::Disconnected`], so the
    /// next [`connect`](Self::connect) reconnects.
    pub async fn execute(&mut self, command: Command) -> Result<Response> {
        match command.kind() {
            CommandKind::Hello => {
                let (greeting, raw_xml) = self.hello_exchange().await?;
                return Ok(Response {
                    result_code: 1000,
                    message: String::new(),
                    reason: None,
                    message_queue: None,
                    client_transaction_id: None,
                    server_transaction_id: None,
                    data: ResponseData::Greeting(greeting),
                    extension: ExtensionData::default(),
                    raw_xml,
                });
            }
            CommandKind::Login => {
                return Err(EppError::protocol(
                    self.registry(),
                    "login is sent by connect(); do not execute it directly",
                    None,
                ));
            }
            CommandKind::Logout => {
                let result = if self.state == SessionState::LoggedIn {
                    self.send_logout().await
                } else {
                    Err(self.not_logged_in(&command))
                };
                self.close().await;
                return result;
            }
            _ => {}
        }

        if command.kind().requires_login() && self.state != SessionState::LoggedIn {
            return Err(self.not_logged_in(&command));
        }

        let response = self.round_trip(&command).await?;
        self.check_result(&command, &response)?;
        Ok(response)
    }

    fn not_logged_in(&self, command: &Command) -> EppError {
        EppError::connection(
            self.registry(),
            ConnectionFailureKind::NotConnected,
            format!(
                "cannot send {}: session is {:?}; call connect() first",
                command.kind(),
                self.state
            ),
        )
    }

    /// Encode, exchange and decode, without interpreting the result code.
    async fn round_trip(&mut self, command: &Command) -> Result<Response> {
        let kind = command.kind();
        let cltrid = self.transaction_ids.next_id();
        let xml = self.codec.encode(command, Some(&cltrid))?;
        let reply = self.exchange(kind, Some(&cltrid), &xml).await?;
        let response = self.codec.decode(&reply, kind)?;

        if let Some(echoed) = response.client_transaction_id.as_deref()
            && echoed != cltrid
        {
            warn!(
                "[{}] {kind} response carries clTRID {echoed}, expected {cltrid}",
                self.registry()
            );
        }
        Ok(response)
    }

    async fn exchange(
        &mut self,
        kind: CommandKind,
        cltrid: Option<&str>,
        xml: &str,
    ) -> Result<String> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(EppError::connection(
                self.binding.name(),
                ConnectionFailureKind::NotConnected,
                format!("cannot send {kind}: session is not connected"),
            ));
        };

        match transport.exchange(kind, cltrid, xml).await {
            Ok(reply) => {
                self.touch();
                Ok(reply)
            }
            Err(e) => {
                if e.is_connection() {
                    self.mark_disconnected();
                }
                Err(e)
            }
        }
    }

    fn raw_result(&self, response: &Response) -> RawResult {
        let detail = if response.is_success() {
            None
        } else {
            self.binding.result_detail(&ResponseParts {
                result_code: response.result_code,
                message: &response.message,
                res_data: None,
                extension: &response.extension,
            })
        };
        RawResult {
            code: response.result_code,
            message: response.message.clone(),
            reason: response.reason.clone(),
            detail,
        }
    }

    fn context(&self, command: &Command, response: &Response) -> ResultContext {
        let action = match command.object_name() {
            Some(name) => format!("{} {name}", command.kind()),
            None => command.kind().to_string(),
        };
        ResultContext {
            action,
            raw_response: Some(self.binding.redact(&response.raw_xml)),
        }
    }

    fn check_result(&mut self, command: &Command, response: &Response) -> Result<()> {
        if response.category().closes_session() {
            debug!(
                "[{}] Result {} ends the session",
                self.registry(),
                response.result_code
            );
            self.mark_disconnected();
        }
        let raw = self.raw_result(response);
        let context = self.context(command, response);
        map_result(self.registry(), &raw, &context)
    }
}

impl Drop for EppSession {
    fn drop(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        if self.state != SessionState::LoggedIn {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(
                "[{}] Dropped outside a runtime; closing without logout",
                self.registry()
            );
            return;
        };

        let cltrid = self.transaction_ids.next_id();
        let xml = match self.codec.encode(&Command::logout(), Some(&cltrid)) {
            Ok(xml) => xml,
            Err(e) => {
                debug!("[{}] Cannot encode logout on drop: {e}", self.registry());
                return;
            }
        };
        let registry = self.registry().to_string();
        handle.spawn(async move {
            if let Err(e) = transport
                .exchange(CommandKind::Logout, Some(&cltrid), &xml)
                .await
            {
                debug!("[{registry}] Logout on drop failed: {e}");
            }
            transport.shutdown().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_unique_and_bounded() {
        let mut ids = TransactionIdGenerator::new("nominet");
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert!(first.starts_with("nominet-"));
        assert!(first.ends_with("-000001"));
        assert!(second.ends_with("-000002"));

        let token = first.split('-').nth(1).unwrap();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn long_prefix_is_truncated() {
        let mut ids = TransactionIdGenerator::new(&"x".repeat(100));
        let id = ids.next_id();
        assert!(id.len() <= MAX_CLTRID_LEN);
        assert!(id.starts_with(&"x".repeat(MAX_PREFIX_LEN)));
    }

    #[test]
    fn whitespace_in_prefix_replaced() {
        let mut ids = TransactionIdGenerator::new("my reg");
        assert!(ids.next_id().starts_with("my-reg-"));
    }

    #[test]
    fn separate_generators_differ() {
        let a = TransactionIdGenerator::new("p").next_id();
        let b = TransactionIdGenerator::new("p").next_id();
        assert_ne!(a, b);
    }
}
