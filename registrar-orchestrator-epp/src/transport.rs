//! EPP frame transport (RFC 5734).
//!
//! Every EPP data unit is a 4-byte big-endian length (which counts the header
//! itself) followed by the XML document. [`FrameTransport`] implements that framing
//! over any async byte stream; [`TlsConnector`] opens the TCP + TLS stream to a
//! registry. No retries happen at this layer.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::TlsSettings;
use crate::error::{ConnectionFailureKind, EppError, Result};

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest frame accepted from a registry (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A bidirectional byte stream a session can run over.
pub trait EppStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> EppStream for T {}

/// Length-prefixed framing over a byte stream.
pub struct FrameTransport<S> {
    stream: S,
    registry: String,
    read_timeout: Duration,
}

impl<S> std::fmt::Debug for FrameTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTransport")
            .field("registry", &self.registry)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> FrameTransport<S> {
    pub fn new(stream: S, registry: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            stream,
            registry: registry.into(),
            read_timeout,
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Write one frame: length prefix, then `payload`.
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let total = payload.len() + FRAME_HEADER_LEN;
        let header = u32::try_from(total)
            .ok()
            .filter(|_| total <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                EppError::protocol(
                    &self.registry,
                    format!("outgoing frame of {total} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
                    None,
                )
            })?;

        let mut frame = Vec::with_capacity(total);
        frame.extend_from_slice(&header.to_be_bytes());
        frame.extend_from_slice(payload);

        trace!("[{}] Sending frame of {total} bytes", self.registry);
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| self.io_error("write", &e))?;
        self.stream
            .flush()
            .await
            .map_err(|e| self.io_error("write", &e))
    }

    /// Read one frame and return its payload, bounded by the read timeout.
    pub async fn receive_frame(&mut self) -> Result<Vec<u8>> {
        let read_timeout = self.read_timeout;
        match timeout(read_timeout, self.read_frame()).await {
            Ok(result) => result,
            Err(_) => Err(EppError::connection(
                &self.registry,
                ConnectionFailureKind::Timeout,
                format!("no response within {}s", read_timeout.as_secs()),
            )),
        }
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.stream
            .read_exact(&mut header)
            .await
            .map_err(|e| self.io_error("read", &e))?;

        let total = u32::from_be_bytes(header) as usize;
        if total < FRAME_HEADER_LEN {
            return Err(EppError::protocol(
                &self.registry,
                format!("frame length {total} is smaller than the {FRAME_HEADER_LEN} byte header"),
                None,
            ));
        }
        if total > MAX_FRAME_LEN {
            return Err(EppError::protocol(
                &self.registry,
                format!("frame length {total} exceeds the {MAX_FRAME_LEN} byte limit"),
                None,
            ));
        }

        let mut payload = vec![0u8; total - FRAME_HEADER_LEN];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| self.io_error("read", &e))?;
        trace!("[{}] Received frame of {total} bytes", self.registry);
        Ok(payload)
    }

    /// Close the write side; errors are ignored.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("[{}] Shutdown error ignored: {e}", self.registry);
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn io_error(&self, operation: &str, error: &io::Error) -> EppError {
        let kind = match error.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ConnectionFailureKind::Closed,
            io::ErrorKind::TimedOut => ConnectionFailureKind::Timeout,
            _ => ConnectionFailureKind::Generic,
        };
        let detail = if kind == ConnectionFailureKind::Closed {
            format!("connection closed by registry during {operation} ({error})")
        } else {
            format!("{operation} failed: {error}")
        };
        EppError::connection(&self.registry, kind, detail)
    }
}

// ============ Connecting ============

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Applies to TCP connect and the TLS handshake separately.
    pub connect_timeout: Duration,
}

impl Endpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens the byte stream a session runs over.
///
/// The production implementation is [`TlsConnector`]; tests plug in in-memory streams.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, registry: &str, endpoint: &Endpoint) -> Result<Box<dyn EppStream>>;
}

/// Stage of the connect sequence an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStage {
    Tcp,
    Tls,
}

/// Classify a connect failure.
///
/// Registries that have not whitelisted the client IP typically accept the TCP
/// connection and then reset or abort the TLS handshake, so a peer-side abort
/// or an SSL/TLS-flavoured error during the handshake is reported as
/// [`ConnectionFailureKind::IpWhitelist`]. Certificate verification failures stay generic.
pub fn classify_connect_error(stage: ConnectStage, error: &io::Error) -> ConnectionFailureKind {
    match (stage, error.kind()) {
        (_, io::ErrorKind::TimedOut) => ConnectionFailureKind::Timeout,
        (ConnectStage::Tcp, io::ErrorKind::ConnectionRefused) => ConnectionFailureKind::Refused,
        (ConnectStage::Tcp, _) => ConnectionFailureKind::Generic,
        (
            ConnectStage::Tls,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe,
        ) => ConnectionFailureKind::IpWhitelist,
        (ConnectStage::Tls, _) => {
            let text = error.to_string().to_ascii_lowercase();
            if text.contains("certificate") {
                ConnectionFailureKind::Generic
            } else if ["ssl", "tls", "handshake", "alert"]
                .iter()
                .any(|needle| text.contains(needle))
            {
                ConnectionFailureKind::IpWhitelist
            } else {
                ConnectionFailureKind::Generic
            }
        }
    }
}

/// Build the `Connection` error for a failed connect attempt.
pub fn connect_failure(
    registry: &str,
    stage: ConnectStage,
    address: &str,
    error: &io::Error,
) -> EppError {
    let kind = classify_connect_error(stage, error);
    let detail = match (stage, kind) {
        (ConnectStage::Tls, ConnectionFailureKind::IpWhitelist) => {
            format!("TLS handshake with {address} failed ({error})")
        }
        (ConnectStage::Tls, _) => format!("TLS error talking to {address}: {error}"),
        (ConnectStage::Tcp, _) => format!("could not connect to {address}: {error}"),
    };
    EppError::connection(registry, kind, detail)
}

/// Initialize the rustls `CryptoProvider` (once).
///
/// `install_default` returns `Err` when a provider is already installed, which is fine.
fn ensure_crypto_provider() {
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
}

/// TCP + TLS connector with optional client certificate (mutual TLS) and extra CA.
#[derive(Clone)]
pub struct TlsConnector {
    connector: tokio_rustls::TlsConnector,
    server_name: Option<String>,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl TlsConnector {
    /// Build the rustls client configuration from the TLS settings.
    pub fn from_settings(registry: &str, settings: &TlsSettings) -> Result<Self> {
        ensure_crypto_provider();

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        if let Some(ca) = &settings.ca_certificate {
            for cert in load_certificates(registry, ca)? {
                roots.add(cert).map_err(|e| {
                    EppError::config(registry, format!("invalid CA certificate {}: {e}", ca.display()))
                })?;
            }
        }

        let builder = ClientConfig::builder().with_root_certificates(roots);
        let config = match (&settings.client_certificate, &settings.client_key) {
            (Some(cert_path), key_path) => {
                let certs = load_certificates(registry, cert_path)?;
                // The key may live in the certificate file.
                let key_path = key_path.as_deref().unwrap_or(cert_path);
                let key = PrivateKeyDer::from_pem_file(key_path).map_err(|e| {
                    EppError::config(
                        registry,
                        format!("cannot read private key {}: {e}", key_path.display()),
                    )
                })?;
                builder.with_client_auth_cert(certs, key).map_err(|e| {
                    EppError::config(registry, format!("client certificate rejected: {e}"))
                })?
            }
            (None, Some(_)) => {
                return Err(EppError::config(
                    registry,
                    "client_key is set but client_certificate is not",
                ));
            }
            (None, None) => builder.with_no_client_auth(),
        };

        Ok(Self {
            connector: tokio_rustls::TlsConnector::from(Arc::new(config)),
            server_name: settings.server_name.clone(),
        })
    }
}

fn load_certificates(registry: &str, path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let read_error = |e: rustls_pki_types::pem::Error| {
        EppError::config(
            registry,
            format!("cannot read certificate {}: {e}", path.display()),
        )
    };
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(read_error)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(read_error)?;
    if certs.is_empty() {
        return Err(EppError::config(
            registry,
            format!("no certificates found in {}", path.display()),
        ));
    }
    Ok(certs)
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self, registry: &str, endpoint: &Endpoint) -> Result<Box<dyn EppStream>> {
        let address = endpoint.address();
        let start = std::time::Instant::now();
        debug!("[{registry}] Connecting to {address}");

        let tcp = match timeout(endpoint.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("[{registry}] TCP connection to {address} failed: {e}");
                return Err(connect_failure(registry, ConnectStage::Tcp, &address, &e));
            }
            Err(_) => {
                return Err(EppError::connection(
                    registry,
                    ConnectionFailureKind::Timeout,
                    format!(
                        "TCP connect to {address} timed out after {}s",
                        endpoint.connect_timeout.as_secs()
                    ),
                ));
            }
        };
        if let Err(e) = tcp.set_nodelay(true) {
            trace!("[{registry}] set_nodelay failed: {e}");
        }
        trace!("[{registry}] TCP connected in {:?}", start.elapsed());

        let name = self.server_name.as_deref().unwrap_or(&endpoint.host);
        let server_name = ServerName::try_from(name.to_string()).map_err(|e| {
            EppError::config(registry, format!("invalid TLS server name '{name}': {e}"))
        })?;

        let tls = match timeout(
            endpoint.connect_timeout,
            self.connector.connect(server_name, tcp),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("[{registry}] TLS handshake with {address} failed: {e}");
                return Err(connect_failure(registry, ConnectStage::Tls, &address, &e));
            }
            Err(_) => {
                return Err(EppError::connection(
                    registry,
                    ConnectionFailureKind::Timeout,
                    format!(
                        "TLS handshake with {address} timed out after {}s",
                        endpoint.connect_timeout.as_secs()
                    ),
                ));
            }
        };

        debug!("[{registry}] TLS established with {address} in {:?}", start.elapsed());
        Ok(Box::new(tls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (
        FrameTransport<tokio::io::DuplexStream>,
        tokio::io::DuplexStream,
    ) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        (
            FrameTransport::new(client, "test", Duration::from_secs(2)),
            server,
        )
    }

    #[tokio::test]
    async fn frame_round_trip_through_echo() {
        let (client, mut server) = pair();
        let mut client = client;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            loop {
                let n = server.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                server.write_all(&buf[..n]).await.unwrap();
            }
        });

        let document = "<?xml version=\"1.0\"?><epp><hello/></epp>\u{00e9}";
        client.send_frame(document.as_bytes()).await.unwrap();
        let echoed = client.receive_frame().await.unwrap();
        assert_eq!(echoed, document.as_bytes());
    }

    #[tokio::test]
    async fn header_counts_itself() {
        let (mut client, mut server) = pair();
        client.send_frame(b"<epp/>").await.unwrap();
        let mut header = [0u8; 4];
        server.read_exact(&mut header).await.unwrap();
        assert_eq!(u32::from_be_bytes(header), 10);
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut frame = u32::try_from(payload.len() + FRAME_HEADER_LEN)
            .unwrap()
            .to_be_bytes()
            .to_vec();
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn scripted_stream_sees_exact_bytes() {
        let request = b"<epp><hello/></epp>";
        let reply = b"<epp><greeting/></epp>";
        let stream = tokio_test::io::Builder::new()
            .write(&framed(request))
            .read(&framed(reply))
            .build();
        let mut transport = FrameTransport::new(stream, "test", Duration::from_secs(1));

        transport.send_frame(request).await.unwrap();
        assert_eq!(transport.receive_frame().await.unwrap(), reply);
    }

    #[tokio::test]
    async fn short_read_is_connection_closed() {
        let (mut client, mut server) = pair();
        server.write_all(&100u32.to_be_bytes()).await.unwrap();
        server.write_all(b"<epp>").await.unwrap();
        drop(server);

        let err = client.receive_frame().await.unwrap_err();
        assert!(matches!(
            err,
            EppError::Connection {
                kind: ConnectionFailureKind::Closed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn undersized_and_oversized_lengths_are_protocol_errors() {
        let (mut client, mut server) = pair();
        server.write_all(&2u32.to_be_bytes()).await.unwrap();
        let err = client.receive_frame().await.unwrap_err();
        assert!(matches!(err, EppError::Protocol { .. }));

        let (mut client, mut server) = pair();
        let too_big = u32::try_from(MAX_FRAME_LEN + 1).unwrap();
        server.write_all(&too_big.to_be_bytes()).await.unwrap();
        let err = client.receive_frame().await.unwrap_err();
        assert!(matches!(err, EppError::Protocol { .. }));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut client = FrameTransport::new(client, "test", Duration::from_millis(50));
        let err = client.receive_frame().await.unwrap_err();
        assert!(matches!(
            err,
            EppError::Connection {
                kind: ConnectionFailureKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn tls_reset_suggests_whitelisting() {
        let error = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer");
        let err = connect_failure("nominet", ConnectStage::Tls, "epp.example:700", &error);
        assert!(matches!(
            err,
            EppError::Connection {
                kind: ConnectionFailureKind::IpWhitelist,
                ..
            }
        ));
        assert!(err.to_string().contains("whitelist"));
    }

    #[test]
    fn ssl_message_suggests_whitelisting() {
        let error = io::Error::other("SSL routines: handshake failure");
        assert_eq!(
            classify_connect_error(ConnectStage::Tls, &error),
            ConnectionFailureKind::IpWhitelist
        );
    }

    #[test]
    fn certificate_and_tcp_errors_stay_generic() {
        let cert = io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid peer certificate: UnknownIssuer",
        );
        assert_eq!(
            classify_connect_error(ConnectStage::Tls, &cert),
            ConnectionFailureKind::Generic
        );

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = connect_failure("generic", ConnectStage::Tcp, "epp.example:700", &refused);
        assert!(matches!(
            err,
            EppError::Connection {
                kind: ConnectionFailureKind::Refused,
                ..
            }
        ));
        assert!(!err.to_string().contains("whitelist"));
    }

    #[test]
    fn client_key_without_certificate_is_rejected() {
        let settings = TlsSettings {
            client_key: Some("/nonexistent/key.pem".into()),
            ..TlsSettings::default()
        };
        let err = TlsConnector::from_settings("test", &settings).unwrap_err();
        assert!(matches!(err, EppError::Config { .. }));
    }

    #[test]
    fn default_settings_build() {
        assert!(TlsConnector::from_settings("test", &TlsSettings::default()).is_ok());
    }
}
