//! Secret-redacting trace adapter around [`FrameTransport`].
//!
//! Emits exactly one `debug` record per command/response pair on the
//! `registrar_orchestrator_epp::trace` target. The XML itself is only logged in
//! verbose (config `debug`) mode, and always after the binding's redaction rules ran.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{EppError, Result};
use crate::extension::ExtensionBinding;
use crate::transport::FrameTransport;
use crate::types::CommandKind;
use crate::xml::XmlElement;

/// Log target for frame traces.
pub const TRACE_TARGET: &str = "registrar_orchestrator_epp::trace";

pub struct TracedTransport<S> {
    inner: FrameTransport<S>,
    binding: Arc<ExtensionBinding>,
    verbose: bool,
}

impl<S> std::fmt::Debug for TracedTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedTransport")
            .field("registry", &self.binding.name())
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send> TracedTransport<S> {
    pub fn new(inner: FrameTransport<S>, binding: Arc<ExtensionBinding>, verbose: bool) -> Self {
        Self {
            inner,
            binding,
            verbose,
        }
    }

    fn registry(&self) -> &str {
        self.binding.name()
    }

    /// Read the greeting the server sends unprompted after the TLS handshake.
    pub async fn receive_greeting(&mut self) -> Result<String> {
        let started = Instant::now();
        let frame = self.inner.receive_frame().await?;
        let xml = self.utf8(frame)?;
        if self.verbose {
            log::debug!(
                target: TRACE_TARGET,
                "[{}] greeting ({} bytes, {:?})\n<<< {}",
                self.registry(),
                xml.len(),
                started.elapsed(),
                self.binding.redact(&xml)
            );
        } else {
            log::debug!(
                target: TRACE_TARGET,
                "[{}] greeting ({} bytes, {:?})",
                self.registry(),
                xml.len(),
                started.elapsed()
            );
        }
        Ok(xml)
    }

    /// Send one document and wait for the reply.
    pub async fn exchange(
        &mut self,
        kind: CommandKind,
        cltrid: Option<&str>,
        request: &str,
    ) -> Result<String> {
        let started = Instant::now();
        let outcome = self.round_trip(request).await;
        let elapsed = started.elapsed();
        let cltrid = cltrid.unwrap_or("-");

        match &outcome {
            Ok(response) => {
                let code = result_code_of(response);
                if self.verbose {
                    log::debug!(
                        target: TRACE_TARGET,
                        "[{}] {kind} {cltrid} -> {code} ({elapsed:?})\n>>> {}\n<<< {}",
                        self.registry(),
                        self.binding.redact(request),
                        self.binding.redact(response)
                    );
                } else {
                    log::debug!(
                        target: TRACE_TARGET,
                        "[{}] {kind} {cltrid} -> {code} ({elapsed:?}, {} bytes out, {} bytes in)",
                        self.registry(),
                        request.len(),
                        response.len()
                    );
                }
            }
            Err(e) => {
                if self.verbose {
                    log::debug!(
                        target: TRACE_TARGET,
                        "[{}] {kind} {cltrid} -> failed ({elapsed:?}): {e}\n>>> {}",
                        self.registry(),
                        self.binding.redact(request)
                    );
                } else {
                    log::debug!(
                        target: TRACE_TARGET,
                        "[{}] {kind} {cltrid} -> failed ({elapsed:?}): {e}",
                        self.registry()
                    );
                }
            }
        }
        outcome
    }

    async fn round_trip(&mut self, request: &str) -> Result<String> {
        self.inner.send_frame(request.as_bytes()).await?;
        let frame = self.inner.receive_frame().await?;
        self.utf8(frame)
    }

    fn utf8(&self, frame: Vec<u8>) -> Result<String> {
        String::from_utf8(frame).map_err(|e| {
            EppError::protocol(
                self.registry(),
                format!("response is not valid UTF-8: {e}"),
                None,
            )
        })
    }

    pub async fn shutdown(&mut self) {
        self.inner.shutdown().await;
    }
}

/// Best-effort result code for the trace line; `?` when the document does not parse.
fn result_code_of(xml: &str) -> String {
    XmlElement::parse(xml)
        .ok()
        .and_then(|root| {
            root.find_path(&["response", "result"])
                .and_then(|r| r.attr("code").map(ToString::to_string))
                .or_else(|| root.child("greeting").map(|_| "greeting".to_string()))
        })
        .unwrap_or_else(|| "?".to_string())
}
