//! MCP transport layer.
//!
//! The HTTP+SSE transport keeps one `GET` event stream open for the whole
//! session. The server's first event names the endpoint that accepts
//! JSON-RPC `POST`s; responses come back on the event stream and are matched
//! to callers by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sse::{drain_events, SseEvent};

/// Trait for MCP server transports.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a JSON-RPC request and wait for the corresponding response.
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str) -> Result<(), TransportError>;

    /// Check if the transport is still alive.
    fn is_alive(&self) -> bool;

    /// Shut down the transport.
    async fn shutdown(&self);
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("server answered HTTP {0}")]
    Status(u16),

    #[error("server never announced a message endpoint")]
    NoEndpoint,

    #[error("event stream closed")]
    Closed,

    #[error("timeout waiting for response")]
    Timeout,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SseTransport {
    client: reqwest::Client,
    endpoint: Url,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
    request_timeout: Duration,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    /// Open the event stream at `sse_url` and wait (up to `request_timeout`)
    /// for the server to announce its message endpoint.
    pub async fn connect(sse_url: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let base = Url::parse(sse_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        // No overall timeout on the client: the GET stays open for the
        // whole session. POSTs carry their own.
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;

        let response = client
            .get(base.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        let reader = tokio::spawn(read_events(
            response,
            base,
            endpoint_tx,
            pending.clone(),
            alive.clone(),
        ));

        let endpoint = match tokio::time::timeout(request_timeout, endpoint_rx).await {
            Ok(Ok(url)) => url,
            Ok(Err(_)) => {
                reader.abort();
                return Err(TransportError::Closed);
            }
            Err(_) => {
                reader.abort();
                return Err(TransportError::NoEndpoint);
            }
        };

        tracing::debug!(endpoint = %endpoint, "MCP message endpoint announced");

        Ok(Self {
            client,
            endpoint,
            pending,
            next_id: AtomicU64::new(1),
            alive,
            request_timeout,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// The URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<(), TransportError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Http(e)
                }
            })?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        // Register before posting: the answer can beat the POST response.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        tracing::debug!(id, method, "sending MCP request");
        if let Err(e) = self.post(&req).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    async fn send_notification(&self, method: &str) -> Result<(), TransportError> {
        tracing::debug!(method, "sending MCP notification");
        self.post(&JsonRpcNotification::new(method)).await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.pending.lock().clear();
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event stream reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn read_events(
    mut response: reqwest::Response,
    base: Url,
    endpoint_tx: oneshot::Sender<Url>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut buffer = String::new();

    loop {
        match response.chunk().await {
            Ok(Some(bytes)) => {
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                for event in drain_events(&mut buffer) {
                    dispatch(event, &base, &mut endpoint_tx, &pending);
                }
            }
            Ok(None) => {
                tracing::debug!("MCP event stream closed by server");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "MCP event stream failed");
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with `Closed`.
    pending.lock().clear();
}

fn dispatch(
    event: SseEvent,
    base: &Url,
    endpoint_tx: &mut Option<oneshot::Sender<Url>>,
    pending: &PendingMap,
) {
    match event.event.as_str() {
        "endpoint" => {
            let Some(tx) = endpoint_tx.take() else {
                tracing::debug!("ignoring repeated endpoint event");
                return;
            };
            match base.join(event.data.trim()) {
                Ok(url) => {
                    let _ = tx.send(url);
                }
                Err(e) => {
                    tracing::warn!(data = %event.data, error = %e, "unusable endpoint event");
                }
            }
        }
        "message" => match serde_json::from_str::<JsonRpcResponse>(&event.data) {
            Ok(resp) => match pending.lock().remove(&resp.id) {
                Some(tx) => {
                    let _ = tx.send(resp);
                }
                None => tracing::debug!(id = resp.id, "response for unknown request"),
            },
            Err(_) => {
                tracing::debug!(data = %event.data, "skipping non-response message from MCP server");
            }
        },
        other => tracing::debug!(event = other, "ignoring SSE event"),
    }
}
