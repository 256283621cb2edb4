//! Duplex channel transport (WebSocket).
//!
//! One adapter instance backs one long-lived connection. Each text message
//! received is a generation request and starts a new session; the
//! connection is closed once the first exchange completes, which mirrors
//! the historical behavior of the service and is kept deliberately.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::params::{resolve, PartialGenerationRequest};
use crate::relay::{RelaySession, Transport, SERVER_ERROR_MESSAGE};
use crate::server::AppState;

use async_trait::async_trait;

/// WebSocket-backed transport. Chunks are framed as `{"text": ...}`,
/// errors as `{"error": ...}`.
pub struct DuplexChannel {
    sink: SplitSink<WebSocket, Message>,
    cancel: CancellationToken,
    closed: bool,
}

impl DuplexChannel {
    fn new(sink: SplitSink<WebSocket, Message>, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn send_frame(&mut self, payload: String) -> Result<()> {
        if self.closed {
            return Err(RelayError::TransportClosed);
        }
        self.sink
            .send(Message::Text(payload))
            .await
            .map_err(|_| RelayError::TransportClosed)
    }
}

#[async_trait]
impl Transport for DuplexChannel {
    async fn send_text(&mut self, chunk: &str) -> Result<()> {
        self.send_frame(serde_json::json!({ "text": chunk }).to_string())
            .await
    }

    async fn send_error(&mut self, message: &str) -> Result<()> {
        self.send_frame(serde_json::json!({ "error": message }).to_string())
            .await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Upgrade handler. The origin gate comes first: connections from any
/// origin other than the configured one are rejected before the upgrade.
pub async fn ws_handler(
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    match origin {
        Some(origin) if origin == state.config.allowed_origin => {}
        other => {
            warn!(origin = ?other, "rejecting connection from unexpected origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let Some(ws) = ws else {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    };

    info!(origin = %state.config.allowed_origin, "accepting client connection");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    let cancel = CancellationToken::new();

    // The read half is polled concurrently so a client disconnect is
    // observed even while a session is streaming.
    let (request_tx, mut request_rx) = mpsc::channel::<String>(1);
    let reader = tokio::spawn(read_requests(stream, request_tx, cancel.clone()));

    let mut transport = DuplexChannel::new(sink, cancel);

    while let Some(raw) = request_rx.recv().await {
        let raw_request = match serde_json::from_str::<PartialGenerationRequest>(&raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparseable client request");
                let _ = transport.send_error(SERVER_ERROR_MESSAGE).await;
                transport.close().await;
                break;
            }
        };

        let resolved = resolve(raw_request);
        RelaySession::new(&mut transport)
            .run(state.upstream.open_stream(&resolved))
            .await;

        // The session closes the connection after a completed exchange.
        if transport.is_closed() {
            break;
        }
    }

    debug!("client connection finished");
    reader.abort();
}

async fn read_requests(
    mut stream: SplitStream<WebSocket>,
    request_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(raw)) => {
                // Never block here: this half must keep polling so a close
                // frame is observed even while a session is streaming.
                // Requests are handled one at a time; extras are dropped.
                match request_tx.try_send(raw) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("dropping request received while a session is active");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            // Pings are answered by the framework; everything else is noise.
            Ok(_) => {}
        }
    }
    cancel.cancel();
}
