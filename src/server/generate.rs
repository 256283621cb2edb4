//! One-shot chunked transport (HTTP).
//!
//! One adapter instance backs exactly one request/response exchange. The
//! session writes into a bounded channel feeding the response body, so a
//! slow client suspends the writer and backpressure propagates upstream by
//! pausing consumption of the record stream.
//!
//! Once body bytes have been flushed there is no structured error channel
//! left; a mid-stream fault can only terminate the body. That is an
//! inherent limit of the shape, not a bug.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::params::{resolve, PartialGenerationRequest, PartialPrompt};
use crate::relay::{RelaySession, Transport};
use crate::server::AppState;

use async_trait::async_trait;

/// Buffered chunks between the session and the response body.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Wire shape of the one-shot endpoint. Continuation is not supported on
/// this variant.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneShotRequest {
    pub prompt_text: String,
}

/// Transport writing raw text bytes into an already-streaming response
/// body.
pub struct OneShotStream {
    sender: Option<mpsc::Sender<Bytes>>,
    cancel: CancellationToken,
    started: bool,
}

impl OneShotStream {
    /// Create the transport together with the response body it feeds.
    ///
    /// Dropping the body (client disconnect, or response complete) fires
    /// the transport's cancellation token.
    pub fn channel(capacity: usize) -> (Self, Body) {
        let (sender, mut receiver) = mpsc::channel::<Bytes>(capacity);
        let cancel = CancellationToken::new();

        let guard = cancel.clone().drop_guard();
        let body = Body::from_stream(async_stream::stream! {
            let _guard = guard;
            while let Some(chunk) = receiver.recv().await {
                yield Ok::<_, std::convert::Infallible>(chunk);
            }
        });

        (
            Self {
                sender: Some(sender),
                cancel,
                started: false,
            },
            body,
        )
    }
}

#[async_trait]
impl Transport for OneShotStream {
    async fn send_text(&mut self, chunk: &str) -> Result<()> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(RelayError::TransportClosed);
        };
        sender
            .send(Bytes::copy_from_slice(chunk.as_bytes()))
            .await
            .map_err(|_| RelayError::TransportClosed)?;
        self.started = true;
        Ok(())
    }

    async fn send_error(&mut self, message: &str) -> Result<()> {
        if self.started {
            // Streaming already began; the fault surfaces as termination.
            debug!("error after first chunk, ending stream without payload");
            return Ok(());
        }
        self.send_text(message).await
    }

    async fn close(&mut self) {
        // Dropping the sender ends the body stream; repeated calls are
        // no-ops.
        self.sender.take();
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// `POST` handler for the one-shot variant.
///
/// The response streams raw text chunks with chunked transfer framing and
/// a protocol-correct plain-text content type.
pub async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<OneShotRequest>,
) -> Response {
    let resolved = resolve(PartialGenerationRequest {
        prompt: Some(PartialPrompt {
            text: Some(request.prompt_text),
            is_continuation: None,
        }),
        ..Default::default()
    });

    let (mut transport, body) = OneShotStream::channel(BODY_CHANNEL_CAPACITY);
    let upstream = state.upstream.clone();
    tokio::spawn(async move {
        RelaySession::new(&mut transport)
            .run(upstream.open_stream(&resolved))
            .await;
    });

    match Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
    {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
