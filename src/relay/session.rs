//! Relay session orchestration.
//!
//! One session per client request: open the upstream call, pump parsed
//! records to the transport, finalize exactly once on every exit path.
//! The session owns the upstream stream for its lifetime and borrows the
//! transport; dropping the stream releases the upstream connection, so no
//! exit path can leak it.

use std::future::Future;

use futures_util::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::relay::transport::{Transport, SERVER_ERROR_MESSAGE};
use crate::streaming::RecordStream;

/// Session lifecycle. `Finalizing -> Closed` is the single cleanup point,
/// reached exactly once from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Opening,
    Streaming,
    Finalizing,
    Closed,
}

/// Ephemeral state machine for one client request.
pub struct RelaySession<'t, T: Transport> {
    id: Uuid,
    transport: &'t mut T,
    state: SessionState,
}

impl<'t, T: Transport> RelaySession<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            state: SessionState::Opening,
        }
    }

    /// Drive the session to completion.
    ///
    /// `open` is the pending upstream call; it is awaited during `Opening`
    /// so a client disconnect can still cancel an unestablished call. No
    /// retry happens at this layer: any failure ends the session.
    pub async fn run<F>(mut self, open: F)
    where
        F: Future<Output = Result<RecordStream>>,
    {
        let cancel = self.transport.cancel_token();
        debug!(session = %self.id, "opening upstream call");

        let mut records = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(session = %self.id, "client disconnected before upstream call was established");
                self.finalize().await;
                return;
            }
            opened = open => match opened {
                Ok(stream) => stream,
                Err(e) => {
                    // Operator detail stays here; the client only sees the
                    // generic message.
                    warn!(session = %self.id, error = %e, "upstream call failed");
                    let _ = self.transport.send_error(SERVER_ERROR_MESSAGE).await;
                    self.finalize().await;
                    return;
                }
            }
        };

        self.state = SessionState::Streaming;
        debug!(session = %self.id, "streaming upstream records");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(session = %self.id, "client disconnected mid-stream");
                    break;
                }
                record = records.next() => record,
            };

            match next {
                Some(Ok(record)) => {
                    if !record.text.is_empty()
                        && self.transport.send_text(&record.text).await.is_err()
                    {
                        // Client unreachable; finalize silently.
                        info!(session = %self.id, "transport write rejected, treating as disconnect");
                        break;
                    }
                    if record.is_final_chunk {
                        debug!(session = %self.id, "terminal marker received");
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(session = %self.id, error = %e, "upstream stream failed");
                    let _ = self.transport.send_error(SERVER_ERROR_MESSAGE).await;
                    break;
                }
                // Upstream ended without a terminal marker and without a
                // truncated remainder; nothing more to forward.
                None => break,
            }
        }

        // Releases the upstream connection even when records remain after
        // the terminal marker.
        drop(records);
        self.finalize().await;
    }

    /// Single cleanup point: close the transport and release all state.
    async fn finalize(mut self) {
        self.state = SessionState::Finalizing;
        self.transport.close().await;
        self.state = SessionState::Closed;
        debug!(session = %self.id, state = ?self.state, "session closed");
    }
}
