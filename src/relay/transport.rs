//! Client transport abstraction.
//!
//! Both transport shapes — the long-lived duplex channel and the one-shot
//! chunked response — implement the same trait, so the session logic runs
//! once and tests run against an in-memory fake. Adapters guarantee that
//! no write happens after `close()` and that `close()` is idempotent.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// The only error text clients ever see. Upstream detail stays in the logs.
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// One client-facing transport handle.
///
/// A transport is owned by the surrounding server framework for the
/// lifetime of the connection; sessions borrow it and must not write
/// after observing `close()`.
#[async_trait]
pub trait Transport: Send {
    /// Deliver one text chunk to the client.
    ///
    /// An `Err` means the client is unreachable; the session treats it
    /// exactly like a disconnect and finalizes silently.
    async fn send_text(&mut self, chunk: &str) -> Result<()>;

    /// Surface an error message to the client, where the transport still
    /// can. One-shot transports cannot surface structured errors once body
    /// bytes have been flushed; they ignore the call and terminate instead.
    async fn send_error(&mut self, message: &str) -> Result<()>;

    /// End the client-facing stream. Idempotent.
    async fn close(&mut self);

    /// Token fired when the client disconnects.
    ///
    /// Sessions select on this to abort the upstream call promptly instead
    /// of discovering the disconnect on the next failed write.
    fn cancel_token(&self) -> CancellationToken;
}
