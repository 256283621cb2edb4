//! Relay session behavior, run against an in-memory transport fake.
//!
//! The fake implements the same `Transport` trait as the real adapters, so
//! every property verified here holds for both transport shapes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio_util::sync::CancellationToken;

use ttt_relay::relay::{RelaySession, Transport, SERVER_ERROR_MESSAGE};
use ttt_relay::streaming::{RecordStream, UpstreamRecord};
use ttt_relay::RelayError;

#[derive(Clone, Default)]
struct FakeTransport {
    texts: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
    close_count: Arc<AtomicUsize>,
    cancel: CancellationToken,
    reject_writes: Arc<AtomicBool>,
}

impl FakeTransport {
    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&mut self, chunk: &str) -> Result<(), RelayError> {
        assert_eq!(self.close_count(), 0, "write after close");
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RelayError::TransportClosed);
        }
        self.texts.lock().unwrap().push(chunk.to_string());
        Ok(())
    }

    async fn send_error(&mut self, message: &str) -> Result<(), RelayError> {
        assert_eq!(self.close_count(), 0, "write after close");
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(RelayError::TransportClosed);
        }
        self.errors.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

fn rec(text: &str, is_final_chunk: bool) -> Result<UpstreamRecord, RelayError> {
    Ok(UpstreamRecord {
        text: text.to_string(),
        is_final_chunk,
    })
}

fn records(items: Vec<Result<UpstreamRecord, RelayError>>) -> RecordStream {
    Box::pin(stream::iter(items))
}

/// Sets a flag when the upstream stream is dropped, i.e. when the session
/// has released the upstream connection.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn guarded_records(
    items: Vec<Result<UpstreamRecord, RelayError>>,
    released: Arc<AtomicBool>,
) -> RecordStream {
    let guard = DropFlag(released);
    Box::pin(async_stream::stream! {
        let _guard = guard;
        for item in items {
            yield item;
        }
    })
}

#[tokio::test]
async fn forwards_in_order_and_stops_at_terminal_marker() {
    let mut transport = FakeTransport::default();
    let stream = records(vec![
        rec("foo", false),
        rec("bar", true),
        rec("baz", false),
    ]);

    RelaySession::new(&mut transport)
        .run(async { Ok(stream) })
        .await;

    // "baz" arrives after the terminal marker and must never be forwarded.
    assert_eq!(transport.texts(), vec!["foo", "bar"]);
    assert_eq!(transport.errors(), Vec::<String>::new());
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn empty_text_records_are_skipped_not_errors() {
    let mut transport = FakeTransport::default();
    let stream = records(vec![rec("", false), rec("x", true)]);

    RelaySession::new(&mut transport)
        .run(async { Ok(stream) })
        .await;

    assert_eq!(transport.texts(), vec!["x"]);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn connect_failure_surfaces_only_the_generic_message() {
    let mut transport = FakeTransport::default();

    RelaySession::new(&mut transport)
        .run(async {
            Err(RelayError::UpstreamConnect(
                "dns error: no such host api.example".into(),
            ))
        })
        .await;

    assert_eq!(transport.texts(), Vec::<String>::new());
    // Raw upstream detail must not leak to the client.
    assert_eq!(transport.errors(), vec![SERVER_ERROR_MESSAGE]);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn parse_error_reports_generic_error_and_releases_upstream() {
    let mut transport = FakeTransport::default();
    let released = Arc::new(AtomicBool::new(false));
    let stream = guarded_records(
        vec![
            rec("foo", false),
            Err(RelayError::UpstreamParse("invalid stream line".into())),
        ],
        released.clone(),
    );

    RelaySession::new(&mut transport)
        .run(async { Ok(stream) })
        .await;

    assert_eq!(transport.texts(), vec!["foo"]);
    assert_eq!(transport.errors(), vec![SERVER_ERROR_MESSAGE]);
    assert_eq!(transport.close_count(), 1);
    assert!(released.load(Ordering::SeqCst), "upstream stream leaked");
}

#[tokio::test]
async fn upstream_end_without_terminal_marker_closes_cleanly() {
    let mut transport = FakeTransport::default();
    let stream = records(vec![rec("partial", false)]);

    RelaySession::new(&mut transport)
        .run(async { Ok(stream) })
        .await;

    assert_eq!(transport.texts(), vec!["partial"]);
    assert_eq!(transport.errors(), Vec::<String>::new());
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn rejected_write_finalizes_silently() {
    let mut transport = FakeTransport::default();
    transport.reject_writes.store(true, Ordering::SeqCst);
    let released = Arc::new(AtomicBool::new(false));
    let stream = guarded_records(
        vec![rec("foo", false), rec("bar", false)],
        released.clone(),
    );

    RelaySession::new(&mut transport)
        .run(async { Ok(stream) })
        .await;

    // Unreachable client: no error is surfaced, cleanup still happens.
    assert_eq!(transport.texts(), Vec::<String>::new());
    assert_eq!(transport.errors(), Vec::<String>::new());
    assert_eq!(transport.close_count(), 1);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn client_disconnect_mid_stream_aborts_upstream() {
    let transport = FakeTransport::default();
    let cancel = transport.cancel.clone();
    let released = Arc::new(AtomicBool::new(false));

    let guard = DropFlag(released.clone());
    let stream: RecordStream = Box::pin(async_stream::stream! {
        let _guard = guard;
        yield rec("foo", false);
        // Upstream stalls; only the disconnect can end the session now.
        futures::future::pending::<()>().await;
    });

    let mut session_transport = transport.clone();
    let session = tokio::spawn(async move {
        RelaySession::new(&mut session_transport)
            .run(async { Ok(stream) })
            .await;
    });

    // Wait for the first chunk to arrive, then disconnect.
    while transport.texts().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), session)
        .await
        .expect("session must finish promptly after disconnect")
        .expect("session task");

    assert_eq!(transport.texts(), vec!["foo"]);
    assert_eq!(transport.errors(), Vec::<String>::new());
    assert_eq!(transport.close_count(), 1);
    assert!(released.load(Ordering::SeqCst), "upstream connection leaked");
}

#[tokio::test]
async fn disconnect_before_upstream_established_cancels_the_call() {
    let transport = FakeTransport::default();
    transport.cancel.cancel();
    let released = Arc::new(AtomicBool::new(false));
    let released_in_open = released.clone();

    let mut session_transport = transport.clone();
    RelaySession::new(&mut session_transport)
        .run(async move {
            // Never resolves; the pre-cancelled token must win the race.
            futures::future::pending::<()>().await;
            Ok(guarded_records(vec![], released_in_open))
        })
        .await;

    assert_eq!(transport.texts(), Vec::<String>::new());
    assert_eq!(transport.close_count(), 1);
}
