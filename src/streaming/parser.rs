//! Upstream stream parsing.
//!
//! Turns the provider's raw byte stream into an ordered sequence of
//! [`UpstreamRecord`]s. Each complete line is expected to be a JSON object
//! of the form `{"data":{"text":"...","isFinalChunk":false}}`.
//!
//! A malformed line is fatal for the session: upstream framing that fails
//! to parse means the stream is unreliable, and continuing would risk
//! emitting garbled output. End-of-stream with buffered trailing bytes is
//! a truncation, not a silent success.

use std::pin::Pin;

use futures::Stream;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::streaming::LineFramer;

/// One incremental unit of generated text delivered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRecord {
    /// Generated text delta. May be empty, which is valid and simply not
    /// forwarded to the client.
    pub text: String,
    /// Terminal marker: no further text will follow for this request.
    pub is_final_chunk: bool,
}

/// Envelope around each line of provider output.
#[derive(Debug, Deserialize)]
struct UpstreamEnvelope {
    data: UpstreamRecord,
}

/// Ordered, finite, non-restartable stream of parsed upstream records.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<UpstreamRecord>> + Send>>;

/// Parse one complete line of provider output.
///
/// Returns `Ok(None)` for a line that is empty after trimming (silently
/// skipped, not an error, not a record).
pub fn parse_line(line: &[u8]) -> Result<Option<UpstreamRecord>> {
    let line = std::str::from_utf8(line)
        .map_err(|e| RelayError::UpstreamParse(format!("stream line is not UTF-8: {e}")))?
        .trim();
    if line.is_empty() {
        return Ok(None);
    }
    let envelope: UpstreamEnvelope = serde_json::from_str(line)
        .map_err(|e| RelayError::UpstreamParse(format!("invalid stream line: {e}")))?;
    Ok(Some(envelope.data))
}

/// Convert a fallible byte stream into a [`RecordStream`].
///
/// The first parse failure ends the stream; a transport error from the
/// byte stream is passed through and also ends it.
pub fn record_stream<S, B>(byte_stream: S) -> RecordStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut framer = LineFramer::new();
        let mut byte_stream = std::pin::pin!(byte_stream);

        while let Some(fragment) = byte_stream.next().await {
            let fragment = match fragment {
                Ok(f) => f,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for line in framer.push(fragment.as_ref()) {
                match parse_line(&line) {
                    Ok(Some(record)) => yield Ok(record),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(rest) = framer.finish() {
            yield Err(RelayError::UpstreamParse(format!(
                "stream ended mid-record ({} bytes unconsumed)",
                rest.len()
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ok_fragments(fragments: Vec<&'static [u8]>) -> impl Stream<Item = Result<&'static [u8]>> {
        stream::iter(fragments.into_iter().map(Ok))
    }

    async fn drain(stream: RecordStream) -> Vec<Result<UpstreamRecord>> {
        stream.collect().await
    }

    #[test]
    fn parse_line_extracts_the_data_field() {
        let record = parse_line(br#"{"data":{"text":"hello","isFinalChunk":false}}"#)
            .expect("parse")
            .expect("record");
        assert_eq!(record.text, "hello");
        assert!(!record.is_final_chunk);
    }

    #[test]
    fn parse_line_skips_empty_lines() {
        assert_eq!(parse_line(b"").expect("parse"), None);
        assert_eq!(parse_line(b"   ").expect("parse"), None);
    }

    #[test]
    fn parse_line_rejects_truncated_json() {
        let err = parse_line(br#"{"data":{"text":"hel"#).expect_err("must fail");
        assert!(matches!(err, RelayError::UpstreamParse(_)));
    }

    #[tokio::test]
    async fn records_survive_arbitrary_fragment_boundaries() {
        // One record split mid-JSON, one coalesced with the tail of the first.
        let items = drain(record_stream(ok_fragments(vec![
            br#"{"data":{"text":"foo","#.as_slice(),
            br#""isFinalChunk":false}}"#.as_slice(),
            b"\n{\"data\":{\"text\":\"bar\",\"isFinalChunk\":true}}\n".as_slice(),
        ])))
        .await;

        let records: Vec<_> = items.into_iter().map(|r| r.expect("record")).collect();
        assert_eq!(
            records,
            vec![
                UpstreamRecord { text: "foo".into(), is_final_chunk: false },
                UpstreamRecord { text: "bar".into(), is_final_chunk: true },
            ]
        );
    }

    #[tokio::test]
    async fn empty_lines_between_records_contribute_nothing() {
        let items = drain(record_stream(ok_fragments(vec![
            b"{\"data\":{\"text\":\"a\",\"isFinalChunk\":false}}\n\n{\"data\":{\"text\":\"b\",\"isFinalChunk\":false}}\n".as_slice(),
        ])))
        .await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn malformed_line_ends_the_stream_with_an_error() {
        let items = drain(record_stream(ok_fragments(vec![
            b"{\"data\":{\"text\":\"a\",\"isFinalChunk\":false}}\nnot json\n{\"data\":{\"text\":\"never\",\"isFinalChunk\":false}}\n".as_slice(),
        ])))
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(RelayError::UpstreamParse(_))));
    }

    #[tokio::test]
    async fn truncated_trailing_record_is_an_error_not_silence() {
        let items = drain(record_stream(ok_fragments(vec![
            b"{\"data\":{\"text\":\"a\",\"isFinalChunk\":false}}\n{\"data\":{\"text\":\"tru".as_slice(),
        ])))
        .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(RelayError::UpstreamParse(_))));
    }

    #[tokio::test]
    async fn byte_stream_errors_pass_through() {
        let fragments: Vec<Result<&[u8]>> = vec![
            Ok(b"{\"data\":{\"text\":\"a\",\"isFinalChunk\":false}}\n".as_slice()),
            Err(RelayError::UpstreamConnect("reset by peer".into())),
        ];
        let items = drain(record_stream(stream::iter(fragments))).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(RelayError::UpstreamConnect(_))));
    }
}
