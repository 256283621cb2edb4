//! Upstream stream handling.
//!
//! The provider emits newline-delimited JSON records split arbitrarily
//! across byte fragments. [`LineFramer`] reassembles complete lines;
//! [`record_stream`] classifies each as a text delta or terminal marker.

mod line_framer;
mod parser;

pub use line_framer::LineFramer;
pub use parser::{parse_line, record_stream, RecordStream, UpstreamRecord};
