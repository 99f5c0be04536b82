//! Streaming protocol plumbing
//!
//! A completion stream yields zero or more delta events followed by exactly
//! one terminal event (`done: true`). Consumers cancel by dropping the
//! stream; producers never require a cancellation signal.

use futures::stream::{BoxStream, StreamExt};

use crate::models::StreamEvent;

/// A finite stream of [`StreamEvent`]s. Pre-stream failures are returned as
/// `Err` from the producing call; mid-stream failures terminate the stream
/// with a `done: true` event instead of an error item.
pub type CompletionStream = BoxStream<'static, StreamEvent>;

/// Split text into whitespace-inclusive deltas whose concatenation
/// reconstructs the input exactly.
pub fn whitespace_deltas(text: &str) -> Vec<String> {
    text.split_inclusive(char::is_whitespace)
        .map(str::to_string)
        .collect()
}

/// Build a stream from already-complete text, used by full-text backends
/// (the mock variant and offline cache replay). The final delta rides on the
/// terminal event; empty text yields a lone empty terminal event.
pub fn stream_from_text(text: String) -> CompletionStream {
    let mut events: Vec<StreamEvent> = whitespace_deltas(&text)
        .into_iter()
        .map(StreamEvent::delta)
        .collect();

    match events.pop() {
        Some(last) => events.push(StreamEvent::finished(last.content)),
        None => events.push(StreamEvent::finished("")),
    }

    futures::stream::iter(events).boxed()
}

/// Drain complete newline-terminated lines out of a byte buffer, leaving any
/// trailing partial line in place. Shared by the NDJSON and SSE decoders.
pub(crate) fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line).trim().to_string();
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines
}
