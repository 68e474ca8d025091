//! Consuming side of the push subscription: a long-lived request whose body
//! is a stream of server-sent events. Exposed as an async event stream:
//! one item at a time, in server write order; dropping the stream cancels
//! the subscription.

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use tracing::warn;
use uuid::Uuid;

use ripple_types::events::PushEvent;

use crate::ClientError;

/// Subscribe to a user's push channel.
///
/// Heartbeat comments keep the transport alive and are consumed silently;
/// malformed event payloads are rejected here, at the decode boundary, and
/// never reach the caller.
pub fn subscribe(
    http: reqwest::Client,
    base_url: String,
    user_id: Uuid,
) -> impl Stream<Item = Result<PushEvent, ClientError>> {
    try_stream! {
        let url = format!(
            "{}/api/messages/stream/{}",
            base_url.trim_end_matches('/'),
            user_id
        );
        let response = http.get(&url).send().await?.error_for_status()?;
        let mut body = response.bytes_stream();
        let mut frames = FrameParser::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for payload in frames.feed(&chunk) {
                match serde_json::from_str::<PushEvent>(&payload) {
                    Ok(event) => yield event,
                    Err(e) => warn!("dropping malformed push payload: {}", e),
                }
            }
        }
    }
}

/// Incremental parser for the event-stream wire format. Frames are separated
/// by a blank line; `data:` lines accumulate into one payload, comment lines
/// (leading `:`, e.g. heartbeats) and other fields are ignored.
struct FrameParser {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl FrameParser {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Feed one chunk of the response body; returns every complete payload
    /// it finished. Partial lines stay buffered until the next chunk.
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    payloads.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // comments (":heartbeat") and fields like "event:" carry no payload
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_frame() {
        let mut parser = FrameParser::new();
        let out = parser.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(out, ["{\"a\":1}"]);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"data: {\"a\"").is_empty());
        assert!(parser.feed(b":1}\n").is_empty());
        let out = parser.feed(b"\n");
        assert_eq!(out, ["{\"a\":1}"]);
    }

    #[test]
    fn heartbeat_comments_are_silent() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b": heartbeat\n\n").is_empty());
        let out = parser.feed(b": heartbeat\n\ndata: 1\n\n");
        assert_eq!(out, ["1"]);
    }

    #[test]
    fn multi_line_data_joins_with_newline() {
        let mut parser = FrameParser::new();
        let out = parser.feed(b"data: first\ndata: second\n\n");
        assert_eq!(out, ["first\nsecond"]);
    }

    #[test]
    fn event_field_lines_are_ignored() {
        let mut parser = FrameParser::new();
        let out = parser.feed(b"event: connected\ndata: 7\n\n");
        assert_eq!(out, ["7"]);
    }
}
