//! Server-sent event framing for streamed chat completions.
//!
//! The upstream answers `stream: true` requests with `data: {json}` lines and a
//! closing `data: [DONE]`. Network chunks do not line up with those lines, so
//! bytes are buffered until a full line is available.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use super::FragmentStream;
use crate::connectors::ConnectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    Done,
}

#[derive(Debug, Default)]
pub struct SseLineBuffer {
    // raw bytes, so a multi-byte char split across chunks survives
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Parse whatever is left once the byte stream has ended.
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&remaining))
            .into_iter()
            .collect()
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    // blank separators, comments and event:/id:/retry: fields carry nothing for us
    let data = trimmed.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(data.to_owned()))
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// Text carried by one `data:` payload; `None` for role-only or empty deltas.
pub fn parse_fragment(data: &str) -> Option<Result<String, ConnectorError>> {
    let payload: ChunkPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(err) => {
            return Some(Err(ConnectorError::InvalidResponse(format!(
                "unparseable stream chunk: {}",
                err
            ))))
        }
    };

    if let Some(error) = payload.error {
        return Some(Err(ConnectorError::HttpError(format!(
            "upstream reported an error mid-stream: {}",
            error
        ))));
    }

    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(Ok)
}

struct StreamState<S> {
    bytes: Pin<Box<S>>,
    parser: SseLineBuffer,
    pending: VecDeque<Result<String, ConnectorError>>,
    finished: bool,
    idle_timeout: Duration,
}

impl<S> StreamState<S> {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                break;
            }
            match event {
                SseEvent::Data(data) => {
                    if let Some(item) = parse_fragment(&data) {
                        if item.is_err() {
                            self.finished = true;
                        }
                        self.pending.push_back(item);
                    }
                }
                SseEvent::Done => self.finished = true,
            }
        }
    }
}

/// Turn a raw response body into a stream of text fragments.
///
/// The stream ends at `[DONE]` (or a clean end of body). A read failure ends it
/// with `StreamInterrupted`; no bytes for `idle_timeout` ends it with `Timeout`.
pub fn fragment_stream<S, B, E>(bytes: S, idle_timeout: Duration) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
        idle_timeout,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match tokio::time::timeout(state.idle_timeout, state.bytes.next()).await {
                Err(_) => {
                    state.finished = true;
                    let secs = state.idle_timeout.as_secs();
                    return Some((
                        Err(ConnectorError::Timeout(format!(
                            "no stream data for {} seconds",
                            secs
                        ))),
                        state,
                    ));
                }
                Ok(Some(Ok(chunk))) => {
                    let events = state.parser.feed(chunk.as_ref());
                    state.absorb(events);
                }
                Ok(Some(Err(err))) => {
                    state.finished = true;
                    return Some((
                        Err(ConnectorError::StreamInterrupted(err.to_string())),
                        state,
                    ));
                }
                Ok(None) => {
                    let events = state.parser.flush();
                    state.absorb(events);
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn buffer_joins_lines_split_across_chunks() {
        let line = chunk("Hello");
        let (head, tail) = line.split_at(10);

        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(head.as_bytes()).is_empty());

        let events = buffer.feed(tail.as_bytes());
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SseEvent::Data(data) if data.contains("Hello")));
    }

    #[test]
    fn buffer_emits_every_event_of_a_batched_chunk() {
        let batched = format!("{}{}data: [DONE]\n", chunk("a"), chunk("b"));
        let events = SseLineBuffer::new().feed(batched.as_bytes());

        assert_eq!(events.len(), 3);
        assert_eq!(events[2], SseEvent::Done);
    }

    #[test]
    fn buffer_keeps_multibyte_chars_split_between_chunks() {
        let line = chunk("héllo");
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut buffer = SseLineBuffer::new();
        buffer.feed(&bytes[..split]);
        let events = buffer.feed(&bytes[split..]);

        let SseEvent::Data(data) = &events[0] else {
            panic!("expected data event");
        };
        assert_eq!(parse_fragment(data).unwrap().unwrap(), "héllo");
    }

    #[test]
    fn flush_parses_unterminated_tail() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: [DONE]").is_empty());
        assert_eq!(buffer.flush(), vec![SseEvent::Done]);
    }

    #[test]
    fn role_only_delta_is_skipped() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(parse_fragment(data).is_none());
    }

    #[tokio::test]
    async fn stream_yields_fragments_until_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", chunk("Hel"), chunk("lo"), chunk("ignored"));
        let bytes = stream::iter(vec![Ok::<_, String>(body.into_bytes())]);

        let fragments: Vec<_> = fragment_stream(bytes, Duration::from_secs(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|item| item.unwrap())
            .collect();

        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn read_error_ends_stream_as_interrupted() {
        let bytes = stream::iter(vec![
            Ok(chunk("partial").into_bytes()),
            Err("connection reset".to_string()),
        ]);

        let items: Vec<_> = fragment_stream(bytes, Duration::from_secs(1)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(ConnectorError::StreamInterrupted(_))));
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let bytes = stream::pending::<Result<Vec<u8>, String>>();

        let items: Vec<_> = fragment_stream(bytes, Duration::from_millis(20)).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ConnectorError::Timeout(_))));
    }
}
