//! Byte streams and server-sent event decoding.
//!
//! [`ByteStream`] is the body carrier used by requests, responses, and
//! stream-typed model fields. It is a cheaply cloneable handle: clones share
//! the same underlying source, and equality is handle identity, which is what
//! lets models round-trip stream fields through [`to_map`](crate::ModelObject::to_map)
//! without copying payloads.
//!
//! [`SseDecoder`] is a pure incremental parser for `text/event-stream`
//! payloads; [`SseEventReader`] drives it from a live stream.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::document::Document;
use crate::error::Result;

/// A shared handle to a body payload.
///
/// In-memory payloads are cheap to re-read; a live response drains once and
/// is buffered afterwards.
#[derive(Debug, Clone)]
pub struct ByteStream {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    source: Mutex<Source>,
}

#[derive(Debug)]
enum Source {
    Memory { data: Bytes, offset: usize },
    Live(Option<reqwest::Response>),
}

impl ByteStream {
    /// Wraps an in-memory payload.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        ByteStream {
            inner: Arc::new(Inner {
                source: Mutex::new(Source::Memory {
                    data: data.into(),
                    offset: 0,
                }),
            }),
        }
    }

    /// Wraps a live HTTP response body.
    pub fn from_response(response: reqwest::Response) -> Self {
        ByteStream {
            inner: Arc::new(Inner {
                source: Mutex::new(Source::Live(Some(response))),
            }),
        }
    }

    /// Reads the next chunk, or `None` once the stream is exhausted.
    ///
    /// In-memory payloads yield their remaining content as a single chunk.
    pub async fn chunk(&self) -> Result<Option<Bytes>> {
        let mut source = self.inner.source.lock().await;
        match &mut *source {
            Source::Memory { data, offset } => {
                if *offset >= data.len() {
                    return Ok(None);
                }
                let chunk = data.slice(*offset..);
                *offset = data.len();
                Ok(Some(chunk))
            }
            Source::Live(response) => match response {
                Some(live) => Ok(live.chunk().await?),
                None => Ok(None),
            },
        }
    }

    /// Reads the whole payload into memory.
    ///
    /// A live response is drained on first call and buffered, so later calls
    /// see the same bytes.
    pub async fn read_as_bytes(&self) -> Result<Vec<u8>> {
        let mut source = self.inner.source.lock().await;
        match &mut *source {
            Source::Memory { data, .. } => Ok(data.to_vec()),
            Source::Live(response) => {
                let data = match response.take() {
                    Some(live) => live.bytes().await?,
                    None => Bytes::new(),
                };
                let out = data.to_vec();
                *source = Source::Memory { data, offset: 0 };
                Ok(out)
            }
        }
    }

    /// Reads the whole payload as UTF-8 text, replacing invalid sequences.
    pub async fn read_as_string(&self) -> Result<String> {
        let bytes = self.read_as_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the whole payload and parses it as a JSON document.
    pub async fn read_as_json(&self) -> Result<Document> {
        let bytes = self.read_as_bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        Ok(Document::from_json(value))
    }
}

impl PartialEq for ByteStream {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Vec<u8>> for ByteStream {
    fn from(data: Vec<u8>) -> Self {
        ByteStream::from_bytes(data)
    }
}

impl From<String> for ByteStream {
    fn from(data: String) -> Self {
        ByteStream::from_bytes(data.into_bytes())
    }
}

/// One decoded server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Payload of the last `data:` line in the frame.
    pub data: Option<String>,
    /// Value of the `id:` line, when present.
    pub id: Option<String>,
    /// Value of the `event:` line, when present.
    pub event: Option<String>,
    /// Value of the `retry:` line, only when it is all digits.
    pub retry: Option<u64>,
}

/// Incremental `text/event-stream` parser.
///
/// Feed it chunks as they arrive; complete frames (terminated by a blank
/// line) come back as events and a trailing partial frame stays buffered for
/// the next feed.
///
/// # Examples
///
/// ```
/// use keelson::stream::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.feed("data: par").is_empty());
///
/// let events = decoder.feed("tial\nid: 7\n\n");
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].data.as_deref(), Some("partial"));
/// assert_eq!(events[0].id.as_deref(), Some("7"));
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        SseDecoder::default()
    }

    /// Consumes a chunk and returns every event completed by it.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..end + 2).collect();
            events.push(parse_frame(&frame[..end]));
        }
        events
    }

    /// The buffered partial frame, if any.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }
}

fn parse_frame(frame: &str) -> SseEvent {
    let mut event = SseEvent::default();
    for line in frame.split('\n') {
        if let Some(value) = line.strip_prefix("data:") {
            event.data = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("event:") {
            event.event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            event.id = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("retry:") {
            let value = value.trim();
            if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                event.retry = value.parse().ok();
            }
        }
        // Lines starting with ':' are comments; anything else is ignored.
    }
    event
}

/// Pulls server-sent events off a live stream.
///
/// # Examples
///
/// ```no_run
/// use keelson::stream::SseEventReader;
/// use keelson::{Request, Result};
///
/// # async fn example() -> Result<()> {
/// let response = keelson::do_action(&Request::new(), None).await?;
/// let mut reader = SseEventReader::new(response.body);
/// while let Some(event) = reader.next_event().await? {
///     println!("{:?}", event.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SseEventReader {
    stream: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    done: bool,
}

impl SseEventReader {
    /// Creates a reader over a stream of `text/event-stream` bytes.
    pub fn new(stream: ByteStream) -> Self {
        SseEventReader {
            stream,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Returns the next event, or `None` when the stream ends.
    ///
    /// A partial frame left over when the stream ends is discarded, matching
    /// the wire format: a frame is only complete at its blank line.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }
            match self.stream.chunk().await? {
                Some(chunk) => {
                    let text = String::from_utf8_lossy(&chunk);
                    let events = self.decoder.feed(&text);
                    if !events.is_empty() {
                        tracing::debug!(count = events.len(), "decoded server-sent events");
                    }
                    self.pending.extend(events);
                }
                None => self.done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_complete_frames() {
        let mut decoder = SseDecoder::new();
        let mut payload = String::new();
        for count in 0..5 {
            payload.push_str(&format!(
                "data: {{\"count\":{count}}}\nevent: flow\nid: sse-test\nretry: 3\n:heartbeat\n\n"
            ));
        }

        let events = decoder.feed(&payload);

        assert_eq!(events.len(), 5);
        for (count, event) in events.iter().enumerate() {
            assert_eq!(event.data.as_deref(), Some(format!("{{\"count\":{count}}}").as_str()));
            assert_eq!(event.event.as_deref(), Some("flow"));
            assert_eq!(event.id.as_deref(), Some("sse-test"));
            assert_eq!(event.retry, Some(3));
        }
        assert!(decoder.remainder().is_empty());
    }

    #[test]
    fn buffers_partial_frames_across_feeds() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed("data: first\nid:").is_empty());
        assert_eq!(decoder.remainder(), "data: first\nid:");

        let events = decoder.feed(" a\n\ndata: second");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.as_deref(), Some("first"));
        assert_eq!(events[0].id.as_deref(), Some("a"));
        assert_eq!(decoder.remainder(), "data: second");
    }

    #[test]
    fn retry_requires_digits() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed("retry: 30s\n\nretry: 30\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].retry, None);
        assert_eq!(events[1].retry, Some(30));
    }

    #[test]
    fn comment_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(":keepalive\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.as_deref(), Some("x"));
        assert_eq!(events[0].event, None);
    }

    #[tokio::test]
    async fn memory_stream_reads_repeatedly() {
        let stream = ByteStream::from_bytes("hello".as_bytes().to_vec());
        assert_eq!(stream.read_as_string().await.unwrap(), "hello");
        assert_eq!(stream.read_as_bytes().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn memory_stream_chunks_once() {
        let stream = ByteStream::from_bytes("abc".as_bytes().to_vec());
        assert_eq!(stream.chunk().await.unwrap().as_deref(), Some(&b"abc"[..]));
        assert_eq!(stream.chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_as_json_parses_documents() {
        let stream = ByteStream::from_bytes(br#"{"ok":true}"#.to_vec());
        let doc = stream.read_as_json().await.unwrap();
        assert_eq!(doc.get("ok").and_then(Document::as_bool), Some(true));
    }

    #[tokio::test]
    async fn reader_drains_memory_streams() {
        let stream = ByteStream::from_bytes("data: a\n\ndata: b\n\ndata: tail".as_bytes().to_vec());
        let mut reader = SseEventReader::new(stream);

        let first = reader.next_event().await.unwrap();
        assert_eq!(first.and_then(|e| e.data), Some("a".to_string()));
        let second = reader.next_event().await.unwrap();
        assert_eq!(second.and_then(|e| e.data), Some("b".to_string()));
        // The trailing frame never completes.
        assert!(reader.next_event().await.unwrap().is_none());
    }
}
