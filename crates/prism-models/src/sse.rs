//! Server-sent event decoding for streamed completions.

use bytes::Bytes;
use futures::Stream;
use prism_abstraction::ModelError;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Extracts the text delta from one event payload, `None` when it carries none.
pub(crate) type DeltaParser = fn(&str) -> Option<String>;

/// End-of-stream payload sent by OpenAI-compatible servers.
const DONE_MARKER: &str = "[DONE]";

/// Turns an SSE response body into a stream of text deltas.
///
/// Events are split on blank lines and only their `data:` lines are kept.
/// Bytes are buffered until an event is complete, so multi-byte characters
/// split across network chunks decode correctly.
pub(crate) struct SseStream {
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
    parse: DeltaParser,
    body_done: bool,
    finished: bool,
}

impl SseStream {
    pub(crate) fn new(response: reqwest::Response, parse: DeltaParser) -> Self {
        Self::from_byte_stream(response.bytes_stream(), parse)
    }

    fn from_byte_stream(
        stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
        parse: DeltaParser,
    ) -> Self {
        Self { stream: Box::pin(stream), buffer: Vec::new(), parse, body_done: false, finished: false }
    }

    /// Removes the next complete event from the buffer and returns its data.
    fn next_event(&mut self) -> Option<String> {
        let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
        let text = String::from_utf8_lossy(&event[..end]);
        let data: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| data.strip_prefix(' ').unwrap_or(data))
            .collect();
        Some(data.join("\n"))
    }
}

impl Stream for SseStream {
    type Item = Result<String, ModelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.finished {
                return Poll::Ready(None);
            }

            while let Some(data) = self.next_event() {
                if data.trim() == DONE_MARKER {
                    self.finished = true;
                    return Poll::Ready(None);
                }
                if data.is_empty() {
                    continue;
                }
                match (self.parse)(&data) {
                    Some(delta) if !delta.is_empty() => return Poll::Ready(Some(Ok(delta))),
                    _ => {}
                }
            }

            if self.body_done {
                self.finished = true;
                continue;
            }

            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend(bytes.iter().filter(|&&b| b != b'\r'));
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(ModelError::RequestError(format!(
                        "Stream error: {}",
                        e
                    )))));
                }
                Poll::Ready(None) => {
                    // A final event may lack its trailing blank line.
                    self.body_done = true;
                    if !self.buffer.is_empty() {
                        self.buffer.extend_from_slice(b"\n\n");
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn upper(data: &str) -> Option<String> {
        (!data.starts_with('!')).then(|| data.to_uppercase())
    }

    fn chunks(parts: &[&[u8]]) -> SseStream {
        let owned: Vec<Result<Bytes, reqwest::Error>> =
            parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect();
        SseStream::from_byte_stream(futures::stream::iter(owned), upper)
    }

    async fn collect(stream: SseStream) -> Vec<String> {
        stream.map(Result::unwrap).collect().await
    }

    #[tokio::test]
    async fn test_events_split_across_chunks() {
        let stream = chunks(&[b"data: he", b"llo\n", b"\ndata: world\n\n"]);
        assert_eq!(collect(stream).await, vec!["HELLO", "WORLD"]);
    }

    #[tokio::test]
    async fn test_crlf_comments_and_skipped_payloads() {
        let stream = chunks(&[b": keep-alive\r\n\r\ndata: a\r\n\r\ndata: !skip\r\n\r\nevent: x\r\ndata: b\r\n\r\n"]);
        assert_eq!(collect(stream).await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_done_marker_ends_stream() {
        let stream = chunks(&[b"data: a\n\ndata: [DONE]\n\ndata: late\n\n"]);
        assert_eq!(collect(stream).await, vec!["A"]);
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let stream = chunks(&[b"data: a\n\ndata: tail"]);
        assert_eq!(collect(stream).await, vec!["A", "TAIL"]);
    }

    #[tokio::test]
    async fn test_multibyte_split_across_chunks() {
        let text = "data: 电动\n\n".as_bytes();
        let stream = chunks(&[&text[..8], &text[8..]]);
        assert_eq!(collect(stream).await, vec!["电动"]);
    }
}
