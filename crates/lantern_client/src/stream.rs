//! Newline-delimited JSON streaming.

use crate::pool::PoolPermit;
use crate::wire::{ChatResponse, GenerateResponse};
use futures_util::{Stream, StreamExt};
use lantern_core::{GenerationChunk, GenerationResult};
use lantern_error::{ClientError, ClientErrorKind, ClientResult};
use lantern_interface::ChunkStream;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Splits a byte stream into complete lines.
///
/// Bytes are buffered until a newline arrives, so lines split across
/// network reads (or in the middle of a UTF-8 sequence) decode correctly.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line they complete, without newlines.
    /// Blank lines are skipped.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever remains after the last newline.
    pub(crate) fn finish(self) -> Option<Vec<u8>> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(self.pending)
        }
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> ClientResult<T> {
    serde_json::from_slice(line).map_err(|e| {
        ClientError::new(ClientErrorKind::StreamDecode(format!(
            "{e}: {}",
            String::from_utf8_lossy(line)
        )))
    })
}

/// Decode one line of a streamed `/api/generate` response.
pub(crate) fn parse_generate_line(line: &[u8]) -> ClientResult<GenerationChunk> {
    let mut response: GenerateResponse = decode_line(line)?;
    if let Some(error) = response.error.take() {
        return Err(ClientError::new(ClientErrorKind::StreamDecode(error)));
    }
    Ok(response.into_chunk())
}

/// Decode one line of a streamed `/api/chat` response.
pub(crate) fn parse_chat_line(line: &[u8]) -> ClientResult<GenerationChunk> {
    let mut response: ChatResponse = decode_line(line)?;
    if let Some(error) = response.error.take() {
        return Err(ClientError::new(ClientErrorKind::StreamDecode(error)));
    }
    Ok(response.into_chunk())
}

/// Turn a raw byte stream into a finite stream of chunks.
///
/// The stream ends after the chunk marked `done`. A line that fails to
/// decode, a transport error, a body that ends before `done`, or a read
/// that stays silent for `idle` yields one error and ends the stream.
/// `permit` is held until the stream finishes or is dropped.
pub(crate) fn chunk_stream<S, B, E>(
    bytes: S,
    permit: Option<PoolPermit>,
    idle: Duration,
    parse: fn(&[u8]) -> ClientResult<GenerationChunk>,
) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let _permit = permit;
        let mut bytes = Box::pin(bytes);
        let mut lines = LineBuffer::default();
        let mut partials = 0usize;

        loop {
            let read = match tokio::time::timeout(idle, bytes.next()).await {
                Ok(Some(Ok(read))) => read,
                Ok(Some(Err(e))) => {
                    yield Err(ClientError::new(ClientErrorKind::Connection(e.to_string())));
                    return;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(?idle, partials, "Stream stalled");
                    yield Err(ClientError::new(ClientErrorKind::Timeout(format!(
                        "no stream data within {:?}",
                        idle
                    ))));
                    return;
                }
            };
            for line in lines.push(read.as_ref()) {
                match parse(&line) {
                    Ok(chunk) if chunk.done => {
                        debug!(partials, "Stream complete");
                        yield Ok(chunk);
                        return;
                    }
                    Ok(chunk) => {
                        partials += 1;
                        trace!(partials, "Stream chunk");
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(tail) = lines.finish() {
            match parse(&tail) {
                Ok(chunk) if chunk.done => {
                    yield Ok(chunk);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        yield Err(ClientError::new(ClientErrorKind::StreamDecode(
            "stream ended before done marker".into(),
        )));
    })
}

/// Consume a chunk stream into one complete result.
///
/// The text is the concatenation of every chunk; the token count and
/// server metadata come from the final chunk.
pub async fn collect_stream(
    mut stream: ChunkStream,
    model: impl Into<String>,
) -> ClientResult<GenerationResult> {
    let mut result = GenerationResult::text(model, String::new(), 0);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        result.text.push_str(&chunk.content);
        if chunk.done {
            result.token_count = chunk.token_count.unwrap_or(0);
            if let Some(metadata) = chunk.metadata {
                result.metadata = metadata;
            }
            return Ok(result);
        }
    }
    Err(ClientError::new(ClientErrorKind::StreamDecode(
        "stream ended before done marker".into(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    const IDLE: Duration = Duration::from_secs(5);

    fn bytes(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, Infallible>> + Send + 'static {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    #[test]
    fn line_buffer_joins_split_reads() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"a\":").is_empty());
        let lines = buffer.push(b"1}\n\n{\"b\":2}\r\n{\"c\"");
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
        assert_eq!(buffer.finish(), Some(b"{\"c\"".to_vec()));
    }

    #[tokio::test]
    async fn generate_stream_ends_at_done() {
        let stream = chunk_stream(
            bytes(&[
                "{\"response\":\"Hel\",\"done\":false}\n{\"respo",
                "nse\":\"lo\",\"done\":false}\n",
                "{\"response\":\"\",\"done\":true,\"eval_count\":2}\n",
                "{\"response\":\"ignored\",\"done\":false}\n",
            ]),
            None,
            IDLE,
            parse_generate_line,
        );
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks[2].as_ref().unwrap().done);

        let stream = chunk_stream(
            bytes(&["{\"response\":\"Hi\",\"done\":false}\n{\"response\":\"\",\"done\":true,\"eval_count\":1}"]),
            None,
            IDLE,
            parse_generate_line,
        );
        let result = collect_stream(stream, "m").await.unwrap();
        assert_eq!(result.text, "Hi");
        assert_eq!(result.token_count, 1);
    }

    #[tokio::test]
    async fn malformed_chunk_terminates_stream() {
        let stream = chunk_stream(
            bytes(&["{\"response\":\"a\",\"done\":false}\nnot json\n{\"response\":\"b\",\"done\":false}\n"]),
            None,
            IDLE,
            parse_generate_line,
        );
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(
            chunks[1].as_ref().unwrap_err().kind,
            ClientErrorKind::StreamDecode(_)
        ));
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let stream = chunk_stream(
            bytes(&["{\"message\":{\"role\":\"assistant\",\"content\":\"a\"},\"done\":false}\n"]),
            None,
            IDLE,
            parse_chat_line,
        );
        let err = collect_stream(stream, "m").await.unwrap_err();
        assert!(matches!(err.kind, ClientErrorKind::StreamDecode(_)));
    }

    #[tokio::test]
    async fn server_error_line_is_surfaced() {
        let stream = chunk_stream(
            bytes(&["{\"error\":\"model crashed\"}\n"]),
            None,
            IDLE,
            parse_chat_line,
        );
        let err = collect_stream(stream, "m").await.unwrap_err();
        assert_eq!(
            err.kind,
            ClientErrorKind::StreamDecode("model crashed".into())
        );
    }

    #[tokio::test]
    async fn silent_body_times_out() {
        let stream = chunk_stream(
            bytes(&["{\"response\":\"Hel\",\"done\":false}\n"]).chain(stream::pending()),
            None,
            Duration::from_millis(50),
            parse_generate_line,
        );
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().content, "Hel");
        assert!(matches!(
            chunks[1].as_ref().unwrap_err().kind,
            ClientErrorKind::Timeout(_)
        ));
    }
}
