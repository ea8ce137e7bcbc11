//! Newline framing of the upstream response body.
//!
//! The upstream body is an unbounded sequence of newline-delimited text
//! frames. The two-character `"\r\n"` frame is the protocol keep-alive
//! marker; any fully blank line maps to [`Frame::KeepAlive`] and is
//! never treated as data. Transport errors are yielded to the caller
//! (which classifies them), after which the stream ends.

use bytes::BytesMut;
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

/// One framed unit from the upstream body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Protocol-level "still alive, nothing to say" marker.
    KeepAlive,
    /// One unit of content, line endings stripped.
    Data(String),
}

/// Adapt a raw byte stream into a stream of [`Frame`]s.
///
/// Buffers incoming chunks, splits on `\n`, and strips a trailing `\r`.
/// A non-empty trailing buffer at end-of-stream is emitted as a final
/// data frame; invalid UTF-8 lines are skipped with a warning.
pub fn frame_lines<S>(
    byte_stream: S,
) -> impl Stream<Item = Result<Frame, reqwest::Error>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line = buffer.split_to(newline_pos + 1);
                    line.truncate(line.len() - 1);
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }

                    if line.is_empty() {
                        return Some((Ok(Frame::KeepAlive), (stream, buffer, false)));
                    }
                    match std::str::from_utf8(&line) {
                        Ok(text) => {
                            return Some((
                                Ok(Frame::Data(text.to_owned())),
                                (stream, buffer, false),
                            ));
                        }
                        Err(_) => {
                            warn!("skipping frame with invalid UTF-8");
                            continue;
                        }
                    }
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Some((Err(e), (stream, buffer, true))),
                    None => {
                        if !buffer.is_empty() {
                            let text = String::from_utf8_lossy(&buffer).trim().to_owned();
                            buffer.clear();
                            if !text.is_empty() {
                                return Some((Ok(Frame::Data(text)), (stream, buffer, true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}
