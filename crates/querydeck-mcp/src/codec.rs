//! Content-Length frame codec.
//!
//! Each frame is a header block of `Name: value` lines ended by an empty
//! line, followed by exactly `Content-Length` bytes of payload:
//!
//! ```text
//! Content-Length: 42\r\n
//! \r\n
//! {"jsonrpc":"2.0","id":1,"method":"ping"}
//! ```
//!
//! The codec never looks inside the payload.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default upper bound on a single frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Upper bound on a single header line, terminator included.
pub const MAX_HEADER_LINE_LEN: usize = 8 * 1024;

/// Framing failures. All of these leave the stream unusable.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream ended part-way through a header block.
    #[error("stream ended inside a frame header")]
    TruncatedHeader,

    /// A header line ran past the length limit without a terminator.
    #[error("header line exceeds the {limit} byte limit")]
    HeaderTooLong { limit: usize },

    /// The header block had no Content-Length.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// Content-Length was not a decimal byte count.
    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),

    /// Content-Length exceeds the configured limit.
    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: usize, limit: usize },

    /// The stream ended before the full body arrived.
    #[error("frame body truncated: expected {expected} bytes, received {}", partial.len())]
    ShortBody { expected: usize, partial: Vec<u8> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Body bytes read before the failure, if any.
    pub fn partial_body(&self) -> Option<&[u8]> {
        match self {
            Self::ShortBody { partial, .. } if !partial.is_empty() => Some(partial),
            _ => None,
        }
    }
}

/// Encode a payload as a complete frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    let mut frame = Vec::with_capacity(header.len() + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reads frames from a buffered byte stream.
pub struct FrameReader<R> {
    reader: R,
    max_frame_len: usize,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Set the largest accepted body length.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Read the next frame body.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut content_length: Option<usize> = None;
        let mut at_frame_start = true;
        let mut line = Vec::new();

        loop {
            line.clear();
            let n = (&mut self.reader)
                .take(MAX_HEADER_LINE_LEN as u64)
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                return if at_frame_start {
                    Ok(None)
                } else {
                    Err(FrameError::TruncatedHeader)
                };
            }
            at_frame_start = false;
            if line.last() != Some(&b'\n') {
                return Err(if line.len() >= MAX_HEADER_LINE_LEN {
                    FrameError::HeaderTooLong {
                        limit: MAX_HEADER_LINE_LEN,
                    }
                } else {
                    FrameError::TruncatedHeader
                });
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                break;
            }
            if let Some(length) = parse_content_length(text)? {
                content_length = Some(length);
            }
        }

        let expected = content_length.ok_or(FrameError::MissingContentLength)?;
        if expected > self.max_frame_len {
            return Err(FrameError::TooLarge {
                len: expected,
                limit: self.max_frame_len,
            });
        }

        let mut body = vec![0u8; expected];
        let mut filled = 0;
        while filled < expected {
            let n = self.reader.read(&mut body[filled..]).await?;
            if n == 0 {
                body.truncate(filled);
                return Err(FrameError::ShortBody {
                    expected,
                    partial: body,
                });
            }
            filled += n;
        }
        Ok(Some(body))
    }
}

/// Returns the length if `line` is a Content-Length header, `None` for any other header.
fn parse_content_length(line: &str) -> Result<Option<usize>, FrameError> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    let value = value.trim();
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| FrameError::InvalidContentLength(value.to_string()))
}

/// Writes frames to a byte stream.
///
/// The writer is owned by exactly one task; each frame goes out as a single
/// buffer followed by a flush, so frames never interleave.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        self.writer.write_all(&encode_frame(payload)).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::BufReader;

    fn reader(bytes: &[u8]) -> FrameReader<BufReader<&[u8]>> {
        FrameReader::new(BufReader::new(bytes))
    }

    #[tokio::test]
    async fn test_reads_consecutive_frames_then_eof() {
        let mut input = encode_frame(b"first");
        input.extend(encode_frame(b"second"));
        let mut frames = reader(&input);

        assert_eq!(frames.read_frame().await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(frames.read_frame().await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(frames.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_header_name_is_case_insensitive_and_others_ignored() {
        let input = b"Content-Type: application/json\r\ncontent-LENGTH :  4 \r\n\r\nbody";
        let mut frames = reader(input);
        assert_eq!(frames.read_frame().await.unwrap(), Some(b"body".to_vec()));
    }

    #[tokio::test]
    async fn test_accepts_bare_newlines() {
        let mut frames = reader(b"Content-Length: 2\n\nhi");
        assert_eq!(frames.read_frame().await.unwrap(), Some(b"hi".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let mut frames = reader(b"X-Other: 1\r\n\r\n{}");
        assert!(matches!(
            frames.read_frame().await,
            Err(FrameError::MissingContentLength)
        ));
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let mut frames = reader(b"Content-Length: ten\r\n\r\n");
        assert!(matches!(
            frames.read_frame().await,
            Err(FrameError::InvalidContentLength(v)) if v == "ten"
        ));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let mut frames = reader(b"Content-Length: 5\r\n");
        assert!(matches!(
            frames.read_frame().await,
            Err(FrameError::TruncatedHeader)
        ));

        let mut frames = reader(b"Content-Len");
        assert!(matches!(
            frames.read_frame().await,
            Err(FrameError::TruncatedHeader)
        ));
    }

    #[tokio::test]
    async fn test_short_body_keeps_partial_bytes() {
        let mut frames = reader(b"Content-Length: 10\r\n\r\n{\"id\":");
        let err = frames.read_frame().await.unwrap_err();
        assert_eq!(err.partial_body(), Some(&b"{\"id\":"[..]));
        assert!(err.to_string().contains("expected 10"));
    }

    #[tokio::test]
    async fn test_rejects_unterminated_long_header() {
        let mut input = b"X-Padding: ".to_vec();
        input.resize(MAX_HEADER_LINE_LEN * 2, b'a');
        let mut frames = reader(&input);
        assert!(matches!(
            frames.read_frame().await,
            Err(FrameError::HeaderTooLong { limit: MAX_HEADER_LINE_LEN })
        ));

        let mut input = b"X-Padding: ".to_vec();
        input.resize(MAX_HEADER_LINE_LEN - 1, b'a');
        input.extend_from_slice(b"\nContent-Length: 2\r\n\r\n{}");
        let mut frames = reader(&input);
        assert_eq!(frames.read_frame().await.unwrap(), Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn test_rejects_oversized_frame() {
        let mut frames = reader(b"Content-Length: 100\r\n\r\n").with_max_frame_len(10);
        assert!(matches!(
            frames.read_frame().await,
            Err(FrameError::TooLarge { len: 100, limit: 10 })
        ));
    }

    #[tokio::test]
    async fn test_zero_length_frame() {
        let mut frames = reader(b"Content-Length: 0\r\n\r\n");
        assert_eq!(frames.read_frame().await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_writer_emits_header_and_payload() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(b"{}").await.unwrap();
        assert_eq!(writer.into_inner(), b"Content-Length: 2\r\n\r\n{}".to_vec());
    }

    proptest! {
        #[test]
        fn frame_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let decoded = runtime.block_on(async {
                let mut writer = FrameWriter::new(Vec::new());
                writer.write_frame(&payload).await.unwrap();
                let bytes = writer.into_inner();
                let mut frames = reader(&bytes);
                frames.read_frame().await.unwrap()
            });
            prop_assert_eq!(decoded, Some(payload));
        }
    }
}
