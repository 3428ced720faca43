//! MCP message framing over a byte stream.
//!
//! Clients either send `Content-Length` framed messages or one JSON document
//! per line. Replies use the framing of the request they answer.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message body accepted from a client.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    ContentLength,
    NewlineDelimited,
}

/// One framed message. A frame whose body cannot be used is `Malformed`
/// so the caller can answer it and keep reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Malformed(String),
}

fn invalid_data(message: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.into())
}

fn parse_payload(payload: &[u8]) -> Payload {
    match serde_json::from_slice(payload) {
        Ok(value) => Payload::Json(value),
        Err(e) => Payload::Malformed(format!("Invalid JSON payload: {e}")),
    }
}

fn oversize(length: usize) -> Payload {
    Payload::Malformed(format!(
        "Message of {length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"
    ))
}

/// Read the next message. `Ok(None)` on a clean end of stream. IO failures and
/// unusable headers are errors; bad or oversized bodies come back as
/// [`Payload::Malformed`] with the stream positioned at the next frame.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<(Payload, Framing)>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !saw_header {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        if !saw_header && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
            let payload = if trimmed.len() > MAX_MESSAGE_BYTES {
                oversize(trimmed.len())
            } else {
                parse_payload(trimmed.as_bytes())
            };
            return Ok(Some((payload, Framing::NewlineDelimited)));
        }

        saw_header = true;
        if let Some((name, raw_len)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed = raw_len
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid_data("Invalid Content-Length header"))?;
                content_length = Some(parsed);
            }
        }
    }

    let content_length =
        content_length.ok_or_else(|| invalid_data("Missing Content-Length header"))?;
    if content_length > MAX_MESSAGE_BYTES {
        let skipped =
            tokio::io::copy(&mut (&mut *reader).take(content_length as u64), &mut tokio::io::sink())
                .await?;
        if skipped < content_length as u64 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while skipping an oversized MCP message",
            ));
        }
        return Ok(Some((oversize(content_length), Framing::ContentLength)));
    }
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some((parse_payload(&payload), Framing::ContentLength)))
}

pub async fn write_message<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)
        .map_err(|e| invalid_data(format!("Failed to serialize JSON: {e}")))?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::NewlineDelimited => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::BufReader;

    use super::*;

    #[tokio::test]
    async fn reads_content_length_frames() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let input = format!(
            "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n{body}",
            body.len()
        );
        let mut reader = BufReader::new(input.as_bytes());
        let (payload, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::ContentLength);
        let Payload::Json(value) = payload else {
            panic!("expected JSON, got {payload:?}");
        };
        assert_eq!(value["method"], "ping");
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_newline_delimited_messages() {
        let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n";
        let mut reader = BufReader::new(input.as_bytes());
        let (first, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::NewlineDelimited);
        assert!(matches!(first, Payload::Json(ref value) if value["id"] == 1));
        let (second, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert!(matches!(second, Payload::Json(ref value) if value["method"] == "tools/list"));
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_headers_are_an_error() {
        let mut reader = BufReader::new("Content-Length: 10\r\n".as_bytes());
        assert!(read_message(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn malformed_bodies_leave_the_stream_readable() {
        let broken = "{\"jsonrpc\":";
        let input = format!(
            "{{not json\nContent-Length: {}\r\n\r\n{broken}{{\"id\":3}}\n",
            broken.len()
        );
        let mut reader = BufReader::new(input.as_bytes());

        let (first, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::NewlineDelimited);
        assert!(matches!(first, Payload::Malformed(ref m) if m.starts_with("Invalid JSON payload")));

        let (second, framing) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(framing, Framing::ContentLength);
        assert!(matches!(second, Payload::Malformed(_)));

        let (third, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(third, Payload::Json(json!({ "id": 3 })));
    }

    #[tokio::test]
    async fn oversized_frames_are_skipped() {
        let length = MAX_MESSAGE_BYTES + 1;
        let mut input = format!("Content-Length: {length}\r\n\r\n").into_bytes();
        input.extend(std::iter::repeat_n(b' ', length));
        input.extend_from_slice(b"{\"id\":4}\n");
        let mut reader = BufReader::new(input.as_slice());

        let (first, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert!(matches!(first, Payload::Malformed(ref m) if m.contains("exceeds")));
        let (second, _) = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(second, Payload::Json(json!({ "id": 4 })));
    }

    #[tokio::test]
    async fn oversized_length_without_body_is_an_error() {
        let input = format!("Content-Length: {}\r\n\r\n{{}}", MAX_MESSAGE_BYTES + 1);
        let mut reader = BufReader::new(input.as_bytes());
        assert!(read_message(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn writes_in_requested_framing() {
        let mut framed = Vec::new();
        write_message(&mut framed, &json!({ "ok": true }), Framing::ContentLength)
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(framed).unwrap(),
            "Content-Length: 11\r\nContent-Type: application/json\r\n\r\n{\"ok\":true}"
        );

        let mut lines = Vec::new();
        write_message(&mut lines, &json!({ "ok": true }), Framing::NewlineDelimited)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(lines).unwrap(), "{\"ok\":true}\n");
    }
}
