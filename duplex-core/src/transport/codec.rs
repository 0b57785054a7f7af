//! Newline-delimited JSON framing.
//!
//! Messages travel one JSON document per line, terminated by a single `\n`.
//! The codec keeps an append-only byte buffer so a message split across any
//! number of read chunks reassembles without loss: complete lines are
//! trimmed, empty lines skipped, and a partial trailing line stays buffered
//! verbatim until its terminator arrives.

use crate::messages::{JsonRpcMessage, RequestId};
use serde_json::Value;

/// Threshold beyond which the consumed prefix is compacted away.
const COMPACT_THRESHOLD: usize = 4096;

/// Default maximum frame size (10 MB).
const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Outcome of decoding one complete line.
#[derive(Debug)]
pub enum Decoded {
    /// A well-formed JSON-RPC message.
    Message(JsonRpcMessage),
    /// A line that was not a usable JSON-RPC message.
    ///
    /// `id` is populated when the line was valid JSON carrying an `id` field,
    /// so the endpoint can answer with an error response; invalid JSON has no
    /// extractable id and is only reportable.
    Malformed {
        /// Request id recovered from the line, if any.
        id: Option<RequestId>,
        /// Diagnostic text.
        detail: String,
    },
}

/// Errors raised by the codec itself.
#[derive(Debug, thiserror::Error, Clone)]
pub enum CodecError {
    /// A single frame exceeded the configured size limit.
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
}

/// Streaming line decoder with an append-only buffer.
#[derive(Debug)]
pub struct LineCodec {
    buffer: Vec<u8>,
    read_pos: usize,
    max_frame_size: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a codec with the default 10 MB frame limit.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            read_pos: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a custom frame limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            ..Self::new()
        }
    }

    /// Serialize a message into its wire line, terminator included.
    pub fn encode(message: &JsonRpcMessage) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(message)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Feed a chunk of bytes, returning every complete line's outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] when buffered unterminated data
    /// exceeds the frame limit; the buffer is cleared so the stream can
    /// recover at the next line boundary.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Decoded>, CodecError> {
        let unread = self.buffer.len() - self.read_pos;
        let projected = unread.saturating_add(chunk.len());
        if projected > self.max_frame_size {
            self.buffer.clear();
            self.read_pos = 0;
            return Err(CodecError::FrameTooLarge(projected));
        }

        if self.read_pos >= COMPACT_THRESHOLD {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }

        self.buffer.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        let mut start = self.read_pos;
        for index in self.read_pos..self.buffer.len() {
            if self.buffer[index] == b'\n' {
                let line = &self.buffer[start..index];
                if let Some(outcome) = decode_line(line) {
                    decoded.push(outcome);
                }
                start = index + 1;
            }
        }
        self.read_pos = start;

        Ok(decoded)
    }

    /// Bytes currently buffered without a terminator.
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.read_pos
    }
}

fn decode_line(line: &[u8]) -> Option<Decoded> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(err) => {
            return Some(Decoded::Malformed {
                id: None,
                detail: format!("invalid UTF-8: {err}"),
            });
        }
    };

    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<JsonRpcMessage>(text) {
        Ok(message) => Some(Decoded::Message(message)),
        Err(parse_err) => {
            // Valid JSON that fits no JSON-RPC shape still lets us recover
            // the id, so the peer can be told its envelope was invalid.
            let id = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|value| value.get("id").cloned())
                .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
            Some(Decoded::Malformed {
                id,
                detail: parse_err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{JsonRpcRequest, JsonRpcResponse};
    use serde_json::json;

    fn messages(decoded: Vec<Decoded>) -> Vec<JsonRpcMessage> {
        decoded
            .into_iter()
            .map(|d| match d {
                Decoded::Message(m) => m,
                Decoded::Malformed { detail, .. } => panic!("unexpected malformed line: {detail}"),
            })
            .collect()
    }

    #[test]
    fn encode_terminates_with_newline() {
        let request = JsonRpcRequest::new(1i64, "ping", None);
        let bytes = LineCodec::encode(&JsonRpcMessage::Request(request)).unwrap();
        assert!(bytes.ends_with(b"\n"));
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn roundtrip_is_byte_equal_json() {
        let request = JsonRpcRequest::new(1i64, "tools/call", Some(json!({"name": "add"})));
        let bytes = LineCodec::encode(&JsonRpcMessage::Request(request.clone())).unwrap();

        let mut codec = LineCodec::new();
        let out = messages(codec.push(&bytes).unwrap());
        assert_eq!(out, vec![JsonRpcMessage::Request(request)]);
    }

    #[test]
    fn chunked_delivery_reassembles_one_message() {
        // Header bytes, body bytes, then the terminator arrive separately.
        let line = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let mut codec = LineCodec::new();

        assert!(codec.push(&line[..10]).unwrap().is_empty());
        assert!(codec.push(&line[10..]).unwrap().is_empty());
        assert_eq!(codec.pending_len(), line.len());

        let out = messages(codec.push(b"\n").unwrap());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].method(), Some("tools/list"));
    }

    #[test]
    fn multiple_messages_in_one_chunk() {
        let chunk = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"b\"}\n";
        let mut codec = LineCodec::new();
        let out = messages(codec.push(chunk).unwrap());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].method(), Some("b"));
    }

    #[test]
    fn empty_lines_are_skipped() {
        let chunk = b"\n\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}\n\n";
        let mut codec = LineCodec::new();
        let out = messages(codec.push(chunk).unwrap());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let chunk = b"  {\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}  \r\n";
        let mut codec = LineCodec::new();
        let out = messages(codec.push(chunk).unwrap());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn malformed_line_does_not_stop_subsequent_lines() {
        let chunk = b"not json\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}\n";
        let mut codec = LineCodec::new();
        let out = codec.push(chunk).unwrap();
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Decoded::Malformed { id: None, .. }));
        assert!(matches!(out[1], Decoded::Message(_)));
    }

    #[test]
    fn unclassifiable_envelope_recovers_id() {
        let chunk = b"{\"jsonrpc\":\"2.0\",\"id\":7}\n";
        let mut codec = LineCodec::new();
        let out = codec.push(chunk).unwrap();
        match &out[0] {
            Decoded::Malformed { id: Some(id), .. } => assert_eq!(*id, RequestId::Number(7)),
            other => panic!("expected malformed with id, got {other:?}"),
        }
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = LineCodec::with_max_frame_size(16);
        let result = codec.push(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"a\"}");
        assert!(matches!(result, Err(CodecError::FrameTooLarge(_))));
        // Buffer was cleared so the codec can keep decoding.
        assert_eq!(codec.pending_len(), 0);
    }

    #[test]
    fn response_decodes() {
        let response = JsonRpcResponse::success(3i64, json!({"ok": true}));
        let bytes = LineCodec::encode(&JsonRpcMessage::Response(response)).unwrap();
        let mut codec = LineCodec::new();
        let out = messages(codec.push(&bytes).unwrap());
        assert!(matches!(out[0], JsonRpcMessage::Response(_)));
    }
}
