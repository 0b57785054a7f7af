//! Transport layer: newline-delimited JSON over byte streams.
//!
//! The transport's contract to the endpoint is small:
//!
//! - a [`TransportSender`] whose `send` serializes one message per line with
//!   whole-line atomicity under concurrent use
//! - a stream of [`TransportEvent`]s in arrival order: decoded messages,
//!   per-line parse failures (which do not terminate the transport), and a
//!   final `Closed` when the underlying stream ends
//!
//! [`ByteStreamTransport`] implements the contract over any
//! `AsyncRead`/`AsyncWrite` pair; `stdio()` is the production binding for
//! subprocess servers.

pub mod codec;
mod stream;

pub use codec::{CodecError, Decoded, LineCodec};
pub use stream::{ByteStreamTransport, TransportSender};

use crate::messages::{JsonRpcMessage, RequestId};
use thiserror::Error;

/// Events emitted by a transport, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// A well-formed message arrived.
    Message(JsonRpcMessage),

    /// A line arrived that was not a usable JSON-RPC message.
    ///
    /// The transport keeps running; subsequent lines are processed normally.
    ParseFailure {
        /// Request id recovered from the line, when the line was valid JSON.
        id: Option<RequestId>,
        /// Diagnostic text.
        detail: String,
    },

    /// The underlying stream ended. Terminal.
    Closed,
}

/// Transport-level failures.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// The transport has closed; writes are refused.
    #[error("transport closed")]
    Closed,

    /// Serializing an outbound message failed.
    #[error("failed to encode message: {reason}")]
    Encode {
        /// The serialization failure.
        reason: String,
    },

    /// The underlying stream failed.
    #[error("transport I/O error: {reason}")]
    Io {
        /// The I/O failure.
        reason: String,
    },
}
