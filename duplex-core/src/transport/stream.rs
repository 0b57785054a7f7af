//! Byte-stream transport over any `AsyncRead`/`AsyncWrite` pair.
//!
//! A reader task owns the read half and pumps decoded events into an
//! unbounded channel; the write half sits behind an async mutex so any number
//! of tasks can send concurrently with whole-line atomicity. The natural
//! production binding is stdin/stdout of a subprocess, with stderr left free
//! for diagnostics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::codec::{Decoded, LineCodec};
use super::{TransportError, TransportEvent};
use crate::messages::JsonRpcMessage;

const READ_CHUNK_SIZE: usize = 8 * 1024;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Clonable write half of a transport.
///
/// `send` serializes the message, appends the line terminator, and writes and
/// flushes the whole line under the writer lock, so concurrent senders never
/// interleave bytes and a returned `Ok` means the line was handed to the
/// operating system.
#[derive(Clone)]
pub struct TransportSender {
    writer: Arc<Mutex<BoxedWriter>>,
    closed: Arc<AtomicBool>,
}

impl TransportSender {
    /// Send one message as a single line.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::Closed`] once the transport has closed,
    /// or with the underlying I/O error (which also closes the transport).
    pub async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let bytes = LineCodec::encode(message).map_err(|e| TransportError::Encode {
            reason: e.to_string(),
        })?;

        let mut writer = self.writer.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let write_result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        match write_result {
            Ok(()) => Ok(()),
            Err(err) => {
                self.closed.store(true, Ordering::Release);
                Err(TransportError::Io {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Whether the transport has closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the write half: subsequent sends fail and the peer observes
    /// end-of-stream.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.shutdown().await {
            debug!(error = %err, "transport shutdown failed");
        }
    }
}

impl std::fmt::Debug for TransportSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSender")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// A connected byte-stream transport.
pub struct ByteStreamTransport {
    sender: TransportSender,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ByteStreamTransport {
    /// Build a transport from a read half and a write half.
    ///
    /// The reader task starts immediately; events buffer until consumed.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let closed = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(reader, event_tx, Arc::clone(&closed)));

        Self {
            sender: TransportSender {
                writer: Arc::new(Mutex::new(Box::new(writer))),
                closed,
            },
            events: event_rx,
        }
    }

    /// Bind the transport to this process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Two transports wired back to back over an in-memory pipe.
    ///
    /// Everything one side sends, the other receives. Intended for tests and
    /// in-process endpoint pairs.
    pub fn pair() -> (Self, Self) {
        let (left, right) = tokio::io::duplex(64 * 1024);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);
        (
            Self::new(left_read, left_write),
            Self::new(right_read, right_write),
        )
    }

    /// A clonable handle for sending.
    pub fn sender(&self) -> TransportSender {
        self.sender.clone()
    }

    /// Receive the next transport event; `None` after `Closed` was consumed
    /// and the reader task ended.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Split into the write handle and the event stream.
    pub fn into_parts(self) -> (TransportSender, mpsc::UnboundedReceiver<TransportEvent>) {
        (self.sender, self.events)
    }
}

impl std::fmt::Debug for ByteStreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStreamTransport")
            .field("closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

async fn read_loop<R>(
    mut reader: R,
    events: mpsc::UnboundedSender<TransportEvent>,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut codec = LineCodec::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!("transport input reached EOF");
                break;
            }
            Ok(n) => match codec.push(&chunk[..n]) {
                Ok(decoded) => {
                    for outcome in decoded {
                        let event = match outcome {
                            Decoded::Message(message) => TransportEvent::Message(message),
                            Decoded::Malformed { id, detail } => {
                                TransportEvent::ParseFailure { id, detail }
                            }
                        };
                        if events.send(event).is_err() {
                            // Receiver is gone; nothing left to deliver to.
                            closed.store(true, Ordering::Release);
                            return;
                        }
                    }
                }
                Err(err) => {
                    // An oversized frame poisons only the current line.
                    warn!(error = %err, "dropping oversized frame");
                    let _ = events.send(TransportEvent::ParseFailure {
                        id: None,
                        detail: err.to_string(),
                    });
                }
            },
            Err(err) => {
                warn!(error = %err, "transport read failed");
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    let _ = events.send(TransportEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{JsonRpcRequest, RequestId};

    #[tokio::test]
    async fn pair_delivers_messages_in_order() {
        let (left, mut right) = ByteStreamTransport::pair();
        let sender = left.sender();

        for i in 1..=3i64 {
            let request = JsonRpcRequest::new(i, format!("method_{i}"), None);
            sender.send(&JsonRpcMessage::Request(request)).await.unwrap();
        }

        for i in 1..=3i64 {
            match right.recv().await.unwrap() {
                TransportEvent::Message(JsonRpcMessage::Request(req)) => {
                    assert_eq!(req.id, RequestId::Number(i));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn eof_emits_closed_and_fails_sends() {
        let (left, mut right) = ByteStreamTransport::pair();
        let right_sender = right.sender();
        left.sender().close().await;

        // Reader on the right observes the peer hang up.
        loop {
            match right.recv().await {
                Some(TransportEvent::Closed) | None => break,
                Some(_) => {}
            }
        }

        let request = JsonRpcRequest::new(1i64, "ping", None);
        let result = right_sender.send(&JsonRpcMessage::Request(request)).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn concurrent_sends_do_not_interleave() {
        let (left, mut right) = ByteStreamTransport::pair();
        let sender = left.sender();

        let mut handles = Vec::new();
        for i in 0..20i64 {
            let sender = sender.clone();
            handles.push(tokio::spawn(async move {
                let request =
                    JsonRpcRequest::new(i, "flood", Some(serde_json::json!({"payload": "x".repeat(512)})));
                sender.send(&JsonRpcMessage::Request(request)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every line parses; interleaved bytes would produce parse failures.
        let mut seen = 0;
        while seen < 20 {
            match right.recv().await.unwrap() {
                TransportEvent::Message(_) => seen += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn parse_failure_does_not_close_transport() {
        let (raw, mut transport) = {
            let (left, right) = tokio::io::duplex(4096);
            let (_unused_read, left_write) = tokio::io::split(left);
            let (right_read, right_write) = tokio::io::split(right);
            (left_write, ByteStreamTransport::new(right_read, right_write))
        };

        let mut raw = raw;
        raw.write_all(b"garbage\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        raw.flush().await.unwrap();

        match transport.recv().await.unwrap() {
            TransportEvent::ParseFailure { id: None, .. } => {}
            other => panic!("expected parse failure, got {other:?}"),
        }
        match transport.recv().await.unwrap() {
            TransportEvent::Message(JsonRpcMessage::Request(req)) => {
                assert_eq!(req.method, "ping");
            }
            other => panic!("expected message, got {other:?}"),
        }
    }
}
