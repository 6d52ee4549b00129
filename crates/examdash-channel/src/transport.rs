//! Transport seam of the push channel.
//!
//! The channel handle only needs two things from a transport: open a
//! connection, and read text frames from it until it ends. Handshake, auth
//! and framing belong to the implementation.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use examdash_core::{defaults, Error, PushEvent, PushFrame, Result};
use tokio::sync::broadcast;
use tracing::warn;

/// Factory for live connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// One live connection.
#[async_trait]
pub trait Connection: Send {
    /// Next text frame. `None` when the peer closed the connection; `Some(Err)`
    /// when the transport failed. Either ends the connection.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

#[derive(Debug, Clone)]
enum Signal {
    Frame(String),
    Drop,
}

/// In-process transport backed by a `tokio::sync::broadcast` channel.
///
/// Used by tests and by embedders that already receive events in-process.
/// Frames sent while nothing is connected are lost, like a real socket.
pub struct BroadcastTransport {
    tx: broadcast::Sender<Signal>,
    refuse: AtomicU32,
    connects: AtomicUsize,
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(defaults::TRANSPORT_BUFFER_CAPACITY)
    }
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            refuse: AtomicU32::new(0),
            connects: AtomicUsize::new(0),
        }
    }

    /// Send a raw text frame to every open connection. Returns how many
    /// connections received it.
    pub fn send_text(&self, text: impl Into<String>) -> usize {
        self.tx.send(Signal::Frame(text.into())).unwrap_or(0)
    }

    /// Encode and send a typed event.
    pub fn send_event(&self, event: &PushEvent) -> Result<usize> {
        let text = PushFrame::from_event(event)?.encode()?;
        Ok(self.send_text(text))
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) -> usize {
        self.tx.send(Signal::Drop).unwrap_or(0)
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: u32) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    /// Successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn open_connections(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl Transport for BroadcastTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(Error::Transport("connection refused".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(BroadcastConnection {
            rx: self.tx.subscribe(),
        }))
    }
}

struct BroadcastConnection {
    rx: broadcast::Receiver<Signal>,
}

#[async_trait]
impl Connection for BroadcastConnection {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.rx.recv().await {
                Ok(Signal::Frame(text)) => return Some(Ok(text)),
                Ok(Signal::Drop) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "In-process transport lagged, frames lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_receive() {
        let transport = BroadcastTransport::new(8);
        let mut conn = transport.connect().await.unwrap();
        assert_eq!(transport.open_connections(), 1);
        assert_eq!(transport.send_text("hello"), 1);
        assert_eq!(conn.next_frame().await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_drop_ends_connection() {
        let transport = BroadcastTransport::new(8);
        let mut conn = transport.connect().await.unwrap();
        transport.drop_connections();
        assert!(conn.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_refuse_next() {
        let transport = BroadcastTransport::new(8);
        transport.refuse_next(2);
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(transport.connect_count(), 1);
    }

    #[test]
    fn test_send_without_connections_is_lost() {
        let transport = BroadcastTransport::new(8);
        assert_eq!(transport.send_text("nobody"), 0);
    }
}
