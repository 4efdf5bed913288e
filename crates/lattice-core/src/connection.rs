//! Outbound handle for one attached client.
//!
//! The transport layer owns the socket; the core only holds a
//! [`ClientConnection`], a bounded sender that the connection's writer
//! task drains. Writing never blocks the caller, so a broadcast made while
//! a world is locked cannot stall on a slow socket. When a client stops
//! reading and its queue fills up, further frames are dropped until it
//! catches up. Every state frame is a full snapshot, so a client that
//! skips some still ends up with the current grid.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::DispatchError;

/// Frames queued per connection before new ones are dropped.
pub const OUTBOUND_CAPACITY: usize = 64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Instruction for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one binary frame.
    Frame(Bytes),
    /// Close the transport.
    Close,
}

/// Sending half of an attached client.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
}

impl ClientConnection {
    /// Create a connection handle and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (
            Self {
                id: ConnectionId::next(),
                tx,
            },
            rx,
        )
    }

    /// This connection's identifier.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for writing.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Lagging`] if the queue is full, in which
    /// case the frame is dropped, or [`DispatchError::Closed`] if the
    /// writer side is gone.
    pub fn send(&self, frame: Bytes) -> Result<(), DispatchError> {
        self.tx.try_send(Outbound::Frame(frame)).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::Lagging(self.id),
            TrySendError::Closed(_) => DispatchError::Closed(self.id),
        })
    }

    /// Ask the writer to close the transport.
    ///
    /// A no-op if the writer already went away. A lagging writer reaches
    /// the close request once it has drained the frames ahead of it.
    pub fn close(&self) {
        let tx = self.tx.clone();
        if let Err(TrySendError::Full(message)) = tx.try_send(Outbound::Close) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = tx.send(message).await;
                });
            }
        }
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
