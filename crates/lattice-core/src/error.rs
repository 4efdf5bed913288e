//! Error types for the `lattice-core` crate.

use lattice_life::GridError;
use lattice_protocol::{PacketKind, ProtocolError};

use crate::connection::ConnectionId;

/// Errors from sending packets through a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The packet could not be framed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection's writer is gone.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The connection's queue is full; the frame was dropped.
    #[error("connection {0} is not keeping up, frame dropped")]
    Lagging(ConnectionId),

    /// The dispatcher went away before a waited-for packet arrived.
    #[error("dispatcher dropped while waiting for a packet")]
    WaiterDropped,
}

/// Errors raised by packet handlers. Logged by the dispatcher, never
/// propagated further.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Replying to the sender failed.
    #[error("reply failed: {0}")]
    Reply(#[from] DispatchError),

    /// The world this handler belongs to has been dropped.
    #[error("world no longer exists")]
    WorldGone,

    /// The handler was subscribed to a kind it cannot handle.
    #[error("expected a {expected} packet, got {found}")]
    UnexpectedPacket {
        /// Kind the handler understands.
        expected: PacketKind,
        /// Kind it received.
        found: PacketKind,
    },
}

/// Errors from world operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The world's invariants do not allow it to run.
    #[error("world cannot run: {reason}")]
    Invalid {
        /// Which invariant failed.
        reason: String,
    },

    /// The operation is not allowed while the simulation runs.
    #[error("simulation is running")]
    Running,

    /// A supplied cell does not fit the grid.
    #[error(transparent)]
    Grid(#[from] GridError),
}
