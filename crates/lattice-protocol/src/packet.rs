//! Packet kinds and their typed payloads.

use lattice_types::Cell;

/// Which side of the connection sends a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by clients to the server.
    Client,
    /// Sent by the server to clients.
    Server,
}

/// Every packet kind the protocol defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketKind {
    /// Ask the world to stop.
    ClientStop,
    /// Ask the world to start.
    ClientStart,
    /// Replace the world's grid with the given alive cells.
    ClientSetCells,
    /// The world stopped.
    ServerStopped,
    /// The world started.
    ServerStarted,
    /// Full alive-cell snapshot of the world.
    ServerState,
    /// A command from this connection was rejected.
    ServerError,
}

impl PacketKind {
    /// All kinds in code order.
    pub const ALL: [Self; 7] = [
        Self::ClientStop,
        Self::ClientStart,
        Self::ClientSetCells,
        Self::ServerStopped,
        Self::ServerStarted,
        Self::ServerState,
        Self::ServerError,
    ];

    /// The 16-bit wire code.
    pub const fn code(self) -> u16 {
        match self {
            Self::ClientStop => 0x0000,
            Self::ClientStart => 0x0001,
            Self::ClientSetCells => 0x0002,
            Self::ServerStopped => 0x8000,
            Self::ServerStarted => 0x8001,
            Self::ServerState => 0x8002,
            Self::ServerError => 0x88ff,
        }
    }

    /// The symbolic name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClientStop => "client-stop",
            Self::ClientStart => "client-start",
            Self::ClientSetCells => "client-set-cells",
            Self::ServerStopped => "server-stopped",
            Self::ServerStarted => "server-started",
            Self::ServerState => "server-state",
            Self::ServerError => "server-error",
        }
    }

    /// The two bytes that open a frame of this kind.
    ///
    /// This is the little-endian code for every kind except `server-error`,
    /// which has always been sent as the bytes `0x88 0xff`; clients in the
    /// field match on that byte sequence, so it is kept.
    pub const fn prefix(self) -> [u8; 2] {
        match self {
            Self::ServerError => [0x88, 0xff],
            _ => self.code().to_le_bytes(),
        }
    }

    /// Who sends this packet.
    pub const fn direction(self) -> Direction {
        match self {
            Self::ClientStop | Self::ClientStart | Self::ClientSetCells => Direction::Client,
            Self::ServerStopped | Self::ServerStarted | Self::ServerState | Self::ServerError => {
                Direction::Server
            }
        }
    }

    /// Look a kind up by wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Look a kind up by symbolic name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl core::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of `client-set-cells`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellBatch {
    /// Reserved flag byte, currently always zero.
    pub flags: u8,
    /// Cells to mark alive.
    pub cells: Vec<Cell>,
}

/// Payload of `server-state`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Generation the snapshot belongs to.
    pub generation: u64,
    /// Reserved flag byte, currently always zero.
    pub flags: u8,
    /// Every alive cell, row-major.
    pub cells: Vec<Cell>,
}

/// Payload of `server-error`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Human-readable reason.
    pub message: String,
}

impl ErrorMessage {
    /// Wrap a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `client-stop`.
    ClientStop,
    /// `client-start`.
    ClientStart,
    /// `client-set-cells`.
    ClientSetCells(CellBatch),
    /// `server-stopped`.
    ServerStopped,
    /// `server-started`.
    ServerStarted,
    /// `server-state`.
    ServerState(StateSnapshot),
    /// `server-error`.
    ServerError(ErrorMessage),
}

impl Packet {
    /// The kind of this packet.
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::ClientStop => PacketKind::ClientStop,
            Self::ClientStart => PacketKind::ClientStart,
            Self::ClientSetCells(_) => PacketKind::ClientSetCells,
            Self::ServerStopped => PacketKind::ServerStopped,
            Self::ServerStarted => PacketKind::ServerStarted,
            Self::ServerState(_) => PacketKind::ServerState,
            Self::ServerError(_) => PacketKind::ServerError,
        }
    }

    /// Shorthand for a `server-error` packet.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ServerError(ErrorMessage::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_names_resolve_both_ways() {
        for kind in PacketKind::ALL {
            assert_eq!(PacketKind::from_code(kind.code()), Some(kind));
            assert_eq!(PacketKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PacketKind::from_code(0x1234), None);
        assert_eq!(PacketKind::from_name("client-jump"), None);
    }

    #[test]
    fn prefixes_are_little_endian_except_server_error() {
        assert_eq!(PacketKind::ServerState.prefix(), [0x02, 0x80]);
        assert_eq!(PacketKind::ClientSetCells.prefix(), [0x02, 0x00]);
        assert_eq!(PacketKind::ServerError.prefix(), [0x88, 0xff]);
    }

    #[test]
    fn direction_follows_high_bit() {
        for kind in PacketKind::ALL {
            let expected = if kind.code() & 0x8000 == 0 {
                Direction::Client
            } else {
                Direction::Server
            };
            assert_eq!(kind.direction(), expected, "{kind}");
        }
    }
}
