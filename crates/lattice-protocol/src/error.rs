//! Error types for the `lattice-protocol` crate.

/// Errors produced while framing or unframing packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is too short to hold a packet code.
    #[error("frame of {len} bytes has no packet code")]
    MissingCode {
        /// Frame length in bytes.
        len: usize,
    },

    /// No codec is registered for the packet code.
    #[error("unknown packet code 0x{0:04x}")]
    UnknownCode(u16),

    /// The body does not match the packet's layout.
    #[error("malformed {name} packet: {reason}")]
    Malformed {
        /// Packet name.
        name: &'static str,
        /// What was wrong with the body.
        reason: String,
    },

    /// A codec was handed a payload of a different packet kind.
    #[error("codec for {expected} cannot encode a {found} payload")]
    KindMismatch {
        /// Packet name the codec is registered for.
        expected: &'static str,
        /// Packet name of the payload.
        found: &'static str,
    },
}
