//! Binary wire protocol spoken over world connections.
//!
//! Every frame is little-endian and starts with a 2-byte packet code. Codes
//! below `0x8000` travel client to server, the rest server to client:
//!
//! | Code | Name | Body after the code |
//! |------|------|---------------------|
//! | `0x0000` | `client-stop` | none |
//! | `0x0001` | `client-start` | none |
//! | `0x0002` | `client-set-cells` | `u8` flags, then `N x (u32 x, u32 y)` |
//! | `0x8000` | `server-stopped` | none |
//! | `0x8001` | `server-started` | none |
//! | `0x8002` | `server-state` | `u64` generation, `u8` flags, then `N x (u32 x, u32 y)` |
//! | `0x88ff` | `server-error` | UTF-8 message bytes |
//!
//! # Modules
//!
//! - [`packet`] -- Packet kinds and their typed payloads
//! - [`codec`] -- Body encoders/decoders for each packet kind
//! - [`registry`] -- Code/name keyed registry that frames and unframes packets
//! - [`error`] -- Protocol error type

pub mod codec;
pub mod error;
pub mod packet;
pub mod registry;

pub use error::ProtocolError;
pub use packet::{CellBatch, Direction, ErrorMessage, Packet, PacketKind, StateSnapshot};
pub use registry::{PacketCodec, PacketKey, PacketRegistry};
