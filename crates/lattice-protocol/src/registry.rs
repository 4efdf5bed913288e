//! Dual-keyed packet registry.
//!
//! One canonical list of [`PacketCodec`] descriptors is turned into maps
//! at startup, code to codec and name to codec, so a packet can be looked
//! up by whichever key the caller holds. A third map indexes the frame
//! prefix for decoding. Registration happens before the registry is shared;
//! afterwards it is read-only.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::codec::{self, DecodeFn, EncodeFn};
use crate::error::ProtocolError;
use crate::packet::{Direction, Packet, PacketKind};

/// Length of the packet code that prefixes every frame.
pub const CODE_SIZE: usize = 2;

/// Codec descriptor for one packet type.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    /// Wire code.
    pub code: u16,
    /// Symbolic name.
    pub name: &'static str,
    /// Bytes that open every frame of this packet.
    pub prefix: [u8; CODE_SIZE],
    /// Who sends the packet.
    pub direction: Direction,
    /// Body decoder.
    pub decode: DecodeFn,
    /// Body encoder.
    pub encode: EncodeFn,
}

impl PacketCodec {
    const fn standard(kind: PacketKind, decode: DecodeFn, encode: EncodeFn) -> Self {
        Self {
            code: kind.code(),
            name: kind.name(),
            prefix: kind.prefix(),
            direction: kind.direction(),
            decode,
            encode,
        }
    }
}

/// Codecs for every packet the protocol defines.
pub const STANDARD_CODECS: [PacketCodec; 7] = [
    PacketCodec::standard(
        PacketKind::ClientStop,
        codec::decode_client_stop,
        codec::encode_client_stop,
    ),
    PacketCodec::standard(
        PacketKind::ClientStart,
        codec::decode_client_start,
        codec::encode_client_start,
    ),
    PacketCodec::standard(
        PacketKind::ClientSetCells,
        codec::decode_client_set_cells,
        codec::encode_client_set_cells,
    ),
    PacketCodec::standard(
        PacketKind::ServerStopped,
        codec::decode_server_stopped,
        codec::encode_server_stopped,
    ),
    PacketCodec::standard(
        PacketKind::ServerStarted,
        codec::decode_server_started,
        codec::encode_server_started,
    ),
    PacketCodec::standard(
        PacketKind::ServerState,
        codec::decode_server_state,
        codec::encode_server_state,
    ),
    PacketCodec::standard(
        PacketKind::ServerError,
        codec::decode_server_error,
        codec::encode_server_error,
    ),
];

/// Key for a registry lookup: either the wire code or the symbolic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKey<'a> {
    /// Look up by wire code.
    Code(u16),
    /// Look up by symbolic name.
    Name(&'a str),
}

impl From<u16> for PacketKey<'_> {
    fn from(code: u16) -> Self {
        Self::Code(code)
    }
}

impl<'a> From<&'a str> for PacketKey<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl From<PacketKind> for PacketKey<'_> {
    fn from(kind: PacketKind) -> Self {
        Self::Code(kind.code())
    }
}

/// Registry mapping packet codes and names to codecs.
#[derive(Debug, Default)]
pub struct PacketRegistry {
    by_code: HashMap<u16, Arc<PacketCodec>>,
    by_name: HashMap<&'static str, Arc<PacketCodec>>,
    by_prefix: HashMap<[u8; CODE_SIZE], Arc<PacketCodec>>,
}

impl PacketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding [`STANDARD_CODECS`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for codec in STANDARD_CODECS {
            let _ = registry.register(codec);
        }
        registry
    }

    /// Register a codec under its code and its name.
    ///
    /// Re-registering a code or a name replaces the previous entry and logs
    /// a warning. A replaced codec is removed under all of its keys, so it
    /// cannot stay reachable through a code or prefix the new one does not
    /// reuse. Returns the codec previously registered under the code.
    pub fn register(&mut self, codec: PacketCodec) -> Option<Arc<PacketCodec>> {
        let previous = self.by_code.get(&codec.code).cloned();
        let displaced: Vec<Arc<PacketCodec>> = [
            self.by_code.get(&codec.code),
            self.by_name.get(codec.name),
            self.by_prefix.get(&codec.prefix),
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
        if !displaced.is_empty() {
            warn!(
                code = format_args!("0x{:04x}", codec.code),
                name = codec.name,
                "packet codec already registered, overwriting"
            );
        }
        for old in &displaced {
            self.unregister(old);
        }

        let codec = Arc::new(codec);
        let _ = self.by_name.insert(codec.name, Arc::clone(&codec));
        let _ = self.by_prefix.insert(codec.prefix, Arc::clone(&codec));
        let _ = self.by_code.insert(codec.code, codec);
        previous
    }

    /// Drop every key that still points at `codec`.
    fn unregister(&mut self, codec: &Arc<PacketCodec>) {
        if self.by_code.get(&codec.code).is_some_and(|c| Arc::ptr_eq(c, codec)) {
            let _ = self.by_code.remove(&codec.code);
        }
        if self.by_name.get(codec.name).is_some_and(|c| Arc::ptr_eq(c, codec)) {
            let _ = self.by_name.remove(codec.name);
        }
        if self.by_prefix.get(&codec.prefix).is_some_and(|c| Arc::ptr_eq(c, codec)) {
            let _ = self.by_prefix.remove(&codec.prefix);
        }
    }

    /// Look up a codec by code or name. Absence is a normal outcome.
    pub fn lookup<'a>(&self, key: impl Into<PacketKey<'a>>) -> Option<&PacketCodec> {
        match key.into() {
            PacketKey::Code(code) => self.by_code.get(&code),
            PacketKey::Name(name) => self.by_name.get(name),
        }
        .map(AsRef::as_ref)
    }

    /// Number of distinct codes registered.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether no codecs are registered.
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Encode a packet into a complete frame (prefix included).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownCode`] if the packet's kind has no
    /// registered codec, or whatever the codec reports.
    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        let code = packet.kind().code();
        let codec = self.lookup(code).ok_or(ProtocolError::UnknownCode(code))?;
        let mut frame = Vec::with_capacity(CODE_SIZE);
        frame.extend_from_slice(&codec.prefix);
        (codec.encode)(packet, &mut frame)?;
        Ok(frame)
    }

    /// Decode a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingCode`] for frames shorter than the
    /// prefix, [`ProtocolError::UnknownCode`] (carrying the prefix read as a
    /// little-endian `u16`) for unregistered prefixes, or whatever the codec
    /// reports for a malformed body.
    pub fn decode(&self, frame: &[u8]) -> Result<Packet, ProtocolError> {
        let codec = self.codec_for_frame(frame)?;
        let body = frame.get(CODE_SIZE..).unwrap_or_default();
        (codec.decode)(body)
    }

    /// Find the codec a frame's prefix selects.
    ///
    /// # Errors
    ///
    /// Same as the prefix checks of [`decode`](Self::decode).
    pub fn codec_for_frame(&self, frame: &[u8]) -> Result<&PacketCodec, ProtocolError> {
        let prefix = frame_prefix(frame).ok_or(ProtocolError::MissingCode { len: frame.len() })?;
        self.by_prefix
            .get(&prefix)
            .map(AsRef::as_ref)
            .ok_or(ProtocolError::UnknownCode(u16::from_le_bytes(prefix)))
    }
}

/// The first two bytes of a frame, if it has them.
pub fn frame_prefix(frame: &[u8]) -> Option<[u8; CODE_SIZE]> {
    frame.get(..CODE_SIZE)?.try_into().ok()
}
