//! Body codecs for each packet kind.
//!
//! Decoders receive the frame body with the 2-byte code already stripped;
//! encoders append the body to a buffer that already holds the code. The
//! registry owns the code prefix so that every packet, `server-error`
//! included, is framed by the same path.

use lattice_types::Cell;

use crate::error::ProtocolError;
use crate::packet::{CellBatch, ErrorMessage, Packet, PacketKind, StateSnapshot};

/// Decodes a frame body into a packet.
pub type DecodeFn = fn(&[u8]) -> Result<Packet, ProtocolError>;

/// Appends the body of a packet to a buffer.
pub type EncodeFn = fn(&Packet, &mut Vec<u8>) -> Result<(), ProtocolError>;

/// Bytes per encoded cell: two little-endian `u32`.
pub const CELL_SIZE: usize = 8;

/// Bytes of fixed header in a `server-state` body: generation + flags.
const STATE_HEADER: usize = 9;

// ---------------------------------------------------------------------------
// Empty bodies
// ---------------------------------------------------------------------------

/// Decode `client-stop`. Trailing bytes are ignored.
pub fn decode_client_stop(_body: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(Packet::ClientStop)
}

/// Decode `client-start`. Trailing bytes are ignored.
pub fn decode_client_start(_body: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(Packet::ClientStart)
}

/// Decode `server-stopped`. Trailing bytes are ignored.
pub fn decode_server_stopped(_body: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(Packet::ServerStopped)
}

/// Decode `server-started`. Trailing bytes are ignored.
pub fn decode_server_started(_body: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(Packet::ServerStarted)
}

/// Encode any packet without a body, checking the kind matches.
fn encode_empty(expected: PacketKind, packet: &Packet) -> Result<(), ProtocolError> {
    expect_kind(expected, packet)
}

/// Encode `client-stop`.
pub fn encode_client_stop(packet: &Packet, _out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    encode_empty(PacketKind::ClientStop, packet)
}

/// Encode `client-start`.
pub fn encode_client_start(packet: &Packet, _out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    encode_empty(PacketKind::ClientStart, packet)
}

/// Encode `server-stopped`.
pub fn encode_server_stopped(packet: &Packet, _out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    encode_empty(PacketKind::ServerStopped, packet)
}

/// Encode `server-started`.
pub fn encode_server_started(packet: &Packet, _out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    encode_empty(PacketKind::ServerStarted, packet)
}

// ---------------------------------------------------------------------------
// client-set-cells
// ---------------------------------------------------------------------------

/// Decode `client-set-cells`: flag byte then cell pairs.
pub fn decode_client_set_cells(body: &[u8]) -> Result<Packet, ProtocolError> {
    let name = PacketKind::ClientSetCells.name();
    let (flags, rest) = body.split_first().ok_or_else(|| ProtocolError::Malformed {
        name,
        reason: "missing flag byte".to_owned(),
    })?;
    let cells = read_cells(name, rest)?;
    Ok(Packet::ClientSetCells(CellBatch {
        flags: *flags,
        cells,
    }))
}

/// Encode `client-set-cells`.
pub fn encode_client_set_cells(packet: &Packet, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let Packet::ClientSetCells(batch) = packet else {
        return Err(mismatch(PacketKind::ClientSetCells, packet));
    };
    out.reserve(batch.cells.len().saturating_mul(CELL_SIZE).saturating_add(1));
    out.push(batch.flags);
    write_cells(out, &batch.cells);
    Ok(())
}

// ---------------------------------------------------------------------------
// server-state
// ---------------------------------------------------------------------------

/// Decode `server-state`: generation, flag byte, then cell pairs.
pub fn decode_server_state(body: &[u8]) -> Result<Packet, ProtocolError> {
    let name = PacketKind::ServerState.name();
    if body.len() < STATE_HEADER {
        return Err(ProtocolError::Malformed {
            name,
            reason: format!("body of {} bytes is shorter than the {STATE_HEADER}-byte header", body.len()),
        });
    }
    let (header, rest) = body.split_at(STATE_HEADER);
    let (generation, flags) = header.split_at(8);
    let generation = u64::from_le_bytes(array(name, generation)?);
    let flags = flags.first().copied().unwrap_or_default();
    let cells = read_cells(name, rest)?;
    Ok(Packet::ServerState(StateSnapshot {
        generation,
        flags,
        cells,
    }))
}

/// Encode `server-state`.
pub fn encode_server_state(packet: &Packet, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let Packet::ServerState(snapshot) = packet else {
        return Err(mismatch(PacketKind::ServerState, packet));
    };
    out.reserve(
        snapshot
            .cells
            .len()
            .saturating_mul(CELL_SIZE)
            .saturating_add(STATE_HEADER),
    );
    out.extend_from_slice(&snapshot.generation.to_le_bytes());
    out.push(snapshot.flags);
    write_cells(out, &snapshot.cells);
    Ok(())
}

// ---------------------------------------------------------------------------
// server-error
// ---------------------------------------------------------------------------

/// Decode `server-error`. Invalid UTF-8 is replaced, never rejected.
pub fn decode_server_error(body: &[u8]) -> Result<Packet, ProtocolError> {
    Ok(Packet::ServerError(ErrorMessage {
        message: String::from_utf8_lossy(body).into_owned(),
    }))
}

/// Encode `server-error`.
pub fn encode_server_error(packet: &Packet, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let Packet::ServerError(error) = packet else {
        return Err(mismatch(PacketKind::ServerError, packet));
    };
    out.extend_from_slice(error.message.as_bytes());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_cells(name: &'static str, bytes: &[u8]) -> Result<Vec<Cell>, ProtocolError> {
    let chunks = bytes.chunks_exact(CELL_SIZE);
    if !chunks.remainder().is_empty() {
        return Err(ProtocolError::Malformed {
            name,
            reason: format!(
                "cell data of {} bytes is not a multiple of {CELL_SIZE}",
                bytes.len()
            ),
        });
    }
    chunks
        .map(|chunk| {
            let (x, y) = chunk.split_at(4);
            Ok(Cell::new(
                u32::from_le_bytes(array(name, x)?),
                u32::from_le_bytes(array(name, y)?),
            ))
        })
        .collect()
}

fn write_cells(out: &mut Vec<u8>, cells: &[Cell]) {
    for cell in cells {
        out.extend_from_slice(&cell.x.to_le_bytes());
        out.extend_from_slice(&cell.y.to_le_bytes());
    }
}

fn array<const N: usize>(name: &'static str, bytes: &[u8]) -> Result<[u8; N], ProtocolError> {
    bytes.try_into().map_err(|_err| ProtocolError::Malformed {
        name,
        reason: format!("expected {N} bytes, found {}", bytes.len()),
    })
}

fn expect_kind(expected: PacketKind, packet: &Packet) -> Result<(), ProtocolError> {
    if packet.kind() == expected {
        Ok(())
    } else {
        Err(mismatch(expected, packet))
    }
}

const fn mismatch(expected: PacketKind, packet: &Packet) -> ProtocolError {
    ProtocolError::KindMismatch {
        expected: expected.name(),
        found: packet.kind().name(),
    }
}
