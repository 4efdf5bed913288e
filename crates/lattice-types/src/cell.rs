//! Grid coordinates.

use serde::{Deserialize, Serialize};

/// A cell coordinate: `x` is the column, `y` the row.
///
/// On the wire each coordinate is a little-endian `u32`, so the same type is
/// used by the simulation engine and the packet codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl Cell {
    /// Create a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for Cell {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}
