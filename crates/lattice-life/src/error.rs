//! Error types for the `lattice-life` crate.

use lattice_types::Cell;

/// Errors that can occur while building or mutating a [`Grid`](crate::Grid).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A coordinate lies outside the grid.
    #[error("cell ({}, {}) is outside the {width}x{height} grid", cell.x, cell.y)]
    OutOfBounds {
        /// The rejected coordinate.
        cell: Cell,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// Row data does not match the declared dimensions.
    #[error("grid shape mismatch: expected {expected_rows} rows of {expected_columns}, {reason}")]
    ShapeMismatch {
        /// Declared row count.
        expected_rows: u32,
        /// Declared column count.
        expected_columns: u32,
        /// What differed.
        reason: String,
    },

    /// The cell count does not fit in memory addressing on this platform.
    #[error("grid of {width}x{height} cells is too large")]
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}
