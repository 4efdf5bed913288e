//! Row-major boolean grid.
//!
//! The grid is `height` rows of `width` columns. Storage is a single flat
//! vector indexed `y * width + x`, so every row has exactly `width` cells by
//! construction and the shape invariant cannot be violated after creation.

use lattice_types::Cell;

use crate::error::GridError;

/// A rectangular grid of alive/dead cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl Grid {
    /// Create an all-dead grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TooLarge`] if `width * height` does not fit in
    /// `usize`.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        let len = cell_count(width, height).ok_or(GridError::TooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            cells: vec![false; len],
        })
    }

    /// Build a grid from explicit rows, checking them against the declared
    /// dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if there are not exactly `height`
    /// rows or any row is not exactly `width` cells long.
    pub fn from_rows(width: u32, height: u32, rows: &[Vec<bool>]) -> Result<Self, GridError> {
        let mismatch = |reason: String| GridError::ShapeMismatch {
            expected_rows: height,
            expected_columns: width,
            reason,
        };

        if u32::try_from(rows.len()).ok() != Some(height) {
            return Err(mismatch(format!("got {} rows", rows.len())));
        }
        let mut grid = Self::new(width, height)?;
        let mut offset = 0_usize;
        for (y, row) in rows.iter().enumerate() {
            if u32::try_from(row.len()).ok() != Some(width) {
                return Err(mismatch(format!("row {y} has {} cells", row.len())));
            }
            let end = offset.saturating_add(row.len());
            if let Some(dest) = grid.cells.get_mut(offset..end) {
                dest.copy_from_slice(row);
            }
            offset = end;
        }
        Ok(grid)
    }

    /// Build a grid with the given cells alive. Duplicates are harmless.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] for the first coordinate outside
    /// the grid; nothing is returned in that case.
    pub fn from_cells<I>(width: u32, height: u32, cells: I) -> Result<Self, GridError>
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut grid = Self::new(width, height)?;
        for cell in cells {
            grid.set(cell, true)?;
        }
        Ok(grid)
    }

    /// Grid width (number of columns).
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height (number of rows).
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the grid has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether the cell at `(x, y)` is alive. Coordinates outside the grid
    /// read as dead.
    pub fn is_alive(&self, x: u32, y: u32) -> bool {
        self.index(x, y)
            .and_then(|i| self.cells.get(i).copied())
            .unwrap_or(false)
    }

    /// Set a single cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if the coordinate is outside the
    /// grid.
    pub fn set(&mut self, cell: Cell, alive: bool) -> Result<(), GridError> {
        let slot = self
            .index(cell.x, cell.y)
            .and_then(|i| self.cells.get_mut(i))
            .ok_or(GridError::OutOfBounds {
                cell,
                width: self.width,
                height: self.height,
            })?;
        *slot = alive;
        Ok(())
    }

    /// Number of alive cells.
    pub fn alive_count(&self) -> u64 {
        self.cells
            .iter()
            .fold(0_u64, |acc, &alive| if alive { acc.saturating_add(1) } else { acc })
    }

    /// Alive cells in row-major order (row by row, left to right).
    pub fn alive_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let width = self.width;
        (0..self.height).flat_map(move |y| {
            (0..width).filter_map(move |x| self.is_alive(x, y).then_some(Cell::new(x, y)))
        })
    }

    /// Copy the grid out as `height` rows of `width` cells.
    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        let width = usize::try_from(self.width).unwrap_or(usize::MAX);
        if width == 0 {
            return (0..self.height).map(|_| Vec::new()).collect();
        }
        self.cells.chunks(width).map(<[bool]>::to_vec).collect()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        let width = usize::try_from(self.width).ok()?;
        y.checked_mul(width)?.checked_add(x)
    }
}

fn cell_count(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)
}
