//! The generation step.
//!
//! Rule (B3/S23): a live cell with 2 or 3 live neighbours survives, any
//! other live cell dies; a dead cell with exactly 3 live neighbours is born.
//! Neighbourhoods are 8-connected and do not wrap: cells beyond the border
//! count as dead.
//!
//! # Change signal
//!
//! A step reports how many cells were born and how many died. The world
//! treats a step with neither as "no change" and stops advancing. Because a
//! cell can only differ between two generations by being born or by dying,
//! this is exactly the same as comparing the two grids cell by cell: a still
//! life stops on its first idle tick, an oscillator never stops.

use crate::grid::Grid;

/// Result of advancing a grid by one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The next generation. Always a new buffer.
    pub grid: Grid,
    /// Dead cells that came alive.
    pub births: u64,
    /// Live cells that died.
    pub deaths: u64,
    /// Alive cells in the new grid.
    pub alive: u64,
}

impl Step {
    /// Whether any cell changed state.
    pub const fn changed(&self) -> bool {
        self.births > 0 || self.deaths > 0
    }
}

/// Compute the next generation of `grid`.
///
/// Every neighbour count reads the previous grid only. Runs in
/// `O(width * height)`.
pub fn next_generation(grid: &Grid) -> Step {
    let width = grid.width();
    let height = grid.height();
    let mut next = grid.clone();
    let mut births = 0_u64;
    let mut deaths = 0_u64;
    let mut alive = 0_u64;

    for y in 0..height {
        for x in 0..width {
            let neighbours = live_neighbours(grid, x, y);
            let was_alive = grid.is_alive(x, y);
            let is_alive = matches!((was_alive, neighbours), (true, 2 | 3) | (false, 3));

            match (was_alive, is_alive) {
                (true, false) => deaths = deaths.saturating_add(1),
                (false, true) => births = births.saturating_add(1),
                _ => {}
            }
            if is_alive {
                alive = alive.saturating_add(1);
            }
            if was_alive != is_alive {
                // (x, y) is inside the grid by construction of the loop.
                let _ = next.set(lattice_types::Cell::new(x, y), is_alive);
            }
        }
    }

    Step {
        grid: next,
        births,
        deaths,
        alive,
    }
}

/// Count live cells among the up to eight neighbours of `(x, y)`.
fn live_neighbours(grid: &Grid, x: u32, y: u32) -> u8 {
    let mut count = 0_u8;
    for dy in [-1_i8, 0, 1] {
        for dx in [-1_i8, 0, 1] {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (Some(nx), Some(ny)) = (offset(x, dx), offset(y, dy)) else {
                continue;
            };
            if grid.is_alive(nx, ny) {
                count = count.saturating_add(1);
            }
        }
    }
    count
}

fn offset(value: u32, delta: i8) -> Option<u32> {
    match delta {
        -1 => value.checked_sub(1),
        1 => value.checked_add(1),
        _ => Some(value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lattice_types::Cell;

    use super::*;

    fn grid(width: u32, height: u32, cells: &[(u32, u32)]) -> Grid {
        Grid::from_cells(width, height, cells.iter().copied().map(Cell::from)).unwrap()
    }

    fn alive(grid: &Grid) -> Vec<(u32, u32)> {
        grid.alive_cells().map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn vertical_blinker_turns_horizontal_and_back() {
        let start = grid(3, 3, &[(1, 0), (1, 1), (1, 2)]);

        let first = next_generation(&start);
        assert_eq!(alive(&first.grid), vec![(0, 1), (1, 1), (2, 1)]);
        assert!(first.changed());
        assert_eq!(first.births, 2);
        assert_eq!(first.deaths, 2);
        assert_eq!(first.alive, 3);

        let second = next_generation(&first.grid);
        assert_eq!(second.grid, start);
        assert!(second.changed());
    }

    #[test]
    fn block_is_a_still_life() {
        let block = grid(4, 4, &[(1, 1), (2, 1), (1, 2), (2, 2)]);
        let step = next_generation(&block);
        assert_eq!(step.grid, block);
        assert!(!step.changed());
        assert_eq!(step.alive, 4);
    }

    #[test]
    fn lonely_cell_dies() {
        let step = next_generation(&grid(3, 3, &[(1, 1)]));
        assert_eq!(step.alive, 0);
        assert_eq!(step.deaths, 1);
    }

    #[test]
    fn crowded_cell_dies() {
        // Centre has four neighbours.
        let start = grid(3, 3, &[(1, 1), (0, 0), (2, 0), (0, 2), (2, 2)]);
        let step = next_generation(&start);
        assert!(!step.grid.is_alive(1, 1));
    }

    #[test]
    fn dead_cell_with_three_neighbours_is_born() {
        let step = next_generation(&grid(3, 3, &[(0, 0), (2, 0), (0, 2)]));
        assert!(step.grid.is_alive(1, 1));
    }

    #[test]
    fn borders_do_not_wrap() {
        // With wraparound (3, 3) would see all three of these as neighbours.
        let start = grid(4, 4, &[(0, 0), (3, 0), (0, 3)]);
        let step = next_generation(&start);
        assert!(!step.grid.is_alive(3, 3));
        assert_eq!(step.alive, 0);
    }

    #[test]
    fn input_grid_is_never_mutated() {
        let start = grid(5, 5, &[(1, 2), (2, 2), (3, 2), (0, 0)]);
        let frozen = start.clone();
        let a = next_generation(&start);
        let b = next_generation(&start);
        assert_eq!(start, frozen);
        assert_eq!(a, b);
    }

    #[test]
    fn changed_matches_grid_inequality() {
        let samples = [
            grid(3, 3, &[(1, 0), (1, 1), (1, 2)]),
            grid(4, 4, &[(1, 1), (2, 1), (1, 2), (2, 2)]),
            grid(6, 6, &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]),
            grid(2, 2, &[]),
            grid(1, 1, &[(0, 0)]),
        ];
        for start in &samples {
            let step = next_generation(start);
            assert_eq!(step.changed(), step.grid != *start);
            assert_eq!(step.alive, step.grid.alive_count());
        }
    }

    #[test]
    fn empty_grid_steps_to_empty_grid() {
        let step = next_generation(&Grid::new(0, 0).unwrap());
        assert!(!step.changed());
        assert_eq!(step.alive, 0);
    }
}
