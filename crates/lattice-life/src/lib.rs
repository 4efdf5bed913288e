//! Simulation engine for Lattice worlds.
//!
//! A world's state is a rectangular [`Grid`] of alive/dead cells. The
//! [`next_generation`] step applies the standard two-state rule (B3/S23,
//! 8-connected, no wraparound) and always produces a fresh grid; the input
//! is only ever read.
//!
//! # Modules
//!
//! - [`grid`] -- Row-major boolean grid with bounds-checked access
//! - [`generation`] -- The generation step and its change statistics
//! - [`error`] -- Error types for grid construction and mutation

pub mod error;
pub mod generation;
pub mod grid;

pub use error::GridError;
pub use generation::{Step, next_generation};
pub use grid::Grid;
