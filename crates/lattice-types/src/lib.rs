//! Shared type definitions for the Lattice server.
//!
//! Every crate in the workspace speaks in these types: the simulation
//! engine addresses cells with [`Cell`], the protocol carries batches of
//! them, and the REST layer exchanges [`WorldDescriptor`] and
//! [`WorldSummary`] values with the world registry.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for world identifiers
//! - [`cell`] -- Grid coordinate type
//! - [`world`] -- Restoration descriptor and read-only summary of a world

pub mod cell;
pub mod ids;
pub mod world;

pub use cell::Cell;
pub use ids::{ParseIdError, WorldId};
pub use world::{WorldDescriptor, WorldSummary};
