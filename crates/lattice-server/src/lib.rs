//! HTTP server for the Lattice world simulations.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/world/{id}`) that binds a connection to one
//!   world's dispatcher and carries the binary packet protocol
//! - **REST endpoints** (`GET /world`, `POST /world`) for listing and
//!   creating worlds
//!
//! # Architecture
//!
//! Handlers only see the [`WorldRegistry`](lattice_core::WorldRegistry)
//! through [`AppState`]: listings are built from world summaries and
//! creation goes through descriptor restoration, so nothing here reaches
//! into a world's grid. Each `WebSocket` connection runs a reader loop that
//! feeds frames to the world and a writer task that drains the
//! connection's outbound queue.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, bind, serve};
pub use state::AppState;
