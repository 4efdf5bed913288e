//! Axum router construction.
//!
//! Assembles the REST and `WebSocket` routes into a single [`Router`] with
//! permissive CORS and HTTP access logging.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /world` -- list worlds
/// - `POST /world` -- create a world
/// - `GET /world/{id}` -- `WebSocket` connection to one world
///
/// Any other path answers 404 with the JSON error body.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/world", get(handlers::list_worlds).post(handlers::create_world))
        .route("/world/{id}", get(ws::world_socket))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
