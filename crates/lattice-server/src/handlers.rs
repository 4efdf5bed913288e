//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/world` | List every world in creation order |
//! | `POST` | `/world` | Create a world from `{ name, x, y, start? }` |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use lattice_types::{WorldDescriptor, WorldId, WorldSummary};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /world`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorldRequest {
    /// Display name, at least one character.
    #[validate(length(min = 1))]
    pub name: String,
    /// Grid width.
    #[validate(range(min = 1, max = 4_294_967_295_u64))]
    pub x: u64,
    /// Grid height.
    #[validate(range(min = 1, max = 4_294_967_295_u64))]
    pub y: u64,
    /// Whether the world starts running immediately.
    #[serde(default)]
    pub start: bool,
}

/// Body of `GET /world`.
#[derive(Debug, Serialize)]
pub struct WorldList {
    /// Always `true`.
    pub ok: bool,
    /// One entry per world.
    pub items: Vec<WorldSummary>,
}

/// Body of a successful `POST /world`.
#[derive(Debug, Serialize)]
pub struct WorldCreated {
    /// Always `true`.
    pub ok: bool,
    /// Identifier of the new world.
    pub id: WorldId,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// List worlds.
pub async fn list_worlds(State(state): State<Arc<AppState>>) -> Json<WorldList> {
    Json(WorldList {
        ok: true,
        items: state.registry.summaries(),
    })
}

/// Create and register a world.
///
/// The world is built through descriptor restoration, so a request with
/// `start: true` yields a running world.
pub async fn create_world(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateWorldRequest>, JsonRejection>,
) -> Result<Json<WorldCreated>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    request.validate()?;

    let width = u32::try_from(request.x).map_err(|e| ApiError::BadRequest(format!("x: {e}")))?;
    let height = u32::try_from(request.y).map_err(|e| ApiError::BadRequest(format!("y: {e}")))?;
    if !state.limits.allows(width, height) {
        return Err(ApiError::BadRequest(format!(
            "a {width}x{height} world exceeds the limit of {} cells",
            state.limits.max_world_cells
        )));
    }

    let descriptor = WorldDescriptor::new(request.name, width, height).running(request.start);
    let world = state.registry.create(descriptor);
    Ok(Json(WorldCreated {
        ok: true,
        id: world.id(),
    }))
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: axum::http::Uri) -> ApiError {
    debug!(%uri, "no route");
    ApiError::NotFound(String::from("Not Found"))
}
