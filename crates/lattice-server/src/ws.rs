//! `WebSocket` routing to world dispatchers.
//!
//! Clients connect to `GET /world/{id}`. The id is resolved against the
//! registry before the upgrade is accepted: an unparsable or unknown id is
//! answered with a plain 404, so no handshake completes and no frame is
//! ever exchanged.
//!
//! An accepted connection is split in two. The writer task drains the
//! connection's outbound queue into the socket; the reader loop hands every
//! binary frame to the world. When the client goes away the connection is
//! detached without a second close, and the writer is given a short grace
//! period to flush the close handshake before it is cancelled.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use lattice_core::{ClientConnection, Outbound, World};
use lattice_types::WorldId;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// How long the writer may take to flush after the reader stops.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Route a connection to the world named in the path.
///
/// # Route
///
/// `GET /world/{id}`
pub async fn world_socket(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(world) = id
        .parse::<WorldId>()
        .ok()
        .and_then(|id| state.registry.find_by_id(id))
    else {
        debug!(world_id = %id, "rejecting connection to unknown world");
        return ApiError::NotFound(format!("no world with id {id}")).into_response();
    };

    match upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| serve_connection(socket, world)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Run one connection until either side closes it.
async fn serve_connection(socket: WebSocket, world: Arc<World>) {
    let (connection, outbound) = ClientConnection::channel();
    let connection_id = connection.id();
    world.dispatcher().attach(connection.clone());
    debug!(world_id = %world.id(), %connection_id, "client connected");

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, outbound));

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(frame)) => {
                let _ = world.handle_frame(&frame, &connection);
            }
            Ok(Message::Text(_)) => {
                debug!(%connection_id, "ignoring text frame");
            }
            Ok(Message::Close(_)) => break,
            // Pings are answered by the socket itself.
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(%connection_id, error = %e, "websocket error");
                break;
            }
        }
    }

    // The transport is already closing; do not close it again. Dropping the
    // last sender ends the writer's queue so it can flush and finish.
    let _ = world.dispatcher().detach(connection_id, false);
    drop(connection);
    let abort = writer.abort_handle();
    if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
        abort.abort();
        debug!(%connection_id, "writer did not finish in time");
    }
    debug!(world_id = %world.id(), %connection_id, "client disconnected");
}

/// Drain a connection's queue into its socket, then close the sink.
///
/// Closing flushes anything the socket queued on its own, such as the reply
/// to a close frame the client sent.
async fn write_outbound<S>(mut sink: S, mut outbound: Receiver<Outbound>)
where
    S: futures::Sink<Message> + Unpin,
    S::Error: core::fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Frame(frame) => {
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    warn!(error = %e, "websocket write failed");
                    return;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
        }
    }
    let _ = sink.close().await;
}
