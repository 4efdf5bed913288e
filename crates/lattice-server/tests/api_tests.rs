//! Integration tests for the HTTP server.
//!
//! REST and routing tests drive the `Router` directly via
//! `tower::ServiceExt` without starting a TCP server. The `WebSocket` tests
//! bind an ephemeral port and speak the binary protocol through
//! `tokio-tungstenite`.

#![allow(clippy::unwrap_used, clippy::unreachable)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, Stream, StreamExt};
use lattice_core::config::LimitsConfig;
use lattice_core::WorldRegistry;
use lattice_protocol::{CellBatch, Packet, PacketRegistry, StateSnapshot};
use lattice_server::router::build_router;
use lattice_server::state::AppState;
use lattice_types::{Cell, WorldDescriptor, WorldId};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::{self, Message};
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let registry = Arc::new(WorldRegistry::new(Arc::new(PacketRegistry::standard())));
    Arc::new(AppState::new(registry, LimitsConfig::default()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_world(state: &Arc<AppState>, body: &Value) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(
            Request::post("/world")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn get_json(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(Arc::clone(state))
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// REST
// =========================================================================

#[tokio::test]
async fn test_list_worlds_empty() {
    let state = make_test_state();
    let (status, json) = get_json(&state, "/world").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "ok": true, "items": [] }));
}

#[tokio::test]
async fn test_create_then_list() {
    let state = make_test_state();
    let (status, created) = post_world(&state, &json!({ "name": "glider", "x": 8, "y": 6 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["ok"], true);
    let id: WorldId = created["id"].as_str().unwrap().parse().unwrap();

    let (status, json) = get_json(&state, "/world").await;
    assert_eq!(status, StatusCode::OK);
    let item = &json["items"][0];
    assert_eq!(item["id"], id.to_string());
    assert_eq!(item["name"], "glider");
    assert_eq!(item["x"], 8);
    assert_eq!(item["y"], 6);
    assert_eq!(item["epoch"], "0");
    assert_eq!(item["isRunning"], false);

    let world = state.registry.find_by_id(id).unwrap();
    assert_eq!((world.width(), world.height()), (8, 6));
}

#[tokio::test]
async fn test_create_with_start_runs() {
    let state = make_test_state();
    let (_, created) = post_world(&state, &json!({ "name": "live", "x": 3, "y": 3, "start": true })).await;
    let id: WorldId = created["id"].as_str().unwrap().parse().unwrap();
    assert!(state.registry.find_by_id(id).unwrap().is_running());
}

#[tokio::test]
async fn test_list_keeps_creation_order() {
    let state = make_test_state();
    for name in ["one", "two", "three"] {
        let _ = post_world(&state, &json!({ "name": name, "x": 1, "y": 1 })).await;
    }
    let (_, json) = get_json(&state, "/world").await;
    let names: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_create_rejects_invalid_bodies() {
    let state = make_test_state();
    let bodies = [
        json!({ "name": "", "x": 1, "y": 1 }),
        json!({ "name": "a", "x": 0, "y": 1 }),
        json!({ "name": "a", "x": 1, "y": 4_294_967_296_u64 }),
        json!({ "name": "a", "x": 1.5, "y": 1 }),
        json!({ "name": "a", "x": -1, "y": 1 }),
        json!({ "name": "a", "x": 1 }),
        json!({ "x": 1, "y": 1 }),
    ];
    for body in &bodies {
        let (status, json) = post_world(&state, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json["ok"], false);
        assert_eq!(json["code"], 400);
        assert_eq!(json["message"], "Bad Request");
        assert!(json["error"].is_string());
    }
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_create_enforces_cell_limit() {
    let registry = Arc::new(WorldRegistry::new(Arc::new(PacketRegistry::standard())));
    let state = Arc::new(AppState::new(registry, LimitsConfig { max_world_cells: 100 }));

    let (status, json) = post_world(&state, &json!({ "name": "big", "x": 11, "y": 10 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("limit"));

    let (status, _) = post_world(&state, &json!({ "name": "ok", "x": 10, "y": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_validation_errors_list_issues() {
    let state = make_test_state();
    let (_, json) = post_world(&state, &json!({ "name": "", "x": 0, "y": 1 })).await;
    assert_eq!(json["error"], "Validation failed");
    assert!(json["issues"]["name"].is_array());
    assert!(json["issues"]["x"].is_array());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let state = make_test_state();
    let (status, json) = get_json(&state, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["ok"], false);
    assert_eq!(json["code"], 404);
    assert_eq!(json["message"], "Not Found");
}

// =========================================================================
// WebSocket routing
// =========================================================================

#[tokio::test]
async fn test_socket_to_unknown_world_is_rejected() {
    let state = make_test_state();
    let _ = state.registry.create(WorldDescriptor::new("real", 2, 2));

    for uri in [format!("/world/{}", WorldId::new()), String::from("/world/not-a-uuid")] {
        let response = build_router(Arc::clone(&state))
            .oneshot(
                Request::get(uri.as_str())
                    .header("connection", "upgrade")
                    .header("upgrade", "websocket")
                    .header("sec-websocket-version", "13")
                    .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_socket_to_known_world_requires_upgrade() {
    let state = make_test_state();
    let world = state.registry.create(WorldDescriptor::new("real", 2, 2));

    let response = build_router(Arc::clone(&state))
        .oneshot(
            Request::get(format!("/world/{}", world.id()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.status().is_client_error());
}

// =========================================================================
// End to end
// =========================================================================

struct TestServer {
    addr: std::net::SocketAddr,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let state = make_test_state();
        let listener = lattice_server::bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let serve_state = Arc::clone(&state);
        tokio::spawn(async move {
            let _ = lattice_server::serve(listener, serve_state, async move {
                let _ = rx.await;
            })
            .await;
        });
        Self {
            addr,
            state,
            shutdown: Some(tx),
        }
    }

    fn url(&self, id: WorldId) -> String {
        format!("ws://{}/world/{id}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn next_packet<S>(socket: &mut S, registry: &PacketRegistry) -> Packet
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Binary(frame) = message {
            return registry.decode(&frame).unwrap();
        }
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(condition(), "condition not reached in time");
}

#[tokio::test]
async fn test_websocket_session() {
    let server = TestServer::start().await;
    let packets = PacketRegistry::standard();
    let world = server.state.registry.create(WorldDescriptor::new("blinker", 3, 3));

    let (mut socket, _) = tokio_tungstenite::connect_async(server.url(world.id())).await.unwrap();

    // Seed a vertical blinker.
    let seed = vec![Cell::new(1, 0), Cell::new(1, 1), Cell::new(1, 2)];
    let frame = packets
        .encode(&Packet::ClientSetCells(CellBatch {
            flags: 0,
            cells: seed.clone(),
        }))
        .unwrap();
    socket.send(Message::binary(frame)).await.unwrap();
    assert_eq!(
        next_packet(&mut socket, &packets).await,
        Packet::ServerState(StateSnapshot {
            generation: 0,
            flags: 0,
            cells: seed,
        })
    );

    socket.send(Message::binary(vec![0x01, 0x00])).await.unwrap();
    assert_eq!(next_packet(&mut socket, &packets).await, Packet::ServerStarted);

    let _ = world.advance().unwrap();
    assert_eq!(
        next_packet(&mut socket, &packets).await,
        Packet::ServerState(StateSnapshot {
            generation: 1,
            flags: 0,
            cells: vec![Cell::new(0, 1), Cell::new(1, 1), Cell::new(2, 1)],
        })
    );

    // Seeding while running is refused with the historical error frame.
    socket
        .send(Message::binary(vec![0x02, 0x00, 0x00]))
        .await
        .unwrap();
    let reply = loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Binary(frame) = message {
            break frame;
        }
    };
    assert_eq!(reply.get(..2), Some(&[0x88, 0xff][..]));
    assert_eq!(
        packets.decode(&reply).unwrap(),
        Packet::error("Simulation is running. Unable to process request")
    );
    assert_eq!(world.generation(), 1);

    // Garbage and text frames are dropped without closing the connection.
    socket.send(Message::binary(vec![0x42, 0x42, 0x00])).await.unwrap();
    socket.send(Message::text("hello")).await.unwrap();
    socket.send(Message::binary(vec![0x00, 0x00])).await.unwrap();
    assert_eq!(next_packet(&mut socket, &packets).await, Packet::ServerStopped);
    assert!(!world.is_running());

    socket.close(None).await.unwrap();
    wait_until(|| world.dispatcher().client_count() == 0).await;
}

#[tokio::test]
async fn test_broadcast_reaches_every_client_of_a_world_only() {
    let server = TestServer::start().await;
    let packets = PacketRegistry::standard();
    let world = server.state.registry.create(WorldDescriptor::new("a", 2, 2));
    let other = server.state.registry.create(WorldDescriptor::new("b", 2, 2));

    let (mut first, _) = tokio_tungstenite::connect_async(server.url(world.id())).await.unwrap();
    let (mut second, _) = tokio_tungstenite::connect_async(server.url(world.id())).await.unwrap();
    let (mut bystander, _) = tokio_tungstenite::connect_async(server.url(other.id())).await.unwrap();
    wait_until(|| world.dispatcher().client_count() == 2 && other.dispatcher().client_count() == 1).await;

    first.send(Message::binary(vec![0x01, 0x00])).await.unwrap();
    assert_eq!(next_packet(&mut first, &packets).await, Packet::ServerStarted);
    assert_eq!(next_packet(&mut second, &packets).await, Packet::ServerStarted);

    let quiet = tokio::time::timeout(Duration::from_millis(100), bystander.next()).await;
    assert!(quiet.is_err(), "a client of another world received a frame");
}

#[tokio::test]
async fn test_client_close_gets_a_close_reply() {
    let server = TestServer::start().await;
    let world = server.state.registry.create(WorldDescriptor::new("w", 2, 2));
    let (mut socket, _) = tokio_tungstenite::connect_async(server.url(world.id())).await.unwrap();
    wait_until(|| world.dispatcher().client_count() == 1).await;

    socket.send(Message::Close(None)).await.unwrap();

    // A clean handshake yields the server's close frame, then the end of
    // the stream; a dropped transport would surface as an error instead.
    let mut saw_close = false;
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap();
        match next {
            Some(Ok(Message::Close(_))) => saw_close = true,
            Some(Ok(_)) => {}
            Some(Err(e)) => unreachable!("connection dropped without a close reply: {e}"),
            None => break,
        }
    }
    assert!(saw_close);
    wait_until(|| world.dispatcher().client_count() == 0).await;
}

#[tokio::test]
async fn test_websocket_to_unknown_world_fails_handshake() {
    let server = TestServer::start().await;
    let result = tokio_tungstenite::connect_async(server.url(WorldId::new())).await;
    let Err(tungstenite::Error::Http(response)) = result else {
        unreachable!("expected an HTTP rejection");
    };
    assert_eq!(response.status().as_u16(), StatusCode::NOT_FOUND.as_u16());
}
