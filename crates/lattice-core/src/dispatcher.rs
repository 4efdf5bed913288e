//! Per-world publish/subscribe over packets.
//!
//! The [`Dispatcher`] keeps the set of attached connections and a typed
//! table of subscribers keyed by [`PacketKind`]. Inbound frames are decoded
//! through the shared [`PacketRegistry`] and handed to every subscriber of
//! the packet's kind; outbound packets are encoded once and written to each
//! connection.
//!
//! # Fault isolation
//!
//! Nothing a client sends can make the dispatcher fail:
//!
//! - unknown codes and malformed bodies are logged and the frame dropped
//! - a handler that returns an error or panics is logged and the remaining
//!   handlers still run
//! - a failed write to one connection does not stop the broadcast, and
//!   the dead connection is pruned
//! - a connection whose queue is full misses the frame but stays attached
//!
//! Locks are never held while handlers run, so handlers may subscribe,
//! broadcast or reply freely.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use lattice_protocol::{Packet, PacketKind, PacketRegistry, ProtocolError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::connection::{ClientConnection, ConnectionId};
use crate::error::{DispatchError, HandlerError};
use crate::lock;

/// A packet handler: receives the decoded packet and the sender.
pub type Handler = Arc<dyn Fn(&Packet, &ClientConnection) -> Result<(), HandlerError> + Send + Sync>;

/// Identifies one subscription so it can be removed with
/// [`Dispatcher::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A packet together with the connection it arrived on.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// The decoded packet.
    pub packet: Packet,
    /// The sending connection.
    pub connection: ClientConnection,
}

struct Subscription {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

/// Publish/subscribe mediator for one world.
pub struct Dispatcher {
    packets: Arc<PacketRegistry>,
    clients: Mutex<Vec<ClientConnection>>,
    subscriptions: Mutex<HashMap<PacketKind, Vec<Subscription>>>,
    waiters: Mutex<HashMap<PacketKind, Vec<oneshot::Sender<Inbound>>>>,
    next_subscription: AtomicU64,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("clients", &self.client_count())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher that frames packets with `packets`.
    pub fn new(packets: Arc<PacketRegistry>) -> Self {
        Self {
            packets,
            clients: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// The packet registry used for framing.
    pub fn packets(&self) -> &PacketRegistry {
        &self.packets
    }

    // -------------------------------------------------------------------
    // Connections
    // -------------------------------------------------------------------

    /// Add a connection to the broadcast set.
    pub fn attach(&self, connection: ClientConnection) {
        debug!(connection_id = %connection.id(), "connection attached");
        lock(&self.clients).push(connection);
    }

    /// Remove a connection, optionally asking its writer to close it.
    ///
    /// Transport close events detach with `force_close = false`; the socket
    /// is already closing and must not be closed twice. Returns whether the
    /// connection was attached.
    pub fn detach(&self, id: ConnectionId, force_close: bool) -> bool {
        let removed = {
            let mut clients = lock(&self.clients);
            clients
                .iter()
                .position(|c| c.id() == id)
                .map(|index| clients.remove(index))
        };
        match removed {
            Some(connection) => {
                if force_close {
                    connection.close();
                }
                debug!(connection_id = %id, force_close, "connection detached");
                true
            }
            None => false,
        }
    }

    /// Number of attached connections.
    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    // -------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------

    /// Encode `packet` once and write it to every attached connection.
    ///
    /// Returns how many connections accepted the frame. Connections whose
    /// writer is gone are skipped and pruned; connections that are not
    /// draining their queue skip this frame only.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Protocol`] if the packet cannot be encoded;
    /// nothing is sent in that case.
    pub fn broadcast(&self, packet: &Packet) -> Result<usize, DispatchError> {
        let frame = Bytes::from(self.packets.encode(packet)?);
        let clients: Vec<ClientConnection> = lock(&self.clients).clone();

        let mut delivered = 0_usize;
        let mut dead = Vec::new();
        for client in &clients {
            match client.send(frame.clone()) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e @ DispatchError::Lagging(_)) => {
                    debug!(connection_id = %client.id(), error = %e, packet = %packet.kind(), "dropping frame for lagging connection");
                }
                Err(e) => {
                    debug!(connection_id = %client.id(), error = %e, packet = %packet.kind(), "broadcast write failed");
                    dead.push(client.id());
                }
            }
        }

        if !dead.is_empty() {
            lock(&self.clients).retain(|c| !dead.contains(&c.id()));
        }
        Ok(delivered)
    }

    /// Encode `packet` and write it to one connection only.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Protocol`] if encoding fails or
    /// [`DispatchError::Closed`] if the connection is gone.
    pub fn send_to(&self, connection: &ClientConnection, packet: &Packet) -> Result<(), DispatchError> {
        let frame = Bytes::from(self.packets.encode(packet)?);
        connection.send(frame)
    }

    // -------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------

    /// Decode a raw frame from `from` and dispatch it.
    ///
    /// Frames that cannot be decoded are logged and dropped. Returns the
    /// number of handlers invoked.
    pub fn handle_frame(&self, frame: &[u8], from: &ClientConnection) -> usize {
        match self.packets.decode(frame) {
            Ok(packet) => self.dispatch(&packet, from),
            Err(ProtocolError::UnknownCode(code)) => {
                warn!(
                    connection_id = %from.id(),
                    code = format_args!("0x{code:04x}"),
                    "received unknown packet, dropping"
                );
                0
            }
            Err(e) => {
                warn!(connection_id = %from.id(), error = %e, "received malformed packet, dropping");
                0
            }
        }
    }

    /// Hand a decoded packet to every subscriber of its kind and resolve
    /// pending waiters. Returns the number of handlers invoked.
    pub fn dispatch(&self, packet: &Packet, from: &ClientConnection) -> usize {
        let kind = packet.kind();
        let handlers: Vec<Handler> = {
            let mut subscriptions = lock(&self.subscriptions);
            subscriptions.get_mut(&kind).map_or_else(Vec::new, |list| {
                let handlers = list.iter().map(|s| Arc::clone(&s.handler)).collect();
                list.retain(|s| !s.once);
                handlers
            })
        };

        for handler in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(packet, from))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(packet = %kind, connection_id = %from.id(), error = %e, "packet handler failed");
                }
                Err(_panic) => {
                    warn!(packet = %kind, connection_id = %from.id(), "packet handler panicked");
                }
            }
        }

        let waiters = lock(&self.waiters).remove(&kind).unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(Inbound {
                packet: packet.clone(),
                connection: from.clone(),
            });
        }

        handlers.len()
    }

    // -------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------

    /// Subscribe `handler` to every packet of `kind`.
    pub fn on(&self, kind: PacketKind, handler: Handler) -> SubscriptionId {
        self.subscribe(kind, handler, false)
    }

    /// Subscribe `handler` to the next packet of `kind` only.
    pub fn once(&self, kind: PacketKind, handler: Handler) -> SubscriptionId {
        self.subscribe(kind, handler, true)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn off(&self, kind: PacketKind, id: SubscriptionId) -> bool {
        let mut subscriptions = lock(&self.subscriptions);
        let Some(list) = subscriptions.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        list.len() != before
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: PacketKind) -> usize {
        lock(&self.subscriptions).get(&kind).map_or(0, Vec::len)
    }

    /// Resolve with the next packet of `kind` and its sender.
    ///
    /// The waiter is registered immediately, before the returned future is
    /// first polled, so a packet dispatched in between is not missed.
    pub fn wait_for(&self, kind: PacketKind) -> PacketWaiter {
        let (tx, rx) = oneshot::channel();
        lock(&self.waiters).entry(kind).or_default().push(tx);
        PacketWaiter { rx }
    }

    fn subscribe(&self, kind: PacketKind, handler: Handler, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscriptions)
            .entry(kind)
            .or_default()
            .push(Subscription { id, once, handler });
        id
    }
}

/// Future returned by [`Dispatcher::wait_for`].
#[derive(Debug)]
pub struct PacketWaiter {
    rx: oneshot::Receiver<Inbound>,
}

impl Future for PacketWaiter {
    type Output = Result<Inbound, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_err| DispatchError::WaiterDropped))
    }
}
