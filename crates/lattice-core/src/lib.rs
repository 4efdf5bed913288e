//! Worlds and the machinery that drives them.
//!
//! A [`World`] owns one simulation grid plus a [`Dispatcher`] that fans
//! packets out to the world's attached connections and routes inbound
//! frames to subscribed handlers. The [`WorldRegistry`] holds every world
//! created in the process, and the [`Scheduler`] advances the running ones
//! on a fixed interval.
//!
//! # Modules
//!
//! - [`connection`] -- Outbound handle for one attached client
//! - [`dispatcher`] -- Per-world publish/subscribe over packets
//! - [`world`] -- The world aggregate, its lifecycle and command handling
//! - [`registry`] -- Process-wide, insertion-ordered list of worlds
//! - [`scheduler`] -- Fixed-interval tick loop
//! - [`config`] -- YAML configuration with environment overrides
//! - [`error`] -- Error types shared by the modules above

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod world;

pub use config::{ConfigError, LatticeConfig, LimitsConfig, LogFormat, LoggingConfig};
pub use connection::{ClientConnection, ConnectionId, OUTBOUND_CAPACITY, Outbound};
pub use dispatcher::{Dispatcher, Handler, Inbound, PacketWaiter, SubscriptionId};
pub use error::{DispatchError, HandlerError, WorldError};
pub use registry::WorldRegistry;
pub use scheduler::{Scheduler, TickReport};
pub use world::{Advance, World};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent before
/// anything that can panic runs, so a poisoned lock still guards valid state.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
