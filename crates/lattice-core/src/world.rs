//! The world aggregate.
//!
//! A [`World`] couples one simulation grid with the [`Dispatcher`] that
//! serves its connections. Grid, running flag, generation and alive count
//! live behind a single mutex: [`World::advance`] and the command handlers
//! run their whole read-modify-write under it, and the packets they emit are
//! broadcast before it is released so clients observe generations in order.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped --start()--> Running --stop() / stable tick--> Stopped
//! ```
//!
//! `start()` only succeeds for a world with a positive width and height.
//! `stop()` always succeeds and always announces itself.

use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use lattice_life::{Grid, GridError, next_generation};
use lattice_protocol::{Packet, PacketKind, PacketRegistry, StateSnapshot};
use lattice_types::{Cell, WorldDescriptor, WorldId, WorldSummary};
use tracing::{debug, info, warn};

use crate::connection::ClientConnection;
use crate::dispatcher::Dispatcher;
use crate::error::{HandlerError, WorldError};
use crate::lock;

/// Reply sent when `client-start` does not change the running flag.
pub const UNABLE_TO_START: &str = "Unable to start.";

/// Reply sent when `client-set-cells` arrives while the world runs.
pub const SIMULATION_RUNNING: &str = "Simulation is running. Unable to process request";

/// Reply sent when `client-set-cells` names a cell outside the grid.
pub const CELL_OUT_OF_BOUNDS: &str = "cell out of bounds";

/// Outcome of one [`World::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Generation reached by this tick.
    pub generation: u64,
    /// Alive cells in the new grid.
    pub alive_cells: u64,
    /// Whether any cell changed state.
    pub changed: bool,
    /// Whether the world stopped itself because nothing changed.
    pub stopped: bool,
}

#[derive(Debug)]
struct WorldState {
    running: bool,
    generation: u64,
    alive_cells: u64,
    grid: Grid,
}

impl WorldState {
    const fn is_valid(&self) -> bool {
        self.grid.width() > 0 && self.grid.height() > 0
    }

    fn snapshot(&self) -> Packet {
        Packet::ServerState(StateSnapshot {
            generation: self.generation,
            flags: 0,
            cells: self.grid.alive_cells().collect(),
        })
    }
}

/// One independent simulation and its attached clients.
#[derive(Debug)]
pub struct World {
    id: WorldId,
    name: String,
    created_at: DateTime<Utc>,
    dispatcher: Dispatcher,
    state: Mutex<WorldState>,
}

impl World {
    /// Create a stopped, empty world.
    pub fn new(name: impl Into<String>, width: u32, height: u32, packets: Arc<PacketRegistry>) -> Arc<Self> {
        Self::from_descriptor(WorldDescriptor::new(name, width, height), packets)
    }

    /// Restore a world from a descriptor.
    ///
    /// Restoration never fails. Width, height and generation are taken only
    /// when positive; rows default to an empty grid of the given size. If
    /// the rows do not fit the dimensions, or the result cannot run, the
    /// world comes up stopped and a warning is logged.
    pub fn from_descriptor(descriptor: WorldDescriptor, packets: Arc<PacketRegistry>) -> Arc<Self> {
        let id = descriptor.id.unwrap_or_default();
        let width = descriptor.width.filter(|w| *w > 0).unwrap_or(0);
        let height = descriptor.height.filter(|h| *h > 0).unwrap_or(0);
        let generation = descriptor.generation.filter(|g| *g > 0).unwrap_or(0);
        let mut running = descriptor.running.unwrap_or(false);

        let grid = match restore_grid(width, height, descriptor.rows.as_deref()) {
            Ok(grid) => grid,
            Err(e) => {
                warn!(world_id = %id, error = %e, "invalid world grid, falling back to an empty one");
                running = false;
                Grid::new(width, height).unwrap_or_default()
            }
        };

        let mut state = WorldState {
            running,
            generation,
            alive_cells: grid.alive_count(),
            grid,
        };
        if state.running && !state.is_valid() {
            warn!(world_id = %id, width, height, "invalid world descriptor, world will not run");
            state.running = false;
        }

        Arc::new_cyclic(|weak| {
            let world = Self {
                id,
                name: descriptor.name.unwrap_or_default(),
                created_at: Utc::now(),
                dispatcher: Dispatcher::new(packets),
                state: Mutex::new(state),
            };
            world.register_commands(weak);
            world
        })
    }

    /// World identifier.
    pub const fn id(&self) -> WorldId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation time in this process.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The dispatcher serving this world's connections.
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Grid width.
    pub fn width(&self) -> u32 {
        lock(&self.state).grid.width()
    }

    /// Grid height.
    pub fn height(&self) -> u32 {
        lock(&self.state).grid.height()
    }

    /// Whether the scheduler should advance this world.
    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Cached alive-cell count.
    pub fn alive_cells(&self) -> u64 {
        lock(&self.state).alive_cells
    }

    /// Copy of the current grid.
    pub fn grid(&self) -> Grid {
        lock(&self.state).grid.clone()
    }

    /// Whether the world is allowed to run.
    pub fn is_valid(&self) -> bool {
        lock(&self.state).is_valid()
    }

    /// Read-only projection for listings.
    pub fn summary(&self) -> WorldSummary {
        let state = lock(&self.state);
        WorldSummary {
            id: self.id,
            name: self.name.clone(),
            width: state.grid.width(),
            height: state.grid.height(),
            generation: state.generation,
            running: state.running,
            alive_cells: state.alive_cells,
            created_at: self.created_at,
        }
    }

    /// `server-state` packet for the current grid.
    pub fn snapshot(&self) -> Packet {
        lock(&self.state).snapshot()
    }

    /// Start the simulation and broadcast `server-started`.
    ///
    /// Starting a world that already runs announces it again.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Invalid`] if the world has no cells to
    /// simulate; the flag is left untouched and nothing is broadcast.
    pub fn start(&self) -> Result<(), WorldError> {
        self.try_start().map(|_| ())
    }

    /// Stop the simulation and broadcast `server-stopped`. Idempotent.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        state.running = false;
        self.announce(&Packet::ServerStopped);
    }

    /// Advance one generation if the world is running.
    ///
    /// Broadcasts the new `server-state`; if no cell changed the world then
    /// stops itself within the same call. Returns `None` for a stopped
    /// world.
    pub fn advance(&self) -> Option<Advance> {
        let mut state = lock(&self.state);
        if !state.running {
            return None;
        }

        let step = next_generation(&state.grid);
        let changed = step.changed();
        state.grid = step.grid;
        state.alive_cells = step.alive;
        state.generation = state.generation.saturating_add(1);
        self.announce(&state.snapshot());

        if !changed {
            info!(world_id = %self.id, generation = state.generation, "world is stable, stopping");
            state.running = false;
            self.announce(&Packet::ServerStopped);
        }

        Some(Advance {
            generation: state.generation,
            alive_cells: state.alive_cells,
            changed,
            stopped: !changed,
        })
    }

    /// Replace the grid with one where exactly `cells` are alive and
    /// broadcast the new state. The generation is not advanced.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Running`] while the simulation runs, or
    /// [`WorldError::Grid`] if any cell lies outside the grid. The world is
    /// unchanged in both cases.
    pub fn set_cells(&self, cells: &[Cell]) -> Result<(), WorldError> {
        let mut state = lock(&self.state);
        if state.running {
            return Err(WorldError::Running);
        }
        let grid = Grid::from_cells(state.grid.width(), state.grid.height(), cells.iter().copied())?;
        state.alive_cells = grid.alive_count();
        state.grid = grid;
        self.announce(&state.snapshot());
        Ok(())
    }

    /// Feed a raw inbound frame from `from` through the dispatcher.
    pub fn handle_frame(&self, frame: &[u8], from: &ClientConnection) -> usize {
        self.dispatcher.handle_frame(frame, from)
    }

    /// Returns whether the running flag flipped.
    fn try_start(&self) -> Result<bool, WorldError> {
        let mut state = lock(&self.state);
        if !state.is_valid() {
            return Err(WorldError::Invalid {
                reason: format!(
                    "grid is {}x{}, both sides must be positive",
                    state.grid.width(),
                    state.grid.height()
                ),
            });
        }
        let flipped = !state.running;
        state.running = true;
        self.announce(&Packet::ServerStarted);
        Ok(flipped)
    }

    fn announce(&self, packet: &Packet) {
        match self.dispatcher.broadcast(packet) {
            Ok(delivered) => {
                debug!(world_id = %self.id, packet = %packet.kind(), delivered, "broadcast");
            }
            Err(e) => {
                warn!(world_id = %self.id, packet = %packet.kind(), error = %e, "broadcast failed");
            }
        }
    }

    fn register_commands(&self, weak: &Weak<Self>) {
        let world = Weak::clone(weak);
        let _ = self.dispatcher.on(
            PacketKind::ClientStop,
            Arc::new(move |_packet, _from| {
                upgrade(&world)?.stop();
                Ok(())
            }),
        );

        let world = Weak::clone(weak);
        let _ = self.dispatcher.on(
            PacketKind::ClientStart,
            Arc::new(move |_packet, from| {
                let world = upgrade(&world)?;
                match world.try_start() {
                    Ok(true) => Ok(()),
                    Ok(false) | Err(_) => {
                        world.dispatcher.send_to(from, &Packet::error(UNABLE_TO_START))?;
                        Ok(())
                    }
                }
            }),
        );

        let world = Weak::clone(weak);
        let _ = self.dispatcher.on(
            PacketKind::ClientSetCells,
            Arc::new(move |packet, from| {
                let Packet::ClientSetCells(batch) = packet else {
                    return Err(HandlerError::UnexpectedPacket {
                        expected: PacketKind::ClientSetCells,
                        found: packet.kind(),
                    });
                };
                let world = upgrade(&world)?;
                let reply = match world.set_cells(&batch.cells) {
                    Ok(()) => return Ok(()),
                    Err(WorldError::Running) => SIMULATION_RUNNING.to_owned(),
                    Err(WorldError::Grid(GridError::OutOfBounds { .. })) => CELL_OUT_OF_BOUNDS.to_owned(),
                    Err(e) => e.to_string(),
                };
                world.dispatcher.send_to(from, &Packet::error(reply))?;
                Ok(())
            }),
        );
    }
}

fn upgrade(world: &Weak<World>) -> Result<Arc<World>, HandlerError> {
    world.upgrade().ok_or(HandlerError::WorldGone)
}

fn restore_grid(width: u32, height: u32, rows: Option<&[Vec<bool>]>) -> Result<Grid, GridError> {
    match rows {
        Some(rows) => Grid::from_rows(width, height, rows),
        None => Grid::new(width, height),
    }
}
