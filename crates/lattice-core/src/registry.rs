//! Process-wide list of worlds.
//!
//! The registry is append-only and keeps insertion order, which is also the
//! order the scheduler ticks worlds in and the REST layer lists them in.

use std::sync::{Arc, PoisonError, RwLock};

use lattice_protocol::PacketRegistry;
use lattice_types::{WorldDescriptor, WorldId, WorldSummary};
use tracing::{info, warn};

use crate::world::World;

/// Insertion-ordered registry of every world in the process.
#[derive(Debug)]
pub struct WorldRegistry {
    packets: Arc<PacketRegistry>,
    worlds: RwLock<Vec<Arc<World>>>,
}

impl WorldRegistry {
    /// Create an empty registry whose worlds frame packets with `packets`.
    pub fn new(packets: Arc<PacketRegistry>) -> Self {
        Self {
            packets,
            worlds: RwLock::new(Vec::new()),
        }
    }

    /// The packet registry handed to new worlds.
    pub const fn packets(&self) -> &Arc<PacketRegistry> {
        &self.packets
    }

    /// Restore a world from `descriptor` and register it.
    ///
    /// A descriptor whose id is already taken gets a fresh id instead, so
    /// ids stay unique.
    pub fn create(&self, mut descriptor: WorldDescriptor) -> Arc<World> {
        let mut worlds = self.worlds.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = descriptor.id.filter(|id| worlds.iter().any(|w| w.id() == *id)) {
            warn!(world_id = %id, "world id already registered, assigning a fresh one");
            descriptor.id = None;
        }
        let world = World::from_descriptor(descriptor, Arc::clone(&self.packets));
        info!(
            world_id = %world.id(),
            name = world.name(),
            width = world.width(),
            height = world.height(),
            running = world.is_running(),
            "world created"
        );
        worlds.push(Arc::clone(&world));
        world
    }

    /// Register an already constructed world.
    ///
    /// Returns `false`, leaving the registry unchanged, if a world with the
    /// same id is present.
    pub fn insert(&self, world: Arc<World>) -> bool {
        let mut worlds = self.worlds.write().unwrap_or_else(PoisonError::into_inner);
        if worlds.iter().any(|w| w.id() == world.id()) {
            return false;
        }
        worlds.push(world);
        true
    }

    /// Find a world by id.
    pub fn find_by_id(&self, id: WorldId) -> Option<Arc<World>> {
        self.read().iter().find(|w| w.id() == id).cloned()
    }

    /// Every world in insertion order.
    pub fn list(&self) -> Vec<Arc<World>> {
        self.read().clone()
    }

    /// Summaries of every world in insertion order.
    pub fn summaries(&self) -> Vec<WorldSummary> {
        self.read().iter().map(|w| w.summary()).collect()
    }

    /// Number of registered worlds.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no world has been registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<World>>> {
        self.worlds.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> WorldRegistry {
        WorldRegistry::new(Arc::new(PacketRegistry::standard()))
    }

    #[test]
    fn keeps_insertion_order() {
        let registry = registry();
        let a = registry.create(WorldDescriptor::new("a", 1, 1));
        let b = registry.create(WorldDescriptor::new("b", 2, 2));
        let c = registry.create(WorldDescriptor::new("c", 3, 3));

        let ids: Vec<WorldId> = registry.list().iter().map(|w| w.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
        let names: Vec<String> = registry.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn finds_by_id() {
        let registry = registry();
        let world = registry.create(WorldDescriptor::new("a", 1, 1));
        assert!(Arc::ptr_eq(&registry.find_by_id(world.id()).unwrap(), &world));
        assert!(registry.find_by_id(WorldId::new()).is_none());
    }

    #[test]
    fn duplicate_ids_get_a_fresh_one() {
        let registry = registry();
        let id = WorldId::new();
        let first = registry.create(WorldDescriptor {
            id: Some(id),
            ..WorldDescriptor::new("first", 1, 1)
        });
        let second = registry.create(WorldDescriptor {
            id: Some(id),
            ..WorldDescriptor::new("second", 1, 1)
        });
        assert_eq!(first.id(), id);
        assert_ne!(second.id(), id);
        assert_eq!(registry.find_by_id(id).unwrap().name(), "first");
    }

    #[test]
    fn insert_rejects_duplicates() {
        let registry = registry();
        let world = World::new("w", 1, 1, Arc::clone(registry.packets()));
        assert!(registry.insert(Arc::clone(&world)));
        assert!(!registry.insert(world));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
