//! # World — Minimal Entity Storage
//!
//! A small entity/component store that systems declare like any other
//! resource (`Res<World>`). Storage is deliberately simple: every component
//! type gets its own sparse map keyed by entity index, and an entity is the
//! set of maps that hold its index.
//!
//! ```text
//! Position: { 0: (1, 2), 3: (0, 0) }
//! Player:   { 3: Player }
//!
//! world.single::<Player>()  →  Entity(3v0)
//! ```
//!
//! ## Generational Indices
//!
//! Despawning bumps the slot's generation, so a handle kept across a despawn
//! no longer matches when the slot is reused:
//!
//! ```text
//! Entity { index: 5, generation: 0 }  ← original
//! Entity { index: 5, generation: 1 }  ← after recycle
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Result, SchedError};

/// Handle to an entity in a [`World`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Hands out entity handles and recycles despawned slots.
///
/// ```text
/// generations: [0, 1, 0, 2]   ← one per slot ever allocated
/// free_list:   [1, 3]         ← despawned, reusable
/// ```
#[derive(Default)]
struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
}

impl EntityAllocator {
    fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            return Entity {
                index,
                generation: self.generations[index as usize],
            };
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        Entity {
            index,
            generation: 0,
        }
    }

    fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index as usize;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.alive[idx] = false;
        self.free_list.push(entity.index);
        true
    }

    fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        self.alive.get(idx).copied().unwrap_or(false)
            && self.generations[idx] == entity.generation
    }

    /// Handle currently occupying `index`. Only valid for live slots.
    fn entity_at(&self, index: u32) -> Entity {
        Entity {
            index,
            generation: self.generations[index as usize],
        }
    }

    fn alive_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }
}

/// Type-erased view of one component map, used by despawn.
trait ComponentStore: Any + Send + Sync {
    fn remove_index(&mut self, index: u32);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Store<T> {
    items: BTreeMap<u32, T>,
}

impl<T: Send + Sync + 'static> ComponentStore for Store<T> {
    fn remove_index(&mut self, index: u32) {
        self.items.remove(&index);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Entities and their components.
#[derive(Default)]
pub struct World {
    allocator: EntityAllocator,
    stores: HashMap<TypeId, Box<dyn ComponentStore>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_empty(&mut self) -> Entity {
        self.allocator.allocate()
    }

    /// Spawn an entity with a tuple of components.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        let entity = self.allocator.allocate();
        bundle.insert_into(self, entity);
        entity
    }

    /// Remove an entity and all its components. Returns `false` for stale
    /// handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.allocator.deallocate(entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.remove_index(entity.index);
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Add or replace a component. Returns `false` for stale handles.
    pub fn insert<T: Send + Sync + 'static>(&mut self, entity: Entity, component: T) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.store_mut::<T>().items.insert(entity.index, component);
        true
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.store_mut_existing::<T>()?.items.remove(&entity.index)
    }

    pub fn get<T: Send + Sync + 'static>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.store::<T>()?.items.get(&entity.index)
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.store_mut_existing::<T>()?.items.get_mut(&entity.index)
    }

    /// Entities holding a `T`, in index order.
    pub fn entities_with<T: Send + Sync + 'static>(&self) -> Vec<Entity> {
        self.store::<T>()
            .map(|store| {
                store
                    .items
                    .keys()
                    .map(|&index| self.allocator.entity_at(index))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn for_each<T: Send + Sync + 'static>(&self, mut f: impl FnMut(Entity, &T)) {
        if let Some(store) = self.store::<T>() {
            for (&index, component) in &store.items {
                f(self.allocator.entity_at(index), component);
            }
        }
    }

    pub fn for_each_mut<T: Send + Sync + 'static>(&mut self, mut f: impl FnMut(Entity, &mut T)) {
        let Some(store) = self
            .stores
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<Store<T>>())
        else {
            return;
        };
        for (&index, component) in store.items.iter_mut() {
            f(self.allocator.entity_at(index), component);
        }
    }

    /// The only entity with a `T`. Zero or several matches is an error.
    pub fn single<T: Send + Sync + 'static>(&self) -> Result<(Entity, &T)> {
        let store = self.store::<T>().ok_or(cardinality::<T>(0))?;
        let mut iter = store.items.iter();
        match (iter.next(), iter.next()) {
            (Some((&index, component)), None) => Ok((self.allocator.entity_at(index), component)),
            _ => Err(cardinality::<T>(store.items.len())),
        }
    }

    /// Mutable form of [`single`](Self::single).
    pub fn single_mut<T: Send + Sync + 'static>(&mut self) -> Result<(Entity, &mut T)> {
        let allocator = &self.allocator;
        let store = self
            .stores
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<Store<T>>())
            .ok_or(cardinality::<T>(0))?;
        let found = store.items.len();
        if found != 1 {
            return Err(cardinality::<T>(found));
        }
        match store.items.iter_mut().next() {
            Some((&index, component)) => Ok((allocator.entity_at(index), component)),
            None => Err(cardinality::<T>(0)),
        }
    }

    fn store<T: Send + Sync + 'static>(&self) -> Option<&Store<T>> {
        self.stores
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<Store<T>>())
    }

    fn store_mut_existing<T: Send + Sync + 'static>(&mut self) -> Option<&mut Store<T>> {
        self.stores
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<Store<T>>())
    }

    fn store_mut<T: Send + Sync + 'static>(&mut self) -> &mut Store<T> {
        let store = self.stores.entry(TypeId::of::<T>()).or_insert_with(|| {
            Box::new(Store::<T> {
                items: BTreeMap::new(),
            })
        });
        match store.as_any_mut().downcast_mut::<Store<T>>() {
            Some(store) => store,
            None => unreachable!("component store keyed by TypeId holds a different type"),
        }
    }
}

fn cardinality<T>(found: usize) -> SchedError {
    SchedError::Cardinality {
        type_name: std::any::type_name::<T>(),
        found,
    }
}

/// A tuple of components spawned together. Implemented for up to 8 elements.
pub trait Bundle {
    fn insert_into(self, world: &mut World, entity: Entity);
}

macro_rules! impl_bundle {
    ($($T:ident),+) => {
        impl<$($T: Send + Sync + 'static),+> Bundle for ($($T,)+) {
            #[allow(non_snake_case)]
            fn insert_into(self, world: &mut World, entity: Entity) {
                let ($($T,)+) = self;
                $(world.insert(entity, $T);)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32, i32);
    #[derive(Debug, PartialEq)]
    struct Player;
    struct Enemy;

    #[test]
    fn spawn_get_and_despawn() {
        let mut world = World::new();
        let e = world.spawn((Position(1, 2), Player));
        assert_eq!(world.get::<Position>(e), Some(&Position(1, 2)));
        world.get_mut::<Position>(e).unwrap().0 = 5;
        assert_eq!(world.get::<Position>(e), Some(&Position(5, 2)));

        assert!(world.despawn(e));
        assert!(!world.despawn(e));
        assert_eq!(world.get::<Position>(e), None);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn recycled_slot_invalidates_old_handle() {
        let mut world = World::new();
        let old = world.spawn((Position(0, 0),));
        world.despawn(old);
        let new = world.spawn((Position(9, 9),));
        assert_eq!(new.index(), old.index());
        assert_eq!(new.generation(), old.generation() + 1);
        assert!(world.get::<Position>(old).is_none());
        assert!(!world.insert(old, Player));
        assert_eq!(world.entities_with::<Position>(), vec![new]);
    }

    #[test]
    fn single_requires_exactly_one_match() {
        let mut world = World::new();
        assert!(matches!(
            world.single::<Player>(),
            Err(SchedError::Cardinality { found: 0, .. })
        ));

        let player = world.spawn((Player, Position(0, 0)));
        let (found, _) = world.single::<Player>().unwrap();
        assert_eq!(found, player);
        world.single_mut::<Position>().unwrap().1.0 = 3;
        assert_eq!(world.get::<Position>(player), Some(&Position(3, 0)));

        world.spawn((Player,));
        assert!(matches!(
            world.single::<Player>(),
            Err(SchedError::Cardinality { found: 2, .. })
        ));
        assert!(matches!(
            world.single_mut::<Player>(),
            Err(SchedError::Cardinality { found: 2, .. })
        ));
    }

    #[test]
    fn removing_last_match_brings_single_back_to_zero() {
        let mut world = World::new();
        let e = world.spawn((Enemy,));
        assert!(world.remove::<Enemy>(e).is_some());
        assert!(matches!(
            world.single::<Enemy>(),
            Err(SchedError::Cardinality { found: 0, .. })
        ));
        assert!(world.is_alive(e));
    }

    #[test]
    fn for_each_mut_visits_in_index_order() {
        let mut world = World::new();
        let a = world.spawn((Position(0, 0),));
        world.spawn_empty();
        let c = world.spawn((Position(1, 1),));
        let mut seen = Vec::new();
        world.for_each_mut::<Position>(|entity, pos| {
            pos.0 += 10;
            seen.push(entity);
        });
        assert_eq!(seen, vec![a, c]);
        assert_eq!(world.get::<Position>(c), Some(&Position(11, 1)));
    }
}
