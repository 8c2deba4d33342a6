//! # Context — The Type-Keyed Resource Container
//!
//! The [`Context`] is the only place resource instances live. It belongs to a
//! [`Scheduler`](crate::scheduler::Scheduler) and is shared with every system
//! through an `Arc`, so there is no process-wide state: two schedulers never
//! see each other's resources.
//!
//! Resolution is lazy. The first system (or caller) that asks for `T` builds
//! it; everyone after that gets the identical slot back.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, SchedError};
use crate::resource::{ErasedSlot, Res, Slot, downcast_slot};

/// Type-keyed map of resource slots, scoped to one scheduler.
#[derive(Default)]
pub struct Context {
    slots: RwLock<HashMap<TypeId, Arc<dyn ErasedSlot>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. If a slot for `T` already exists its contents are
    /// replaced in place, so handles held by systems stay valid.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) -> Res<T> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slots.get(&TypeId::of::<T>()) {
            if let Some(slot) = downcast_slot::<T>(Arc::clone(existing)) {
                *slot.write() = value;
                return Res::from_slot(slot);
            }
        }
        let slot = Arc::new(Slot::new(value));
        slots.insert(TypeId::of::<T>(), slot.clone());
        Res::from_slot(slot)
    }

    /// Get the slot for `T`, building it from `Default` on first use.
    pub fn resolve<T: Default + Send + Sync + 'static>(&self) -> Res<T> {
        if let Some(res) = self.get::<T>() {
            return res;
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race between the two locks.
        let erased = slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                log::trace!("resolving resource `{}`", std::any::type_name::<T>());
                Arc::new(Slot::new(T::default()))
            })
            .clone();
        drop(slots);
        match downcast_slot::<T>(erased) {
            Some(slot) => Res::from_slot(slot),
            None => unreachable!("slot keyed by TypeId holds a different type"),
        }
    }

    /// Get the slot for `T`, failing if no setup call created it.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Res<T>> {
        self.get::<T>().ok_or(SchedError::UnresolvedResource {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Get the slot for `T` if it has been resolved or inserted.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Res<T>> {
        let erased = self.erased(TypeId::of::<T>())?;
        downcast_slot::<T>(erased).map(Res::from_slot)
    }

    /// Returns `true` if a slot for `T` exists.
    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<T>())
    }

    /// Number of resolved slots.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn contains_id(&self, type_id: TypeId) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&type_id)
    }

    pub(crate) fn erased(&self, type_id: TypeId) -> Option<Arc<dyn ErasedSlot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    pub(crate) fn resolve_erased<T: Default + Send + Sync + 'static>(&self) -> Arc<dyn ErasedSlot> {
        self.resolve::<T>();
        match self.erased(TypeId::of::<T>()) {
            Some(slot) => slot,
            None => unreachable!("slot was just resolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Score(u32);

    struct Gravity(f32);

    #[test]
    fn resolve_builds_once_and_caches() {
        let ctx = Context::new();
        assert!(!ctx.contains::<Score>());
        let a = ctx.resolve::<Score>();
        a.write().0 = 5;
        let b = ctx.resolve::<Score>();
        assert!(a.ptr_eq(&b));
        assert_eq!(*b.read(), Score(5));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn insert_replaces_in_place() {
        let ctx = Context::new();
        let held = ctx.resolve::<Score>();
        ctx.insert(Score(42));
        assert_eq!(held.read().0, 42);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn require_fails_before_setup() {
        let ctx = Context::new();
        assert!(matches!(
            ctx.require::<Gravity>(),
            Err(SchedError::UnresolvedResource { .. })
        ));
        ctx.insert(Gravity(9.8));
        assert_eq!(ctx.require::<Gravity>().unwrap().read().0, 9.8);
    }

    #[test]
    fn contexts_are_isolated() {
        let one = Context::new();
        let two = Context::new();
        one.insert(Score(1));
        assert!(one.contains::<Score>());
        assert!(!two.contains::<Score>());
    }
}
