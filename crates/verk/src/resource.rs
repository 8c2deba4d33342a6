//! # Resource Slots — Shared Singletons With a Use-Count
//!
//! A [`Slot`] owns exactly one instance of a type inside a
//! [`Context`](crate::context::Context). Every system that declares the same
//! type gets the *same* slot, which is what makes conflicts between unrelated
//! systems visible to the scheduler.
//!
//! ```text
//! Context
//!   slots: HashMap<TypeId, Arc<dyn ErasedSlot>>
//!                               │
//!                               ▼
//!                     Slot<T> { value: RwLock<T>, uses: AtomicUsize }
//! ```
//!
//! ## Use-count
//!
//! The `uses` counter is advisory. The scheduler bumps it (through a
//! [`SlotLease`]) for the duration of a system body, and the classifier reads it
//! at the start of a stage to decide whether a system may join the parallel
//! set. Actual memory safety comes from the `RwLock` around the value, so a
//! wrong classification can only cost contention, never a data race.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::context::Context;
use crate::error::Result;

// ── Slot ─────────────────────────────────────────────────────────────────

/// One lazily-constructed singleton plus its use-count.
pub struct Slot<T> {
    value: RwLock<T>,
    uses: AtomicUsize,
}

impl<T: Send + Sync + 'static> Slot<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            uses: AtomicUsize::new(0),
        }
    }

    /// Shared access to the value.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to the value.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Type-erased view of a [`Slot`], used by the context and the classifier.
pub(crate) trait ErasedSlot: Send + Sync {
    fn uses(&self) -> usize;
    fn lock(&self);
    fn unlock(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> ErasedSlot for Slot<T> {
    fn uses(&self) -> usize {
        self.uses.load(Ordering::Acquire)
    }

    fn lock(&self) {
        self.uses.fetch_add(1, Ordering::AcqRel);
    }

    fn unlock(&self) {
        let released = self
            .uses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if released.is_err() {
            log::warn!(
                "unpaired unlock on resource `{}` ignored",
                std::any::type_name::<T>()
            );
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Recover the typed slot from its erased form.
pub(crate) fn downcast_slot<T: Send + Sync + 'static>(
    erased: Arc<dyn ErasedSlot>,
) -> Option<Arc<Slot<T>>> {
    erased.into_any().downcast::<Slot<T>>().ok()
}

// ── SlotLease ────────────────────────────────────────────────────────────

/// Holds the use-count of every slot a system declared while its body runs.
///
/// Dropping the lease releases all of them, so the counts return to their
/// previous value on every exit path, including early returns and panics.
pub(crate) struct SlotLease<'a> {
    slots: &'a [Arc<dyn ErasedSlot>],
}

impl<'a> SlotLease<'a> {
    pub(crate) fn acquire(slots: &'a [Arc<dyn ErasedSlot>]) -> Self {
        for slot in slots {
            slot.lock();
        }
        Self { slots }
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        for slot in self.slots.iter().rev() {
            slot.unlock();
        }
    }
}

// ── SlotDecl ─────────────────────────────────────────────────────────────

/// How a declared slot gets resolved the first time a system needs it.
#[derive(Clone, Copy)]
pub(crate) enum Resolution {
    /// Construct from `Default` on first use.
    Lazy(fn(&Context) -> Arc<dyn ErasedSlot>),
    /// Must already exist, put there by a setup call such as `add_event`.
    Registered,
}

/// A resource a system declared it will touch.
#[derive(Clone, Copy)]
pub struct SlotDecl {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) resolution: Resolution,
}

impl SlotDecl {
    /// A slot built from `T::default()` the first time anyone resolves it.
    pub fn lazy<T: Default + Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            resolution: Resolution::Lazy(|ctx| ctx.resolve_erased::<T>()),
        }
    }

    /// A slot that only a setup call may create.
    pub fn registered<T: Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            resolution: Resolution::Registered,
        }
    }

    pub(crate) fn resolve(&self, ctx: &Context) -> Result<Arc<dyn ErasedSlot>> {
        match self.resolution {
            Resolution::Lazy(build) => Ok(build(ctx)),
            Resolution::Registered => ctx.erased(self.type_id).ok_or(
                crate::error::SchedError::UnresolvedResource {
                    type_name: self.type_name,
                },
            ),
        }
    }
}

impl fmt::Debug for SlotDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotDecl")
            .field("type_name", &self.type_name)
            .finish()
    }
}

// ── Res ──────────────────────────────────────────────────────────────────

/// Handle to a resource slot. Cheap to clone; every clone points at the same
/// instance.
///
/// As a system parameter it declares `T` and creates it from `Default` on
/// first use.
pub struct Res<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Send + Sync + 'static> Res<T> {
    pub(crate) fn from_slot(slot: Arc<Slot<T>>) -> Self {
        Self { slot }
    }

    /// Shared access. Blocks while a writer holds the value.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.slot.read()
    }

    /// Exclusive access. Blocks while any reader or writer holds the value.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.slot.write()
    }

    /// Number of systems currently executing with this slot declared.
    pub fn use_count(&self) -> usize {
        self.slot.uses()
    }

    /// Returns `true` if both handles refer to the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T> Clone for Res<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: fmt::Debug + Send + Sync + 'static> fmt::Debug for Res<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Res").field(&*self.read()).finish()
    }
}
