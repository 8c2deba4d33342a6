//! A registered system: body, declarations, run-conditions, and links.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::param::{BoxedBody, ParamSlots, SystemFn};
use crate::context::Context;
use crate::error::Result;
use crate::resource::{ErasedSlot, SlotDecl, SlotLease};

/// Handle to a system registered with a [`Scheduler`](crate::Scheduler).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub(crate) usize);

impl SystemId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.0)
    }
}

/// Per-system directive for the stage classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreadingMode {
    /// Decide every run from the state of the declared resources.
    #[default]
    Auto,
    /// Always run on the invoking thread, after the parallel set.
    Single,
    /// Always eligible for the parallel set.
    Multi,
}

pub(crate) type Condition = Box<dyn Fn(&Context) -> bool + Send + Sync>;

/// One node of the system graph.
pub(crate) struct Unit {
    pub(crate) name: String,
    pub(crate) mode: ThreadingMode,
    decls: Vec<SlotDecl>,
    /// Filled on the first run; the context never drops a slot, so the cache
    /// stays valid for the scheduler's lifetime.
    resolved: OnceLock<Vec<Arc<dyn ErasedSlot>>>,
    body: Mutex<BoxedBody>,
    pub(crate) conditions: Vec<Condition>,
    /// Systems nested before this one, in link order.
    pub(crate) before: Vec<SystemId>,
    /// Systems nested after this one, in link order.
    pub(crate) after: Vec<SystemId>,
    /// Parent whose `before` list currently holds this system.
    pub(crate) before_of: Option<SystemId>,
    /// Parent whose `after` list currently holds this system.
    pub(crate) after_of: Option<SystemId>,
}

impl Unit {
    pub(crate) fn new(system: SystemFn, mode: ThreadingMode) -> Self {
        Self {
            name: system.name,
            mode,
            decls: system.decls,
            resolved: OnceLock::new(),
            body: Mutex::new(system.body),
            conditions: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            before_of: None,
            after_of: None,
        }
    }

    pub(crate) fn decls(&self) -> &[SlotDecl] {
        &self.decls
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.before_of.is_some() || self.after_of.is_some()
    }

    /// `true` means the system must run in the exclusive set this stage.
    ///
    /// Auto mode treats a slot nobody has resolved yet as in use.
    pub(crate) fn is_resource_in_use(&self, ctx: &Context) -> bool {
        match self.mode {
            ThreadingMode::Single => true,
            ThreadingMode::Multi => false,
            ThreadingMode::Auto => self.decls.iter().any(|decl| {
                match ctx.erased(decl.type_id) {
                    Some(slot) => slot.uses() > 0,
                    None => true,
                }
            }),
        }
    }

    pub(crate) fn conditions_hold(&self, ctx: &Context) -> bool {
        self.conditions.iter().all(|condition| condition(ctx))
    }

    /// Lease every declared slot and run the body once.
    pub(crate) fn invoke(&self, ctx: &Context) -> Result<()> {
        let slots = self.slots(ctx)?;
        let mut body = self.body.lock().unwrap_or_else(PoisonError::into_inner);
        let _lease = SlotLease::acquire(slots);
        (*body)(&mut ParamSlots::new(slots))
    }

    fn slots(&self, ctx: &Context) -> Result<&[Arc<dyn ErasedSlot>]> {
        if let Some(slots) = self.resolved.get() {
            return Ok(slots);
        }
        let slots = self
            .decls
            .iter()
            .map(|decl| decl.resolve(ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.resolved.get_or_init(|| slots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Res;
    use crate::schedule::param::IntoSystem;

    #[derive(Default)]
    struct Counter(u32);

    fn bump(counter: Res<Counter>) {
        assert_eq!(counter.use_count(), 1);
        counter.write().0 += 1;
    }

    #[test]
    fn forced_modes_ignore_resource_state() {
        let ctx = Context::new();
        let single = Unit::new(bump.into_system(), ThreadingMode::Single);
        let multi = Unit::new(bump.into_system(), ThreadingMode::Multi);
        assert!(single.is_resource_in_use(&ctx));
        assert!(!multi.is_resource_in_use(&ctx));

        ctx.resolve::<Counter>();
        assert!(single.is_resource_in_use(&ctx));
        assert!(!multi.is_resource_in_use(&ctx));
    }

    #[test]
    fn auto_mode_treats_unresolved_as_in_use() {
        let ctx = Context::new();
        let unit = Unit::new(bump.into_system(), ThreadingMode::Auto);
        assert!(unit.is_resource_in_use(&ctx));

        let counter = ctx.resolve::<Counter>();
        assert!(!unit.is_resource_in_use(&ctx));

        let held = [ctx.erased(std::any::TypeId::of::<Counter>()).unwrap()];
        let lease = SlotLease::acquire(&held);
        assert!(unit.is_resource_in_use(&ctx));
        drop(lease);
        assert!(!unit.is_resource_in_use(&ctx));
        assert_eq!(counter.use_count(), 0);
    }

    #[test]
    fn auto_mode_without_declarations_is_parallel() {
        let ctx = Context::new();
        let unit = Unit::new((|| {}).into_system(), ThreadingMode::Auto);
        assert!(!unit.is_resource_in_use(&ctx));
    }

    #[test]
    fn invoke_holds_lease_only_during_body() {
        let ctx = Context::new();
        let unit = Unit::new(bump.into_system(), ThreadingMode::Auto);
        unit.invoke(&ctx).unwrap();
        unit.invoke(&ctx).unwrap();
        let counter = ctx.resolve::<Counter>();
        assert_eq!(counter.read().0, 2);
        assert_eq!(counter.use_count(), 0);
    }

    #[test]
    fn conditions_are_and_combined() {
        let ctx = Context::new();
        let mut unit = Unit::new(bump.into_system(), ThreadingMode::Auto);
        assert!(unit.conditions_hold(&ctx));
        unit.conditions.push(Box::new(|_: &Context| true));
        assert!(unit.conditions_hold(&ctx));
        unit.conditions.push(Box::new(|_: &Context| false));
        assert!(!unit.conditions_hold(&ctx));
    }
}
