//! # System Parameters — Turning Functions Into Systems
//!
//! A system is an ordinary function whose arguments are [`SystemParam`]s:
//!
//! ```ignore
//! fn integrate(world: Res<World>, time: Res<FrameTime>) {
//!     let dt = time.read().delta_secs();
//!     // ...
//! }
//! ```
//!
//! Each parameter *declares* the resource slots it needs when the system is
//! registered, and *fetches* a handle from the resolved slots every time the
//! system runs. The declarations are what the scheduler inspects when it
//! decides whether a system may run in parallel.
//!
//! [`IntoSystem`] is implemented for functions of up to eight parameters by
//! `impl_into_system!`, the same tuple-macro approach the world uses for spawn
//! bundles.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Result, SchedError};
use crate::resource::{ErasedSlot, Res, SlotDecl, downcast_slot};

/// Resolved slots handed to a system body, in declaration order.
pub struct ParamSlots<'a> {
    iter: std::slice::Iter<'a, Arc<dyn ErasedSlot>>,
}

impl<'a> ParamSlots<'a> {
    pub(crate) fn new(slots: &'a [Arc<dyn ErasedSlot>]) -> Self {
        Self { iter: slots.iter() }
    }

    /// Take the next declared slot as a `Res<T>`.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Result<Res<T>> {
        self.iter
            .next()
            .and_then(|slot| downcast_slot::<T>(Arc::clone(slot)))
            .map(Res::from_slot)
            .ok_or(SchedError::UnresolvedResource {
                type_name: std::any::type_name::<T>(),
            })
    }
}

/// Something a system function can take as an argument.
///
/// `declare` must push exactly the slots `fetch` later takes, in the same
/// order.
pub trait SystemParam: Sized + Send + 'static {
    fn declare(decls: &mut Vec<SlotDecl>);
    fn fetch(slots: &mut ParamSlots<'_>) -> Result<Self>;
}

impl<T: Default + Send + Sync + 'static> SystemParam for Res<T> {
    fn declare(decls: &mut Vec<SlotDecl>) {
        decls.push(SlotDecl::lazy::<T>());
    }

    fn fetch(slots: &mut ParamSlots<'_>) -> Result<Self> {
        slots.take::<T>()
    }
}

/// A resource that must be inserted before the system first runs.
///
/// Where [`Res`] builds a missing value from `Default`, a missing `Required`
/// resource fails the system with [`SchedError::UnresolvedResource`].
pub struct Required<T: Send + Sync + 'static>(Res<T>);

impl<T: Send + Sync + 'static> Deref for Required<T> {
    type Target = Res<T>;

    fn deref(&self) -> &Res<T> {
        &self.0
    }
}

impl<T: Send + Sync + 'static> SystemParam for Required<T> {
    fn declare(decls: &mut Vec<SlotDecl>) {
        decls.push(SlotDecl::registered::<T>());
    }

    fn fetch(slots: &mut ParamSlots<'_>) -> Result<Self> {
        slots.take::<T>().map(Required)
    }
}

/// What a system function may return.
pub trait SystemOutput {
    fn into_result(self, system: &str) -> Result<()>;
}

impl SystemOutput for () {
    fn into_result(self, _system: &str) -> Result<()> {
        Ok(())
    }
}

impl SystemOutput for Result<()> {
    fn into_result(self, system: &str) -> Result<()> {
        self.map_err(|err| match err {
            SchedError::System { .. } => err,
            other => SchedError::system(system, other),
        })
    }
}

pub(crate) type BoxedBody = Box<dyn FnMut(&mut ParamSlots<'_>) -> Result<()> + Send>;

/// A type-erased system: its name, declared slots, and body.
pub struct SystemFn {
    pub(crate) name: String,
    pub(crate) decls: Vec<SlotDecl>,
    pub(crate) body: BoxedBody,
}

impl SystemFn {
    /// Build a system from a raw body and explicit declarations.
    pub fn from_raw(
        name: impl Into<String>,
        decls: Vec<SlotDecl>,
        body: impl FnMut(&mut ParamSlots<'_>) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            decls,
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Conversion of a function (or closure) into a [`SystemFn`].
///
/// `Marker` only exists to keep the per-arity impls apart.
pub trait IntoSystem<Marker> {
    fn into_system(self) -> SystemFn;
}

impl IntoSystem<()> for SystemFn {
    fn into_system(self) -> SystemFn {
        self
    }
}

macro_rules! impl_into_system {
    ($($param:ident),*) => {
        impl<Func, Out, $($param),*> IntoSystem<fn($($param,)*) -> Out> for Func
        where
            Func: FnMut($($param),*) -> Out + Send + 'static,
            Out: SystemOutput,
            $($param: SystemParam,)*
        {
            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn into_system(mut self) -> SystemFn {
                let name = short_system_name(std::any::type_name::<Func>());
                let mut decls = Vec::new();
                $($param::declare(&mut decls);)*
                let label = name.clone();
                SystemFn::from_raw(name, decls, move |slots| {
                    $(let $param = $param::fetch(slots)?;)*
                    (self)($($param),*).into_result(&label)
                })
            }
        }
    };
}

impl_into_system!();
impl_into_system!(P0);
impl_into_system!(P0, P1);
impl_into_system!(P0, P1, P2);
impl_into_system!(P0, P1, P2, P3);
impl_into_system!(P0, P1, P2, P3, P4);
impl_into_system!(P0, P1, P2, P3, P4, P5);
impl_into_system!(P0, P1, P2, P3, P4, P5, P6);
impl_into_system!(P0, P1, P2, P3, P4, P5, P6, P7);

/// Strip the module path from a fully-qualified type name, keeping only the
/// last meaningful segment (e.g. `game::movement_system` → `movement_system`,
/// `{{closure}}` → `<closure>`).
pub(crate) fn short_system_name(full: &str) -> String {
    let name = full.rsplit("::").next().unwrap_or(full);
    if name.contains("closure") {
        "<closure>".to_string()
    } else {
        name.to_string()
    }
}
