//! Double-buffered event channels.
//!
//! [`Scheduler::add_event`] registers an [`Events<E>`] slot and a maintenance
//! step that swaps its buffers when `FrameEnd` finishes. Writers append to
//! the current frame's buffer; readers see what was written during the
//! previous frame, so every event is visible to every reader for exactly one
//! frame regardless of stage order.
//!
//! ```ignore
//! scheduler.add_event::<Collision>();
//! scheduler.add_update_system(|out: EventWriter<Collision>| out.send(Collision(1, 2)));
//! scheduler.add_update_system(|hits: EventReader<Collision>| {
//!     hits.for_each(|hit| log::info!("{hit:?}"));
//! });
//! ```

use std::any::TypeId;

use crate::error::Result;
use crate::resource::{Res, SlotDecl};
use crate::schedule::stage::Stage;
use crate::schedule::{ParamSlots, SystemParam};
use crate::scheduler::{HookPoint, Scheduler};

/// Event storage for one event type.
pub struct Events<E> {
    current: Vec<E>,
    previous: Vec<E>,
}

impl<E> Default for Events<E> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<E> Events<E> {
    pub fn send(&mut self, event: E) {
        self.current.push(event);
    }

    /// Events written during the previous frame.
    pub fn previous(&self) -> &[E] {
        &self.previous
    }

    /// Events written so far this frame.
    pub fn pending(&self) -> &[E] {
        &self.current
    }

    /// Drop last frame's events and make this frame's readable.
    pub fn update(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }
}

/// System parameter that appends to `Events<E>`.
pub struct EventWriter<E: Send + Sync + 'static> {
    events: Res<Events<E>>,
}

impl<E: Send + Sync + 'static> EventWriter<E> {
    pub fn send(&self, event: E) {
        self.events.write().send(event);
    }

    pub fn send_batch(&self, events: impl IntoIterator<Item = E>) {
        let mut guard = self.events.write();
        for event in events {
            guard.send(event);
        }
    }
}

impl<E: Send + Sync + 'static> SystemParam for EventWriter<E> {
    fn declare(decls: &mut Vec<SlotDecl>) {
        decls.push(SlotDecl::registered::<Events<E>>());
    }

    fn fetch(slots: &mut ParamSlots<'_>) -> Result<Self> {
        Ok(Self {
            events: slots.take::<Events<E>>()?,
        })
    }
}

/// System parameter that reads the previous frame's `E` events.
pub struct EventReader<E: Send + Sync + 'static> {
    events: Res<Events<E>>,
}

impl<E: Send + Sync + 'static> EventReader<E> {
    pub fn for_each(&self, mut f: impl FnMut(&E)) {
        self.events.read().previous().iter().for_each(|event| f(event));
    }

    /// Clone out the readable events.
    pub fn read(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.events.read().previous().to_vec()
    }

    pub fn len(&self) -> usize {
        self.events.read().previous().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Send + Sync + 'static> SystemParam for EventReader<E> {
    fn declare(decls: &mut Vec<SlotDecl>) {
        decls.push(SlotDecl::registered::<Events<E>>());
    }

    fn fetch(slots: &mut ParamSlots<'_>) -> Result<Self> {
        Ok(Self {
            events: slots.take::<Events<E>>()?,
        })
    }
}

impl Scheduler {
    /// Register the `E` event channel. Calling it again is a no-op.
    pub fn add_event<E: Send + Sync + 'static>(&mut self) -> &mut Self {
        self.context().resolve::<Events<E>>();
        self.add_hook(
            TypeId::of::<Events<E>>(),
            Stage::FrameEnd,
            HookPoint::Exit,
            std::any::type_name::<E>(),
            |ctx| {
                if let Some(events) = ctx.get::<Events<E>>() {
                    events.write().update();
                }
            },
        );
        self
    }
}
