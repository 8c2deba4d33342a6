//! Application states and state-driven run-conditions.
//!
//! [`Scheduler::add_state`] registers a [`State<S>`] slot. Systems queue a
//! transition with [`CurrentState::set`]; the scheduler applies it when the
//! next `FrameStart` begins, so the value is stable for a whole frame.

use std::any::TypeId;
use std::fmt;

use crate::context::Context;
use crate::error::Result;
use crate::resource::{Res, SlotDecl};
use crate::schedule::stage::Stage;
use crate::schedule::{ParamSlots, SystemParam};
use crate::scheduler::{HookPoint, Scheduler};

/// Bound shared by every state type.
pub trait StateValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static> StateValue for T {}

/// Current value of a state machine plus a queued transition.
#[derive(Debug)]
pub struct State<S> {
    current: S,
    next: Option<S>,
    /// Set for the frame in which a transition was applied.
    changed: bool,
}

impl<S: StateValue> State<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            next: None,
            changed: false,
        }
    }

    pub fn get(&self) -> &S {
        &self.current
    }

    /// Queue a transition for the next frame. A later call in the same
    /// frame overrides an earlier one.
    pub fn set(&mut self, next: S) {
        self.next = Some(next);
    }

    pub fn queued(&self) -> Option<&S> {
        self.next.as_ref()
    }

    /// Did the value change at the start of this frame?
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Apply the queued transition. Returns `true` if the value changed.
    pub(crate) fn apply(&mut self) -> bool {
        self.changed = match self.next.take() {
            Some(next) if next != self.current => {
                log::debug!("state {:?} -> {:?}", self.current, next);
                self.current = next;
                true
            }
            _ => false,
        };
        self.changed
    }
}

/// System parameter giving access to `State<S>`.
pub struct CurrentState<S: StateValue> {
    state: Res<State<S>>,
}

impl<S: StateValue> CurrentState<S> {
    pub fn get(&self) -> S {
        self.state.read().get().clone()
    }

    pub fn is(&self, value: &S) -> bool {
        self.state.read().get() == value
    }

    pub fn set(&self, next: S) {
        self.state.write().set(next);
    }

    pub fn is_changed(&self) -> bool {
        self.state.read().is_changed()
    }
}

impl<S: StateValue> SystemParam for CurrentState<S> {
    fn declare(decls: &mut Vec<SlotDecl>) {
        decls.push(SlotDecl::registered::<State<S>>());
    }

    fn fetch(slots: &mut ParamSlots<'_>) -> Result<Self> {
        Ok(Self {
            state: slots.take::<State<S>>()?,
        })
    }
}

/// Run-condition: true while `State<S>` equals `value`.
pub fn in_state<S: StateValue>(value: S) -> impl Fn(&Context) -> bool + Send + Sync + 'static {
    move |ctx: &Context| {
        ctx.get::<State<S>>()
            .is_some_and(|state| *state.read().get() == value)
    }
}

/// Run-condition: true during the frame a transition of `S` was applied.
pub fn state_changed<S: StateValue>() -> impl Fn(&Context) -> bool + Send + Sync + 'static {
    |ctx: &Context| {
        ctx.get::<State<S>>()
            .is_some_and(|state| state.read().is_changed())
    }
}

impl Scheduler {
    /// Register `State<S>` with its initial value. Calling it again resets
    /// the value.
    pub fn add_state<S: StateValue>(&mut self, initial: S) -> &mut Self {
        self.context().insert(State::new(initial));
        self.add_hook(
            TypeId::of::<State<S>>(),
            Stage::FrameStart,
            HookPoint::Enter,
            std::any::type_name::<S>(),
            |ctx| {
                if let Some(state) = ctx.get::<State<S>>() {
                    state.write().apply();
                }
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedError;
    use crate::schedule::ThreadingMode;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Mode {
        Menu,
        Playing,
    }

    #[test]
    fn apply_only_reports_real_changes() {
        let mut state = State::new(Mode::Menu);
        state.set(Mode::Menu);
        assert!(!state.apply());
        state.set(Mode::Playing);
        assert_eq!(state.get(), &Mode::Menu);
        assert!(state.apply());
        assert_eq!(state.get(), &Mode::Playing);
        assert!(!state.apply());
        assert!(!state.is_changed());
    }

    #[test]
    fn transitions_apply_on_the_next_frame() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.add_state(Mode::Menu);

        let sink = Arc::clone(&log);
        scheduler
            .add_update_system(move || sink.lock().unwrap().push("playing"))
            .run_if(in_state(Mode::Playing));
        let sink = Arc::clone(&log);
        scheduler
            .add_update_system(move || sink.lock().unwrap().push("entered"))
            .run_if(state_changed::<Mode>());
        scheduler.add_system(
            |mode: CurrentState<Mode>| {
                if mode.is(&Mode::Menu) {
                    mode.set(Mode::Playing);
                }
            },
            Stage::AfterUpdate,
            ThreadingMode::Auto,
        );

        scheduler.run().unwrap();
        assert!(log.lock().unwrap().is_empty());
        scheduler.run().unwrap();
        let mut frame_two = log.lock().unwrap().clone();
        frame_two.sort();
        assert_eq!(frame_two, vec!["entered", "playing"]);
        scheduler.run().unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn conditions_are_false_without_the_state() {
        let ctx = Context::new();
        assert!(!in_state(Mode::Menu)(&ctx));
        assert!(!state_changed::<Mode>()(&ctx));
    }

    #[test]
    fn unregistered_state_is_an_error() {
        let mut scheduler = Scheduler::new();
        scheduler.add_update_system(|_: CurrentState<Mode>| {});
        assert!(matches!(
            scheduler.run(),
            Err(SchedError::UnresolvedResource { .. })
        ));
    }
}
