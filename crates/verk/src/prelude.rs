//! Convenience re-exports — `use verk::prelude::*` for the common items.

pub use crate::config::SchedulerConfig;
pub use crate::context::Context;
pub use crate::error::{Result, SchedError};
pub use crate::events::{EventReader, EventWriter, Events};
pub use crate::resource::Res;
pub use crate::schedule::{FrameReport, IntoSystem, Required, Stage, SystemId, ThreadingMode};
pub use crate::scheduler::{Plugin, Scheduler, SystemBuilder};
pub use crate::state::{CurrentState, State, in_state, state_changed};
pub use crate::time::FrameTime;
pub use crate::world::{Entity, World};
