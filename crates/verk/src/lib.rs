//! # Verk — Per-Frame System Scheduler
//!
//! Verk runs plain Rust functions ("systems") once per frame, grouped into
//! fixed stages. Systems declare the resources they touch through their
//! parameters; the scheduler uses those declarations to decide which systems
//! of a stage may run on the worker pool and which must run one after another
//! on the calling thread. Individual systems can be nested before or after
//! each other, and the link graph is kept acyclic.
//!
//! Start with `use verk::prelude::*` and build a [`Scheduler`].

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod prelude;
pub mod resource;
pub mod schedule;
pub mod scheduler;
pub mod state;
pub mod time;
pub mod world;

#[cfg(feature = "diagnostics")]
pub mod diag;

pub use config::SchedulerConfig;
pub use context::Context;
pub use error::{Result, SchedError};
pub use resource::{Res, SlotDecl};
pub use schedule::{Required, Stage, SystemId, ThreadingMode};
pub use scheduler::{Plugin, Scheduler, SystemBuilder};

/// Install logging for a binary: the capturing diagnostics logger when the
/// `diagnostics` feature is on, plain `env_logger` otherwise.
pub fn init_logging() {
    #[cfg(feature = "diagnostics")]
    diag::init_logger();
    #[cfg(not(feature = "diagnostics"))]
    let _ = env_logger::try_init();
}
