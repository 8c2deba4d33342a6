//! # Schedule — Systems, Links, and Stages
//!
//! The scheduling core, leaves first:
//!
//! - [`param`] — turns plain functions into type-erased systems and records the
//!   resources each one declares
//! - [`unit`] — a registered system: body, run-conditions, threading mode
//! - [`graph`] — the arena of systems and their before/after links
//! - [`stage`] — the fixed frame phases and their top-level lists
//! - [`report`] — timings and partitions of the most recent run
//!
//! The [`Scheduler`](crate::Scheduler) ties these together and drives a frame.

pub mod graph;
pub mod param;
pub mod report;
pub mod stage;
pub mod unit;

pub use graph::Direction;
pub use param::{IntoSystem, ParamSlots, Required, SystemFn, SystemOutput, SystemParam};
pub use report::{FrameReport, StageReport, SystemTiming};
pub use stage::Stage;
pub use unit::{SystemId, ThreadingMode};
