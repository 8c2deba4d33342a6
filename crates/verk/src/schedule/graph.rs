//! # System Graph — Before/After Links Between Systems
//!
//! Every registered system lives in one arena, addressed by [`SystemId`].
//! A link nests one system inside another's run:
//!
//! ```text
//! run(parent):
//!     run(b) for b in parent.before     (link order)
//!     parent body, if its conditions hold
//!     run(a) for a in parent.after      (link order)
//! ```
//!
//! Each system records which parent holds it, separately for the `before`
//! and `after` direction, so relinking in one direction never disturbs the
//! other.
//!
//! The nesting relation (parent → child, either direction) must stay acyclic
//! or `run` would recurse forever. [`SystemGraph::link`] checks reachability
//! with a depth-first search before it touches anything, so a rejected link
//! leaves the graph exactly as it was.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use super::report::SystemTiming;
use super::stage::Stage;
use super::unit::{SystemId, Unit};
use crate::context::Context;
use crate::error::{Result, SchedError};

/// Which list of the parent a link goes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Child runs before the parent's body.
    Before,
    /// Child runs after the parent's body.
    After,
}

#[derive(Default)]
pub(crate) struct SystemGraph {
    units: Vec<Unit>,
}

impl SystemGraph {
    pub(crate) fn add(&mut self, unit: Unit) -> SystemId {
        let id = SystemId(self.units.len());
        self.units.push(unit);
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn unit(&self, id: SystemId) -> Result<&Unit> {
        self.units.get(id.0).ok_or(SchedError::UnknownSystem { id })
    }

    pub(crate) fn unit_mut(&mut self, id: SystemId) -> Result<&mut Unit> {
        self.units.get_mut(id.0).ok_or(SchedError::UnknownSystem { id })
    }

    pub(crate) fn name(&self, id: SystemId) -> &str {
        self.units.get(id.0).map(|u| u.name.as_str()).unwrap_or("<unknown>")
    }

    /// Nest `child` in `parent`'s list for `direction`, detaching it from any
    /// previous parent in that direction first.
    pub(crate) fn link(&mut self, child: SystemId, parent: SystemId, direction: Direction) -> Result<()> {
        self.unit(child)?;
        self.unit(parent)?;
        if child == parent {
            return Err(SchedError::SelfDependency {
                system: self.name(child).to_string(),
            });
        }
        if self.reaches(child, parent) {
            return Err(SchedError::CyclicDependency {
                system: self.name(child).to_string(),
                parent: self.name(parent).to_string(),
            });
        }

        self.detach(child, direction);
        let parent_unit = &mut self.units[parent.0];
        match direction {
            Direction::Before => parent_unit.before.push(child),
            Direction::After => parent_unit.after.push(child),
        }
        let child_unit = &mut self.units[child.0];
        match direction {
            Direction::Before => child_unit.before_of = Some(parent),
            Direction::After => child_unit.after_of = Some(parent),
        }
        log::debug!(
            "linked `{}` {:?} `{}`",
            self.name(child),
            direction,
            self.name(parent)
        );
        Ok(())
    }

    /// Remove `child` from the parent currently holding it in `direction`.
    /// Returns the parent it left, if any.
    pub(crate) fn detach(&mut self, child: SystemId, direction: Direction) -> Option<SystemId> {
        let unit = self.units.get_mut(child.0)?;
        let parent = match direction {
            Direction::Before => unit.before_of.take(),
            Direction::After => unit.after_of.take(),
        }?;
        let list = match direction {
            Direction::Before => &mut self.units[parent.0].before,
            Direction::After => &mut self.units[parent.0].after,
        };
        list.retain(|&id| id != child);
        Some(parent)
    }

    /// Depth-first search: can `target` be reached from `from` by following
    /// before and after links?
    pub(crate) fn reaches(&self, from: SystemId, target: SystemId) -> bool {
        let mut visited = vec![false; self.units.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            let Some(unit) = self.units.get(id.0) else {
                continue;
            };
            if std::mem::replace(&mut visited[id.0], true) {
                continue;
            }
            stack.extend(unit.before.iter().chain(unit.after.iter()).copied());
        }
        false
    }

    /// Run `id` with its nested links. The first error aborts the chain.
    pub(crate) fn run(
        &self,
        id: SystemId,
        ctx: &Context,
        stage: Stage,
        timings: &Mutex<Vec<SystemTiming>>,
    ) -> Result<()> {
        let unit = self.unit(id)?;
        for &child in &unit.before {
            self.run(child, ctx, stage, timings)?;
        }

        let start = Instant::now();
        let ran = unit.conditions_hold(ctx);
        let outcome = if ran {
            log::trace!("[{stage}] running `{}`", unit.name);
            unit.invoke(ctx)
        } else {
            log::trace!("[{stage}] skipping `{}`: condition not met", unit.name);
            Ok(())
        };
        timings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SystemTiming {
                name: unit.name.clone(),
                stage,
                duration_us: start.elapsed().as_secs_f64() * 1_000_000.0,
                ran,
            });
        outcome?;

        for &child in &unit.after {
            self.run(child, ctx, stage, timings)?;
        }
        Ok(())
    }
}
