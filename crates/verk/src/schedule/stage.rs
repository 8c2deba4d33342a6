//! Fixed frame phases and the per-phase registration lists.

use std::fmt;

use serde::Serialize;

use super::SystemId;

/// One execution window inside a frame. Stages run in the order of
/// [`Stage::ALL`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Stage {
    /// Runs once, on the first [`Scheduler::run`](crate::Scheduler::run).
    Startup,
    FrameStart,
    BeforeUpdate,
    #[default]
    Update,
    AfterUpdate,
    FrameEnd,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Startup,
        Stage::FrameStart,
        Stage::BeforeUpdate,
        Stage::Update,
        Stage::AfterUpdate,
        Stage::FrameEnd,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Startup => "Startup",
            Stage::FrameStart => "FrameStart",
            Stage::BeforeUpdate => "BeforeUpdate",
            Stage::Update => "Update",
            Stage::AfterUpdate => "AfterUpdate",
            Stage::FrameEnd => "FrameEnd",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Top-level systems of every stage, in registration order.
///
/// Systems linked before/after another system are *not* listed here; they are
/// reached through their parent.
#[derive(Default)]
pub(crate) struct StageRegistry {
    lists: [Vec<SystemId>; Stage::ALL.len()],
}

impl StageRegistry {
    pub(crate) fn push(&mut self, stage: Stage, id: SystemId) {
        self.lists[stage.index()].push(id);
    }

    /// Remove `id` from whichever stage lists it. Returns the stage it left.
    pub(crate) fn remove(&mut self, id: SystemId) -> Option<Stage> {
        for stage in Stage::ALL {
            let list = &mut self.lists[stage.index()];
            if let Some(pos) = list.iter().position(|&s| s == id) {
                list.remove(pos);
                return Some(stage);
            }
        }
        None
    }

    pub(crate) fn systems(&self, stage: Stage) -> &[SystemId] {
        &self.lists[stage.index()]
    }

    pub(crate) fn clear(&mut self, stage: Stage) {
        self.lists[stage.index()].clear();
    }

    pub(crate) fn stage_of(&self, id: SystemId) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|&stage| self.lists[stage.index()].contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_totally_ordered() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::default(), Stage::Update);
    }

    #[test]
    fn registry_keeps_registration_order() {
        let mut registry = StageRegistry::default();
        registry.push(Stage::Update, SystemId(2));
        registry.push(Stage::Update, SystemId(0));
        registry.push(Stage::FrameEnd, SystemId(1));
        assert_eq!(registry.systems(Stage::Update), &[SystemId(2), SystemId(0)]);

        assert_eq!(registry.remove(SystemId(2)), Some(Stage::Update));
        assert_eq!(registry.systems(Stage::Update), &[SystemId(0)]);
        assert_eq!(registry.stage_of(SystemId(1)), Some(Stage::FrameEnd));
        assert_eq!(registry.remove(SystemId(2)), None);
    }
}
