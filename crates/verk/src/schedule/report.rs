//! What happened during the most recent [`Scheduler::run`](crate::Scheduler::run).

use serde::Serialize;

use super::stage::Stage;

/// Timing of one system body (or its skipped condition check).
#[derive(Clone, Debug, Serialize)]
pub struct SystemTiming {
    pub name: String,
    pub stage: Stage,
    pub duration_us: f64,
    /// `false` when a run-condition kept the body from executing.
    pub ran: bool,
}

/// How one stage was partitioned and how long it took.
#[derive(Clone, Debug, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Names of the systems dispatched to the worker pool.
    pub parallel: Vec<String>,
    /// Names of the systems run on the invoking thread, in order.
    pub exclusive: Vec<String>,
    pub duration_us: f64,
}

/// Per-frame report, replaced at the start of every run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub stages: Vec<StageReport>,
    pub systems: Vec<SystemTiming>,
    pub total_us: f64,
}

impl FrameReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Names of systems whose body actually executed, in completion order.
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().filter(|t| t.ran).map(|t| t.name.as_str())
    }
}
