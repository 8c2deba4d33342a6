//! The scheduler: registration API and the per-frame driver.
//!
//! ## Example
//!
//! ```ignore
//! use verk::prelude::*;
//!
//! fn main() -> verk::Result<()> {
//!     let mut scheduler = Scheduler::new();
//!     scheduler.add_startup_system(setup);
//!     let physics = scheduler.add_update_system(physics).id();
//!     scheduler
//!         .add_system(sync_transforms, Stage::Update, ThreadingMode::Auto)
//!         .run_after(physics)?;
//!     loop {
//!         scheduler.run()?;
//!     }
//! }
//! ```
//!
//! Every [`run`](Scheduler::run) walks the stages in [`Stage::ALL`] order.
//! Inside a stage the top-level systems are split in two: the ones whose
//! [`ThreadingMode`] and declared resources allow it go to the worker pool,
//! the rest run afterwards on the calling thread, in registration order.

use std::any::TypeId;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;

use crate::config::SchedulerConfig;
use crate::context::Context;
use crate::error::Result;
use crate::resource::Res;
use crate::schedule::graph::{Direction, SystemGraph};
use crate::schedule::report::{FrameReport, StageReport, SystemTiming};
use crate::schedule::stage::{Stage, StageRegistry};
use crate::schedule::unit::Unit;
use crate::schedule::{IntoSystem, SystemId, ThreadingMode};
use crate::time::FrameTime;

/// A plugin can add resources, systems, events and states to a scheduler.
pub trait Plugin {
    fn build(&self, scheduler: &mut Scheduler);
}

/// Where inside a stage a maintenance hook runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HookPoint {
    /// Before the stage's systems are classified.
    Enter,
    /// After the stage's exclusive set finished.
    Exit,
}

/// Driver-owned maintenance step (event buffer swap, state transition).
struct Hook {
    key: TypeId,
    stage: Stage,
    point: HookPoint,
    name: &'static str,
    run: Box<dyn Fn(&Context) + Send + Sync>,
}

/// Owns the context, every registered system, and the worker pool.
pub struct Scheduler {
    ctx: Arc<Context>,
    graph: SystemGraph,
    stages: StageRegistry,
    /// Dedicated pool from [`SchedulerConfig`]; `None` uses rayon's global pool.
    pool: Option<rayon::ThreadPool>,
    hooks: Vec<Hook>,
    report: FrameReport,
    frame: u64,
    #[cfg(feature = "diagnostics")]
    diag: Option<crate::diag::DiagSender>,
}

impl Scheduler {
    /// Create a scheduler that dispatches on rayon's global pool.
    pub fn new() -> Self {
        Self {
            ctx: Arc::new(Context::new()),
            graph: SystemGraph::default(),
            stages: StageRegistry::default(),
            pool: None,
            hooks: Vec::new(),
            report: FrameReport::default(),
            frame: 0,
            #[cfg(feature = "diagnostics")]
            diag: None,
        }
    }

    /// Create a scheduler with its own worker pool.
    pub fn with_config(config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let prefix = config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.resolved_worker_threads())
            .thread_name(move |index| format!("{prefix}-{index}"))
            .build()?;
        log::info!(
            "scheduler worker pool started with {} threads",
            pool.current_num_threads()
        );

        let mut scheduler = Self::new();
        scheduler.pool = Some(pool);

        #[cfg(feature = "diagnostics")]
        if let Some(addr) = &config.diagnostics_addr {
            match crate::diag::DiagSender::connect(addr) {
                Ok(sender) => scheduler.diag = Some(sender),
                Err(err) => log::warn!("diagnostics disabled: cannot reach {addr}: {err}"),
            }
        }
        Ok(scheduler)
    }

    /// The context shared with every system.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register a system as a top-level member of `stage`.
    pub fn add_system<M>(
        &mut self,
        system: impl IntoSystem<M>,
        stage: Stage,
        mode: ThreadingMode,
    ) -> SystemBuilder<'_> {
        let unit = Unit::new(system.into_system(), mode);
        log::debug!("registered `{}` in {stage} ({mode:?})", unit.name);
        let id = self.graph.add(unit);
        self.stages.push(stage, id);
        SystemBuilder {
            scheduler: self,
            id,
        }
    }

    /// Register a system that runs once, on the first [`run`](Self::run).
    pub fn add_startup_system<M>(&mut self, system: impl IntoSystem<M>) -> SystemBuilder<'_> {
        self.add_system(system, Stage::Startup, ThreadingMode::Auto)
    }

    /// Register an `Auto` system in [`Stage::Update`].
    pub fn add_update_system<M>(&mut self, system: impl IntoSystem<M>) -> SystemBuilder<'_> {
        self.add_system(system, Stage::Update, ThreadingMode::Auto)
    }

    /// Re-open the builder of an already registered system.
    pub fn system(&mut self, id: SystemId) -> Result<SystemBuilder<'_>> {
        self.graph.unit(id)?;
        Ok(SystemBuilder {
            scheduler: self,
            id,
        })
    }

    /// Add a run-condition to `id`. All conditions must hold for its body to
    /// execute; its linked systems run regardless.
    pub fn run_if(
        &mut self,
        id: SystemId,
        condition: impl Fn(&Context) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        self.graph.unit_mut(id)?.conditions.push(Box::new(condition));
        Ok(())
    }

    /// Run `child` right after `parent`'s body. On error nothing changes.
    pub fn run_after(&mut self, child: SystemId, parent: SystemId) -> Result<()> {
        self.link(child, parent, Direction::After)
    }

    /// Run `child` right before `parent`'s body. On error nothing changes.
    pub fn run_before(&mut self, child: SystemId, parent: SystemId) -> Result<()> {
        self.link(child, parent, Direction::Before)
    }

    fn link(&mut self, child: SystemId, parent: SystemId, direction: Direction) -> Result<()> {
        self.graph.link(child, parent, direction)?;
        if let Some(stage) = self.stages.remove(child) {
            log::debug!(
                "`{}` now runs through `{}` instead of {stage}",
                self.graph.name(child),
                self.graph.name(parent)
            );
        }
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Would `id` be placed in the exclusive set if its stage started now?
    pub fn is_resource_in_use(&self, id: SystemId) -> Result<bool> {
        Ok(self.graph.unit(id)?.is_resource_in_use(&self.ctx))
    }

    /// Top-level systems of `stage`, in registration order.
    pub fn stage_systems(&self, stage: Stage) -> &[SystemId] {
        self.stages.systems(stage)
    }

    /// The stage listing `id` at top level, `None` for linked systems.
    pub fn stage_of(&self, id: SystemId) -> Option<Stage> {
        self.stages.stage_of(id)
    }

    /// Is `id` nested before or after another system?
    pub fn is_linked(&self, id: SystemId) -> Result<bool> {
        Ok(self.graph.unit(id)?.is_attached())
    }

    pub fn system_name(&self, id: SystemId) -> Result<&str> {
        Ok(self.graph.unit(id)?.name.as_str())
    }

    /// Type names of the resources `id` declared.
    pub fn system_resources(&self, id: SystemId) -> Result<Vec<&'static str>> {
        Ok(self.graph.unit(id)?.decls().iter().map(|d| d.type_name).collect())
    }

    pub fn system_count(&self) -> usize {
        self.graph.len()
    }

    /// Timings and partitions of the most recent [`run`](Self::run).
    pub fn last_report(&self) -> &FrameReport {
        &self.report
    }

    // ── Resources & plugins ─────────────────────────────────────────────

    /// Insert (or overwrite in place) a resource.
    pub fn insert_resource<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.ctx.insert(value);
        self
    }

    /// Make sure a resource exists, building it from `Default` if needed.
    pub fn init_resource<T: Default + Send + Sync + 'static>(&mut self) -> &mut Self {
        self.ctx.resolve::<T>();
        self
    }

    pub fn resource<T: Send + Sync + 'static>(&self) -> Option<Res<T>> {
        self.ctx.get::<T>()
    }

    pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        plugin.build(self);
        self
    }

    /// Register a maintenance step. A second registration with the same
    /// `key` is ignored and returns `false`.
    pub(crate) fn add_hook(
        &mut self,
        key: TypeId,
        stage: Stage,
        point: HookPoint,
        name: &'static str,
        run: impl Fn(&Context) + Send + Sync + 'static,
    ) -> bool {
        if self.hooks.iter().any(|hook| hook.key == key) {
            return false;
        }
        self.hooks.push(Hook {
            key,
            stage,
            point,
            name,
            run: Box::new(run),
        });
        true
    }

    // ── Driver ──────────────────────────────────────────────────────────

    /// One full pass through every stage.
    ///
    /// The first error stops the pass; the report of the partial frame is
    /// still available from [`last_report`](Self::last_report). The
    /// end-of-frame maintenance (event buffer swaps) runs either way.
    pub fn run(&mut self) -> Result<()> {
        let start = Instant::now();
        self.frame += 1;
        let time = self.ctx.resolve::<FrameTime>();
        time.write().advance();

        let timings = Mutex::new(Vec::new());
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        let outcome = self.run_stages(&timings, &mut stages);
        if outcome.is_err() {
            // Close the frame anyway so buffered events are not replayed.
            self.run_hooks(Stage::FrameEnd, HookPoint::Exit);
        }

        self.report = FrameReport {
            frame: self.frame,
            stages,
            systems: timings.into_inner().unwrap_or_else(PoisonError::into_inner),
            total_us: start.elapsed().as_secs_f64() * 1_000_000.0,
        };

        #[cfg(feature = "diagnostics")]
        if let Some(diag) = self.diag.as_mut() {
            diag.send(&self.report, &time.read());
        }

        if let Err(err) = &outcome {
            log::error!("frame {} aborted: {err}", self.frame);
        }
        outcome
    }

    fn run_stages(
        &mut self,
        timings: &Mutex<Vec<SystemTiming>>,
        reports: &mut Vec<StageReport>,
    ) -> Result<()> {
        for stage in Stage::ALL {
            if stage == Stage::Startup {
                if self.stages.systems(stage).is_empty() {
                    continue;
                }
                log::info!(
                    "running {} startup system(s)",
                    self.stages.systems(stage).len()
                );
                let outcome = self.run_stage(stage, timings, reports);
                // Startup systems never run twice, even after a failure.
                self.stages.clear(stage);
                outcome?;
                continue;
            }
            self.run_stage(stage, timings, reports)?;
        }
        Ok(())
    }

    fn run_stage(
        &self,
        stage: Stage,
        timings: &Mutex<Vec<SystemTiming>>,
        reports: &mut Vec<StageReport>,
    ) -> Result<()> {
        let start = Instant::now();
        self.run_hooks(stage, HookPoint::Enter);

        let (exclusive, parallel): (Vec<SystemId>, Vec<SystemId>) = self
            .stages
            .systems(stage)
            .iter()
            .copied()
            .partition(|&id| {
                self.graph
                    .unit(id)
                    .map(|unit| unit.is_resource_in_use(&self.ctx))
                    .unwrap_or(true)
            });
        log::debug!(
            "[{stage}] dispatching {} parallel, {} exclusive",
            parallel.len(),
            exclusive.len()
        );

        let outcome = self.run_parallel(&parallel, stage, timings).and_then(|()| {
            exclusive
                .iter()
                .try_for_each(|&id| self.graph.run(id, &self.ctx, stage, timings))
        });
        if outcome.is_ok() {
            self.run_hooks(stage, HookPoint::Exit);
        }

        let names = |ids: &[SystemId]| -> Vec<String> {
            ids.iter().map(|&id| self.graph.name(id).to_string()).collect()
        };
        reports.push(StageReport {
            stage,
            parallel: names(&parallel),
            exclusive: names(&exclusive),
            duration_us: start.elapsed().as_secs_f64() * 1_000_000.0,
        });
        outcome
    }

    fn run_parallel(
        &self,
        ids: &[SystemId],
        stage: Stage,
        timings: &Mutex<Vec<SystemTiming>>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let graph = &self.graph;
        let ctx: &Context = &self.ctx;
        let dispatch = || {
            ids.par_iter()
                .try_for_each(|&id| graph.run(id, ctx, stage, timings))
        };
        match &self.pool {
            Some(pool) => pool.install(dispatch),
            None => dispatch(),
        }
    }

    fn run_hooks(&self, stage: Stage, point: HookPoint) {
        for hook in self
            .hooks
            .iter()
            .filter(|hook| hook.stage == stage && hook.point == point)
        {
            log::trace!("[{stage}] maintenance `{}`", hook.name);
            (hook.run)(&self.ctx);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned by [`Scheduler::add_system`]; configures the new system.
pub struct SystemBuilder<'s> {
    scheduler: &'s mut Scheduler,
    id: SystemId,
}

impl SystemBuilder<'_> {
    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn run_if(self, condition: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        // The id was validated when the builder was created.
        if let Ok(unit) = self.scheduler.graph.unit_mut(self.id) {
            unit.conditions.push(Box::new(condition));
        }
        self
    }

    pub fn run_after(self, parent: SystemId) -> Result<Self> {
        self.scheduler.run_after(self.id, parent)?;
        Ok(self)
    }

    pub fn run_before(self, parent: SystemId) -> Result<Self> {
        self.scheduler.run_before(self.id, parent)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedError;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(log: &Log, label: &'static str) -> impl FnMut() + Send + 'static {
        let log = Arc::clone(log);
        move || log.lock().unwrap().push(label)
    }

    fn add(scheduler: &mut Scheduler, log: &Log, label: &'static str, mode: ThreadingMode) -> SystemId {
        scheduler
            .add_system(recorder(log, label), Stage::Update, mode)
            .id()
    }

    fn position(order: &[&str], label: &str) -> usize {
        order.iter().position(|&l| l == label).unwrap()
    }

    #[derive(Default)]
    struct Counter(u32);

    fn bump(counter: Res<Counter>) {
        counter.write().0 += 1;
    }

    #[test]
    fn linked_systems_follow_their_links() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let a = add(&mut scheduler, &log, "a", ThreadingMode::Single);
        let b = add(&mut scheduler, &log, "b", ThreadingMode::Single);
        let c = add(&mut scheduler, &log, "c", ThreadingMode::Single);
        let d = add(&mut scheduler, &log, "d", ThreadingMode::Single);
        let e = add(&mut scheduler, &log, "e", ThreadingMode::Single);

        // a -> b -> c, d before c, e after a
        scheduler.run_after(b, a).unwrap();
        scheduler.run_after(c, b).unwrap();
        scheduler.run_before(d, c).unwrap();
        scheduler.run_after(e, a).unwrap();
        scheduler.run().unwrap();

        let order = log.lock().unwrap().clone();
        assert_eq!(order.len(), 5);
        for (first, then) in [("a", "b"), ("b", "c"), ("d", "c"), ("a", "e"), ("b", "d")] {
            assert!(position(&order, first) < position(&order, then), "{order:?}");
        }
        assert_eq!(scheduler.stage_systems(Stage::Update), &[a]);
    }

    #[test]
    fn self_link_fails_and_changes_nothing() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.add_update_system(|| {}).id();
        let err = scheduler.run_after(a, a).unwrap_err();
        assert!(matches!(err, SchedError::SelfDependency { .. }));
        assert_eq!(scheduler.stage_systems(Stage::Update), &[a]);
    }

    #[test]
    fn reverse_link_fails_on_second_call() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.add_update_system(|| {}).id();
        let b = scheduler.add_update_system(|| {}).id();
        scheduler.system(a).unwrap().run_after(b).unwrap();
        let err = scheduler.system(b).unwrap().run_after(a).err().unwrap();
        assert!(matches!(err, SchedError::CyclicDependency { .. }));
        assert_eq!(scheduler.stage_systems(Stage::Update), &[b]);
        assert_eq!(scheduler.stage_of(a), None);
    }

    #[test]
    fn forced_modes_pick_the_partition() {
        let mut scheduler = Scheduler::new();
        let multi = scheduler.add_system(bump, Stage::Update, ThreadingMode::Multi).id();
        let single = scheduler.add_system(|| {}, Stage::Update, ThreadingMode::Single).id();
        assert!(!scheduler.is_resource_in_use(multi).unwrap());
        assert!(scheduler.is_resource_in_use(single).unwrap());

        scheduler.run().unwrap();
        let update = scheduler.last_report().stage(Stage::Update).unwrap();
        assert_eq!(update.parallel, vec!["bump"]);
        assert_eq!(update.exclusive, vec!["<closure>"]);
    }

    #[test]
    fn auto_system_turns_parallel_once_its_resources_exist() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.add_update_system(bump).id();
        assert!(scheduler.is_resource_in_use(id).unwrap());

        scheduler.run().unwrap();
        assert_eq!(
            scheduler.last_report().stage(Stage::Update).unwrap().exclusive,
            vec!["bump"]
        );
        assert!(!scheduler.is_resource_in_use(id).unwrap());

        scheduler.run().unwrap();
        assert_eq!(
            scheduler.last_report().stage(Stage::Update).unwrap().parallel,
            vec!["bump"]
        );
        assert_eq!(scheduler.resource::<Counter>().unwrap().read().0, 2);
    }

    #[test]
    fn startup_systems_run_exactly_once() {
        let mut scheduler = Scheduler::new();
        scheduler.add_startup_system(bump);
        for _ in 0..4 {
            scheduler.run().unwrap();
        }
        assert_eq!(scheduler.resource::<Counter>().unwrap().read().0, 1);
        assert!(scheduler.stage_systems(Stage::Startup).is_empty());
    }

    #[test]
    fn failing_startup_system_is_not_retried() {
        let mut scheduler = Scheduler::new();
        scheduler.add_startup_system(|counter: Res<Counter>| -> Result<()> {
            counter.write().0 += 1;
            Err(SchedError::Config("no".into()))
        });
        assert!(scheduler.run().is_err());
        scheduler.run().unwrap();
        assert_eq!(scheduler.resource::<Counter>().unwrap().read().0, 1);
    }

    #[test]
    fn false_condition_skips_body_but_not_links() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let gate = scheduler
            .add_system(recorder(&log, "gate"), Stage::Update, ThreadingMode::Single)
            .run_if(|_: &Context| false)
            .id();
        let before = add(&mut scheduler, &log, "before", ThreadingMode::Single);
        let after = add(&mut scheduler, &log, "after", ThreadingMode::Single);
        scheduler.run_before(before, gate).unwrap();
        scheduler.run_after(after, gate).unwrap();

        scheduler.run().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
        let skipped: Vec<_> = scheduler
            .last_report()
            .systems
            .iter()
            .filter(|t| !t.ran)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(skipped, vec!["<closure>"]);
    }

    #[test]
    fn conditions_can_read_resources() {
        #[derive(Default)]
        struct Paused(bool);

        let mut scheduler = Scheduler::new();
        scheduler.insert_resource(Paused(true));
        scheduler.add_update_system(bump).run_if(|ctx: &Context| {
            ctx.get::<Paused>().is_some_and(|p| !p.read().0)
        });
        scheduler.run().unwrap();
        assert!(scheduler.resource::<Counter>().is_none());

        scheduler.insert_resource(Paused(false));
        scheduler.run().unwrap();
        assert_eq!(scheduler.resource::<Counter>().unwrap().read().0, 1);
    }

    #[test]
    fn shared_counter_use_count_returns_to_zero() {
        let mut scheduler = Scheduler::new();
        scheduler.add_update_system(bump);
        scheduler.add_update_system(bump);
        scheduler.add_system(bump, Stage::AfterUpdate, ThreadingMode::Auto);
        for _ in 0..3 {
            scheduler.run().unwrap();
            let counter = scheduler.resource::<Counter>().unwrap();
            assert_eq!(counter.use_count(), 0);
        }
        assert_eq!(scheduler.resource::<Counter>().unwrap().read().0, 9);
    }

    #[test]
    fn run_before_removes_from_top_level() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let y = add(&mut scheduler, &log, "y", ThreadingMode::Auto);
        let x = scheduler
            .add_system(recorder(&log, "x"), Stage::Update, ThreadingMode::Auto)
            .run_before(y)
            .unwrap()
            .id();

        assert!(!scheduler.stage_systems(Stage::Update).contains(&x));
        assert!(scheduler.is_linked(x).unwrap());
        assert!(!scheduler.is_linked(y).unwrap());
        scheduler.run().unwrap();
        scheduler.run().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["x", "y", "x", "y"]);
    }

    #[test]
    fn parallel_set_finishes_before_exclusive_set() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        let slow = Arc::clone(&log);
        scheduler.add_system(
            move || {
                std::thread::sleep(Duration::from_millis(20));
                slow.lock().unwrap().push("parallel");
            },
            Stage::Update,
            ThreadingMode::Multi,
        );
        add(&mut scheduler, &log, "first", ThreadingMode::Single);
        add(&mut scheduler, &log, "second", ThreadingMode::Single);

        scheduler.run().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["parallel", "first", "second"]);
    }

    #[test]
    fn stages_run_in_order() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        for stage in Stage::ALL.into_iter().rev() {
            scheduler.add_system(recorder(&log, stage.label()), stage, ThreadingMode::Single);
        }
        scheduler.run().unwrap();
        let expected: Vec<_> = Stage::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[test]
    fn exclusive_error_aborts_the_rest_of_the_frame() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        scheduler.add_system(
            || -> Result<()> { Err(SchedError::Config("boom".into())) },
            Stage::Update,
            ThreadingMode::Single,
        );
        add(&mut scheduler, &log, "skipped", ThreadingMode::Single);
        scheduler.add_system(recorder(&log, "late"), Stage::FrameEnd, ThreadingMode::Single);

        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, SchedError::System { .. }));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.last_report().frame, 1);
    }

    #[test]
    fn parallel_error_skips_exclusive_set() {
        let log = Log::default();
        let mut scheduler = Scheduler::new();
        scheduler.add_system(
            || -> Result<()> { Err(SchedError::Config("boom".into())) },
            Stage::Update,
            ThreadingMode::Multi,
        );
        add(&mut scheduler, &log, "exclusive", ThreadingMode::Single);
        assert!(scheduler.run().is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn foreign_ids_are_rejected() {
        let mut other = Scheduler::new();
        for _ in 0..3 {
            other.add_update_system(|| {});
        }
        let foreign = other.stage_systems(Stage::Update)[2];

        let mut scheduler = Scheduler::new();
        let local = scheduler.add_update_system(|| {}).id();
        assert!(matches!(
            scheduler.run_after(local, foreign),
            Err(SchedError::UnknownSystem { .. })
        ));
        assert!(scheduler.system(foreign).is_err());
    }

    #[test]
    fn configured_pool_runs_parallel_set() {
        let config = SchedulerConfig {
            worker_threads: 2,
            thread_name_prefix: "sim".to_string(),
            diagnostics_addr: None,
        };
        let mut scheduler = Scheduler::with_config(&config).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        scheduler.add_system(
            move || {
                *sink.lock().unwrap() = std::thread::current().name().map(str::to_string);
            },
            Stage::Update,
            ThreadingMode::Multi,
        );
        scheduler.run().unwrap();
        let name = seen.lock().unwrap().clone().unwrap();
        assert!(name.starts_with("sim-"), "{name}");
    }

    #[test]
    fn plugins_register_systems_and_resources() {
        struct CounterPlugin;

        impl Plugin for CounterPlugin {
            fn build(&self, scheduler: &mut Scheduler) {
                scheduler.insert_resource(Counter(10));
                scheduler.add_update_system(bump);
            }
        }

        let mut scheduler = Scheduler::new();
        scheduler.add_plugin(CounterPlugin);
        scheduler.run().unwrap();
        assert_eq!(scheduler.resource::<Counter>().unwrap().read().0, 11);
        assert_eq!(scheduler.system_count(), 1);
    }

    #[test]
    fn frame_time_advances_every_run() {
        let mut scheduler = Scheduler::new();
        scheduler.run().unwrap();
        scheduler.run().unwrap();
        let time = scheduler.resource::<FrameTime>().unwrap();
        assert_eq!(time.read().frame_count(), 2);
        assert_eq!(scheduler.last_report().frame, 2);
    }

    #[test]
    fn hooks_are_keyed() {
        struct Key;
        let mut scheduler = Scheduler::new();
        let hits = Arc::new(Mutex::new(0));
        for _ in 0..2 {
            let hits = Arc::clone(&hits);
            scheduler.add_hook(
                TypeId::of::<Key>(),
                Stage::FrameEnd,
                HookPoint::Exit,
                "count",
                move |_| *hits.lock().unwrap() += 1,
            );
        }
        scheduler.run().unwrap();
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn frame_end_hooks_run_once_on_abort() {
        struct Key;
        let mut scheduler = Scheduler::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        scheduler.add_hook(
            TypeId::of::<Key>(),
            Stage::FrameEnd,
            HookPoint::Exit,
            "count",
            move |_| *counter.lock().unwrap() += 1,
        );
        scheduler.add_system(
            || -> Result<()> { Err(SchedError::Config("boom".into())) },
            Stage::FrameEnd,
            ThreadingMode::Single,
        );
        assert!(scheduler.run().is_err());
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
