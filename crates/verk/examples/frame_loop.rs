//! Frame Loop — a small particle simulation driven by the scheduler.
//!
//! Shows stages, links, threading modes, and the per-frame report. Frames are
//! streamed to `verk-telemetry`, so the example needs the `diagnostics`
//! feature (on by default):
//!
//! ```text
//! cargo run -p verk-telemetry        # in one terminal
//! cargo run -p verk --example frame_loop
//! ```
//!
//! `VERK_WORKER_THREADS` overrides the worker pool size.

use std::time::Duration;

use verk::prelude::*;

// ── Components ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct Position(f32, f32);

#[derive(Debug)]
struct Velocity(f32, f32);

struct Camera;

// ── Resources ────────────────────────────────────────────────────────────

struct Gravity(f32);

#[derive(Default)]
struct Stats {
    moved: usize,
    below_floor: usize,
}

fn main() -> verk::Result<()> {
    verk::init_logging();

    let config = SchedulerConfig {
        diagnostics_addr: Some(verk::diag::DEFAULT_ADDR.to_string()),
        ..SchedulerConfig::default()
    }
    .with_env_overrides()?;
    let mut scheduler = Scheduler::with_config(&config)?;

    scheduler.insert_resource(Gravity(-9.8));
    scheduler.add_startup_system(spawn_particles);

    let integrate = scheduler
        .add_system(integrate, Stage::Update, ThreadingMode::Auto)
        .id();
    scheduler
        .add_system(apply_gravity, Stage::Update, ThreadingMode::Auto)
        .run_before(integrate)?;
    scheduler
        .add_system(count_below_floor, Stage::Update, ThreadingMode::Auto)
        .run_after(integrate)?;
    scheduler.add_system(follow_camera, Stage::AfterUpdate, ThreadingMode::Single);
    scheduler
        .add_system(print_stats, Stage::FrameEnd, ThreadingMode::Single)
        .run_if(|ctx: &Context| {
            ctx.get::<FrameTime>()
                .is_some_and(|time| time.read().frame_count() % 60 == 0)
        });

    for _ in 0..300 {
        scheduler.run()?;
        std::thread::sleep(Duration::from_millis(16));
    }

    let report = scheduler.last_report();
    for stage in &report.stages {
        log::info!(
            "{}: parallel {:?}, exclusive {:?}",
            stage.stage,
            stage.parallel,
            stage.exclusive
        );
    }
    Ok(())
}

// ── Systems ──────────────────────────────────────────────────────────────

fn spawn_particles(world: Res<World>) {
    let mut world = world.write();
    for i in 0..64 {
        let x = i as f32;
        world.spawn((Position(x, 10.0), Velocity(1.0 - x / 32.0, 0.0)));
    }
    world.spawn((Camera, Position(0.0, 0.0)));
    log::info!("spawned {} entities", world.entity_count());
}

fn apply_gravity(world: Res<World>, gravity: Required<Gravity>, time: Res<FrameTime>) {
    let dv = gravity.read().0 * time.read().delta_secs();
    world.write().for_each_mut::<Velocity>(|_, vel| vel.1 += dv);
}

fn integrate(world: Res<World>, time: Res<FrameTime>, stats: Res<Stats>) {
    let dt = time.read().delta_secs();
    let mut world = world.write();
    let moving: Vec<_> = world.entities_with::<Velocity>();
    for &entity in &moving {
        let Some(&Velocity(dx, dy)) = world.get::<Velocity>(entity) else {
            continue;
        };
        if let Some(pos) = world.get_mut::<Position>(entity) {
            pos.0 += dx * dt;
            pos.1 += dy * dt;
        }
    }
    stats.write().moved = moving.len();
}

fn count_below_floor(world: Res<World>, stats: Res<Stats>) {
    let mut below = 0;
    world.read().for_each::<Position>(|_, pos| {
        if pos.1 < 0.0 {
            below += 1;
        }
    });
    stats.write().below_floor = below;
}

fn follow_camera(world: Res<World>) -> verk::Result<()> {
    let mut world = world.write();
    let (camera, _) = world.single::<Camera>()?;
    let n = world.entities_with::<Velocity>().len() as f32;
    let mut sum = (0.0, 0.0);
    world.for_each::<Position>(|entity, pos| {
        if entity != camera {
            sum.0 += pos.0;
            sum.1 += pos.1;
        }
    });
    if n > 0.0 {
        world.insert(camera, Position(sum.0 / n, sum.1 / n));
    }
    Ok(())
}

fn print_stats(stats: Res<Stats>, time: Res<FrameTime>) {
    let stats = stats.read();
    let time = time.read();
    log::info!(
        "frame {} ({:.0} fps): {} moved, {} below the floor",
        time.frame_count(),
        time.fps(),
        stats.moved,
        stats.below_floor
    );
}
