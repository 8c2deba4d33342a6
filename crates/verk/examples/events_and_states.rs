//! Events and States — a tiny turn-based match driven by events.
//!
//! A `Phase` state moves from `Lobby` to `Playing` to `Finished`. Players
//! score by sending `Scored` events; the scoreboard reads them one frame
//! later and ends the match once someone reaches the target.
//!
//! Run with: `cargo run -p verk --example events_and_states`

use verk::prelude::*;

const TARGET: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Lobby,
    Playing,
    Finished,
}

#[derive(Clone, Debug)]
struct Scored {
    player: usize,
}

#[derive(Default)]
struct Scoreboard {
    points: [u32; 2],
}

struct MatchPlugin;

impl Plugin for MatchPlugin {
    fn build(&self, scheduler: &mut Scheduler) {
        scheduler.add_event::<Scored>().add_state(Phase::Lobby);
        scheduler.add_system(start_match, Stage::FrameStart, ThreadingMode::Auto);
        scheduler
            .add_system(take_turn, Stage::Update, ThreadingMode::Auto)
            .run_if(in_state(Phase::Playing));
        scheduler
            .add_system(tally, Stage::AfterUpdate, ThreadingMode::Single)
            .run_if(in_state(Phase::Playing));
        scheduler
            .add_system(announce, Stage::FrameEnd, ThreadingMode::Auto)
            .run_if(state_changed::<Phase>());
    }
}

fn main() -> verk::Result<()> {
    verk::init_logging();

    let mut scheduler = Scheduler::new();
    scheduler.add_plugin(MatchPlugin);

    for _ in 0..64 {
        scheduler.run()?;
        let finished = scheduler
            .resource::<State<Phase>>()
            .is_some_and(|state| *state.read().get() == Phase::Finished);
        if finished {
            break;
        }
    }

    if let Some(board) = scheduler.resource::<Scoreboard>() {
        let points = board.read().points;
        log::info!("final score {} : {}", points[0], points[1]);
    }
    Ok(())
}

fn start_match(phase: CurrentState<Phase>) {
    if phase.is(&Phase::Lobby) {
        phase.set(Phase::Playing);
    }
}

fn take_turn(time: Res<FrameTime>, scored: EventWriter<Scored>) {
    let frame = time.read().frame_count() as usize;
    if frame % 2 == 0 {
        scored.send(Scored { player: frame / 2 % 2 });
    }
}

fn tally(board: Res<Scoreboard>, scored: EventReader<Scored>, phase: CurrentState<Phase>) {
    let mut board = board.write();
    for Scored { player } in scored.read() {
        board.points[player] += 1;
        if board.points[player] >= TARGET {
            phase.set(Phase::Finished);
        }
    }
}

fn announce(phase: CurrentState<Phase>) {
    log::info!("match phase is now {:?}", phase.get());
}
