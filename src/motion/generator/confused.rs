use std::f32::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::motion::actor::Actor;
use crate::motion::constants::{confused::MAX_HOP, retry};
use crate::motion::generator::{GeneratorCore, Motion, Progress};
use crate::motion::geometry::project_to_first_collision;
use crate::motion::services::{MotionContext, MoveSpline, PathRequest};
use crate::motion::timer::TimeTracker;
use crate::motion::unit_state::UnitState;
use crate::util::vec2::Vec2;

/// Signed hop length in `[-MAX_HOP, MAX_HOP]` and absolute angle of the
/// next confused stumble
pub fn confused_hop(rng: &mut impl Rng) -> (f32, f32) {
    let distance = 2.0 * MAX_HOP * rng.gen_range(0.0..=1.0) - MAX_HOP;
    let angle = rng.gen_range(0.0..TAU);
    (distance, angle)
}

/// Stumble around the spot where the confusion started
#[derive(Debug, Clone, Default)]
pub struct ConfusedMovement {
    anchor: Vec2,
    timer: TimeTracker,
}

impl ConfusedMovement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }
}

impl Motion for ConfusedMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if !actor.alive {
            return;
        }
        ctx.stop_moving(actor);
        self.timer.reset(0);
        self.anchor = actor.position;
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress {
        if !actor.alive {
            return Progress::Done;
        }

        if actor.is_movement_blocked() {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return Progress::Continue;
        }
        core.interrupted = false;

        self.timer.update(diff_ms);
        let finished = ctx.spline_finished(actor);
        if !((core.speed_update_pending && !finished) || (self.timer.passed() && finished)) {
            return Progress::Continue;
        }
        core.speed_update_pending = false;

        let (distance, angle) = confused_hop(&mut *ctx.rng);
        let destination = project_to_first_collision(ctx.world, self.anchor, distance, angle);

        if !ctx.world.line_of_sight(actor.position, destination) {
            self.timer.reset(retry::LOS_BLOCKED_MS);
            return Progress::Continue;
        }

        let request = PathRequest::to(destination).with_length_limit(retry::PATH_LENGTH_LIMIT);
        let path = ctx.compute_path(actor, &request);
        if !path.is_usable_for_escape() {
            debug!("Actor {} confused path rejected ({:?})", actor.id, path.kind);
            ctx.note_path_failure();
            self.timer.reset(retry::PATH_FAILED_MS);
            return Progress::Continue;
        }

        actor.add_state(UnitState::CONFUSED_MOVE);
        let travel = ctx.launch(actor, MoveSpline::along(path.points).with_walk(true));
        let pause = ctx
            .rng
            .gen_range(retry::RELAUNCH_DELAY_MIN_MS..=retry::RELAUNCH_DELAY_MAX_MS);
        self.timer.reset(travel.saturating_add(pause));
        Progress::Continue
    }

    fn deactivate(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        actor.clear_state(UnitState::CONFUSED_MOVE);
    }
}
