use std::f32::consts::{FRAC_PI_4, FRAC_PI_8, TAU};

use rand::Rng;
use tracing::debug;

use crate::motion::actor::{Actor, ActorId, TargetRef};
use crate::motion::constants::{flee, retry};
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::geometry::project_to_first_collision;
use crate::motion::services::{MotionContext, MoveSpline, PathRequest};
use crate::motion::timer::TimeTracker;
use crate::motion::unit_state::UnitState;
use crate::util::vec2::normalize_orientation;

/// Distance and absolute angle of the next flee leg.
///
/// `source` is the fear source's distance to the actor and the bearing from
/// the source towards the actor. The actor tries to settle inside the quiet
/// band around the source.
pub fn flee_leg(source: Option<(f32, f32)>, rng: &mut impl Rng) -> (f32, f32) {
    let (source_distance, away) = match source {
        Some((distance, bearing)) if distance > flee::MIN_SOURCE_DISTANCE => (distance, bearing),
        Some((distance, _)) => (distance, rng.gen_range(0.0..TAU)),
        None => (0.0, rng.gen_range(0.0..TAU)),
    };

    let band = flee::MAX_QUIET_DISTANCE - flee::MIN_QUIET_DISTANCE;
    let (distance, angle) = if source_distance < flee::MIN_QUIET_DISTANCE {
        (
            rng.gen_range(0.4..=1.3) * (flee::MIN_QUIET_DISTANCE - source_distance),
            away + rng.gen_range(-FRAC_PI_8..=FRAC_PI_8),
        )
    } else if source_distance > flee::MAX_QUIET_DISTANCE {
        (
            rng.gen_range(0.4..=1.0) * band,
            -away + rng.gen_range(-FRAC_PI_4..=FRAC_PI_4),
        )
    } else {
        (rng.gen_range(0.6..=1.2) * band, rng.gen_range(0.0..TAU))
    };
    (distance, normalize_orientation(angle))
}

/// Run from a fear source, optionally for a fixed time
#[derive(Debug, Clone)]
pub struct FleeingMovement {
    source: Option<TargetRef>,
    timer: TimeTracker,
    total: Option<TimeTracker>,
}

impl FleeingMovement {
    pub fn new(source: Option<ActorId>) -> Self {
        Self {
            source: source.map(TargetRef::new),
            timer: TimeTracker::default(),
            total: None,
        }
    }

    pub fn timed(source: Option<ActorId>, duration_ms: u32) -> Self {
        Self {
            total: Some(TimeTracker::new(duration_ms)),
            ..Self::new(source)
        }
    }

    pub fn kind(&self) -> MovementGeneratorType {
        if self.total.is_some() {
            MovementGeneratorType::TimedFleeing
        } else {
            MovementGeneratorType::Fleeing
        }
    }

    fn set_target_location(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if actor.is_movement_blocked() {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return;
        }

        let source = self
            .source
            .and_then(|source| source.resolve(ctx.actors))
            .map(|view| {
                (
                    view.position.distance_to(actor.position),
                    view.position.angle_towards(actor.position),
                )
            });
        let (distance, angle) = flee_leg(source, &mut *ctx.rng);
        let destination = project_to_first_collision(ctx.world, actor.position, distance, angle);

        if !ctx.world.line_of_sight(actor.position, destination) {
            self.timer.reset(retry::LOS_BLOCKED_MS);
            return;
        }

        let request = PathRequest::to(destination).with_length_limit(retry::PATH_LENGTH_LIMIT);
        let path = ctx.compute_path(actor, &request);
        if !path.is_usable_for_escape() {
            debug!("Actor {} flee path rejected ({:?})", actor.id, path.kind);
            ctx.note_path_failure();
            self.timer.reset(retry::PATH_FAILED_MS);
            return;
        }

        core.interrupted = false;
        core.speed_update_pending = false;
        actor.add_state(UnitState::FLEEING_MOVE);
        let travel = ctx.launch(actor, MoveSpline::along(path.points).with_walk(false));
        let pause = ctx
            .rng
            .gen_range(retry::RELAUNCH_DELAY_MIN_MS..=retry::RELAUNCH_DELAY_MAX_MS);
        self.timer.reset(travel.saturating_add(pause));
    }
}

impl Motion for FleeingMovement {
    fn initialize(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if !actor.alive {
            return;
        }
        self.set_target_location(core, actor, ctx);
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

        if let Some(total) = self.total.as_mut() {
            total.update(diff_ms);
            if total.passed() {
                return Progress::Done;
            }
        }

        if actor.is_movement_blocked() {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return Progress::Continue;
        }
        core.interrupted = false;

        self.timer.update(diff_ms);
        let finished = ctx.spline_finished(actor);
        if (core.speed_update_pending && !finished) || (self.timer.passed() && finished) {
            self.set_target_location(core, actor, ctx);
        }
        Progress::Continue
    }

    fn deactivate(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        actor.clear_state(UnitState::FLEEING_MOVE);
    }

    fn finalize(
        &mut self,
        _core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        active: bool,
        inform: bool,
    ) -> Option<GeneratorRequest> {
        if !active {
            return None;
        }
        if self.total.is_none() {
            actor.clear_state(UnitState::FLEEING_MOVE);
            return None;
        }

        if let Some(victim) = actor.victim.filter(|_| actor.alive) {
            ctx.hooks.resume_attack(actor, victim);
        }
        if inform {
            ctx.inform(actor, MovementGeneratorType::TimedFleeing, 0);
        }
        None
    }
}
