use std::f32::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::motion::actor::{Actor, RandomGait};
use crate::motion::constants::{retry, wander};
use crate::motion::generator::{GeneratorCore, Motion, MovementGeneratorType, Progress};
use crate::motion::geometry::project_to_first_collision;
use crate::motion::services::{MotionContext, MoveSpline, PathRequest};
use crate::motion::timer::TimeTracker;
use crate::motion::unit_state::UnitState;
use crate::util::vec2::Vec2;

/// Distance and absolute angle of the next wander destination, measured
/// from the anchor
pub fn wander_leg(radius: f32, rng: &mut impl Rng) -> (f32, f32) {
    let distance = rng.gen_range(0.0..=radius.max(0.0));
    let angle = rng.gen_range(0.0..TAU);
    (distance, angle)
}

fn roll_steps(rng: &mut impl Rng) -> u8 {
    rng.gen_range(wander::MIN_STEPS..=wander::MAX_STEPS)
}

/// Wander around an anchor, resting every few legs
#[derive(Debug, Clone)]
pub struct RandomMovement {
    requested_radius: f32,
    radius: f32,
    /// Anchor set from outside; survives resets
    anchor: Option<Vec2>,
    reference: Vec2,
    steps: u8,
    timer: TimeTracker,
    duration: Option<TimeTracker>,
}

impl RandomMovement {
    pub fn new(radius: f32) -> Self {
        Self {
            requested_radius: radius,
            radius,
            anchor: None,
            reference: Vec2::ZERO,
            steps: 0,
            timer: TimeTracker::default(),
            duration: None,
        }
    }

    /// Stop wandering after `duration_ms`
    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration = Some(TimeTracker::new(duration_ms));
        self
    }

    /// Wander around `anchor` instead of the activation position
    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub(crate) fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = Some(anchor);
        self.reference = anchor;
    }

    pub fn reference(&self) -> Vec2 {
        self.reference
    }

    pub fn remaining_steps(&self) -> u8 {
        self.steps
    }

    fn set_random_location(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if actor.is_movement_blocked() || actor.has_state(UnitState::LOST_CONTROL) {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return;
        }

        let (distance, angle) = wander_leg(self.radius, &mut *ctx.rng);
        let destination = project_to_first_collision(ctx.world, self.reference, distance, angle);

        if !ctx.world.line_of_sight(actor.position, destination) {
            debug!("Actor {} wander destination out of sight, retrying", actor.id);
            self.timer.reset(retry::LOS_BLOCKED_MS);
            return;
        }

        let request = PathRequest::to(destination).with_length_limit(retry::PATH_LENGTH_LIMIT);
        let path = ctx.compute_path(actor, &request);
        if !path.is_usable_for_wander() {
            debug!("Actor {} wander path rejected ({:?}), retrying", actor.id, path.kind);
            ctx.note_path_failure();
            self.timer.reset(retry::PATH_FAILED_MS);
            return;
        }

        core.interrupted = false;
        core.speed_update_pending = false;
        core.timed_paused = false;
        actor.add_state(UnitState::ROAMING_MOVE);

        let walk = match actor.profile.random {
            RandomGait::Walk => true,
            RandomGait::CanRun => actor.walking,
            RandomGait::AlwaysRun => false,
        };
        let duration = ctx.launch(actor, MoveSpline::along(path.points).with_walk(walk));

        self.steps = self.steps.saturating_sub(1);
        if self.steps > 0 {
            self.timer.reset(duration);
        } else {
            let rest_secs = ctx.rng.gen_range(wander::REST_MIN_SECS..=wander::REST_MAX_SECS);
            self.timer.reset(duration.saturating_add(rest_secs * 1000));
            self.steps = roll_steps(&mut *ctx.rng);
        }
    }
}

impl Motion for RandomMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if !actor.alive {
            return;
        }
        self.reference = self.anchor.unwrap_or(actor.position);
        ctx.stop_moving(actor);

        self.radius = if self.requested_radius > 0.0 {
            self.requested_radius
        } else {
            actor.wander_radius
        };
        self.steps = roll_steps(&mut *ctx.rng);
        self.timer.reset(0);
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress {
        if !actor.alive {
            return Progress::Continue;
        }

        if let Some(duration) = self.duration.as_mut() {
            duration.update(diff_ms);
            if duration.passed() {
                core.inform_enabled = true;
                return Progress::Done;
            }
        }

        if core.paused {
            return Progress::Continue;
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
            self.set_random_location(core, actor, ctx);
        }
        Progress::Continue
    }

    fn deactivate(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        actor.clear_state(UnitState::ROAMING_MOVE);
    }

    fn finalize(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        _active: bool,
        inform: bool,
    ) -> Option<super::GeneratorRequest> {
        if inform && core.inform_enabled {
            ctx.inform(actor, MovementGeneratorType::Random, 0);
        }
        None
    }

    fn pause(&mut self, core: &mut GeneratorCore, timer_ms: u32) -> bool {
        if timer_ms > 0 {
            core.timed_paused = true;
            core.paused = false;
            self.timer.reset(timer_ms);
        } else {
            core.paused = true;
            core.timed_paused = false;
        }
        true
    }

    fn resume(&mut self, core: &mut GeneratorCore, override_timer_ms: u32) {
        if override_timer_ms > 0 {
            self.timer.reset(override_timer_ms);
        }
        core.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::generator::test_support::Harness;
    use crate::motion::generator::MovementGenerator;
    use crate::motion::services::PathType;

    fn wanderer() -> Actor {
        let mut actor = Actor::new(1, Vec2::new(10.0, 10.0));
        actor.wander_radius = 8.0;
        actor
    }

    #[test]
    fn test_first_update_launches_leg_inside_radius() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(0.0);

        generator.update(&mut actor, &mut harness.ctx(), 100);

        assert_eq!(harness.splines.launched.len(), 1);
        let end = harness.splines.launched[0].destination().unwrap();
        assert!(end.distance_to(Vec2::new(10.0, 10.0)) <= 8.0 + 1e-4);
        assert!(harness.splines.launched[0].walk);
        assert!(actor.has_state(UnitState::ROAMING | UnitState::ROAMING_MOVE));
        assert_eq!(harness.paths.requests[0].length_limit, Some(retry::PATH_LENGTH_LIMIT));
    }

    #[test]
    fn test_no_relaunch_while_spline_in_flight() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        for _ in 0..20 {
            generator.update(&mut actor, &mut harness.ctx(), 100);
        }
        assert_eq!(harness.splines.launched.len(), 1);
    }

    #[test]
    fn test_los_blocked_retries_without_path_request() {
        let mut harness = Harness::new();
        harness.world.los_blocked = true;
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.paths.requests.is_empty());

        // Retry waits the LOS backoff
        generator.update(&mut actor, &mut harness.ctx(), retry::LOS_BLOCKED_MS - 1);
        assert!(harness.paths.requests.is_empty());

        harness.world.los_blocked = false;
        generator.update(&mut actor, &mut harness.ctx(), 1);
        assert_eq!(harness.splines.launched.len(), 1);
    }

    #[test]
    fn test_shortcut_path_rejected() {
        let mut harness = Harness::new();
        harness.paths.fail_with = Some(PathType::SHORTCUT);
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(harness.paths.requests.len(), 1);
        assert!(harness.splines.launched.is_empty());
        assert_eq!(harness.stats.path_failures, 1);

        generator.update(&mut actor, &mut harness.ctx(), retry::PATH_FAILED_MS);
        assert_eq!(harness.paths.requests.len(), 2);
    }

    #[test]
    fn test_far_from_surface_accepted() {
        let mut harness = Harness::new();
        harness.paths.fail_with = Some(PathType::NORMAL | PathType::FAR_FROM_SURFACE);
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(harness.splines.launched.len(), 1);
    }

    #[test]
    fn test_rest_after_step_budget() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);
        let leg = harness.splines.duration_ms;

        generator.update(&mut actor, &mut harness.ctx(), 0);
        let mut legs_before_rest = 1;
        for _ in 0..12 {
            harness.splines.complete(&mut actor);
            // A plain leg only waits for its own duration
            generator.update(&mut actor, &mut harness.ctx(), leg);
            if harness.splines.launched.len() == legs_before_rest {
                break;
            }
            legs_before_rest = harness.splines.launched.len();
        }

        assert!((2..=10).contains(&legs_before_rest), "legs: {}", legs_before_rest);
    }

    #[test]
    fn test_blocked_actor_interrupted() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);
        generator.update(&mut actor, &mut harness.ctx(), 100);

        actor.add_state(UnitState::ROOT);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(generator.core().interrupted);
        assert!(!actor.has_state(UnitState::ROAMING_MOVE));
        assert!(harness.splines.moving.is_empty());
    }

    #[test]
    fn test_pause_and_resume() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);
        generator.activate(&mut actor, &mut harness.ctx());

        assert!(generator.pause(&mut actor, &mut harness.ctx(), 0));
        generator.update(&mut actor, &mut harness.ctx(), 5000);
        assert!(harness.splines.launched.is_empty());

        generator.resume(300);
        generator.update(&mut actor, &mut harness.ctx(), 200);
        assert!(harness.splines.launched.is_empty());
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(harness.splines.launched.len(), 1);
    }

    #[test]
    fn test_speed_change_relaunches_moving_actor() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(5.0);
        generator.update(&mut actor, &mut harness.ctx(), 100);

        generator.speed_changed();
        generator.update(&mut actor, &mut harness.ctx(), 10);
        assert_eq!(harness.splines.launched.len(), 2);
        assert!(!generator.core().speed_update_pending);
    }

    #[test]
    fn test_anchor_override() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator = MovementGenerator::random(1.0);
        generator.activate(&mut actor, &mut harness.ctx());
        assert!(generator.set_wander_anchor(Vec2::new(100.0, 100.0)));

        generator.update(&mut actor, &mut harness.ctx(), 100);
        let end = harness.splines.launched[0].destination().unwrap();
        assert!(end.distance_to(Vec2::new(100.0, 100.0)) <= 1.0 + 1e-4);
    }

    #[test]
    fn test_timed_wander_informs() {
        let mut harness = Harness::new();
        let mut actor = wanderer();
        let mut generator: MovementGenerator = RandomMovement::new(5.0).with_duration(500).into();

        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 200), Progress::Continue);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 300), Progress::Done);
        generator.finalize(&mut actor, &mut harness.ctx(), true, true);
        assert_eq!(harness.hooks.informs(), vec![(MovementGeneratorType::Random, 0)]);
    }
}
