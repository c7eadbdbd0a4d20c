use crate::motion::actor::{Actor, ActorId, ActorView, TargetRef};
use crate::motion::constants::follow::{CHECK_INTERVAL_MS, RANGE_TOLERANCE};
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::geometry::{near_point, ChaseAngle};
use crate::motion::services::{Facing, MotionContext, MoveSpline, PathRequest};
use crate::motion::timer::TimeTracker;
use crate::motion::unit_state::UnitState;
use crate::util::vec2::{normalize_orientation, Vec2};

/// Trail another actor at a fixed range, matching its gait and facing
#[derive(Debug, Clone)]
pub struct FollowMovement {
    target: TargetRef,
    range: f32,
    angle: Option<ChaseAngle>,
    check_timer: TimeTracker,
    last_target_position: Option<Vec2>,
    duration: Option<TimeTracker>,
}

impl FollowMovement {
    pub fn new(target: ActorId, range: f32, angle: Option<ChaseAngle>) -> Self {
        Self {
            target: TargetRef::new(target),
            range,
            angle,
            check_timer: TimeTracker::new(CHECK_INTERVAL_MS),
            last_target_position: None,
            duration: None,
        }
    }

    /// Give up following after `duration_ms`
    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration = Some(TimeTracker::new(duration_ms));
        self
    }

    pub fn target(&self) -> ActorId {
        self.target.id()
    }

    fn position_okay(actor: &Actor, target: &ActorView, range: f32, angle: Option<&ChaseAngle>) -> bool {
        let reach = actor.combat_reach + target.combat_reach + range;
        if actor.position.distance_sq_to(target.position) > reach * reach {
            return false;
        }
        angle.map_or(true, |angle| angle.is_angle_okay(target.relative_angle_of(actor.position)))
    }

    /// Bearing relative to the target the follower should aim for
    fn pick_angle(&self, actor: &Actor, target: &ActorView) -> f32 {
        let current = target.relative_angle_of(actor.position);
        let Some(angle) = self.angle else {
            return current;
        };
        if angle.is_angle_okay(current) {
            return current;
        }
        let diff_upper = normalize_orientation(current - angle.upper_bound());
        let diff_lower = normalize_orientation(angle.lower_bound() - current);
        if diff_upper < diff_lower {
            angle.upper_bound()
        } else {
            angle.lower_bound()
        }
    }

    fn sync_pet_speed(actor: &mut Actor, target: &ActorView) {
        if actor.is_pet && actor.owner == Some(target.id) {
            actor.speeds.run = target.run_speed;
        }
    }

    fn settle(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>, target: ActorId) {
        core.inform_enabled = false;
        actor.clear_state(UnitState::FOLLOW_MOVE);
        ctx.inform(actor, MovementGeneratorType::Follow, target);
    }
}

impl Motion for FollowMovement {
    fn initialize(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        core.inform_enabled = true;
        ctx.stop_moving(actor);
        if let Some(target) = self.target.resolve(ctx.actors) {
            Self::sync_pet_speed(actor, target);
        }
        self.last_target_position = None;
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
        let Some(target) = self.target.resolve(ctx.actors).copied() else {
            return Progress::Done;
        };

        if let Some(duration) = self.duration.as_mut() {
            duration.update(diff_ms);
            if duration.passed() {
                return Progress::Done;
            }
        }

        if actor.is_movement_blocked() {
            ctx.stop_moving(actor);
            self.last_target_position = None;
            return Progress::Continue;
        }

        self.check_timer.update(diff_ms);
        if self.check_timer.passed() {
            self.check_timer.reset(CHECK_INTERVAL_MS);
            if core.inform_enabled && Self::position_okay(actor, &target, self.range, self.angle.as_ref()) {
                ctx.stop_moving(actor);
                self.last_target_position = None;
                self.settle(core, actor, ctx, target.id);
                return Progress::Continue;
            }
        }

        if actor.has_state(UnitState::FOLLOW_MOVE) && ctx.spline_finished(actor) {
            actor.clear_state(UnitState::FOLLOW_MOVE);
            if core.inform_enabled {
                self.settle(core, actor, ctx, target.id);
            }
        }

        if self.last_target_position == Some(target.position) {
            return Progress::Continue;
        }
        self.last_target_position = Some(target.position);

        if !actor.has_state(UnitState::FOLLOW_MOVE)
            && Self::position_okay(actor, &target, self.range + RANGE_TOLERANCE, None)
        {
            return Progress::Continue;
        }

        let relative = self.pick_angle(actor, &target);
        let destination = near_point(
            &target,
            actor.combat_reach,
            self.range,
            target.to_absolute_angle(relative),
            ctx.world,
        );
        let shortcut = actor.is_pet && actor.owner == Some(target.id);
        let computed = ctx.compute_path(actor, &PathRequest::to(destination).with_shortcut(shortcut));
        if !computed.is_walkable() {
            ctx.note_path_failure();
            ctx.stop_moving(actor);
            return Progress::Continue;
        }

        Self::sync_pet_speed(actor, &target);
        actor.add_state(UnitState::FOLLOW_MOVE);
        core.inform_enabled = true;
        ctx.launch(
            actor,
            MoveSpline::along(computed.points)
                .with_walk(target.walking)
                .with_facing(Facing::Angle(target.orientation)),
        );
        Progress::Continue
    }

    fn deactivate(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        actor.clear_state(UnitState::FOLLOW_MOVE);
    }

    fn finalize(
        &mut self,
        _core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        active: bool,
        _inform: bool,
    ) -> Option<GeneratorRequest> {
        if active {
            actor.clear_state(UnitState::FOLLOW_MOVE);
            if let Some(target) = self.target.resolve(ctx.actors) {
                Self::sync_pet_speed(actor, target);
            }
        }
        None
    }

    fn speed_changed(&mut self) {
        self.last_target_position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::generator::test_support::Harness;
    use crate::motion::generator::MovementGenerator;
    use crate::motion::services::PathType;
    use std::f32::consts::FRAC_PI_2;

    fn setup() -> (Harness, Actor, Actor) {
        let mut harness = Harness::new();
        let mut target = Actor::new(2, Vec2::new(10.0, 0.0));
        target.combat_reach = 0.0;
        harness.observe(&target);
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.combat_reach = 0.0;
        (harness, actor, target)
    }

    #[test]
    fn test_moves_to_range_behind_bearing() {
        let (mut harness, mut actor, _) = setup();
        let mut generator = MovementGenerator::follow(2, 2.0, None);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.paths.requests[0].destination.approx_eq(Vec2::new(8.0, 0.0), 1e-4));
        assert!(!harness.paths.requests[0].allow_shortcut);
        let spline = &harness.splines.launched[0];
        assert_eq!(spline.facing, Some(Facing::Angle(0.0)));
        assert!(!spline.walk);
        assert!(actor.has_state(UnitState::FOLLOW_MOVE));
    }

    #[test]
    fn test_matches_target_gait() {
        let (mut harness, mut actor, mut target) = setup();
        target.walking = true;
        harness.observe(&target);
        let mut generator = MovementGenerator::follow(2, 2.0, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.splines.launched[0].walk);
    }

    #[test]
    fn test_arrival_informs_once() {
        let (mut harness, mut actor, _) = setup();
        let mut generator = MovementGenerator::follow(2, 2.0, None);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        harness.splines.complete(&mut actor);
        for _ in 0..10 {
            generator.update(&mut actor, &mut harness.ctx(), 100);
        }
        assert_eq!(harness.hooks.informs(), vec![(MovementGeneratorType::Follow, 2)]);
        assert_eq!(harness.splines.launched.len(), 1);
        assert!(!actor.has_state(UnitState::FOLLOW_MOVE));
    }

    #[test]
    fn test_within_tolerance_does_not_move() {
        let (mut harness, mut actor, _) = setup();
        actor.position = Vec2::new(7.5, 0.0);
        let mut generator = MovementGenerator::follow(2, 2.0, None);

        // 2.5 away: outside the range but inside the tolerance
        generator.update(&mut actor, &mut harness.ctx(), 50);
        assert!(harness.paths.requests.is_empty());
    }

    #[test]
    fn test_angle_picks_nearer_bound() {
        let (mut harness, mut actor, _) = setup();
        let angle = ChaseAngle::new(FRAC_PI_2, 0.3);
        let mut generator = MovementGenerator::follow(2, 2.0, Some(angle));

        generator.update(&mut actor, &mut harness.ctx(), 100);
        let expected = Vec2::new(10.0, 0.0).offset(FRAC_PI_2 + 0.3, 2.0);
        assert!(harness.paths.requests[0].destination.approx_eq(expected, 1e-4));
    }

    #[test]
    fn test_pet_syncs_speed_and_allows_shortcut() {
        let (mut harness, mut actor, mut target) = setup();
        target.speeds.run = 11.0;
        harness.observe(&target);
        actor.is_pet = true;
        actor.owner = Some(2);

        let mut generator = MovementGenerator::follow(2, 2.0, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(actor.speeds.run, 11.0);
        assert!(harness.paths.requests[0].allow_shortcut);
    }

    #[test]
    fn test_no_path_stops() {
        let (mut harness, mut actor, _) = setup();
        harness.paths.fail_with = Some(PathType::NOPATH);
        let mut generator = MovementGenerator::follow(2, 2.0, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.splines.launched.is_empty());
        assert_eq!(harness.stats.path_failures, 1);
    }

    #[test]
    fn test_duration_ends_follow() {
        let (mut harness, mut actor, _) = setup();
        let mut generator: MovementGenerator = FollowMovement::new(2, 2.0, None).with_duration(300).into();
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
    }

    #[test]
    fn test_target_left_world() {
        let (mut harness, mut actor, mut target) = setup();
        let mut generator = MovementGenerator::follow(2, 2.0, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        target.in_world = false;
        harness.observe(&target);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
    }
}
