use tracing::debug;

use crate::motion::actor::{Actor, ActorId, ActorView, ChaseGait, TargetRef};
use crate::motion::constants::chase::RANGE_CHECK_INTERVAL_MS;
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::geometry::{near_point, position_okay, shorten_path_until_dist, ChaseAngle, ChaseBand, ChaseRange};
use crate::motion::services::{Facing, MotionContext, MoveSpline, Path, PathRequest, WorldQuery};
use crate::motion::timer::TimeTracker;
use crate::motion::unit_state::UnitState;
use crate::util::vec2::Vec2;

/// Close in on a target and keep within a distance band and bearing
#[derive(Debug, Clone)]
pub struct ChaseMovement {
    target: TargetRef,
    range: Option<ChaseRange>,
    angle: Option<ChaseAngle>,
    range_check: TimeTracker,
    last_target_position: Option<Vec2>,
    mutual_chase: bool,
    path: Option<Path>,
}

impl ChaseMovement {
    pub fn new(target: ActorId, range: Option<ChaseRange>, angle: Option<ChaseAngle>) -> Self {
        Self {
            target: TargetRef::new(target),
            range,
            angle,
            range_check: TimeTracker::new(RANGE_CHECK_INTERVAL_MS),
            last_target_position: None,
            mutual_chase: false,
            path: None,
        }
    }

    pub fn target(&self) -> ActorId {
        self.target.id()
    }

    /// Last path sent to the spline service
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    fn settle(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, target: &ActorView) {
        self.path = None;
        actor.orientation = actor.position.angle_towards(target.position);
        ctx.inform(actor, MovementGeneratorType::Chase, target.id);
    }

    fn walk_for(actor: &Actor) -> bool {
        if actor.is_pet {
            return false;
        }
        match actor.profile.chase {
            ChaseGait::Run => false,
            ChaseGait::CanWalk => actor.walking,
            ChaseGait::AlwaysWalk => true,
        }
    }
}

impl Motion for ChaseMovement {
    fn initialize(&mut self, core: &mut GeneratorCore, _actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        core.inform_enabled = true;
        self.path = None;
        self.last_target_position = None;
        self.range_check.reset(RANGE_CHECK_INTERVAL_MS);
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

        if actor.is_movement_blocked() || actor.victim != Some(target.id) {
            ctx.stop_moving(actor);
            actor.clear_state(UnitState::CHASE_MOVE);
            self.last_target_position = None;
            self.path = None;
            actor.cannot_reach_target = false;
            return Progress::Continue;
        }

        let mutual_chase = target.chase_target == Some(actor.id);
        let hitbox_sum = actor.combat_reach + target.combat_reach;
        let band = ChaseBand::resolve(self.range.as_ref(), hitbox_sum, actor.melee_range(target.combat_reach));
        let angle = if mutual_chase { None } else { self.angle };
        let in_position = |position: Vec2, world: &dyn WorldQuery| {
            position_okay(
                position,
                &target,
                Some(band.min_range),
                Some(band.max_range),
                angle.as_ref(),
                world,
            )
        };

        self.range_check.update(diff_ms);
        if self.range_check.passed() {
            self.range_check.reset(RANGE_CHECK_INTERVAL_MS);
            if core.inform_enabled && in_position(actor.position, ctx.world) {
                core.inform_enabled = false;
                ctx.stop_moving(actor);
                self.settle(actor, ctx, &target);
                return Progress::Continue;
            }
        }

        if actor.has_state(UnitState::CHASE_MOVE) && ctx.spline_finished(actor) {
            actor.clear_state(UnitState::CHASE_MOVE);
            if core.inform_enabled {
                core.inform_enabled = false;
                self.settle(actor, ctx, &target);
            }
        }

        if self.last_target_position == Some(target.position) && mutual_chase == self.mutual_chase {
            return Progress::Continue;
        }
        self.last_target_position = Some(target.position);
        self.mutual_chase = mutual_chase;

        if !actor.has_state(UnitState::CHASE_MOVE) && in_position(actor.position, ctx.world) {
            return Progress::Continue;
        }

        if !ctx.world.is_accessible_for(actor, &target) {
            debug!("Actor {} cannot reach chase target {}", actor.id, target.id);
            actor.cannot_reach_target = true;
            ctx.stop_moving(actor);
            self.path = None;
            return Progress::Continue;
        }

        let move_toward = actor.position.distance_sq_to(target.position) > band.max_range * band.max_range;
        let (destination, shorten) = if move_toward && angle.is_none() {
            (target.position, true)
        } else {
            let distance = if move_toward { band.max_target } else { band.min_target } - hitbox_sum;
            let bearing = match angle {
                Some(angle) => target.to_absolute_angle(angle.relative),
                None => target.position.angle_towards(actor.position),
            };
            (near_point(&target, actor.combat_reach, distance, bearing, ctx.world), false)
        };

        let computed = ctx.compute_path(actor, &PathRequest::to(destination));
        if !computed.is_walkable() {
            debug!("Actor {} has no path to chase target {}", actor.id, target.id);
            ctx.note_path_failure();
            actor.cannot_reach_target = true;
            ctx.stop_moving(actor);
            self.path = None;
            return Progress::Continue;
        }

        let mut points = computed.points;
        if shorten {
            shorten_path_until_dist(&mut points, target.position, band.max_target, ctx.world);
        }
        actor.cannot_reach_target = false;

        let walk = Self::walk_for(actor);
        actor.add_state(UnitState::CHASE_MOVE);
        core.inform_enabled = true;
        self.path = Some(points.clone());
        ctx.launch(
            actor,
            MoveSpline::along(points)
                .with_walk(walk)
                .with_facing(Facing::Target(target.id)),
        );
        Progress::Continue
    }

    fn deactivate(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        actor.clear_state(UnitState::CHASE_MOVE);
        actor.cannot_reach_target = false;
    }

    fn finalize(
        &mut self,
        _core: &mut GeneratorCore,
        actor: &mut Actor,
        _ctx: &mut MotionContext<'_>,
        active: bool,
        _inform: bool,
    ) -> Option<GeneratorRequest> {
        if active {
            actor.clear_state(UnitState::CHASE_MOVE);
            actor.cannot_reach_target = false;
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
    use std::f32::consts::PI;

    fn setup(distance: f32) -> (Harness, Actor, Actor) {
        let mut harness = Harness::new();
        let mut target = Actor::new(2, Vec2::new(distance, 0.0));
        target.combat_reach = 0.0;
        harness.observe(&target);
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.combat_reach = 0.0;
        actor.victim = Some(2);
        (harness, actor, target)
    }

    #[test]
    fn test_paths_to_target_and_shortens() {
        let (mut harness, mut actor, _) = setup(20.0);
        let mut generator = MovementGenerator::chase(2, Some(ChaseRange::between(0.0, 5.0)), None);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(harness.paths.requests.len(), 1);
        assert_eq!(harness.paths.requests[0].destination, Vec2::new(20.0, 0.0));
        let spline = &harness.splines.launched[0];
        assert!(spline.destination().unwrap().approx_eq(Vec2::new(15.5, 0.0), 1e-4));
        assert_eq!(spline.facing, Some(Facing::Target(2)));
        assert!(!spline.walk);
        assert!(actor.has_state(UnitState::CHASE | UnitState::CHASE_MOVE));
    }

    #[test]
    fn test_arrival_informs_once() {
        let (mut harness, mut actor, _) = setup(20.0);
        let mut generator = MovementGenerator::chase(2, Some(ChaseRange::between(0.0, 5.0)), None);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        harness.splines.complete(&mut actor);
        for _ in 0..10 {
            generator.update(&mut actor, &mut harness.ctx(), 100);
        }

        assert_eq!(harness.hooks.informs(), vec![(MovementGeneratorType::Chase, 2)]);
        assert!(!actor.has_state(UnitState::CHASE_MOVE));
        assert_eq!(harness.paths.requests.len(), 1);
        assert!((actor.orientation - 0.0).abs() < 1e-5);
    }

    #[test]
    fn test_settles_in_place_when_already_in_range() {
        let (mut harness, mut actor, _) = setup(3.0);
        let mut generator = MovementGenerator::chase(2, Some(ChaseRange::between(0.0, 5.0)), None);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.paths.requests.is_empty());
        assert_eq!(harness.hooks.informs().len(), 1);
    }

    #[test]
    fn test_target_moving_triggers_new_path() {
        let (mut harness, mut actor, mut target) = setup(20.0);
        let mut generator = MovementGenerator::chase(2, Some(ChaseRange::between(0.0, 5.0)), None);
        generator.update(&mut actor, &mut harness.ctx(), 100);

        target.position = Vec2::new(20.0, 10.0);
        harness.observe(&target);
        generator.update(&mut actor, &mut harness.ctx(), 10);
        assert_eq!(harness.paths.requests.len(), 2);
    }

    #[test]
    fn test_lost_target_stops() {
        let (mut harness, mut actor, _) = setup(20.0);
        let mut generator = MovementGenerator::chase(2, None, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(generator.chase_path().is_some());

        actor.victim = Some(3);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(generator.chase_path().is_none());
        assert!(harness.splines.moving.is_empty());
        assert!(!actor.has_state(UnitState::CHASE_MOVE));
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
    }

    #[test]
    fn test_gone_target_finishes() {
        let (mut harness, mut actor, mut target) = setup(20.0);
        let mut generator = MovementGenerator::chase(2, None, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);

        target.in_world = false;
        harness.observe(&target);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
    }

    #[test]
    fn test_no_path_marks_unreachable() {
        let (mut harness, mut actor, _) = setup(20.0);
        harness.paths.fail_with = Some(PathType::NOPATH);
        let mut generator = MovementGenerator::chase(2, None, None);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(actor.cannot_reach_target);
        assert!(harness.splines.launched.is_empty());
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);

        generator.finalize(&mut actor, &mut harness.ctx(), true, false);
        assert!(!actor.cannot_reach_target);
    }

    #[test]
    fn test_angle_constraint_uses_near_point() {
        let (mut harness, mut actor, _) = setup(20.0);
        // Stand behind the target, which faces +x
        let mut generator = MovementGenerator::chase(
            2,
            Some(ChaseRange::between(0.0, 5.0)),
            Some(ChaseAngle::new(PI, 0.3)),
        );
        generator.update(&mut actor, &mut harness.ctx(), 100);
        let destination = harness.paths.requests[0].destination;
        assert!(destination.approx_eq(Vec2::new(15.5, 0.0), 1e-3));
    }

    #[test]
    fn test_mutual_chase_ignores_angle() {
        let (mut harness, mut actor, target) = setup(3.0);
        harness.actors.insert(ActorView::capture(&target, Some(1)));
        // Actor stands behind the target, outside the requested angle
        let mut generator = MovementGenerator::chase(
            2,
            Some(ChaseRange::between(0.0, 5.0)),
            Some(ChaseAngle::new(0.0, 0.3)),
        );
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.paths.requests.is_empty());
        assert_eq!(harness.hooks.informs().len(), 1);
    }

    #[test]
    fn test_walk_gait() {
        let (mut harness, mut actor, _) = setup(20.0);
        actor.profile.chase = ChaseGait::AlwaysWalk;
        let mut generator = MovementGenerator::chase(2, None, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.splines.launched[0].walk);

        let (mut harness, mut pet, _) = setup(20.0);
        pet.profile.chase = ChaseGait::AlwaysWalk;
        pet.is_pet = true;
        let mut generator = MovementGenerator::chase(2, None, None);
        generator.update(&mut pet, &mut harness.ctx(), 100);
        assert!(!harness.splines.launched[0].walk);
    }

    #[test]
    fn test_speed_change_recomputes() {
        let (mut harness, mut actor, _) = setup(20.0);
        let mut generator = MovementGenerator::chase(2, None, None);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        generator.speed_changed();
        generator.update(&mut actor, &mut harness.ctx(), 10);
        assert_eq!(harness.paths.requests.len(), 2);
    }
}
