use tracing::debug;

use crate::motion::actor::{Actor, ActorId};
use crate::motion::constants::distract::ASSISTANCE_DISTRACT_MS;
use crate::motion::generator::{
    GeneratorCore, GeneratorRequest, Motion, MotionSlot, MovementGenerator, MovementGeneratorType, Progress,
};
use crate::motion::geometry::shorten_path_until_dist;
use crate::motion::services::{Facing, MotionContext, MoveSpline, Path, PathRequest};
use crate::motion::unit_state::UnitState;
use crate::util::vec2::Vec2;

/// One-shot move to a destination.
///
/// Also covers the "seek assistance" run, which calls for help on arrival
/// and then stands distracted for a moment.
#[derive(Debug, Clone)]
pub struct PointMovement {
    id: u32,
    kind: MovementGeneratorType,
    destination: Vec2,
    generate_path: bool,
    velocity: Option<f32>,
    final_orientation: Option<f32>,
    face_target: Option<ActorId>,
    walk: Option<bool>,
    close_enough: Option<f32>,
    arrival_spell: Option<(u32, Option<ActorId>)>,
}

impl PointMovement {
    pub fn new(id: u32, destination: Vec2) -> Self {
        Self {
            id,
            kind: MovementGeneratorType::Point,
            destination,
            generate_path: true,
            velocity: None,
            final_orientation: None,
            face_target: None,
            walk: None,
            close_enough: None,
            arrival_spell: None,
        }
    }

    pub fn assistance(destination: Vec2) -> Self {
        Self {
            kind: MovementGeneratorType::Assistance,
            walk: Some(false),
            ..Self::new(0, destination)
        }
    }

    /// Move in a straight line without asking the path service
    pub fn straight(mut self) -> Self {
        self.generate_path = false;
        self
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_orientation(mut self, orientation: f32) -> Self {
        self.final_orientation = Some(orientation);
        self
    }

    pub fn facing(mut self, target: ActorId) -> Self {
        self.face_target = Some(target);
        self
    }

    pub fn with_walk(mut self, walk: bool) -> Self {
        self.walk = Some(walk);
        self
    }

    /// Stop once within `distance` of the destination
    pub fn with_close_enough(mut self, distance: f32) -> Self {
        self.close_enough = Some(distance);
        self
    }

    pub fn with_arrival_spell(mut self, spell_id: u32, target: Option<ActorId>) -> Self {
        self.arrival_spell = Some((spell_id, target));
        self
    }

    pub fn kind(&self) -> MovementGeneratorType {
        self.kind
    }

    pub fn destination(&self) -> Vec2 {
        self.destination
    }

    fn launch(&self, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        let mut points = if self.generate_path {
            let computed = ctx.compute_path(actor, &PathRequest::to(self.destination).with_shortcut(true));
            if computed.is_walkable() {
                computed.points
            } else {
                ctx.note_path_failure();
                straight_line(actor.position, self.destination)
            }
        } else {
            straight_line(actor.position, self.destination)
        };
        if let Some(distance) = self.close_enough {
            shorten_path_until_dist(&mut points, self.destination, distance, ctx.world);
        }

        let mut spline = MoveSpline::along(points).with_walk(self.walk.unwrap_or(actor.walking));
        if let Some(velocity) = self.velocity {
            spline = spline.with_velocity(velocity);
        }
        if let Some(orientation) = self.final_orientation {
            spline = spline.with_facing(Facing::Angle(orientation));
        } else if let Some(target) = self.face_target {
            spline = spline.with_facing(Facing::Target(target));
        }

        actor.add_state(UnitState::ROAMING_MOVE);
        ctx.launch(actor, spline);
    }
}

fn straight_line(from: Vec2, to: Vec2) -> Path {
    let mut path = Path::new();
    path.push(from);
    path.push(to);
    path
}

impl Motion for PointMovement {
    fn initialize(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if actor.is_movement_blocked() {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return;
        }
        self.launch(actor, ctx);
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        _diff_ms: u32,
    ) -> Progress {
        if actor.is_movement_blocked() {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return Progress::Continue;
        }

        let finished = ctx.spline_finished(actor);
        if (core.interrupted && finished) || (core.speed_update_pending && !finished) {
            core.interrupted = false;
            core.speed_update_pending = false;
            self.launch(actor, ctx);
        }

        if ctx.spline_finished(actor) {
            core.inform_enabled = true;
            return Progress::Done;
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
        active: bool,
        inform: bool,
    ) -> Option<GeneratorRequest> {
        if active {
            actor.clear_state(UnitState::ROAMING_MOVE);
        }
        if !inform || !core.inform_enabled {
            return None;
        }

        if self.kind == MovementGeneratorType::Assistance {
            ctx.hooks.call_assistance(actor);
            if !actor.alive {
                return None;
            }
            debug!("Actor {} reached assistance point", actor.id);
            return Some(GeneratorRequest {
                slot: MotionSlot::Active,
                generator: MovementGenerator::assistance_distract(ASSISTANCE_DISTRACT_MS, actor.orientation),
            });
        }

        if let Some((spell_id, target)) = self.arrival_spell {
            ctx.hooks.cast_spell(actor, spell_id, target);
        }
        ctx.inform(actor, self.kind, u64::from(self.id));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::generator::test_support::{Harness, HookEvent};
    use crate::motion::services::PathType;

    #[test]
    fn test_point_move_informs_with_id() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator: MovementGenerator = PointMovement::new(42, Vec2::new(10.0, 0.0))
            .with_arrival_spell(900, None)
            .into();

        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
        assert!(actor.has_state(UnitState::ROAMING_MOVE));

        harness.splines.complete(&mut actor);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
        assert!(generator.finalize(&mut actor, &mut harness.ctx(), true, true).is_none());

        assert_eq!(
            harness.hooks.events,
            vec![
                HookEvent::Spell(900),
                HookEvent::Inform(MovementGeneratorType::Point, 42)
            ]
        );
        assert!(!actor.has_state(UnitState::ROAMING | UnitState::ROAMING_MOVE));
    }

    #[test]
    fn test_cleared_point_does_not_inform() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::point(1, Vec2::new(10.0, 0.0));
        generator.update(&mut actor, &mut harness.ctx(), 100);
        generator.finalize(&mut actor, &mut harness.ctx(), true, false);
        assert!(harness.hooks.events.is_empty());
    }

    #[test]
    fn test_blocked_start_launches_once_free() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.add_state(UnitState::ROOT);
        let mut generator = MovementGenerator::point(1, Vec2::new(10.0, 0.0));

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(harness.splines.launched.is_empty());

        actor.clear_state(UnitState::ROOT);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
        assert_eq!(harness.splines.launched.len(), 1);
    }

    #[test]
    fn test_failed_path_falls_back_to_straight_line() {
        let mut harness = Harness::new();
        harness.paths.fail_with = Some(PathType::NOPATH);
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::point(1, Vec2::new(10.0, 0.0));
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(harness.splines.launched[0].destination(), Some(Vec2::new(10.0, 0.0)));
    }

    #[test]
    fn test_close_enough_shortens() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator: MovementGenerator = PointMovement::new(1, Vec2::new(10.0, 0.0))
            .with_close_enough(2.0)
            .into();
        generator.update(&mut actor, &mut harness.ctx(), 100);
        let end = harness.splines.launched[0].destination().unwrap();
        assert!(end.approx_eq(Vec2::new(8.0, 0.0), 1e-4));
    }

    #[test]
    fn test_assistance_queues_distract() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::assistance(Vec2::new(10.0, 0.0));
        assert_eq!(generator.kind(), MovementGeneratorType::Assistance);

        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert!(!harness.splines.launched[0].walk);
        harness.splines.complete(&mut actor);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);

        let follow_up = generator.finalize(&mut actor, &mut harness.ctx(), true, true).unwrap();
        assert_eq!(follow_up.slot, MotionSlot::Active);
        assert_eq!(follow_up.generator.kind(), MovementGeneratorType::AssistanceDistract);
        assert_eq!(harness.hooks.events, vec![HookEvent::CallAssistance]);
    }
}
