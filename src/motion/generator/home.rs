use crate::motion::actor::Actor;
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::services::{Facing, MotionContext, MoveSpline, PathRequest};
use crate::motion::unit_state::UnitState;

/// Run back to the home position after evading
#[derive(Debug, Clone, Default)]
pub struct HomeMovement;

impl HomeMovement {
    pub fn new() -> Self {
        Self
    }

    fn set_target_location(&self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        // Finish on the next update instead of staying stuck in evade
        if actor.unit_state.intersects(UnitState::NOT_MOVE) {
            core.interrupted = true;
            return;
        }

        let home = actor.home;
        let computed = ctx.compute_path(actor, &PathRequest::to(home.position).with_shortcut(true));
        let spline = if computed.is_walkable() {
            MoveSpline::along(computed.points)
        } else {
            MoveSpline::to(actor.position, home.position)
        };

        actor.add_state(UnitState::ROAMING_MOVE);
        ctx.launch(
            actor,
            spline.with_walk(false).with_facing(Facing::Angle(home.orientation)),
        );
    }
}

impl Motion for HomeMovement {
    fn initialize(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        self.set_target_location(core, actor, ctx);
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        _diff_ms: u32,
    ) -> Progress {
        // An interrupted return never counts as reaching home
        if core.interrupted || actor.unit_state.intersects(UnitState::NOT_MOVE) {
            core.interrupted = true;
            return Progress::Done;
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
            actor.clear_state(UnitState::ROAMING_MOVE | UnitState::EVADE);
        }
        if inform && core.inform_enabled {
            ctx.inform(actor, MovementGeneratorType::Home, 0);
            ctx.hooks.just_reached_home(actor);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::generator::test_support::{Harness, HookEvent};
    use crate::motion::generator::MovementGenerator;
    use crate::util::vec2::Vec2;

    #[test]
    fn test_runs_home_and_clears_evade() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.home.orientation = 1.25;
        actor.position = Vec2::new(30.0, 0.0);
        actor.add_state(UnitState::EVADE);
        let mut generator = MovementGenerator::home();

        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
        let spline = &harness.splines.launched[0];
        assert!(!spline.walk);
        assert_eq!(spline.destination(), Some(Vec2::ZERO));
        assert_eq!(spline.facing, Some(Facing::Angle(1.25)));

        harness.splines.complete(&mut actor);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
        generator.finalize(&mut actor, &mut harness.ctx(), true, true);

        assert!(!actor.has_state(UnitState::EVADE | UnitState::ROAMING_MOVE | UnitState::ROAMING));
        assert_eq!(
            harness.hooks.events,
            vec![HookEvent::Inform(MovementGeneratorType::Home, 0), HookEvent::ReachedHome]
        );
    }

    #[test]
    fn test_rooted_actor_gives_up() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.position = Vec2::new(30.0, 0.0);
        actor.add_state(UnitState::ROOT);
        let mut generator = MovementGenerator::home();

        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
        assert!(harness.splines.launched.is_empty());

        generator.finalize(&mut actor, &mut harness.ctx(), true, true);
        assert!(harness.hooks.events.is_empty());
    }

    #[test]
    fn test_stunned_on_the_way_home_does_not_inform() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.position = Vec2::new(30.0, 0.0);
        actor.add_state(UnitState::EVADE);
        let mut generator = MovementGenerator::home();

        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Continue);
        assert_eq!(harness.splines.launched.len(), 1);

        actor.add_state(UnitState::STUNNED);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
        generator.finalize(&mut actor, &mut harness.ctx(), true, true);

        assert!(harness.hooks.events.is_empty());
        assert!(harness.splines.moving.is_empty());
        assert!(actor.position.approx_eq(Vec2::new(30.0, 0.0), 1e-6));
        assert!(!actor.has_state(UnitState::EVADE));
    }
}
