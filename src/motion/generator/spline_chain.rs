//! Multi-leg scripted movement.
//!
//! Legs are sent one at a time. The countdown to the next leg is scaled by
//! how long the spline service actually took versus the scripted expectation,
//! so clamped speeds do not make later legs fire early.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::motion::actor::Actor;
use crate::motion::error::MotionError;
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::services::{MotionContext, MoveSpline, SplineMover};
use crate::motion::unit_state::UnitState;
use crate::util::vec2::Vec2;

/// One leg of a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineChainLink {
    pub points: Vec<Vec2>,
    /// Zero keeps the actor's own speed
    #[serde(default)]
    pub velocity: f32,
    pub expected_duration_ms: u32,
    /// Delay before the following leg starts
    pub time_to_next_ms: u32,
}

impl SplineChainLink {
    pub fn new(points: Vec<Vec2>, velocity: f32, expected_duration_ms: u32, time_to_next_ms: u32) -> Self {
        Self {
            points,
            velocity,
            expected_duration_ms,
            time_to_next_ms,
        }
    }
}

/// Where a chain was when it got interrupted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineChainResumeInfo {
    pub point_id: u32,
    pub chain: Vec<SplineChainLink>,
    pub walk: bool,
    /// Leg to continue with
    pub spline_index: usize,
    /// Point inside that leg the actor was heading to; zero starts the leg over
    pub point_index: usize,
    pub time_to_next_ms: u32,
}

impl SplineChainResumeInfo {
    pub fn validate(&self) -> Result<(), MotionError> {
        if self.chain.is_empty() {
            return Err(MotionError::EmptySplineChain(self.point_id));
        }
        if self.spline_index > self.chain.len() {
            return Err(MotionError::InvalidResumeState(format!(
                "leg {} of a {}-leg chain",
                self.spline_index,
                self.chain.len()
            )));
        }
        if let Some(link) = self.chain.get(self.spline_index) {
            if self.point_index > 0 && self.point_index >= link.points.len() {
                return Err(MotionError::InvalidResumeState(format!(
                    "point {} of a {}-point leg",
                    self.point_index,
                    link.points.len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SplineChainMovement {
    id: u32,
    chain: Vec<SplineChainLink>,
    walk: bool,
    next_index: usize,
    next_first_point: usize,
    /// Zero once the final leg is in flight
    ms_to_next: u32,
    /// Offset of the running spline's first point inside its leg
    leg_offset: usize,
    finished: bool,
}

impl SplineChainMovement {
    pub fn new(id: u32, chain: Vec<SplineChainLink>, walk: bool) -> Self {
        Self {
            id,
            chain,
            walk,
            next_index: 0,
            next_first_point: 0,
            ms_to_next: 0,
            leg_offset: 0,
            finished: false,
        }
    }

    /// Pick a chain back up from a saved [`SplineChainResumeInfo`]
    pub fn resume(info: SplineChainResumeInfo) -> Result<Self, MotionError> {
        info.validate()?;
        Ok(Self {
            next_index: info.spline_index,
            next_first_point: info.point_index,
            ms_to_next: info.time_to_next_ms,
            ..Self::new(info.point_id, info.chain, info.walk)
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn send_path(&self, actor: &mut Actor, ctx: &mut MotionContext<'_>, velocity: f32, points: &[Vec2]) -> u32 {
        if points.len() < 2 {
            error!("Actor {} spline chain {} has a leg with {} point(s)", actor.id, self.id, points.len());
            return 0;
        }
        let mut spline = MoveSpline::along(points.iter().copied().collect()).with_walk(self.walk);
        if velocity > 0.0 {
            spline = spline.with_velocity(velocity);
        }
        actor.add_state(UnitState::ROAMING_MOVE);
        ctx.launch(actor, spline)
    }

    /// Send a full leg and rescale the pending countdown
    fn send_leg(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, index: usize) {
        let Some(link) = self.chain.get(index) else {
            return;
        };
        let actual = self.send_path(actor, ctx, link.velocity, &link.points);
        if actual != link.expected_duration_ms && link.expected_duration_ms > 0 {
            let scaled = u64::from(self.ms_to_next) * u64::from(actual) / u64::from(link.expected_duration_ms);
            self.ms_to_next = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
        }
        self.leg_offset = 0;
    }

    /// Start the next full leg, timing the one after it
    fn advance(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        self.ms_to_next = self.chain[self.next_index].time_to_next_ms.max(1);
        self.send_leg(actor, ctx, self.next_index);
        self.next_index += 1;
        if self.next_index >= self.chain.len() {
            self.ms_to_next = 0;
        }
    }

    pub fn resume_info(&self, actor: &Actor, splines: &dyn SplineMover) -> Option<SplineChainResumeInfo> {
        let info = |spline_index: usize, point_index: usize, time_to_next_ms: u32| SplineChainResumeInfo {
            point_id: self.id,
            chain: self.chain.clone(),
            walk: self.walk,
            spline_index,
            point_index,
            time_to_next_ms,
        };

        if self.next_index == 0 {
            return Some(info(0, 0, self.ms_to_next));
        }
        if splines.is_finished(actor) {
            return (self.next_index < self.chain.len()).then(|| info(self.next_index, 0, 1));
        }
        let point = self.leg_offset + splines.current_point_index(actor);
        Some(info(self.next_index - 1, point, self.ms_to_next))
    }
}

impl Motion for SplineChainMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if self.chain.is_empty() {
            warn!("Actor {} got empty spline chain {}", actor.id, self.id);
            self.finished = true;
            return;
        }
        if self.next_index >= self.chain.len() {
            warn!("Actor {} resumed spline chain {} past its last leg", actor.id, self.id);
            self.ms_to_next = 0;
            return;
        }

        if self.next_first_point == 0 {
            self.advance(actor, ctx);
            return;
        }

        let link = &self.chain[self.next_index];
        let last = link.points.len().saturating_sub(1);
        if self.next_first_point > last {
            error!(
                "Actor {} resuming spline chain {} at point {} of {}",
                actor.id,
                self.id,
                self.next_first_point,
                link.points.len()
            );
            self.next_first_point = last.max(1);
        }
        let start = self.next_first_point - 1;
        let velocity = link.velocity;
        let partial = link.points.get(start..).unwrap_or_default().to_vec();
        self.send_path(actor, ctx, velocity, &partial);
        self.leg_offset = start;

        self.next_index += 1;
        if self.next_index >= self.chain.len() {
            self.ms_to_next = 0;
        } else if self.ms_to_next == 0 {
            self.ms_to_next = 1;
        }
        self.next_first_point = 0;
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress {
        if self.finished {
            return Progress::Done;
        }

        if self.ms_to_next == 0 {
            if ctx.spline_finished(actor) {
                core.inform_enabled = true;
                return Progress::Done;
            }
            return Progress::Continue;
        }

        if self.ms_to_next <= diff_ms {
            self.advance(actor, ctx);
        } else {
            self.ms_to_next -= diff_ms;
        }
        Progress::Continue
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
        if inform && core.inform_enabled {
            ctx.inform(actor, MovementGeneratorType::SplineChain, u64::from(self.id));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::generator::test_support::Harness;
    use crate::motion::generator::MovementGenerator;

    fn chain() -> Vec<SplineChainLink> {
        vec![
            SplineChainLink::new(vec![Vec2::ZERO, Vec2::new(5.0, 0.0), Vec2::new(10.0, 0.0)], 0.0, 1000, 1500),
            SplineChainLink::new(vec![Vec2::new(10.0, 0.0), Vec2::new(10.0, 5.0)], 4.0, 500, 800),
            SplineChainLink::new(
                vec![Vec2::new(10.0, 5.0), Vec2::new(15.0, 5.0), Vec2::new(20.0, 5.0), Vec2::new(25.0, 5.0)],
                0.0,
                1000,
                0,
            ),
        ]
    }

    #[test]
    fn test_legs_sent_in_order() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::spline_chain(4, chain(), true);

        generator.update(&mut actor, &mut harness.ctx(), 0);
        assert_eq!(harness.splines.launched.len(), 1);
        assert!(harness.splines.launched[0].walk);
        assert!(actor.has_state(UnitState::ROAMING_MOVE));

        generator.update(&mut actor, &mut harness.ctx(), 1000);
        assert_eq!(harness.splines.launched.len(), 1);
        generator.update(&mut actor, &mut harness.ctx(), 500);
        assert_eq!(harness.splines.launched.len(), 2);
        assert_eq!(harness.splines.launched[1].velocity, Some(4.0));
    }

    #[test]
    fn test_countdown_scaled_by_actual_duration() {
        let mut harness = Harness::new();
        // Second leg expects 500 ms but the mover reports 1000 ms
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::spline_chain(4, chain(), false);
        generator.update(&mut actor, &mut harness.ctx(), 0);
        generator.update(&mut actor, &mut harness.ctx(), 1500);
        assert_eq!(harness.splines.launched.len(), 2);

        // 800 ms scaled by 1000/500
        generator.update(&mut actor, &mut harness.ctx(), 1500);
        assert_eq!(harness.splines.launched.len(), 2);
        generator.update(&mut actor, &mut harness.ctx(), 100);
        assert_eq!(harness.splines.launched.len(), 3);
    }

    #[test]
    fn test_finishes_after_last_leg_lands() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::spline_chain(4, chain(), false);

        generator.update(&mut actor, &mut harness.ctx(), 0);
        generator.update(&mut actor, &mut harness.ctx(), 1500);
        generator.update(&mut actor, &mut harness.ctx(), 1600);
        assert_eq!(harness.splines.launched.len(), 3);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 5000), Progress::Continue);

        harness.splines.complete(&mut actor);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
        generator.finalize(&mut actor, &mut harness.ctx(), true, true);
        assert_eq!(harness.hooks.informs(), vec![(MovementGeneratorType::SplineChain, 4)]);
        assert!(!actor.has_state(UnitState::ROAMING_MOVE));
        assert_eq!(actor.position, Vec2::new(25.0, 5.0));
    }

    #[test]
    fn test_resume_mid_leg_sends_partial_then_full_legs() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::new(12.0, 5.0));
        let info = SplineChainResumeInfo {
            point_id: 4,
            chain: chain(),
            walk: false,
            spline_index: 2,
            point_index: 2,
            time_to_next_ms: 0,
        };
        let mut generator: MovementGenerator = SplineChainMovement::resume(info).unwrap().into();

        generator.update(&mut actor, &mut harness.ctx(), 0);
        let partial = &harness.splines.launched[0];
        assert_eq!(partial.path.as_slice(), &[Vec2::new(15.0, 5.0), Vec2::new(20.0, 5.0), Vec2::new(25.0, 5.0)]);

        harness.splines.complete(&mut actor);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 100), Progress::Done);
    }

    #[test]
    fn test_resume_partial_leg_then_full_leg() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::new(3.0, 0.0));
        let info = SplineChainResumeInfo {
            point_id: 4,
            chain: chain(),
            walk: false,
            spline_index: 0,
            point_index: 1,
            time_to_next_ms: 300,
        };
        let mut generator: MovementGenerator = SplineChainMovement::resume(info).unwrap().into();

        generator.update(&mut actor, &mut harness.ctx(), 0);
        assert_eq!(harness.splines.launched[0].path.len(), 3);
        generator.update(&mut actor, &mut harness.ctx(), 300);
        assert_eq!(harness.splines.launched.len(), 2);
        assert_eq!(harness.splines.launched[1].path.as_slice(), chain()[1].points.as_slice());
    }

    #[test]
    fn test_resume_info_round_trips_through_restart() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::spline_chain(4, chain(), false);

        let fresh = generator.spline_chain_resume_info(&actor, &harness.splines).unwrap();
        assert_eq!((fresh.spline_index, fresh.point_index), (0, 0));

        generator.update(&mut actor, &mut harness.ctx(), 0);
        generator.update(&mut actor, &mut harness.ctx(), 1500);
        harness.splines.point_index = 1;
        let info = generator.spline_chain_resume_info(&actor, &harness.splines).unwrap();
        assert_eq!((info.spline_index, info.point_index), (1, 1));
        assert!(info.validate().is_ok());

        let json = serde_json::to_string(&info).unwrap();
        let restored: SplineChainResumeInfo = serde_json::from_str(&json).unwrap();
        let mut resumed: MovementGenerator = SplineChainMovement::resume(restored).unwrap().into();
        let mut fresh_harness = Harness::new();
        resumed.update(&mut actor, &mut fresh_harness.ctx(), 0);
        assert_eq!(fresh_harness.splines.launched[0].path.as_slice(), chain()[1].points.as_slice());
    }

    #[test]
    fn test_resume_info_after_last_leg_landed() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let single = vec![chain().remove(0)];
        let mut generator = MovementGenerator::spline_chain(4, single, false);
        generator.update(&mut actor, &mut harness.ctx(), 0);
        harness.splines.complete(&mut actor);
        assert!(generator.spline_chain_resume_info(&actor, &harness.splines).is_none());
    }

    #[test]
    fn test_resume_validation() {
        let mut info = SplineChainResumeInfo {
            point_id: 4,
            chain: chain(),
            walk: false,
            spline_index: 4,
            point_index: 0,
            time_to_next_ms: 0,
        };
        assert!(matches!(info.validate(), Err(MotionError::InvalidResumeState(_))));
        info.spline_index = 1;
        info.point_index = 2;
        assert!(matches!(info.validate(), Err(MotionError::InvalidResumeState(_))));
        info.chain.clear();
        assert!(matches!(SplineChainMovement::resume(info), Err(MotionError::EmptySplineChain(4))));
    }

    #[test]
    fn test_empty_chain_finishes_without_inform() {
        let mut harness = Harness::new();
        let mut actor = Actor::new(1, Vec2::ZERO);
        let mut generator = MovementGenerator::spline_chain(9, Vec::new(), false);
        assert_eq!(generator.update(&mut actor, &mut harness.ctx(), 0), Progress::Done);
        generator.finalize(&mut actor, &mut harness.ctx(), true, true);
        assert!(harness.hooks.informs().is_empty());
        assert!(harness.splines.launched.is_empty());
    }
}
