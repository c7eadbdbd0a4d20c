use std::f32::consts::TAU;

use tracing::warn;

use crate::motion::actor::Actor;
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::services::MotionContext;
use crate::util::vec2::normalize_orientation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    /// Counter-clockwise
    Left,
    /// Clockwise
    Right,
}

/// One full turn in place over a fixed duration
#[derive(Debug, Clone)]
pub struct RotateMovement {
    id: u32,
    remaining_ms: u32,
    duration_ms: u32,
    direction: RotateDirection,
}

impl RotateMovement {
    pub fn new(id: u32, duration_ms: u32, direction: RotateDirection) -> Self {
        Self {
            id,
            remaining_ms: duration_ms,
            duration_ms,
            direction,
        }
    }
}

impl Motion for RotateMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if self.duration_ms == 0 {
            warn!("Actor {} rotate {} requested with zero duration", actor.id, self.id);
        }
        ctx.stop_moving(actor);
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress {
        if self.duration_ms == 0 {
            return Progress::Done;
        }

        let sign = match self.direction {
            RotateDirection::Left => 1.0,
            RotateDirection::Right => -1.0,
        };
        let step = diff_ms as f32 * TAU / self.duration_ms as f32 * sign;
        let angle = normalize_orientation(actor.orientation + step);
        actor.orientation = angle;
        ctx.face(actor, angle);

        if self.remaining_ms > diff_ms {
            self.remaining_ms -= diff_ms;
            return Progress::Continue;
        }
        core.inform_enabled = true;
        Progress::Done
    }

    fn finalize(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        _active: bool,
        inform: bool,
    ) -> Option<GeneratorRequest> {
        if inform && core.inform_enabled {
            ctx.inform(actor, MovementGeneratorType::Rotate, u64::from(self.id));
        }
        None
    }
}
