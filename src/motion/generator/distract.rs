use crate::motion::actor::Actor;
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::services::MotionContext;

/// Stand still facing a direction for a while
#[derive(Debug, Clone)]
pub struct DistractMovement {
    remaining_ms: u32,
    orientation: f32,
    /// Pause after a seek-assistance run
    assistance: bool,
}

impl DistractMovement {
    pub fn new(duration_ms: u32, orientation: f32) -> Self {
        Self {
            remaining_ms: duration_ms,
            orientation,
            assistance: false,
        }
    }

    pub fn assistance(duration_ms: u32, orientation: f32) -> Self {
        Self {
            assistance: true,
            ..Self::new(duration_ms, orientation)
        }
    }

    pub fn kind(&self) -> MovementGeneratorType {
        if self.assistance {
            MovementGeneratorType::AssistanceDistract
        } else {
            MovementGeneratorType::Distract
        }
    }
}

impl Motion for DistractMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        ctx.stop_moving(actor);
        ctx.face(actor, self.orientation);
    }

    fn update(
        &mut self,
        _core: &mut GeneratorCore,
        _actor: &mut Actor,
        _ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress {
        if self.remaining_ms > diff_ms {
            self.remaining_ms -= diff_ms;
            return Progress::Continue;
        }
        self.remaining_ms = 0;
        Progress::Done
    }

    fn finalize(
        &mut self,
        _core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        _active: bool,
        inform: bool,
    ) -> Option<GeneratorRequest> {
        if !inform {
            return None;
        }
        if self.assistance {
            ctx.inform(actor, MovementGeneratorType::AssistanceDistract, 0);
        } else {
            let home_orientation = actor.home.orientation;
            ctx.face(actor, home_orientation);
        }
        None
    }
}
