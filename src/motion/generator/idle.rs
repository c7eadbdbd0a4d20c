use crate::motion::actor::Actor;
use crate::motion::generator::{GeneratorCore, Motion, Progress};
use crate::motion::services::MotionContext;

/// Stand still. The fallback of every stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleMovement;

impl Motion for IdleMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if !ctx.spline_finished(actor) {
            ctx.stop_moving(actor);
        }
    }

    fn update(
        &mut self,
        _core: &mut GeneratorCore,
        _actor: &mut Actor,
        _ctx: &mut MotionContext<'_>,
        _diff_ms: u32,
    ) -> Progress {
        Progress::Continue
    }
}
