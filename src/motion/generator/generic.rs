use tracing::{debug, error};

use crate::motion::actor::{Actor, ActorId};
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::services::{MotionContext, MoveSpline};
use crate::motion::timer::TimeTracker;

/// Run a spline built by the caller and report back when it ends
#[derive(Debug, Clone)]
pub struct GenericMovement {
    spline: MoveSpline,
    kind: MovementGeneratorType,
    id: u32,
    duration: TimeTracker,
    arrival_spell: Option<(u32, Option<ActorId>)>,
    finished: bool,
}

impl GenericMovement {
    pub fn new(spline: MoveSpline, kind: MovementGeneratorType, id: u32) -> Self {
        Self {
            spline,
            kind,
            id,
            duration: TimeTracker::default(),
            arrival_spell: None,
            finished: false,
        }
    }

    pub fn with_arrival_spell(mut self, spell_id: u32, target: Option<ActorId>) -> Self {
        self.arrival_spell = Some((spell_id, target));
        self
    }

    pub fn kind(&self) -> MovementGeneratorType {
        self.kind
    }
}

impl Motion for GenericMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if self.spline.path.len() < 2 {
            error!("Actor {} got an empty {:?} spline (id {})", actor.id, self.kind, self.id);
            self.finished = true;
            return;
        }
        let duration = ctx.launch(actor, self.spline.clone());
        self.duration.reset(duration);
    }

    fn reset(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        debug!("Actor {} relaunching {:?} spline {}", actor.id, self.kind, self.id);
        self.initialize(core, actor, ctx);
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

        // Cyclic splines never expire
        if !ctx.splines.is_cyclic(actor) {
            self.duration.update(diff_ms);
        }
        if self.duration.passed() || ctx.spline_finished(actor) {
            core.inform_enabled = true;
            return Progress::Done;
        }
        Progress::Continue
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
            if let Some((spell_id, target)) = self.arrival_spell {
                ctx.hooks.cast_spell(actor, spell_id, target);
            }
            ctx.inform(actor, self.kind, u64::from(self.id));
        }
        None
    }
}
