//! Movement generators.
//!
//! A generator is one behavior (wander, chase, patrol, ...) plus the
//! lifecycle bookkeeping every behavior shares. [`MovementGenerator`] owns the
//! shared part and dispatches to the variant through a closed enum; the
//! variants only see the [`Motion`] hooks.
//!
//! Lifecycle: `Pending -> Active <-> Deactivated -> Finalized`. Base unit
//! state tags are held exactly while the generator is `Active`.

mod chase;
mod confused;
mod distract;
mod fleeing;
mod follow;
mod generic;
mod home;
mod idle;
mod point;
mod random;
mod rotate;
mod spline_chain;
mod waypoint;

use std::sync::Arc;

use tracing::{debug, error};

pub use chase::ChaseMovement;
pub use confused::{confused_hop, ConfusedMovement};
pub use distract::DistractMovement;
pub use fleeing::{flee_leg, FleeingMovement};
pub use follow::FollowMovement;
pub use generic::GenericMovement;
pub use home::HomeMovement;
pub use idle::IdleMovement;
pub use point::PointMovement;
pub use random::{wander_leg, RandomMovement};
pub use rotate::{RotateDirection, RotateMovement};
pub use spline_chain::{SplineChainLink, SplineChainMovement, SplineChainResumeInfo};
pub use waypoint::WaypointMovement;

use crate::motion::actor::{Actor, ActorId};
use crate::motion::geometry::{ChaseAngle, ChaseRange};
use crate::motion::services::{MotionContext, MoveSpline, Path, SplineMover};
use crate::motion::unit_state::UnitState;
use crate::motion::waypoints::WaypointPath;
use crate::util::vec2::Vec2;

/// Kind of a generator, reported to the behavior layer on inform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementGeneratorType {
    Idle,
    Random,
    Waypoint,
    Confused,
    Chase,
    Home,
    Point,
    Assistance,
    Fleeing,
    TimedFleeing,
    Distract,
    AssistanceDistract,
    Follow,
    Rotate,
    /// Scripted one-off spline such as a jump or knockback
    Effect,
    Generic,
    SplineChain,
}

/// Stacking mode; override generators always sit above default ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotionMode {
    Default,
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotionPriority {
    None,
    Normal,
    Highest,
}

/// Where a request lands in the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSlot {
    /// The fallback generator used when nothing else is queued
    Default,
    /// The ordered stack of active generators
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Pending,
    Active,
    Deactivated,
    Finalized,
}

/// Result of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    /// Pop and finalize with inform
    Done,
}

/// A generator queued as a consequence of another one finishing
#[derive(Debug)]
pub struct GeneratorRequest {
    pub slot: MotionSlot,
    pub generator: MovementGenerator,
}

/// State shared by every variant
#[derive(Debug, Clone)]
pub struct GeneratorCore {
    pub mode: MotionMode,
    pub priority: MotionPriority,
    /// Tags held while this generator controls the actor
    pub base_state: UnitState,
    lifecycle: Lifecycle,
    /// Reached the goal; finalize may notify the behavior layer
    pub inform_enabled: bool,
    pub speed_update_pending: bool,
    /// Movement was cut short and should be relaunched
    pub interrupted: bool,
    pub paused: bool,
    pub timed_paused: bool,
}

impl GeneratorCore {
    fn new(priority: MotionPriority, base_state: UnitState) -> Self {
        Self {
            mode: MotionMode::Default,
            priority,
            base_state,
            lifecycle: Lifecycle::Pending,
            inform_enabled: false,
            speed_update_pending: false,
            interrupted: false,
            paused: false,
            timed_paused: false,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}

/// Per-variant hooks driven by [`MovementGenerator`]
pub(crate) trait Motion {
    /// First time the generator becomes the stack top
    fn initialize(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>);

    /// Regains the top after a deactivation
    fn reset(&mut self, core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        self.initialize(core, actor, ctx);
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress;

    /// Superseded; drop movement tags but keep progress
    fn deactivate(&mut self, _core: &mut GeneratorCore, _actor: &mut Actor, _ctx: &mut MotionContext<'_>) {}

    /// Permanent removal. `active` is true when the generator was in
    /// control right up to this call.
    fn finalize(
        &mut self,
        _core: &mut GeneratorCore,
        _actor: &mut Actor,
        _ctx: &mut MotionContext<'_>,
        _active: bool,
        _inform: bool,
    ) -> Option<GeneratorRequest> {
        None
    }

    fn speed_changed(&mut self) {}

    /// Returns false when the variant cannot be paused
    fn pause(&mut self, _core: &mut GeneratorCore, _timer_ms: u32) -> bool {
        false
    }

    fn resume(&mut self, _core: &mut GeneratorCore, _override_timer_ms: u32) {}
}

#[derive(Debug, Clone)]
enum Behavior {
    Idle(IdleMovement),
    Random(RandomMovement),
    Waypoint(WaypointMovement),
    Point(PointMovement),
    Rotate(RotateMovement),
    Distract(DistractMovement),
    Confused(ConfusedMovement),
    Fleeing(FleeingMovement),
    Chase(ChaseMovement),
    Follow(FollowMovement),
    Home(HomeMovement),
    Generic(GenericMovement),
    SplineChain(SplineChainMovement),
}

impl Behavior {
    fn motion(&mut self) -> &mut dyn Motion {
        match self {
            Behavior::Idle(m) => m,
            Behavior::Random(m) => m,
            Behavior::Waypoint(m) => m,
            Behavior::Point(m) => m,
            Behavior::Rotate(m) => m,
            Behavior::Distract(m) => m,
            Behavior::Confused(m) => m,
            Behavior::Fleeing(m) => m,
            Behavior::Chase(m) => m,
            Behavior::Follow(m) => m,
            Behavior::Home(m) => m,
            Behavior::Generic(m) => m,
            Behavior::SplineChain(m) => m,
        }
    }

    fn kind(&self) -> MovementGeneratorType {
        match self {
            Behavior::Idle(_) => MovementGeneratorType::Idle,
            Behavior::Random(_) => MovementGeneratorType::Random,
            Behavior::Waypoint(_) => MovementGeneratorType::Waypoint,
            Behavior::Point(m) => m.kind(),
            Behavior::Rotate(_) => MovementGeneratorType::Rotate,
            Behavior::Distract(m) => m.kind(),
            Behavior::Confused(_) => MovementGeneratorType::Confused,
            Behavior::Fleeing(m) => m.kind(),
            Behavior::Chase(_) => MovementGeneratorType::Chase,
            Behavior::Follow(_) => MovementGeneratorType::Follow,
            Behavior::Home(_) => MovementGeneratorType::Home,
            Behavior::Generic(m) => m.kind(),
            Behavior::SplineChain(_) => MovementGeneratorType::SplineChain,
        }
    }

    /// Default priority and base tags of each variant
    fn defaults(&self) -> (MotionPriority, UnitState) {
        use MovementGeneratorType as Kind;
        match self.kind() {
            Kind::Idle => (MotionPriority::Normal, UnitState::empty()),
            Kind::Random | Kind::Waypoint | Kind::Home | Kind::Point | Kind::Assistance => {
                (MotionPriority::Normal, UnitState::ROAMING)
            }
            Kind::Effect | Kind::Generic | Kind::SplineChain => (MotionPriority::Normal, UnitState::ROAMING),
            Kind::Confused => (MotionPriority::Highest, UnitState::CONFUSED),
            Kind::Fleeing | Kind::TimedFleeing => (MotionPriority::Highest, UnitState::FLEEING),
            Kind::Distract => (MotionPriority::Highest, UnitState::DISTRACTED),
            Kind::AssistanceDistract => (MotionPriority::Normal, UnitState::DISTRACTED),
            Kind::Chase => (MotionPriority::Normal, UnitState::CHASE),
            Kind::Follow => (MotionPriority::Normal, UnitState::FOLLOW),
            Kind::Rotate => (MotionPriority::Normal, UnitState::ROTATING),
        }
    }
}

/// One entry of a motion stack
#[derive(Debug, Clone)]
pub struct MovementGenerator {
    core: GeneratorCore,
    behavior: Behavior,
}

impl MovementGenerator {
    fn from_behavior(behavior: Behavior) -> Self {
        let (priority, base_state) = behavior.defaults();
        Self {
            core: GeneratorCore::new(priority, base_state),
            behavior,
        }
    }

    pub fn idle() -> Self {
        IdleMovement.into()
    }

    /// Wander around the position the actor has when it starts. A radius of
    /// zero uses the actor's spawn wander radius.
    pub fn random(radius: f32) -> Self {
        RandomMovement::new(radius).into()
    }

    /// Patrol a path from the waypoint store; `None` uses the actor's
    /// spawn path
    pub fn waypoint(path_id: Option<u32>, repeating: bool) -> Self {
        WaypointMovement::from_store(path_id, repeating).into()
    }

    /// Patrol a path built by the caller
    pub fn waypoint_path(path: WaypointPath, repeating: bool) -> Self {
        WaypointMovement::from_path(Arc::new(path), repeating).into()
    }

    pub fn point(id: u32, destination: Vec2) -> Self {
        PointMovement::new(id, destination).into()
    }

    /// Run to `destination` and call for help on arrival
    pub fn assistance(destination: Vec2) -> Self {
        PointMovement::assistance(destination).into()
    }

    pub fn home() -> Self {
        HomeMovement::new().into()
    }

    pub fn rotate(id: u32, duration_ms: u32, direction: RotateDirection) -> Self {
        RotateMovement::new(id, duration_ms, direction).into()
    }

    pub fn distract(duration_ms: u32, orientation: f32) -> Self {
        DistractMovement::new(duration_ms, orientation).into()
    }

    pub fn assistance_distract(duration_ms: u32, orientation: f32) -> Self {
        DistractMovement::assistance(duration_ms, orientation).into()
    }

    pub fn confused() -> Self {
        ConfusedMovement::new().into()
    }

    pub fn fleeing(source: Option<ActorId>) -> Self {
        FleeingMovement::new(source).into()
    }

    pub fn timed_fleeing(source: Option<ActorId>, duration_ms: u32) -> Self {
        FleeingMovement::timed(source, duration_ms).into()
    }

    pub fn chase(target: ActorId, range: Option<ChaseRange>, angle: Option<ChaseAngle>) -> Self {
        ChaseMovement::new(target, range, angle).into()
    }

    pub fn follow(target: ActorId, range: f32, angle: Option<ChaseAngle>) -> Self {
        FollowMovement::new(target, range, angle).into()
    }

    pub fn generic(spline: MoveSpline, kind: MovementGeneratorType, id: u32) -> Self {
        GenericMovement::new(spline, kind, id).into()
    }

    pub fn spline_chain(id: u32, chain: Vec<SplineChainLink>, walk: bool) -> Self {
        SplineChainMovement::new(id, chain, walk).into()
    }

    pub fn with_mode(mut self, mode: MotionMode) -> Self {
        self.core.mode = mode;
        self
    }

    pub fn with_priority(mut self, priority: MotionPriority) -> Self {
        self.core.priority = priority;
        self
    }

    pub fn kind(&self) -> MovementGeneratorType {
        self.behavior.kind()
    }

    pub fn mode(&self) -> MotionMode {
        self.core.mode
    }

    pub fn priority(&self) -> MotionPriority {
        self.core.priority
    }

    pub fn base_state(&self) -> UnitState {
        self.core.base_state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle
    }

    pub fn core(&self) -> &GeneratorCore {
        &self.core
    }

    /// Target of a chase generator
    pub fn chase_target(&self) -> Option<ActorId> {
        match &self.behavior {
            Behavior::Chase(chase) => Some(chase.target()),
            _ => None,
        }
    }

    /// Path a chase generator last sent to the spline service
    pub fn chase_path(&self) -> Option<&Path> {
        match &self.behavior {
            Behavior::Chase(chase) => chase.path(),
            _ => None,
        }
    }

    /// Target of a follow generator
    pub fn follow_target(&self) -> Option<ActorId> {
        match &self.behavior {
            Behavior::Follow(follow) => Some(follow.target()),
            _ => None,
        }
    }

    /// Snapshot of a running spline chain so it can be restarted later
    pub fn spline_chain_resume_info(&self, actor: &Actor, splines: &dyn SplineMover) -> Option<SplineChainResumeInfo> {
        match &self.behavior {
            Behavior::SplineChain(chain) => chain.resume_info(actor, splines),
            _ => None,
        }
    }

    /// Waypoint path that has to exist in the store before this generator
    /// can start
    pub fn stored_waypoint_path(&self, actor: &Actor) -> Option<u32> {
        match &self.behavior {
            Behavior::Waypoint(waypoint) => waypoint.stored_path_id(actor),
            _ => None,
        }
    }

    /// Move the anchor of a wander generator
    pub fn set_wander_anchor(&mut self, anchor: Vec2) -> bool {
        match &mut self.behavior {
            Behavior::Random(random) => {
                random.set_anchor(anchor);
                true
            }
            _ => false,
        }
    }

    /// Bring the generator into control: initialize on first use, reset
    /// after a deactivation
    pub fn activate(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        match self.core.lifecycle {
            Lifecycle::Pending => {
                self.core.lifecycle = Lifecycle::Active;
                actor.add_state(self.core.base_state);
                ctx.stats.generators_initialized += 1;
                debug!("Actor {} initializing {:?}", actor.id, self.kind());
                self.behavior.motion().initialize(&mut self.core, actor, ctx);
            }
            Lifecycle::Deactivated => {
                self.core.lifecycle = Lifecycle::Active;
                actor.add_state(self.core.base_state);
                debug!("Actor {} resetting {:?}", actor.id, self.kind());
                self.behavior.motion().reset(&mut self.core, actor, ctx);
            }
            Lifecycle::Active | Lifecycle::Finalized => {}
        }
    }

    pub fn update(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, diff_ms: u32) -> Progress {
        match self.core.lifecycle {
            Lifecycle::Finalized => {
                error!("Actor {} updated a finalized {:?} generator", actor.id, self.kind());
                return Progress::Done;
            }
            Lifecycle::Pending | Lifecycle::Deactivated => self.activate(actor, ctx),
            Lifecycle::Active => {}
        }
        self.behavior.motion().update(&mut self.core, actor, ctx, diff_ms)
    }

    /// Stop driving the actor while staying on the stack. Only an active
    /// generator is affected, so repeated calls are no-ops.
    pub fn deactivate(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if self.core.lifecycle != Lifecycle::Active {
            return;
        }
        self.core.lifecycle = Lifecycle::Deactivated;
        actor.clear_state(self.core.base_state);
        debug!("Actor {} deactivating {:?}", actor.id, self.kind());
        self.behavior.motion().deactivate(&mut self.core, actor, ctx);
    }

    /// Remove permanently. An active generator leaves the actor standing.
    /// Returns a follow-up the stack should queue.
    pub fn finalize(
        &mut self,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        was_active: bool,
        inform: bool,
    ) -> Option<GeneratorRequest> {
        if self.core.lifecycle == Lifecycle::Finalized {
            return None;
        }
        let active = was_active && self.core.lifecycle == Lifecycle::Active;
        self.core.lifecycle = Lifecycle::Finalized;
        if active {
            actor.clear_state(self.core.base_state);
            ctx.stop_moving(actor);
        }
        ctx.stats.generators_finalized += 1;
        debug!("Actor {} finalizing {:?} (active: {}, inform: {})", actor.id, self.kind(), active, inform);
        self.behavior.motion().finalize(&mut self.core, actor, ctx, active, inform)
    }

    pub fn speed_changed(&mut self) {
        self.core.speed_update_pending = true;
        self.behavior.motion().speed_changed();
    }

    /// Pause a wander or patrol. A zero timer pauses until resumed.
    /// Returns false when this kind cannot be paused.
    pub fn pause(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, timer_ms: u32) -> bool {
        if !self.behavior.motion().pause(&mut self.core, timer_ms) {
            return false;
        }
        if self.core.lifecycle == Lifecycle::Active {
            self.core.interrupted = true;
            ctx.stop_moving(actor);
        }
        true
    }

    pub fn resume(&mut self, override_timer_ms: u32) {
        self.behavior.motion().resume(&mut self.core, override_timer_ms);
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MovementGenerator {
                fn from(movement: $ty) -> Self {
                    MovementGenerator::from_behavior(Behavior::$variant(movement))
                }
            }
        )*
    };
}

impl_from_variant! {
    Idle => IdleMovement,
    Random => RandomMovement,
    Waypoint => WaypointMovement,
    Point => PointMovement,
    Rotate => RotateMovement,
    Distract => DistractMovement,
    Confused => ConfusedMovement,
    Fleeing => FleeingMovement,
    Chase => ChaseMovement,
    Follow => FollowMovement,
    Home => HomeMovement,
    Generic => GenericMovement,
    SplineChain => SplineChainMovement,
}
