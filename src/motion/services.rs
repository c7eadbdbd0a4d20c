//! Narrow interfaces to the collaborators the motion core drives: the path
//! service, the spline subsystem, world collision queries and the behavior
//! layer. Everything a generator touches outside its own state goes through
//! [`MotionContext`].

use bitflags::bitflags;
use rand::rngs::StdRng;
use smallvec::SmallVec;

use crate::motion::actor::{Actor, ActorId, ActorIndex, ActorView};
use crate::motion::generator::MovementGeneratorType;
use crate::motion::unit_state::UnitState;
use crate::motion::waypoints::WaypointStore;
use crate::util::vec2::Vec2;

/// Polyline handed to the spline subsystem; the first point is the start
pub type Path = SmallVec<[Vec2; 16]>;

/// Total length of a polyline
pub fn path_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| w[0].distance_to(w[1])).sum()
}

bitflags! {
    /// Outcome classification returned by the path service
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PathType: u8 {
        /// Regular navmesh path
        const NORMAL           = 1 << 0;
        /// Straight line, no navmesh path could be found
        const SHORTCUT         = 1 << 1;
        /// Path stops short of the destination
        const INCOMPLETE       = 1 << 2;
        /// No path at all
        const NOPATH           = 1 << 3;
        /// Start or end lies far from any walkable surface
        const FAR_FROM_SURFACE = 1 << 4;
    }
}

/// Request sent to the path service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    pub destination: Vec2,
    /// Accept a straight line when no navmesh path exists
    pub allow_shortcut: bool,
    /// Maximum path length; longer paths are cut
    pub length_limit: Option<f32>,
}

impl PathRequest {
    pub fn to(destination: Vec2) -> Self {
        Self {
            destination,
            allow_shortcut: false,
            length_limit: None,
        }
    }

    pub fn with_length_limit(mut self, limit: f32) -> Self {
        self.length_limit = Some(limit);
        self
    }

    pub fn with_shortcut(mut self, allow: bool) -> Self {
        self.allow_shortcut = allow;
        self
    }
}

/// Path service answer
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedPath {
    pub points: Path,
    pub kind: PathType,
}

impl ComputedPath {
    pub fn no_path() -> Self {
        Self {
            points: Path::new(),
            kind: PathType::NOPATH,
        }
    }

    /// At least one segment and not flagged as "no path"
    pub fn is_walkable(&self) -> bool {
        self.points.len() >= 2 && !self.kind.contains(PathType::NOPATH)
    }

    /// Acceptable as a wander leg. Far-from-surface is tolerated because
    /// swimming actors are routinely far from the navmesh.
    pub fn is_usable_for_wander(&self) -> bool {
        self.is_walkable() && !self.kind.contains(PathType::SHORTCUT)
    }

    /// Acceptable as a flee or confused leg
    pub fn is_usable_for_escape(&self) -> bool {
        self.is_usable_for_wander() && !self.kind.contains(PathType::FAR_FROM_SURFACE)
    }
}

/// Pathfinding/navmesh engine
pub trait PathFinder {
    fn compute_path(&mut self, actor: &Actor, request: &PathRequest) -> ComputedPath;
}

/// Final facing of a spline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Facing {
    Angle(f32),
    Target(ActorId),
    Point(Vec2),
}

/// Movement command handed to the spline subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSpline {
    pub path: Path,
    pub walk: bool,
    pub facing: Option<Facing>,
    /// Overrides the actor's walk/run speed
    pub velocity: Option<f32>,
    /// Loop forever
    pub cyclic: bool,
    /// Points are offsets in the actor's transport frame
    pub transport_local: bool,
}

impl MoveSpline {
    pub fn along(path: Path) -> Self {
        Self {
            path,
            walk: false,
            facing: None,
            velocity: None,
            cyclic: false,
            transport_local: false,
        }
    }

    /// Straight move from `from` to `to`
    pub fn to(from: Vec2, to: Vec2) -> Self {
        let mut path = Path::new();
        path.push(from);
        path.push(to);
        Self::along(path)
    }

    /// Zero-length spline, used to turn in place
    pub fn in_place(at: Vec2, facing: f32) -> Self {
        Self::to(at, at).with_facing(Facing::Angle(facing))
    }

    pub fn with_walk(mut self, walk: bool) -> Self {
        self.walk = walk;
        self
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn cyclic(mut self) -> Self {
        self.cyclic = true;
        self
    }

    pub fn transport_local(mut self) -> Self {
        self.transport_local = true;
        self
    }

    pub fn destination(&self) -> Option<Vec2> {
        self.path.last().copied()
    }

    pub fn length(&self) -> f32 {
        path_length(&self.path)
    }
}

/// Spline/animation subsystem that physically moves actors
pub trait SplineMover {
    /// Start moving the actor; returns the expected duration in ms
    fn launch(&mut self, actor: &mut Actor, spline: MoveSpline) -> u32;

    /// True when the actor has no spline in flight
    fn is_finished(&self, actor: &Actor) -> bool;

    /// Halt the actor where it stands
    fn stop(&mut self, actor: &mut Actor);

    /// Index of the path point the current spline is heading to
    fn current_point_index(&self, _actor: &Actor) -> usize {
        0
    }

    /// Whether the current spline loops forever
    fn is_cyclic(&self, _actor: &Actor) -> bool {
        false
    }

    /// Advance in-flight splines; called once per actor per tick before the
    /// motion stack updates
    fn advance(&mut self, _actor: &mut Actor, _diff_ms: u32) {}
}

/// Collision and visibility queries against static geometry
pub trait WorldQuery {
    fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool;

    /// Last free point on the segment `from -> to` before solid geometry
    fn first_collision(&self, from: Vec2, to: Vec2) -> Vec2;

    /// Whether `actor` can reach the place `target` is standing in
    fn is_accessible_for(&self, _actor: &Actor, _target: &ActorView) -> bool {
        true
    }
}

/// Callbacks into the behavior layer. All methods default to no-ops.
pub trait MotionHooks {
    /// A generator reached its goal
    fn movement_inform(&mut self, _actor: &Actor, _kind: MovementGeneratorType, _context_id: u64) {}

    fn waypoint_path_started(&mut self, _actor: &Actor, _path_id: u32) {}

    fn waypoint_started(&mut self, _actor: &Actor, _node_id: u32, _path_id: u32) {}

    fn waypoint_reached(&mut self, _actor: &Actor, _node_id: u32, _path_id: u32) {}

    fn waypoint_path_ended(&mut self, _actor: &Actor, _node_id: u32, _path_id: u32) {}

    /// A waypoint node rolled its scripted event
    fn script_event(&mut self, _actor: &Actor, _event_id: u32) {}

    /// Cast an arrival spell
    fn cast_spell(&mut self, _actor: &Actor, _spell_id: u32, _target: Option<ActorId>) {}

    /// Hand the actor back to its combat target after a forced movement
    fn resume_attack(&mut self, _actor: &Actor, _victim: ActorId) {}

    /// The actor ran for help and should now call nearby allies
    fn call_assistance(&mut self, _actor: &Actor) {}

    fn just_reached_home(&mut self, _actor: &Actor) {}
}

/// Counters collected while updating generators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub paths_computed: u64,
    pub path_failures: u64,
    pub splines_launched: u64,
    pub informs: u64,
    pub generators_initialized: u64,
    pub generators_finalized: u64,
}

impl TickStats {
    pub fn merge(&mut self, other: &TickStats) {
        self.paths_computed += other.paths_computed;
        self.path_failures += other.path_failures;
        self.splines_launched += other.splines_launched;
        self.informs += other.informs;
        self.generators_initialized += other.generators_initialized;
        self.generators_finalized += other.generators_finalized;
    }
}

/// Everything a lifecycle call may touch besides its own actor
pub struct MotionContext<'a> {
    /// Previous-tick snapshot of every actor
    pub actors: &'a ActorIndex,
    pub paths: &'a mut dyn PathFinder,
    pub splines: &'a mut dyn SplineMover,
    pub world: &'a dyn WorldQuery,
    pub hooks: &'a mut dyn MotionHooks,
    pub waypoints: &'a WaypointStore,
    pub rng: &'a mut StdRng,
    pub stats: &'a mut TickStats,
}

impl MotionContext<'_> {
    /// Stop the spline and drop every `*_MOVE` tag
    pub fn stop_moving(&mut self, actor: &mut Actor) {
        self.splines.stop(actor);
        actor.clear_state(UnitState::MOVING);
    }

    pub fn launch(&mut self, actor: &mut Actor, spline: MoveSpline) -> u32 {
        self.stats.splines_launched += 1;
        self.splines.launch(actor, spline)
    }

    pub fn compute_path(&mut self, actor: &Actor, request: &PathRequest) -> ComputedPath {
        self.stats.paths_computed += 1;
        self.paths.compute_path(actor, request)
    }

    pub fn note_path_failure(&mut self) {
        self.stats.path_failures += 1;
    }

    pub fn spline_finished(&self, actor: &Actor) -> bool {
        self.splines.is_finished(actor)
    }

    /// Turn the actor to `angle` without moving it
    pub fn face(&mut self, actor: &mut Actor, angle: f32) {
        let spline = MoveSpline::in_place(actor.position, angle);
        self.launch(actor, spline);
    }

    pub fn inform(&mut self, actor: &Actor, kind: MovementGeneratorType, context_id: u64) {
        self.stats.informs += 1;
        self.hooks.movement_inform(actor, kind, context_id);
    }
}
