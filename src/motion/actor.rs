//! Actor state as seen by the motion core, plus the read-only snapshot other
//! actors are resolved against during a tick.

use hashbrown::HashMap;

use crate::motion::constants::{actor as defaults, chase};
use crate::motion::unit_state::UnitState;
use crate::util::vec2::{normalize_orientation, Vec2};

/// Identifier of a simulated actor
pub type ActorId = u64;

/// Gait used by the wander generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandomGait {
    /// Always walk
    #[default]
    Walk,
    /// Keep whatever walk/run mode the actor is in
    CanRun,
    /// Always run
    AlwaysRun,
}

/// Gait used while chasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChaseGait {
    /// Always run
    #[default]
    Run,
    /// Keep whatever walk/run mode the actor is in
    CanWalk,
    /// Always walk
    AlwaysWalk,
}

/// Per-actor movement template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementProfile {
    pub random: RandomGait,
    pub chase: ChaseGait,
}

/// Movement speeds in units per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speeds {
    pub walk: f32,
    pub run: f32,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            walk: defaults::WALK_SPEED,
            run: defaults::RUN_SPEED,
        }
    }
}

/// Frame of a transport the actor rides on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportFrame {
    pub origin: Vec2,
    pub orientation: f32,
}

impl TransportFrame {
    /// Convert a transport-local offset into world coordinates
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        self.origin + local.rotate(self.orientation)
    }

    /// Convert a world position into a transport-local offset
    pub fn to_local(&self, world: Vec2) -> Vec2 {
        (world - self.origin).rotate(-self.orientation)
    }
}

/// Position an actor returns to when evading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HomePosition {
    pub position: Vec2,
    pub orientation: f32,
}

/// A movable actor.
///
/// Fields are public the same way the simulation's entity structs are: the
/// motion core mutates position-related state through generators, while the
/// combat layer writes `unit_state`, `casting` and `victim` directly.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub position: Vec2,
    pub orientation: f32,
    pub alive: bool,
    pub in_world: bool,
    pub unit_state: UnitState,
    /// A spell cast currently prevents movement
    pub casting: bool,
    /// Actor prefers walking over running
    pub walking: bool,
    pub speeds: Speeds,
    pub combat_reach: f32,
    pub profile: MovementProfile,
    /// Current combat target
    pub victim: Option<ActorId>,
    /// Owner for pets and summons
    pub owner: Option<ActorId>,
    pub is_pet: bool,
    pub home: HomePosition,
    /// Spawn wander radius, used when a wander request carries none
    pub wander_radius: f32,
    /// Spawn waypoint path, used when a patrol request carries no path id
    pub waypoint_path: Option<u32>,
    pub transport: Option<TransportFrame>,
    /// Set by chase when the target sits somewhere this actor cannot go
    pub cannot_reach_target: bool,
    /// Last reached waypoint as (node id, path id)
    pub current_waypoint: Option<(u32, u32)>,
}

impl Actor {
    pub fn new(id: ActorId, position: Vec2) -> Self {
        Self {
            id,
            position,
            orientation: 0.0,
            alive: true,
            in_world: true,
            unit_state: UnitState::empty(),
            casting: false,
            walking: false,
            speeds: Speeds::default(),
            combat_reach: defaults::COMBAT_REACH,
            profile: MovementProfile::default(),
            victim: None,
            owner: None,
            is_pet: false,
            home: HomePosition {
                position,
                orientation: 0.0,
            },
            wander_radius: 0.0,
            waypoint_path: None,
            transport: None,
            cannot_reach_target: false,
            current_waypoint: None,
        }
    }

    /// Rooted, stunned, distracted or held in place by a cast
    pub fn is_movement_blocked(&self) -> bool {
        self.unit_state.intersects(UnitState::NOT_MOVE) || self.casting
    }

    #[inline]
    pub fn has_state(&self, state: UnitState) -> bool {
        self.unit_state.intersects(state)
    }

    #[inline]
    pub fn add_state(&mut self, state: UnitState) {
        self.unit_state.insert(state);
    }

    #[inline]
    pub fn clear_state(&mut self, state: UnitState) {
        self.unit_state.remove(state);
    }

    /// Speed for the given gait in units per second
    pub fn speed(&self, walk: bool) -> f32 {
        if walk {
            self.speeds.walk
        } else {
            self.speeds.run
        }
    }

    /// Melee range against a target with the given combat reach
    pub fn melee_range(&self, target_reach: f32) -> f32 {
        chase::NOMINAL_MELEE_RANGE.max(self.combat_reach + target_reach + chase::MELEE_REACH_BONUS)
    }

    pub fn set_home_here(&mut self) {
        self.home = HomePosition {
            position: self.position,
            orientation: self.orientation,
        };
    }
}

/// Frozen view of an actor taken at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorView {
    pub id: ActorId,
    pub position: Vec2,
    pub orientation: f32,
    pub alive: bool,
    pub in_world: bool,
    pub combat_reach: f32,
    pub walking: bool,
    pub run_speed: f32,
    /// Target of this actor's controlling chase generator, if any
    pub chase_target: Option<ActorId>,
}

impl ActorView {
    pub fn capture(actor: &Actor, chase_target: Option<ActorId>) -> Self {
        Self {
            id: actor.id,
            position: actor.position,
            orientation: actor.orientation,
            alive: actor.alive,
            in_world: actor.in_world,
            combat_reach: actor.combat_reach,
            walking: actor.walking,
            run_speed: actor.speeds.run,
            chase_target,
        }
    }

    /// Angle of `point` relative to this actor's facing, in [0, 2π)
    pub fn relative_angle_of(&self, point: Vec2) -> f32 {
        normalize_orientation(self.position.angle_towards(point) - self.orientation)
    }

    /// Turn an angle relative to this actor's facing into an absolute one
    pub fn to_absolute_angle(&self, relative: f32) -> f32 {
        normalize_orientation(relative + self.orientation)
    }
}

/// Snapshot of every actor in the world, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ActorIndex {
    views: HashMap<ActorId, ActorView>,
}

impl ActorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, view: ActorView) {
        self.views.insert(view.id, view);
    }

    pub fn get(&self, id: ActorId) -> Option<&ActorView> {
        self.views.get(&id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Weak reference to another actor.
///
/// Holds only the id; every use resolves it against the tick snapshot so a
/// despawned target is seen as gone instead of dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRef {
    id: ActorId,
}

impl TargetRef {
    pub fn new(id: ActorId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Live view of the target, or `None` once it left the world
    pub fn resolve<'a>(&self, actors: &'a ActorIndex) -> Option<&'a ActorView> {
        actors.get(self.id).filter(|view| view.in_world)
    }
}
