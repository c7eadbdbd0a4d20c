//! Reference collaborators.
//!
//! Straight-line pathing, linear spline playback and flat or walled
//! terrain. Good enough to drive the demo server and the scenario tests;
//! a real deployment plugs in its navmesh and spline services instead.

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::motion::actor::{Actor, ActorId};
use crate::motion::generator::MovementGeneratorType;
use crate::motion::services::{
    path_length, ComputedPath, Facing, MotionHooks, MoveSpline, Path, PathFinder, PathRequest, PathType,
    SplineMover, WorldQuery,
};
use crate::util::vec2::{normalize_orientation, Vec2};

/// Distance kept from a wall when a ray is cut short
const COLLISION_MARGIN: f32 = 0.5;

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Parameter along `from -> to` where it crosses segment `a -> b`
fn segment_hit(from: Vec2, to: Vec2, a: Vec2, b: Vec2) -> Option<f32> {
    let r = to - from;
    let s = b - a;
    let denom = cross(r, s);
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let qp = a - from;
    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then_some(t)
}

/// Flat world without obstacles
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTerrain;

impl WorldQuery for OpenTerrain {
    fn line_of_sight(&self, _from: Vec2, _to: Vec2) -> bool {
        true
    }

    fn first_collision(&self, _from: Vec2, to: Vec2) -> Vec2 {
        to
    }
}

/// Flat world with thin walls
#[derive(Debug, Clone, Default)]
pub struct ObstacleMap {
    walls: Vec<(Vec2, Vec2)>,
}

impl ObstacleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wall(mut self, a: Vec2, b: Vec2) -> Self {
        self.walls.push((a, b));
        self
    }

    fn nearest_hit(&self, from: Vec2, to: Vec2) -> Option<f32> {
        self.walls
            .iter()
            .filter_map(|&(a, b)| segment_hit(from, to, a, b))
            .min_by(|x, y| x.total_cmp(y))
    }
}

impl WorldQuery for ObstacleMap {
    fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        self.nearest_hit(from, to).is_none()
    }

    fn first_collision(&self, from: Vec2, to: Vec2) -> Vec2 {
        let Some(t) = self.nearest_hit(from, to) else {
            return to;
        };
        let ray = to - from;
        let reach = (ray.length() * t - COLLISION_MARGIN).max(0.0);
        from + ray.normalize() * reach
    }
}

/// Paths are straight lines; walls make them fail
#[derive(Debug, Clone, Default)]
pub struct StraightPathFinder {
    obstacles: Option<ObstacleMap>,
}

impl StraightPathFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obstacles(obstacles: ObstacleMap) -> Self {
        Self {
            obstacles: Some(obstacles),
        }
    }
}

impl PathFinder for StraightPathFinder {
    fn compute_path(&mut self, actor: &Actor, request: &PathRequest) -> ComputedPath {
        let start = actor.position;
        let mut end = request.destination;
        let mut kind = PathType::NORMAL;

        if self
            .obstacles
            .as_ref()
            .is_some_and(|map| !map.line_of_sight(start, end))
        {
            if !request.allow_shortcut {
                return ComputedPath::no_path();
            }
            kind |= PathType::SHORTCUT;
        }

        if let Some(limit) = request.length_limit {
            if start.distance_to(end) > limit {
                end = start + (end - start).normalize() * limit;
                kind |= PathType::INCOMPLETE;
            }
        }

        let mut points = Path::new();
        points.push(start);
        points.push(end);
        ComputedPath { points, kind }
    }
}

#[derive(Debug, Clone)]
struct Flight {
    spline: MoveSpline,
    /// Distance from the first point to each point
    marks: Vec<f32>,
    length: f32,
    duration_ms: u32,
    elapsed_ms: u32,
}

impl Flight {
    /// Point at `distance` along the path and the index of the point being
    /// approached
    fn point_at(&self, distance: f32) -> (Vec2, usize) {
        let points = &self.spline.path;
        for i in 1..points.len() {
            if distance <= self.marks[i] || i == points.len() - 1 {
                let segment = self.marks[i] - self.marks[i - 1];
                let t = if segment > 0.0 {
                    ((distance - self.marks[i - 1]) / segment).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                return (points[i - 1].lerp(points[i], t), i);
            }
        }
        (points[points.len() - 1], points.len() - 1)
    }

    fn travelled(&self) -> f32 {
        if self.duration_ms == 0 {
            return self.length;
        }
        let elapsed = if self.spline.cyclic {
            self.elapsed_ms % self.duration_ms
        } else {
            self.elapsed_ms.min(self.duration_ms)
        };
        self.length * elapsed as f32 / self.duration_ms as f32
    }
}

fn apply_facing(actor: &mut Actor, facing: Option<Facing>) {
    match facing {
        Some(Facing::Angle(angle)) => actor.orientation = normalize_orientation(angle),
        Some(Facing::Point(point)) => actor.orientation = actor.position.angle_towards(point),
        // Resolved by the generator that asked for it
        Some(Facing::Target(_)) | None => {}
    }
}

/// Moves actors along their path at constant speed
#[derive(Debug, Clone, Default)]
pub struct LinearSplineMover {
    flights: HashMap<ActorId, Flight>,
}

impl LinearSplineMover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    fn to_world(actor: &Actor, spline: &MoveSpline, point: Vec2) -> Vec2 {
        match (spline.transport_local, actor.transport) {
            (true, Some(frame)) => frame.to_world(point),
            _ => point,
        }
    }
}

impl SplineMover for LinearSplineMover {
    fn launch(&mut self, actor: &mut Actor, spline: MoveSpline) -> u32 {
        let length = path_length(&spline.path);
        if spline.path.len() < 2 || length <= f32::EPSILON {
            self.flights.remove(&actor.id);
            apply_facing(actor, spline.facing);
            return 0;
        }

        let speed = spline.velocity.unwrap_or_else(|| actor.speed(spline.walk)).max(0.01);
        let duration_ms = ((length / speed) * 1000.0).round().max(1.0) as u32;
        let mut marks = Vec::with_capacity(spline.path.len());
        let mut total = 0.0;
        marks.push(0.0);
        for pair in spline.path.windows(2) {
            total += pair[0].distance_to(pair[1]);
            marks.push(total);
        }

        let start = Self::to_world(actor, &spline, spline.path[0]);
        let next = Self::to_world(actor, &spline, spline.path[1]);
        actor.orientation = start.angle_towards(next);
        self.flights.insert(
            actor.id,
            Flight {
                spline,
                marks,
                length,
                duration_ms,
                elapsed_ms: 0,
            },
        );
        duration_ms
    }

    fn is_finished(&self, actor: &Actor) -> bool {
        !self.flights.contains_key(&actor.id)
    }

    fn stop(&mut self, actor: &mut Actor) {
        self.flights.remove(&actor.id);
    }

    fn current_point_index(&self, actor: &Actor) -> usize {
        self.flights
            .get(&actor.id)
            .map_or(0, |flight| flight.point_at(flight.travelled()).1)
    }

    fn is_cyclic(&self, actor: &Actor) -> bool {
        self.flights.get(&actor.id).is_some_and(|flight| flight.spline.cyclic)
    }

    fn advance(&mut self, actor: &mut Actor, diff_ms: u32) {
        let Some(flight) = self.flights.get_mut(&actor.id) else {
            return;
        };
        flight.elapsed_ms = flight.elapsed_ms.saturating_add(diff_ms);
        let (local, index) = flight.point_at(flight.travelled());
        let from = Self::to_world(actor, &flight.spline, flight.spline.path[index - 1]);
        let to = Self::to_world(actor, &flight.spline, flight.spline.path[index]);
        actor.position = Self::to_world(actor, &flight.spline, local);
        if from.distance_sq_to(to) > 0.0 {
            actor.orientation = from.angle_towards(to);
        }

        if !flight.spline.cyclic && flight.elapsed_ms >= flight.duration_ms {
            let facing = flight.spline.facing;
            self.flights.remove(&actor.id);
            apply_facing(actor, facing);
        }
    }
}

/// Something the motion core told the behavior layer
#[derive(Debug, Clone, PartialEq)]
pub enum MotionEvent {
    Inform {
        actor: ActorId,
        kind: MovementGeneratorType,
        context_id: u64,
    },
    WaypointPathStarted { actor: ActorId, path_id: u32 },
    WaypointStarted { actor: ActorId, node_id: u32, path_id: u32 },
    WaypointReached { actor: ActorId, node_id: u32, path_id: u32 },
    WaypointPathEnded { actor: ActorId, node_id: u32, path_id: u32 },
    ScriptEvent { actor: ActorId, event_id: u32 },
    CastSpell { actor: ActorId, spell_id: u32, target: Option<ActorId> },
    ResumeAttack { actor: ActorId, victim: ActorId },
    CallAssistance { actor: ActorId },
    ReachedHome { actor: ActorId },
}

/// Keeps every callback in order
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    pub events: Vec<MotionEvent>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(kind, context id)` of every inform sent for `actor`
    pub fn informs_for(&self, actor: ActorId) -> Vec<(MovementGeneratorType, u64)> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                MotionEvent::Inform {
                    actor: id,
                    kind,
                    context_id,
                } if id == actor => Some((kind, context_id)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl MotionHooks for RecordingHooks {
    fn movement_inform(&mut self, actor: &Actor, kind: MovementGeneratorType, context_id: u64) {
        self.events.push(MotionEvent::Inform {
            actor: actor.id,
            kind,
            context_id,
        });
    }

    fn waypoint_path_started(&mut self, actor: &Actor, path_id: u32) {
        self.events.push(MotionEvent::WaypointPathStarted {
            actor: actor.id,
            path_id,
        });
    }

    fn waypoint_started(&mut self, actor: &Actor, node_id: u32, path_id: u32) {
        self.events.push(MotionEvent::WaypointStarted {
            actor: actor.id,
            node_id,
            path_id,
        });
    }

    fn waypoint_reached(&mut self, actor: &Actor, node_id: u32, path_id: u32) {
        self.events.push(MotionEvent::WaypointReached {
            actor: actor.id,
            node_id,
            path_id,
        });
    }

    fn waypoint_path_ended(&mut self, actor: &Actor, node_id: u32, path_id: u32) {
        self.events.push(MotionEvent::WaypointPathEnded {
            actor: actor.id,
            node_id,
            path_id,
        });
    }

    fn script_event(&mut self, actor: &Actor, event_id: u32) {
        self.events.push(MotionEvent::ScriptEvent {
            actor: actor.id,
            event_id,
        });
    }

    fn cast_spell(&mut self, actor: &Actor, spell_id: u32, target: Option<ActorId>) {
        self.events.push(MotionEvent::CastSpell {
            actor: actor.id,
            spell_id,
            target,
        });
    }

    fn resume_attack(&mut self, actor: &Actor, victim: ActorId) {
        self.events.push(MotionEvent::ResumeAttack { actor: actor.id, victim });
    }

    fn call_assistance(&mut self, actor: &Actor) {
        self.events.push(MotionEvent::CallAssistance { actor: actor.id });
    }

    fn just_reached_home(&mut self, actor: &Actor) {
        self.events.push(MotionEvent::ReachedHome { actor: actor.id });
    }
}

/// Logs callbacks; used by the demo server
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

impl MotionHooks for LoggingHooks {
    fn movement_inform(&mut self, actor: &Actor, kind: MovementGeneratorType, context_id: u64) {
        debug!("Actor {} movement inform {:?} ({})", actor.id, kind, context_id);
    }

    fn waypoint_path_ended(&mut self, actor: &Actor, node_id: u32, path_id: u32) {
        info!("Actor {} finished waypoint path {} at node {}", actor.id, path_id, node_id);
    }

    fn script_event(&mut self, actor: &Actor, event_id: u32) {
        debug!("Actor {} triggered script event {}", actor.id, event_id);
    }

    fn just_reached_home(&mut self, actor: &Actor) {
        debug!("Actor {} is back home", actor.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::actor::TransportFrame;
    use std::f32::consts::FRAC_PI_2;

    fn walled() -> ObstacleMap {
        ObstacleMap::new().with_wall(Vec2::new(5.0, -5.0), Vec2::new(5.0, 5.0))
    }

    #[test]
    fn test_wall_blocks_sight_and_cuts_rays() {
        let map = walled();
        assert!(!map.line_of_sight(Vec2::ZERO, Vec2::new(10.0, 0.0)));
        assert!(map.line_of_sight(Vec2::ZERO, Vec2::new(4.0, 0.0)));
        assert!(map.line_of_sight(Vec2::ZERO, Vec2::new(0.0, 10.0)));

        let hit = map.first_collision(Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!(hit.approx_eq(Vec2::new(4.5, 0.0), 1e-4));
        assert_eq!(map.first_collision(Vec2::ZERO, Vec2::new(0.0, 3.0)), Vec2::new(0.0, 3.0));
    }

    #[test]
    fn test_straight_paths() {
        let actor = Actor::new(1, Vec2::ZERO);
        let mut finder = StraightPathFinder::new();

        let path = finder.compute_path(&actor, &PathRequest::to(Vec2::new(3.0, 4.0)));
        assert_eq!(path.kind, PathType::NORMAL);
        assert_eq!(path.points.len(), 2);

        let cut = finder.compute_path(&actor, &PathRequest::to(Vec2::new(60.0, 0.0)).with_length_limit(30.0));
        assert!(cut.kind.contains(PathType::INCOMPLETE));
        assert!(cut.points[1].approx_eq(Vec2::new(30.0, 0.0), 1e-4));
    }

    #[test]
    fn test_walls_fail_paths_unless_shortcut_allowed() {
        let actor = Actor::new(1, Vec2::ZERO);
        let mut finder = StraightPathFinder::with_obstacles(walled());
        let request = PathRequest::to(Vec2::new(10.0, 0.0));

        assert!(!finder.compute_path(&actor, &request).is_walkable());
        let shortcut = finder.compute_path(&actor, &request.with_shortcut(true));
        assert!(shortcut.kind.contains(PathType::SHORTCUT));
    }

    #[test]
    fn test_linear_playback() {
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.speeds.run = 5.0;
        let mut mover = LinearSplineMover::new();

        let mut path = Path::new();
        path.push(Vec2::ZERO);
        path.push(Vec2::new(5.0, 0.0));
        path.push(Vec2::new(5.0, 5.0));
        let duration = mover.launch(&mut actor, MoveSpline::along(path).with_facing(Facing::Angle(1.0)));
        assert_eq!(duration, 2000);

        mover.advance(&mut actor, 500);
        assert!(actor.position.approx_eq(Vec2::new(2.5, 0.0), 1e-4));
        assert_eq!(mover.current_point_index(&actor), 1);

        mover.advance(&mut actor, 1000);
        assert!(actor.position.approx_eq(Vec2::new(5.0, 2.5), 1e-4));
        assert!((actor.orientation - FRAC_PI_2).abs() < 1e-4);
        assert_eq!(mover.current_point_index(&actor), 2);

        mover.advance(&mut actor, 600);
        assert!(mover.is_finished(&actor));
        assert!(actor.position.approx_eq(Vec2::new(5.0, 5.0), 1e-4));
        assert_eq!(actor.orientation, 1.0);
    }

    #[test]
    fn test_zero_length_spline_only_turns() {
        let mut actor = Actor::new(1, Vec2::new(2.0, 2.0));
        let mut mover = LinearSplineMover::new();
        let at = actor.position;
        let duration = mover.launch(&mut actor, MoveSpline::in_place(at, 2.0));
        assert_eq!(duration, 0);
        assert!(mover.is_finished(&actor));
        assert_eq!(actor.orientation, 2.0);
    }

    #[test]
    fn test_walk_speed_and_velocity_override() {
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.speeds.walk = 2.0;
        let mut mover = LinearSplineMover::new();
        let walk = MoveSpline::to(Vec2::ZERO, Vec2::new(4.0, 0.0)).with_walk(true);
        assert_eq!(mover.launch(&mut actor, walk), 2000);
        let fast = MoveSpline::to(Vec2::ZERO, Vec2::new(4.0, 0.0)).with_velocity(8.0);
        assert_eq!(mover.launch(&mut actor, fast), 500);
    }

    #[test]
    fn test_cyclic_spline_loops() {
        let mut actor = Actor::new(1, Vec2::ZERO);
        actor.speeds.run = 1.0;
        let mut mover = LinearSplineMover::new();
        mover.launch(&mut actor, MoveSpline::to(Vec2::ZERO, Vec2::new(2.0, 0.0)).cyclic());

        mover.advance(&mut actor, 2500);
        assert!(!mover.is_finished(&actor));
        assert!(mover.is_cyclic(&actor));
        assert!(actor.position.approx_eq(Vec2::new(0.5, 0.0), 1e-4));
    }

    #[test]
    fn test_transport_local_points_follow_frame() {
        let mut actor = Actor::new(1, Vec2::new(10.0, 0.0));
        actor.speeds.run = 1.0;
        actor.transport = Some(TransportFrame {
            origin: Vec2::new(10.0, 0.0),
            orientation: FRAC_PI_2,
        });
        let mut mover = LinearSplineMover::new();
        mover.launch(
            &mut actor,
            MoveSpline::to(Vec2::ZERO, Vec2::new(2.0, 0.0)).transport_local(),
        );
        mover.advance(&mut actor, 2000);
        assert!(actor.position.approx_eq(Vec2::new(10.0, 2.0), 1e-4));
    }

    #[test]
    fn test_recording_hooks_filter_by_actor() {
        let mut hooks = RecordingHooks::new();
        let a = Actor::new(1, Vec2::ZERO);
        let b = Actor::new(2, Vec2::ZERO);
        hooks.movement_inform(&a, MovementGeneratorType::Point, 4);
        hooks.movement_inform(&b, MovementGeneratorType::Chase, 1);
        hooks.call_assistance(&a);
        assert_eq!(hooks.informs_for(1), vec![(MovementGeneratorType::Point, 4)]);
        assert_eq!(hooks.events.len(), 3);
    }
}
