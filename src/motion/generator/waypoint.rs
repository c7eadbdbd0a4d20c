use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::motion::actor::Actor;
use crate::motion::constants::waypoint::{BLOCKED_RETRY_MS, START_DELAY_MS};
use crate::motion::generator::{GeneratorCore, GeneratorRequest, Motion, MovementGeneratorType, Progress};
use crate::motion::services::{Facing, MotionContext, MoveSpline, PathRequest};
use crate::motion::timer::TimeTracker;
use crate::motion::unit_state::UnitState;
use crate::motion::waypoints::{WaypointMoveType, WaypointPath};

/// Patrol along a list of nodes
#[derive(Debug, Clone)]
pub struct WaypointMovement {
    path_id: Option<u32>,
    path: Option<Arc<WaypointPath>>,
    loaded_from_storage: bool,
    repeating: bool,
    velocity: Option<f32>,
    current_node: usize,
    next_move: TimeTracker,
    /// First node was requested
    started: bool,
    /// Arrival at the current node was processed
    informed: bool,
}

impl WaypointMovement {
    pub fn from_store(path_id: Option<u32>, repeating: bool) -> Self {
        Self {
            path_id,
            path: None,
            loaded_from_storage: true,
            repeating,
            velocity: None,
            current_node: 0,
            next_move: TimeTracker::default(),
            started: false,
            informed: false,
        }
    }

    pub fn from_path(path: Arc<WaypointPath>, repeating: bool) -> Self {
        Self {
            path_id: Some(path.id),
            path: Some(path),
            loaded_from_storage: false,
            ..Self::from_store(None, repeating)
        }
    }

    /// Override the actor's speed on every leg
    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn current_node(&self) -> usize {
        self.current_node
    }

    /// Store path this generator will load on activation
    pub fn stored_path_id(&self, actor: &Actor) -> Option<u32> {
        if !self.loaded_from_storage || self.path.is_some() {
            return None;
        }
        self.path_id.or(actor.waypoint_path)
    }

    fn compute_next_node(&mut self, path: &WaypointPath) -> bool {
        if self.current_node + 1 >= path.nodes.len() && !self.repeating {
            return false;
        }
        self.current_node = (self.current_node + 1) % path.nodes.len();
        true
    }

    fn on_arrived(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, path: &WaypointPath) {
        let node = &path.nodes[self.current_node];
        if node.delay_ms > 0 {
            actor.clear_state(UnitState::ROAMING_MOVE);
            self.next_move.reset(node.delay_ms);
        }

        if let Some(event_id) = node.event_id {
            if ctx.rng.gen_range(0..100u32) < u32::from(node.event_chance) {
                debug!("Actor {} fires waypoint event {} at node {}", actor.id, event_id, node.id);
                ctx.hooks.script_event(actor, event_id);
            }
        }

        ctx.inform(actor, MovementGeneratorType::Waypoint, self.current_node as u64);
        ctx.hooks.waypoint_reached(actor, node.id, path.id);
        actor.current_waypoint = Some((node.id, path.id));
    }

    fn start_move(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        path: &WaypointPath,
        relaunch: bool,
    ) -> Progress {
        if relaunch && (self.informed || !self.started) {
            return Progress::Continue;
        }

        if actor.is_movement_blocked() {
            self.next_move.reset(BLOCKED_RETRY_MS);
            return Progress::Continue;
        }

        if self.started && self.informed {
            if self.compute_next_node(path) {
                ctx.hooks.waypoint_started(actor, path.nodes[self.current_node].id, path.id);
            } else {
                let last = &path.nodes[self.current_node];
                actor.home.position = match actor.transport {
                    Some(frame) => frame.to_world(last.position),
                    None => last.position,
                };
                actor.home.orientation = actor.orientation;
                actor.current_waypoint = None;
                debug!("Actor {} finished waypoint path {}", actor.id, path.id);
                ctx.hooks.waypoint_path_ended(actor, last.id, path.id);
                return Progress::Done;
            }
        } else if !self.started {
            self.started = true;
            ctx.hooks.waypoint_started(actor, path.nodes[self.current_node].id, path.id);
        }

        let node = &path.nodes[self.current_node];
        core.interrupted = false;
        core.speed_update_pending = false;
        core.timed_paused = false;
        self.informed = false;
        actor.add_state(UnitState::ROAMING_MOVE);

        let mut spline = match actor.transport {
            // Nodes of transport paths are already transport offsets
            Some(frame) => MoveSpline::to(frame.to_local(actor.position), node.position).transport_local(),
            None => {
                let computed = ctx.compute_path(actor, &PathRequest::to(node.position).with_shortcut(true));
                if computed.is_walkable() {
                    MoveSpline::along(computed.points)
                } else {
                    MoveSpline::to(actor.position, node.position)
                }
            }
        };
        spline = spline.with_walk(node.move_type == WaypointMoveType::Walk);
        if let (Some(orientation), true) = (node.orientation, node.delay_ms > 0) {
            spline = spline.with_facing(Facing::Angle(orientation));
        }
        if let Some(velocity) = node.velocity.or(self.velocity) {
            spline = spline.with_velocity(velocity);
        }
        ctx.launch(actor, spline);
        Progress::Continue
    }
}

impl Motion for WaypointMovement {
    fn initialize(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        if self.loaded_from_storage {
            self.path_id = self.path_id.or(actor.waypoint_path);
            self.path = self.path_id.and_then(|id| ctx.waypoints.get(id));
        }

        let Some(path) = self.path.clone() else {
            warn!("Actor {} has no waypoint path (path id: {:?})", actor.id, self.path_id);
            return;
        };
        if path.nodes.is_empty() {
            warn!("Actor {} waypoint path {} has no nodes", actor.id, path.id);
            self.path = None;
            return;
        }

        ctx.stop_moving(actor);
        self.next_move.reset(START_DELAY_MS);
        ctx.hooks.waypoint_path_started(actor, path.id);
    }

    fn reset(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        ctx.stop_moving(actor);
        // Keeps the next update from treating the stop as an arrival
        if self.path.is_some() && self.next_move.passed() {
            self.next_move.reset(1);
        }
    }

    fn update(
        &mut self,
        core: &mut GeneratorCore,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        diff_ms: u32,
    ) -> Progress {
        let Some(path) = self.path.clone() else {
            return Progress::Done;
        };
        if !actor.alive || core.paused {
            return Progress::Continue;
        }

        if actor.is_movement_blocked() {
            core.interrupted = true;
            ctx.stop_moving(actor);
            return Progress::Continue;
        }

        if core.interrupted {
            if self.started && !self.informed && self.next_move.passed() {
                return self.start_move(core, actor, ctx, &path, true);
            }
            core.interrupted = false;
        }

        if !ctx.spline_finished(actor) {
            if actor.transport.is_none() {
                actor.set_home_here();
            }
            if core.speed_update_pending {
                return self.start_move(core, actor, ctx, &path, true);
            }
            return Progress::Continue;
        }

        if !self.next_move.passed() {
            self.next_move.update(diff_ms);
            if !self.next_move.passed() {
                return Progress::Continue;
            }
            if !self.started {
                return self.start_move(core, actor, ctx, &path, false);
            }
            if !self.informed {
                return self.start_move(core, actor, ctx, &path, true);
            }
        }

        if self.started && !self.informed {
            self.on_arrived(actor, ctx, &path);
            self.informed = true;
        }
        if self.next_move.passed() {
            return self.start_move(core, actor, ctx, &path, false);
        }
        Progress::Continue
    }

    fn deactivate(&mut self, _core: &mut GeneratorCore, actor: &mut Actor, _ctx: &mut MotionContext<'_>) {
        actor.clear_state(UnitState::ROAMING_MOVE);
    }

    fn finalize(
        &mut self,
        _core: &mut GeneratorCore,
        actor: &mut Actor,
        _ctx: &mut MotionContext<'_>,
        active: bool,
        _inform: bool,
    ) -> Option<GeneratorRequest> {
        if active {
            actor.clear_state(UnitState::ROAMING_MOVE);
        }
        None
    }

    fn pause(&mut self, core: &mut GeneratorCore, timer_ms: u32) -> bool {
        if timer_ms > 0 {
            if core.paused {
                return true;
            }
            core.timed_paused = true;
            self.next_move.reset(timer_ms);
        } else {
            core.paused = true;
            core.timed_paused = false;
        }
        true
    }

    fn resume(&mut self, core: &mut GeneratorCore, override_timer_ms: u32) {
        if override_timer_ms > 0 {
            self.next_move.reset(override_timer_ms);
        }
        if self.next_move.passed() {
            self.next_move.reset(1);
        }
        core.paused = false;
    }
}
