//! Tick driver.
//!
//! Owns every actor with its motion stack and the collaborators generators
//! talk to. Each tick drains queued commands, freezes a snapshot of all
//! actors, then advances splines and updates stacks one actor at a time
//! against that snapshot.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::motion::actor::{Actor, ActorId, ActorIndex, ActorView, Speeds};
use crate::motion::command_buffer::{CommandBuffer, CommandMessage, CommandSender, MotionCommand};
use crate::motion::error::MotionError;
use crate::motion::generator::{MotionSlot, MovementGenerator};
use crate::motion::motion_master::{ClearScope, MotionMaster};
use crate::motion::services::{MotionContext, MotionHooks, PathFinder, SplineMover, TickStats, WorldQuery};
use crate::motion::waypoints::WaypointStore;

#[derive(Debug)]
struct ActorSlot {
    actor: Actor,
    master: MotionMaster,
}

pub struct MotionWorld<P, S, W, H> {
    actors: BTreeMap<ActorId, ActorSlot>,
    snapshot: ActorIndex,
    paths: P,
    splines: S,
    terrain: W,
    hooks: H,
    waypoints: WaypointStore,
    rng: StdRng,
    commands: CommandBuffer,
    /// Counters from calls made between ticks
    pending_stats: TickStats,
    tick_count: u64,
}

impl<P, S, W, H> MotionWorld<P, S, W, H>
where
    P: PathFinder,
    S: SplineMover,
    W: WorldQuery,
    H: MotionHooks,
{
    pub fn new(paths: P, splines: S, terrain: W, hooks: H, seed: u64) -> Self {
        Self {
            actors: BTreeMap::new(),
            snapshot: ActorIndex::new(),
            paths,
            splines,
            terrain,
            hooks,
            waypoints: WaypointStore::new(),
            rng: StdRng::seed_from_u64(seed),
            commands: CommandBuffer::default(),
            pending_stats: TickStats::default(),
            tick_count: 0,
        }
    }

    pub fn with_waypoints(mut self, waypoints: WaypointStore) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.commands = CommandBuffer::new(capacity);
        self
    }

    /// Producer handle for threads outside the tick loop
    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    pub fn waypoints(&self) -> &WaypointStore {
        &self.waypoints
    }

    pub fn waypoints_mut(&mut self) -> &mut WaypointStore {
        &mut self.waypoints
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn splines(&self) -> &S {
        &self.splines
    }

    pub fn paths(&self) -> &P {
        &self.paths
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id).map(|slot| &slot.actor)
    }

    /// Direct access for the behavior layer (root, stun, victim changes)
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id).map(|slot| &mut slot.actor)
    }

    pub fn motion_master(&self, id: ActorId) -> Option<&MotionMaster> {
        self.actors.get(&id).map(|slot| &slot.master)
    }

    pub fn actor_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.keys().copied()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn spawn(&mut self, actor: Actor) -> Result<(), MotionError> {
        if self.actors.contains_key(&actor.id) {
            return Err(MotionError::DuplicateActor(actor.id));
        }
        debug!("Spawning actor {} at ({:.1}, {:.1})", actor.id, actor.position.x, actor.position.y);
        self.snapshot.insert(ActorView::capture(&actor, None));
        self.actors.insert(
            actor.id,
            ActorSlot {
                actor,
                master: MotionMaster::new(),
            },
        );
        Ok(())
    }

    /// Remove an actor, finalizing its whole stack first
    pub fn despawn(&mut self, id: ActorId) -> Result<Actor, MotionError> {
        self.with_context(id, |slot, ctx| {
            slot.master.finalize_all(&mut slot.actor, ctx);
            ctx.splines.stop(&mut slot.actor);
        })?;
        let mut slot = self.actors.remove(&id).ok_or(MotionError::UnknownActor(id))?;
        slot.actor.in_world = false;
        self.snapshot.insert(ActorView::capture(&slot.actor, None));
        debug!("Despawned actor {}", id);
        Ok(slot.actor)
    }

    /// Run `f` against one actor with a context borrowing the rest of the
    /// world
    fn with_context<R>(
        &mut self,
        id: ActorId,
        f: impl FnOnce(&mut ActorSlot, &mut MotionContext<'_>) -> R,
    ) -> Result<R, MotionError> {
        let slot = self.actors.get_mut(&id).ok_or(MotionError::UnknownActor(id))?;
        let mut ctx = MotionContext {
            actors: &self.snapshot,
            paths: &mut self.paths,
            splines: &mut self.splines,
            world: &self.terrain,
            hooks: &mut self.hooks,
            waypoints: &self.waypoints,
            rng: &mut self.rng,
            stats: &mut self.pending_stats,
        };
        Ok(f(slot, &mut ctx))
    }

    /// Push a generator onto an actor's stack right away
    pub fn request(&mut self, id: ActorId, generator: MovementGenerator, slot: MotionSlot) -> Result<(), MotionError> {
        let actor = self.actor(id).ok_or(MotionError::UnknownActor(id))?;
        if let Some(path_id) = generator.stored_waypoint_path(actor) {
            if !self.waypoints.contains(path_id) {
                return Err(MotionError::UnknownWaypointPath(path_id));
            }
        }
        self.with_context(id, |entry, ctx| entry.master.add(&mut entry.actor, ctx, generator, slot))
    }

    pub fn clear(&mut self, id: ActorId, scope: ClearScope) -> Result<usize, MotionError> {
        self.with_context(id, |slot, ctx| slot.master.clear(&mut slot.actor, ctx, scope))
    }

    pub fn speed_changed(&mut self, id: ActorId) -> Result<(), MotionError> {
        self.actors
            .get_mut(&id)
            .map(|slot| slot.master.speed_changed())
            .ok_or(MotionError::UnknownActor(id))
    }

    fn apply_command(&mut self, message: CommandMessage) {
        let id = message.actor_id;
        let result = match message.command {
            MotionCommand::Request { generator, slot } => self.request(id, generator, slot),
            MotionCommand::Clear(scope) => self.clear(id, scope).map(|_| ()),
            MotionCommand::SetWanderAnchor(anchor) => self.with_context(id, |slot, _| {
                if !slot.master.set_wander_anchor(anchor) {
                    debug!("Actor {} has no wander generator to re-anchor", id);
                }
            }),
            MotionCommand::Pause { timer_ms } => {
                self.with_context(id, |slot, ctx| {
                    slot.master.pause(&mut slot.actor, ctx, timer_ms);
                })
            }
            MotionCommand::Resume { override_timer_ms } => self.with_context(id, |slot, _| {
                slot.master.resume(override_timer_ms);
            }),
            MotionCommand::SpeedChanged => self.speed_changed(id),
        };
        if let Err(e) = result {
            warn!("Dropped motion command for actor {}: {}", id, e);
        }
    }

    fn refresh_snapshot(&mut self) {
        let mut snapshot = ActorIndex::new();
        for slot in self.actors.values() {
            snapshot.insert(ActorView::capture(&slot.actor, slot.master.chase_target()));
        }
        self.snapshot = snapshot;
    }

    /// Advance the simulation by `diff_ms`
    pub fn tick(&mut self, diff_ms: u32) -> TickStats {
        self.tick_count += 1;
        self.refresh_snapshot();
        for message in self.commands.drain() {
            self.apply_command(message);
        }

        let mut stats = std::mem::take(&mut self.pending_stats);
        for slot in self.actors.values_mut() {
            if !slot.actor.in_world {
                continue;
            }
            sanitize_actor(&mut slot.actor, &mut self.splines);
            self.splines.advance(&mut slot.actor, diff_ms);

            let mut ctx = MotionContext {
                actors: &self.snapshot,
                paths: &mut self.paths,
                splines: &mut self.splines,
                world: &self.terrain,
                hooks: &mut self.hooks,
                waypoints: &self.waypoints,
                rng: &mut self.rng,
                stats: &mut stats,
            };
            slot.master.update(&mut slot.actor, &mut ctx, diff_ms);
            sanitize_actor(&mut slot.actor, &mut self.splines);
        }

        if self.tick_count % 600 == 0 {
            info!(
                "Motion tick {}: {} actors, {} paths, {} informs",
                self.tick_count,
                self.actors.len(),
                stats.paths_computed,
                stats.informs
            );
        }
        stats
    }
}

/// Repair non-finite state so one broken actor cannot poison the tick
fn sanitize_actor(actor: &mut Actor, splines: &mut dyn SplineMover) {
    if !actor.position.is_finite() {
        warn!("Fixed NaN position for actor {}", actor.id);
        splines.stop(actor);
        actor.position = actor.home.position;
    }
    if !actor.orientation.is_finite() {
        warn!("Fixed NaN orientation for actor {}", actor.id);
        actor.orientation = actor.home.orientation;
    }
    let speeds_ok = |v: f32| v.is_finite() && v > 0.0;
    if !speeds_ok(actor.speeds.walk) || !speeds_ok(actor.speeds.run) {
        warn!("Fixed invalid speeds for actor {}", actor.id);
        actor.speeds = Speeds::default();
    }
}
