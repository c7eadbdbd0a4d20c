//! Per-actor generator stack.
//!
//! Holds one default generator plus an ordered stack keyed by
//! `(mode, priority)`. The highest key controls the actor; everything below
//! it is deactivated or still pending. Every removal goes through
//! `finalize` so state tags never leak.

use std::collections::BTreeMap;

use tracing::debug;

use crate::motion::actor::{Actor, ActorId};
use crate::motion::generator::{
    GeneratorRequest, Lifecycle, MotionMode, MotionPriority, MotionSlot, MovementGenerator, MovementGeneratorType,
    Progress, SplineChainResumeInfo,
};
use crate::motion::services::{MotionContext, SplineMover};
use crate::util::vec2::Vec2;

type StackKey = (MotionMode, MotionPriority);

/// Which generators [`MotionMaster::clear`] removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Every stacked generator; the default one takes over again
    All,
    /// Stacked generators of one priority
    Priority(MotionPriority),
    /// Replace the default generator with idle
    Default,
}

#[derive(Debug)]
pub struct MotionMaster {
    default_generator: MovementGenerator,
    stack: BTreeMap<StackKey, MovementGenerator>,
}

impl Default for MotionMaster {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionMaster {
    pub fn new() -> Self {
        Self {
            default_generator: MovementGenerator::idle(),
            stack: BTreeMap::new(),
        }
    }

    fn key_of(generator: &MovementGenerator) -> StackKey {
        (generator.mode(), generator.priority())
    }

    fn top_key(&self) -> Option<StackKey> {
        self.stack.keys().next_back().copied()
    }

    /// The generator controlling the actor
    pub fn top(&self) -> &MovementGenerator {
        self.stack
            .values()
            .next_back()
            .unwrap_or(&self.default_generator)
    }

    fn top_mut(&mut self) -> &mut MovementGenerator {
        match self.stack.values_mut().next_back() {
            Some(generator) => generator,
            None => &mut self.default_generator,
        }
    }

    pub fn current_kind(&self) -> MovementGeneratorType {
        self.top().kind()
    }

    pub fn default_generator(&self) -> &MovementGenerator {
        &self.default_generator
    }

    /// Stacked generators, controlling one first. The default generator is
    /// not included.
    pub fn iter(&self) -> impl Iterator<Item = &MovementGenerator> {
        self.stack.values().rev()
    }

    /// Number of stacked generators, not counting the default one
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Target of the controlling generator when it is a chase
    pub fn chase_target(&self) -> Option<ActorId> {
        self.top().chase_target()
    }

    pub fn spline_chain_resume_info(&self, actor: &Actor, splines: &dyn SplineMover) -> Option<SplineChainResumeInfo> {
        self.top().spline_chain_resume_info(actor, splines)
    }

    /// Push a generator into a slot.
    ///
    /// On the active stack a generator with the same mode and priority as an
    /// existing one replaces it, whatever its kind or target.
    pub fn add(
        &mut self,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        generator: MovementGenerator,
        slot: MotionSlot,
    ) {
        debug!("Actor {} adding {:?} to {:?} slot", actor.id, generator.kind(), slot);
        match slot {
            MotionSlot::Default => {
                let was_active = self.stack.is_empty();
                let mut previous = std::mem::replace(&mut self.default_generator, generator);
                let follow_up = previous.finalize(actor, ctx, was_active, false);
                self.queue(actor, ctx, follow_up);
            }
            MotionSlot::Active => {
                let key = Self::key_of(&generator);
                match self.top_key() {
                    Some(top) if top == key => {
                        if let Some(mut replaced) = self.stack.remove(&key) {
                            let follow_up = replaced.finalize(actor, ctx, true, false);
                            self.queue(actor, ctx, follow_up);
                        }
                    }
                    Some(top) if key > top => {
                        if let Some(current) = self.stack.get_mut(&top) {
                            current.deactivate(actor, ctx);
                        }
                    }
                    Some(_) => {
                        if let Some(mut replaced) = self.stack.remove(&key) {
                            let follow_up = replaced.finalize(actor, ctx, false, false);
                            self.queue(actor, ctx, follow_up);
                        }
                    }
                    None => self.default_generator.deactivate(actor, ctx),
                }
                self.stack.insert(key, generator);
            }
        }
    }

    fn queue(
        &mut self,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        follow_up: Option<GeneratorRequest>,
    ) {
        if let Some(request) = follow_up {
            self.add(actor, ctx, request.generator, request.slot);
        }
    }

    /// Drive the controlling generator for one tick
    pub fn update(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, diff_ms: u32) {
        if let Some(mut entry) = self.stack.last_entry() {
            if entry.get_mut().update(actor, ctx, diff_ms) == Progress::Done {
                let mut finished = entry.remove();
                let follow_up = finished.finalize(actor, ctx, true, true);
                self.queue(actor, ctx, follow_up);
            }
            return;
        }

        if self.default_generator.update(actor, ctx, diff_ms) == Progress::Done {
            let mut finished = std::mem::replace(&mut self.default_generator, MovementGenerator::idle());
            let follow_up = finished.finalize(actor, ctx, true, true);
            self.queue(actor, ctx, follow_up);
        }
    }

    /// Remove every stacked generator matching `predicate`. Returns how many
    /// were removed.
    fn remove_where(
        &mut self,
        actor: &mut Actor,
        ctx: &mut MotionContext<'_>,
        predicate: impl Fn(&MovementGenerator) -> bool,
    ) -> usize {
        let top = self.top_key();
        let keys: Vec<StackKey> = self
            .stack
            .iter()
            .filter(|(_, generator)| predicate(generator))
            .map(|(key, _)| *key)
            .collect();

        for key in &keys {
            if let Some(mut removed) = self.stack.remove(key) {
                // Follow-ups only come from informing finalizes
                removed.finalize(actor, ctx, Some(*key) == top, false);
            }
        }
        keys.len()
    }

    pub fn clear(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, scope: ClearScope) -> usize {
        let removed = match scope {
            ClearScope::All => self.remove_where(actor, ctx, |_| true),
            ClearScope::Priority(priority) => self.remove_where(actor, ctx, |g| g.priority() == priority),
            ClearScope::Default => {
                if self.default_generator.kind() == MovementGeneratorType::Idle {
                    return 0;
                }
                self.add(actor, ctx, MovementGenerator::idle(), MotionSlot::Default);
                1
            }
        };
        debug!("Actor {} cleared {} generator(s) ({:?})", actor.id, removed, scope);
        removed
    }

    /// Remove every generator of `kind`, the default one included
    pub fn remove_kind(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, kind: MovementGeneratorType) -> usize {
        let mut removed = self.remove_where(actor, ctx, |g| g.kind() == kind);
        if kind != MovementGeneratorType::Idle && self.default_generator.kind() == kind {
            self.add(actor, ctx, MovementGenerator::idle(), MotionSlot::Default);
            removed += 1;
        }
        removed
    }

    /// Finalize everything without informing; used when the actor leaves the
    /// world
    pub fn finalize_all(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>) {
        self.remove_where(actor, ctx, |_| true);
        let mut default = std::mem::replace(&mut self.default_generator, MovementGenerator::idle());
        default.finalize(actor, ctx, true, false);
    }

    pub fn speed_changed(&mut self) {
        self.default_generator.speed_changed();
        for generator in self.stack.values_mut() {
            generator.speed_changed();
        }
    }

    fn pausable(generator: &MovementGenerator) -> bool {
        matches!(
            generator.kind(),
            MovementGeneratorType::Random | MovementGeneratorType::Waypoint
        )
    }

    /// Pause the controlling wander or patrol; a zero timer pauses until
    /// [`MotionMaster::resume`]
    pub fn pause(&mut self, actor: &mut Actor, ctx: &mut MotionContext<'_>, timer_ms: u32) -> bool {
        let top = self.top_mut();
        if !Self::pausable(top) {
            return false;
        }
        top.pause(actor, ctx, timer_ms)
    }

    pub fn resume(&mut self, override_timer_ms: u32) -> bool {
        let top = self.top_mut();
        if !Self::pausable(top) {
            return false;
        }
        top.resume(override_timer_ms);
        true
    }

    /// Move the anchor of every wander generator held
    pub fn set_wander_anchor(&mut self, anchor: Vec2) -> bool {
        let mut found = self.default_generator.set_wander_anchor(anchor);
        for generator in self.stack.values_mut() {
            found |= generator.set_wander_anchor(anchor);
        }
        found
    }

    /// Whether the controlling generator is in control right now
    pub fn is_controlling_active(&self) -> bool {
        self.top().lifecycle() == Lifecycle::Active
    }
}
