//! Queued motion commands for callers outside the tick loop
//!
//! Uses crossbeam-channel so script handlers, admin commands and other
//! threads can hand requests to the simulation without locking actor
//! state. The world drains every pending command at the start of a tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::motion::actor::ActorId;
use crate::motion::generator::{MotionSlot, MovementGenerator};
use crate::motion::motion_master::ClearScope;
use crate::util::vec2::Vec2;

/// What to do to an actor's motion stack
#[derive(Debug)]
pub enum MotionCommand {
    Request {
        generator: MovementGenerator,
        slot: MotionSlot,
    },
    Clear(ClearScope),
    SetWanderAnchor(Vec2),
    /// Zero pauses until resumed
    Pause { timer_ms: u32 },
    Resume { override_timer_ms: u32 },
    SpeedChanged,
}

#[derive(Debug)]
pub struct CommandMessage {
    pub actor_id: ActorId,
    pub command: MotionCommand,
}

/// Bounded command queue shared between producers and the tick loop
pub struct CommandBuffer {
    sender: Sender<CommandMessage>,
    receiver: Receiver<CommandMessage>,
    capacity: usize,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Handle for a producer; each producer keeps its own clone
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Everything queued since the last drain, in submission order
    pub fn drain(&self) -> Vec<CommandMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Clonable producer handle
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<CommandMessage>,
}

impl CommandSender {
    /// Queue a command without blocking
    #[inline]
    pub fn try_send(&self, actor_id: ActorId, command: MotionCommand) -> Result<(), CommandBufferError> {
        self.sender
            .try_send(CommandMessage { actor_id, command })
            .map_err(|e| match e {
                TrySendError::Full(_) => CommandBufferError::Full,
                TrySendError::Disconnected(_) => CommandBufferError::Disconnected,
            })
    }

    pub fn request(
        &self,
        actor_id: ActorId,
        generator: MovementGenerator,
        slot: MotionSlot,
    ) -> Result<(), CommandBufferError> {
        self.try_send(actor_id, MotionCommand::Request { generator, slot })
    }

    pub fn set_wander_anchor(&self, actor_id: ActorId, anchor: Vec2) -> Result<(), CommandBufferError> {
        self.try_send(actor_id, MotionCommand::SetWanderAnchor(anchor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandBufferError {
    /// Buffer is full (backpressure)
    #[error("Command buffer is full")]
    Full,
    /// Tick loop is gone
    #[error("Command buffer disconnected")]
    Disconnected,
}
