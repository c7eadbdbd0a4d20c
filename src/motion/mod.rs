//! Movement scheduling core.
//!
//! Every simulated actor owns a [`motion_master::MotionMaster`]: a stack of
//! movement generators (wander, chase, patrol, flee, scripted splines) of
//! which exactly one drives the actor each tick. The [`world::MotionWorld`]
//! ticks all stacks against a frozen snapshot of the previous tick.

pub mod actor;
pub mod command_buffer;
pub mod constants;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod motion_master;
pub mod services;
pub mod sim;
pub mod timer;
pub mod unit_state;
pub mod waypoints;
pub mod world;

pub use actor::{Actor, ActorId};
pub use error::MotionError;
pub use generator::{MotionMode, MotionPriority, MotionSlot, MovementGenerator, MovementGeneratorType};
pub use motion_master::{ClearScope, MotionMaster};
pub use world::MotionWorld;
