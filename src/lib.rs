//! Creature Motion Server Library
//!
//! Movement-generator stacks for server-side actors: each actor carries a
//! motion master that picks one generator (idle, wander, patrol, chase,
//! follow, flee, scripted spline) to drive it every tick.
//!
//! The [`motion`] module is the core; [`metrics`] and [`config`] back the
//! demo server binary.

pub mod config;
pub mod metrics;
pub mod motion;
pub mod util;
