use crate::motion::actor::ActorId;

/// Errors surfaced by the motion world and its data loaders.
///
/// Anything that happens inside a generator during a tick is handled there
/// and never becomes one of these.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),
    #[error("Actor already spawned: {0}")]
    DuplicateActor(ActorId),
    #[error("Unknown waypoint path: {0}")]
    UnknownWaypointPath(u32),
    #[error("Waypoint path {0} has no nodes")]
    EmptyWaypointPath(u32),
    #[error("Spline chain {0} has no legs")]
    EmptySplineChain(u32),
    #[error("Invalid spline chain resume state: {0}")]
    InvalidResumeState(String),
    #[error("Waypoint file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Waypoint parse error: {0}")]
    Json(#[from] serde_json::Error),
}
