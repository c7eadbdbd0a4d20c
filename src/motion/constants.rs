//! Motion tuning constants.
//!
//! All durations are in milliseconds, all distances in world units.

/// Simulation tick constants
pub mod tick {
    /// Default tick rate of the demo server in Hz
    pub const TICK_RATE: u32 = 10;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
}

/// Actor defaults
pub mod actor {
    /// Default walk speed in units per second
    pub const WALK_SPEED: f32 = 2.5;
    /// Default run speed in units per second
    pub const RUN_SPEED: f32 = 7.0;
    /// Default combat reach (hitbox radius)
    pub const COMBAT_REACH: f32 = 1.5;
}

/// Chase tuning
pub mod chase {
    /// Interval between "already in range" settle checks
    pub const RANGE_CHECK_INTERVAL_MS: u32 = 100;
    /// Minimal distance two hitboxes may keep
    pub const CONTACT_DISTANCE: f32 = 0.5;
    /// Lower bound of the melee range
    pub const NOMINAL_MELEE_RANGE: f32 = 5.0;
    /// Added on top of both combat reaches when computing melee range
    pub const MELEE_REACH_BONUS: f32 = 4.0 / 3.0;
    /// Default tolerance of a chase angle constraint (π/4)
    pub const DEFAULT_ANGLE_TOLERANCE: f32 = std::f32::consts::FRAC_PI_4;
}

/// Follow tuning
pub mod follow {
    /// Interval between settle checks
    pub const CHECK_INTERVAL_MS: u32 = 100;
    /// Slack added to the follow range before a new path is computed
    pub const RANGE_TOLERANCE: f32 = 1.0;
}

/// Random (wander) tuning
pub mod wander {
    /// Minimum number of legs walked before resting
    pub const MIN_STEPS: u8 = 2;
    /// Maximum number of legs walked before resting
    pub const MAX_STEPS: u8 = 10;
    /// Minimum rest in whole seconds
    pub const REST_MIN_SECS: u32 = 4;
    /// Maximum rest in whole seconds
    pub const REST_MAX_SECS: u32 = 10;
    /// Default wander radius when the request does not carry one
    pub const DEFAULT_RADIUS: f32 = 5.0;
}

/// Backoff shared by every generator that picks random destinations
pub mod retry {
    /// Retry delay after the candidate point failed the LOS check
    pub const LOS_BLOCKED_MS: u32 = 200;
    /// Retry delay after the path service returned an unusable path
    pub const PATH_FAILED_MS: u32 = 100;
    /// Path length cap for wander/flee/confused legs
    pub const PATH_LENGTH_LIMIT: f32 = 30.0;
    /// Pause after a flee/confused leg, lower bound
    pub const RELAUNCH_DELAY_MIN_MS: u32 = 800;
    /// Pause after a flee/confused leg, upper bound
    pub const RELAUNCH_DELAY_MAX_MS: u32 = 1500;
}

/// Fleeing tuning
pub mod flee {
    /// Inner edge of the quiet band
    pub const MIN_QUIET_DISTANCE: f32 = 28.0;
    /// Outer edge of the quiet band
    pub const MAX_QUIET_DISTANCE: f32 = 43.0;
    /// Below this the fear source is treated as sitting on top of the actor
    pub const MIN_SOURCE_DISTANCE: f32 = 0.2;
}

/// Confused tuning
pub mod confused {
    /// Maximum hop length in either direction
    pub const MAX_HOP: f32 = 2.0;
}

/// Waypoint tuning
pub mod waypoint {
    /// Delay before the first node is requested
    pub const START_DELAY_MS: u32 = 1000;
    /// Retry delay while the actor cannot move
    pub const BLOCKED_RETRY_MS: u32 = 1000;
}

/// Distract tuning
pub mod distract {
    /// Duration of the distract that follows a seek-assistance run
    pub const ASSISTANCE_DISTRACT_MS: u32 = 2000;
}
