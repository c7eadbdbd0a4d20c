use std::path::PathBuf;

use crate::motion::constants::{tick, wander};

/// Demo server configuration
#[derive(Debug, Clone)]
pub struct MotionConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Actors spawned by the demo server
    pub actor_count: usize,
    /// Wander radius given to demo actors
    pub wander_radius: f32,
    /// Seed for every random roll in the motion core
    pub rng_seed: u64,
    /// JSON file with waypoint paths to load at startup
    pub waypoint_file: Option<PathBuf>,
    /// Port of the Prometheus endpoint; `None` disables it
    pub metrics_port: Option<u16>,
    /// Queued commands accepted between two ticks
    pub command_buffer_capacity: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            tick_rate: tick::TICK_RATE,
            actor_count: 200,
            wander_radius: wander::DEFAULT_RADIUS,
            rng_seed: 0x5eed,
            waypoint_file: None,
            metrics_port: Some(9100),
            command_buffer_capacity: 1024,
        }
    }
}

impl MotionConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            if let Ok(parsed) = rate.parse::<u32>() {
                if (1..=1000).contains(&parsed) {
                    config.tick_rate = parsed;
                } else {
                    tracing::warn!("TICK_RATE must be 1-1000, using default");
                }
            } else {
                tracing::warn!("Invalid TICK_RATE '{}', using default", rate);
            }
        }

        if let Ok(count) = std::env::var("ACTOR_COUNT") {
            if let Ok(parsed) = count.parse::<usize>() {
                config.actor_count = parsed;
            } else {
                tracing::warn!("Invalid ACTOR_COUNT '{}', using default", count);
            }
        }

        if let Ok(radius) = std::env::var("WANDER_RADIUS") {
            match radius.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => config.wander_radius = parsed,
                _ => tracing::warn!("Invalid WANDER_RADIUS '{}', using default", radius),
            }
        }

        if let Ok(seed) = std::env::var("RNG_SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.rng_seed = parsed;
            } else {
                tracing::warn!("Invalid RNG_SEED '{}', using default", seed);
            }
        }

        if let Ok(path) = std::env::var("WAYPOINT_FILE") {
            config.waypoint_file = Some(PathBuf::from(path));
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(0) => config.metrics_port = None,
                Ok(parsed) => config.metrics_port = Some(parsed),
                Err(_) => tracing::warn!("Invalid METRICS_PORT '{}', using default", port),
            }
        }

        if let Ok(capacity) = std::env::var("COMMAND_BUFFER_CAPACITY") {
            if let Ok(parsed) = capacity.parse::<usize>() {
                config.command_buffer_capacity = parsed;
            } else {
                tracing::warn!("Invalid COMMAND_BUFFER_CAPACITY '{}', using default", capacity);
            }
        }

        config
    }

    /// Milliseconds simulated per tick
    pub fn tick_duration_ms(&self) -> u32 {
        1000 / self.tick_rate.max(1)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err("tick_rate must be 1-1000".to_string());
        }
        if !self.wander_radius.is_finite() || self.wander_radius < 0.0 {
            return Err("wander_radius must be a non-negative number".to_string());
        }
        if self.command_buffer_capacity == 0 {
            return Err("command_buffer_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
