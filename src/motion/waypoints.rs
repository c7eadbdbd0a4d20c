//! Patrol path data and the store generators load it from.

use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::motion::error::MotionError;
use crate::util::vec2::Vec2;

/// Gait used to reach a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointMoveType {
    #[default]
    Walk,
    Run,
}

/// Single patrol node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointNode {
    pub id: u32,
    /// World position, or a transport offset when the actor rides one
    pub position: Vec2,
    /// Facing applied on arrival, only used together with a delay
    #[serde(default)]
    pub orientation: Option<f32>,
    /// Wait time at the node
    #[serde(default)]
    pub delay_ms: u32,
    /// Script event fired on arrival
    #[serde(default)]
    pub event_id: Option<u32>,
    /// Percent chance (0-100) the event fires
    #[serde(default)]
    pub event_chance: u8,
    #[serde(default)]
    pub move_type: WaypointMoveType,
    /// Overrides the actor's speed for the leg towards this node
    #[serde(default)]
    pub velocity: Option<f32>,
}

impl WaypointNode {
    pub fn new(id: u32, position: Vec2) -> Self {
        Self {
            id,
            position,
            orientation: None,
            delay_ms: 0,
            event_id: None,
            event_chance: 0,
            move_type: WaypointMoveType::Walk,
            velocity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointPath {
    pub id: u32,
    pub nodes: Vec<WaypointNode>,
}

impl WaypointPath {
    pub fn new(id: u32, nodes: Vec<WaypointNode>) -> Self {
        Self { id, nodes }
    }
}

/// Read-only collection of patrol paths keyed by id
#[derive(Debug, Clone, Default)]
pub struct WaypointStore {
    paths: HashMap<u32, Arc<WaypointPath>>,
}

impl WaypointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a path. Empty paths are rejected.
    pub fn insert(&mut self, path: WaypointPath) -> Result<(), MotionError> {
        if path.nodes.is_empty() {
            return Err(MotionError::EmptyWaypointPath(path.id));
        }
        self.paths.insert(path.id, Arc::new(path));
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<Arc<WaypointPath>> {
        self.paths.get(&id).cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.paths.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Parse a JSON array of paths
    pub fn from_json(json: &str) -> Result<Self, MotionError> {
        let paths: Vec<WaypointPath> = serde_json::from_str(json)?;
        let mut store = Self::new();
        for path in paths {
            store.insert(path)?;
        }
        Ok(store)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, MotionError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json(&json)?;
        info!("Loaded {} waypoint paths from {}", store.len(), path.display());
        Ok(store)
    }
}
