//! Path data shared by the server and offline tooling.
//!
//! A waypoint path is an ordered map of node id -> node. Iteration order is
//! ascending by node id, which is the traversal order; ids need not be
//! contiguous. Taxi (flight) paths are plain ordered vectors that may span
//! several maps.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Orientation value used by the path tables to mean "face the direction of travel"
pub const ORIENTATION_FROM_TRAVEL: f32 = 100.0;

/// Number of alternative text slots a waypoint behavior can carry
pub const MAX_WAYPOINT_TEXT: usize = 5;

/// Where a waypoint path comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PathOrigin {
    /// Path attached to one spawned creature (keyed by spawn guid)
    Guid = 1,
    /// Path attached to every creature of a template (keyed by entry)
    Entry = 2,
    /// Path supplied by scripts (keyed by entry, selected by path id)
    External = 3,
}

impl PathOrigin {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Guid),
            2 => Some(Self::Entry),
            3 => Some(Self::External),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Guid => "guid",
            Self::Entry => "entry",
            Self::External => "external",
        }
    }
}

/// Optional actions performed when a creature reaches or leaves a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointBehavior {
    pub emote: u32,
    pub spell: u32,
    /// Display id applied on arrival
    pub model1: u32,
    /// Display id applied on departure
    pub model2: u32,
    /// Alternative texts; a zero ends the populated run
    pub text_ids: [i32; MAX_WAYPOINT_TEXT],
}

impl WaypointBehavior {
    pub fn is_empty(&self) -> bool {
        self.emote == 0
            && self.spell == 0
            && self.model1 == 0
            && self.model2 == 0
            && self.text_ids.iter().all(|t| *t == 0)
    }
}

/// One stop on a waypoint path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointNode {
    pub position: [f32; 3],
    /// `None` means the heading is derived from the direction of travel
    pub orientation: Option<f32>,
    /// Milliseconds to wait after arriving
    pub delay: u32,
    pub script_id: Option<u32>,
    pub behavior: Option<WaypointBehavior>,
}

impl WaypointNode {
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            orientation: None,
            delay: 0,
            script_id: None,
            behavior: None,
        }
    }
}

/// Ordered node collection, iterated ascending by node id
pub type WaypointPath = BTreeMap<u32, WaypointNode>;

/// One node of a taxi (flight) path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiNode {
    pub map_id: u32,
    pub position: [f32; 3],
    pub arrival_event_id: u32,
    pub departure_event_id: u32,
}

impl TaxiNode {
    pub fn new(map_id: u32, position: [f32; 3]) -> Self {
        Self {
            map_id,
            position,
            arrival_event_id: 0,
            departure_event_id: 0,
        }
    }
}

/// Finite, ordered flight path
pub type TaxiPath = Vec<TaxiNode>;

/// Raw waypoint row as stored in the database or the JSON path file.
/// Converted into [`WaypointNode`]s by the server's validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointNodeRow {
    pub origin: u8,
    /// Spawn guid for guid paths, template entry otherwise
    pub owner_key: u32,
    #[serde(default)]
    pub path_id: u32,
    pub point: u32,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    #[serde(default = "default_row_orientation")]
    pub orientation: f32,
    #[serde(default)]
    pub wait_time: i32,
    #[serde(default)]
    pub script_id: u32,
    #[serde(default)]
    pub emote: u32,
    #[serde(default)]
    pub spell: u32,
    #[serde(default)]
    pub model1: u32,
    #[serde(default)]
    pub model2: u32,
    #[serde(default)]
    pub text_ids: [i32; MAX_WAYPOINT_TEXT],
}

fn default_row_orientation() -> f32 {
    ORIENTATION_FROM_TRAVEL
}

/// Raw taxi node row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxiNodeRow {
    pub path_id: u32,
    pub node_index: u32,
    pub map_id: u32,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    #[serde(default)]
    pub arrival_event_id: u32,
    #[serde(default)]
    pub departure_event_id: u32,
}
