//! World event definitions shared between the server and its observers.

use serde::{Deserialize, Serialize};

/// Server tick rate in Hz
pub const SERVER_TICK_RATE: u32 = 20;

// =============================================================================
// Movement inform codes
// =============================================================================

/// Inform code for arrivals on guid/entry paths
pub const WAYPOINT_MOTION_TYPE: u32 = 2;

/// Arrival on an external path; the path id is added to the code
pub const EXTERNAL_WAYPOINT_MOVE: u32 = 0x100;

/// Departure towards the next node of an external path (+ path id)
pub const EXTERNAL_WAYPOINT_MOVE_START: u32 = 0x200;

/// Departure after the last node of an external path wrapped to the first (+ path id)
pub const EXTERNAL_WAYPOINT_FINISHED_LAST: u32 = 0x300;

/// Visibility of a creature to remote observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    On,
    /// Temporarily hidden while the corpse is removed, forcing observers to refresh
    RemoveCorpse,
}

/// Events produced by a world update, consumed by whatever broadcasts them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    CreatureSpawned {
        guid: u64,
        entry: u32,
        map_id: u32,
        position: [f32; 3],
        orientation: f32,
    },
    CreatureDied {
        guid: u64,
        killer: Option<u64>,
    },
    CreatureFell {
        guid: u64,
        ground_z: f32,
    },
    CorpseRemoved {
        guid: u64,
    },
    VisibilityChanged {
        guid: u64,
        visibility: Visibility,
    },
    CreatureRespawned {
        guid: u64,
        position: [f32; 3],
        health: u32,
    },
    SplineLaunched {
        guid: u64,
        points: Vec<[f32; 3]>,
        velocity: f32,
        facing: Option<f32>,
        flying: bool,
        walk: bool,
    },
    Teleported {
        guid: u64,
        map_id: u32,
        position: [f32; 3],
    },
    Emote {
        guid: u64,
        emote_id: u32,
    },
    SpellCast {
        guid: u64,
        spell_id: u32,
    },
    DisplayIdChanged {
        guid: u64,
        display_id: u32,
    },
    Say {
        guid: u64,
        text_id: i32,
    },
    ScriptStarted {
        guid: u64,
        script_id: u32,
    },
    TaxiEvent {
        guid: u64,
        event_id: u32,
        departure: bool,
    },
}

impl WorldEvent {
    /// Guid of the creature the event concerns
    pub fn guid(&self) -> u64 {
        match self {
            Self::CreatureSpawned { guid, .. }
            | Self::CreatureDied { guid, .. }
            | Self::CreatureFell { guid, .. }
            | Self::CorpseRemoved { guid }
            | Self::VisibilityChanged { guid, .. }
            | Self::CreatureRespawned { guid, .. }
            | Self::SplineLaunched { guid, .. }
            | Self::Teleported { guid, .. }
            | Self::Emote { guid, .. }
            | Self::SpellCast { guid, .. }
            | Self::DisplayIdChanged { guid, .. }
            | Self::Say { guid, .. }
            | Self::ScriptStarted { guid, .. }
            | Self::TaxiEvent { guid, .. } => *guid,
        }
    }
}
