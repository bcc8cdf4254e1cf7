//! AI and scripting seams.
//!
//! Creatures drive their AI through [`CreatureAi`]; node scripts and taxi
//! events are handed to a [`ScriptRunner`]. Both are plain traits so the
//! world can be run without any scripting attached.

use log::{debug, trace};

use crate::entities::Unit;

/// Per-creature AI callbacks
pub trait CreatureAi: Send {
    fn update_ai(&mut self, _unit: &mut Unit, _diff_ms: u32) {}

    /// Arrival or departure reported by a movement generator
    fn movement_inform(&mut self, _unit: &mut Unit, _kind: u32, _point: u32) {}

    fn just_died(&mut self, _unit: &mut Unit, _killer: Option<u64>) {}

    fn just_respawned(&mut self, _unit: &mut Unit) {}

    /// Called when the corpse is removed. May override the respawn delay (seconds).
    fn corpse_removed(&mut self, _unit: &mut Unit) -> Option<u32> {
        None
    }
}

/// AI that does nothing beyond tracing movement reports
#[derive(Debug, Default)]
pub struct PassiveAi;

impl CreatureAi for PassiveAi {
    fn movement_inform(&mut self, unit: &mut Unit, kind: u32, point: u32) {
        trace!("Unit {} movement inform {:#x} at point {}", unit.guid, kind, point);
    }
}

/// Runner for database scripts
pub trait ScriptRunner: Send {
    fn run_movement_script(&mut self, script_id: u32, guid: u64);

    fn run_taxi_event(&mut self, event_id: u32, guid: u64, departure: bool);
}

/// Script runner used when no scripting engine is attached
#[derive(Debug, Default)]
pub struct NoScripts;

impl ScriptRunner for NoScripts {
    fn run_movement_script(&mut self, script_id: u32, guid: u64) {
        debug!("No script engine: movement script {} for unit {} ignored", script_id, guid);
    }

    fn run_taxi_event(&mut self, event_id: u32, guid: u64, departure: bool) {
        debug!("No script engine: taxi {} event {} for unit {} ignored",
            if departure { "departure" } else { "arrival" }, event_id, guid);
    }
}
