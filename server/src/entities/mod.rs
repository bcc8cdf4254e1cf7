//! Server-side entity definitions.

mod creature;
mod loot;
mod template;
mod unit;

pub use creature::{Creature, CreatureContext, LinkEvent, REGEN_INTERVAL_MS};
pub use loot::{Loot, LootItem};
pub use template::{CreatureTemplate, LevelStats};
pub use unit::{Unit, UpdatePhase, BASE_RUN_SPEED, BASE_WALK_SPEED};

#[cfg(test)]
pub(crate) use creature::tests::RecordingStore;
