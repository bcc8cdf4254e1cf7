//! Creature templates.

use rand::Rng;
use serde::Deserialize;
use realm_shared::{CreatureRank, LootEntry, MovementType};

/// Static data shared by every creature of one entry
#[derive(Debug, Clone, Deserialize)]
pub struct CreatureTemplate {
    pub entry: u32,
    pub name: String,
    pub min_level: u8,
    pub max_level: u8,
    pub base_health: u32,
    #[serde(default)]
    pub base_mana: u32,
    #[serde(default)]
    pub spirit: u32,
    #[serde(default = "default_rank")]
    pub rank: CreatureRank,
    #[serde(default)]
    pub npc_flags: u32,
    #[serde(default)]
    pub can_fly: bool,
    #[serde(default = "default_speed_modifier")]
    pub walk_modifier: f32,
    #[serde(default = "default_speed_modifier")]
    pub run_modifier: f32,
    #[serde(default)]
    pub display_id: u32,
    #[serde(default = "default_movement_type")]
    pub movement_type: MovementType,
    #[serde(default)]
    pub loot: Vec<LootEntry>,
}

fn default_rank() -> CreatureRank {
    CreatureRank::Normal
}

fn default_speed_modifier() -> f32 {
    1.0
}

fn default_movement_type() -> MovementType {
    MovementType::Idle
}

/// Stats of one creature at a rolled level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStats {
    pub level: u8,
    pub health: u32,
    pub mana: u32,
}

impl CreatureTemplate {
    /// Roll a level in range and scale health and mana by it
    pub fn roll_stats<R: Rng + ?Sized>(&self, rng: &mut R) -> LevelStats {
        let (low, high) = if self.min_level <= self.max_level {
            (self.min_level, self.max_level)
        } else {
            (self.max_level, self.min_level)
        };
        let level = rng.gen_range(low..=high);
        self.stats_for_level(level)
    }

    pub fn stats_for_level(&self, level: u8) -> LevelStats {
        let level_multiplier = 1.0 + (level.max(1) as f32 - 1.0) * 0.15;
        LevelStats {
            level,
            health: ((self.base_health as f32 * level_multiplier) as u32).max(1),
            mana: (self.base_mana as f32 * level_multiplier) as u32,
        }
    }
}
