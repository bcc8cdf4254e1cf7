//! Shared creature definitions.

use serde::{Deserialize, Serialize};

/// Life/death state of a creature.
///
/// `JustDied` and `JustAlived` are transient: they are promoted to `Corpse`
/// and `Alive` within the same update that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeathState {
    Alive = 0,
    JustDied = 1,
    Corpse = 2,
    Dead = 3,
    JustAlived = 4,
}

impl DeathState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::JustDied => "just died",
            Self::Corpse => "corpse",
            Self::Dead => "dead",
            Self::JustAlived => "just alived",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::JustDied | Self::JustAlived)
    }
}

/// Creature classification, drives corpse decay time and respawn persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CreatureRank {
    Normal = 0,
    Elite = 1,
    RareElite = 2,
    WorldBoss = 3,
    Rare = 4,
}

impl CreatureRank {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Elite),
            2 => Some(Self::RareElite),
            3 => Some(Self::WorldBoss),
            4 => Some(Self::Rare),
            _ => None,
        }
    }
}

/// Default movement installed when a creature spawns or respawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MovementType {
    Idle = 0,
    Waypoint = 2,
}

impl MovementType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            2 => Some(Self::Waypoint),
            _ => None,
        }
    }
}

/// Loot table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootEntry {
    pub item_id: u32,
    pub drop_chance: f32, // 0.0 - 1.0
    pub min_quantity: u32,
    pub max_quantity: u32,
}
