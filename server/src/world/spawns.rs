//! Creature spawn registry.
//!
//! Holds templates, spawn rows and creature links. Filled from the database
//! at boot, from `spawns.json` when the database is unreachable, or from the
//! hardcoded defaults below.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use log::{info, warn};
use serde::Deserialize;
use realm_shared::{CreatureRank, LootEntry, MovementType};

use crate::entities::CreatureTemplate;

/// Despawn when the master's corpse is removed
pub const LINK_DESPAWN_ON_DESPAWN: u32 = 0x01;
/// Respawn when the master respawns
pub const LINK_RESPAWN_ON_RESPAWN: u32 = 0x02;
/// Only spawn while the master is alive
pub const LINK_CANT_SPAWN_IF_MASTER_DEAD: u32 = 0x04;
/// Only spawn while the master is dead
pub const LINK_CANT_SPAWN_IF_MASTER_ALIVE: u32 = 0x08;

/// One placed creature
#[derive(Debug, Clone, Deserialize)]
pub struct CreatureSpawn {
    pub guid: u64,
    pub entry: u32,
    pub map_id: u32,
    pub position: [f32; 3],
    #[serde(default)]
    pub orientation: f32,
    pub respawn_secs: u32,
    /// Overrides the template's movement type
    #[serde(default)]
    pub movement_type: Option<MovementType>,
    #[serde(default)]
    pub path_id: u32,
}

/// Ties a creature's spawning to another creature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CreatureLink {
    pub guid: u64,
    pub master_guid: u64,
    pub flags: u32,
}

impl CreatureLink {
    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Whether a spawn is currently allowed given the master's state
    pub fn allows_spawn(&self, master_alive: bool) -> bool {
        if self.has(LINK_CANT_SPAWN_IF_MASTER_DEAD) && !master_alive {
            return false;
        }
        if self.has(LINK_CANT_SPAWN_IF_MASTER_ALIVE) && master_alive {
            return false;
        }
        true
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SpawnFile {
    templates: Vec<CreatureTemplate>,
    spawns: Vec<CreatureSpawn>,
    links: Vec<CreatureLink>,
}

/// Templates, spawns and links known to the world
#[derive(Debug, Default)]
pub struct SpawnRegistry {
    templates: HashMap<u32, Arc<CreatureTemplate>>,
    spawns: Vec<CreatureSpawn>,
    links: HashMap<u64, CreatureLink>,
}

impl SpawnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace templates with loaded rows
    pub fn load_templates(&mut self, templates: Vec<CreatureTemplate>) {
        self.templates = templates
            .into_iter()
            .map(|t| (t.entry, Arc::new(t)))
            .collect();
        info!("Loaded {} creature templates", self.templates.len());
    }

    /// Replace spawns with loaded rows. Spawns of unknown templates are skipped.
    pub fn load_spawns(&mut self, spawns: Vec<CreatureSpawn>) {
        let total = spawns.len();
        self.spawns = spawns
            .into_iter()
            .filter(|spawn| {
                let known = self.templates.contains_key(&spawn.entry);
                if !known {
                    warn!("Spawn {} references unknown template {}, skipped", spawn.guid, spawn.entry);
                }
                known
            })
            .collect();
        info!("Loaded {} of {} creature spawns", self.spawns.len(), total);
    }

    /// Replace links with loaded rows. Self links and links to missing spawns are skipped.
    pub fn load_links(&mut self, links: Vec<CreatureLink>) {
        self.links.clear();
        for link in links {
            if link.guid == link.master_guid {
                warn!("Creature {} is linked to itself, skipped", link.guid);
                continue;
            }
            if self.spawn(link.master_guid).is_none() || self.spawn(link.guid).is_none() {
                warn!("Link {} -> {} references a missing spawn, skipped", link.guid, link.master_guid);
                continue;
            }
            self.links.insert(link.guid, link);
        }
        info!("Loaded {} creature links", self.links.len());
    }

    /// Parse a JSON spawn file's contents
    pub fn from_json(content: &str) -> Result<Self, String> {
        let file: SpawnFile = serde_json::from_str(content)
            .map_err(|e| format!("Failed to parse spawn file: {}", e))?;

        let mut registry = Self::new();
        registry.load_templates(file.templates);
        registry.load_spawns(file.spawns);
        registry.load_links(file.links);
        Ok(registry)
    }

    /// Load a JSON spawn file
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read spawn file {:?}: {}", path, e))?;
        Self::from_json(&content)
    }

    /// Create a registry with hardcoded default data.
    /// Used when neither the database nor a spawn file is available.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.load_templates(vec![
            CreatureTemplate {
                entry: 1,
                name: "City Guard".to_string(),
                min_level: 55,
                max_level: 55,
                base_health: 1500,
                base_mana: 0,
                spirit: 40,
                rank: CreatureRank::Elite,
                npc_flags: 0x1,
                can_fly: false,
                walk_modifier: 1.0,
                run_modifier: 1.14,
                display_id: 3167,
                movement_type: MovementType::Waypoint,
                loot: Vec::new(),
            },
            CreatureTemplate {
                entry: 2,
                name: "Defias Thug".to_string(),
                min_level: 3,
                max_level: 4,
                base_health: 60,
                base_mana: 0,
                spirit: 10,
                rank: CreatureRank::Normal,
                npc_flags: 0,
                can_fly: false,
                walk_modifier: 1.0,
                run_modifier: 1.0,
                display_id: 1100,
                movement_type: MovementType::Waypoint,
                loot: vec![
                    LootEntry { item_id: 2589, drop_chance: 0.4, min_quantity: 1, max_quantity: 2 },
                    LootEntry { item_id: 1, drop_chance: 0.1, min_quantity: 1, max_quantity: 1 },
                ],
            },
            CreatureTemplate {
                entry: 3,
                name: "Young Wolf".to_string(),
                min_level: 1,
                max_level: 2,
                base_health: 40,
                base_mana: 0,
                spirit: 8,
                rank: CreatureRank::Normal,
                npc_flags: 0,
                can_fly: false,
                walk_modifier: 1.0,
                run_modifier: 1.2,
                display_id: 604,
                movement_type: MovementType::Idle,
                loot: vec![LootEntry { item_id: 750, drop_chance: 0.8, min_quantity: 1, max_quantity: 1 }],
            },
            CreatureTemplate {
                entry: 4,
                name: "Gryphon".to_string(),
                min_level: 60,
                max_level: 60,
                base_health: 3000,
                base_mana: 0,
                spirit: 50,
                rank: CreatureRank::Normal,
                npc_flags: 0,
                can_fly: true,
                walk_modifier: 1.0,
                run_modifier: 1.0,
                display_id: 1149,
                movement_type: MovementType::Idle,
                loot: Vec::new(),
            },
            CreatureTemplate {
                entry: 5,
                name: "Lord Kazzak".to_string(),
                min_level: 63,
                max_level: 63,
                base_health: 30000,
                base_mana: 20000,
                spirit: 120,
                rank: CreatureRank::WorldBoss,
                npc_flags: 0,
                can_fly: false,
                walk_modifier: 1.0,
                run_modifier: 1.0,
                display_id: 12449,
                movement_type: MovementType::Idle,
                loot: vec![LootEntry { item_id: 17111, drop_chance: 1.0, min_quantity: 1, max_quantity: 1 }],
            },
            CreatureTemplate {
                entry: 6,
                name: "Kazzak Servant".to_string(),
                min_level: 58,
                max_level: 60,
                base_health: 4000,
                base_mana: 2000,
                spirit: 60,
                rank: CreatureRank::Elite,
                npc_flags: 0,
                can_fly: false,
                walk_modifier: 1.0,
                run_modifier: 1.0,
                display_id: 12450,
                movement_type: MovementType::Idle,
                loot: Vec::new(),
            },
        ]);

        let spawn = |guid: u64, entry: u32, position: [f32; 3], respawn_secs: u32| CreatureSpawn {
            guid,
            entry,
            map_id: 0,
            position,
            orientation: 0.0,
            respawn_secs,
            movement_type: None,
            path_id: 0,
        };

        registry.load_spawns(vec![
            spawn(1, 1, [-8800.0, 640.0, 94.0], 300),
            spawn(2, 2, [-9800.0, 200.0, 35.0], 120),
            spawn(3, 2, [-9805.0, 195.0, 35.0], 120),
            spawn(4, 3, [-9100.0, 400.0, 90.0], 60),
            spawn(5, 4, [-8835.0, 490.0, 109.0], 60),
            spawn(6, 5, [-12000.0, 2500.0, 40.0], 259200),
            spawn(7, 6, [-12010.0, 2505.0, 40.0], 600),
        ]);

        registry.load_links(vec![CreatureLink {
            guid: 7,
            master_guid: 6,
            flags: LINK_DESPAWN_ON_DESPAWN | LINK_RESPAWN_ON_RESPAWN | LINK_CANT_SPAWN_IF_MASTER_DEAD,
        }]);

        info!("SpawnRegistry initialized with {} spawns (hardcoded defaults)", registry.spawns.len());

        registry
    }

    pub fn template(&self, entry: u32) -> Option<Arc<CreatureTemplate>> {
        self.templates.get(&entry).cloned()
    }

    pub fn spawns(&self) -> &[CreatureSpawn] {
        &self.spawns
    }

    pub fn spawn(&self, guid: u64) -> Option<&CreatureSpawn> {
        self.spawns.iter().find(|s| s.guid == guid)
    }

    pub fn link(&self, guid: u64) -> Option<CreatureLink> {
        self.links.get(&guid).copied()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_spawn_gate() {
        let alive_only = CreatureLink { guid: 2, master_guid: 1, flags: LINK_CANT_SPAWN_IF_MASTER_DEAD };
        assert!(alive_only.allows_spawn(true));
        assert!(!alive_only.allows_spawn(false));

        let dead_only = CreatureLink { guid: 2, master_guid: 1, flags: LINK_CANT_SPAWN_IF_MASTER_ALIVE };
        assert!(!dead_only.allows_spawn(true));
        assert!(dead_only.allows_spawn(false));

        let free = CreatureLink { guid: 2, master_guid: 1, flags: LINK_RESPAWN_ON_RESPAWN };
        assert!(free.allows_spawn(false));
    }

    #[test]
    fn test_json_skips_bad_rows() {
        let registry = SpawnRegistry::from_json(r#"{
            "templates": [ { "entry": 9, "name": "Boar", "min_level": 1, "max_level": 1, "base_health": 30 } ],
            "spawns": [
                { "guid": 1, "entry": 9, "map_id": 0, "position": [0, 0, 0], "respawn_secs": 30 },
                { "guid": 2, "entry": 10, "map_id": 0, "position": [0, 0, 0], "respawn_secs": 30 }
            ],
            "links": [
                { "guid": 1, "master_guid": 1, "flags": 1 },
                { "guid": 1, "master_guid": 2, "flags": 1 }
            ]
        }"#).unwrap();

        assert_eq!(registry.spawns().len(), 1);
        assert!(registry.link(1).is_none());
        assert_eq!(registry.template(9).unwrap().name, "Boar");
    }

    #[test]
    fn test_defaults_are_consistent() {
        let registry = SpawnRegistry::with_defaults();
        for spawn in registry.spawns() {
            assert!(registry.template(spawn.entry).is_some());
        }
        assert_eq!(registry.link(7).unwrap().master_guid, 6);
    }
}
