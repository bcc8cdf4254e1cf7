//! PostgreSQL database operations.

use std::collections::{HashMap, HashSet};
use sqlx::{PgPool, postgres::PgPoolOptions, Row};
use realm_shared::{CreatureRank, LootEntry, MovementType, TaxiNodeRow, WaypointNodeRow, MAX_WAYPOINT_TEXT};

use crate::entities::CreatureTemplate;
use crate::world::{CreatureLink, CreatureSpawn};

/// Everything the world needs at boot
#[derive(Debug, Default)]
pub struct LoadedWorldData {
    pub templates: Vec<CreatureTemplate>,
    pub spawns: Vec<CreatureSpawn>,
    pub links: Vec<CreatureLink>,
    pub waypoint_rows: Vec<WaypointNodeRow>,
    pub taxi_rows: Vec<TaxiNodeRow>,
    pub text_ids: HashSet<i32>,
}

/// Database connection pool wrapper
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Load all world tables concurrently
    pub async fn load_world_data(&self) -> Result<LoadedWorldData, sqlx::Error> {
        let (templates, spawns, links, waypoint_rows, taxi_rows, text_ids) = futures::try_join!(
            self.load_creature_templates(),
            self.load_creature_spawns(),
            self.load_creature_links(),
            self.load_waypoint_nodes(),
            self.load_taxi_nodes(),
            self.load_text_ids(),
        )?;

        Ok(LoadedWorldData { templates, spawns, links, waypoint_rows, taxi_rows, text_ids })
    }

    // =========================================================================
    // Creature Data
    // =========================================================================

    /// Load creature templates with their loot tables
    pub async fn load_creature_templates(&self) -> Result<Vec<CreatureTemplate>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT entry, name, min_level, max_level, base_health, base_mana, spirit, rank,
                    npc_flags, can_fly, walk_modifier, run_modifier, display_id, movement_type
             FROM creature_templates ORDER BY entry"
        )
            .fetch_all(&self.pool)
            .await?;

        let loot_rows = sqlx::query(
            "SELECT entry, item_id, drop_chance, min_quantity, max_quantity FROM creature_loot ORDER BY entry, item_id"
        )
            .fetch_all(&self.pool)
            .await?;

        let mut loot: HashMap<u32, Vec<LootEntry>> = HashMap::new();
        for r in &loot_rows {
            loot.entry(r.get::<i32, _>("entry") as u32).or_default().push(LootEntry {
                item_id: r.get::<i32, _>("item_id") as u32,
                drop_chance: r.get("drop_chance"),
                min_quantity: r.get::<i32, _>("min_quantity") as u32,
                max_quantity: r.get::<i32, _>("max_quantity") as u32,
            });
        }

        Ok(rows.iter().map(|r| {
            let entry = r.get::<i32, _>("entry") as u32;
            CreatureTemplate {
                entry,
                name: r.get("name"),
                min_level: r.get::<i16, _>("min_level") as u8,
                max_level: r.get::<i16, _>("max_level") as u8,
                base_health: r.get::<i32, _>("base_health") as u32,
                base_mana: r.get::<i32, _>("base_mana") as u32,
                spirit: r.get::<i32, _>("spirit") as u32,
                rank: CreatureRank::from_u8(r.get::<i16, _>("rank") as u8).unwrap_or(CreatureRank::Normal),
                npc_flags: r.get::<i32, _>("npc_flags") as u32,
                can_fly: r.get("can_fly"),
                walk_modifier: r.get("walk_modifier"),
                run_modifier: r.get("run_modifier"),
                display_id: r.get::<i32, _>("display_id") as u32,
                movement_type: MovementType::from_u8(r.get::<i16, _>("movement_type") as u8)
                    .unwrap_or(MovementType::Idle),
                loot: loot.remove(&entry).unwrap_or_default(),
            }
        }).collect())
    }

    /// Load creature spawn rows
    pub async fn load_creature_spawns(&self) -> Result<Vec<CreatureSpawn>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT guid, entry, map_id, position_x, position_y, position_z, orientation,
                    respawn_secs, movement_type, path_id
             FROM creature_spawns ORDER BY guid"
        )
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| CreatureSpawn {
            guid: r.get::<i64, _>("guid") as u64,
            entry: r.get::<i32, _>("entry") as u32,
            map_id: r.get::<i32, _>("map_id") as u32,
            position: [r.get("position_x"), r.get("position_y"), r.get("position_z")],
            orientation: r.get("orientation"),
            respawn_secs: r.get::<i32, _>("respawn_secs").max(0) as u32,
            movement_type: r.get::<Option<i16>, _>("movement_type")
                .and_then(|m| MovementType::from_u8(m as u8)),
            path_id: r.get::<i32, _>("path_id") as u32,
        }).collect())
    }

    /// Load creature linking rows
    pub async fn load_creature_links(&self) -> Result<Vec<CreatureLink>, sqlx::Error> {
        let rows = sqlx::query("SELECT guid, master_guid, flags FROM creature_linking")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| CreatureLink {
            guid: r.get::<i64, _>("guid") as u64,
            master_guid: r.get::<i64, _>("master_guid") as u64,
            flags: r.get::<i32, _>("flags") as u32,
        }).collect())
    }

    // =========================================================================
    // Path Data
    // =========================================================================

    /// Load raw waypoint rows; validation happens in the path store
    pub async fn load_waypoint_nodes(&self) -> Result<Vec<WaypointNodeRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT origin, owner_key, path_id, point, position_x, position_y, position_z, orientation,
                    wait_time, script_id, emote, spell, model1, model2,
                    text_id1, text_id2, text_id3, text_id4, text_id5
             FROM waypoint_nodes ORDER BY origin, owner_key, path_id, point"
        )
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| {
            let mut text_ids = [0i32; MAX_WAYPOINT_TEXT];
            for (i, slot) in text_ids.iter_mut().enumerate() {
                *slot = r.get(format!("text_id{}", i + 1).as_str());
            }

            WaypointNodeRow {
                origin: r.get::<i16, _>("origin") as u8,
                owner_key: r.get::<i32, _>("owner_key") as u32,
                path_id: r.get::<i32, _>("path_id") as u32,
                point: r.get::<i32, _>("point") as u32,
                position_x: r.get("position_x"),
                position_y: r.get("position_y"),
                position_z: r.get("position_z"),
                orientation: r.get("orientation"),
                wait_time: r.get("wait_time"),
                script_id: r.get::<i32, _>("script_id") as u32,
                emote: r.get::<i32, _>("emote") as u32,
                spell: r.get::<i32, _>("spell") as u32,
                model1: r.get::<i32, _>("model1") as u32,
                model2: r.get::<i32, _>("model2") as u32,
                text_ids,
            }
        }).collect())
    }

    /// Load raw taxi path rows
    pub async fn load_taxi_nodes(&self) -> Result<Vec<TaxiNodeRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT path_id, node_index, map_id, position_x, position_y, position_z,
                    arrival_event_id, departure_event_id
             FROM taxi_path_nodes ORDER BY path_id, node_index"
        )
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| TaxiNodeRow {
            path_id: r.get::<i32, _>("path_id") as u32,
            node_index: r.get::<i32, _>("node_index") as u32,
            map_id: r.get::<i32, _>("map_id") as u32,
            position_x: r.get("position_x"),
            position_y: r.get("position_y"),
            position_z: r.get("position_z"),
            arrival_event_id: r.get::<i32, _>("arrival_event_id") as u32,
            departure_event_id: r.get::<i32, _>("departure_event_id") as u32,
        }).collect())
    }

    /// Ids of every text creatures can say
    pub async fn load_text_ids(&self) -> Result<HashSet<i32>, sqlx::Error> {
        let rows = sqlx::query("SELECT id FROM creature_texts")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    // =========================================================================
    // Respawn Times
    // =========================================================================

    /// Load stored respawn deadlines (guid -> unix seconds)
    pub async fn load_respawn_times(&self) -> Result<HashMap<u64, u64>, sqlx::Error> {
        let rows = sqlx::query("SELECT guid, respawn_at FROM creature_respawn")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| (
            r.get::<i64, _>("guid") as u64,
            r.get::<i64, _>("respawn_at") as u64,
        )).collect())
    }

    /// Save a respawn deadline
    pub async fn save_respawn_time(&self, guid: u64, respawn_at: u64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO creature_respawn (guid, respawn_at) VALUES ($1, $2)
             ON CONFLICT (guid) DO UPDATE SET respawn_at = EXCLUDED.respawn_at"
        )
            .bind(guid as i64)
            .bind(respawn_at as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Remove a respawn deadline once the creature is back
    pub async fn delete_respawn_time(&self, guid: u64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM creature_respawn WHERE guid = $1")
            .bind(guid as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
