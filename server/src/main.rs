//! Realm World Server
//!
//! Runs creature lifecycles and path movement under a fixed-rate world tick,
//! administered through console commands read from stdin.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use realm_server::ai::NoScripts;
use realm_server::commands;
use realm_server::config::{WorldConfig, CONFIG_FILE};
use realm_server::paths::PathStore;
use realm_server::persistence::{self, Database, NoPersistence, PersistenceHandle, RespawnStore};
use realm_server::world::{GameWorld, SpawnRegistry, TerrainMaps};

/// Load templates, spawns, links and paths.
/// Falls back to the JSON files, then to hardcoded data.
async fn load_world_data(config: &WorldConfig) -> (SpawnRegistry, PathStore) {
    match Database::connect(&config.database_url).await {
        Ok(db) => match db.load_world_data().await {
            Ok(data) => {
                info!("Loaded world data from database");
                let mut registry = SpawnRegistry::new();
                registry.load_templates(data.templates);
                registry.load_spawns(data.spawns);
                registry.load_links(data.links);
                let paths = PathStore::build(data.waypoint_rows, data.taxi_rows, Some(&data.text_ids));
                return (registry, paths);
            }
            Err(e) => error!("Failed to load world data from database: {}", e),
        },
        Err(e) => error!("Failed to connect to database: {}", e),
    }

    error!("Using fallback world data");

    let registry = match SpawnRegistry::load_from_json(&config.spawns_file) {
        Ok(registry) => {
            info!("Loaded spawns from {}", config.spawns_file);
            registry
        }
        Err(e) => {
            warn!("{}, using hardcoded spawns", e);
            SpawnRegistry::with_defaults()
        }
    };

    let paths = match PathStore::load_from_json(&config.paths_file) {
        Ok(paths) => {
            info!("Loaded paths from {}", config.paths_file);
            paths
        }
        Err(e) => {
            warn!("{}, using hardcoded paths", e);
            PathStore::with_defaults()
        }
    };

    (registry, paths)
}

/// Forward stdin lines to the main loop
fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Console input failed: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Realm World Server...");

    let config = WorldConfig::load_or_default(CONFIG_FILE);
    let tick_rate = config.tick_rate.max(1);
    info!("Tick rate: {} Hz", tick_rate);

    // Initialize persistence (database + cache)
    let persistence: Option<PersistenceHandle> = match persistence::init(&config.database_url, &config.redis_url).await {
        Ok(p) => {
            info!("Persistence layer initialized");
            Some(p)
        }
        Err(e) => {
            error!("Failed to initialize persistence: {}", e);
            error!("Server will run without persistence (respawn times are not saved)");
            None
        }
    };

    let (registry, paths) = load_world_data(&config).await;
    info!("{} creature templates, {} spawns, {} waypoint paths, {} taxi paths",
        registry.template_count(), registry.spawns().len(),
        paths.waypoint_path_count(), paths.taxi_path_count());

    let map_ids: Vec<u32> = registry
        .spawns()
        .iter()
        .map(|s| s.map_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let terrain = TerrainMaps::load_dir(&config.terrain_dir, &map_ids);

    let saved_respawns = match &persistence {
        Some(p) => p.load_respawn_times().await,
        None => HashMap::new(),
    };

    let respawn_store: Box<dyn RespawnStore> = match &persistence {
        Some(p) => Box::new(p.clone()),
        None => Box::new(NoPersistence),
    };

    let save_interval = Duration::from_secs(config.save_interval_secs.max(1));
    let mut world = GameWorld::new(
        config,
        registry,
        Arc::new(paths),
        terrain,
        Box::new(NoScripts),
        respawn_store,
        unix_now_ms(),
    );
    world.spawn_all(&saved_respawns);

    let mut console = spawn_console_reader();

    // Calculate tick duration
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate as f64);
    let mut last_tick = Instant::now();
    let mut tick_count: u64 = 0;

    // Timer for periodic saves
    let mut last_save = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Server started successfully!");

    // Main game loop
    loop {
        let tick_start = Instant::now();

        // Process console commands
        while let Ok(line) = console.try_recv() {
            match commands::parse_and_execute(&line, &mut world) {
                Some(result) if result.success => info!("{}", result.message),
                Some(result) => warn!("{}", result.message),
                None => warn!("Commands start with '/', try /help"),
            }
        }

        // Update game world; whole milliseconds only, the remainder carries over
        let diff_ms = last_tick.elapsed().as_millis().min(u32::MAX as u128) as u32;
        last_tick += Duration::from_millis(diff_ms as u64);
        let events = world.update(diff_ms);

        if !events.is_empty() {
            debug!("Tick {}: {} world events", tick_count, events.len());
            for event in &events {
                trace!("{:?}", event);
            }
        }

        // Periodic save
        if last_save.elapsed() >= save_interval {
            let saved = world.save_pending_respawn_times();
            if saved > 0 {
                info!("Periodic save complete ({} respawn times)", saved);
            }
            last_save = Instant::now();
        }

        tick_count += 1;

        // Sleep until next tick
        let elapsed = tick_start.elapsed();
        let remaining = tick_duration.saturating_sub(elapsed);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down after {} ticks", tick_count);
    let saved = world.save_pending_respawn_times();
    info!("Saved {} respawn times", saved);

    if let Some(persistence) = persistence {
        persistence.shutdown().await;
    }

    info!("Server stopped");
}
