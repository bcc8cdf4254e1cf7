//! Game world management.
//!
//! The world owns every creature and the services they share. One call to
//! [`GameWorld::update`] is one tick: creatures update in any order, then
//! the link events they produced are applied.

mod spawns;
mod terrain;

pub use spawns::{
    CreatureLink, CreatureSpawn, SpawnRegistry, LINK_CANT_SPAWN_IF_MASTER_ALIVE,
    LINK_CANT_SPAWN_IF_MASTER_DEAD, LINK_DESPAWN_ON_DESPAWN, LINK_RESPAWN_ON_RESPAWN,
};
pub use terrain::{Heightmap, TerrainMaps, TerrainQuery};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use log::{debug, info, warn};
use realm_shared::WorldEvent;

use crate::ai::{PassiveAi, ScriptRunner};
use crate::config::WorldConfig;
use crate::entities::{Creature, CreatureContext, CreatureTemplate, LinkEvent};
use crate::paths::PathStore;
use crate::persistence::RespawnStore;

/// Everything besides the creatures themselves
struct WorldServices {
    config: WorldConfig,
    paths: Arc<PathStore>,
    terrain: TerrainMaps,
    scripts: Box<dyn ScriptRunner>,
    respawn_store: Box<dyn RespawnStore>,
    /// World clock (unix ms), advanced by every tick
    now_ms: u64,
}

impl WorldServices {
    fn context<'a>(
        &'a mut self,
        events: &'a mut Vec<WorldEvent>,
        link_events: &'a mut Vec<LinkEvent>,
        alive: &'a HashSet<u64>,
    ) -> CreatureContext<'a> {
        CreatureContext {
            now_ms: self.now_ms,
            config: &self.config,
            paths: self.paths.as_ref(),
            terrain: &self.terrain,
            scripts: self.scripts.as_mut(),
            respawn_store: self.respawn_store.as_ref(),
            events,
            link_events,
            alive,
        }
    }
}

/// The game world containing all creatures
pub struct GameWorld {
    creatures: HashMap<u64, Creature>,
    registry: SpawnRegistry,
    services: WorldServices,
    /// Events produced between ticks (admin commands), returned by the next update
    pending_events: Vec<WorldEvent>,
}

impl GameWorld {
    pub fn new(
        config: WorldConfig,
        registry: SpawnRegistry,
        paths: Arc<PathStore>,
        terrain: TerrainMaps,
        scripts: Box<dyn ScriptRunner>,
        respawn_store: Box<dyn RespawnStore>,
        now_ms: u64,
    ) -> Self {
        Self {
            creatures: HashMap::new(),
            registry,
            services: WorldServices {
                config,
                paths,
                terrain,
                scripts,
                respawn_store,
                now_ms,
            },
            pending_events: Vec::new(),
        }
    }

    /// Create every registered creature. Creatures with a saved respawn time
    /// (unix seconds) still in the future start dead, as do linked creatures
    /// whose master does.
    pub fn spawn_all(&mut self, saved_respawns: &HashMap<u64, u64>) {
        let now_ms = self.services.now_ms;
        let dead_at_boot: HashMap<u64, u64> = saved_respawns
            .iter()
            .map(|(guid, secs)| (*guid, secs.saturating_mul(1000)))
            .filter(|(_, at_ms)| *at_ms > now_ms)
            .collect();

        let spawns = self.registry.spawns().to_vec();
        let mut events = Vec::new();
        let mut link_events = Vec::new();
        let alive = HashSet::new();

        for spawn in spawns {
            let Some(template) = self.registry.template(spawn.entry) else {
                warn!("Spawn {} has no template {}, skipped", spawn.guid, spawn.entry);
                continue;
            };
            let guid = spawn.guid;
            let link = self.registry.link(guid);
            let mut creature = Creature::new(spawn, template, Box::new(PassiveAi), link);

            let held_by_link = link.is_some_and(|l| !l.allows_spawn(!dead_at_boot.contains_key(&l.master_guid)));
            if let Some(respawn_at_ms) = dead_at_boot.get(&guid) {
                creature.start_dead(*respawn_at_ms);
            } else if held_by_link {
                creature.start_dead(now_ms);
            } else {
                let mut ctx = self.services.context(&mut events, &mut link_events, &alive);
                creature.spawn_into_world(&mut ctx);
            }

            self.creatures.insert(guid, creature);
        }

        self.pending_events.extend(events);
        info!("Spawned {} creatures ({} alive, {} waiting to respawn)",
            self.creatures.len(), self.alive_count(), self.creatures.len() - self.alive_count());
    }

    /// Update the world (called every tick).
    /// Returns the events produced since the previous update.
    pub fn update(&mut self, diff_ms: u32) -> Vec<WorldEvent> {
        self.services.now_ms += diff_ms as u64;

        let alive = self.alive_guids();
        let mut events = std::mem::take(&mut self.pending_events);
        let mut link_events = Vec::new();

        {
            let mut ctx = self.services.context(&mut events, &mut link_events, &alive);
            for creature in self.creatures.values_mut() {
                creature.update(diff_ms, &mut ctx);
            }
        }

        self.process_link_events(link_events, &alive, &mut events);
        events
    }

    /// Apply link events until no new ones appear
    fn process_link_events(&mut self, mut pending: Vec<LinkEvent>, alive: &HashSet<u64>, events: &mut Vec<WorldEvent>) {
        while !pending.is_empty() {
            let mut produced = Vec::new();
            let mut ctx = self.services.context(events, &mut produced, alive);

            for event in pending.drain(..) {
                match event {
                    LinkEvent::Despawned { guid } => {
                        for creature in self.creatures.values_mut() {
                            if creature.link().is_some_and(|l| l.master_guid == guid && l.has(LINK_DESPAWN_ON_DESPAWN)) {
                                debug!("Creature {} despawns with master {}", creature.guid(), guid);
                                creature.forced_despawn(&mut ctx);
                            }
                        }
                    }
                    LinkEvent::Respawned { guid } => {
                        for creature in self.creatures.values_mut() {
                            let follows = creature
                                .link()
                                .is_some_and(|l| l.master_guid == guid && l.has(LINK_RESPAWN_ON_RESPAWN));
                            if follows && !creature.is_alive() {
                                debug!("Creature {} respawns with master {}", creature.guid(), guid);
                                creature.respawn_now(&mut ctx);
                            }
                        }
                    }
                    LinkEvent::CompanionReleased { guid } => {
                        if let Some(companion) = self.creatures.get_mut(&guid) {
                            debug!("Companion {} released", guid);
                            companion.forced_despawn(&mut ctx);
                        }
                    }
                }
            }

            pending = produced;
        }
    }

    /// Run an administrative action against one creature between ticks.
    /// Events it produces are returned by the next update.
    pub fn with_creature<R>(
        &mut self,
        guid: u64,
        action: impl FnOnce(&mut Creature, &mut CreatureContext) -> R,
    ) -> Option<R> {
        let creature = self.creatures.get_mut(&guid)?;
        let alive = HashSet::new();
        let mut events = std::mem::take(&mut self.pending_events);
        let mut link_events = Vec::new();

        let result = {
            let mut ctx = self.services.context(&mut events, &mut link_events, &alive);
            action(creature, &mut ctx)
        };

        let alive = self.alive_guids();
        self.process_link_events(link_events, &alive, &mut events);
        self.pending_events = events;
        Some(result)
    }

    /// Make `companion` leave the world when `owner` dies
    pub fn bind_companion(&mut self, owner: u64, companion: u64) -> bool {
        if owner == companion || !self.creatures.contains_key(&companion) {
            return false;
        }
        match self.creatures.get_mut(&owner) {
            Some(creature) => {
                creature.add_companion(companion);
                true
            }
            None => false,
        }
    }

    /// Persist respawn times of dead creatures not saved yet
    pub fn save_pending_respawn_times(&mut self) -> usize {
        let store = self.services.respawn_store.as_ref();
        let mut saved = 0;
        for creature in self.creatures.values_mut() {
            if creature.save_respawn_time_if_pending(store) {
                saved += 1;
            }
        }
        if saved > 0 {
            debug!("Saved {} respawn times", saved);
        }
        saved
    }

    pub fn template(&self, entry: u32) -> Option<Arc<CreatureTemplate>> {
        self.registry.template(entry)
    }

    pub fn get_creature(&self, guid: u64) -> Option<&Creature> {
        self.creatures.get(&guid)
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn alive_count(&self) -> usize {
        self.creatures.values().filter(|c| c.is_alive()).count()
    }

    pub fn now_ms(&self) -> u64 {
        self.services.now_ms
    }

    pub fn config(&self) -> &WorldConfig {
        &self.services.config
    }

    fn alive_guids(&self) -> HashSet<u64> {
        self.creatures
            .values()
            .filter(|c| c.is_alive())
            .map(|c| c.guid())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::NoScripts;
    use crate::persistence::NoPersistence;
    use realm_shared::DeathState;

    const START_MS: u64 = 1_700_000_000_000;

    fn world() -> GameWorld {
        GameWorld::new(
            WorldConfig::default(),
            SpawnRegistry::with_defaults(),
            Arc::new(PathStore::with_defaults()),
            TerrainMaps::new(),
            Box::new(NoScripts),
            Box::new(NoPersistence),
            START_MS,
        )
    }

    fn state(world: &GameWorld, guid: u64) -> DeathState {
        world.get_creature(guid).map(|c| c.death_state()).unwrap()
    }

    #[test]
    fn test_spawn_all_announces_creatures() {
        let mut world = world();
        world.spawn_all(&HashMap::new());
        assert_eq!(world.creature_count(), 7);
        assert_eq!(world.alive_count(), 7);

        let events = world.update(50);
        let spawned = events.iter().filter(|e| matches!(e, WorldEvent::CreatureSpawned { .. })).count();
        assert_eq!(spawned, 7);
        // Guard and both thugs walk their paths
        let walkers: HashSet<u64> = events
            .iter()
            .filter(|e| matches!(e, WorldEvent::SplineLaunched { .. }))
            .map(|e| e.guid())
            .collect();
        assert_eq!(walkers, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn test_saved_respawn_time_starts_dead() {
        let mut world = world();
        let mut saved = HashMap::new();
        saved.insert(6, START_MS / 1000 + 600);
        // Already expired: spawns normally
        saved.insert(4, START_MS / 1000 - 10);
        world.spawn_all(&saved);

        assert_eq!(state(&world, 6), DeathState::Dead);
        assert_eq!(state(&world, 4), DeathState::Alive);
        // Servant may only spawn while its master lives
        assert_eq!(state(&world, 7), DeathState::Dead);

        world.update(600_000);
        assert_eq!(state(&world, 6), DeathState::Alive);
        assert_eq!(state(&world, 7), DeathState::Dead);

        // The master respawned last tick; the servant follows now
        world.update(50);
        assert_eq!(state(&world, 7), DeathState::Alive);
    }

    #[test]
    fn test_linked_creature_despawns_with_master() {
        let mut world = world();
        world.spawn_all(&HashMap::new());

        world.with_creature(6, |kazzak, ctx| kazzak.kill(Some(99), ctx));
        assert_eq!(state(&world, 6), DeathState::Corpse);
        assert_eq!(state(&world, 7), DeathState::Alive);

        // World boss corpse stays for an hour
        world.update(3_600_000);
        assert_eq!(state(&world, 6), DeathState::Dead);
        assert_eq!(state(&world, 7), DeathState::Dead);
    }

    #[test]
    fn test_companion_released_on_owner_death() {
        let mut world = world();
        world.spawn_all(&HashMap::new());
        assert!(world.bind_companion(5, 4));
        assert!(!world.bind_companion(5, 5));

        world.with_creature(5, |gryphon, ctx| gryphon.kill(None, ctx));
        assert_eq!(state(&world, 4), DeathState::Dead);

        let events = world.update(50);
        assert!(events.iter().any(|e| matches!(e, WorldEvent::CorpseRemoved { guid: 4 })));
    }

    #[test]
    fn test_periodic_save_only_once() {
        let mut world = world();
        world.spawn_all(&HashMap::new());
        world.with_creature(4, |wolf, ctx| wolf.kill(None, ctx));

        assert_eq!(world.save_pending_respawn_times(), 1);
        assert_eq!(world.save_pending_respawn_times(), 0);
    }

    #[test]
    fn test_admin_action_on_missing_creature() {
        let mut world = world();
        assert!(world.with_creature(42, |c, _| c.guid()).is_none());
    }
}
