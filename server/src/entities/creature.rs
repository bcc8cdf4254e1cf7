//! Creature lifecycle.
//!
//! A creature cycles Alive -> JustDied -> Corpse -> Dead -> JustAlived -> Alive.
//! The two `Just*` states are transient: they are entered and left within the
//! same call, while the edge effects run. Movement and AI only run while the
//! creature is alive.

use std::collections::HashSet;
use std::sync::Arc;
use log::{debug, error, info, trace, warn};
use realm_shared::{CreatureRank, DeathState, MovementType, Visibility, WorldEvent};

use crate::ai::{CreatureAi, ScriptRunner};
use crate::config::WorldConfig;
use crate::movement::{MotionContext, MotionListener, MotionMaster, MotionRequest, MoveSpline, SplineSystem};
use crate::paths::PathProvider;
use crate::persistence::RespawnStore;
use crate::world::{CreatureLink, CreatureSpawn, TerrainQuery};

use super::{CreatureTemplate, Loot, Unit, UpdatePhase, BASE_RUN_SPEED, BASE_WALK_SPEED};

/// Interval between regeneration ticks (ms)
pub const REGEN_INTERVAL_MS: u32 = 2000;

/// Cross-creature effects, applied by the world after every creature updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The creature's corpse was removed
    Despawned { guid: u64 },
    /// The creature came back to life
    Respawned { guid: u64 },
    /// A companion lost its owner and must leave the world
    CompanionReleased { guid: u64 },
}

/// Services and outputs available to a creature during one call
pub struct CreatureContext<'a> {
    /// World clock (unix ms)
    pub now_ms: u64,
    pub config: &'a WorldConfig,
    pub paths: &'a dyn PathProvider,
    pub terrain: &'a dyn TerrainQuery,
    pub scripts: &'a mut dyn ScriptRunner,
    pub respawn_store: &'a dyn RespawnStore,
    pub events: &'a mut Vec<WorldEvent>,
    pub link_events: &'a mut Vec<LinkEvent>,
    /// Guids alive at the start of the tick
    pub alive: &'a HashSet<u64>,
}

/// Routes movement side effects to the AI, the script runner and the event queue
struct CreatureListener<'a> {
    ai: &'a mut dyn CreatureAi,
    scripts: &'a mut dyn ScriptRunner,
    events: &'a mut Vec<WorldEvent>,
}

impl MotionListener for CreatureListener<'_> {
    fn movement_inform(&mut self, unit: &mut Unit, kind: u32, point: u32) {
        self.ai.movement_inform(unit, kind, point);
    }

    fn run_movement_script(&mut self, unit: &Unit, script_id: u32) {
        self.scripts.run_movement_script(script_id, unit.guid);
        self.events.push(WorldEvent::ScriptStarted { guid: unit.guid, script_id });
    }

    fn run_taxi_event(&mut self, unit: &Unit, event_id: u32, departure: bool) {
        self.scripts.run_taxi_event(event_id, unit.guid, departure);
        self.events.push(WorldEvent::TaxiEvent { guid: unit.guid, event_id, departure });
    }

    fn emote(&mut self, unit: &Unit, emote_id: u32) {
        self.events.push(WorldEvent::Emote { guid: unit.guid, emote_id });
    }

    fn cast_spell(&mut self, unit: &Unit, spell_id: u32) {
        self.events.push(WorldEvent::SpellCast { guid: unit.guid, spell_id });
    }

    fn say(&mut self, unit: &Unit, text_id: i32) {
        self.events.push(WorldEvent::Say { guid: unit.guid, text_id });
    }

    fn display_changed(&mut self, unit: &Unit) {
        self.events.push(WorldEvent::DisplayIdChanged { guid: unit.guid, display_id: unit.display_id });
    }

    fn teleported(&mut self, unit: &Unit) {
        self.events.push(WorldEvent::Teleported {
            guid: unit.guid,
            map_id: unit.map_id,
            position: unit.position,
        });
    }
}

pub struct Creature {
    pub unit: Unit,
    template: Arc<CreatureTemplate>,
    /// Template to restore on respawn when `template` was swapped
    original_template: Arc<CreatureTemplate>,
    spawn: CreatureSpawn,
    link: Option<CreatureLink>,
    corpse_decay_at: u64,
    respawn_at: u64,
    respawn_saved: bool,
    loot: Loot,
    regen_timer: u32,
    motion: MotionMaster,
    spline: MoveSpline,
    ai: Box<dyn CreatureAi>,
    companions: Vec<u64>,
}

impl std::fmt::Debug for Creature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creature")
            .field("guid", &self.unit.guid)
            .field("entry", &self.unit.entry)
            .field("death_state", &self.unit.death_state)
            .field("movement", &self.motion.generator().name())
            .finish()
    }
}

impl Creature {
    /// Build a live creature at its spawn point. Movement starts with
    /// [`Creature::spawn_into_world`].
    pub fn new(
        spawn: CreatureSpawn,
        template: Arc<CreatureTemplate>,
        ai: Box<dyn CreatureAi>,
        link: Option<CreatureLink>,
    ) -> Self {
        let unit = Unit::new(spawn.guid, template.entry, spawn.map_id, spawn.position, spawn.orientation);
        let mut creature = Self {
            unit,
            original_template: Arc::clone(&template),
            template,
            spawn,
            link,
            corpse_decay_at: 0,
            respawn_at: 0,
            respawn_saved: false,
            loot: Loot::default(),
            regen_timer: REGEN_INTERVAL_MS,
            motion: MotionMaster::new(),
            spline: MoveSpline::new(),
            ai,
            companions: Vec::new(),
        };
        creature.apply_template_stats();
        creature
    }

    /// Announce the creature and start its default movement
    pub fn spawn_into_world(&mut self, ctx: &mut CreatureContext) {
        self.unit.in_world = true;
        ctx.events.push(WorldEvent::CreatureSpawned {
            guid: self.unit.guid,
            entry: self.unit.entry,
            map_id: self.unit.map_id,
            position: self.unit.position,
            orientation: self.unit.orientation,
        });
        let request = self.default_motion();
        self.set_motion(request, ctx);
    }

    /// Start out of the world, waiting for a respawn deadline loaded from storage
    pub fn start_dead(&mut self, respawn_at_ms: u64) {
        self.unit.death_state = DeathState::Dead;
        self.unit.health = 0;
        self.unit.in_world = false;
        self.respawn_at = respawn_at_ms;
        self.respawn_saved = true;
    }

    pub fn guid(&self) -> u64 {
        self.unit.guid
    }

    pub fn death_state(&self) -> DeathState {
        self.unit.death_state
    }

    pub fn is_alive(&self) -> bool {
        self.unit.is_alive()
    }

    pub fn template(&self) -> &CreatureTemplate {
        &self.template
    }

    pub fn spawn(&self) -> &CreatureSpawn {
        &self.spawn
    }

    pub fn link(&self) -> Option<CreatureLink> {
        self.link
    }

    pub fn motion(&self) -> &MotionMaster {
        &self.motion
    }

    pub fn loot(&self) -> &Loot {
        &self.loot
    }

    /// Corpse removal deadline (world ms)
    pub fn corpse_decay_at(&self) -> u64 {
        self.corpse_decay_at
    }

    /// Respawn deadline (world ms)
    pub fn respawn_at(&self) -> u64 {
        self.respawn_at
    }

    pub fn companions(&self) -> &[u64] {
        &self.companions
    }

    pub fn add_companion(&mut self, guid: u64) {
        if !self.companions.contains(&guid) {
            self.companions.push(guid);
        }
    }

    /// Temporarily use another template; the original returns on respawn
    pub fn update_entry(&mut self, template: Arc<CreatureTemplate>) {
        debug!("Creature {} switches entry {} -> {}", self.unit.guid, self.template.entry, template.entry);
        self.template = template;
        self.unit.entry = self.template.entry;
        self.unit.display_id = self.template.display_id;
        self.unit.npc_flags = self.template.npc_flags;
    }

    pub fn update(&mut self, diff_ms: u32, ctx: &mut CreatureContext) {
        if self.unit.death_state.is_transient() {
            error!("Creature {} entered its update in {} state", self.unit.guid, self.unit.death_state.name());
            self.unit.death_state = match self.unit.death_state {
                DeathState::JustDied => DeathState::Corpse,
                _ => DeathState::Alive,
            };
        }

        match self.unit.death_state {
            DeathState::Dead => self.update_dead(ctx),
            DeathState::Corpse => {
                if ctx.now_ms >= self.corpse_decay_at {
                    self.remove_corpse(ctx);
                }
            }
            DeathState::Alive => self.update_alive(diff_ms, ctx),
            DeathState::JustDied | DeathState::JustAlived => {}
        }
    }

    fn update_dead(&mut self, ctx: &mut CreatureContext) {
        if ctx.now_ms < self.respawn_at {
            return;
        }
        if let Some(link) = self.link {
            if !link.allows_spawn(ctx.alive.contains(&link.master_guid)) {
                trace!("Creature {} respawn held by master {}", self.unit.guid, link.master_guid);
                return;
            }
        }
        self.respawn(ctx);
    }

    fn update_alive(&mut self, diff_ms: u32, ctx: &mut CreatureContext) {
        if let Some((position, orientation)) = self.spline.update(diff_ms) {
            self.unit.position = position;
            self.unit.orientation = orientation;
        }

        // Evading units only follow the spline already launched
        if self.unit.evading {
            return;
        }

        self.unit.phase = UpdatePhase::Movement;
        self.with_motion(ctx, |motion, mc, _| motion.update(mc, diff_ms));
        self.unit.phase = UpdatePhase::Idle;
        self.apply_pending_motion(ctx);
        if self.check_death(ctx) {
            return;
        }

        self.unit.phase = UpdatePhase::Ai;
        self.ai.update_ai(&mut self.unit, diff_ms);
        self.unit.phase = UpdatePhase::Idle;
        self.apply_pending_motion(ctx);
        if self.check_death(ctx) {
            return;
        }

        self.regen_timer = self.regen_timer.saturating_sub(diff_ms);
        if self.regen_timer == 0 {
            self.regen_timer = REGEN_INTERVAL_MS;
            self.regenerate_health(ctx.config);
            self.regenerate_mana(ctx.config);
        }
    }

    /// Dies if something dropped health to zero during this update
    fn check_death(&mut self, ctx: &mut CreatureContext) -> bool {
        if self.unit.is_alive() && self.unit.health == 0 {
            let killer = self.unit.target;
            self.die(killer, ctx);
        }
        !self.unit.is_alive()
    }

    fn regenerate_health(&mut self, config: &WorldConfig) {
        let unit = &mut self.unit;
        if unit.health >= unit.max_health {
            return;
        }

        let amount = if unit.controlled {
            let factor = if unit.max_mana > 0 { 0.25 } else { 0.80 };
            (unit.spirit as f32 * factor * config.rate_health) as u32
        } else if !unit.in_combat || unit.polymorphed {
            unit.max_health / 3
        } else {
            return;
        };

        unit.health = unit.health.saturating_add(amount.max(1)).min(unit.max_health);
    }

    fn regenerate_mana(&mut self, config: &WorldConfig) {
        let unit = &mut self.unit;
        if unit.max_mana == 0 || unit.mana >= unit.max_mana {
            return;
        }

        let amount = if unit.in_combat || unit.controlled {
            ((unit.spirit / 5 + 17) as f32 * config.rate_mana) as u32
        } else {
            unit.max_mana / 3
        };

        unit.mana = unit.mana.saturating_add(amount).min(unit.max_mana);
    }

    /// Alive -> JustDied -> Corpse
    pub fn die(&mut self, killer: Option<u64>, ctx: &mut CreatureContext) {
        if !self.unit.is_alive() {
            return;
        }

        self.unit.death_state = DeathState::JustDied;
        self.unit.health = 0;

        let corpse_delay_ms = ctx.config.corpse_decay_secs(self.template.rank) as u64 * 1000;
        self.corpse_decay_at = ctx.now_ms + corpse_delay_ms;
        self.respawn_at = ctx.now_ms + self.spawn.respawn_secs as u64 * 1000;
        self.respawn_saved = false;
        if ctx.config.save_respawn_time_immediately || self.template.rank == CreatureRank::WorldBoss {
            self.save_respawn_time(ctx.respawn_store);
        }

        self.unit.target = None;
        self.unit.npc_flags = 0;
        self.unit.searched_assistance = false;
        self.unit.in_combat = false;
        self.unit.evading = false;
        self.unit.pending_motion = None;

        self.with_motion(ctx, |motion, mc, _| motion.clear(mc));
        self.spline.reset();

        if self.unit.can_fly || self.unit.levitating {
            self.fall_to_ground(ctx);
        }

        for companion in self.companions.drain(..) {
            ctx.link_events.push(LinkEvent::CompanionReleased { guid: companion });
        }

        self.loot = Loot::roll(&self.template.loot, killer, &mut rand::thread_rng());
        self.ai.just_died(&mut self.unit, killer);

        ctx.events.push(WorldEvent::CreatureDied { guid: self.unit.guid, killer });
        self.unit.death_state = DeathState::Corpse;

        debug!("Creature {} ({}) died, corpse until {}, respawn at {}",
            self.unit.guid, self.template.name, self.corpse_decay_at, self.respawn_at);
    }

    fn fall_to_ground(&mut self, ctx: &mut CreatureContext) {
        self.unit.levitating = false;
        let [x, y, z] = self.unit.position;
        let Some(ground_z) = ctx.terrain.ground_height(self.unit.map_id, x, y) else {
            return;
        };
        if ground_z < z {
            self.unit.position[2] = ground_z;
            ctx.events.push(WorldEvent::CreatureFell { guid: self.unit.guid, ground_z });
        }
    }

    /// Corpse -> Dead: clear the corpse and move back to the spawn point
    pub fn remove_corpse(&mut self, ctx: &mut CreatureContext) {
        if self.unit.death_state != DeathState::Corpse {
            return;
        }

        self.unit.death_state = DeathState::Dead;
        self.loot.clear();

        if let Some(delay_secs) = self.ai.corpse_removed(&mut self.unit) {
            self.respawn_at = ctx.now_ms + delay_secs as u64 * 1000;
            self.respawn_saved = false;
        }
        ctx.link_events.push(LinkEvent::Despawned { guid: self.unit.guid });

        self.unit.map_id = self.spawn.map_id;
        self.unit.position = self.spawn.position;
        self.unit.orientation = self.spawn.orientation;

        for visibility in [Visibility::RemoveCorpse, Visibility::On] {
            self.unit.visibility = visibility;
            ctx.events.push(WorldEvent::VisibilityChanged { guid: self.unit.guid, visibility });
        }

        self.unit.in_world = false;
        ctx.events.push(WorldEvent::CorpseRemoved { guid: self.unit.guid });
        trace!("Creature {} corpse removed", self.unit.guid);
    }

    /// Dead -> JustAlived -> Alive
    pub fn respawn(&mut self, ctx: &mut CreatureContext) {
        if self.unit.death_state != DeathState::Dead {
            return;
        }

        self.unit.death_state = DeathState::JustAlived;
        if !Arc::ptr_eq(&self.template, &self.original_template) {
            self.template = Arc::clone(&self.original_template);
        }
        self.unit.clear_runtime_state();
        self.apply_template_stats();
        self.unit.visibility = Visibility::On;

        self.spline.reset();
        self.loot.clear();
        self.corpse_decay_at = 0;
        self.respawn_at = 0;
        self.regen_timer = REGEN_INTERVAL_MS;

        self.unit.death_state = DeathState::Alive;
        self.unit.in_world = true;

        let request = self.default_motion();
        self.set_motion(request, ctx);
        self.ai.just_respawned(&mut self.unit);

        ctx.respawn_store.delete_respawn_time(self.unit.guid);
        self.respawn_saved = false;

        ctx.link_events.push(LinkEvent::Respawned { guid: self.unit.guid });
        ctx.events.push(WorldEvent::CreatureRespawned {
            guid: self.unit.guid,
            position: self.unit.position,
            health: self.unit.health,
        });
        info!("Creature {} ({}) respawned", self.unit.guid, self.template.name);
    }

    /// Skip the corpse phase and leave the world now
    pub fn forced_despawn(&mut self, ctx: &mut CreatureContext) {
        if self.unit.is_alive() {
            self.die(None, ctx);
        }
        self.remove_corpse(ctx);
    }

    /// Clear the respawn deadline; the creature returns on its next update
    pub fn respawn_now(&mut self, ctx: &mut CreatureContext) {
        if self.unit.death_state == DeathState::Corpse {
            self.remove_corpse(ctx);
        }
        if self.unit.death_state == DeathState::Dead {
            self.respawn_at = ctx.now_ms;
            self.respawn_saved = false;
            ctx.respawn_store.delete_respawn_time(self.unit.guid);
        }
    }

    pub fn deal_damage(&mut self, amount: u32, attacker: Option<u64>, ctx: &mut CreatureContext) {
        if !self.unit.is_alive() {
            return;
        }
        if attacker.is_some() {
            self.unit.target = attacker;
            self.unit.in_combat = true;
        }
        self.unit.health = self.unit.health.saturating_sub(amount);
        if self.unit.health == 0 {
            self.die(attacker, ctx);
        }
    }

    pub fn kill(&mut self, killer: Option<u64>, ctx: &mut CreatureContext) {
        self.die(killer, ctx);
    }

    /// Persist the respawn deadline if it was not saved yet
    pub fn save_respawn_time_if_pending(&mut self, store: &dyn RespawnStore) -> bool {
        let waiting = matches!(self.unit.death_state, DeathState::Corpse | DeathState::Dead);
        if !waiting || self.respawn_saved {
            return false;
        }
        self.save_respawn_time(store);
        true
    }

    fn save_respawn_time(&mut self, store: &dyn RespawnStore) {
        store.save_respawn_time(self.unit.guid, self.respawn_at / 1000);
        self.respawn_saved = true;
    }

    pub fn set_next_waypoint(&mut self, node_id: u32) -> bool {
        let Some(wp) = self.motion.waypoint_mut() else {
            warn!("Creature {} has no waypoint movement, node {} ignored", self.unit.guid, node_id);
            return false;
        };
        if !wp.set_next_waypoint(node_id) {
            warn!("Creature {}: node {} not found on {} path {}",
                self.unit.guid, node_id, wp.origin().name(), wp.path_id());
            return false;
        }
        true
    }

    pub fn pause_waypoints(&mut self) {
        self.unit.waypoint_paused = true;
    }

    pub fn resume_waypoints(&mut self) {
        self.unit.waypoint_paused = false;
    }

    /// Move to the active generator's reset position. The running leg is
    /// stopped short so the generator relaunches from there.
    pub fn reset_to_path_position(&mut self, ctx: &mut CreatureContext) -> bool {
        if !self.unit.is_alive() {
            return false;
        }
        let Some((position, orientation)) = self.motion.get_reset_position() else {
            return false;
        };

        self.spline.stop();
        self.unit.position = position;
        if let Some(orientation) = orientation {
            self.unit.orientation = orientation;
        }
        ctx.events.push(WorldEvent::Teleported {
            guid: self.unit.guid,
            map_id: self.unit.map_id,
            position,
        });
        true
    }

    pub fn start_flight(&mut self, taxi_path_id: u32, ctx: &mut CreatureContext) -> bool {
        if !self.unit.is_alive() {
            return false;
        }
        self.set_motion(MotionRequest::Flight { taxi_path_id }, ctx)
    }

    /// Install a movement generator, or queue it while an update phase runs
    pub fn set_motion(&mut self, request: MotionRequest, ctx: &mut CreatureContext) -> bool {
        if self.unit.phase != UpdatePhase::Idle {
            self.unit.request_motion(request);
            return true;
        }
        self.with_motion(ctx, |motion, mc, paths| motion.apply(request, paths, mc))
    }

    fn apply_pending_motion(&mut self, ctx: &mut CreatureContext) {
        if let Some(request) = self.unit.pending_motion.take() {
            if self.unit.is_alive() {
                self.set_motion(request, ctx);
            }
        }
    }

    fn default_motion(&self) -> MotionRequest {
        let movement_type = self.spawn.movement_type.unwrap_or(self.template.movement_type);
        match movement_type {
            MovementType::Waypoint => MotionRequest::Waypoint {
                origin: None,
                path_id: self.spawn.path_id,
                initial_delay: 0,
            },
            MovementType::Idle => MotionRequest::Idle,
        }
    }

    /// Run `f` against the motion master, then report any spline it launched
    fn with_motion<R>(
        &mut self,
        ctx: &mut CreatureContext,
        f: impl FnOnce(&mut MotionMaster, &mut MotionContext, &dyn PathProvider) -> R,
    ) -> R {
        let paths = ctx.paths;
        let mut listener = CreatureListener {
            ai: &mut *self.ai,
            scripts: &mut *ctx.scripts,
            events: &mut *ctx.events,
        };
        let mut motion_ctx = MotionContext {
            unit: &mut self.unit,
            spline: &mut self.spline,
            listener: &mut listener,
        };
        let result = f(&mut self.motion, &mut motion_ctx, paths);

        if let Some(init) = self.spline.take_launched() {
            ctx.events.push(WorldEvent::SplineLaunched {
                guid: self.unit.guid,
                points: init.points,
                velocity: init.velocity,
                facing: init.facing,
                flying: init.flying,
                walk: init.walk,
            });
        }
        result
    }

    /// Roll level and stats from the current template
    fn apply_template_stats(&mut self) {
        let template = Arc::clone(&self.template);
        let stats = template.roll_stats(&mut rand::thread_rng());

        let unit = &mut self.unit;
        unit.entry = template.entry;
        unit.level = stats.level;
        unit.max_health = stats.health;
        unit.health = stats.health;
        unit.max_mana = stats.mana;
        unit.mana = stats.mana;
        unit.spirit = template.spirit;
        unit.display_id = template.display_id;
        unit.npc_flags = template.npc_flags;
        unit.can_fly = template.can_fly;
        unit.walk_speed = BASE_WALK_SPEED * template.walk_modifier;
        unit.run_speed = BASE_RUN_SPEED * template.run_modifier;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use super::*;
    use crate::ai::{NoScripts, PassiveAi};
    use crate::paths::PathStore;
    use crate::world::{Heightmap, TerrainMaps, LINK_CANT_SPAWN_IF_MASTER_DEAD};
    use realm_shared::LootEntry;

    #[derive(Debug, Default)]
    pub struct RecordingStore {
        pub saved: Mutex<Vec<(u64, u64)>>,
        pub deleted: Mutex<Vec<u64>>,
    }

    impl RespawnStore for RecordingStore {
        fn save_respawn_time(&self, guid: u64, respawn_at: u64) {
            self.saved.lock().unwrap().push((guid, respawn_at));
        }

        fn delete_respawn_time(&self, guid: u64) {
            self.deleted.lock().unwrap().push(guid);
        }
    }

    struct Harness {
        now_ms: u64,
        config: WorldConfig,
        paths: PathStore,
        terrain: TerrainMaps,
        scripts: NoScripts,
        store: RecordingStore,
        events: Vec<WorldEvent>,
        link_events: Vec<LinkEvent>,
        alive: HashSet<u64>,
    }

    impl Harness {
        fn new() -> Self {
            let mut terrain = TerrainMaps::new();
            let flat = Heightmap::from_samples(2, 2, [-20000.0, -20000.0], [20000.0, 20000.0], vec![10.0; 4]).unwrap();
            terrain.insert(0, flat);

            Self {
                now_ms: 1_000_000,
                config: WorldConfig::default(),
                paths: PathStore::with_defaults(),
                terrain,
                scripts: NoScripts,
                store: RecordingStore::default(),
                events: Vec::new(),
                link_events: Vec::new(),
                alive: HashSet::new(),
            }
        }

        fn ctx(&mut self) -> CreatureContext<'_> {
            CreatureContext {
                now_ms: self.now_ms,
                config: &self.config,
                paths: &self.paths,
                terrain: &self.terrain,
                scripts: &mut self.scripts,
                respawn_store: &self.store,
                events: &mut self.events,
                link_events: &mut self.link_events,
                alive: &self.alive,
            }
        }

        /// Advance the clock and update the creature
        fn tick(&mut self, creature: &mut Creature, diff_ms: u32) {
            self.now_ms += diff_ms as u64;
            let mut ctx = self.ctx();
            creature.update(diff_ms, &mut ctx);
        }

        fn spline_launches(&self) -> usize {
            self.events
                .iter()
                .filter(|e| matches!(e, WorldEvent::SplineLaunched { .. }))
                .count()
        }
    }

    fn template(entry: u32, rank: CreatureRank, movement_type: MovementType) -> CreatureTemplate {
        CreatureTemplate {
            entry,
            name: format!("Creature {}", entry),
            min_level: 10,
            max_level: 10,
            base_health: 300,
            base_mana: 90,
            spirit: 20,
            rank,
            npc_flags: 0x2,
            can_fly: false,
            walk_modifier: 1.0,
            run_modifier: 1.0,
            display_id: 100,
            movement_type,
            loot: vec![LootEntry { item_id: 7, drop_chance: 1.0, min_quantity: 1, max_quantity: 1 }],
        }
    }

    fn spawn(guid: u64, entry: u32, respawn_secs: u32) -> CreatureSpawn {
        CreatureSpawn {
            guid,
            entry,
            map_id: 0,
            position: [-8790.0, 630.0, 94.0],
            orientation: 0.5,
            respawn_secs,
            movement_type: None,
            path_id: 0,
        }
    }

    /// Guid 1 walks the default guid path
    fn guard() -> Creature {
        let template = Arc::new(template(1, CreatureRank::Normal, MovementType::Waypoint));
        Creature::new(spawn(1, 1, 120), template, Box::new(PassiveAi), None)
    }

    fn spawned(harness: &mut Harness, mut creature: Creature) -> Creature {
        let mut ctx = harness.ctx();
        creature.spawn_into_world(&mut ctx);
        creature
    }

    #[test]
    fn test_no_spline_while_corpse_or_dead() {
        let mut harness = Harness::new();
        let mut creature = spawned(&mut harness, guard());
        assert_eq!(harness.spline_launches(), 1);

        creature.kill(Some(42), &mut harness.ctx());
        assert_eq!(creature.death_state(), DeathState::Corpse);
        assert!(matches!(creature.motion().generator(), crate::movement::MovementGenerator::Idle));
        harness.events.clear();

        // Corpse for 60s, then dead until the 120s respawn deadline
        for _ in 0..119 {
            harness.tick(&mut creature, 1000);
            assert_ne!(creature.death_state(), DeathState::Alive);
        }
        assert_eq!(creature.death_state(), DeathState::Dead);
        assert_eq!(harness.spline_launches(), 0);
    }

    #[test]
    fn test_lifecycle_round_trip_restarts_path() {
        let mut harness = Harness::new();
        let mut creature = spawned(&mut harness, guard());

        // Walk for a while so the cursor leaves the first node
        for _ in 0..200 {
            harness.tick(&mut creature, 100);
        }
        creature.deal_damage(50, Some(9), &mut harness.ctx());
        creature.kill(Some(9), &mut harness.ctx());
        assert_eq!(creature.loot().recipient(), Some(9));

        harness.tick(&mut creature, 60_000);
        assert_eq!(creature.death_state(), DeathState::Dead);
        assert!(creature.loot().is_empty());
        assert_eq!(creature.unit.position, creature.spawn().position);
        assert!(!creature.unit.in_world);

        harness.events.clear();
        harness.tick(&mut creature, 60_000);
        assert_eq!(creature.death_state(), DeathState::Alive);
        assert_eq!(creature.unit.health, creature.unit.max_health);
        assert!(creature.unit.target.is_none());
        assert!(creature.unit.in_world);

        let wp = creature.motion().waypoint().unwrap();
        assert_eq!(wp.current_node(), Some(1));
        assert_eq!(wp.last_reached_node(), None);
        match harness.events.iter().find(|e| matches!(e, WorldEvent::SplineLaunched { .. })) {
            Some(WorldEvent::SplineLaunched { points, .. }) => assert_eq!(points[0], [-8800.0, 640.0, 94.0]),
            _ => panic!("respawn did not launch a spline"),
        }
        assert_eq!(*harness.store.deleted.lock().unwrap(), vec![1]);
        assert!(harness.link_events.contains(&LinkEvent::Respawned { guid: 1 }));
    }

    #[test]
    fn test_death_edge_effects() {
        let mut harness = Harness::new();
        let mut creature = spawned(&mut harness, guard());
        creature.unit.target = Some(5);
        creature.unit.searched_assistance = true;
        creature.add_companion(77);

        creature.kill(None, &mut harness.ctx());
        assert!(creature.unit.target.is_none());
        assert_eq!(creature.unit.npc_flags, 0);
        assert!(!creature.unit.searched_assistance);
        assert_eq!(creature.corpse_decay_at(), harness.now_ms + 60_000);
        assert_eq!(creature.respawn_at(), harness.now_ms + 120_000);
        assert!(harness.link_events.contains(&LinkEvent::CompanionReleased { guid: 77 }));
        assert!(creature.companions().is_empty());
        // Normal rank and default config: not saved until the periodic save
        assert!(harness.store.saved.lock().unwrap().is_empty());

        assert!(creature.save_respawn_time_if_pending(&harness.store));
        assert!(!creature.save_respawn_time_if_pending(&harness.store));
        assert_eq!(harness.store.saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_world_boss_saves_immediately() {
        let mut harness = Harness::new();
        let template = Arc::new(template(5, CreatureRank::WorldBoss, MovementType::Idle));
        let mut boss = spawned(&mut harness, Creature::new(spawn(6, 5, 3600), template, Box::new(PassiveAi), None));

        boss.kill(Some(3), &mut harness.ctx());
        let expected = (harness.now_ms + 3_600_000) / 1000;
        assert_eq!(*harness.store.saved.lock().unwrap(), vec![(6, expected)]);
        assert_eq!(boss.corpse_decay_at(), harness.now_ms + 3_600_000);
    }

    #[test]
    fn test_flyer_falls_on_death() {
        let mut harness = Harness::new();
        let mut gryphon_template = template(4, CreatureRank::Normal, MovementType::Idle);
        gryphon_template.can_fly = true;
        let mut row = spawn(2, 4, 60);
        row.position = [0.0, 0.0, 50.0];
        let mut gryphon = spawned(&mut harness, Creature::new(row, Arc::new(gryphon_template), Box::new(PassiveAi), None));

        gryphon.kill(None, &mut harness.ctx());
        assert!((gryphon.unit.position[2] - 10.0).abs() < 0.001);
        assert!(harness.events.iter().any(|e| matches!(e, WorldEvent::CreatureFell { guid: 2, .. })));
    }

    #[test]
    fn test_regeneration() {
        let mut harness = Harness::new();
        let template = Arc::new(template(3, CreatureRank::Normal, MovementType::Idle));
        let mut creature = spawned(&mut harness, Creature::new(spawn(3, 3, 60), template, Box::new(PassiveAi), None));
        let max_health = creature.unit.max_health;
        let max_mana = creature.unit.max_mana;

        creature.unit.health = 1;
        creature.unit.mana = 0;
        harness.tick(&mut creature, 1999);
        assert_eq!(creature.unit.health, 1);
        harness.tick(&mut creature, 1);
        assert_eq!(creature.unit.health, 1 + max_health / 3);
        assert_eq!(creature.unit.mana, max_mana / 3);

        // In combat: no health, spirit-based mana
        creature.unit.in_combat = true;
        let health = creature.unit.health;
        let mana = creature.unit.mana;
        harness.tick(&mut creature, 2000);
        assert_eq!(creature.unit.health, health);
        assert_eq!(creature.unit.mana, mana + 20 / 5 + 17);

        // Polymorphed creatures heal in combat
        creature.unit.polymorphed = true;
        harness.tick(&mut creature, 2000);
        assert!(creature.unit.health > health);
    }

    #[test]
    fn test_controlled_regeneration_uses_spirit() {
        let mut harness = Harness::new();
        let template = Arc::new(template(3, CreatureRank::Normal, MovementType::Idle));
        let mut creature = spawned(&mut harness, Creature::new(spawn(3, 3, 60), template, Box::new(PassiveAi), None));
        creature.unit.controlled = true;
        creature.unit.health = 1;

        harness.tick(&mut creature, 2000);
        assert_eq!(creature.unit.health, 1 + 5);
    }

    struct SelfDestructAi;

    impl CreatureAi for SelfDestructAi {
        fn update_ai(&mut self, unit: &mut Unit, _diff_ms: u32) {
            unit.health = 0;
        }
    }

    #[test]
    fn test_death_during_ai_stops_the_tick() {
        let mut harness = Harness::new();
        let template = Arc::new(template(3, CreatureRank::Normal, MovementType::Idle));
        let mut creature = spawned(&mut harness, Creature::new(spawn(3, 3, 60), template, Box::new(SelfDestructAi), None));

        harness.tick(&mut creature, 2000);
        assert_eq!(creature.death_state(), DeathState::Corpse);
        assert_eq!(creature.unit.health, 0);
        assert!(harness.events.iter().any(|e| matches!(e, WorldEvent::CreatureDied { guid: 3, .. })));
    }

    #[derive(Default)]
    struct CountingAi {
        updates: Arc<std::sync::atomic::AtomicU32>,
    }

    impl CreatureAi for CountingAi {
        fn update_ai(&mut self, _unit: &mut Unit, _diff_ms: u32) {
            self.updates.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[test]
    fn test_evading_creature_skips_motion_ai_and_regen() {
        use std::sync::atomic::Ordering;

        let mut harness = Harness::new();
        let ai = CountingAi::default();
        let updates = Arc::clone(&ai.updates);
        let template = Arc::new(template(1, CreatureRank::Normal, MovementType::Waypoint));
        let mut creature = spawned(&mut harness, Creature::new(spawn(1, 1, 60), template, Box::new(ai), None));
        let launches = harness.spline_launches();

        creature.unit.evading = true;
        creature.unit.health = 1;
        for _ in 0..5 {
            harness.tick(&mut creature, 1000);
        }
        assert_eq!(updates.load(Ordering::Relaxed), 0);
        assert_eq!(creature.unit.health, 1);
        assert_eq!(harness.spline_launches(), launches);

        creature.unit.evading = false;
        harness.tick(&mut creature, 2000);
        assert_eq!(updates.load(Ordering::Relaxed), 1);
        assert!(creature.unit.health > 1);
    }

    struct TaxiAi;

    impl CreatureAi for TaxiAi {
        fn update_ai(&mut self, unit: &mut Unit, _diff_ms: u32) {
            if !unit.taxi_flight && unit.pending_motion.is_none() {
                unit.request_motion(MotionRequest::Flight { taxi_path_id: 1 });
            }
        }
    }

    #[test]
    fn test_motion_request_from_ai_applied_after_phase() {
        let mut harness = Harness::new();
        let template = Arc::new(template(4, CreatureRank::Normal, MovementType::Idle));
        let mut creature = spawned(&mut harness, Creature::new(spawn(2, 4, 60), template, Box::new(TaxiAi), None));

        harness.tick(&mut creature, 50);
        assert!(matches!(creature.motion().generator(), crate::movement::MovementGenerator::Flight(_)));
        assert!(creature.unit.taxi_flight);
        assert_eq!(creature.unit.phase, UpdatePhase::Idle);
    }

    struct QuickRespawnAi;

    impl CreatureAi for QuickRespawnAi {
        fn corpse_removed(&mut self, _unit: &mut Unit) -> Option<u32> {
            Some(5)
        }
    }

    #[test]
    fn test_corpse_removal_can_override_respawn() {
        let mut harness = Harness::new();
        let template = Arc::new(template(3, CreatureRank::Normal, MovementType::Idle));
        let mut creature = spawned(&mut harness, Creature::new(spawn(3, 3, 600), template, Box::new(QuickRespawnAi), None));

        creature.kill(None, &mut harness.ctx());
        harness.tick(&mut creature, 60_000);
        assert_eq!(creature.respawn_at(), harness.now_ms + 5000);
        assert_eq!(harness.events.iter().filter(|e| matches!(e, WorldEvent::VisibilityChanged { .. })).count(), 2);
        assert_eq!(creature.unit.visibility, Visibility::On);

        harness.tick(&mut creature, 5000);
        assert!(creature.is_alive());
    }

    #[test]
    fn test_link_holds_respawn_until_master_alive() {
        let mut harness = Harness::new();
        let template = Arc::new(template(6, CreatureRank::Normal, MovementType::Idle));
        let link = CreatureLink { guid: 7, master_guid: 6, flags: LINK_CANT_SPAWN_IF_MASTER_DEAD };
        let mut servant = Creature::new(spawn(7, 6, 10), template, Box::new(PassiveAi), Some(link));
        servant.start_dead(harness.now_ms + 1000);

        harness.tick(&mut servant, 2000);
        assert_eq!(servant.death_state(), DeathState::Dead);

        harness.alive.insert(6);
        harness.tick(&mut servant, 100);
        assert!(servant.is_alive());
    }

    #[test]
    fn test_transient_state_promoted_at_tick_start() {
        let mut harness = Harness::new();
        let mut creature = spawned(&mut harness, guard());
        creature.unit.death_state = DeathState::JustAlived;

        harness.tick(&mut creature, 100);
        assert_eq!(creature.death_state(), DeathState::Alive);
    }

    #[test]
    fn test_swapped_template_restored_on_respawn() {
        let mut harness = Harness::new();
        let mut creature = spawned(&mut harness, guard());
        creature.update_entry(Arc::new(template(9, CreatureRank::Elite, MovementType::Idle)));
        assert_eq!(creature.unit.entry, 9);

        creature.forced_despawn(&mut harness.ctx());
        assert_eq!(creature.death_state(), DeathState::Dead);
        // Elite corpse delay is skipped by the forced despawn
        assert!(harness.link_events.contains(&LinkEvent::Despawned { guid: 1 }));

        creature.respawn_now(&mut harness.ctx());
        harness.tick(&mut creature, 1);
        assert!(creature.is_alive());
        assert_eq!(creature.unit.entry, 1);
        assert_eq!(creature.template().rank, CreatureRank::Normal);
    }

    #[test]
    fn test_admin_waypoint_controls() {
        let mut harness = Harness::new();
        let mut creature = spawned(&mut harness, guard());

        assert!(!creature.set_next_waypoint(99));
        assert!(creature.set_next_waypoint(3));
        assert!(!creature.reset_to_path_position(&mut harness.ctx()));

        creature.pause_waypoints();
        assert!(creature.unit.waypoint_paused);
        creature.resume_waypoints();
        assert!(!creature.unit.waypoint_paused);

        assert!(!creature.start_flight(99, &mut harness.ctx()));
        assert!(creature.start_flight(1, &mut harness.ctx()));
        assert!(creature.unit.taxi_flight);
    }
}
