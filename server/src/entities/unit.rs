//! Unit data shared by the lifecycle and movement code.

use realm_shared::{DeathState, Visibility};

use crate::movement::MotionRequest;

/// Base walk speed in yards per second
pub const BASE_WALK_SPEED: f32 = 2.5;

/// Base run speed in yards per second
pub const BASE_RUN_SPEED: f32 = 7.0;

/// Which part of a creature's update is currently executing.
///
/// Movement generators may only be swapped while the phase is `Idle`;
/// requests made during another phase are queued on the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Movement,
    Ai,
}

/// Identity, stats and state flags of a creature
#[derive(Debug, Clone)]
pub struct Unit {
    pub guid: u64,
    pub entry: u32,
    pub map_id: u32,
    pub position: [f32; 3],
    pub orientation: f32,
    pub display_id: u32,
    pub level: u8,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub spirit: u32,
    pub npc_flags: u32,
    pub target: Option<u64>,
    pub death_state: DeathState,
    pub emote_state: u32,
    pub visibility: Visibility,
    pub in_world: bool,
    pub walk_speed: f32,
    pub run_speed: f32,

    // Movement state
    pub roaming: bool,
    pub roaming_move: bool,
    pub not_move: bool,
    pub waypoint_paused: bool,
    pub running: bool,
    pub walking: bool,
    pub levitating: bool,
    pub can_fly: bool,
    pub taxi_flight: bool,

    // Combat and control state
    pub in_combat: bool,
    pub evading: bool,
    pub polymorphed: bool,
    pub controlled: bool,
    pub searched_assistance: bool,

    pub phase: UpdatePhase,
    pub pending_motion: Option<MotionRequest>,
}

impl Unit {
    pub fn new(guid: u64, entry: u32, map_id: u32, position: [f32; 3], orientation: f32) -> Self {
        Self {
            guid,
            entry,
            map_id,
            position,
            orientation,
            display_id: 0,
            level: 1,
            health: 1,
            max_health: 1,
            mana: 0,
            max_mana: 0,
            spirit: 0,
            npc_flags: 0,
            target: None,
            death_state: DeathState::Alive,
            emote_state: 0,
            visibility: Visibility::On,
            in_world: true,
            walk_speed: BASE_WALK_SPEED,
            run_speed: BASE_RUN_SPEED,
            roaming: false,
            roaming_move: false,
            not_move: false,
            waypoint_paused: false,
            running: false,
            walking: true,
            levitating: false,
            can_fly: false,
            taxi_flight: false,
            in_combat: false,
            evading: false,
            polymorphed: false,
            controlled: false,
            searched_assistance: false,
            phase: UpdatePhase::Idle,
            pending_motion: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.death_state == DeathState::Alive
    }

    /// Movement is possible only while alive and not rooted
    pub fn can_move(&self) -> bool {
        self.is_alive() && !self.not_move
    }

    pub fn speed(&self, walk: bool) -> f32 {
        if walk { self.walk_speed } else { self.run_speed }
    }

    /// Ask for a different movement generator. Applied once the current
    /// update phase ends.
    pub fn request_motion(&mut self, request: MotionRequest) {
        self.pending_motion = Some(request);
    }

    /// Reset per-life state flags to their spawn defaults
    pub fn clear_runtime_state(&mut self) {
        self.target = None;
        self.emote_state = 0;
        self.roaming = false;
        self.roaming_move = false;
        self.not_move = false;
        self.waypoint_paused = false;
        self.running = false;
        self.walking = true;
        self.levitating = false;
        self.taxi_flight = false;
        self.in_combat = false;
        self.evading = false;
        self.polymorphed = false;
        self.controlled = false;
        self.searched_assistance = false;
        self.pending_motion = None;
    }
}
