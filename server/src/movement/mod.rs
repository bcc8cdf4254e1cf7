//! Creature movement.
//!
//! Every creature owns one [`MotionMaster`] holding exactly one active
//! [`MovementGenerator`]. Generators read and write the unit through a
//! [`MotionContext`], drive the spline system, and report arrivals and node
//! behavior through a [`MotionListener`].

pub mod flight;
pub mod spline;
pub mod waypoint;

use log::{debug, warn};

use crate::entities::{Unit, UpdatePhase};
use crate::paths::PathProvider;
use realm_shared::PathOrigin;

pub use flight::FlightPathMovement;
pub use spline::{MoveSpline, SplineError, SplineInit, SplineSystem, FLIGHT_SPEED};
pub use waypoint::{select_text_id, WaypointMovement};

/// Receiver of movement side effects
pub trait MotionListener {
    /// Arrival or departure notification for the AI
    fn movement_inform(&mut self, unit: &mut Unit, kind: u32, point: u32);

    fn run_movement_script(&mut self, unit: &Unit, script_id: u32);

    fn run_taxi_event(&mut self, unit: &Unit, event_id: u32, departure: bool);

    fn emote(&mut self, unit: &Unit, emote_id: u32);

    fn cast_spell(&mut self, unit: &Unit, spell_id: u32);

    fn say(&mut self, unit: &Unit, text_id: i32);

    /// The unit's display id was changed by a node behavior
    fn display_changed(&mut self, unit: &Unit);

    /// The unit was moved onto another map
    fn teleported(&mut self, unit: &Unit);
}

/// Everything a generator may touch during one call
pub struct MotionContext<'a> {
    pub unit: &'a mut Unit,
    pub spline: &'a mut dyn SplineSystem,
    pub listener: &'a mut dyn MotionListener,
}

/// Millisecond countdown that never goes below zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseTimer {
    remaining: u32,
}

impl PauseTimer {
    pub fn update(&mut self, diff_ms: u32) {
        self.remaining = self.remaining.saturating_sub(diff_ms);
    }

    pub fn passed(&self) -> bool {
        self.remaining == 0
    }

    pub fn reset(&mut self, ms: u32) {
        self.remaining = ms;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

/// A requested generator change
#[derive(Debug, Clone, PartialEq)]
pub enum MotionRequest {
    Idle,
    Waypoint {
        origin: Option<PathOrigin>,
        path_id: u32,
        initial_delay: u32,
    },
    Flight {
        taxi_path_id: u32,
    },
}

/// The active movement of a unit
#[derive(Debug)]
pub enum MovementGenerator {
    Idle,
    Waypoint(WaypointMovement),
    Flight(FlightPathMovement),
}

impl MovementGenerator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waypoint(_) => "waypoint",
            Self::Flight(_) => "flight",
        }
    }

    fn initialize(&mut self, ctx: &mut MotionContext) {
        match self {
            Self::Idle => {}
            Self::Waypoint(wp) => wp.initialize(ctx),
            Self::Flight(flight) => flight.initialize(ctx),
        }
    }

    fn finalize(&mut self, ctx: &mut MotionContext) {
        match self {
            Self::Idle => {}
            Self::Waypoint(wp) => wp.finalize(ctx),
            Self::Flight(flight) => flight.finalize(ctx),
        }
    }

    /// Returns false once the generator has nothing left to do
    fn update(&mut self, ctx: &mut MotionContext, diff_ms: u32) -> bool {
        match self {
            Self::Idle => true,
            Self::Waypoint(wp) => wp.update(ctx, diff_ms),
            Self::Flight(flight) => flight.update(ctx),
        }
    }

    fn reset_position(&self) -> Option<([f32; 3], Option<f32>)> {
        match self {
            Self::Idle => None,
            Self::Waypoint(wp) => wp.get_reset_position().map(|(p, o)| (p, Some(o))),
            Self::Flight(flight) => flight.get_reset_position().map(|p| (p, None)),
        }
    }
}

/// Owner of a unit's single active movement generator
#[derive(Debug)]
pub struct MotionMaster {
    current: MovementGenerator,
}

impl Default for MotionMaster {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionMaster {
    pub fn new() -> Self {
        Self { current: MovementGenerator::Idle }
    }

    pub fn generator(&self) -> &MovementGenerator {
        &self.current
    }

    pub fn waypoint(&self) -> Option<&WaypointMovement> {
        match &self.current {
            MovementGenerator::Waypoint(wp) => Some(wp),
            _ => None,
        }
    }

    pub fn waypoint_mut(&mut self) -> Option<&mut WaypointMovement> {
        match &mut self.current {
            MovementGenerator::Waypoint(wp) => Some(wp),
            _ => None,
        }
    }

    /// Finalize the active generator, then initialize `generator` in its place.
    /// Refused while the unit is inside an update phase.
    pub fn replace(&mut self, generator: MovementGenerator, ctx: &mut MotionContext) -> bool {
        if ctx.unit.phase != UpdatePhase::Idle {
            warn!("Unit {} tried to swap movement to {} during {:?} phase",
                ctx.unit.guid, generator.name(), ctx.unit.phase);
            return false;
        }
        self.swap(generator, ctx);
        true
    }

    /// Build the generator for `request` and install it
    pub fn apply(&mut self, request: MotionRequest, paths: &dyn PathProvider, ctx: &mut MotionContext) -> bool {
        let generator = match request {
            MotionRequest::Idle => MovementGenerator::Idle,
            MotionRequest::Waypoint { origin, path_id, initial_delay } => {
                let wp = WaypointMovement::load(paths, ctx.unit.guid, ctx.unit.entry, path_id, origin)
                    .with_initial_delay(initial_delay);
                MovementGenerator::Waypoint(wp)
            }
            MotionRequest::Flight { taxi_path_id } => match paths.taxi_path(taxi_path_id) {
                Some(path) if !path.is_empty() => MovementGenerator::Flight(FlightPathMovement::new(path)),
                _ => {
                    warn!("Unit {} requested unknown taxi path {}", ctx.unit.guid, taxi_path_id);
                    return false;
                }
            },
        };
        self.replace(generator, ctx)
    }

    /// Tick the active generator; finished generators fall back to idle
    pub fn update(&mut self, ctx: &mut MotionContext, diff_ms: u32) {
        if !self.current.update(ctx, diff_ms) {
            debug!("Unit {} finished {} movement", ctx.unit.guid, self.current.name());
            self.swap(MovementGenerator::Idle, ctx);
        }
    }

    /// Tear down the active generator, leaving the unit idle
    pub fn clear(&mut self, ctx: &mut MotionContext) {
        self.swap(MovementGenerator::Idle, ctx);
    }

    /// Safe position independent of live spline state
    pub fn get_reset_position(&self) -> Option<([f32; 3], Option<f32>)> {
        self.current.reset_position()
    }

    fn swap(&mut self, generator: MovementGenerator, ctx: &mut MotionContext) {
        self.current.finalize(ctx);
        self.current = generator;
        self.current.initialize(ctx);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Spline fake that records launches and reports scripted state
    #[derive(Debug, Default)]
    pub struct RecordingSpline {
        pub launches: Vec<SplineInit>,
        pub finalized: bool,
        pub stopped_short: bool,
        pub path_index: u32,
        pub reject: bool,
    }

    impl SplineSystem for RecordingSpline {
        fn launch(&mut self, _from: [f32; 3], init: SplineInit) -> Result<(), SplineError> {
            if self.reject {
                return Err(SplineError::EmptyPath);
            }
            self.path_index = init.first_point_id;
            self.launches.push(init);
            self.finalized = false;
            self.stopped_short = false;
            Ok(())
        }

        fn current_path_index(&self) -> u32 {
            self.path_index
        }

        fn is_finalized(&self) -> bool {
            self.finalized
        }

        fn is_stopped_short(&self) -> bool {
            self.stopped_short
        }

        fn stop(&mut self) {
            self.stopped_short = true;
        }
    }

    impl RecordingSpline {
        pub fn last_target(&self) -> Option<[f32; 3]> {
            self.launches.last().and_then(|l| l.points.last().copied())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Recorded {
        Inform(u32, u32),
        Script(u32),
        TaxiEvent(u32, bool),
        Emote(u32),
        Spell(u32),
        Say(i32),
        Display(u32),
        Teleport(u32),
    }

    #[derive(Debug, Default)]
    pub struct RecordingListener {
        pub calls: Vec<Recorded>,
    }

    impl RecordingListener {
        pub fn informs(&self) -> Vec<(u32, u32)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Recorded::Inform(kind, point) => Some((*kind, *point)),
                    _ => None,
                })
                .collect()
        }
    }

    impl MotionListener for RecordingListener {
        fn movement_inform(&mut self, _unit: &mut Unit, kind: u32, point: u32) {
            self.calls.push(Recorded::Inform(kind, point));
        }

        fn run_movement_script(&mut self, _unit: &Unit, script_id: u32) {
            self.calls.push(Recorded::Script(script_id));
        }

        fn run_taxi_event(&mut self, _unit: &Unit, event_id: u32, departure: bool) {
            self.calls.push(Recorded::TaxiEvent(event_id, departure));
        }

        fn emote(&mut self, _unit: &Unit, emote_id: u32) {
            self.calls.push(Recorded::Emote(emote_id));
        }

        fn cast_spell(&mut self, _unit: &Unit, spell_id: u32) {
            self.calls.push(Recorded::Spell(spell_id));
        }

        fn say(&mut self, _unit: &Unit, text_id: i32) {
            self.calls.push(Recorded::Say(text_id));
        }

        fn display_changed(&mut self, unit: &Unit) {
            self.calls.push(Recorded::Display(unit.display_id));
        }

        fn teleported(&mut self, unit: &Unit) {
            self.calls.push(Recorded::Teleport(unit.map_id));
        }
    }
}
