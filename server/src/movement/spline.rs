//! Server-side spline movement.
//!
//! Generators hand a list of points to a [`SplineSystem`] and poll it each
//! tick. [`MoveSpline`] is the in-process implementation: constant-speed,
//! piecewise-linear travel through the launched points.

use std::f32::consts::TAU;
use log::trace;

/// Flight speed in yards per second
pub const FLIGHT_SPEED: f32 = 32.0;

/// Spline launch rejections
#[derive(Debug, Clone, PartialEq)]
pub enum SplineError {
    EmptyPath,
    InvalidPoint(usize),
    InvalidVelocity(f32),
}

impl std::fmt::Display for SplineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "Spline has no points"),
            Self::InvalidPoint(i) => write!(f, "Spline point {} is not finite", i),
            Self::InvalidVelocity(v) => write!(f, "Invalid spline velocity {}", v),
        }
    }
}

impl std::error::Error for SplineError {}

/// Parameters of one spline launch
#[derive(Debug, Clone, PartialEq)]
pub struct SplineInit {
    pub points: Vec<[f32; 3]>,
    /// Path index reported while the first point is the last one reached
    pub first_point_id: u32,
    /// Heading applied once the spline finishes
    pub facing: Option<f32>,
    pub velocity: f32,
    pub flying: bool,
    pub walk: bool,
}

impl SplineInit {
    /// Single-destination move
    pub fn move_to(point: [f32; 3], velocity: f32) -> Self {
        Self {
            points: vec![point],
            first_point_id: 0,
            facing: None,
            velocity,
            flying: false,
            walk: true,
        }
    }

    fn validate(&self) -> Result<(), SplineError> {
        if self.points.is_empty() {
            return Err(SplineError::EmptyPath);
        }
        if !self.velocity.is_finite() || self.velocity <= 0.0 {
            return Err(SplineError::InvalidVelocity(self.velocity));
        }
        match self.points.iter().position(|p| p.iter().any(|c| !c.is_finite())) {
            Some(i) => Err(SplineError::InvalidPoint(i)),
            None => Ok(()),
        }
    }
}

/// The motion subsystem movement generators drive
pub trait SplineSystem {
    /// Start moving from `from` through the points of `init`
    fn launch(&mut self, from: [f32; 3], init: SplineInit) -> Result<(), SplineError>;

    /// `first_point_id` plus the index of the last point reached
    fn current_path_index(&self) -> u32;

    fn is_finalized(&self) -> bool;

    /// Halted by [`SplineSystem::stop`] before reaching the end
    fn is_stopped_short(&self) -> bool;

    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplineState {
    Finalized,
    Moving,
    StoppedShort,
}

/// Piecewise-linear spline
#[derive(Debug)]
pub struct MoveSpline {
    /// Launch position followed by the launched points
    nodes: Vec<[f32; 3]>,
    /// Distance from the launch position to each node
    cumulative: Vec<f32>,
    first_point_id: u32,
    velocity: f32,
    facing: Option<f32>,
    traveled: f32,
    /// Number of launched points already passed
    reached: usize,
    state: SplineState,
    launched: Option<SplineInit>,
}

impl Default for MoveSpline {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveSpline {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            cumulative: Vec::new(),
            first_point_id: 0,
            velocity: 0.0,
            facing: None,
            traveled: 0.0,
            reached: 0,
            state: SplineState::Finalized,
            launched: None,
        }
    }

    /// Drop any movement in progress
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance along the spline.
    /// Returns the new position and heading while the spline is moving.
    pub fn update(&mut self, diff_ms: u32) -> Option<([f32; 3], f32)> {
        if self.state != SplineState::Moving {
            return None;
        }

        let total = self.cumulative.last().copied().unwrap_or(0.0);
        self.traveled = (self.traveled + self.velocity * diff_ms as f32 / 1000.0).min(total);
        self.advance_reached();

        let (position, heading) = self.sample();
        if self.traveled >= total {
            self.state = SplineState::Finalized;
            trace!("Spline finalized at ({:.1}, {:.1}, {:.1})", position[0], position[1], position[2]);
            return Some((position, self.facing.unwrap_or(heading)));
        }

        Some((position, heading))
    }

    /// Take the last launch, if it has not been reported yet
    pub fn take_launched(&mut self) -> Option<SplineInit> {
        self.launched.take()
    }

    fn advance_reached(&mut self) {
        while self.reached + 1 < self.nodes.len() && self.cumulative[self.reached + 1] <= self.traveled {
            self.reached += 1;
        }
    }

    /// Position and travel heading at the current distance
    fn sample(&self) -> ([f32; 3], f32) {
        let segment = (self.reached + 1).min(self.nodes.len() - 1);
        let start = self.nodes[segment - 1];
        let end = self.nodes[segment];
        let length = self.cumulative[segment] - self.cumulative[segment - 1];

        let t = if length > f32::EPSILON {
            ((self.traveled - self.cumulative[segment - 1]) / length).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let position = [
            start[0] + (end[0] - start[0]) * t,
            start[1] + (end[1] - start[1]) * t,
            start[2] + (end[2] - start[2]) * t,
        ];
        let heading = (end[1] - start[1]).atan2(end[0] - start[0]).rem_euclid(TAU);
        (position, heading)
    }
}

impl SplineSystem for MoveSpline {
    fn launch(&mut self, from: [f32; 3], init: SplineInit) -> Result<(), SplineError> {
        init.validate()?;

        let mut nodes = Vec::with_capacity(init.points.len() + 1);
        nodes.push(from);
        nodes.extend_from_slice(&init.points);

        let mut cumulative = Vec::with_capacity(nodes.len());
        cumulative.push(0.0);
        for pair in nodes.windows(2) {
            let dx = pair[1][0] - pair[0][0];
            let dy = pair[1][1] - pair[0][1];
            let dz = pair[1][2] - pair[0][2];
            let previous = cumulative.last().copied().unwrap_or(0.0);
            cumulative.push(previous + (dx * dx + dy * dy + dz * dz).sqrt());
        }

        self.nodes = nodes;
        self.cumulative = cumulative;
        self.first_point_id = init.first_point_id;
        self.velocity = init.velocity;
        self.facing = init.facing;
        self.traveled = 0.0;
        self.reached = 0;
        self.state = SplineState::Moving;
        self.advance_reached();
        self.launched = Some(init);
        Ok(())
    }

    fn current_path_index(&self) -> u32 {
        match self.reached {
            0 => self.first_point_id,
            n => self.first_point_id + n as u32 - 1,
        }
    }

    fn is_finalized(&self) -> bool {
        self.state == SplineState::Finalized
    }

    fn is_stopped_short(&self) -> bool {
        self.state == SplineState::StoppedShort
    }

    fn stop(&mut self) {
        if self.state == SplineState::Moving {
            self.state = SplineState::StoppedShort;
        }
    }
}
