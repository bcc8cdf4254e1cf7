//! Waypoint movement: cyclic traversal of a shared waypoint path.
//!
//! The generator walks to the current node, runs the node's arrival
//! behavior, waits the node's delay and continues with the next node in
//! ascending id order, wrapping back to the first node after the last.
//! Every operation is a no-op on an empty or missing path.

use std::f32::consts::TAU;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use log::{debug, error, trace, warn};
use rand::Rng;
use realm_shared::{
    PathOrigin, WaypointPath, EXTERNAL_WAYPOINT_FINISHED_LAST, EXTERNAL_WAYPOINT_MOVE,
    EXTERNAL_WAYPOINT_MOVE_START, MAX_WAYPOINT_TEXT, WAYPOINT_MOTION_TYPE,
};

use super::{MotionContext, PauseTimer, SplineInit};
use crate::paths::PathProvider;

/// Pause after the spline was stopped before reaching a node (ms)
pub const STOP_TIME_FOR_BLOCKED_MOVE: u32 = 3000;

#[derive(Debug)]
pub struct WaypointMovement {
    path: Option<Arc<WaypointPath>>,
    path_id: u32,
    origin: PathOrigin,
    current_node: u32,
    last_reached: Option<u32>,
    arrival_done: bool,
    /// A leg towards `current_node` was launched and not yet arrived
    in_transit: bool,
    next_move: PauseTimer,
    initial_delay: u32,
}

impl WaypointMovement {
    pub fn new(path: Option<Arc<WaypointPath>>, path_id: u32, origin: PathOrigin) -> Self {
        let current_node = path
            .as_ref()
            .and_then(|p| p.keys().next().copied())
            .unwrap_or(0);

        Self {
            path,
            path_id,
            origin,
            current_node,
            last_reached: None,
            arrival_done: false,
            in_transit: false,
            next_move: PauseTimer::default(),
            initial_delay: 0,
        }
    }

    /// Look up the unit's path. A missing path yields an inert generator.
    pub fn load(
        paths: &dyn PathProvider,
        guid: u64,
        entry: u32,
        path_id: u32,
        origin: Option<PathOrigin>,
    ) -> Self {
        match paths.path_for(guid, entry, path_id, origin) {
            Some((path, origin)) => {
                debug!("Unit {} loaded {} path {} with {} nodes", guid, origin.name(), path_id, path.len());
                Self::new(Some(path), path_id, origin)
            }
            None => {
                warn!("No waypoint path {} found for unit {} (entry {})", path_id, guid, entry);
                Self::new(None, path_id, origin.unwrap_or(PathOrigin::Guid))
            }
        }
    }

    /// Delay before the first leg is launched
    pub fn with_initial_delay(mut self, delay_ms: u32) -> Self {
        self.initial_delay = delay_ms;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.path.as_ref().map_or(true, |p| p.is_empty())
    }

    pub fn initialize(&mut self, ctx: &mut MotionContext) {
        ctx.unit.roaming = true;
        ctx.unit.waypoint_paused = false;

        if self.is_empty() {
            warn!("Unit {} started waypoint movement on an empty {} path {}",
                ctx.unit.guid, self.origin.name(), self.path_id);
            return;
        }

        self.next_move.reset(self.initial_delay);
        self.start_move(ctx);
    }

    pub fn finalize(&mut self, ctx: &mut MotionContext) {
        ctx.unit.roaming = false;
        ctx.unit.roaming_move = false;
        ctx.unit.walking = !ctx.unit.running;
    }

    /// Per-tick entry. Always keeps the generator active.
    pub fn update(&mut self, ctx: &mut MotionContext, diff_ms: u32) -> bool {
        if ctx.unit.not_move || self.is_empty() {
            ctx.unit.roaming_move = false;
            return true;
        }

        if self.is_stopped() {
            if self.can_move(ctx, diff_ms) {
                self.start_move(ctx);
            }
        } else if ctx.spline.is_stopped_short() {
            trace!("Unit {} was stopped short of node {}", ctx.unit.guid, self.current_node);
            self.stop(STOP_TIME_FOR_BLOCKED_MOVE);
        } else if ctx.spline.is_finalized() {
            if self.in_transit {
                self.on_arrived(ctx);
            }
            self.start_move(ctx);
        }

        true
    }

    /// Count down the pause. Passes only when the wait is over and the
    /// unit is not paused externally.
    pub fn can_move(&mut self, ctx: &mut MotionContext, diff_ms: u32) -> bool {
        self.next_move.update(diff_ms);
        if self.next_move.passed() && ctx.unit.waypoint_paused {
            self.next_move.reset(1);
        }
        self.next_move.passed() && !ctx.unit.waypoint_paused
    }

    pub fn on_arrived(&mut self, ctx: &mut MotionContext) {
        if self.arrival_done {
            return;
        }
        let Some(path) = self.path.clone() else {
            return;
        };
        let Some(node) = path.get(&self.current_node) else {
            if !path.is_empty() {
                error!("Unit {} arrived at node {} missing from its {} path {}",
                    ctx.unit.guid, self.current_node, self.origin.name(), self.path_id);
                debug_assert!(false, "waypoint cursor points outside its path");
            }
            return;
        };

        ctx.unit.roaming_move = false;
        self.arrival_done = true;
        self.in_transit = false;
        self.last_reached = Some(self.current_node);

        if let Some(script_id) = node.script_id {
            ctx.listener.run_movement_script(ctx.unit, script_id);
        }

        if let Some(behavior) = &node.behavior {
            if behavior.emote != 0 {
                ctx.listener.emote(ctx.unit, behavior.emote);
            }
            if behavior.spell != 0 {
                ctx.listener.cast_spell(ctx.unit, behavior.spell);
            }
            if behavior.model1 != 0 {
                ctx.unit.display_id = behavior.model1;
                ctx.listener.display_changed(ctx.unit);
            }
            if let Some(text_id) = select_text_id(&behavior.text_ids, &mut rand::thread_rng()) {
                ctx.listener.say(ctx.unit, text_id);
            }
        }

        let kind = if self.origin == PathOrigin::External && self.path_id > 0 {
            EXTERNAL_WAYPOINT_MOVE + self.path_id
        } else {
            WAYPOINT_MOTION_TYPE
        };
        ctx.listener.movement_inform(ctx.unit, kind, self.current_node);

        self.stop(node.delay);
    }

    /// Launch the next leg. After an arrival this advances to the next node,
    /// wrapping to the first one; the cursor only moves if the launch succeeds.
    pub fn start_move(&mut self, ctx: &mut MotionContext) {
        let Some(path) = self.path.clone() else {
            return;
        };
        if path.is_empty() || self.is_stopped() || !ctx.unit.can_move() {
            return;
        }

        let Some(current) = path.get(&self.current_node) else {
            error!("Unit {} waypoint cursor at node {} missing from its {} path {}",
                ctx.unit.guid, self.current_node, self.origin.name(), self.path_id);
            debug_assert!(false, "waypoint cursor points outside its path");
            return;
        };

        let (target_id, reached_last) = if self.arrival_done {
            match path.range((Excluded(self.current_node), Unbounded)).next() {
                Some((id, _)) => (*id, false),
                None => match path.keys().next() {
                    Some(first) => (*first, true),
                    None => return,
                },
            }
        } else {
            (self.current_node, false)
        };
        let Some(target) = path.get(&target_id) else {
            return;
        };

        let walk = !ctx.unit.running && !ctx.unit.levitating;
        let facing = match target.orientation {
            Some(o) if target.delay != 0 => Some(o),
            _ => None,
        };
        let init = SplineInit {
            points: vec![target.position],
            first_point_id: target_id,
            facing,
            velocity: ctx.unit.speed(walk),
            flying: ctx.unit.levitating,
            walk,
        };

        if let Err(e) = ctx.spline.launch(ctx.unit.position, init) {
            warn!("Unit {} could not start moving to node {}: {}", ctx.unit.guid, target_id, e);
            return;
        }

        if self.arrival_done {
            if let Some(behavior) = &current.behavior {
                if behavior.model2 != 0 {
                    ctx.unit.display_id = behavior.model2;
                    ctx.listener.display_changed(ctx.unit);
                }
                ctx.unit.emote_state = 0;
            }
        }

        let advanced = self.arrival_done;
        self.current_node = target_id;
        self.arrival_done = false;
        self.in_transit = true;
        ctx.unit.roaming_move = true;
        ctx.unit.walking = walk;

        if advanced && self.origin == PathOrigin::External && self.path_id > 0 {
            let kind = if reached_last {
                EXTERNAL_WAYPOINT_FINISHED_LAST
            } else {
                EXTERNAL_WAYPOINT_MOVE_START
            };
            ctx.listener.movement_inform(ctx.unit, kind + self.path_id, self.current_node);
        }

        trace!("Unit {} moving to node {} ({:.1}, {:.1}, {:.1})", ctx.unit.guid, target_id,
            target.position[0], target.position[1], target.position[2]);
    }

    /// Safe position from the last reached node.
    /// Without a stored heading, faces along the leg that led to the node.
    pub fn get_reset_position(&self) -> Option<([f32; 3], f32)> {
        let path = self.path.as_ref()?;
        let last = self.last_reached?;
        let node = path.get(&last)?;

        let orientation = match node.orientation {
            Some(o) => o,
            None => {
                let previous = path
                    .range(..last)
                    .next_back()
                    .or_else(|| path.iter().next_back())
                    .map(|(_, n)| n.position)
                    .unwrap_or(node.position);
                let dx = node.position[0] - previous[0];
                let dy = node.position[1] - previous[1];
                dy.atan2(dx).rem_euclid(TAU)
            }
        };

        Some((node.position, orientation))
    }

    /// Jump to `node_id` as soon as the unit may move again
    pub fn set_next_waypoint(&mut self, node_id: u32) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        if !path.contains_key(&node_id) {
            return false;
        }

        self.next_move.reset(1);
        self.arrival_done = false;
        self.in_transit = false;
        self.current_node = node_id;
        true
    }

    pub fn current_node(&self) -> Option<u32> {
        (!self.is_empty()).then_some(self.current_node)
    }

    pub fn last_reached_node(&self) -> Option<u32> {
        self.last_reached
    }

    pub fn path_id(&self) -> u32 {
        self.path_id
    }

    pub fn origin(&self) -> PathOrigin {
        self.origin
    }

    pub fn node_count(&self) -> usize {
        self.path.as_ref().map_or(0, |p| p.len())
    }

    /// Waiting out a node delay, a blocked move, or an external pause
    pub fn is_paused(&self, waypoint_paused: bool) -> bool {
        waypoint_paused || self.is_stopped()
    }

    pub fn pause_remaining(&self) -> u32 {
        self.next_move.remaining()
    }

    fn is_stopped(&self) -> bool {
        !self.next_move.passed()
    }

    fn stop(&mut self, delay_ms: u32) {
        self.next_move.reset(delay_ms);
    }
}

/// Pick the text said on arrival.
///
/// Slot 0 empty means no text; slot 1 empty means always slot 0; otherwise
/// a uniform pick among the populated slots starting at 0.
pub fn select_text_id<R: Rng + ?Sized>(texts: &[i32; MAX_WAYPOINT_TEXT], rng: &mut R) -> Option<i32> {
    if texts[0] == 0 {
        return None;
    }
    if texts[1] == 0 {
        return Some(texts[0]);
    }
    let populated = texts.iter().take_while(|t| **t != 0).count();
    Some(texts[rng.gen_range(0..populated)])
}
