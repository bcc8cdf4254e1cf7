//! Taxi flight along a finite path that may span several maps.
//!
//! A flight is flown one leg at a time: a leg is the run of nodes sharing
//! the current node's map. When a leg ends and the next node lies on another
//! map, the unit is teleported there and the next leg is launched.

use std::sync::Arc;
use log::{debug, warn};
use realm_shared::{TaxiNode, TaxiPath};

use super::{MotionContext, SplineInit, FLIGHT_SPEED};

#[derive(Debug)]
pub struct FlightPathMovement {
    path: Arc<TaxiPath>,
    current: usize,
}

impl FlightPathMovement {
    pub fn new(path: Arc<TaxiPath>) -> Self {
        Self { path, current: 0 }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn node_count(&self) -> usize {
        self.path.len()
    }

    /// End (exclusive) of the leg containing the current node
    pub fn path_at_map_end(&self) -> usize {
        let Some(node) = self.path.get(self.current) else {
            return self.path.len();
        };
        let map_id = node.map_id;
        self.path[self.current..]
            .iter()
            .position(|n| n.map_id != map_id)
            .map_or(self.path.len(), |offset| self.current + offset)
    }

    pub fn initialize(&mut self, ctx: &mut MotionContext) {
        ctx.unit.taxi_flight = true;
        // Resuming on a later leg's map
        if self.path.first().is_some_and(|n| n.map_id != ctx.unit.map_id) {
            self.recover_after_teleport();
        }
        self.activate(ctx);
    }

    pub fn finalize(&mut self, ctx: &mut MotionContext) {
        ctx.unit.taxi_flight = false;
    }

    /// Launch the spline for the current leg
    pub fn activate(&mut self, ctx: &mut MotionContext) {
        let end = self.path_at_map_end();
        if self.current >= end {
            return;
        }

        let init = SplineInit {
            points: self.path[self.current..end].iter().map(|n| n.position).collect(),
            first_point_id: self.current as u32,
            facing: None,
            velocity: FLIGHT_SPEED,
            flying: true,
            walk: false,
        };

        if let Err(e) = ctx.spline.launch(ctx.unit.position, init) {
            warn!("Unit {} could not launch flight leg at node {}: {}", ctx.unit.guid, self.current, e);
        }
    }

    /// Follow the spline's progress. Returns true while nodes remain.
    pub fn update(&mut self, ctx: &mut MotionContext) -> bool {
        if self.path.is_empty() {
            return false;
        }

        let point = ctx.spline.current_path_index() as usize;
        if point > self.current {
            // Departure event of the node being left, then arrival event of the next
            let mut departure = true;
            loop {
                self.do_event(ctx, departure);
                if point == self.current {
                    break;
                }
                self.current += departure as usize;
                departure = !departure;
            }
        }

        if ctx.spline.is_finalized() {
            let path = Arc::clone(&self.path);
            if let Some(next) = path.get(self.current + 1) {
                if next.map_id != ctx.unit.map_id {
                    let next_index = self.current + 1;
                    self.teleport(ctx, next, next_index);
                }
            }
        }

        self.current < self.path.len() - 1
    }

    /// Index of the first node of the second leg, if the flight crosses maps
    pub fn recover_after_teleport(&mut self) {
        let Some(first) = self.path.first() else {
            return;
        };
        if let Some(offset) = self.path[1..].iter().position(|n| n.map_id != first.map_id) {
            self.current = offset + 1;
        }
    }

    pub fn get_reset_position(&self) -> Option<[f32; 3]> {
        self.path.get(self.current).map(|n| n.position)
    }

    fn do_event(&self, ctx: &mut MotionContext, departure: bool) {
        let Some(node) = self.path.get(self.current) else {
            return;
        };
        let event_id = if departure { node.departure_event_id } else { node.arrival_event_id };
        if event_id != 0 {
            ctx.listener.run_taxi_event(ctx.unit, event_id, departure);
        }
    }

    /// Move onto the map of `node` (the node at `index`) and fly its leg
    fn teleport(&mut self, ctx: &mut MotionContext, node: &TaxiNode, index: usize) {
        debug!("Unit {} flight crosses from map {} to map {}", ctx.unit.guid, ctx.unit.map_id, node.map_id);
        ctx.unit.map_id = node.map_id;
        ctx.unit.position = node.position;
        ctx.listener.teleported(ctx.unit);
        self.current = index;
        self.activate(ctx);
    }
}
