//! Turns traversal queries into claimable reservation plans.

use super::grid::{ReservationGrid, TileTime};
use crate::math::OrientedRect;
use crate::msg::{Proposal, VehicleSpec};
use crate::track::TrackModel;
use crate::{LaneId, Vin};
use std::collections::HashSet;

/// Bail out of a feasibility check after this many grid steps. A
/// traversal this long means the vehicle is effectively stationary.
const MAX_TRAVERSAL_STEPS: i64 = 10_000;

/// The configuration of the reservation grid manager.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridConfig {
    /// The length of a discrete time step in the grid, in s.
    pub grid_time_step: f64,
    /// The side length of a tile, in m.
    pub granularity: f64,
    /// Extra space margin around the vehicle footprint, in m.
    pub static_buffer: f64,
    /// Time margin before and after occupancy of internal tiles, in s.
    pub internal_time_buffer: f64,
    /// Time margin before and after occupancy of edge tiles, in s.
    pub edge_time_buffer: f64,
    /// Whether the separate edge tile buffer is applied.
    pub edge_buffer_enabled: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_time_step: 0.1,
            granularity: 1.0,
            static_buffer: 0.25,
            internal_time_buffer: 0.1,
            edge_time_buffer: 0.25,
            edge_buffer_enabled: true,
        }
    }
}

/// A feasibility question: can this vehicle cross on this timing?
#[derive(Clone, Copy, Debug)]
pub struct TraversalQuery {
    /// The vehicle asking.
    pub vin: Vin,
    pub arrival_lane: LaneId,
    pub arrival_time: f64,
    pub arrival_velocity: f64,
    pub departure_lane: LaneId,
    /// The velocity cap through the turn, in m/s.
    pub max_velocity: f64,
    pub spec: VehicleSpec,
    /// Whether the vehicle may accelerate during the traversal, rather
    /// than hold its arrival velocity.
    pub accelerating: bool,
}

impl TraversalQuery {
    /// Builds the query for one of a request's proposals.
    pub fn from_proposal(vin: Vin, spec: VehicleSpec, proposal: &Proposal) -> Self {
        Self {
            vin,
            arrival_lane: proposal.arrival_lane,
            arrival_time: proposal.arrival_time,
            arrival_velocity: proposal.arrival_velocity,
            departure_lane: proposal.departure_lane,
            max_velocity: proposal.departure_velocity,
            spec,
            accelerating: proposal.departure_velocity > proposal.arrival_velocity,
        }
    }
}

/// The accepted outcome of a feasible query: the cells to claim and the
/// exact timing the grid snapped the traversal to.
#[derive(Clone, Debug)]
pub struct ReservationPlan {
    /// The vehicle the plan belongs to.
    pub vin: Vin,
    /// Every tile-time cell the traversal needs, buffers included.
    pub cells: Vec<TileTime>,
    /// The time at which the vehicle's rear clears the footprint, in s.
    pub exit_time: f64,
    /// The velocity at the exit, in m/s.
    pub exit_velocity: f64,
    /// Piecewise `(acceleration, duration)` profile realising the plan.
    pub accel_profile: Vec<(f64, f64)>,
}

/// The reservation grid manager: feasibility checks against, and
/// transactional commits to, the owned [ReservationGrid].
#[derive(Clone, Debug)]
pub struct GridManager {
    config: GridConfig,
    grid: ReservationGrid,
    /// The current time, advanced by [GridManager::act].
    time: f64,
}

impl GridManager {
    /// Creates a manager over a fresh grid covering `tile_count` tiles.
    pub fn new(config: GridConfig, tile_count: usize) -> Self {
        Self {
            config,
            grid: ReservationGrid::new(tile_count, config.grid_time_step),
            time: 0.0,
        }
    }

    /// The manager's configuration.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The underlying grid.
    pub fn grid(&self) -> &ReservationGrid {
        &self.grid
    }

    /// The manager's clock.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances the clock and runs periodic grid clean-up.
    pub fn act(&mut self, dt: f64) {
        self.grid.clean_up(self.time);
        self.time += dt;
    }

    /// Returns true if the vehicle currently holds a reservation.
    pub fn has_reservation(&self, vin: Vin) -> bool {
        self.grid.has_reservation(vin)
    }

    /// Checks whether the queried traversal fits the grid.
    ///
    /// Walks the traversal path at grid-time-step resolution, collecting
    /// the cells the buffered footprint occupies. Returns `None` as soon
    /// as any needed cell is already claimed, without touching the grid.
    pub fn query(&self, track: &TrackModel, q: &TraversalQuery) -> Option<ReservationPlan> {
        let traversal = track.traversal(q.arrival_lane, q.departure_lane)?;
        let tiled = track.tiled_area();

        let accel = if q.accelerating { q.spec.max_acceleration } else { 0.0 };
        let cap = q.max_velocity.max(q.arrival_velocity);
        let mut velocity = q.arrival_velocity;
        if velocity <= 0.0 && accel <= 0.0 {
            return None;
        }

        let half_len = 0.5 * q.spec.length + self.config.static_buffer;
        let half_wid = 0.5 * q.spec.width + self.config.static_buffer;
        let internal_steps = (self.config.internal_time_buffer / self.config.grid_time_step) as i64;
        let edge_steps = (self.config.edge_time_buffer / self.config.grid_time_step) as i64;

        // The rear must clear the departure exit point.
        let clear_distance = traversal.distance + q.spec.length;

        let mut cells = Vec::new();
        let mut seen = HashSet::new();
        let mut step = self.grid.discrete_time(q.arrival_time);
        let first_step = step;
        // Advance to the next grid boundary first, full steps after that.
        let mut duration = self.grid.time_step() - self.grid.remaining_time(q.arrival_time);
        // Front-of-vehicle position along the traversal.
        let mut pos = 0.0;

        while pos < clear_distance {
            let (advance, next_velocity) = integrate(velocity, accel, cap, duration);
            pos += advance;
            velocity = next_velocity;
            step += 1;
            duration = self.grid.time_step();

            if step - first_step > MAX_TRAVERSAL_STEPS {
                return None;
            }

            let footprint = OrientedRect {
                centre: traversal.centre_at(pos, 0.5 * q.spec.length),
                axis: traversal.direction,
                half_len,
                half_wid,
            };
            for tile in tiled.occupied_tiles(&footprint) {
                let buffer = if self.config.edge_buffer_enabled && tiled.is_edge_tile(tile) {
                    edge_steps
                } else {
                    internal_steps
                };
                for time in (step - buffer)..=(step + buffer) {
                    if self.grid.is_reserved(time, tile) {
                        return None;
                    }
                    if seen.insert((time, tile)) {
                        cells.push(TileTime { time, tile });
                    }
                }
            }
        }

        let exit_time = self.grid.time_of(step);
        Some(ReservationPlan {
            vin: q.vin,
            cells,
            exit_time,
            exit_velocity: velocity,
            accel_profile: accel_profile(
                q.arrival_time,
                q.arrival_velocity,
                cap,
                q.spec.max_acceleration,
                exit_time,
                q.accelerating,
            ),
        })
    }

    /// Commits every cell of the plan at once.
    ///
    /// The plan must have come from [GridManager::query] with no commit
    /// in between; a conflict here is a core-logic bug and aborts.
    pub fn accept(&mut self, plan: &ReservationPlan) {
        let committed = self.grid.reserve(plan.vin, &plan.cells);
        assert!(
            committed,
            "reservation commit overlapped an existing claim (vin {})",
            plan.vin
        );
    }

    /// Releases exactly the cells previously committed for the vehicle.
    pub fn cancel(&mut self, vin: Vin) {
        self.grid.cancel(vin);
    }
}

/// Advances one grid step: distance covered and the velocity afterwards,
/// accelerating at `accel` up to `cap`.
fn integrate(velocity: f64, accel: f64, cap: f64, duration: f64) -> (f64, f64) {
    if accel <= 0.0 || velocity >= cap {
        return (velocity * duration, velocity);
    }
    let time_to_cap = (cap - velocity) / accel;
    if time_to_cap >= duration {
        (
            velocity * duration + 0.5 * accel * duration * duration,
            velocity + accel * duration,
        )
    } else {
        let ramp = velocity * time_to_cap + 0.5 * accel * time_to_cap * time_to_cap;
        (ramp + cap * (duration - time_to_cap), cap)
    }
}

/// The piecewise-constant acceleration profile realising the traversal.
fn accel_profile(
    arrival_time: f64,
    arrival_velocity: f64,
    cap: f64,
    max_acceleration: f64,
    exit_time: f64,
    accelerating: bool,
) -> Vec<(f64, f64)> {
    let traversal_time = exit_time - arrival_time;
    if accelerating && cap > arrival_velocity && max_acceleration > 0.0 {
        let ramp = (traversal_time).min((cap - arrival_velocity) / max_acceleration);
        let mut profile = vec![(max_acceleration, ramp)];
        if ramp < traversal_time {
            profile.push((0.0, traversal_time - ramp));
        }
        profile
    } else {
        vec![(0.0, traversal_time)]
    }
}
