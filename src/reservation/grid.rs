//! The discretised space-time reservation table.

use crate::track::TileId;
use crate::Vin;
use std::collections::{BTreeMap, HashMap};

/// Run the reservation table clean-up once per this many grid steps.
const CLEAN_UP_PERIOD: i64 = 30;

/// One reservable cell: a tile at a discrete time step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileTime {
    /// The discrete time step.
    pub time: i64,
    /// The tile.
    pub tile: TileId,
}

/// The reservation grid: for every tile, an ordered schedule of the
/// discrete time steps at which it is claimed, and by whom.
///
/// Claims are committed and released per vehicle, all cells at once.
/// No cell is ever held by two vehicles; [ReservationGrid::reserve]
/// refuses the whole batch rather than claim a subset.
#[derive(Clone, Debug)]
pub struct ReservationGrid {
    /// Per-tile schedule, keyed by discrete time.
    tiles: Vec<BTreeMap<i64, Vin>>,
    /// The cells currently claimed by each vehicle.
    by_vin: HashMap<Vin, Vec<TileTime>>,
    /// The duration of one discrete time step, in s.
    time_step: f64,
    /// The grid step at which clean-up last ran.
    last_clean_up: i64,
}

impl ReservationGrid {
    /// Creates a grid over `tile_count` tiles with the given discrete
    /// time step.
    pub fn new(tile_count: usize, time_step: f64) -> Self {
        assert!(time_step > 0.0, "grid time step must be positive");
        Self {
            tiles: vec![BTreeMap::new(); tile_count],
            by_vin: HashMap::new(),
            time_step,
            last_clean_up: 0,
        }
    }

    /// The duration of one discrete time step, in s.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// The number of tiles in the grid.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// The largest discrete time that is not after the given time.
    pub fn discrete_time(&self, time: f64) -> i64 {
        (time / self.time_step).floor() as i64
    }

    /// The remainder of `time` beyond its discrete time step.
    pub fn remaining_time(&self, time: f64) -> f64 {
        time - self.time_step * self.discrete_time(time) as f64
    }

    /// The continuous time of a discrete time step.
    pub fn time_of(&self, discrete: i64) -> f64 {
        discrete as f64 * self.time_step
    }

    /// Returns true if the cell is claimed by any vehicle.
    pub fn is_reserved(&self, time: i64, tile: TileId) -> bool {
        self.tiles[tile].contains_key(&time)
    }

    /// Claims every cell for `vin`, or none of them.
    ///
    /// Returns false and leaves the grid untouched if any cell is
    /// already claimed by another vehicle.
    pub fn reserve(&mut self, vin: Vin, cells: &[TileTime]) -> bool {
        let conflict = cells
            .iter()
            .any(|c| matches!(self.tiles[c.tile].get(&c.time), Some(holder) if *holder != vin));
        if conflict {
            return false;
        }
        let held = self.by_vin.entry(vin).or_default();
        for c in cells {
            if self.tiles[c.tile].insert(c.time, vin).is_none() {
                held.push(*c);
            }
        }
        true
    }

    /// Releases every cell claimed by `vin`. Releasing a vehicle with no
    /// claims is a no-op.
    pub fn cancel(&mut self, vin: Vin) {
        if let Some(cells) = self.by_vin.remove(&vin) {
            for c in cells {
                self.tiles[c.tile].remove(&c.time);
            }
        }
    }

    /// Returns true if the vehicle currently claims any cell.
    pub fn has_reservation(&self, vin: Vin) -> bool {
        self.by_vin.contains_key(&vin)
    }

    /// Discards claims that lie entirely in the past. Runs at most once
    /// per [CLEAN_UP_PERIOD] grid steps.
    pub fn clean_up(&mut self, now: f64) {
        let discrete_now = self.discrete_time(now);
        if discrete_now - self.last_clean_up < CLEAN_UP_PERIOD {
            return;
        }
        self.last_clean_up = discrete_now;
        for schedule in &mut self.tiles {
            *schedule = schedule.split_off(&discrete_now);
        }
        self.by_vin.retain(|_, cells| {
            cells.retain(|c| c.time >= discrete_now);
            !cells.is_empty()
        });
    }

    /// The tiles claimed at the given time.
    pub fn reserved_tiles_at(&self, time: f64) -> Vec<TileId> {
        let discrete = self.discrete_time(time);
        (0..self.tiles.len())
            .filter(|tile| self.tiles[*tile].contains_key(&discrete))
            .collect()
    }

    /// The vehicles holding claims at the given time.
    pub fn vins_at(&self, time: f64) -> Vec<Vin> {
        let discrete = self.discrete_time(time);
        let mut vins: Vec<Vin> = self
            .tiles
            .iter()
            .filter_map(|schedule| schedule.get(&discrete).copied())
            .collect();
        vins.sort_unstable();
        vins.dedup();
        vins
    }

    /// The last time at which any cell is claimed, or `None` if the grid
    /// is empty.
    pub fn last_reserved_time(&self) -> Option<f64> {
        self.tiles
            .iter()
            .filter_map(|schedule| schedule.keys().next_back())
            .max()
            .map(|discrete| self.time_of(*discrete))
    }
}
