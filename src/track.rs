//! The intersection geometry consumed by the reservation subsystem.
//!
//! A [TrackModel] knows the intersection's footprint, the lanes entering
//! and leaving it, and the tile partition used for conflict checking. It
//! translates a proposal's lane pair into the straight path a vehicle
//! follows across the footprint.

use crate::math::{OrientedRect, Point2d, Vector2d};
use crate::{LaneId, LaneSet, RoadId};
use cgmath::prelude::*;
use slotmap::SlotMap;
use smallvec::SmallVec;

/// Index of a tile within a [TiledArea].
pub type TileId = usize;

/// A single lane crossing the intersection.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The road this lane belongs to.
    road: RoadId,
    /// Where the lane's centre line enters the intersection footprint.
    entry: Point2d,
    /// Where the lane's centre line leaves the intersection footprint.
    exit: Point2d,
}

impl Lane {
    /// The road this lane belongs to.
    pub fn road(&self) -> RoadId {
        self.road
    }

    /// The entry point on the footprint boundary.
    pub fn entry(&self) -> Point2d {
        self.entry
    }

    /// The exit point on the footprint boundary.
    pub fn exit(&self) -> Point2d {
        self.exit
    }
}

/// A road, grouping the lanes that approach from one direction.
#[derive(Clone, Debug)]
pub struct Road {
    name: String,
}

impl Road {
    /// The display name of the road.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The straight path a traversal follows across the footprint.
#[derive(Clone, Copy, Debug)]
pub struct Traversal {
    /// The point at which the vehicle's front enters the footprint.
    pub start: Point2d,
    /// Unit direction of travel.
    pub direction: Vector2d,
    /// Distance from `start` to the departure lane's exit point, in m.
    pub distance: f64,
}

impl Traversal {
    /// The position of a vehicle's centre after its front has travelled
    /// `pos` metres from the entry point.
    pub fn centre_at(&self, pos: f64, half_len: f64) -> Point2d {
        self.start + (pos - half_len) * self.direction
    }
}

/// A fixed-resolution partition of the intersection footprint into
/// square tiles.
#[derive(Clone, Debug)]
pub struct TiledArea {
    /// The lower-left corner of the footprint.
    origin: Point2d,
    /// The side length of a tile, in m.
    tile_size: f64,
    /// The number of tiles in the x direction.
    xnum: usize,
    /// The number of tiles in the y direction.
    ynum: usize,
}

impl TiledArea {
    /// Partitions the rectangle from `min` to `max` into square tiles of
    /// side `granularity`.
    pub fn new(min: Point2d, max: Point2d, granularity: f64) -> Self {
        assert!(granularity > 0.0, "tile granularity must be positive");
        let xnum = ((max.x - min.x) / granularity).ceil().max(1.0) as usize;
        let ynum = ((max.y - min.y) / granularity).ceil().max(1.0) as usize;
        Self {
            origin: min,
            tile_size: granularity,
            xnum,
            ynum,
        }
    }

    /// The number of tiles in the x direction.
    pub fn xnum(&self) -> usize {
        self.xnum
    }

    /// The number of tiles in the y direction.
    pub fn ynum(&self) -> usize {
        self.ynum
    }

    /// The total number of tiles.
    pub fn len(&self) -> usize {
        self.xnum * self.ynum
    }

    /// Returns true if the area contains no tiles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tile ID at the given tile coordinate.
    pub fn tile_id(&self, x: usize, y: usize) -> TileId {
        x + y * self.xnum
    }

    /// The x coordinate of a tile.
    pub fn tile_x(&self, id: TileId) -> usize {
        id % self.xnum
    }

    /// The y coordinate of a tile.
    pub fn tile_y(&self, id: TileId) -> usize {
        id / self.xnum
    }

    /// Returns true if the tile lies on the boundary of the footprint.
    pub fn is_edge_tile(&self, id: TileId) -> bool {
        let x = self.tile_x(id);
        let y = self.tile_y(id);
        x == 0 || y == 0 || x == self.xnum - 1 || y == self.ynum - 1
    }

    /// The axis-aligned bounds of a tile as `(min, max)` points.
    pub fn tile_bounds(&self, id: TileId) -> (Point2d, Point2d) {
        let x = self.tile_x(id) as f64;
        let y = self.tile_y(id) as f64;
        let min = Point2d::new(
            self.origin.x + x * self.tile_size,
            self.origin.y + y * self.tile_size,
        );
        (min, min + Vector2d::new(self.tile_size, self.tile_size))
    }

    /// Finds the tiles overlapped by the given footprint rectangle.
    pub fn occupied_tiles(&self, footprint: &OrientedRect) -> SmallVec<[TileId; 16]> {
        let (min, max) = footprint.bounds();
        let x0 = ((min.x - self.origin.x) / self.tile_size).floor().max(0.0) as usize;
        let y0 = ((min.y - self.origin.y) / self.tile_size).floor().max(0.0) as usize;
        let x1 = (((max.x - self.origin.x) / self.tile_size).ceil() as usize).min(self.xnum);
        let y1 = (((max.y - self.origin.y) / self.tile_size).ceil() as usize).min(self.ynum);

        let mut out = SmallVec::new();
        for y in y0..y1 {
            for x in x0..x1 {
                let id = self.tile_id(x, y);
                let bounds = self.tile_bounds(id);
                if footprint.intersects_aabb(bounds.0, bounds.1) {
                    out.push(id);
                }
            }
        }
        out
    }
}

/// The geometry of one intersection.
#[derive(Clone, Debug)]
pub struct TrackModel {
    /// The lanes crossing the intersection.
    lanes: LaneSet,
    /// The roads the lanes belong to.
    roads: SlotMap<RoadId, Road>,
    /// The tile partition of the footprint.
    tiled: TiledArea,
}

impl TrackModel {
    /// Creates a track model for the footprint from `min` to `max`,
    /// partitioned into tiles of side `granularity` metres.
    pub fn new(min: Point2d, max: Point2d, granularity: f64) -> Self {
        Self {
            lanes: SlotMap::with_key(),
            roads: SlotMap::with_key(),
            tiled: TiledArea::new(min, max, granularity),
        }
    }

    /// Registers a road.
    pub fn add_road(&mut self, name: &str) -> RoadId {
        self.roads.insert(Road {
            name: name.to_string(),
        })
    }

    /// Registers a lane belonging to `road`, entering the footprint at
    /// `entry` and leaving it at `exit`.
    pub fn add_lane(&mut self, road: RoadId, entry: Point2d, exit: Point2d) -> LaneId {
        self.lanes.insert(Lane { road, entry, exit })
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    /// Returns an iterator over all the lanes.
    pub fn lanes(&self) -> impl Iterator<Item = (LaneId, &Lane)> {
        self.lanes.iter()
    }

    /// The road a lane belongs to.
    pub fn road_of(&self, lane: LaneId) -> Option<RoadId> {
        self.lanes.get(lane).map(|l| l.road)
    }

    /// Gets a reference to the road with the given ID.
    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    /// The tile partition of the footprint.
    pub fn tiled_area(&self) -> &TiledArea {
        &self.tiled
    }

    /// The straight path from the arrival lane's entry point to the
    /// departure lane's exit point. Returns `None` if either lane is
    /// unknown or the pair has no extent.
    pub fn traversal(&self, arrival: LaneId, departure: LaneId) -> Option<Traversal> {
        let start = self.lanes.get(arrival)?.entry;
        let end = self.lanes.get(departure)?.exit;
        let span = end - start;
        let distance = span.magnitude();
        if distance <= 0.0 {
            return None;
        }
        Some(Traversal {
            start,
            direction: span / distance,
            distance,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tile_ids_round_trip() {
        let tiled = TiledArea::new(Point2d::new(0.0, 0.0), Point2d::new(12.0, 8.0), 2.0);
        assert_eq!(tiled.xnum(), 6);
        assert_eq!(tiled.ynum(), 4);
        for id in 0..tiled.len() {
            assert_eq!(tiled.tile_id(tiled.tile_x(id), tiled.tile_y(id)), id);
        }
    }

    #[test]
    fn edge_tiles() {
        let tiled = TiledArea::new(Point2d::new(0.0, 0.0), Point2d::new(6.0, 6.0), 2.0);
        assert!(tiled.is_edge_tile(tiled.tile_id(0, 1)));
        assert!(tiled.is_edge_tile(tiled.tile_id(1, 0)));
        assert!(tiled.is_edge_tile(tiled.tile_id(2, 2)));
        assert!(!tiled.is_edge_tile(tiled.tile_id(1, 1)));
    }

    #[test]
    fn footprint_covers_expected_tiles() {
        let tiled = TiledArea::new(Point2d::new(0.0, 0.0), Point2d::new(10.0, 10.0), 1.0);
        let footprint = OrientedRect {
            centre: Point2d::new(5.0, 5.0),
            axis: Vector2d::new(1.0, 0.0),
            half_len: 2.0,
            half_wid: 1.0,
        };
        let tiles = tiled.occupied_tiles(&footprint);
        // 4 x 2 metre rectangle centred on a tile corner grid: 4 columns, 2 rows.
        assert_eq!(tiles.len(), 8);
    }

    #[test]
    fn traversal_is_unit_speed_parametrised() {
        let mut track = TrackModel::new(Point2d::new(0.0, 0.0), Point2d::new(10.0, 10.0), 1.0);
        let road = track.add_road("southbound");
        let a = track.add_lane(road, Point2d::new(0.0, 5.0), Point2d::new(10.0, 5.0));
        let t = track.traversal(a, a).unwrap();
        assert_eq!(t.distance, 10.0);
        assert_eq!(t.centre_at(3.0, 2.5), Point2d::new(0.5, 5.0));
    }
}
