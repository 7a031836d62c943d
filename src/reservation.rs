//! Space-time reservation of the intersection.
//!
//! [ReservationGrid] holds the committed claims, [GridManager] turns
//! traversal queries into claimable plans, and [AdmissionZone] is the
//! coarser admission gate on each exit lane.

pub use acz::AdmissionZone;
pub use grid::{ReservationGrid, TileTime};
pub use manager::{GridConfig, GridManager, ReservationPlan, TraversalQuery};

mod acz;
mod grid;
mod manager;
