pub use batch::{BatchHandler, IndexedProposal, ProposalQueue, Reordering};
pub use im::{ImContext, IntersectionManager};
pub use msg::{Confirm, I2vBody, I2vMessage, Proposal, Reason, V2iBody, V2iMessage, VehicleSpec};
pub use policy::{
    AllStopPolicy, BasePolicy, CyclicSignal, Policy, RequestHandler, ReserveParam, Signal,
    SignalHandler, TimeoutMode, TimeoutPolicy,
};
pub use reservation::{
    AdmissionZone, GridConfig, GridManager, ReservationGrid, ReservationPlan, TileTime,
    TraversalQuery,
};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use stats::PolicyStats;
pub use timing::{TimingTable, DEFAULT_RED_DURATION};
pub use track::{Lane, Road, TileId, TiledArea, TrackModel, Traversal};
pub use util::Interval;

mod batch;
mod debug;
mod im;
pub mod math;
mod msg;
mod policy;
mod reservation;
mod stats;
mod timing;
mod track;
mod util;

new_key_type! {
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a road (the group of lanes approaching from one direction).
    pub struct RoadId;
}

/// Vehicle identification number, assigned by the out-of-scope vehicle layer.
pub type Vin = u32;

/// Unique ID of an [IntersectionManager].
pub type ImId = u32;

type LaneSet = SlotMap<LaneId, track::Lane>;
