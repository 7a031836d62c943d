//! The intersection manager: one authority governing reservations for
//! one intersection.

use crate::msg::{I2vMessage, V2iMessage};
use crate::policy::Policy;
use crate::reservation::{AdmissionZone, GridConfig, GridManager};
use crate::track::TrackModel;
use crate::{ImId, LaneId, Vin};
use slotmap::SecondaryMap;

/// The default capacity of each exit lane's admission control zone, in m.
const DEFAULT_ACZ_SIZE: f64 = 40.0;

/// Everything the policy needs from its intersection manager: identity,
/// the clock, the geometry, the reservation state, and the outbox.
///
/// The context is owned by exactly one [IntersectionManager] and passed
/// by mutable reference into every policy call, so a feasibility check
/// followed by a commit is observed as a single atomic unit without a
/// lock.
pub struct ImContext {
    id: ImId,
    time: f64,
    track: TrackModel,
    grid: GridManager,
    aczs: SecondaryMap<LaneId, AdmissionZone>,
    outbox: Vec<I2vMessage>,
    bits_received: u64,
    bits_transmitted: u64,
}

impl ImContext {
    /// The identity of this intersection manager.
    pub fn id(&self) -> ImId {
        self.id
    }

    /// The current simulation time, in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The intersection geometry.
    pub fn track(&self) -> &TrackModel {
        &self.track
    }

    /// The reservation grid manager.
    pub fn grid(&self) -> &GridManager {
        &self.grid
    }

    /// Mutable access to the reservation grid manager.
    pub fn grid_mut(&mut self) -> &mut GridManager {
        &mut self.grid
    }

    /// The admission control zone of an exit lane.
    pub fn acz(&self, lane: LaneId) -> Option<&AdmissionZone> {
        self.aczs.get(lane)
    }

    /// Mutable access to the admission control zone of an exit lane.
    pub fn acz_mut(&mut self, lane: LaneId) -> Option<&mut AdmissionZone> {
        self.aczs.get_mut(lane)
    }

    /// Queues an outgoing message and counts its bits.
    pub fn send(&mut self, msg: I2vMessage) {
        self.bits_transmitted += msg.size_bits() as u64;
        self.outbox.push(msg);
    }

    /// Whether the vehicle holds a grid reservation.
    pub fn has_grid_reservation(&self, vin: Vin) -> bool {
        self.grid.has_reservation(vin)
    }

    pub(crate) fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub(crate) fn outbox_tail_mut(&mut self, from: usize) -> &mut [I2vMessage] {
        &mut self.outbox[from..]
    }
}

/// An intersection manager: the context plus the policy deciding over it.
pub struct IntersectionManager {
    ctx: ImContext,
    policy: Policy,
    inbox: Vec<V2iMessage>,
}

impl IntersectionManager {
    /// Creates an intersection manager governing the given geometry.
    ///
    /// An admission control zone of the default capacity is attached to
    /// every lane's exit.
    pub fn new(id: ImId, track: TrackModel, config: GridConfig, mut policy: Policy) -> Self {
        let grid = GridManager::new(config, track.tiled_area().len());
        let mut aczs = SecondaryMap::new();
        for (lane, _) in track.lanes() {
            aczs.insert(lane, AdmissionZone::new(DEFAULT_ACZ_SIZE));
        }
        policy.set_initial_time(0.0);
        Self {
            ctx: ImContext {
                id,
                time: 0.0,
                track,
                grid,
                aczs,
                outbox: Vec::new(),
                bits_received: 0,
                bits_transmitted: 0,
            },
            policy,
            inbox: Vec::new(),
        }
    }

    /// The manager's context.
    pub fn ctx(&self) -> &ImContext {
        &self.ctx
    }

    /// The active policy.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Replaces the active policy.
    pub fn set_policy(&mut self, mut policy: Policy) {
        policy.set_initial_time(self.ctx.time);
        self.policy = policy;
    }

    /// Delivers a message to the manager's inbox and counts its bits.
    pub fn receive(&mut self, msg: V2iMessage) {
        self.ctx.bits_received += msg.size_bits() as u64;
        self.inbox.push(msg);
    }

    /// Advances the simulation by `dt` seconds: processes the inbox,
    /// lets the policy act, runs grid housekeeping, then advances time.
    pub fn act(&mut self, dt: f64) {
        for msg in std::mem::take(&mut self.inbox) {
            self.policy.process_message(&mut self.ctx, &msg);
        }
        self.policy.act(&mut self.ctx, dt);
        self.ctx.grid.act(dt);
        crate::debug::debug_reserved_tiles(&self.ctx);
        self.ctx.time += dt;
    }

    /// Takes this step's outgoing messages.
    pub fn drain_outbox(&mut self) -> Vec<I2vMessage> {
        std::mem::take(&mut self.ctx.outbox)
    }

    /// The number of bits received from vehicles.
    pub fn bits_received(&self) -> u64 {
        self.ctx.bits_received
    }

    /// The number of bits transmitted to vehicles.
    pub fn bits_transmitted(&self) -> u64 {
        self.ctx.bits_transmitted
    }
}
