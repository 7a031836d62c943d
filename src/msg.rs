//! The request/response protocol spoken between vehicles and an
//! intersection manager.
//!
//! Messages are immutable values. Each direction has its own body type,
//! matched exhaustively by the receiving side. The bit sizes are pure
//! instrumentation for communication statistics and have no effect on
//! behaviour.

use crate::{ImId, LaneId, Vin};
use smallvec::SmallVec;

/// Size of an integer field in bits.
const INTEGER_SIZE: u32 = 32;
/// Size of a floating point field in bits.
const DOUBLE_SIZE: u32 = 64;
/// Size of an enum tag in bits.
const ENUM_SIZE: u32 = 32;

/// Bits common to every message: a type tag and the two endpoint IDs.
const HEADER_SIZE: u32 = ENUM_SIZE + 2 * INTEGER_SIZE;

/// A candidate timed trajectory through the intersection.
///
/// Immutable once created by the vehicle. The departure time and velocity
/// are the vehicle's own estimates; the departure velocity also caps the
/// speed the reservation check will allow through the turn. The exact
/// times granted are reported back in [Confirm].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proposal {
    /// The lane in which the vehicle will arrive at the intersection.
    pub arrival_lane: LaneId,
    /// When the vehicle plans to arrive, in s.
    pub arrival_time: f64,
    /// The velocity at which the vehicle plans to arrive, in m/s.
    pub arrival_velocity: f64,
    /// The lane in which the vehicle will leave the intersection.
    pub departure_lane: LaneId,
    /// When the vehicle estimates it will leave, in s.
    pub departure_time: f64,
    /// The maximum velocity through the turn, in m/s.
    pub departure_velocity: f64,
}

impl Proposal {
    fn size_bits() -> u32 {
        2 * INTEGER_SIZE + 4 * DOUBLE_SIZE
    }
}

/// The physical attributes of a vehicle relevant to a reservation check.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleSpec {
    /// The vehicle length in m.
    pub length: f64,
    /// The vehicle width in m.
    pub width: f64,
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acceleration: f64,
    /// The maximum deceleration of the vehicle, a negative number in m/s^2.
    pub max_deceleration: f64,
}

impl VehicleSpec {
    /// The distance the vehicle needs to stop from the given velocity, in m.
    pub fn stopping_distance(&self, velocity: f64) -> f64 {
        if self.max_deceleration >= 0.0 {
            return 0.0;
        }
        velocity * velocity / (2.0 * -self.max_deceleration)
    }

    fn size_bits() -> u32 {
        4 * DOUBLE_SIZE
    }
}

/// Reasons an intersection manager rejects a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reason {
    /// No conflict-free path through the intersection exists for any proposal.
    NoClearPath,
    /// The vehicle already holds a confirmed reservation.
    ConfirmedAnotherRequest,
    /// Every proposal's arrival time is already in the past.
    ArrivalTimeTooLate,
    /// Every proposal's arrival time is too far in the future.
    ArrivalTimeTooLarge,
    /// The vehicle communicated before its cool-down expired.
    BeforeNextAllowedComm,
}

/// A message from a vehicle to an intersection manager.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct V2iMessage {
    /// The sending vehicle.
    pub vin: Vin,
    /// The receiving intersection manager.
    pub im_id: ImId,
    pub body: V2iBody,
}

/// The payload of a vehicle-to-intersection message.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum V2iBody {
    /// Request a reservation, offering alternative proposals in
    /// preference order.
    Request {
        request_id: u32,
        spec: VehicleSpec,
        proposals: SmallVec<[Proposal; 4]>,
    },
    /// Give up a currently held reservation without using it.
    Cancel { reservation_id: Vin },
    /// Report that the vehicle has finished traversing the intersection.
    Done { reservation_id: Vin },
    /// Request entry into the admission control zone of an exit lane.
    AczRequest {
        lane: LaneId,
        vehicle_length: f64,
        stopping_distance: f64,
        /// When the vehicle expects to leave the zone, in s.
        expected_exit_time: f64,
    },
    /// Cancel a previous [V2iBody::AczRequest].
    AczCancel { lane: LaneId },
    /// Report that the vehicle has entered the admission control zone.
    AczEntered { lane: LaneId },
    /// Report that the vehicle has driven out of the end of the zone.
    AczExit { lane: LaneId },
    /// Report that the vehicle has left the zone's lane.
    Away { lane: LaneId },
}

impl V2iMessage {
    /// The size of this message in bits.
    pub fn size_bits(&self) -> u32 {
        let body = match &self.body {
            V2iBody::Request { proposals, .. } => {
                INTEGER_SIZE
                    + VehicleSpec::size_bits()
                    + proposals.len() as u32 * Proposal::size_bits()
            }
            V2iBody::Cancel { .. } | V2iBody::Done { .. } => INTEGER_SIZE,
            V2iBody::AczRequest { .. } => INTEGER_SIZE + 3 * DOUBLE_SIZE,
            V2iBody::AczCancel { .. }
            | V2iBody::AczEntered { .. }
            | V2iBody::AczExit { .. }
            | V2iBody::Away { .. } => INTEGER_SIZE,
        };
        HEADER_SIZE + body
    }
}

/// The parameters of an accepted reservation, reported back to the vehicle.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Confirm {
    /// The handle to quote in [V2iBody::Cancel] and [V2iBody::Done].
    pub reservation_id: Vin,
    /// The request this confirmation answers.
    pub request_id: u32,
    /// The exact arrival time granted, in s.
    pub arrival_time: f64,
    /// The arrival velocity granted, in m/s.
    pub arrival_velocity: f64,
    /// The computed exit time, in s.
    pub exit_time: f64,
    /// The computed exit velocity, in m/s.
    pub exit_velocity: f64,
    pub arrival_lane: LaneId,
    pub departure_lane: LaneId,
    /// Length of the admission control zone hold granted on the
    /// departure lane, in m.
    pub acz_distance: f64,
    /// Piecewise `(acceleration, duration)` profile to follow through
    /// the intersection.
    pub accel_profile: Vec<(f64, f64)>,
}

/// A message from an intersection manager to a vehicle.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct I2vMessage {
    /// The sending intersection manager.
    pub im_id: ImId,
    /// The receiving vehicle.
    pub vin: Vin,
    pub body: I2vBody,
}

/// The payload of an intersection-to-vehicle message.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum I2vBody {
    /// The request was accepted.
    Confirm(Confirm),
    /// The request was denied.
    Reject {
        request_id: u32,
        /// The earliest time at which the vehicle may send another request.
        next_allowed_time: f64,
        reason: Reason,
    },
    /// Entry into the admission control zone was granted.
    AczConfirm { lane: LaneId },
    /// Entry into the admission control zone was denied.
    AczReject { lane: LaneId },
}

impl I2vMessage {
    /// The size of this message in bits.
    pub fn size_bits(&self) -> u32 {
        let body = match &self.body {
            I2vBody::Confirm(confirm) => {
                4 * INTEGER_SIZE
                    + (5 + 2 * confirm.accel_profile.len() as u32) * DOUBLE_SIZE
            }
            I2vBody::Reject { .. } => INTEGER_SIZE + DOUBLE_SIZE + ENUM_SIZE,
            I2vBody::AczConfirm { .. } | I2vBody::AczReject { .. } => INTEGER_SIZE,
        };
        HEADER_SIZE + body
    }
}
