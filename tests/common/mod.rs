//! Shared scenario plumbing: a four-way crossing and message builders.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use intersection_sim::math::Point2d;
use intersection_sim::{
    GridConfig, I2vBody, I2vMessage, IntersectionManager, LaneId, Policy, Proposal, Reason,
    TrackModel, V2iBody, V2iMessage, VehicleSpec, Vin,
};

/// The lanes of the test crossing.
pub struct Crossing {
    /// Eastbound lane through the middle of the footprint.
    pub east: LaneId,
    /// Northbound lane crossing it.
    pub north: LaneId,
}

/// Builds a 10 m x 10 m crossing with one eastbound and one northbound
/// lane, conflicting in the centre.
pub fn crossing() -> (TrackModel, Crossing) {
    let mut track = TrackModel::new(Point2d::new(0.0, 0.0), Point2d::new(10.0, 10.0), 1.0);
    let east_west = track.add_road("east-west");
    let north_south = track.add_road("north-south");
    let east = track.add_lane(east_west, Point2d::new(0.0, 4.5), Point2d::new(10.0, 4.5));
    let north = track.add_lane(north_south, Point2d::new(5.5, 0.0), Point2d::new(5.5, 10.0));
    (track, Crossing { east, north })
}

/// An intersection manager over the test crossing.
pub fn manager(policy: Policy) -> (IntersectionManager, Crossing) {
    let (track, lanes) = crossing();
    (
        IntersectionManager::new(0, track, GridConfig::default(), policy),
        lanes,
    )
}

pub fn vehicle_spec() -> VehicleSpec {
    VehicleSpec {
        length: 5.0,
        width: 2.0,
        max_acceleration: 2.0,
        max_deceleration: -4.0,
    }
}

/// A constant-velocity proposal crossing on a single lane.
pub fn proposal(lane: LaneId, arrival_time: f64) -> Proposal {
    Proposal {
        arrival_lane: lane,
        arrival_time,
        arrival_velocity: 10.0,
        departure_lane: lane,
        departure_time: arrival_time + 1.5,
        departure_velocity: 10.0,
    }
}

pub fn request(vin: Vin, request_id: u32, proposals: Vec<Proposal>) -> V2iMessage {
    V2iMessage {
        vin,
        im_id: 0,
        body: V2iBody::Request {
            request_id,
            spec: vehicle_spec(),
            proposals: proposals.into_iter().collect(),
        },
    }
}

/// Delivers a message and advances one step, returning the replies.
pub fn exchange(im: &mut IntersectionManager, msg: V2iMessage, dt: f64) -> Vec<I2vMessage> {
    im.receive(msg);
    im.act(dt);
    im.drain_outbox()
}

/// The single reply expected for a vehicle, by VIN.
pub fn reply_for(messages: &[I2vMessage], vin: Vin) -> &I2vMessage {
    let mut found = messages.iter().filter(|m| m.vin == vin);
    let reply = found.next().expect("no reply for vehicle");
    assert!(found.next().is_none(), "more than one reply for vehicle");
    reply
}

/// Unpacks a rejection, failing the test on any other reply.
pub fn expect_reject(msg: &I2vMessage) -> (u32, f64, Reason) {
    match &msg.body {
        I2vBody::Reject {
            request_id,
            next_allowed_time,
            reason,
        } => (*request_id, *next_allowed_time, *reason),
        other => panic!("expected a rejection, got {other:?}"),
    }
}

/// Unpacks a confirmation, failing the test on any other reply.
pub fn expect_confirm(msg: &I2vMessage) -> &intersection_sim::Confirm {
    match &msg.body {
        I2vBody::Confirm(confirm) => confirm,
        other => panic!("expected a confirmation, got {other:?}"),
    }
}
