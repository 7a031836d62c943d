//! Policy-variant scenarios: all-stop and signal-restricted.

mod common;

use assert_approx_eq::assert_approx_eq;
use common::*;
use intersection_sim::{
    AllStopPolicy, BasePolicy, CyclicSignal, GridConfig, IntersectionManager, Policy, Reason,
    RequestHandler, SignalHandler, TimingTable, V2iBody, V2iMessage,
};

#[test]
fn all_stop_rejects_everything() {
    let (mut im, lanes) = manager(Policy::AllStop(AllStopPolicy::new()));

    for (vin, arrival) in [(1, 5.0), (2, 8.0), (3, 2.5)] {
        let replies = exchange(&mut im, request(vin, 0, vec![proposal(lanes.east, arrival)]), 0.1);
        let (_, next_allowed, reason) = expect_reject(reply_for(&replies, vin));
        assert_eq!(reason, Reason::NoClearPath);
        // The retry hint is the current time: asking again immediately
        // is allowed.
        assert_approx_eq!(next_allowed, im.ctx().time() - 0.1);
    }
    let stats = im.policy().stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.rejects, 3);
    assert_eq!(stats.confirms, 0);
}

#[test]
fn all_stop_ignores_non_requests() {
    let (mut im, lanes) = manager(Policy::AllStop(AllStopPolicy::new()));
    let done = V2iMessage {
        vin: 1,
        im_id: 0,
        body: V2iBody::Done { reservation_id: 1 },
    };
    assert!(exchange(&mut im, done, 0.1).is_empty());
    let away = V2iMessage {
        vin: 1,
        im_id: 0,
        body: V2iBody::Away { lane: lanes.east },
    };
    assert!(exchange(&mut im, away, 0.1).is_empty());
}

fn signal_manager() -> (IntersectionManager, Crossing) {
    let (track, lanes) = crossing();
    let mut handler = SignalHandler::new();
    // Eastbound: green for 4 s out of every 10.
    handler.set_controller(lanes.east, CyclicSignal::two_phase(4.0, 6.0, 0.0));
    let policy = Policy::Base(BasePolicy::new(RequestHandler::Signal(handler)));
    (
        IntersectionManager::new(0, track, GridConfig::default(), policy),
        lanes,
    )
}

#[test]
fn signal_admits_green_arrivals() {
    let (mut im, lanes) = signal_manager();
    for _ in 0..10 {
        im.act(0.1);
    }
    // 10.5 lands at 0.5 into the cycle: green.
    let replies = exchange(&mut im, request(1, 0, vec![proposal(lanes.east, 10.5)]), 0.1);
    let confirm = expect_confirm(reply_for(&replies, 1));
    assert_approx_eq!(confirm.arrival_time, 10.5);
}

#[test]
fn signal_rejects_red_arrivals() {
    let (mut im, lanes) = signal_manager();
    for _ in 0..41 {
        im.act(0.1);
    }
    // 14.0 lands at 4.0 into the cycle: red.
    let replies = exchange(&mut im, request(1, 0, vec![proposal(lanes.east, 14.0)]), 0.1);
    let (_, _, reason) = expect_reject(reply_for(&replies, 1));
    assert_eq!(reason, Reason::NoClearPath);
}

#[test]
fn signal_skips_to_a_green_alternative() {
    let (mut im, lanes) = signal_manager();
    for _ in 0..41 {
        im.act(0.1);
    }
    // Red at 14.0, green again at 20.5.
    let alternatives = vec![proposal(lanes.east, 14.0), proposal(lanes.east, 12.5)];
    let replies = exchange(&mut im, request(1, 0, alternatives), 0.1);
    let confirm = expect_confirm(reply_for(&replies, 1));
    assert_approx_eq!(confirm.arrival_time, 12.5);
}

#[test]
fn uncontrolled_lanes_stay_closed() {
    let (mut im, lanes) = signal_manager();
    for _ in 0..10 {
        im.act(0.1);
    }
    // The northbound lane has no controller, so it is treated as red.
    let replies = exchange(&mut im, request(1, 0, vec![proposal(lanes.north, 10.5)]), 0.1);
    let (_, _, reason) = expect_reject(reply_for(&replies, 1));
    assert_eq!(reason, Reason::NoClearPath);
}

#[test]
fn tuned_red_duration_drives_the_cycle() {
    let table = TimingTable::from_csv_str(
        "0.2,0.0,1.5\n\
         0.6,0.3,3.5\n",
    );
    let red = table.red_duration(0.55, 0.25);
    assert_approx_eq!(red, 3.5);
    let signal = CyclicSignal::two_phase(4.0, red, 0.0);
    assert_approx_eq!(signal.cycle_length(), 7.5);
}
