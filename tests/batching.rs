//! Scenarios exercising the batching layer through the manager.

mod common;

use common::*;
use intersection_sim::{
    BasePolicy, BatchHandler, I2vBody, Policy, Reason, Reordering, RequestHandler,
};

fn batching_manager() -> (intersection_sim::IntersectionManager, Crossing) {
    let handler = RequestHandler::Batch(BatchHandler::new(Reordering::RoadBased));
    manager(Policy::Base(BasePolicy::new(handler)))
}

/// Steps the manager to the given time in 0.5 s ticks, collecting
/// every reply sent along the way.
fn run_until(
    im: &mut intersection_sim::IntersectionManager,
    until: f64,
) -> Vec<intersection_sim::I2vMessage> {
    let mut replies = Vec::new();
    while im.ctx().time() < until {
        im.act(0.5);
        replies.extend(im.drain_outbox());
    }
    replies
}

#[test]
fn queued_request_waits_for_its_batch() {
    let (mut im, lanes) = batching_manager();
    // First processing time is 2.0, deadline 2.05; arrival 5.2 is on time.
    im.receive(request(1, 0, vec![proposal(lanes.east, 5.2)]));
    im.act(0.5);
    assert!(im.drain_outbox().is_empty(), "queued request answered early");

    // The batch at t=2.0 covers arrivals in [5.0, 7.0).
    let replies = run_until(&mut im, 2.5);
    let confirm = expect_confirm(reply_for(&replies, 1));
    assert_eq!(confirm.reservation_id, 1);
}

#[test]
fn late_request_is_decided_immediately() {
    let (mut im, lanes) = batching_manager();
    // Arrival 1.5 is before the first deadline of 2.05.
    let replies = exchange(&mut im, request(1, 0, vec![proposal(lanes.east, 1.5)]), 0.5);
    expect_confirm(reply_for(&replies, 1));
    assert_eq!(im.policy().stats().late_requests, 1);
}

#[test]
fn new_request_supersedes_queued_one() {
    let (mut im, lanes) = batching_manager();
    im.receive(request(1, 0, vec![proposal(lanes.east, 5.2)]));
    im.act(0.5);
    im.receive(request(1, 1, vec![proposal(lanes.east, 6.4)]));
    im.act(0.5);
    assert!(im.drain_outbox().is_empty());

    let replies = run_until(&mut im, 2.5);
    // Only the superseding request is answered.
    let confirm = expect_confirm(reply_for(&replies, 1));
    assert_eq!(confirm.request_id, 1);
}

#[test]
fn conflicting_batch_members_get_one_confirm() {
    let (mut im, lanes) = batching_manager();
    im.receive(request(1, 0, vec![proposal(lanes.east, 5.2)]));
    im.receive(request(2, 0, vec![proposal(lanes.north, 5.25)]));
    im.act(0.5);
    assert!(im.drain_outbox().is_empty());

    let replies = run_until(&mut im, 2.5);
    // Road-based order: the eastbound road was registered first.
    expect_confirm(reply_for(&replies, 1));
    let (_, _, reason) = expect_reject(reply_for(&replies, 2));
    assert_eq!(reason, Reason::NoClearPath);
}

#[test]
fn compatible_batch_members_both_confirm() {
    let (mut im, lanes) = batching_manager();
    im.receive(request(1, 0, vec![proposal(lanes.east, 5.2)]));
    im.receive(request(2, 0, vec![proposal(lanes.north, 6.9)]));
    im.act(0.5);

    let replies = run_until(&mut im, 2.5);
    expect_confirm(reply_for(&replies, 1));
    expect_confirm(reply_for(&replies, 2));
    assert_eq!(im.policy().stats().confirms, 2);
    assert_eq!(im.policy().stats().queued_requests, 2);
}

#[test]
fn batch_alternatives_fall_back_within_the_queue() {
    let (mut im, lanes) = batching_manager();
    im.receive(request(1, 0, vec![proposal(lanes.east, 5.2)]));
    // Vehicle 2 offers a conflicting and a compatible alternative.
    im.receive(request(
        2,
        0,
        vec![proposal(lanes.north, 5.25), proposal(lanes.north, 6.9)],
    ));
    im.act(0.5);

    let replies = run_until(&mut im, 2.5);
    expect_confirm(reply_for(&replies, 1));
    let confirm = expect_confirm(reply_for(&replies, 2));
    assert!((confirm.arrival_time - 6.9).abs() < 1e-9);
}

#[test]
fn confirmed_vehicles_spent_alternatives_are_dropped() {
    let (mut im, lanes) = batching_manager();
    // Two alternatives in the same batch window, departing via
    // different lanes.
    im.receive(request(
        2,
        0,
        vec![proposal(lanes.east, 5.2), proposal(lanes.north, 6.4)],
    ));
    im.act(0.5);

    let replies = run_until(&mut im, 2.5);
    // Exactly one reply: the preferred alternative's confirmation.
    let confirm = expect_confirm(reply_for(&replies, 2));
    assert!((confirm.arrival_time - 5.2).abs() < 1e-9);
    assert_eq!(im.policy().stats().confirms, 1);
    assert_eq!(im.policy().stats().rejects, 0);
    // Only the winning departure lane holds zone space.
    assert!(im.ctx().acz(lanes.east).unwrap().holds_space(2));
    assert!(!im.ctx().acz(lanes.north).unwrap().holds_space(2));
}

#[test]
fn rejected_vehicle_can_retry_and_win_later() {
    let (mut im, lanes) = batching_manager();
    im.receive(request(1, 0, vec![proposal(lanes.east, 5.2)]));
    im.receive(request(2, 0, vec![proposal(lanes.north, 5.25)]));
    im.act(0.5);
    let replies = run_until(&mut im, 2.5);
    expect_reject(reply_for(&replies, 2));

    // Retry into the next batch window.
    im.receive(request(2, 1, vec![proposal(lanes.north, 7.5)]));
    let replies = run_until(&mut im, 4.5);
    let confirm = expect_confirm(reply_for(&replies, 2));
    assert_eq!(confirm.request_id, 1);
}

#[test]
fn empty_batches_only_advance_the_schedule() {
    let (mut im, _) = batching_manager();
    let replies = run_until(&mut im, 6.5);
    assert!(replies.is_empty());
    let stats = im.policy().stats();
    assert_eq!(stats.requests, 0);
    assert_eq!(stats.rejects, 0);
}

#[test]
fn confirms_and_rejects_carry_the_request_id() {
    let (mut im, lanes) = batching_manager();
    im.receive(request(1, 41, vec![proposal(lanes.east, 5.2)]));
    im.receive(request(2, 42, vec![proposal(lanes.north, 5.25)]));
    im.act(0.5);
    let replies = run_until(&mut im, 2.5);
    for reply in &replies {
        match (reply.vin, &reply.body) {
            (1, I2vBody::Confirm(c)) => assert_eq!(c.request_id, 41),
            (2, I2vBody::Reject { request_id, .. }) => assert_eq!(*request_id, 42),
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
