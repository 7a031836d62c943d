//! The base policy: evaluates requests against the reservation grid,
//! tracks outstanding reservations, and speaks the full protocol.

use super::signal::SignalHandler;
use crate::batch::{BatchHandler, IndexedProposal};
use crate::im::ImContext;
use crate::msg::{Confirm, I2vBody, I2vMessage, Proposal, Reason, V2iBody, V2iMessage, VehicleSpec};
use crate::reservation::{ReservationPlan, TraversalQuery};
use crate::stats::PolicyStats;
use crate::util::at_least;
use crate::{LaneId, Vin};
use log::{debug, warn};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Reject proposals arriving further than this into the future, in s.
const MAXIMUM_FUTURE_RESERVATION_TIME: f64 = 10.0;

/// How the base policy evaluates the proposals of a request.
pub enum RequestHandler {
    /// Evaluate immediately, first-fit in the vehicle's preference order.
    Fcfs,
    /// As [RequestHandler::Fcfs], restricted to proposals arriving in an
    /// open signal phase.
    Signal(SignalHandler),
    /// Postpone into the batching layer.
    Batch(BatchHandler),
}

/// A reservation the policy is prepared to confirm: the winning
/// proposal, the grid plan realising it, and the admission-zone hold on
/// the departure lane.
pub struct ReserveParam {
    pub vin: Vin,
    pub proposal: Proposal,
    pub plan: ReservationPlan,
    /// Length of the vehicle, for the admission-zone hold.
    vehicle_length: f64,
    /// The departure lane whose zone admits the vehicle.
    acz_lane: LaneId,
    /// The zone length reported back to the vehicle, in m.
    acz_distance: f64,
    /// When the vehicle is expected to clear the zone, in s.
    expected_acz_exit_time: f64,
}

/// One vehicle's outstanding reservation.
struct ReservationRecord {
    departure_lane: LaneId,
}

/// The state shared by every request handler: outstanding reservations
/// and decision counters.
struct PolicyCore {
    reservations: HashMap<Vin, ReservationRecord>,
    stats: PolicyStats,
}

impl PolicyCore {
    fn new() -> Self {
        Self {
            reservations: HashMap::new(),
            stats: PolicyStats::default(),
        }
    }

    fn has_reservation(&self, vin: Vin) -> bool {
        self.reservations.contains_key(&vin)
    }

    /// Commits the reservation and tells the vehicle.
    fn send_confirm(&mut self, ctx: &mut ImContext, request_id: u32, rp: ReserveParam) {
        ctx.grid_mut().accept(&rp.plan);
        if let Some(zone) = ctx.acz_mut(rp.acz_lane) {
            zone.admit(rp.vin, rp.vehicle_length, rp.expected_acz_exit_time);
        }
        self.reservations.insert(
            rp.vin,
            ReservationRecord {
                departure_lane: rp.acz_lane,
            },
        );
        self.stats.confirms += 1;
        let body = I2vBody::Confirm(Confirm {
            reservation_id: rp.vin,
            request_id,
            arrival_time: rp.proposal.arrival_time,
            arrival_velocity: rp.proposal.arrival_velocity,
            exit_time: rp.plan.exit_time,
            exit_velocity: rp.plan.exit_velocity,
            arrival_lane: rp.proposal.arrival_lane,
            departure_lane: rp.proposal.departure_lane,
            acz_distance: rp.acz_distance,
            accel_profile: rp.plan.accel_profile.clone(),
        });
        ctx.send(I2vMessage {
            im_id: ctx.id(),
            vin: rp.vin,
            body,
        });
    }

    /// Rejects the request, hinting the vehicle may retry immediately.
    fn send_reject(&mut self, ctx: &mut ImContext, vin: Vin, request_id: u32, reason: Reason) {
        self.stats.rejects += 1;
        ctx.send(I2vMessage {
            im_id: ctx.id(),
            vin,
            body: I2vBody::Reject {
                request_id,
                next_allowed_time: ctx.time(),
                reason,
            },
        });
    }
}

/// A policy evaluating requests against the reservation grid.
pub struct BasePolicy {
    core: PolicyCore,
    handler: RequestHandler,
}

impl BasePolicy {
    /// Creates a base policy with the given request handler.
    pub fn new(handler: RequestHandler) -> Self {
        Self {
            core: PolicyCore::new(),
            handler,
        }
    }

    /// Creates a first-come-first-served policy.
    pub fn fcfs() -> Self {
        Self::new(RequestHandler::Fcfs)
    }

    /// The policy's decision counters.
    pub fn stats(&self) -> PolicyStats {
        self.core.stats
    }

    /// Whether the vehicle holds an outstanding reservation.
    pub fn has_reservation(&self, vin: Vin) -> bool {
        self.core.has_reservation(vin)
    }

    /// Establishes the batching schedule origin, if batching is active.
    pub fn set_initial_time(&mut self, time: f64) {
        if let RequestHandler::Batch(batch) = &mut self.handler {
            batch.set_initial_time(time);
        }
    }

    /// Consumes one message from a vehicle.
    pub fn process_message(&mut self, ctx: &mut ImContext, msg: &V2iMessage) {
        let vin = msg.vin;
        match &msg.body {
            V2iBody::Request {
                request_id,
                spec,
                proposals,
            } => {
                self.handler
                    .on_request(&mut self.core, ctx, vin, *request_id, *spec, proposals);
            }
            V2iBody::Cancel { reservation_id } => {
                self.release(ctx, vin, *reservation_id, false);
            }
            V2iBody::Done { reservation_id } => {
                self.release(ctx, vin, *reservation_id, true);
            }
            V2iBody::AczRequest {
                lane,
                vehicle_length,
                stopping_distance,
                expected_exit_time,
            } => {
                let admitted = match ctx.acz_mut(*lane) {
                    Some(zone) if zone.is_admissible(vin, *vehicle_length, *stopping_distance) => {
                        zone.admit(vin, *vehicle_length, *expected_exit_time);
                        true
                    }
                    Some(_) => false,
                    None => {
                        warn!("acz request for unknown lane from vehicle {vin}; rejected");
                        false
                    }
                };
                let body = if admitted {
                    I2vBody::AczConfirm { lane: *lane }
                } else {
                    I2vBody::AczReject { lane: *lane }
                };
                ctx.send(I2vMessage {
                    im_id: ctx.id(),
                    vin,
                    body,
                });
            }
            V2iBody::AczCancel { lane } => {
                if let Some(zone) = ctx.acz_mut(*lane) {
                    zone.cancel(vin);
                }
            }
            V2iBody::AczEntered { lane } => {
                if let Some(zone) = ctx.acz_mut(*lane) {
                    zone.enter(vin);
                }
            }
            V2iBody::AczExit { lane } | V2iBody::Away { lane } => {
                if let Some(zone) = ctx.acz_mut(*lane) {
                    zone.away(vin);
                }
            }
        }
    }

    /// Advances phase state and evaluates any batch that has come due.
    pub fn act(&mut self, ctx: &mut ImContext, dt: f64) {
        self.handler.act(&mut self.core, ctx, dt);
    }

    /// Releases a reservation on Cancel or Done.
    ///
    /// A release for an unknown reservation is logged and ignored; a
    /// stray message must never corrupt another vehicle's state.
    fn release(&mut self, ctx: &mut ImContext, vin: Vin, reservation_id: Vin, done: bool) {
        let Some(record) = self.core.reservations.remove(&vin) else {
            debug!("release of unknown reservation {reservation_id} by vehicle {vin}; ignored");
            return;
        };
        if reservation_id != vin {
            warn!("vehicle {vin} released reservation {reservation_id} not matching its own");
        }
        ctx.grid_mut().cancel(vin);
        if let Some(zone) = ctx.acz_mut(record.departure_lane) {
            // A vehicle that has already entered the zone keeps its hold
            // until AczExit/Away.
            if zone.holds_space(vin) && !(done && zone.has_entered(vin)) {
                zone.cancel(vin);
            }
        }
    }
}

impl RequestHandler {
    fn on_request(
        &mut self,
        core: &mut PolicyCore,
        ctx: &mut ImContext,
        vin: Vin,
        request_id: u32,
        spec: VehicleSpec,
        proposals: &[Proposal],
    ) {
        core.stats.requests += 1;
        if core.has_reservation(vin) {
            core.stats.confirmed_another += 1;
            core.send_reject(ctx, vin, request_id, Reason::ConfirmedAnotherRequest);
            return;
        }

        match self {
            RequestHandler::Fcfs => {
                let filtered = match standard_filter(proposals, ctx.time()) {
                    Ok(filtered) => filtered,
                    Err(reason) => return core.send_reject(ctx, vin, request_id, reason),
                };
                match find_reserve_param(ctx, vin, spec, &filtered) {
                    Some(rp) => core.send_confirm(ctx, request_id, rp),
                    None => core.send_reject(ctx, vin, request_id, Reason::NoClearPath),
                }
            }
            RequestHandler::Signal(signal) => {
                let filtered = match standard_filter(proposals, ctx.time()) {
                    Ok(filtered) => filtered,
                    Err(reason) => return core.send_reject(ctx, vin, request_id, reason),
                };
                let open: SmallVec<[Proposal; 4]> = filtered
                    .into_iter()
                    .filter(|p| signal.admits(p.arrival_lane, p.arrival_time))
                    .collect();
                if open.is_empty() {
                    return core.send_reject(ctx, vin, request_id, Reason::NoClearPath);
                }
                match find_reserve_param(ctx, vin, spec, &open) {
                    Some(rp) => core.send_confirm(ctx, request_id, rp),
                    None => core.send_reject(ctx, vin, request_id, Reason::NoClearPath),
                }
            }
            RequestHandler::Batch(batch) => {
                // A new request supersedes whatever the vehicle had queued.
                batch.queue_mut().remove_vehicle(vin);
                let filtered = match standard_filter(proposals, ctx.time()) {
                    Ok(filtered) => filtered,
                    Err(reason) => return core.send_reject(ctx, vin, request_id, reason),
                };
                let deadline = batch.next_proposal_deadline();
                if filtered.iter().all(|p| p.arrival_time < deadline) {
                    // Every proposal misses the next batch: decide now.
                    core.stats.late_requests += 1;
                    match find_reserve_param(ctx, vin, spec, &filtered) {
                        Some(rp) => core.send_confirm(ctx, request_id, rp),
                        None => core.send_reject(ctx, vin, request_id, Reason::NoClearPath),
                    }
                } else {
                    let now = ctx.time();
                    for proposal in filtered.into_iter().filter(|p| p.arrival_time >= deadline) {
                        batch.queue_mut().push(vin, request_id, spec, proposal, now);
                    }
                    core.stats.queued_requests += 1;
                }
            }
        }
    }

    fn act(&mut self, core: &mut PolicyCore, ctx: &mut ImContext, _dt: f64) {
        if let RequestHandler::Batch(batch) = self {
            if !at_least(ctx.time(), batch.next_processing_time()) {
                return;
            }
            let selected = batch.get_batch(ctx.time(), ctx.track());
            for ip in selected {
                try_reserve(batch, core, ctx, ip);
            }
            // The deadline moved; decide anything now too close to queue.
            let deadline = batch.next_proposal_deadline();
            while let Some(ip) = batch.queue_mut().pop_before(deadline) {
                try_reserve(batch, core, ctx, ip);
            }
        }
    }
}

/// Keeps the proposals whose arrival time is still reachable: after the
/// current time, and no further out than the reservation horizon.
fn standard_filter(
    proposals: &[Proposal],
    now: f64,
) -> Result<SmallVec<[Proposal; 4]>, Reason> {
    let mut kept = SmallVec::new();
    let mut any_late = false;
    for proposal in proposals {
        if proposal.arrival_time <= now {
            any_late = true;
        } else if proposal.arrival_time <= now + MAXIMUM_FUTURE_RESERVATION_TIME {
            kept.push(*proposal);
        }
    }
    if kept.is_empty() {
        if proposals.is_empty() {
            Err(Reason::NoClearPath)
        } else if any_late {
            Err(Reason::ArrivalTimeTooLate)
        } else {
            Err(Reason::ArrivalTimeTooLarge)
        }
    } else {
        Ok(kept)
    }
}

/// First-fit search over the proposals, in the vehicle's preference
/// order: the first one that fits both the grid and the departure
/// lane's admission zone wins.
fn find_reserve_param(
    ctx: &ImContext,
    vin: Vin,
    spec: VehicleSpec,
    proposals: &[Proposal],
) -> Option<ReserveParam> {
    for proposal in proposals {
        let query = TraversalQuery::from_proposal(vin, spec, proposal);
        let Some(plan) = ctx.grid().query(ctx.track(), &query) else {
            continue;
        };
        let Some(zone) = ctx.acz(proposal.departure_lane) else {
            warn!("proposal departs via unknown lane; skipped");
            continue;
        };
        let stopping = spec.stopping_distance(plan.exit_velocity);
        if !zone.is_admissible(vin, spec.length, stopping) {
            continue;
        }
        let acz_distance = zone.max_size();
        let expected_acz_exit_time = if plan.exit_velocity > 0.0 {
            plan.exit_time + acz_distance / plan.exit_velocity
        } else {
            plan.exit_time
        };
        return Some(ReserveParam {
            vin,
            proposal: *proposal,
            plan,
            vehicle_length: spec.length,
            acz_lane: proposal.departure_lane,
            acz_distance,
            expected_acz_exit_time,
        });
    }
    None
}

/// Decides one batched proposal: confirm and drop the vehicle's
/// remaining alternatives, or drop just this proposal and reject once
/// none are left.
fn try_reserve(
    batch: &mut BatchHandler,
    core: &mut PolicyCore,
    ctx: &mut ImContext,
    ip: IndexedProposal,
) {
    batch.queue_mut().remove(&ip);
    // A batch may carry several alternatives of one request; once one
    // of them is confirmed the rest are spent.
    if core.has_reservation(ip.vin) {
        return;
    }
    let feasible = ip.proposal.arrival_time > ctx.time();
    let reserve = if feasible {
        find_reserve_param(ctx, ip.vin, ip.spec, &[ip.proposal])
    } else {
        None
    };
    match reserve {
        Some(rp) => {
            core.send_confirm(ctx, ip.request_id, rp);
            batch.queue_mut().remove_vehicle(ip.vin);
        }
        None => {
            if !batch.queue().contains_vehicle(ip.vin) {
                core.send_reject(ctx, ip.vin, ip.request_id, Reason::NoClearPath);
            }
        }
    }
}
