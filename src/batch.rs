//! The batching and reordering layer.
//!
//! Decouples "a request arrived" from "a request is evaluated": pending
//! proposals accumulate in an ordered queue, and at each processing time
//! a batch is selected over a lookahead window, reordered by the active
//! strategy, and only then evaluated. The lookahead guarantees that by
//! the time a batch is decided, every request that could still affect it
//! has already arrived.

use crate::msg::{Proposal, VehicleSpec};
use crate::track::TrackModel;
use crate::util::Interval;
use crate::Vin;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

/// The default period between batch processing times, in s.
pub const DEFAULT_PROCESSING_INTERVAL: f64 = 2.0;

/// The estimated time to compute a reordering plus the time to send the
/// confirm and reject messages, in s.
const COMP_COMM_DELAY: f64 = 0.05;

/// The period between the end of the last processed batch and the start
/// of the target batch, in s.
const LOOKAHEAD_TIME: f64 = 3.0;

/// A queued proposal, annotated with its originating request and a
/// total order key.
#[derive(Clone, Copy, Debug)]
pub struct IndexedProposal {
    /// Insertion sequence number; the tie-break after arrival time.
    seq: u64,
    /// The requesting vehicle.
    pub vin: Vin,
    /// The request this proposal came from.
    pub request_id: u32,
    /// The vehicle's physical attributes, carried from the request.
    pub spec: VehicleSpec,
    pub proposal: Proposal,
    /// When the request was received, in s.
    pub submission_time: f64,
}

impl IndexedProposal {
    fn key(&self) -> (OrderedFloat<f64>, u64) {
        (OrderedFloat(self.proposal.arrival_time), self.seq)
    }
}

impl PartialEq for IndexedProposal {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for IndexedProposal {}

impl PartialOrd for IndexedProposal {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexedProposal {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// The ordered, deduplicated collection of pending proposals.
///
/// Entries are keyed by (arrival time, insertion sequence), so no two
/// entries compare equal. A vehicle has at most one outstanding request
/// queued: queueing a new one first removes the old one's proposals.
#[derive(Clone, Debug, Default)]
pub struct ProposalQueue {
    entries: BTreeSet<IndexedProposal>,
    next_seq: u64,
}

impl ProposalQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of queued proposals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no proposals are queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queues one proposal of a request.
    pub fn push(
        &mut self,
        vin: Vin,
        request_id: u32,
        spec: VehicleSpec,
        proposal: Proposal,
        submission_time: f64,
    ) {
        let entry = IndexedProposal {
            seq: self.next_seq,
            vin,
            request_id,
            spec,
            proposal,
            submission_time,
        };
        self.next_seq += 1;
        self.entries.insert(entry);
    }

    /// Removes every proposal queued by the vehicle, returning how many
    /// were removed. This is the cancellation path: a new request from
    /// the same vehicle supersedes the old one.
    pub fn remove_vehicle(&mut self, vin: Vin) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.vin != vin);
        before - self.entries.len()
    }

    /// Returns true if the vehicle has any proposal queued.
    pub fn contains_vehicle(&self, vin: Vin) -> bool {
        self.entries.iter().any(|e| e.vin == vin)
    }

    /// All queued proposals whose arrival time falls in the window,
    /// in queue order. Entries stay queued until consumed.
    pub fn select_window(&self, window: Interval<f64>) -> Vec<IndexedProposal> {
        self.entries
            .iter()
            .take_while(|e| e.proposal.arrival_time < window.max)
            .filter(|e| window.contains(e.proposal.arrival_time))
            .copied()
            .collect()
    }

    /// Removes and returns the earliest queued proposal with an arrival
    /// time before `time`.
    pub fn pop_before(&mut self, time: f64) -> Option<IndexedProposal> {
        let first = *self.entries.iter().next()?;
        if first.proposal.arrival_time < time {
            self.entries.remove(&first);
            Some(first)
        } else {
            None
        }
    }

    /// Removes one specific entry.
    pub fn remove(&mut self, entry: &IndexedProposal) -> bool {
        self.entries.remove(entry)
    }

    /// Iterates the queued proposals in order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedProposal> {
        self.entries.iter()
    }
}

/// How a batch is reordered before evaluation. Strategies are
/// permutations: they never drop or duplicate proposals.
#[derive(Debug)]
pub enum Reordering {
    /// Group by the road of the arrival lane, concatenating the groups
    /// in road-id order and preserving arrival order within each group.
    RoadBased,
    /// An unbiased shuffle.
    Random(StdRng),
}

impl Reordering {
    /// Reorders a batch.
    pub fn reorder(
        &mut self,
        proposals: Vec<IndexedProposal>,
        track: &TrackModel,
    ) -> Vec<IndexedProposal> {
        match self {
            Reordering::RoadBased => proposals
                .into_iter()
                .into_group_map_by(|ip| track.road_of(ip.proposal.arrival_lane))
                .into_iter()
                .sorted_by_key(|(road, _)| *road)
                .flat_map(|(_, group)| group)
                .collect(),
            Reordering::Random(rng) => {
                let mut proposals = proposals;
                proposals.shuffle(rng);
                proposals
            }
        }
    }
}

/// The batching layer: the pending queue, the processing schedule, and
/// the reordering strategy.
#[derive(Debug)]
pub struct BatchHandler {
    queue: ProposalQueue,
    reordering: Reordering,
    /// The period between processing times, in s.
    processing_interval: f64,
    /// When the next batch will be processed.
    next_processing_time: f64,
    /// No queued proposal may have an arrival time before this.
    next_proposal_deadline: f64,
}

impl BatchHandler {
    /// Creates a batch handler with the default processing interval.
    pub fn new(reordering: Reordering) -> Self {
        Self::with_interval(reordering, DEFAULT_PROCESSING_INTERVAL)
    }

    /// Creates a batch handler processing every `processing_interval`
    /// seconds.
    pub fn with_interval(reordering: Reordering, processing_interval: f64) -> Self {
        assert!(processing_interval > 0.0);
        Self {
            queue: ProposalQueue::new(),
            reordering,
            processing_interval,
            next_processing_time: processing_interval,
            next_proposal_deadline: processing_interval + COMP_COMM_DELAY,
        }
    }

    /// Establishes the first processing time and proposal deadline.
    pub fn set_initial_time(&mut self, time: f64) {
        self.next_processing_time = time + self.processing_interval;
        self.next_proposal_deadline = self.next_processing_time + COMP_COMM_DELAY;
    }

    /// When the next batch will be processed.
    pub fn next_processing_time(&self) -> f64 {
        self.next_processing_time
    }

    /// The arrival-time deadline below which new proposals are evaluated
    /// immediately instead of queued.
    pub fn next_proposal_deadline(&self) -> f64 {
        self.next_proposal_deadline
    }

    /// The pending queue.
    pub fn queue(&self) -> &ProposalQueue {
        &self.queue
    }

    /// Mutable access to the pending queue.
    pub fn queue_mut(&mut self) -> &mut ProposalQueue {
        &mut self.queue
    }

    /// Selects and reorders the batch for `now`, then advances the
    /// schedule by exactly one processing interval.
    ///
    /// The batch is every queued proposal with an arrival time in
    /// `[now + lookahead, now + lookahead + interval)`; the upper bound
    /// belongs to the next batch. An empty queue yields an empty batch
    /// and the schedule still advances.
    pub fn get_batch(&mut self, now: f64, track: &TrackModel) -> Vec<IndexedProposal> {
        let start = now + LOOKAHEAD_TIME;
        let window = Interval::new(start, start + self.processing_interval);
        let selected = self.queue.select_window(window);
        let batch = self.reordering.reorder(selected, track);

        self.next_processing_time = now + self.processing_interval;
        self.next_proposal_deadline = self.next_processing_time + COMP_COMM_DELAY;
        batch
    }
}
