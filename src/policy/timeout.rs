//! The timeout decorator: throttles vehicles that communicate too often.

use super::Policy;
use crate::im::ImContext;
use crate::msg::{I2vBody, I2vMessage, Reason, V2iBody, V2iMessage};
use crate::stats::PolicyStats;
use crate::Vin;
use std::collections::HashMap;

/// The default length of a cool-down, in s.
const DEFAULT_TIMEOUT_LENGTH: f64 = 1.0;

/// How a vehicle's cool-down reacts when it communicates early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutMode {
    /// The recorded next-allowed time is unaffected.
    Maintain,
    /// The cool-down restarts from the latest message.
    Reset,
    /// The cool-down is extended by one timeout length.
    Compound,
}

/// Wraps another policy, rejecting any request from a vehicle still in
/// its cool-down window without forwarding it. Every rejection the
/// wrapped policy emits is stamped with a fresh next-allowed time, so
/// every reject carries a retry hint.
pub struct TimeoutPolicy {
    inner: Box<Policy>,
    timeout_length: f64,
    mode: TimeoutMode,
    /// Per-vehicle next-allowed communication time, pruned as time passes.
    timeouts: HashMap<Vin, f64>,
}

impl TimeoutPolicy {
    /// Wraps `inner` with the default cool-down length and
    /// [TimeoutMode::Maintain].
    pub fn new(inner: Policy) -> Self {
        Self::with_config(inner, DEFAULT_TIMEOUT_LENGTH, TimeoutMode::Maintain)
    }

    /// Wraps `inner` with the given cool-down length and mode.
    pub fn with_config(inner: Policy, timeout_length: f64, mode: TimeoutMode) -> Self {
        assert!(timeout_length > 0.0);
        Self {
            inner: Box::new(inner),
            timeout_length,
            mode,
            timeouts: HashMap::new(),
        }
    }

    /// The wrapped policy's counters.
    pub fn stats(&self) -> PolicyStats {
        self.inner.stats()
    }

    /// The recorded next-allowed time for a vehicle, if it is cooling down.
    pub fn next_allowed_time(&self, vin: Vin) -> Option<f64> {
        self.timeouts.get(&vin).copied()
    }

    /// Forwards the schedule origin to the wrapped policy.
    pub fn set_initial_time(&mut self, time: f64) {
        self.inner.set_initial_time(time);
    }

    /// Intercepts requests from cooling-down vehicles; forwards the rest.
    pub fn process_message(&mut self, ctx: &mut ImContext, msg: &V2iMessage) {
        if let V2iBody::Request { request_id, .. } = &msg.body {
            if self.timeouts.contains_key(&msg.vin) {
                let next = self.recompute(msg.vin, ctx.time());
                self.timeouts.insert(msg.vin, next);
                ctx.send(I2vMessage {
                    im_id: ctx.id(),
                    vin: msg.vin,
                    body: I2vBody::Reject {
                        request_id: *request_id,
                        next_allowed_time: next,
                        reason: Reason::BeforeNextAllowedComm,
                    },
                });
                return;
            }
        }

        let mark = ctx.outbox_len();
        self.inner.process_message(ctx, msg);
        self.stamp_rejects(ctx, mark);
    }

    /// Delegates, then prunes the cool-downs that time has cleared.
    ///
    /// The wrapped policy may answer postponed requests from its own
    /// `act` (the batching layer does); those rejects get stamped too.
    pub fn act(&mut self, ctx: &mut ImContext, dt: f64) {
        let mark = ctx.outbox_len();
        self.inner.act(ctx, dt);
        self.stamp_rejects(ctx, mark);
        let now = ctx.time();
        self.timeouts.retain(|_, next| *next > now);
    }

    /// Stamps every reject the wrapped policy appended past `mark` with
    /// a fresh next-allowed time, so the cool-down starts counting from
    /// this exchange.
    fn stamp_rejects(&mut self, ctx: &mut ImContext, mark: usize) {
        let now = ctx.time();
        let mut stamped = Vec::new();
        for out in ctx.outbox_tail_mut(mark) {
            if let I2vBody::Reject {
                next_allowed_time, ..
            } = &mut out.body
            {
                let next = now + self.timeout_length;
                *next_allowed_time = next;
                stamped.push((out.vin, next));
            }
        }
        for (vin, next) in stamped {
            self.timeouts.insert(vin, next);
        }
    }

    fn recompute(&self, vin: Vin, now: f64) -> f64 {
        let current = self.timeouts[&vin];
        match self.mode {
            TimeoutMode::Maintain => current,
            TimeoutMode::Reset => now + self.timeout_length,
            TimeoutMode::Compound => current + self.timeout_length,
        }
    }
}
