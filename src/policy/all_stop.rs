//! A policy that denies every reservation request. It represents an
//! intersection that is completely closed off.

use crate::im::ImContext;
use crate::msg::{I2vBody, I2vMessage, Reason, V2iBody, V2iMessage};
use crate::stats::PolicyStats;

/// Rejects every request with [Reason::NoClearPath] and the current
/// time as the retry hint, so vehicles may ask again immediately.
#[derive(Default)]
pub struct AllStopPolicy {
    stats: PolicyStats,
}

impl AllStopPolicy {
    /// Creates an all-stop policy.
    pub fn new() -> Self {
        Default::default()
    }

    /// The policy's decision counters.
    pub fn stats(&self) -> PolicyStats {
        self.stats
    }

    /// Rejects requests; ignores everything else.
    pub fn process_message(&mut self, ctx: &mut ImContext, msg: &V2iMessage) {
        if let V2iBody::Request { request_id, .. } = &msg.body {
            self.stats.requests += 1;
            self.stats.rejects += 1;
            ctx.send(I2vMessage {
                im_id: ctx.id(),
                vin: msg.vin,
                body: I2vBody::Reject {
                    request_id: *request_id,
                    next_allowed_time: ctx.time(),
                    reason: Reason::NoClearPath,
                },
            });
        }
    }
}
