//! The policies deciding over an intersection's reservations.
//!
//! The set of policies is closed: the base policy (with its request
//! handlers), the all-stop policy, and the timeout decorator around any
//! of them. Dispatch is an exhaustive match, not subclassing.

pub use all_stop::AllStopPolicy;
pub use base::{BasePolicy, RequestHandler, ReserveParam};
pub use signal::{CyclicSignal, Signal, SignalHandler};
pub use timeout::{TimeoutMode, TimeoutPolicy};

use crate::im::ImContext;
use crate::msg::V2iMessage;
use crate::stats::PolicyStats;

mod all_stop;
mod base;
mod signal;
mod timeout;

/// A policy variant governing one intersection manager.
pub enum Policy {
    /// Evaluate requests against the reservation grid.
    Base(BasePolicy),
    /// Deny everything; the intersection is closed.
    AllStop(AllStopPolicy),
    /// Throttle chatty vehicles, then delegate.
    Timeout(TimeoutPolicy),
}

impl Policy {
    /// Consumes one message from a vehicle.
    pub fn process_message(&mut self, ctx: &mut ImContext, msg: &V2iMessage) {
        match self {
            Policy::Base(policy) => policy.process_message(ctx, msg),
            Policy::AllStop(policy) => policy.process_message(ctx, msg),
            Policy::Timeout(policy) => policy.process_message(ctx, msg),
        }
    }

    /// Advances internal phase state and performs periodic housekeeping.
    pub fn act(&mut self, ctx: &mut ImContext, dt: f64) {
        match self {
            Policy::Base(policy) => policy.act(ctx, dt),
            Policy::AllStop(_) => {}
            Policy::Timeout(policy) => policy.act(ctx, dt),
        }
    }

    /// The policy's decision counters.
    pub fn stats(&self) -> PolicyStats {
        match self {
            Policy::Base(policy) => policy.stats(),
            Policy::AllStop(policy) => policy.stats(),
            Policy::Timeout(policy) => policy.stats(),
        }
    }

    /// Establishes the policy's schedule origin, if it keeps one.
    pub fn set_initial_time(&mut self, time: f64) {
        match self {
            Policy::Base(policy) => policy.set_initial_time(time),
            Policy::AllStop(_) => {}
            Policy::Timeout(policy) => policy.set_initial_time(time),
        }
    }
}
