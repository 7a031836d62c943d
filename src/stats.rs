//! Counters for recoverable conditions, kept by the policies.

/// Tallies of the decisions a policy has made. These are the
/// recoverable conditions the wrapping application reports as
/// statistics; they never affect behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyStats {
    /// Requests received.
    pub requests: u64,
    /// Requests answered with a confirmation.
    pub confirms: u64,
    /// Requests answered with a rejection.
    pub rejects: u64,
    /// Requests postponed into the batch queue.
    pub queued_requests: u64,
    /// Requests whose proposals all missed the batch deadline and were
    /// evaluated immediately.
    pub late_requests: u64,
    /// Requests rejected because the vehicle already held a reservation.
    pub confirmed_another: u64,
}
