//! Cyclic signal phases for the signal-restricted request handler.

use crate::LaneId;
use slotmap::SecondaryMap;

/// The state of one signal phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Green,
    Amber,
    Red,
}

/// A fixed cycle of signal phases for one lane.
#[derive(Clone, Debug)]
pub struct CyclicSignal {
    /// The duration of each phase, in s.
    durations: Vec<f64>,
    /// The signal shown during each phase.
    signals: Vec<Signal>,
    /// Offset of the cycle start from time zero, in s.
    offset: f64,
    /// The sum of all phase durations, in s.
    total: f64,
}

impl CyclicSignal {
    /// Creates a cyclic signal from matched phase durations and states.
    pub fn new(durations: Vec<f64>, signals: Vec<Signal>, offset: f64) -> Self {
        assert_eq!(durations.len(), signals.len());
        assert!(!durations.is_empty());
        assert!(durations.iter().all(|d| *d > 0.0));
        let total = durations.iter().sum();
        Self {
            durations,
            signals,
            offset,
            total,
        }
    }

    /// A plain green/red cycle.
    pub fn two_phase(green: f64, red: f64, offset: f64) -> Self {
        Self::new(vec![green, red], vec![Signal::Green, Signal::Red], offset)
    }

    /// The signal shown at the given time.
    pub fn signal_at(&self, time: f64) -> Signal {
        let mut into_cycle = (time - self.offset).rem_euclid(self.total);
        for (duration, signal) in self.durations.iter().zip(&self.signals) {
            if into_cycle < *duration {
                return *signal;
            }
            into_cycle -= duration;
        }
        // Only reachable through accumulated rounding at the cycle end.
        *self.signals.last().unwrap()
    }

    /// The length of one full cycle, in s.
    pub fn cycle_length(&self) -> f64 {
        self.total
    }
}

/// Per-lane signal controllers gating the arrival times a request may use.
#[derive(Clone, Debug, Default)]
pub struct SignalHandler {
    controllers: SecondaryMap<LaneId, CyclicSignal>,
}

impl SignalHandler {
    /// Creates a handler with no controllers; every lane is closed until
    /// one is set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the signal controller for a lane.
    pub fn set_controller(&mut self, lane: LaneId, signal: CyclicSignal) {
        self.controllers.insert(lane, signal);
    }

    /// The signal shown on a lane at the given time. A lane without a
    /// controller is treated as red.
    pub fn signal_at(&self, lane: LaneId, time: f64) -> Signal {
        self.controllers
            .get(lane)
            .map_or(Signal::Red, |c| c.signal_at(time))
    }

    /// Whether a proposal arriving on `lane` at `time` falls in an open
    /// phase window.
    pub fn admits(&self, lane: LaneId, time: f64) -> bool {
        self.signal_at(lane, time) == Signal::Green
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cycle_repeats() {
        let signal = CyclicSignal::two_phase(4.0, 6.0, 0.0);
        assert_eq!(signal.signal_at(0.0), Signal::Green);
        assert_eq!(signal.signal_at(3.9), Signal::Green);
        assert_eq!(signal.signal_at(4.0), Signal::Red);
        assert_eq!(signal.signal_at(9.9), Signal::Red);
        assert_eq!(signal.signal_at(10.0), Signal::Green);
        assert_eq!(signal.signal_at(24.0), Signal::Red);
    }

    #[test]
    fn offset_shifts_the_cycle() {
        let signal = CyclicSignal::two_phase(4.0, 6.0, 2.0);
        assert_eq!(signal.signal_at(1.9), Signal::Red);
        assert_eq!(signal.signal_at(2.0), Signal::Green);
        // Before the offset the cycle extends backwards.
        assert_eq!(signal.signal_at(-8.0), Signal::Green);
    }

    #[test]
    fn three_phase_cycle() {
        let signal = CyclicSignal::new(
            vec![4.0, 1.0, 5.0],
            vec![Signal::Green, Signal::Amber, Signal::Red],
            0.0,
        );
        assert_eq!(signal.signal_at(4.5), Signal::Amber);
        assert_eq!(signal.signal_at(5.0), Signal::Red);
        assert_eq!(signal.signal_at(9.999), Signal::Red);
        assert_eq!(signal.signal_at(10.0), Signal::Green);
    }
}
