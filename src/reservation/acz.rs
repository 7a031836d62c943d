//! The admission control zone: the stretch of an exit lane just past the
//! intersection. It holds a limited length's worth of vehicles and only
//! admits a vehicle if there is room for it to stop.

use crate::Vin;
use log::warn;
use std::collections::HashMap;

/// Minimum spacing kept between stopped vehicles in the zone, in m.
const MIN_DIST_BETWEEN_VEHICLES: f64 = 0.5;

/// One vehicle's hold on the zone.
#[derive(Clone, Copy, Debug)]
struct ZoneHold {
    /// The length reserved, spacing included, in m.
    length: f64,
    /// When the vehicle expects to leave the zone, in s.
    expected_exit_time: f64,
    /// Whether the vehicle has physically entered the zone.
    entered: bool,
}

/// Per-lane admission state, independent of the reservation grid.
#[derive(Clone, Debug, Default)]
pub struct AdmissionZone {
    /// The maximum length's worth of vehicles the zone will hold, in m.
    max_size: f64,
    /// The currently occupied length, in m.
    current_size: f64,
    /// The vehicles holding space, admitted or already inside.
    holds: HashMap<Vin, ZoneHold>,
}

impl AdmissionZone {
    /// Creates a zone holding at most `max_size` metres of vehicles.
    pub fn new(max_size: f64) -> Self {
        Self {
            max_size,
            current_size: 0.0,
            holds: HashMap::new(),
        }
    }

    /// The zone's capacity in metres.
    pub fn max_size(&self) -> f64 {
        self.max_size
    }

    /// The currently occupied length in metres.
    pub fn current_size(&self) -> f64 {
        self.current_size
    }

    /// Whether a vehicle of the given length, needing the given stopping
    /// distance, fits. A vehicle already holding space is not admissible
    /// a second time.
    pub fn is_admissible(&self, vin: Vin, vehicle_length: f64, stopping_distance: f64) -> bool {
        !self.holds.contains_key(&vin)
            && self.current_size + vehicle_length + stopping_distance <= self.max_size
    }

    /// Reserves space for the vehicle. Call only after
    /// [AdmissionZone::is_admissible] has returned true.
    pub fn admit(&mut self, vin: Vin, vehicle_length: f64, expected_exit_time: f64) {
        debug_assert!(!self.holds.contains_key(&vin));
        let length = vehicle_length + MIN_DIST_BETWEEN_VEHICLES;
        self.current_size += length;
        self.holds.insert(
            vin,
            ZoneHold {
                length,
                expected_exit_time,
                entered: false,
            },
        );
    }

    /// Marks the vehicle as having physically entered the zone.
    pub fn enter(&mut self, vin: Vin) {
        match self.holds.get_mut(&vin) {
            Some(hold) => hold.entered = true,
            None => warn!("acz: vehicle {vin} entered without a hold; ignored"),
        }
    }

    /// Releases a hold the vehicle no longer wants.
    pub fn cancel(&mut self, vin: Vin) {
        self.release(vin, "cancelling");
    }

    /// Releases the hold of a vehicle that has left the zone.
    pub fn away(&mut self, vin: Vin) {
        self.release(vin, "departing");
    }

    /// When the vehicle expects to leave the zone, if it holds space.
    pub fn expected_exit_time(&self, vin: Vin) -> Option<f64> {
        self.holds.get(&vin).map(|h| h.expected_exit_time)
    }

    /// Whether the vehicle holds space in the zone.
    pub fn holds_space(&self, vin: Vin) -> bool {
        self.holds.contains_key(&vin)
    }

    /// Whether the vehicle has physically entered the zone.
    pub fn has_entered(&self, vin: Vin) -> bool {
        self.holds.get(&vin).map_or(false, |h| h.entered)
    }

    fn release(&mut self, vin: Vin, verb: &str) {
        match self.holds.remove(&vin) {
            Some(hold) => self.current_size -= hold.length,
            None => warn!("acz: {verb} vehicle {vin} holds no space; ignored"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn admit_and_release_round_trips() {
        let mut zone = AdmissionZone::new(40.0);
        assert!(zone.is_admissible(1, 5.0, 10.0));
        zone.admit(1, 5.0, 25.0);
        assert_approx_eq!(zone.current_size(), 5.5);
        assert_eq!(zone.expected_exit_time(1), Some(25.0));
        zone.away(1);
        assert_approx_eq!(zone.current_size(), 0.0);
        assert!(!zone.holds_space(1));
    }

    #[test]
    fn over_capacity_is_rejected() {
        let mut zone = AdmissionZone::new(12.0);
        zone.admit(1, 5.0, 20.0);
        // 5.5 held; 5 + 2 of stopping distance would exceed 12.
        assert!(!zone.is_admissible(2, 5.0, 2.0));
        assert!(zone.is_admissible(2, 5.0, 1.0));
    }

    #[test]
    fn double_admission_is_inadmissible() {
        let mut zone = AdmissionZone::new(40.0);
        zone.admit(1, 5.0, 20.0);
        assert!(!zone.is_admissible(1, 5.0, 0.0));
    }

    #[test]
    fn releasing_unknown_vehicle_is_ignored() {
        let mut zone = AdmissionZone::new(40.0);
        zone.cancel(9);
        assert_approx_eq!(zone.current_size(), 0.0);
    }
}
