use crate::gnc::flags::ControlStateFlags;
use crate::sim::telemetry::TelemetryRecord;

// ---------------------------------------------------------------------------
// Simulation events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Liftoff,
    Touchdown,
    FlagRaised(ControlStateFlags),
    FlagCleared(ControlStateFlags),
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct SimEvent {
    pub time: f64,
    pub kind: EventKind,
}

/// Passive detectors inspect consecutive telemetry samples.
pub trait EventDetector {
    fn check(&mut self, prev: &TelemetryRecord, current: &TelemetryRecord) -> Option<EventKind>;
}

/// Ground contact changes.
pub struct ContactDetector;

impl EventDetector for ContactDetector {
    fn check(&mut self, prev: &TelemetryRecord, current: &TelemetryRecord) -> Option<EventKind> {
        match (prev.landed, current.landed) {
            (true, false) => Some(EventKind::Liftoff),
            (false, true) => Some(EventKind::Touchdown),
            _ => None,
        }
    }
}

/// Reports when a control flag appears or disappears.
pub struct FlagDetector {
    pub flag: ControlStateFlags,
}

impl FlagDetector {
    pub fn new(flag: ControlStateFlags) -> Self {
        Self { flag }
    }
}

impl EventDetector for FlagDetector {
    fn check(&mut self, prev: &TelemetryRecord, current: &TelemetryRecord) -> Option<EventKind> {
        match (prev.flags.is_effective(self.flag), current.flags.is_effective(self.flag)) {
            (false, true) => Some(EventKind::FlagRaised(self.flag)),
            (true, false) => Some(EventKind::FlagCleared(self.flag)),
            _ => None,
        }
    }
}

/// Fires once when the vehicle settles within `tolerance` of the desired
/// altitude at low vertical speed.
pub struct SettledDetector {
    pub tolerance: f64, // m
    fired: bool,
}

impl SettledDetector {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance, fired: false }
    }
}

impl EventDetector for SettledDetector {
    fn check(&mut self, _prev: &TelemetryRecord, current: &TelemetryRecord) -> Option<EventKind> {
        if self.fired || current.landed {
            return None;
        }
        let error = (current.altitude - current.desired_altitude).abs();
        if error < self.tolerance && current.vertical_speed.abs() < 0.5 {
            self.fired = true;
            Some(EventKind::Custom(format!("Settled at {:.1}m", current.altitude)))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(altitude: f64, landed: bool, flags: ControlStateFlags) -> TelemetryRecord {
        TelemetryRecord {
            time: 0.0,
            altitude,
            vertical_speed: 0.0,
            horizontal_speed: 0.0,
            angular_rate: 0.0,
            setpoint: 0.0,
            desired_altitude: 50.0,
            vsf: 1.0,
            main_throttle: 1.0,
            min_limit: 1.0,
            max_limit: 1.0,
            flags,
            landed,
        }
    }

    #[test]
    fn contact_changes() {
        let mut det = ContactDetector;
        let ground = record(0.0, true, ControlStateFlags::NOMINAL);
        let air = record(0.1, false, ControlStateFlags::NOMINAL);
        assert_eq!(det.check(&ground, &air), Some(EventKind::Liftoff));
        assert_eq!(det.check(&air, &ground), Some(EventKind::Touchdown));
        assert_eq!(det.check(&air, &air), None);
    }

    #[test]
    fn flag_transitions() {
        let mut det = FlagDetector::new(ControlStateFlags::UNOPTIMIZED);
        let a = record(10.0, false, ControlStateFlags::NOMINAL);
        let b = record(10.0, false, ControlStateFlags::NOMINAL | ControlStateFlags::UNOPTIMIZED);
        assert_eq!(det.check(&a, &b), Some(EventKind::FlagRaised(ControlStateFlags::UNOPTIMIZED)));
        assert_eq!(det.check(&b, &a), Some(EventKind::FlagCleared(ControlStateFlags::UNOPTIMIZED)));
    }

    #[test]
    fn stale_flags_outside_nominal_state_are_ignored() {
        let mut det = FlagDetector::new(ControlStateFlags::UNOPTIMIZED);
        let a = record(10.0, false, ControlStateFlags::NOMINAL);
        let b = record(10.0, false, ControlStateFlags::NO_ACTIVE_ACTUATORS | ControlStateFlags::UNOPTIMIZED);
        assert_eq!(det.check(&a, &b), None);
    }

    #[test]
    fn settles_once() {
        let mut det = SettledDetector::new(1.0);
        let r = record(50.5, false, ControlStateFlags::NOMINAL);
        assert!(det.check(&r, &r).is_some());
        assert!(det.check(&r, &r).is_none());
    }
}
