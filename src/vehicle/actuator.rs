use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::util::{clamp01, lerp};

pub type ActuatorId = u32;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Control role assigned to an engine through the active profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Provides lift and attitude control.
    #[default]
    Main,
    /// Attitude and translation only.
    Maneuver,
    /// Throttled only to cancel torque imbalance.
    Balance,
    /// Left to the pilot; never optimized.
    Manual,
}

impl Role {
    /// Roles whose limits are optimized for the commanded attitude torque.
    pub fn is_steering(self) -> bool {
        matches!(self, Role::Main | Role::Maneuver)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Engine,
    /// RCS thruster, active only while the RCS group is on.
    Thruster,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Fast,
    /// Spool-up / spool-down rates in throttle fraction per second.
    Slow { acceleration_speed: f64, deceleration_speed: f64 },
}

// ---------------------------------------------------------------------------
// Raw description supplied by the physics engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ActuatorSpec {
    pub id: ActuatorId,
    pub kind: ActuatorKind,
    pub min_thrust: f64,         // N
    pub max_thrust: f64,         // N
    pub current_thrust: f64,     // N, as reported this tick
    pub position: Vector3<f64>,  // m, world frame
    pub direction: Vector3<f64>, // unit force direction, world frame
    pub response: Response,
    pub enabled: bool,
    pub ignited: bool,
    pub flameout: bool,
    pub has_fuel: bool,
}

impl ActuatorSpec {
    /// A lit, fuelled, fast-responding engine.
    pub fn engine(id: ActuatorId, max_thrust: f64, position: Vector3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            id,
            kind: ActuatorKind::Engine,
            min_thrust: 0.0,
            max_thrust,
            current_thrust: 0.0,
            position,
            direction: direction.normalize(),
            response: Response::Fast,
            enabled: true,
            ignited: true,
            flameout: false,
            has_fuel: true,
        }
    }

    pub fn thruster(id: ActuatorId, power: f64, position: Vector3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            kind: ActuatorKind::Thruster,
            ..Self::engine(id, power, position, direction)
        }
    }

    pub fn with_response(mut self, response: Response) -> Self {
        self.response = response;
        self
    }

    pub fn with_min_thrust(mut self, min_thrust: f64) -> Self {
        self.min_thrust = min_thrust;
        self
    }
}

// ---------------------------------------------------------------------------
// Actuator model
// ---------------------------------------------------------------------------

/// One thrust producer as seen by the control pipeline.
///
/// Geometry is derived from the spec every tick in [`Actuator::update_geometry`];
/// the command fields persist between ticks.
#[derive(Debug, Clone)]
pub struct Actuator {
    pub spec: ActuatorSpec,
    pub role: Role,

    // Geometry, control frame unless noted
    pub lever: Vector3<f64>, // m, world frame, from CoM
    pub thrust_direction: Vector3<f64>,
    pub specific_torque: Vector3<f64>, // N·m per N
    pub torque_ratio: f64,

    // Commands
    pub throttle: f64,
    pub limit: f64,
    pub best_limit: f64,
    pub preset_limit: Option<f64>,
    pub vsf: f64,
    pub thrust_limit: f64,
    pub current_torque: Vector3<f64>,
}

impl Actuator {
    pub fn new(spec: ActuatorSpec) -> Self {
        Self {
            spec,
            role: Role::Main,
            lever: Vector3::zeros(),
            thrust_direction: Vector3::zeros(),
            specific_torque: Vector3::zeros(),
            torque_ratio: 1.0,
            throttle: 0.0,
            limit: 1.0,
            best_limit: 1.0,
            preset_limit: None,
            vsf: 1.0,
            thrust_limit: 1.0,
            current_torque: Vector3::zeros(),
        }
    }

    pub fn id(&self) -> ActuatorId {
        self.spec.id
    }

    pub fn is_engine(&self) -> bool {
        self.spec.kind == ActuatorKind::Engine
    }

    /// Can produce thrust this tick.
    pub fn is_operational(&self) -> bool {
        let s = &self.spec;
        s.enabled && s.ignited && !s.flameout && s.has_fuel && s.max_thrust > 0.0
    }

    /// Participates in vertical speed control.
    pub fn is_vsc(&self) -> bool {
        matches!(self.role, Role::Main | Role::Balance)
    }

    /// Thrust at the given throttle, N.
    pub fn nominal_thrust(&self, throttle: f64) -> f64 {
        lerp(self.spec.min_thrust, self.spec.max_thrust, throttle)
    }

    /// Control-frame torque at the given throttle.
    pub fn torque(&self, throttle: f64) -> Vector3<f64> {
        self.specific_torque * self.nominal_thrust(throttle)
    }

    pub fn set_current_torque(&mut self, throttle: f64) {
        self.current_torque = self.torque(throttle);
    }

    /// Recompute lever arm, specific torque and torque ratio for the
    /// current center of mass. `to_control` maps world to control frame.
    pub fn update_geometry(&mut self, com: &Vector3<f64>, to_control: &UnitQuaternion<f64>, ratio_factor: f64) {
        let dir = self.spec.direction;
        self.lever = self.spec.position - com;
        self.thrust_direction = to_control * dir;
        self.specific_torque = to_control * self.lever.cross(&dir);
        let along = self.lever.try_normalize(1e-9).map_or(0.0, |l| l.dot(&dir).abs());
        self.torque_ratio = clamp01(1.0 - along).powf(ratio_factor);
    }

    /// Reset per-tick optimization state.
    pub fn init_state(&mut self) {
        self.limit = 1.0;
        self.best_limit = 1.0;
        self.preset_limit = None;
        self.vsf = 1.0;
    }
}

// ---------------------------------------------------------------------------
// Reaction wheels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReactionWheel {
    pub id: ActuatorId,
    /// Peak torque per control axis, N·m.
    pub torque: Vector3<f64>,
    pub operational: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn off_center_engine() -> Actuator {
        let spec = ActuatorSpec::engine(1, 1000.0, Vector3::new(1.0, 0.0, -2.0), Vector3::z());
        let mut e = Actuator::new(spec);
        e.update_geometry(&Vector3::zeros(), &UnitQuaternion::identity(), 0.1);
        e
    }

    #[test]
    fn specific_torque_is_lever_cross_direction() {
        let e = off_center_engine();
        // (1,0,-2) × (0,0,1) = (0,-1,0)
        assert!((e.specific_torque - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
        assert!((e.torque(1.0).y + 1000.0).abs() < 1e-9);
    }

    #[test]
    fn torque_ratio_zero_when_thrust_through_com() {
        let spec = ActuatorSpec::engine(2, 1000.0, Vector3::new(0.0, 0.0, -2.0), Vector3::z());
        let mut e = Actuator::new(spec);
        e.update_geometry(&Vector3::zeros(), &UnitQuaternion::identity(), 0.1);
        assert!(e.torque_ratio.abs() < 1e-12);
        assert!(off_center_engine().torque_ratio > 0.0);
    }

    #[test]
    fn nominal_thrust_interpolates() {
        let e = Actuator::new(ActuatorSpec::engine(3, 1000.0, Vector3::zeros(), Vector3::z()).with_min_thrust(200.0));
        assert_eq!(e.nominal_thrust(0.0), 200.0);
        assert_eq!(e.nominal_thrust(0.5), 600.0);
        assert_eq!(e.nominal_thrust(2.0), 1000.0);
    }

    #[test]
    fn flameout_is_not_operational() {
        let mut e = off_center_engine();
        assert!(e.is_operational());
        e.spec.flameout = true;
        assert!(!e.is_operational());
    }

    #[test]
    fn roles() {
        assert!(Role::Maneuver.is_steering());
        assert!(!Role::Balance.is_steering());
        let mut e = off_center_engine();
        e.role = Role::Balance;
        assert!(e.is_vsc());
        e.role = Role::Manual;
        assert!(!e.is_vsc());
    }
}
