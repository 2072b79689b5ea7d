use log::{debug, info, warn};
use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::config::{Globals, VesselConfig};
use crate::gnc::flags::ControlStateFlags;
use crate::physics::atmosphere::BodyAtmosphere;
use crate::physics::inertia::{center_of_mass, inertia_tensor, principal_moments};
use crate::physics::torque::{angular_acceleration, TorqueEnvelope};
use crate::util::{clamp01, clamp_h, clamp_l, cube_norm, ewa, is_zero, lerp, project_on_plane};
use crate::vehicle::actuator::{Actuator, ActuatorSpec, ReactionWheel, Response, Role};
use crate::vehicle::classify::{active_indices, RoleBuckets};
use crate::vehicle::raw::{RadarReport, RawVessel};

/// Weight of a new sample in the smoothed descent TWR.
const DTWR_SMOOTHING: f64 = 0.1;

// ---------------------------------------------------------------------------
// Vehicle state
// ---------------------------------------------------------------------------

/// Per-tick aggregate the control stages read and write.
///
/// Everything here is rebuilt from the current [`RawVessel`] except the
/// actuator command fields, `max_dtwr` (smoothed) and `vsf` (owned by the
/// vertical speed stage).
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub flags: ControlStateFlags,
    pub time: f64,
    pub dt: f64,

    // Actuators
    pub engines: Vec<Actuator>,
    pub thrusters: Vec<Actuator>,
    pub wheels: Vec<ReactionWheel>,
    pub active_engines: Vec<usize>,
    pub active_thrusters: Vec<usize>,
    pub buckets: RoleBuckets,
    pub no_active_rcs: bool,
    refresh_requested: bool,

    // Mass properties, control frame
    pub mass: f64,               // kg
    pub com: Vector3<f64>,       // m, world frame
    pub inertia: Matrix3<f64>,   // kg·m^2
    pub moi: Vector3<f64>,       // kg·m^2
    pub orientation: UnitQuaternion<f64>,
    pub angular_velocity: Vector3<f64>,

    // Torque budget
    pub engine_torque: TorqueEnvelope,
    pub wheel_torque: TorqueEnvelope,
    pub thruster_torque: TorqueEnvelope,
    pub max_torque: Vector3<f64>,
    pub max_angular_accel: Vector3<f64>, // rad/s^2
    pub max_pitch_roll_aa: f64,
    /// Torque already committed by manual and balanced engines.
    pub torque: Vector3<f64>,

    // Environment
    pub on_planet: bool,
    pub landed: bool,
    pub up: Vector3<f64>,
    pub g: f64,
    pub air: BodyAtmosphere,
    pub drag_area: f64,
    pub height: f64,
    pub radius: f64,
    pub radar: Option<RadarReport>,

    // Altitude and speed
    /// Controlled altitude: above terrain when following it, else absolute.
    pub altitude: f64,
    pub abs_altitude: f64,
    pub relative_altitude: f64,
    pub terrain_altitude: f64,
    pub vertical_speed: f64,
    pub relative_vertical_speed: f64,
    pub vertical_accel: f64,
    pub horizontal_velocity: Vector3<f64>,
    pub horizontal_speed: f64,

    // Thrust statistics
    pub thrust: Vector3<f64>,     // N, world
    pub max_thrust: Vector3<f64>, // N, world
    pub max_twr: f64,
    pub max_dtwr: f64,
    pub dtwr: f64,
    pub min_vsf_twr: f64,
    pub min_vsf: f64,
    /// Vertical speed factor applied to lift engines' limits.
    pub vsf: f64,
    pub acceleration_time: f64, // s
    pub deceleration_time: f64, // s
    pub slow_actuators: bool,

    // Input
    pub main_throttle: f64,
    pub steering: Vector3<f64>,
    pub translation: Vector3<f64>,
    /// Steering written by autopilot stages; used when the pilot is idle.
    pub autopilot_steering: Vector3<f64>,

    initialized: bool,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            flags: ControlStateFlags::DISABLED,
            time: 0.0,
            dt: 0.0,
            engines: Vec::new(),
            thrusters: Vec::new(),
            wheels: Vec::new(),
            active_engines: Vec::new(),
            active_thrusters: Vec::new(),
            buckets: RoleBuckets::default(),
            no_active_rcs: true,
            refresh_requested: false,
            mass: 0.0,
            com: Vector3::zeros(),
            inertia: Matrix3::zeros(),
            moi: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            angular_velocity: Vector3::zeros(),
            engine_torque: TorqueEnvelope::zero(),
            wheel_torque: TorqueEnvelope::zero(),
            thruster_torque: TorqueEnvelope::zero(),
            max_torque: Vector3::zeros(),
            max_angular_accel: Vector3::zeros(),
            max_pitch_roll_aa: 0.0,
            torque: Vector3::zeros(),
            on_planet: false,
            landed: false,
            up: Vector3::z(),
            g: 0.0,
            air: BodyAtmosphere::VACUUM,
            drag_area: 0.0,
            height: 0.0,
            radius: 0.0,
            radar: None,
            altitude: 0.0,
            abs_altitude: 0.0,
            relative_altitude: 0.0,
            terrain_altitude: 0.0,
            vertical_speed: 0.0,
            relative_vertical_speed: 0.0,
            vertical_accel: 0.0,
            horizontal_velocity: Vector3::zeros(),
            horizontal_speed: 0.0,
            thrust: Vector3::zeros(),
            max_thrust: Vector3::zeros(),
            max_twr: 0.0,
            max_dtwr: 0.0,
            dtwr: 0.0,
            min_vsf_twr: 1.0,
            min_vsf: 0.0,
            vsf: 1.0,
            acceleration_time: 0.0,
            deceleration_time: 0.0,
            slow_actuators: false,
            main_throttle: 0.0,
            steering: Vector3::zeros(),
            translation: Vector3::zeros(),
            autopilot_steering: Vector3::zeros(),
            initialized: false,
        }
    }
}

/// Rescale pilot input so that its largest component keeps its magnitude
/// while the vector keeps its direction.
fn normalize_input(v: &Vector3<f64>) -> Vector3<f64> {
    if is_zero(v) {
        return Vector3::zeros();
    }
    v / cube_norm(v).norm()
}

impl VehicleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop actuator lists on the next [`VehicleState::check_actuators`].
    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// World → control frame.
    pub fn to_control(&self) -> UnitQuaternion<f64> {
        self.orientation.inverse()
    }

    /// Pilot steering when given, otherwise the autopilot's.
    pub fn effective_steering(&self) -> Vector3<f64> {
        if is_zero(&self.steering) {
            self.autopilot_steering
        } else {
            self.steering
        }
    }

    // -----------------------------------------------------------------------
    // Autopilot steering helpers
    // -----------------------------------------------------------------------

    pub fn set_steering(&mut self, steering: Vector3<f64>) {
        self.autopilot_steering = crate::util::clamp_components(&steering, -1.0, 1.0);
    }

    pub fn add_steering(&mut self, steering: Vector3<f64>) {
        self.set_steering(self.autopilot_steering + steering);
    }

    /// Per axis, keep whichever request is stronger.
    pub fn set_steering_if_greater(&mut self, steering: Vector3<f64>) {
        let merged = self.autopilot_steering.zip_map(&steering, |a, b| if b.abs() > a.abs() { b } else { a });
        self.set_steering(merged);
    }

    // -----------------------------------------------------------------------
    // Per-tick refresh
    // -----------------------------------------------------------------------

    /// Copy time, environment and pilot input from the raw snapshot.
    pub fn update_state(&mut self, raw: &RawVessel, cfg: &VesselConfig) {
        self.time = raw.time;
        self.dt = raw.dt;
        self.on_planet = raw.on_planet;
        self.landed = raw.landed;
        self.up = raw.up.try_normalize(1e-12).unwrap_or_else(Vector3::z);
        self.g = raw.g;
        self.air = raw.air;
        self.drag_area = raw.drag_area;
        self.height = raw.height;
        self.radius = raw.radius;
        self.radar = raw.radar;
        self.orientation = raw.orientation;
        self.angular_velocity = raw.angular_velocity;
        self.steering = normalize_input(&raw.steering);
        self.translation = normalize_input(&raw.translation);
        self.autopilot_steering = Vector3::zeros();
        // Vertical speed control owns the throttle.
        self.main_throttle = if cfg.enabled && cfg.vertical_speed_enabled() {
            1.0
        } else {
            clamp01(raw.main_throttle)
        };
    }

    /// Reuse actuator models while they still match the engine's lists,
    /// otherwise re-enumerate them.
    pub fn sync_structure(&mut self, raw: &RawVessel) {
        let stale = |held: &[Actuator], specs: &[ActuatorSpec]| {
            held.len() != specs.len() || held.iter().zip(specs).any(|(a, s)| a.id() != s.id)
        };
        let engines_stale = stale(&self.engines, &raw.engines);
        let thrusters_stale = stale(&self.thrusters, &raw.thrusters);
        if self.refresh_requested || engines_stale || thrusters_stale {
            if self.refresh_requested {
                info!("refreshing actuators: {} engine(s), {} thruster(s)", raw.engines.len(), raw.thrusters.len());
            } else if !self.engines.is_empty() || !self.thrusters.is_empty() {
                warn!("actuator list changed under us, re-enumerating");
            }
            self.engines = raw.engines.iter().cloned().map(Actuator::new).collect();
            self.thrusters = raw.thrusters.iter().cloned().map(Actuator::new).collect();
            self.buckets.clear();
            self.refresh_requested = false;
        } else {
            for (a, s) in self.engines.iter_mut().zip(&raw.engines) {
                a.spec = s.clone();
            }
            for (a, s) in self.thrusters.iter_mut().zip(&raw.thrusters) {
                a.spec = s.clone();
            }
        }
        self.wheels = raw.wheels.clone();
    }

    /// Sync actuators, apply role profiles and collect the active sets.
    /// Returns true when any actuator can act this tick.
    pub fn check_actuators(&mut self, raw: &RawVessel, cfg: &mut VesselConfig, globals: &Globals) -> bool {
        self.sync_structure(raw);
        for e in self.engines.iter_mut().filter(|e| e.spec.flameout) {
            e.thrust_limit = globals.eng.flameout_recovery_limit;
        }
        cfg.profiles.sync(&mut self.engines);
        self.active_engines = active_indices(&self.engines);
        self.active_thrusters = if raw.rcs_enabled {
            active_indices(&self.thrusters)
        } else {
            Vec::new()
        };
        let dead_zone = globals.timing.input_dead_zone;
        self.no_active_rcs = self.active_thrusters.is_empty()
            || (self.steering.norm_squared() < dead_zone && self.translation.norm_squared() < dead_zone);
        (!self.active_engines.is_empty() && self.main_throttle > 0.0) || !self.no_active_rcs
    }

    /// Mass, center of mass and inertia in the control frame.
    pub fn update_physics(&mut self, raw: &RawVessel) {
        let (mass, com) = center_of_mass(&raw.parts);
        self.mass = mass;
        self.com = com;
        self.inertia = inertia_tensor(&raw.parts, &com, &raw.orientation);
        self.moi = principal_moments(&self.inertia);
    }

    /// Actuator geometry, torque envelopes and the angular acceleration budget.
    pub fn update_commons(&mut self, globals: &Globals) {
        let to_control = self.to_control();
        let com = self.com;
        let throttle = self.main_throttle;
        for &i in &self.active_engines {
            let e = &mut self.engines[i];
            e.init_state();
            e.update_geometry(&com, &to_control, globals.eng.torque_ratio_factor);
            e.set_current_torque(throttle);
        }
        for t in self.thrusters.iter_mut().filter(|t| t.spec.enabled) {
            t.init_state();
            t.update_geometry(&com, &to_control, globals.rcs.torque_ratio_factor);
            t.set_current_torque(1.0);
        }

        let engines = &self.engines;
        self.engine_torque = self
            .active_engines
            .iter()
            .map(|&i| &engines[i])
            .filter(|e| e.role.is_steering())
            .map(|e| e.current_torque)
            .collect();
        self.thruster_torque = self
            .thrusters
            .iter()
            .filter(|t| t.spec.enabled)
            .map(|t| t.current_torque)
            .collect();
        let mut wheels = TorqueEnvelope::zero();
        for w in self.wheels.iter().filter(|w| w.operational) {
            wheels.accumulate(&w.torque);
            wheels.accumulate(&-w.torque);
        }
        self.wheel_torque = wheels;

        self.max_torque = self.engine_torque.max() + self.thruster_torque.max() + self.wheel_torque.max();
        self.max_angular_accel = angular_acceleration(&self.max_torque, &self.moi);
    }

    /// Altitude, speed decomposition and thrust statistics near a body.
    pub fn update_on_planet_stats(&mut self, raw: &RawVessel, cfg: &VesselConfig, globals: &Globals) {
        self.acceleration_time = 0.0;
        self.deceleration_time = 0.0;
        self.slow_actuators = false;
        if !self.on_planet {
            return;
        }
        let dt = self.dt.max(1e-6);

        let v = raw.velocity.dot(&self.up);
        self.vertical_accel = if self.initialized { (v - self.vertical_speed) / dt } else { 0.0 };
        self.vertical_speed = v;

        let old_alt = self.altitude;
        self.abs_altitude = raw.altitude;
        self.terrain_altitude = raw.terrain_altitude;
        self.relative_altitude = raw.altitude - raw.terrain_altitude;
        self.altitude = if cfg.altitude_above_terrain { self.relative_altitude } else { self.abs_altitude };
        self.relative_vertical_speed = if cfg.altitude_above_terrain && self.initialized {
            (self.altitude - old_alt) / dt
        } else {
            v
        };
        self.horizontal_velocity = raw.velocity - self.up * v;
        self.horizontal_speed = self.horizontal_velocity.norm();
        self.initialized = true;

        let mut thrust = Vector3::zeros();
        let mut max_thrust = Vector3::zeros();
        let mut down_thrust = 0.0;
        let mut slow_thrust = 0.0;
        let mut fast_thrust = 0.0;
        let mut accel_speed = 0.0;
        let mut decel_speed = 0.0;
        for &i in &self.active_engines {
            let e = &mut self.engines[i];
            let dir = e.spec.direction;
            if e.is_vsc() {
                let up_component = dir.dot(&self.up);
                if up_component <= 0.0 {
                    e.vsf = 0.0;
                } else {
                    let dthrust = e.nominal_thrust(e.best_limit) * up_component;
                    match e.spec.response {
                        Response::Slow { acceleration_speed, deceleration_speed }
                            if dthrust > 0.0 =>
                        {
                            slow_thrust += dthrust;
                            accel_speed += acceleration_speed * dthrust;
                            decel_speed += deceleration_speed * dthrust;
                        }
                        _ => fast_thrust += dthrust,
                    }
                    down_thrust += dthrust;
                    max_thrust += dir * e.nominal_thrust(1.0);
                }
            }
            // Maneuver engines are left out so translation does not feed back
            // into the vertical loop.
            if e.role != Role::Maneuver {
                thrust += dir * e.spec.current_thrust;
            }
        }
        self.thrust = thrust;
        self.max_thrust = max_thrust;

        let weight = self.mass * self.g;
        if weight > 0.0 {
            self.max_twr = max_thrust.norm() / weight;
            self.max_dtwr = ewa(self.max_dtwr, down_thrust / weight, DTWR_SMOOTHING);
            let up_thrust = thrust.dot(&self.up);
            self.dtwr = if up_thrust > 0.0 { up_thrust / weight } else { 0.0 };
        } else {
            self.max_twr = 0.0;
            self.dtwr = 0.0;
        }

        let local_thrust = self.to_control() * thrust;
        self.max_pitch_roll_aa = project_on_plane(&self.max_angular_accel, &local_thrust).norm();
        self.min_vsf_twr = 1.0 / clamp_l(self.max_twr, 1.0);
        let torque_floor = if self.max_pitch_roll_aa > 0.0 {
            clamp_h(globals.vsc.min_vsf_torque / self.max_pitch_roll_aa, 0.9 * self.min_vsf_twr)
        } else {
            0.1 * self.min_vsf_twr
        };
        self.min_vsf = lerp(0.1 * self.min_vsf_twr, torque_floor, self.steering.norm().sqrt());

        let controllable = slow_thrust + fast_thrust;
        if controllable <= 0.0 {
            return;
        }
        if accel_speed > 0.0 {
            self.acceleration_time = controllable / accel_speed * globals.vsc.accel_time_factor;
        }
        if decel_speed > 0.0 {
            self.deceleration_time = controllable / decel_speed * globals.vsc.decel_time_factor;
        }
        self.slow_actuators = self.acceleration_time > 0.0 || self.deceleration_time > 0.0;
        debug!(
            "slow engines: accel {:.2}s decel {:.2}s",
            self.acceleration_time, self.deceleration_time
        );
    }

    /// Torque of the given engines at their current throttle and limit.
    pub fn engines_torque(&self, idx: &[usize]) -> Vector3<f64> {
        idx.iter()
            .map(|&i| {
                let e = &self.engines[i];
                e.torque(e.throttle * e.limit)
            })
            .sum()
    }

    /// Restore every actuator limit to 100%.
    pub fn release_limits(&mut self) {
        for a in self.engines.iter_mut().chain(self.thrusters.iter_mut()) {
            a.init_state();
            a.thrust_limit = 1.0;
        }
        self.vsf = 1.0;
    }

    /// Forget everything derived from a previous vessel.
    pub fn reset(&mut self) {
        *self = VehicleState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::inertia::PartMass;

    fn quad(throttle: f64) -> RawVessel {
        let mut raw = RawVessel::default();
        raw.parts = vec![PartMass {
            mass: 1000.0,
            center_of_mass: Vector3::zeros(),
            principal_moments: Vector3::new(500.0, 500.0, 300.0),
            principal_axes: UnitQuaternion::identity(),
        }];
        raw.engines = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)]
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| ActuatorSpec::engine(i as u32, 5000.0, Vector3::new(x, y, -1.0), Vector3::z()))
            .collect();
        raw.main_throttle = throttle;
        raw.altitude = 100.0;
        raw
    }

    fn prepared(raw: &RawVessel, cfg: &mut VesselConfig) -> VehicleState {
        let g = Globals::default();
        let mut vsl = VehicleState::new();
        vsl.update_state(raw, cfg);
        vsl.update_physics(raw);
        vsl.check_actuators(raw, cfg, &g);
        vsl.update_commons(&g);
        vsl.update_on_planet_stats(raw, cfg, &g);
        vsl
    }

    #[test]
    fn symmetric_quad_has_symmetric_envelope() {
        let raw = quad(1.0);
        let mut cfg = VesselConfig::default();
        let vsl = prepared(&raw, &mut cfg);
        assert_eq!(vsl.active_engines.len(), 4);
        let e = &vsl.engine_torque;
        assert!((e.positive.x - e.negative.x).abs() < 1e-9);
        assert!(e.positive.x > 0.0);
        assert!(vsl.max_angular_accel.x > 0.0);
        assert!(vsl.max_angular_accel.x < f64::MAX);
    }

    #[test]
    fn thrust_statistics() {
        let raw = quad(1.0);
        let mut cfg = VesselConfig::default();
        let vsl = prepared(&raw, &mut cfg);
        let expected = 20_000.0 / (1000.0 * raw.g);
        assert!((vsl.max_twr - expected).abs() < 1e-9);
        // First sample of the smoothed value.
        assert!((vsl.max_dtwr - 0.1 * expected).abs() < 1e-9);
        assert!((vsl.min_vsf_twr - 1.0 / expected).abs() < 1e-9);
        assert!(!vsl.slow_actuators);
    }

    #[test]
    fn no_throttle_and_no_rcs_means_nothing_active() {
        let raw = quad(0.0);
        let mut cfg = VesselConfig::default();
        let g = Globals::default();
        let mut vsl = VehicleState::new();
        vsl.update_state(&raw, &cfg);
        assert!(!vsl.check_actuators(&raw, &mut cfg, &g));
    }

    #[test]
    fn vertical_speed_control_takes_over_throttle() {
        let raw = quad(0.0);
        let mut cfg = VesselConfig::default();
        cfg.enabled = true;
        cfg.vertical_mode = crate::config::VerticalMode::VerticalSpeed;
        let g = Globals::default();
        let mut vsl = VehicleState::new();
        vsl.update_state(&raw, &cfg);
        assert_eq!(vsl.main_throttle, 1.0);
        assert!(vsl.check_actuators(&raw, &mut cfg, &g));
    }

    #[test]
    fn models_are_reused_until_the_list_changes() {
        let mut raw = quad(1.0);
        let mut cfg = VesselConfig::default();
        let mut vsl = prepared(&raw, &mut cfg);
        vsl.engines[0].thrust_limit = 0.5;
        vsl.sync_structure(&raw);
        assert_eq!(vsl.engines[0].thrust_limit, 0.5);

        raw.engines.remove(0);
        vsl.sync_structure(&raw);
        assert_eq!(vsl.engines.len(), 3);
        assert_eq!(vsl.engines[0].thrust_limit, 1.0);
    }

    #[test]
    fn maneuver_engines_do_not_lift() {
        let mut raw = quad(1.0);
        for e in raw.engines.iter_mut() {
            e.current_thrust = 5000.0;
        }
        let mut cfg = VesselConfig::default();
        cfg.profiles.add(crate::vehicle::profile::RoleProfile::new("p").with_role(0, Role::Maneuver));
        let vsl = prepared(&raw, &mut cfg);
        assert!((vsl.thrust.z - 15_000.0).abs() < 1e-9);
        assert!((vsl.max_thrust.z - 15_000.0).abs() < 1e-9);
    }

    #[test]
    fn input_normalization_keeps_largest_component() {
        let v = normalize_input(&Vector3::new(1.0, 1.0, 0.0));
        assert!((v.norm() - 1.0).abs() < 1e-12);
        assert!(normalize_input(&Vector3::zeros()).norm() == 0.0);
    }

    #[test]
    fn steering_helpers() {
        let mut vsl = VehicleState::new();
        vsl.set_steering(Vector3::new(2.0, 0.1, 0.0));
        assert_eq!(vsl.autopilot_steering.x, 1.0);
        vsl.set_steering_if_greater(Vector3::new(-0.5, 0.5, 0.0));
        assert_eq!(vsl.autopilot_steering, Vector3::new(1.0, 0.5, 0.0));
        vsl.add_steering(Vector3::new(-0.5, 0.0, 0.0));
        assert_eq!(vsl.autopilot_steering.x, 0.5);
    }
}
