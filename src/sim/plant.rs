use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};

use crate::physics::aerodynamics::drag_force;
use crate::physics::atmosphere::BodyAtmosphere;
use crate::physics::gravity::{gravity_accel, G0};
use crate::physics::inertia::PartMass;
use crate::sim::driver::Commands;
use crate::sim::integrator::{rk4_step, PointMass};
use crate::util::clamp01;
use crate::vehicle::{ActuatorId, ActuatorSpec, RadarReport, RawVessel, ReactionWheel, Response};

// ---------------------------------------------------------------------------
// Plant engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlantEngine {
    pub id: ActuatorId,
    pub max_thrust: f64,        // N
    pub min_thrust: f64,        // N
    pub position: Vector3<f64>, // m, body frame
    pub direction: Vector3<f64>, // force on the vehicle, body frame
    pub response: Response,
    pub flameout: bool,
    /// Throttle the engine actually runs at, lags the command when slow.
    output: f64,
}

impl PlantEngine {
    pub fn new(id: ActuatorId, max_thrust: f64, position: Vector3<f64>) -> Self {
        Self {
            id,
            max_thrust,
            min_thrust: 0.0,
            position,
            direction: Vector3::z(),
            response: Response::Fast,
            flameout: false,
            output: 0.0,
        }
    }

    pub fn thrust(&self) -> f64 {
        if self.flameout {
            return 0.0;
        }
        self.min_thrust + (self.max_thrust - self.min_thrust) * self.output
    }

    fn spool(&mut self, target: f64, dt: f64) {
        let target = clamp01(target);
        self.output = match self.response {
            Response::Fast => target,
            Response::Slow { acceleration_speed, deceleration_speed } => {
                let rate = if target > self.output { acceleration_speed } else { deceleration_speed };
                let max_step = rate * dt;
                self.output + (target - self.output).clamp(-max_step, max_step)
            }
        };
    }
}

/// Fixed-thrust RCS nozzle, fires whenever commanded.
#[derive(Debug, Clone)]
pub struct PlantThruster {
    pub id: ActuatorId,
    pub power: f64,             // N
    pub position: Vector3<f64>, // m, body frame
    pub direction: Vector3<f64>,
}

/// Obstacle the simulated radar reports once it is within range.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub x: f64,   // m, downrange position
    pub top: f64, // m, absolute altitude of its top
}

// ---------------------------------------------------------------------------
// Hover plant
// ---------------------------------------------------------------------------

/// Rigid vehicle with lift engines over flat ground, used to close the loop
/// around the control pipeline.
///
/// Translation is integrated with RK4; rotation is integrated explicitly from
/// the net engine and wheel torque about a diagonal inertia.
#[derive(Debug, Clone)]
pub struct HoverPlant {
    pub id: u64,
    pub time: f64,
    pub mass: f64,                     // kg
    pub com: Vector3<f64>,             // m, body frame
    pub moments: Vector3<f64>,         // kg·m^2, principal
    pub engines: Vec<PlantEngine>,
    pub thrusters: Vec<PlantThruster>,
    pub wheel_torque: Vector3<f64>,    // N·m per axis, zero for none
    pub state: PointMass,
    pub orientation: UnitQuaternion<f64>, // body → world
    pub omega: Vector3<f64>,           // rad/s, body frame
    pub ground: f64,                   // m, terrain altitude
    pub landed: bool,
    pub air: BodyAtmosphere,
    pub drag_area: f64,                // Cd·A, m^2
    pub electric_charge: f64,
    pub obstacle: Option<Obstacle>,
    pub radar_range: f64,              // s of look-ahead

    // Pilot input
    pub main_throttle: f64,
    pub steering: Vector3<f64>,
    pub translation: Vector3<f64>,
    pub rcs_enabled: bool,
}

impl HoverPlant {
    /// Four engines on a square of half-width `arm`, resting on the ground.
    pub fn quad(mass: f64, engine_thrust: f64, arm: f64) -> Self {
        let engines = [(arm, 0.0), (-arm, 0.0), (0.0, arm), (0.0, -arm)]
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| PlantEngine::new(i as ActuatorId, engine_thrust, Vector3::new(x, y, -1.0)))
            .collect();
        Self {
            id: 1,
            time: 0.0,
            mass,
            com: Vector3::zeros(),
            moments: Vector3::new(mass, mass, mass * 0.6),
            engines,
            thrusters: Vec::new(),
            wheel_torque: Vector3::zeros(),
            state: PointMass { pos: Vector3::zeros(), vel: Vector3::zeros() },
            orientation: UnitQuaternion::identity(),
            omega: Vector3::zeros(),
            ground: 0.0,
            landed: true,
            air: BodyAtmosphere::STANDARD,
            drag_area: 1.0,
            electric_charge: 1.0,
            obstacle: None,
            radar_range: 10.0,
            main_throttle: 0.0,
            steering: Vector3::zeros(),
            translation: Vector3::zeros(),
            rcs_enabled: false,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.state.pos.z = altitude;
        self.landed = altitude <= self.ground;
        self
    }

    pub fn with_com(mut self, com: Vector3<f64>) -> Self {
        self.com = com;
        self
    }

    pub fn with_slow_engines(mut self, acceleration_speed: f64, deceleration_speed: f64) -> Self {
        for e in self.engines.iter_mut() {
            e.response = Response::Slow { acceleration_speed, deceleration_speed };
        }
        self
    }

    /// Up and down facing thruster pairs at the ends of both horizontal
    /// axes, with the RCS group switched on.
    pub fn with_rcs(mut self, power: f64, arm: f64) -> Self {
        let ends = [Vector3::x(), -Vector3::x(), Vector3::y(), -Vector3::y()];
        self.thrusters = ends
            .iter()
            .flat_map(|end| [Vector3::z(), -Vector3::z()].map(|dir| (end * arm, dir)))
            .enumerate()
            .map(|(k, (position, direction))| PlantThruster {
                id: 200 + k as ActuatorId,
                power,
                position,
                direction,
            })
            .collect();
        self.rcs_enabled = true;
        self
    }

    pub fn with_wheels(mut self, torque: Vector3<f64>) -> Self {
        self.wheel_torque = torque;
        self
    }

    pub fn altitude(&self) -> f64 {
        self.state.pos.z
    }

    pub fn vertical_speed(&self) -> f64 {
        self.state.vel.z
    }

    fn radar(&self) -> Option<RadarReport> {
        let obstacle = self.obstacle?;
        let vx = self.state.vel.x;
        if vx <= 0.0 {
            return None;
        }
        let time_ahead = (obstacle.x - self.state.pos.x) / vx;
        if time_ahead <= 0.0 || time_ahead > self.radar_range {
            return None;
        }
        Some(RadarReport {
            altitude_ahead: obstacle.top,
            time_ahead,
            correction_allowed: true,
            lower_threshold: obstacle.top,
        })
    }

    /// Snapshot of the vehicle as the physics engine would report it.
    ///
    /// Positions are given relative to the vehicle origin; only lever arms
    /// about the center of mass matter to the pipeline.
    pub fn raw(&self, dt: f64) -> RawVessel {
        let q = self.orientation;
        let engines = self
            .engines
            .iter()
            .map(|e| {
                let mut spec = ActuatorSpec::engine(e.id, e.max_thrust, q * e.position, q * e.direction)
                    .with_min_thrust(e.min_thrust)
                    .with_response(e.response);
                spec.current_thrust = e.thrust();
                spec.flameout = e.flameout;
                spec
            })
            .collect();
        let thrusters = self
            .thrusters
            .iter()
            .map(|t| ActuatorSpec::thruster(t.id, t.power, q * t.position, q * t.direction))
            .collect();
        let wheels = if self.wheel_torque.norm_squared() > 0.0 {
            vec![ReactionWheel { id: 100, torque: self.wheel_torque, operational: true }]
        } else {
            Vec::new()
        };
        RawVessel {
            id: self.id,
            time: self.time,
            dt,
            parts: vec![PartMass {
                mass: self.mass,
                center_of_mass: q * self.com,
                principal_moments: self.moments,
                principal_axes: q,
            }],
            engines,
            thrusters,
            wheels,
            velocity: self.state.vel,
            angular_velocity: self.omega,
            orientation: q,
            up: Vector3::z(),
            g: G0,
            air: self.air,
            drag_area: self.drag_area,
            altitude: self.state.pos.z,
            terrain_altitude: self.ground,
            landed: self.landed,
            on_planet: true,
            electric_charge: self.electric_charge,
            main_throttle: self.main_throttle,
            steering: self.steering,
            translation: self.translation,
            rcs_enabled: self.rcs_enabled,
            height: 1.0,
            radius: 1.0,
            radar: self.radar(),
        }
    }

    /// Apply `cmd` for one step of `dt` seconds.
    pub fn step(&mut self, cmd: &Commands, dt: f64) {
        let targets: HashMap<(ActuatorId, bool), f64> = cmd
            .actuators
            .iter()
            .map(|c| ((c.id, c.thruster), c.throttle * c.limit))
            .collect();
        let target = |id: ActuatorId, thruster: bool| targets.get(&(id, thruster)).copied().unwrap_or(0.0);
        for e in self.engines.iter_mut() {
            e.spool(target(e.id, false), dt);
        }

        // Net force and torque, body frame
        let mut force = Vector3::zeros();
        let mut torque = Vector3::zeros();
        for e in &self.engines {
            let f = e.direction * e.thrust();
            force += f;
            torque += (e.position - self.com).cross(&f);
        }
        for t in &self.thrusters {
            let f = t.direction * t.power * clamp01(target(t.id, true));
            force += f;
            torque += (t.position - self.com).cross(&f);
        }
        torque += self.wheel_torque.component_mul(&cmd.steering());

        let thrust_world = self.orientation * force;
        let (mass, air, drag_area) = (self.mass, self.air, self.drag_area);
        let gravity = gravity_accel(G0, &Vector3::z());
        let accel = |s: &PointMass| {
            let drag = drag_force(&s.vel, air.density(s.pos.z.max(0.0)), drag_area);
            gravity + (thrust_world + drag) / mass
        };

        if self.landed && accel(&self.state).z <= 0.0 {
            self.state.vel = Vector3::zeros();
        } else {
            self.state = rk4_step(&self.state, dt, accel);
            self.landed = false;
        }
        if self.state.pos.z <= self.ground {
            self.state.pos.z = self.ground;
            self.state.vel = Vector3::zeros();
            self.omega = Vector3::zeros();
            self.landed = true;
        }

        if !self.landed {
            let alpha = torque.component_div(&self.moments);
            self.omega += alpha * dt;
            self.orientation *= UnitQuaternion::from_scaled_axis(self.omega * dt);
        }
        self.time += dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::driver::ActuatorCommand;

    fn full(plant: &HoverPlant, throttle: f64) -> Commands {
        Commands {
            main_throttle: throttle,
            actuators: plant
                .engines
                .iter()
                .map(|e| ActuatorCommand { id: e.id, thruster: false, throttle, limit: 1.0 })
                .collect(),
            ..Commands::default()
        }
    }

    #[test]
    fn stays_on_ground_without_enough_thrust() {
        let mut plant = HoverPlant::quad(1000.0, 2000.0, 1.0);
        let cmd = full(&plant, 1.0);
        for _ in 0..50 {
            plant.step(&cmd, 0.02);
        }
        assert!(plant.landed);
        assert_eq!(plant.altitude(), 0.0);
    }

    #[test]
    fn lifts_off_with_excess_thrust() {
        let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0);
        let cmd = full(&plant, 1.0);
        for _ in 0..50 {
            plant.step(&cmd, 0.02);
        }
        assert!(!plant.landed);
        assert!(plant.altitude() > 1.0);
        // Symmetric layout: no rotation.
        assert!(plant.omega.norm() < 1e-12);
    }

    #[test]
    fn slow_engines_lag_the_command() {
        let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0).with_slow_engines(0.5, 1.0);
        let cmd = full(&plant, 1.0);
        plant.step(&cmd, 0.2);
        assert!((plant.engines[0].thrust() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn thruster_pair_rolls_without_net_thrust() {
        let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0).with_altitude(50.0).with_rcs(100.0, 1.0);
        let raw = plant.raw(0.02);
        assert!(raw.rcs_enabled);
        assert_eq!(raw.thrusters.len(), 8);

        // +y end firing up and -y end firing down both push +x.
        let fire = |t: &PlantThruster| t.position.y * t.direction.z > 0.0;
        let cmd = Commands {
            actuators: plant
                .thrusters
                .iter()
                .map(|t| ActuatorCommand {
                    id: t.id,
                    thruster: true,
                    throttle: if fire(t) { 1.0 } else { 0.0 },
                    limit: 1.0,
                })
                .collect(),
            ..Commands::default()
        };
        plant.step(&cmd, 0.02);
        assert!(plant.omega.x > 0.0);
        assert!(plant.omega.y.abs() < 1e-12);
        assert!(plant.vertical_speed() < 0.0, "falls: thrusters cancel vertically");
    }

    #[test]
    fn radar_sees_obstacle_ahead() {
        let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0).with_altitude(50.0);
        plant.state.vel.x = 10.0;
        plant.obstacle = Some(Obstacle { x: 30.0, top: 60.0 });
        let radar = plant.raw(0.02).radar.expect("obstacle in range");
        assert!((radar.time_ahead - 3.0).abs() < 1e-12);
        plant.state.vel.x = -1.0;
        assert!(plant.raw(0.02).radar.is_none());
    }
}
