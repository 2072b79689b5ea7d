use nalgebra::{UnitQuaternion, Vector3};

use crate::physics::atmosphere::BodyAtmosphere;
use crate::physics::inertia::PartMass;
use crate::vehicle::actuator::{ActuatorSpec, ReactionWheel};

/// Terrain look-ahead from the radar collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarReport {
    /// Absolute altitude of the highest obstacle ahead, m.
    pub altitude_ahead: f64,
    /// Time until the vehicle reaches it, s; <= 0 when nothing was found.
    pub time_ahead: f64,
    /// The altitude stage may climb early to clear the obstacle.
    pub correction_allowed: bool,
    /// Absolute altitude the vehicle must not descend below, m.
    pub lower_threshold: f64,
}

/// Snapshot of everything the physics engine reports for one tick.
#[derive(Debug, Clone)]
pub struct RawVessel {
    pub id: u64,
    pub time: f64, // s
    pub dt: f64,   // s

    // Structure
    pub parts: Vec<PartMass>,
    pub engines: Vec<ActuatorSpec>,
    pub thrusters: Vec<ActuatorSpec>,
    pub wheels: Vec<ReactionWheel>,

    // Kinematics
    pub velocity: Vector3<f64>,         // m/s, world frame, surface relative
    pub angular_velocity: Vector3<f64>, // rad/s, control frame
    pub orientation: UnitQuaternion<f64>, // control frame → world
    pub up: Vector3<f64>,
    pub g: f64, // m/s^2

    // Environment
    pub air: BodyAtmosphere,
    pub drag_area: f64, // m^2
    pub altitude: f64,  // m above sea level
    pub terrain_altitude: f64,
    pub landed: bool,
    pub on_planet: bool,
    pub electric_charge: f64,

    // Pilot input
    pub main_throttle: f64,
    pub steering: Vector3<f64>,    // pitch, roll, yaw in [-1, 1]
    pub translation: Vector3<f64>, // control frame, [-1, 1]
    pub rcs_enabled: bool,

    // Bounding geometry
    pub height: f64, // m
    pub radius: f64, // m

    pub radar: Option<RadarReport>,
}

impl Default for RawVessel {
    fn default() -> Self {
        Self {
            id: 0,
            time: 0.0,
            dt: 0.02,
            parts: Vec::new(),
            engines: Vec::new(),
            thrusters: Vec::new(),
            wheels: Vec::new(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            up: Vector3::z(),
            g: crate::physics::gravity::G0,
            air: BodyAtmosphere::STANDARD,
            drag_area: 0.0,
            altitude: 0.0,
            terrain_altitude: 0.0,
            landed: false,
            on_planet: true,
            electric_charge: 1.0,
            main_throttle: 0.0,
            steering: Vector3::zeros(),
            translation: Vector3::zeros(),
            rcs_enabled: false,
            height: 1.0,
            radius: 1.0,
            radar: None,
        }
    }
}

impl RawVessel {
    pub fn has_power(&self) -> bool {
        self.electric_charge > 0.0
    }
}
