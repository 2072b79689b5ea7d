use serde::Serialize;

use crate::gnc::flags::ControlStateFlags;
use crate::sim::driver::{Commands, Pipeline};
use crate::sim::plant::HoverPlant;

/// One closed-loop sample: what the vehicle did and what the pipeline asked.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub time: f64,
    pub altitude: f64,          // m
    pub vertical_speed: f64,    // m/s
    pub horizontal_speed: f64,  // m/s
    pub angular_rate: f64,      // rad/s
    pub setpoint: f64,          // m/s, final vertical speed setpoint
    pub desired_altitude: f64,  // m
    pub vsf: f64,
    pub main_throttle: f64,
    pub min_limit: f64,
    pub max_limit: f64,
    pub flags: ControlStateFlags,
    pub landed: bool,
}

impl TelemetryRecord {
    pub fn capture(plant: &HoverPlant, pipeline: &Pipeline, cmd: &Commands) -> Self {
        let mut limits = cmd.actuators.iter().filter(|c| !c.thruster).map(|c| c.limit).peekable();
        // Nothing commanded yet: engines run unlimited.
        let (min_limit, max_limit) = if limits.peek().is_none() {
            (1.0, 1.0)
        } else {
            limits.fold((f64::INFINITY, 0.0_f64), |(lo, hi), l| (lo.min(l), hi.max(l)))
        };
        Self {
            time: plant.time,
            altitude: plant.altitude(),
            vertical_speed: plant.vertical_speed(),
            horizontal_speed: plant.state.vel.xy().norm(),
            angular_rate: plant.omega.norm(),
            setpoint: pipeline.cfg.vertical_cutoff,
            desired_altitude: pipeline.cfg.desired_altitude,
            vsf: pipeline.vsl.vsf,
            main_throttle: cmd.main_throttle,
            min_limit,
            max_limit,
            flags: cmd.flags,
            landed: plant.landed,
        }
    }
}
