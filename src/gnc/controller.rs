use crate::config::{Globals, VesselConfig};
use crate::vehicle::VehicleState;

/// Everything a stage may touch during one tick.
pub struct TickContext<'a> {
    pub vsl: &'a mut VehicleState,
    pub cfg: &'a mut VesselConfig,
    pub globals: &'a Globals,
}

impl<'a> TickContext<'a> {
    pub fn new(vsl: &'a mut VehicleState, cfg: &'a mut VesselConfig, globals: &'a Globals) -> Self {
        Self { vsl, cfg, globals }
    }
}

/// One step of the per-tick control pipeline.
///
/// Implement this to plug maneuver or trajectory autopilots into the
/// pipeline. Such collaborators run after the torque budget is known and
/// before the vertical cascade, and typically write
/// `cfg.vertical_cutoff`, `cfg.desired_altitude` or `vsl.translation`.
pub trait ControlStage {
    fn update(&mut self, ctx: &mut TickContext<'_>);

    /// Reset internal state (e.g., PID integrators).
    fn reset(&mut self) {}

    /// Human-readable name for logging/display.
    fn name(&self) -> &str {
        "unnamed"
    }
}
