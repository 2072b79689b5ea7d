use log::trace;

use crate::config::Globals;
use crate::gnc::controller::{ControlStage, TickContext};
use crate::gnc::flags::ControlStateFlags;
use crate::gnc::pid::Pid;
use crate::util::clamp;

// ---------------------------------------------------------------------------
// Vertical speed control
// ---------------------------------------------------------------------------

/// Tracks `cfg.vertical_cutoff` by scaling the lift engines' limits.
///
/// Reads: vertical speed and acceleration, `max_dtwr`, `min_vsf`, lag times.
/// Writes: `vsl.vsf`, the vertical speed control flag.
pub struct VerticalSpeedControl {
    pid: Pid,
}

impl VerticalSpeedControl {
    pub fn new(globals: &Globals) -> Self {
        Self { pid: Pid::new(globals.vsc.accel_pid) }
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}

impl ControlStage for VerticalSpeedControl {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let vsl = &mut *ctx.vsl;
        let cfg = &*ctx.cfg;
        vsl.vsf = 1.0;
        if !cfg.vertical_speed_enabled() || !vsl.on_planet {
            return;
        }
        vsl.flags.set(ControlStateFlags::VERTICAL_SPEED_CONTROL);
        if vsl.landed && cfg.vertical_cutoff < 0.0 {
            vsl.vsf = 0.0;
            self.pid.reset();
            return;
        }

        let mut error = cfg.vertical_cutoff - vsl.vertical_speed;
        if vsl.slow_actuators {
            // Anticipate the acceleration the engines will keep delivering
            // while they spool.
            let lag = if error > 0.0 { vsl.acceleration_time } else { vsl.deceleration_time };
            error -= vsl.vertical_accel * lag;
        }
        let up_accel = self.pid.update(error, vsl.dt);

        vsl.vsf = if vsl.max_dtwr > 0.0 && vsl.g > 0.0 {
            clamp((vsl.g + up_accel) / (vsl.max_dtwr * vsl.g), vsl.min_vsf, 1.0)
        } else {
            1.0
        };
        trace!(
            "vsc: cutoff {:.2} v {:.2} accel {:.2} vsf {:.3}",
            cfg.vertical_cutoff, vsl.vertical_speed, up_accel, vsl.vsf
        );
    }

    fn reset(&mut self) {
        self.pid.reset();
    }

    fn name(&self) -> &str {
        "vertical speed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VerticalMode, VesselConfig};
    use crate::vehicle::VehicleState;

    fn state() -> VehicleState {
        let mut vsl = VehicleState::new();
        vsl.on_planet = true;
        vsl.g = 9.81;
        vsl.dt = 0.02;
        vsl.max_dtwr = 2.0;
        vsl.min_vsf = 0.05;
        vsl
    }

    fn cfg(cutoff: f64) -> VesselConfig {
        VesselConfig {
            enabled: true,
            vertical_mode: VerticalMode::VerticalSpeed,
            vertical_cutoff: cutoff,
            ..VesselConfig::default()
        }
    }

    #[test]
    fn zero_error_hovers_at_inverse_twr() {
        let g = Globals::default();
        let mut stage = VerticalSpeedControl::new(&g);
        let mut vsl = state();
        let mut c = cfg(0.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut c, &g));
        assert!((vsl.vsf - 0.5).abs() < 1e-12);
        assert!(vsl.flags.is_set(ControlStateFlags::VERTICAL_SPEED_CONTROL));
    }

    #[test]
    fn climbing_request_raises_vsf() {
        let g = Globals::default();
        let mut stage = VerticalSpeedControl::new(&g);
        let mut vsl = state();
        let mut c = cfg(5.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut c, &g));
        assert!(vsl.vsf > 0.5 && vsl.vsf <= 1.0);
    }

    #[test]
    fn vsf_never_below_floor() {
        let g = Globals::default();
        let mut stage = VerticalSpeedControl::new(&g);
        let mut vsl = state();
        vsl.vertical_speed = 50.0;
        let mut c = cfg(-10.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut c, &g));
        assert_eq!(vsl.vsf, vsl.min_vsf);
    }

    #[test]
    fn landed_with_descent_request_shuts_down() {
        let g = Globals::default();
        let mut stage = VerticalSpeedControl::new(&g);
        let mut vsl = state();
        vsl.landed = true;
        let mut c = cfg(-g.vsc.max_speed);
        stage.update(&mut TickContext::new(&mut vsl, &mut c, &g));
        assert_eq!(vsl.vsf, 0.0);
    }
}
