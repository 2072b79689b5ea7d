use nalgebra::Vector3;

use crate::config::Globals;
use crate::gnc::controller::{ControlStage, TickContext};
use crate::gnc::pid::Pid;
use crate::util::is_zero;

/// Damps residual rotation while the pilot is not steering.
///
/// The angular velocity is scaled by the per-axis angular acceleration
/// budget, so the same gains work for nimble and sluggish vehicles.
///
/// Reads: angular velocity, `max_angular_accel`, pilot steering.
/// Writes: `vsl.autopilot_steering`.
pub struct AttitudeTrim {
    pid: Pid<Vector3<f64>>,
}

impl AttitudeTrim {
    pub fn new(globals: &Globals) -> Self {
        Self { pid: Pid::new(globals.stb.pid) }
    }

    pub fn pid(&self) -> &Pid<Vector3<f64>> {
        &self.pid
    }
}

impl ControlStage for AttitudeTrim {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let vsl = &mut *ctx.vsl;
        let stb = &ctx.globals.stb;
        if !ctx.cfg.stabilize || !is_zero(&vsl.steering) {
            self.pid.reset();
            return;
        }
        let omega = vsl.angular_velocity;
        if omega.norm() < stb.min_angular_velocity {
            return;
        }
        let error = omega.zip_map(&vsl.max_angular_accel, |w, aa| {
            if aa > 0.0 && aa < f64::MAX { -w / aa } else { 0.0 }
        });
        let steering = self.pid.update(error, vsl.dt);
        vsl.set_steering_if_greater(steering);
    }

    fn reset(&mut self) {
        self.pid.reset();
    }

    fn name(&self) -> &str {
        "attitude trim"
    }
}
