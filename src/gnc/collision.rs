use log::debug;

use crate::gnc::controller::{ControlStage, TickContext};
use crate::gnc::flags::ControlStateFlags;
use crate::util::clamp_l;

/// Raises the vertical speed setpoint when the radar sees terrain the
/// vehicle would not clear in time. Never lowers it.
///
/// Reads: radar report, absolute altitude, vehicle height.
/// Writes: `cfg.vertical_cutoff`, the obstacle / ground collision flags.
#[derive(Debug, Default)]
pub struct CollisionPrevention {
    active: bool,
}

impl CollisionPrevention {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the last update overrode the setpoint.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl ControlStage for CollisionPrevention {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        self.active = false;
        let vsl = &mut *ctx.vsl;
        let cfg = &mut *ctx.cfg;
        let cps = &ctx.globals.cps;
        if !cfg.vertical_speed_enabled() || !vsl.on_planet {
            return;
        }
        let Some(radar) = vsl.radar else { return };
        if radar.time_ahead <= 0.0 {
            return;
        }
        let clearance = radar.altitude_ahead + cps.safe_clearance + vsl.height - vsl.abs_altitude;
        if clearance <= 0.0 {
            return;
        }
        let needed = clearance / clamp_l(radar.time_ahead, 1e-5);
        if needed <= cfg.vertical_cutoff {
            return;
        }
        // Every override is reported; descending or short on time is a collision.
        if vsl.vertical_speed < 0.0 || radar.time_ahead < cps.look_ahead_time {
            vsl.flags.set(ControlStateFlags::GROUND_COLLISION);
        } else {
            vsl.flags.set(ControlStateFlags::OBSTACLE_AHEAD);
        }
        debug!(
            "collision prevention: {:.1} m to clear in {:.1} s, setpoint {:.1} -> {:.1}",
            clearance, radar.time_ahead, cfg.vertical_cutoff, needed
        );
        cfg.vertical_cutoff = needed;
        self.active = true;
    }

    fn reset(&mut self) {
        self.active = false;
    }

    fn name(&self) -> &str {
        "collision prevention"
    }
}
