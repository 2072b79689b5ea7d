use log::debug;

use crate::config::Globals;
use crate::gnc::controller::{ControlStage, TickContext};
use crate::gnc::flags::ControlStateFlags;
use crate::gnc::pid::Pid;
use crate::gnc::timer::Timer;
use crate::physics::free_fall::{FallQuery, FreeFallEstimator, StandardFreeFall};
use crate::util::{clamp, clamp_h, clamp_l};
use crate::vehicle::VehicleState;

/// Desired altitude given to a landed vehicle when the stage is switched on.
pub const LANDED_DESIRED_ALTITUDE: f64 = -10.0;

// ---------------------------------------------------------------------------
// Altitude control
// ---------------------------------------------------------------------------

/// Turns the altitude error into a vertical speed setpoint.
///
/// Reads: altitude, vertical speeds, radar report, thrust statistics.
/// Writes: `cfg.vertical_cutoff`, altitude-related flags.
pub struct AltitudeControl {
    rocket_pid: Pid,
    jets_pid: Pid,
    falling: Timer,
    estimator: Box<dyn FreeFallEstimator>,
}

impl AltitudeControl {
    pub fn new(globals: &Globals) -> Self {
        Self::with_estimator(globals, Box::new(StandardFreeFall::default()))
    }

    pub fn with_estimator(globals: &Globals, estimator: Box<dyn FreeFallEstimator>) -> Self {
        let alt = &globals.alt;
        Self {
            rocket_pid: Pid::with_sign_reset(alt.rocket_pid),
            jets_pid: Pid::new(alt.jets_pid),
            falling: Timer::new(alt.falling_time),
            estimator,
        }
    }

    /// Desired altitude when switching the stage on: hold the current one,
    /// or stay on the ground when landed.
    pub fn initial_altitude(vsl: &VehicleState, above_terrain: bool) -> f64 {
        if vsl.landed {
            return LANDED_DESIRED_ALTITUDE;
        }
        if above_terrain {
            vsl.relative_altitude
        } else {
            vsl.abs_altitude
        }
    }

    pub fn rocket_pid(&self) -> &Pid {
        &self.rocket_pid
    }

    pub fn jets_pid(&self) -> &Pid {
        &self.jets_pid
    }

    /// Altitude the vehicle would coast to when climbing.
    fn projected_altitude(vsl: &VehicleState) -> f64 {
        let v = vsl.vertical_speed;
        let mut alt = vsl.abs_altitude;
        if v > 0.0 && !vsl.landed && vsl.g > 0.0 {
            let mut tt_ap = v / vsl.g;
            if let Some(radar) = &vsl.radar {
                if radar.time_ahead > 0.0 && radar.time_ahead < tt_ap {
                    tt_ap = radar.time_ahead;
                }
            }
            alt += tt_ap * (v - tt_ap * vsl.g / 2.0);
        }
        alt
    }

    /// Lower bound on descent speed so the vehicle can still stop in time.
    fn descent_floor(&self, vsl: &VehicleState, globals: &Globals, error: f64, min_speed: f64) -> f64 {
        let alt = &globals.alt;
        let v = vsl.vertical_speed;
        let g = vsl.g;
        if v >= 0.0 || g <= 0.0 {
            return min_speed;
        }
        let excess_twr = vsl.max_twr - 1.0;
        if excess_twr <= 1e-5 {
            // Cannot brake at all.
            return 0.0;
        }
        let query = FallQuery {
            altitude: vsl.abs_altitude,
            height: clamp_l(vsl.relative_altitude + error, 0.0),
            vertical_speed: v,
            g,
            mass: vsl.mass,
            drag_area: vsl.drag_area,
        };
        let free_fall = self.estimator.free_fall(&query, &vsl.air).time;
        let brake_time = -v / excess_twr / g;
        if brake_time > free_fall / 100.0 {
            clamp(
                -alt.max_speed_high * (1.0 - brake_time / free_fall),
                min_speed,
                clamp_l(free_fall * g * (1.0 - vsl.max_twr), -alt.max_speed_low),
            )
        } else {
            min_speed
        }
    }
}

impl ControlStage for AltitudeControl {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let TickContext { vsl, cfg, globals } = ctx;
        if !cfg.altitude_enabled() || !vsl.on_planet {
            self.falling.reset();
            return;
        }
        vsl.flags.set(ControlStateFlags::ALTITUDE_CONTROL);
        let alt_cfg = &globals.alt;
        let v = vsl.vertical_speed;
        let mut alt = Self::projected_altitude(vsl);

        if cfg.altitude_above_terrain {
            let mut lower_threshold = vsl.terrain_altitude;
            if let Some(radar) = vsl.radar {
                let moving_fast = vsl.horizontal_speed > globals.timing.moving_fast_speed;
                if moving_fast && alt - radar.altitude_ahead <= vsl.height {
                    let d_alt = radar.altitude_ahead + cfg.desired_altitude - vsl.abs_altitude;
                    vsl.flags.set(if v < 0.0 {
                        ControlStateFlags::GROUND_COLLISION
                    } else {
                        ControlStateFlags::OBSTACLE_AHEAD
                    });
                    if radar.correction_allowed
                        && radar.time_ahead > 0.0
                        && d_alt / radar.time_ahead > globals.vsc.max_speed
                    {
                        let mut cutoff = d_alt / clamp_l(radar.time_ahead - globals.cps.look_ahead_time, 1e-5);
                        if vsl.slow_actuators {
                            let mut dv = cutoff - v;
                            dv *= if dv < 0.0 { vsl.deceleration_time } else { vsl.acceleration_time };
                            cutoff += dv;
                        }
                        debug!("obstacle ahead: climb {:.1} m at {:.1} m/s", d_alt, cutoff);
                        cfg.vertical_cutoff = cutoff;
                        self.falling.reset();
                        return;
                    }
                }
                lower_threshold = lower_threshold.max(radar.lower_threshold);
                if radar.correction_allowed {
                    lower_threshold = lower_threshold.max(radar.altitude_ahead);
                }
            }
            alt -= lower_threshold;
            if alt < 0.0 && v > 1.0 && cfg.vertical_cutoff > 1.0 {
                vsl.flags.set(ControlStateFlags::ASCENDING);
            }
        }

        let error = cfg.desired_altitude - alt;
        if vsl.landed && error < 0.0 && vsl.relative_altitude <= vsl.radius {
            cfg.vertical_cutoff = -globals.vsc.max_speed;
            self.falling.reset();
            return;
        }

        let low = alt_cfg.max_speed_low;
        let high = alt_cfg.max_speed_high;
        let err_f = alt_cfg.max_speed_error_f;
        let mut min_speed = -low;
        let mut max_speed = low;
        if error < 0.0 {
            min_speed = clamp(low * (error + err_f) / err_f, -high, -low);
            min_speed = self.descent_floor(vsl, globals, error, min_speed);
        } else if error > 0.0 {
            max_speed = if alt <= vsl.height {
                high
            } else {
                clamp(low * (error - err_f) / err_f, low, high)
            };
        }

        let terrain_d = if cfg.altitude_above_terrain {
            1.0 / clamp_l(vsl.horizontal_speed, 1.0)
        } else {
            1.0
        };
        let dt = vsl.dt;
        if vsl.slow_actuators {
            let twr = clamp_l(vsl.max_twr, 1e-5);
            let pid = &mut self.jets_pid;
            pid.set_limits(min_speed, max_speed);
            let speed_gain = if v.abs() > 0.0 { alt_cfg.err_f / v.abs() } else { f64::MAX };
            pid.gains.p = clamp_h(
                alt_cfg.jets_pid.p / twr / alt_cfg.twr_denominator
                    * clamp(speed_gain, 1.0, twr * alt_cfg.twr_denominator),
                alt_cfg.jets_pid.p,
            );
            let lag = if error < 0.0 { vsl.acceleration_time } else { vsl.deceleration_time };
            pid.gains.d = alt_cfg.jets_pid.d * terrain_d * (1.0 + lag);
            cfg.vertical_cutoff = pid.update(error, dt);
        } else {
            let pid = &mut self.rocket_pid;
            pid.set_limits(min_speed, max_speed);
            pid.gains.d = alt_cfg.rocket_pid.d * terrain_d;
            cfg.vertical_cutoff = pid.update(error, dt);
        }

        if cfg.altitude_above_terrain {
            let rel_v = vsl.relative_vertical_speed;
            if error > 0.0 {
                let dv = clamp_l((v - rel_v) / clamp_l(alt / alt_cfg.rel_altitude_factor, 1.0), 0.0);
                cfg.vertical_cutoff += dv;
            }
            let falling = rel_v < 0.0
                && cfg.vertical_cutoff - v > 0.0
                && vsl.relative_altitude < cfg.desired_altitude - rel_v * alt_cfg.time_ahead;
            if self.falling.run_if(falling, dt) {
                vsl.flags.set(ControlStateFlags::LOOSING_ALTITUDE);
            }
        } else {
            self.falling.reset();
        }
    }

    fn reset(&mut self) {
        self.rocket_pid.reset();
        self.jets_pid.reset();
        self.falling.reset();
    }

    fn name(&self) -> &str {
        "altitude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VerticalMode, VesselConfig};
    use crate::vehicle::RadarReport;

    fn hovering_state() -> VehicleState {
        let mut vsl = VehicleState::new();
        vsl.flags = ControlStateFlags::NOMINAL;
        vsl.on_planet = true;
        vsl.g = 9.81;
        vsl.mass = 1000.0;
        vsl.max_twr = 2.0;
        vsl.dt = 0.02;
        vsl.radius = 2.0;
        vsl.height = 3.0;
        vsl
    }

    fn altitude_cfg(desired: f64) -> VesselConfig {
        VesselConfig {
            enabled: true,
            vertical_mode: VerticalMode::Altitude,
            desired_altitude: desired,
            ..VesselConfig::default()
        }
    }

    #[test]
    fn landed_below_target_cuts_engines_without_touching_pid() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.landed = true;
        vsl.abs_altitude = 0.5;
        vsl.relative_altitude = 0.5;
        let mut cfg = altitude_cfg(LANDED_DESIRED_ALTITUDE);
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        assert_eq!(cfg.vertical_cutoff, -g.vsc.max_speed);
        assert_eq!(stage.rocket_pid().action(), 0.0);
        assert_eq!(stage.rocket_pid().integral(), 0.0);
        assert!(vsl.flags.is_set(ControlStateFlags::ALTITUDE_CONTROL));
    }

    #[test]
    fn climbs_toward_target() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.abs_altitude = 10.0;
        vsl.relative_altitude = 10.0;
        let mut cfg = altitude_cfg(100.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        assert!(cfg.vertical_cutoff > 0.0);
        assert!(cfg.vertical_cutoff <= g.alt.max_speed_low + 1e-9);
    }

    #[test]
    fn descent_speed_is_finite_at_unit_twr() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.max_twr = 1.0;
        vsl.abs_altitude = 500.0;
        vsl.relative_altitude = 500.0;
        vsl.vertical_speed = -20.0;
        let mut cfg = altitude_cfg(100.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        assert!(cfg.vertical_cutoff.is_finite());
        assert!(cfg.vertical_cutoff <= g.alt.max_speed_low);
    }

    #[test]
    fn descent_floor_is_finite_and_clamped() {
        let g = Globals::default();
        let stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.abs_altitude = 300.0;
        vsl.relative_altitude = 300.0;
        vsl.vertical_speed = -30.0;
        vsl.drag_area = 2.0;
        vsl.air = crate::physics::BodyAtmosphere::STANDARD;
        for twr in [1.0, 1.0 + 1e-9, 1.01, 1.5, 3.0] {
            vsl.max_twr = twr;
            let floor = stage.descent_floor(&vsl, &g, -200.0, -g.alt.max_speed_low);
            assert!(floor.is_finite(), "twr {twr}");
            assert!(floor <= 0.0 && floor >= -g.alt.max_speed_high, "twr {twr}: {floor}");
        }
    }

    #[test]
    fn obstacle_ahead_overrides_setpoint() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.abs_altitude = 100.0;
        vsl.relative_altitude = 50.0;
        vsl.terrain_altitude = 50.0;
        vsl.horizontal_speed = 50.0;
        vsl.vertical_speed = -1.0;
        vsl.radar = Some(RadarReport {
            altitude_ahead: 99.0,
            time_ahead: 4.0,
            correction_allowed: true,
            lower_threshold: 0.0,
        });
        let mut cfg = altitude_cfg(50.0);
        cfg.altitude_above_terrain = true;
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        // d_alt = 99 + 50 - 100 = 49 over (4 - 2) s
        assert!((cfg.vertical_cutoff - 24.5).abs() < 1e-9);
        assert!(vsl.flags.is_set(ControlStateFlags::GROUND_COLLISION));
        assert_eq!(stage.rocket_pid().action(), 0.0);
    }

    #[test]
    fn inactive_when_mode_is_off() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        let mut cfg = altitude_cfg(100.0);
        cfg.vertical_mode = VerticalMode::VerticalSpeed;
        cfg.vertical_cutoff = 3.0;
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        assert_eq!(cfg.vertical_cutoff, 3.0);
        assert!(!vsl.flags.is_set(ControlStateFlags::ALTITUDE_CONTROL));
    }

    fn terrain_state() -> VehicleState {
        let mut vsl = hovering_state();
        vsl.abs_altitude = 100.0;
        vsl.terrain_altitude = 90.0;
        vsl.relative_altitude = 10.0;
        vsl
    }

    fn terrain_cfg(desired: f64) -> VesselConfig {
        VesselConfig { altitude_above_terrain: true, ..altitude_cfg(desired) }
    }

    fn falling_tick(stage: &mut AltitudeControl, vsl: &mut VehicleState, cfg: &mut VesselConfig, g: &Globals) -> bool {
        vsl.flags = ControlStateFlags::NOMINAL;
        stage.update(&mut TickContext::new(vsl, cfg, g));
        vsl.flags.is_set(ControlStateFlags::LOOSING_ALTITUDE)
    }

    #[test]
    fn slow_engines_use_rescaled_jets_gains() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.abs_altitude = 50.0;
        vsl.relative_altitude = 50.0;
        vsl.vertical_speed = -0.5;
        vsl.slow_actuators = true;
        vsl.acceleration_time = 0.8;
        vsl.deceleration_time = 0.4;
        let mut cfg = altitude_cfg(60.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));

        // err_f / |v| = 2 within [1, twr * twr_denominator]: 0.5 / 2 / 2 * 2
        assert!((stage.jets_pid().gains.p - 0.25).abs() < 1e-12);
        // Climbing: derivative inflated by the spool-down lag.
        assert!((stage.jets_pid().gains.d - 0.5 * 1.4).abs() < 1e-12);
        assert!(stage.jets_pid().action() > 0.0);
        assert_eq!(cfg.vertical_cutoff, stage.jets_pid().action());
        assert_eq!(stage.rocket_pid().action(), 0.0);
    }

    #[test]
    fn jets_gain_never_exceeds_base_gain() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = hovering_state();
        vsl.abs_altitude = 50.0;
        vsl.relative_altitude = 50.0;
        vsl.max_twr = 10.0;
        vsl.slow_actuators = true;
        vsl.acceleration_time = 0.8;
        let mut cfg = altitude_cfg(40.0);
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        assert!(stage.jets_pid().gains.p <= g.alt.jets_pid.p);
        // Descending: derivative inflated by the spool-up lag.
        assert!((stage.jets_pid().gains.d - 0.5 * 1.8).abs() < 1e-12);
    }

    #[test]
    fn rising_terrain_adds_climb_rate() {
        let g = Globals::default();
        let run = |relative_vertical_speed: f64| {
            let mut stage = AltitudeControl::new(&g);
            let mut vsl = terrain_state();
            vsl.relative_vertical_speed = relative_vertical_speed;
            let mut cfg = terrain_cfg(30.0);
            stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
            cfg.vertical_cutoff
        };
        let flat = run(0.0);
        // Terrain rising at 4 m/s under a vehicle 10 m up: full correction.
        assert!((run(-4.0) - flat - 4.0).abs() < 1e-9);
        // Falling terrain never lowers the setpoint.
        assert_eq!(run(3.0), flat);
    }

    #[test]
    fn climbing_below_terrain_ahead_is_ascending() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = terrain_state();
        vsl.terrain_altitude = 50.0;
        vsl.relative_altitude = 50.0;
        vsl.vertical_speed = 2.0;
        vsl.radar = Some(RadarReport {
            altitude_ahead: 120.0,
            time_ahead: 20.0,
            correction_allowed: true,
            lower_threshold: 0.0,
        });
        let mut cfg = terrain_cfg(30.0);
        cfg.vertical_cutoff = 3.0;
        stage.update(&mut TickContext::new(&mut vsl, &mut cfg, &g));
        assert!(vsl.flags.is_set(ControlStateFlags::ASCENDING));
        assert!(!vsl.flags.is_set(ControlStateFlags::OBSTACLE_AHEAD));
    }

    #[test]
    fn falling_alert_is_debounced() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = terrain_state();
        vsl.vertical_speed = -2.0;
        vsl.relative_vertical_speed = -2.0;
        let mut cfg = terrain_cfg(30.0);

        // falling_time 1 s at 0.02 s per tick
        for tick in 0..40 {
            assert!(!falling_tick(&mut stage, &mut vsl, &mut cfg, &g), "tick {tick}");
        }
        let fired = (0..15).any(|_| falling_tick(&mut stage, &mut vsl, &mut cfg, &g));
        assert!(fired);

        // One tick of climbing relative to the ground restarts the count.
        vsl.relative_vertical_speed = 1.0;
        assert!(!falling_tick(&mut stage, &mut vsl, &mut cfg, &g));
        vsl.relative_vertical_speed = -2.0;
        for tick in 0..40 {
            assert!(!falling_tick(&mut stage, &mut vsl, &mut cfg, &g), "tick {tick}");
        }
    }

    #[test]
    fn falling_alert_restarts_after_stage_was_off() {
        let g = Globals::default();
        let mut stage = AltitudeControl::new(&g);
        let mut vsl = terrain_state();
        vsl.vertical_speed = -2.0;
        vsl.relative_vertical_speed = -2.0;
        let mut cfg = terrain_cfg(30.0);

        for _ in 0..40 {
            falling_tick(&mut stage, &mut vsl, &mut cfg, &g);
        }
        cfg.vertical_mode = VerticalMode::VerticalSpeed;
        assert!(!falling_tick(&mut stage, &mut vsl, &mut cfg, &g));
        cfg.vertical_mode = VerticalMode::Altitude;
        for tick in 0..40 {
            assert!(!falling_tick(&mut stage, &mut vsl, &mut cfg, &g), "tick {tick}");
        }
    }
}
