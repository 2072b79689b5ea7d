use log::trace;
use nalgebra::Vector3;

use crate::config::Globals;
use crate::gnc::controller::{ControlStage, TickContext};
use crate::gnc::flags::ControlStateFlags;
use crate::physics::torque::TorqueEnvelope;
use crate::util::{clamp, clamp01, is_zero, project};
use crate::vehicle::{Actuator, Role, RoleBuckets, VehicleState};

// ---------------------------------------------------------------------------
// Limit optimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct OptimizerParams {
    pub max_iterations: usize,
    /// Relative torque error accepted as converged.
    pub precision: f64,
    /// Absolute torque error accepted as converged, N·m.
    pub torque_tolerance: f64,
    /// Largest angle between demanded and achieved torque still counted as a success, rad.
    pub angle_cutoff: f64,
    pub damping: f64,
}

impl OptimizerParams {
    pub fn from_globals(globals: &Globals, moi: &Vector3<f64>) -> Self {
        let eng = &globals.eng;
        Self {
            max_iterations: eng.max_iterations,
            precision: eng.optimization_precision,
            torque_tolerance: eng.optimization_torque_cutoff * moi.max().max(0.0),
            angle_cutoff: eng.optimization_angle_cutoff.to_radians(),
            damping: eng.step_damping,
        }
    }
}

fn achieved_torque(actuators: &[Actuator], idx: &[usize], base: &Vector3<f64>) -> Vector3<f64> {
    idx.iter()
        .fold(*base, |acc, &i| acc + actuators[i].current_torque * actuators[i].limit)
}

/// Adjust the limits of `idx` so that together with `base` they produce
/// `needed` torque. Limits start from their current values and stay in
/// [0, 1]. Returns false when the result misses the demand.
///
/// Projected gradient descent on the squared torque error with an exact
/// line search per step. Each actuator's gradient is weighted by its torque
/// ratio, so engines firing mostly through the center of mass are moved less.
pub fn optimize_limits_for_torque(
    actuators: &mut [Actuator],
    idx: &[usize],
    needed: &Vector3<f64>,
    base: &Vector3<f64>,
    params: &OptimizerParams,
) -> bool {
    if idx.is_empty() {
        return true;
    }
    let tolerance = (params.precision * needed.norm()).max(params.torque_tolerance);
    let mut best_error = f64::INFINITY;
    let mut grad = vec![0.0; idx.len()];
    for _ in 0..params.max_iterations {
        let error_v = achieved_torque(actuators, idx, base) - needed;
        let error = error_v.norm();
        if error < best_error {
            best_error = error;
            for &i in idx {
                actuators[i].best_limit = actuators[i].limit;
            }
        }
        if error <= tolerance {
            break;
        }
        let mut direction = Vector3::zeros();
        for (k, &i) in idx.iter().enumerate() {
            let a = &actuators[i];
            let g = a.torque_ratio * a.current_torque.dot(&error_v);
            // Actuators pinned at a bound in the descent direction drop out.
            let pinned = (a.limit >= 1.0 && g < 0.0) || (a.limit <= 0.0 && g > 0.0);
            grad[k] = if pinned { 0.0 } else { g };
            direction += a.current_torque * grad[k];
        }
        let d2 = direction.norm_squared();
        if d2 <= f64::EPSILON {
            break;
        }
        let step = params.damping * error_v.dot(&direction) / d2;
        let mut moved = false;
        for (k, &i) in idx.iter().enumerate() {
            let a = &mut actuators[i];
            let limit = clamp01(a.limit - step * grad[k]);
            moved |= (limit - a.limit).abs() > 1e-9;
            a.limit = limit;
        }
        if !moved {
            break;
        }
    }
    for &i in idx {
        actuators[i].limit = actuators[i].best_limit;
    }

    if best_error <= tolerance {
        return true;
    }
    let achieved = achieved_torque(actuators, idx, base);
    if is_zero(needed) || is_zero(&achieved) {
        return false;
    }
    achieved.angle(needed) <= params.angle_cutoff
}

/// Scale limits so the strongest of `idx` runs at full limit.
pub fn normalize_limits(actuators: &mut [Actuator], idx: &[usize]) {
    let max = idx.iter().map(|&i| actuators[i].limit).fold(0.0, f64::max);
    if max <= 0.0 {
        return;
    }
    for &i in idx {
        let a = &mut actuators[i];
        a.limit = clamp01(a.limit / max);
        a.best_limit = a.limit;
    }
}

/// Start each actuator from the share of `translation` it can provide.
pub fn preset_limits_for_translation(actuators: &mut [Actuator], idx: &[usize], translation: &Vector3<f64>) {
    for &i in idx {
        let a = &mut actuators[i];
        let preset = clamp01(a.thrust_direction.dot(translation));
        a.preset_limit = Some(preset);
        a.limit = preset;
        a.best_limit = preset;
    }
}

// ---------------------------------------------------------------------------
// Engine tuning
// ---------------------------------------------------------------------------

/// Apply the vertical speed factor to active engines and refresh their
/// current torque.
///
/// When the engines are unbalanced even at minimum throttle, the factor is
/// kept high enough for the opposing engines to cancel that imbalance.
pub fn tune_engines(vsl: &mut VehicleState, balance_correction: f64) {
    let main = vsl.main_throttle;
    if !vsl.flags.is_effective(ControlStateFlags::VERTICAL_SPEED_CONTROL) {
        for &i in &vsl.active_engines {
            let e = &mut vsl.engines[i];
            e.vsf = 1.0;
            e.throttle = main;
            e.set_current_torque(main);
        }
        return;
    }

    let engines = &vsl.engines;
    let active = &vsl.active_engines;
    let min_imbalance: Vector3<f64> = active.iter().map(|&i| engines[i].torque(0.0)).sum();
    if !is_zero(&min_imbalance) {
        let anti: Vector3<f64> = active
            .iter()
            .map(|&i| &engines[i])
            .filter(|e| e.specific_torque.dot(&min_imbalance) < 0.0)
            .map(|e| e.specific_torque * e.nominal_thrust(1.0))
            .sum();
        let anti_m = project(&anti, &min_imbalance).norm();
        // Nothing can counter the imbalance: only full thrust keeps it relatively small.
        let floor = if anti_m > 0.0 {
            clamp01(min_imbalance.norm() / anti_m * balance_correction)
        } else {
            1.0
        };
        vsl.vsf = clamp(vsl.vsf, floor, 1.0);
    }

    let (vsf, min_vsf) = (vsl.vsf, vsl.min_vsf);
    for &i in &vsl.active_engines {
        let e = &mut vsl.engines[i];
        if e.is_vsc() {
            e.vsf = if e.vsf > 0.0 { vsf } else { min_vsf };
            e.throttle = e.vsf * main;
        } else {
            e.vsf = 1.0;
            e.throttle = main;
        }
        e.set_current_torque(e.throttle);
    }
}

/// Commit optimized limits as thrust limits.
pub fn set_thrust_limiters(vsl: &mut VehicleState) {
    for &i in &vsl.active_engines {
        let e = &mut vsl.engines[i];
        if e.role != Role::Manual {
            e.thrust_limit = clamp01(e.vsf * e.limit);
        }
    }
    if vsl.no_active_rcs {
        return;
    }
    for &i in &vsl.active_thrusters {
        let t = &mut vsl.thrusters[i];
        t.thrust_limit = clamp01(t.limit);
    }
}

// ---------------------------------------------------------------------------
// Limiter stage
// ---------------------------------------------------------------------------

/// Reconciles the vertical speed factor, role assignments and steering
/// demand into per-actuator thrust limits.
///
/// Reads: everything the earlier stages produced.
/// Writes: actuator limits and torque, `vsl.buckets`, `vsl.torque`,
/// the unoptimized flag.
#[derive(Debug, Default)]
pub struct ThrustLimiter {
    optimized: bool,
}

impl ThrustLimiter {
    pub fn new() -> Self {
        Self { optimized: true }
    }

    pub fn optimized(&self) -> bool {
        self.optimized
    }

    fn steer_engines(vsl: &mut VehicleState, params: &OptimizerParams) -> bool {
        let steering = vsl.effective_steering();
        let idx = vsl.buckets.steering.clone();
        let envelope: TorqueEnvelope = idx.iter().map(|&i| vsl.engines[i].current_torque).collect();
        let needed = envelope.scale(&steering);
        let ok = optimize_limits_for_torque(&mut vsl.engines, &idx, &needed, &vsl.torque, params);
        if vsl.buckets.normalize_limits {
            normalize_limits(&mut vsl.engines, &idx);
        }
        ok
    }

    fn steer_thrusters(vsl: &mut VehicleState, params: &OptimizerParams) -> bool {
        if vsl.no_active_rcs {
            return true;
        }
        let steering = vsl.effective_steering();
        let idx = vsl.active_thrusters.clone();
        let engines = &vsl.engines;
        let steering_idx = &vsl.buckets.steering;
        let engine_envelope: TorqueEnvelope = steering_idx.iter().map(|&i| engines[i].current_torque).collect();
        let base = achieved_torque(engines, steering_idx, &vsl.torque);
        let thruster_envelope: TorqueEnvelope = idx.iter().map(|&i| vsl.thrusters[i].current_torque).collect();
        let needed = (engine_envelope + thruster_envelope).scale(&steering);
        if !is_zero(&vsl.translation) {
            preset_limits_for_translation(&mut vsl.thrusters, &idx, &vsl.translation);
        }
        optimize_limits_for_torque(&mut vsl.thrusters, &idx, &needed, &base, params)
    }
}

impl ControlStage for ThrustLimiter {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let vsl = &mut *ctx.vsl;
        let globals = ctx.globals;
        tune_engines(vsl, globals.vsc.balance_correction);
        vsl.buckets = RoleBuckets::sort(&vsl.engines, &vsl.active_engines);
        let params = OptimizerParams::from_globals(globals, &vsl.moi);

        self.optimized = true;
        if !vsl.active_engines.is_empty() {
            vsl.torque = vsl.engines_torque(&vsl.buckets.manual);
            if !vsl.buckets.balanced.is_empty() {
                let balanced = vsl.buckets.balanced.clone();
                let base = vsl.torque;
                optimize_limits_for_torque(&mut vsl.engines, &balanced, &Vector3::zeros(), &base, &params);
                vsl.torque = base + vsl.engines_torque(&balanced);
            }
            let maneuver = vsl.buckets.maneuver.clone();
            let translation = vsl.translation;
            preset_limits_for_translation(&mut vsl.engines, &maneuver, &translation);
            self.optimized = Self::steer_engines(vsl, &params);
        }
        self.optimized &= Self::steer_thrusters(vsl, &params);
        if !self.optimized {
            vsl.flags.set(ControlStateFlags::UNOPTIMIZED);
        }
        set_thrust_limiters(vsl);
        trace!(
            "limiter: vsf {:.3}, {} steering, optimized {}",
            vsl.vsf,
            vsl.buckets.steering.len(),
            self.optimized
        );
    }

    fn reset(&mut self) {
        self.optimized = true;
    }

    fn name(&self) -> &str {
        "thrust limiter"
    }
}
