use crate::physics::aerodynamics::{drag_accel_1d, terminal_velocity};
use crate::physics::atmosphere::BodyAtmosphere;

// ---------------------------------------------------------------------------
// Free-fall time estimation
// ---------------------------------------------------------------------------

/// Smallest gravity / time value the estimators divide by.
const MIN_DIVISOR: f64 = 1e-5;

/// A ballistic fall to be estimated.
#[derive(Debug, Clone, Copy)]
pub struct FallQuery {
    pub altitude: f64,       // m, absolute altitude at the start of the fall
    pub height: f64,         // m, distance to fall (>= 0)
    pub vertical_speed: f64, // m/s, positive up
    pub g: f64,              // m/s^2
    pub mass: f64,           // kg
    pub drag_area: f64,      // m^2, Cd·A
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeFall {
    /// Seconds until the fall distance is covered; always finite and > 0.
    pub time: f64,
    /// Terminal velocity at the end of the fall; infinite without air.
    pub terminal_velocity: f64,
}

/// Estimates how long an unpowered vehicle takes to fall a given height.
pub trait FreeFallEstimator {
    fn free_fall(&self, query: &FallQuery, air: &BodyAtmosphere) -> FreeFall;
}

/// Closed-form fall under constant gravity with no drag.
pub fn vacuum_free_fall(q: &FallQuery) -> FreeFall {
    let h = q.height.max(0.0);
    let v = q.vertical_speed;
    let time = if q.g > MIN_DIVISOR {
        (v + (v * v + 2.0 * q.g * h).sqrt()) / q.g
    } else if v < 0.0 {
        h / -v
    } else {
        f64::MAX
    };
    FreeFall {
        time: time.max(MIN_DIVISOR),
        terminal_velocity: f64::INFINITY,
    }
}

/// Step-integrated fall through the body's atmosphere.
///
/// Constant-acceleration position update per step with linear interpolation
/// of the ground crossing; in vanishing air this converges to
/// [`vacuum_free_fall`] to within one step.
pub fn atmospheric_free_fall(q: &FallQuery, air: &BodyAtmosphere, dt: f64, max_time: f64) -> FreeFall {
    let ground = q.altitude - q.height.max(0.0);
    let mut h = q.height.max(0.0);
    let mut v = q.vertical_speed;
    let mut t = 0.0;
    while h > 0.0 && t < max_time {
        let rho = air.density(ground + h);
        let a = -q.g + drag_accel_1d(v, rho, q.drag_area, q.mass);
        let dh = v * dt + 0.5 * a * dt * dt;
        if h + dh <= 0.0 {
            t += dt * h / -dh;
            h = 0.0;
            break;
        }
        h += dh;
        v += a * dt;
        t += dt;
    }
    if h > 0.0 {
        t = max_time;
    }
    FreeFall {
        time: t.max(MIN_DIVISOR),
        terminal_velocity: terminal_velocity(q.g, air.density(ground), q.drag_area, q.mass),
    }
}

/// Default estimator: integrates through air when the air at the end of the
/// fall is dense enough to matter, otherwise uses the vacuum formula.
#[derive(Debug, Clone, Copy)]
pub struct StandardFreeFall {
    pub dt: f64,
    pub max_time: f64,
}

impl Default for StandardFreeFall {
    fn default() -> Self {
        Self { dt: 0.02, max_time: 600.0 }
    }
}

impl FreeFallEstimator for StandardFreeFall {
    fn free_fall(&self, query: &FallQuery, air: &BodyAtmosphere) -> FreeFall {
        let ground = query.altitude - query.height.max(0.0);
        if air.is_dense_at(ground) && query.drag_area > 0.0 && query.mass > 0.0 {
            atmospheric_free_fall(query, air, self.dt, self.max_time)
        } else {
            vacuum_free_fall(query)
        }
    }
}
