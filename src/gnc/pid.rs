use std::ops::{Add, Mul, Sub};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Signals a feedback controller can act on
// ---------------------------------------------------------------------------

/// Scalar or vector quantity usable as controller error and output.
pub trait Signal: Copy + PartialEq + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self> {
    fn zero() -> Self;
    /// Clamp every component into `[min, max]`.
    fn clamp_to(self, min: f64, max: f64) -> Self;
    fn magnitude(&self) -> f64;
    fn dot(&self, other: &Self) -> f64;
    fn is_finite(&self) -> bool;
}

impl Signal for f64 {
    fn zero() -> Self {
        0.0
    }

    fn clamp_to(self, min: f64, max: f64) -> Self {
        crate::util::clamp(self, min, max)
    }

    fn magnitude(&self) -> f64 {
        self.abs()
    }

    fn dot(&self, other: &Self) -> f64 {
        self * other
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

impl Signal for Vector3<f64> {
    fn zero() -> Self {
        Vector3::zeros()
    }

    fn clamp_to(self, min: f64, max: f64) -> Self {
        crate::util::clamp_components(&self, min, max)
    }

    fn magnitude(&self) -> f64 {
        self.norm()
    }

    fn dot(&self, other: &Self) -> f64 {
        Vector3::dot(self, other)
    }

    fn is_finite(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Gains
// ---------------------------------------------------------------------------

/// Controller gains and output clamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub min: f64,
    pub max: f64,
}

impl PidGains {
    pub fn new(p: f64, i: f64, d: f64, min: f64, max: f64) -> Self {
        Self { p, i, d, min, max }
    }

    /// PI gains with a symmetric clamp.
    pub fn pi(p: f64, i: f64, limit: f64) -> Self {
        Self::new(p, i, 0.0, -limit, limit)
    }
}

// ---------------------------------------------------------------------------
// PID controller
// ---------------------------------------------------------------------------

/// Clamped PID controller over any [`Signal`].
///
/// The integral is only committed while the output is unsaturated (or while
/// it shrinks), so a saturated loop does not wind up. With `sign_reset` the
/// integral is also dropped whenever the error changes sign, which trades a
/// little steady-state accuracy for much less overshoot on integrating plants.
#[derive(Debug, Clone)]
pub struct Pid<S: Signal = f64> {
    pub gains: PidGains,
    sign_reset: bool,
    integral: S,
    last_error: Option<S>,
    action: S,
}

impl<S: Signal> Pid<S> {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            sign_reset: false,
            integral: S::zero(),
            last_error: None,
            action: S::zero(),
        }
    }

    pub fn with_sign_reset(gains: PidGains) -> Self {
        Self { sign_reset: true, ..Self::new(gains) }
    }

    pub fn set_limits(&mut self, min: f64, max: f64) {
        self.gains.min = min;
        self.gains.max = max;
    }

    pub fn update(&mut self, error: S, dt: f64) -> S {
        if !error.is_finite() || dt <= 0.0 {
            return self.action;
        }
        if self.sign_reset && self.integral.dot(&error) < 0.0 {
            self.integral = S::zero();
        }
        let integral = self.integral + error * dt;
        let derivative = match self.last_error {
            Some(last) => (error - last) * (1.0 / dt),
            None => S::zero(),
        };
        let raw = error * self.gains.p + integral * self.gains.i + derivative * self.gains.d;
        let action = raw.clamp_to(self.gains.min, self.gains.max);
        if action == raw || integral.magnitude() < self.integral.magnitude() {
            self.integral = integral;
        }
        self.action = action;
        self.last_error = Some(error);
        action
    }

    /// Latest clamped output.
    pub fn action(&self) -> S {
        self.action
    }

    pub fn integral(&self) -> S {
        self.integral
    }

    pub fn reset(&mut self) {
        self.integral = S::zero();
        self.last_error = None;
        self.action = S::zero();
    }
}
