use std::iter::Sum;
use std::ops::{Add, AddAssign};

use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Torque envelope: max positive / max negative torque per control axis
// ---------------------------------------------------------------------------

/// Six-component torque bound of an actuator set.
///
/// Both halves hold magnitudes (every component is >= 0): `positive[i]` is the
/// total torque the set can produce in the +i direction, `negative[i]` in the
/// -i direction. Built only by accumulation, so the result does not depend on
/// the order the contributions arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TorqueEnvelope {
    pub positive: Vector3<f64>,
    pub negative: Vector3<f64>,
}

impl TorqueEnvelope {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Accumulate one signed torque contribution.
    pub fn accumulate(&mut self, torque: &Vector3<f64>) {
        for i in 0..3 {
            let t = torque[i];
            if t > 0.0 {
                self.positive[i] += t;
            } else {
                self.negative[i] -= t;
            }
        }
    }

    /// Per-axis maximum authority regardless of sign.
    pub fn max(&self) -> Vector3<f64> {
        self.positive.sup(&self.negative)
    }

    pub fn is_zero(&self) -> bool {
        self.positive.iter().chain(self.negative.iter()).all(|c| *c <= 0.0)
    }

    /// Map a normalized demand in [-1, 1] per axis onto achievable torque,
    /// using the half of the envelope matching each component's sign.
    pub fn scale(&self, demand: &Vector3<f64>) -> Vector3<f64> {
        Vector3::from_fn(|i, _| {
            let d = demand[i].clamp(-1.0, 1.0);
            if d >= 0.0 {
                d * self.positive[i]
            } else {
                d * self.negative[i]
            }
        })
    }
}

impl AddAssign for TorqueEnvelope {
    fn add_assign(&mut self, rhs: Self) {
        self.positive += rhs.positive;
        self.negative += rhs.negative;
    }
}

impl Add for TorqueEnvelope {
    type Output = TorqueEnvelope;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl<'a> FromIterator<&'a Vector3<f64>> for TorqueEnvelope {
    fn from_iter<I: IntoIterator<Item = &'a Vector3<f64>>>(iter: I) -> Self {
        let mut env = TorqueEnvelope::zero();
        for t in iter {
            env.accumulate(t);
        }
        env
    }
}

impl FromIterator<Vector3<f64>> for TorqueEnvelope {
    fn from_iter<I: IntoIterator<Item = Vector3<f64>>>(iter: I) -> Self {
        iter.into_iter().fold(TorqueEnvelope::zero(), |mut env, t| {
            env.accumulate(&t);
            env
        })
    }
}

impl Sum for TorqueEnvelope {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TorqueEnvelope::zero(), |a, b| a + b)
    }
}

// ---------------------------------------------------------------------------
// Angular acceleration budget
// ---------------------------------------------------------------------------

/// Component-wise `torque / moi`; axes with zero inertia report `f64::MAX`.
pub fn angular_acceleration(torque: &Vector3<f64>, moi: &Vector3<f64>) -> Vector3<f64> {
    Vector3::from_fn(|i, _| if moi[i] != 0.0 { torque[i] / moi[i] } else { f64::MAX })
}
