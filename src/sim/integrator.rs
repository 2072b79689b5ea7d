use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Translational state of the test plant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMass {
    pub pos: Vector3<f64>, // m, local ENU, z = altitude
    pub vel: Vector3<f64>, // m/s
}

#[derive(Debug, Clone, Copy)]
pub struct PointDeriv {
    pub dpos: Vector3<f64>,
    pub dvel: Vector3<f64>,
}

impl PointMass {
    pub fn apply(&self, d: &PointDeriv, dt: f64) -> PointMass {
        PointMass {
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
        }
    }
}

/// Single RK4 step. `accel` gives the acceleration at an intermediate state;
/// forces that depend on the commands are held constant over the step.
pub fn rk4_step<F>(state: &PointMass, dt: f64, accel: F) -> PointMass
where
    F: Fn(&PointMass) -> Vector3<f64>,
{
    let deriv = |s: &PointMass| PointDeriv { dpos: s.vel, dvel: accel(s) };
    let k1 = deriv(state);
    let k2 = deriv(&state.apply(&k1, dt * 0.5));
    let k3 = deriv(&state.apply(&k2, dt * 0.5));
    let k4 = deriv(&state.apply(&k3, dt));

    PointMass {
        pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
    }
}
