use nalgebra::Vector3;

/// Aerodynamic drag force opposing `vel` for a body with drag area `cd_a`
/// (drag coefficient times reference area, m^2) in air of `density`.
pub fn drag_force(vel: &Vector3<f64>, density: f64, cd_a: f64) -> Vector3<f64> {
    let speed = vel.norm();
    if speed > 1e-6 && density > 0.0 {
        let q_dyn = 0.5 * density * speed * speed;
        -vel / speed * (q_dyn * cd_a)
    } else {
        Vector3::zeros()
    }
}

/// Signed drag acceleration along a single (vertical) axis.
pub fn drag_accel_1d(v: f64, density: f64, cd_a: f64, mass: f64) -> f64 {
    if mass <= 0.0 {
        return 0.0;
    }
    -0.5 * density * cd_a * v * v.abs() / mass
}

/// Terminal velocity magnitude for a falling body; infinite in vacuum.
pub fn terminal_velocity(g: f64, density: f64, cd_a: f64, mass: f64) -> f64 {
    let k = density * cd_a;
    if k <= 0.0 {
        return f64::INFINITY;
    }
    (2.0 * mass * g / k).sqrt()
}
