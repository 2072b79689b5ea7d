use nalgebra::Vector3;

/// Standard gravity, m/s^2.
pub const G0: f64 = 9.80665;

/// Gravitational acceleration magnitude at `altitude` above a body with the
/// given surface gravity and mean radius (inverse-square falloff).
pub fn gravity_at(surface_g: f64, body_radius: f64, altitude: f64) -> f64 {
    if body_radius <= 0.0 {
        return surface_g;
    }
    let alt = altitude.max(0.0);
    surface_g * (body_radius / (body_radius + alt)).powi(2)
}

/// Gravity vector pointing against the local `up` direction.
pub fn gravity_accel(g: f64, up: &Vector3<f64>) -> Vector3<f64> {
    -up * g
}
