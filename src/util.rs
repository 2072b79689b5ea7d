use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------
//
// `f64::clamp` panics when `min > max`; the bounds used by the control stages
// are computed from live vehicle data and can cross, so these helpers never
// panic.

/// Clamp `v` into `[lo, hi]`. The lower bound is tested first, so with crossed
/// bounds a value below `lo` gets `lo` and any other value gets `hi`.
pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Clamp from below.
pub fn clamp_l(v: f64, lo: f64) -> f64 {
    if v < lo { lo } else { v }
}

/// Clamp from above.
pub fn clamp_h(v: f64, hi: f64) -> f64 {
    if v > hi { hi } else { v }
}

pub fn clamp01(v: f64) -> f64 {
    clamp(v, 0.0, 1.0)
}

/// Exponentially weighted average: `old` moved toward `new` by `ratio`.
pub fn ewa(old: f64, new: f64, ratio: f64) -> f64 {
    (1.0 - ratio) * old + ratio * new
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * clamp01(t)
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

pub fn is_zero(v: &Vector3<f64>) -> bool {
    v.norm_squared() < 1e-12
}

/// Scale a vector so that its largest component has unit magnitude,
/// returning the point on the unit cube in the same direction.
pub fn cube_norm(v: &Vector3<f64>) -> Vector3<f64> {
    let m = v.amax();
    if m > 0.0 { v / m } else { Vector3::zeros() }
}

pub fn clamp_components(v: &Vector3<f64>, lo: f64, hi: f64) -> Vector3<f64> {
    v.map(|c| clamp(c, lo, hi))
}

/// Vector projection of `v` onto `onto`.
pub fn project(v: &Vector3<f64>, onto: &Vector3<f64>) -> Vector3<f64> {
    let n2 = onto.norm_squared();
    if n2 > 0.0 { onto * (v.dot(onto) / n2) } else { Vector3::zeros() }
}

/// Component of `v` orthogonal to `normal`.
pub fn project_on_plane(v: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    v - project(v, normal)
}
