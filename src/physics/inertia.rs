use nalgebra::{Matrix3, UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Vehicle inertia tensor from rigid parts
// ---------------------------------------------------------------------------

/// Mass properties of one rigid part, as reported by the physics engine.
#[derive(Debug, Clone)]
pub struct PartMass {
    pub mass: f64,                           // kg
    pub center_of_mass: Vector3<f64>,        // m, world frame
    pub principal_moments: Vector3<f64>,     // kg·m^2, about the part's own CoM
    pub principal_axes: UnitQuaternion<f64>, // principal axes → world
}

/// Total mass and center of mass of a set of parts.
///
/// Returns `(0, origin)` for an empty or massless set.
pub fn center_of_mass(parts: &[PartMass]) -> (f64, Vector3<f64>) {
    let mass: f64 = parts.iter().map(|p| p.mass).sum();
    if mass <= 0.0 {
        return (0.0, Vector3::zeros());
    }
    let weighted = parts
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.center_of_mass * p.mass);
    (mass, weighted / mass)
}

/// Inertia tensor about `com`, expressed in the frame whose orientation
/// (frame → world) is `frame`.
///
/// Each part contributes its own rotated principal tensor plus the
/// parallel-axis term for its offset from the common center of mass.
pub fn inertia_tensor(
    parts: &[PartMass],
    com: &Vector3<f64>,
    frame: &UnitQuaternion<f64>,
) -> Matrix3<f64> {
    let to_frame = frame.inverse();
    let mut tensor = Matrix3::zeros();
    for p in parts {
        let rot = (to_frame * p.principal_axes).to_rotation_matrix();
        let r = rot.matrix();
        tensor += r * Matrix3::from_diagonal(&p.principal_moments) * r.transpose();

        let offset = to_frame * (p.center_of_mass - com);
        tensor += (Matrix3::identity() * offset.norm_squared() - offset * offset.transpose())
            * p.mass;
    }
    tensor
}

/// Moments of inertia about the axes of the tensor's frame.
pub fn principal_moments(tensor: &Matrix3<f64>) -> Vector3<f64> {
    tensor.diagonal()
}
