pub mod aerodynamics;
pub mod atmosphere;
pub mod free_fall;
pub mod gravity;
pub mod inertia;
pub mod torque;

pub use atmosphere::BodyAtmosphere;
pub use free_fall::{FallQuery, FreeFall, FreeFallEstimator, StandardFreeFall};
pub use torque::TorqueEnvelope;
