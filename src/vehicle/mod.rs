pub mod actuator;
pub mod classify;
pub mod profile;
pub mod raw;
pub mod state;

pub use actuator::{Actuator, ActuatorId, ActuatorKind, ActuatorSpec, ReactionWheel, Response, Role};
pub use classify::RoleBuckets;
pub use profile::{ProfileSet, RoleProfile};
pub use raw::{RadarReport, RawVessel};
pub use state::VehicleState;
