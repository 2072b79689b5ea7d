//! Per-tick thrust allocation and cascaded vertical / attitude control for
//! vehicles with heterogeneous thrust actuators.
//!
//! The physics engine hands a [`vehicle::RawVessel`] snapshot to
//! [`sim::Pipeline::tick`] once per physics step and applies the returned
//! [`sim::Commands`].

pub mod config;
pub mod error;
pub mod gnc;
pub mod io;
pub mod physics;
pub mod sim;
pub mod util;
pub mod vehicle;

pub use config::{Globals, VerticalMode, VesselConfig};
pub use error::ConfigError;
pub use gnc::{ControlStage, ControlStateFlags, TickContext};
pub use sim::{Commands, Pipeline};
pub use vehicle::{RawVessel, VehicleState};
