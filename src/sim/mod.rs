pub mod driver;
pub mod event;
pub mod integrator;
pub mod plant;
pub mod runner;
pub mod scheduler;
pub mod telemetry;

pub use driver::{ActuatorCommand, Commands, Pipeline};
pub use integrator::rk4_step;
pub use plant::HoverPlant;
pub use runner::{simulate, simulate_with, SimConfig};
pub use scheduler::{DeferredAction, Scheduler};
pub use telemetry::TelemetryRecord;
