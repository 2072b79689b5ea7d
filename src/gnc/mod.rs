pub mod altitude;
pub mod attitude;
pub mod collision;
pub mod controller;
pub mod flags;
pub mod limiter;
pub mod pid;
pub mod timer;
pub mod vertical_speed;

pub use altitude::AltitudeControl;
pub use attitude::AttitudeTrim;
pub use collision::CollisionPrevention;
pub use controller::{ControlStage, TickContext};
pub use flags::ControlStateFlags;
pub use limiter::ThrustLimiter;
pub use pid::{Pid, PidGains};
pub use timer::Timer;
pub use vertical_speed::VerticalSpeedControl;
