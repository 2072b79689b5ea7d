use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Control state flags
// ---------------------------------------------------------------------------

/// Bitmask of the regime conditions observed during a tick.
///
/// The three base bits form a chain: power is only meaningful once the system
/// is enabled, and active actuators only once there is power. Everything else
/// is set by individual stages and only counts while the chain is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ControlStateFlags(u32);

impl ControlStateFlags {
    pub const DISABLED: Self = Self(0);
    pub const ENABLED: Self = Self(1 << 0);
    pub const HAS_POWER: Self = Self(1 << 1);
    pub const HAS_ACTIVE_ACTUATORS: Self = Self(1 << 2);
    pub const UNOPTIMIZED: Self = Self(1 << 3);
    pub const VERTICAL_SPEED_CONTROL: Self = Self(1 << 4);
    pub const ALTITUDE_CONTROL: Self = Self(1 << 5);
    pub const LOOSING_ALTITUDE: Self = Self(1 << 6);
    pub const OBSTACLE_AHEAD: Self = Self(1 << 7);
    pub const GROUND_COLLISION: Self = Self(1 << 8);
    pub const ASCENDING: Self = Self(1 << 9);

    // Composites
    pub const NOMINAL: Self = Self(Self::ENABLED.0 | Self::HAS_POWER.0 | Self::HAS_ACTIVE_ACTUATORS.0);
    pub const NO_ACTIVE_ACTUATORS: Self = Self(Self::ENABLED.0 | Self::HAS_POWER.0);
    pub const NO_POWER: Self = Self::ENABLED;

    const NAMES: [(Self, &'static str); 10] = [
        (Self::ENABLED, "Enabled"),
        (Self::HAS_POWER, "HasPower"),
        (Self::HAS_ACTIVE_ACTUATORS, "HasActiveActuators"),
        (Self::UNOPTIMIZED, "Unoptimized"),
        (Self::VERTICAL_SPEED_CONTROL, "VerticalSpeedControl"),
        (Self::ALTITUDE_CONTROL, "AltitudeControl"),
        (Self::LOOSING_ALTITUDE, "LoosingAltitude"),
        (Self::OBSTACLE_AHEAD, "ObstacleAhead"),
        (Self::GROUND_COLLISION, "GroundCollision"),
        (Self::ASCENDING, "Ascending"),
    ];

    /// Base flags for a tick, evaluated in order. A missing prerequisite
    /// stops the chain, so e.g. active actuators without power stay unset.
    pub fn base(enabled: bool, has_power: bool, has_active: bool) -> Self {
        if !enabled {
            return Self::DISABLED;
        }
        if !has_power {
            return Self::NO_POWER;
        }
        if !has_active {
            return Self::NO_ACTIVE_ACTUATORS;
        }
        Self::NOMINAL
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn set(&mut self, flag: Self) {
        self.0 |= flag.0;
    }

    /// True when every bit of `flag` is set.
    pub fn is_set(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_nominal(self) -> bool {
        self.is_set(Self::NOMINAL)
    }

    /// True when `flag` is set and its prerequisites hold.
    pub fn is_effective(self, flag: Self) -> bool {
        let prerequisite = if flag == Self::ENABLED {
            Self::DISABLED
        } else if flag == Self::HAS_POWER {
            Self::ENABLED
        } else if flag == Self::HAS_ACTIVE_ACTUATORS {
            Self::NO_ACTIVE_ACTUATORS
        } else {
            Self::NOMINAL
        };
        self.is_set(prerequisite) && self.is_set(flag)
    }
}

impl BitOr for ControlStateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ControlStateFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ControlStateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "Disabled");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.is_set(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}
