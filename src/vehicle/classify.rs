use crate::vehicle::actuator::{Actuator, Role};

// ---------------------------------------------------------------------------
// Actuator classification
// ---------------------------------------------------------------------------

/// Indices of operational actuators.
pub fn active_indices(actuators: &[Actuator]) -> Vec<usize> {
    actuators
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_operational())
        .map(|(i, _)| i)
        .collect()
}

/// Active engines partitioned by role. Indices refer to the engine list the
/// buckets were sorted from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleBuckets {
    /// Main and maneuver engines.
    pub steering: Vec<usize>,
    pub maneuver: Vec<usize>,
    pub balanced: Vec<usize>,
    pub manual: Vec<usize>,
    /// Scale optimized limits so the strongest engine runs at full limit.
    pub normalize_limits: bool,
}

impl RoleBuckets {
    pub fn sort(engines: &[Actuator], active: &[usize]) -> Self {
        let mut b = RoleBuckets::default();
        for &i in active {
            match engines[i].role {
                Role::Main => b.steering.push(i),
                Role::Maneuver => {
                    b.steering.push(i);
                    b.maneuver.push(i);
                }
                Role::Balance => b.balanced.push(i),
                Role::Manual => b.manual.push(i),
            }
        }
        b.normalize_limits = b.steering.len() > b.maneuver.len();
        b
    }

    pub fn clear(&mut self) {
        *self = RoleBuckets::default();
    }
}
