use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::vehicle::actuator::{Actuator, ActuatorId, Role};

pub const DEFAULT_PROFILE: &str = "Default";

// ---------------------------------------------------------------------------
// Role profiles
// ---------------------------------------------------------------------------

/// Named assignment of roles to engines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleProfile {
    pub name: String,
    pub roles: BTreeMap<ActuatorId, Role>,
    /// Staging index that activates this profile.
    pub on_stage: Option<u32>,
    /// Roles were edited and must be pushed onto the engines.
    #[serde(skip)]
    pub changed: bool,
}

impl RoleProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, id: ActuatorId, role: Role) -> Self {
        self.set_role(id, role);
        self
    }

    pub fn activated_on_stage(mut self, stage: u32) -> Self {
        self.on_stage = Some(stage);
        self
    }

    pub fn set_role(&mut self, id: ActuatorId, role: Role) {
        self.roles.insert(id, role);
        self.changed = true;
    }

    /// Register unknown engines with their current role and assign the stored
    /// role to known ones. Returns the number of engines registered.
    pub fn update(&mut self, engines: &mut [Actuator]) -> usize {
        let mut added = 0;
        for e in engines.iter_mut() {
            match self.roles.get(&e.id()) {
                Some(&role) => e.role = role,
                None => {
                    self.roles.insert(e.id(), e.role);
                    added += 1;
                }
            }
        }
        if added > 0 {
            debug!("profile '{}': registered {} engine(s)", self.name, added);
        }
        added
    }

    /// Push every stored role onto the engines.
    pub fn apply(&mut self, engines: &mut [Actuator]) {
        self.update(engines);
        self.changed = false;
    }
}

// ---------------------------------------------------------------------------
// Profile set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSet {
    pub profiles: Vec<RoleProfile>,
    pub active: usize,
}

impl ProfileSet {
    pub fn add(&mut self, profile: RoleProfile) {
        self.profiles.push(profile);
    }

    pub fn active(&self) -> Option<&RoleProfile> {
        self.profiles.get(self.active)
    }

    /// Active profile, creating the default one if the set is empty.
    pub fn active_mut(&mut self) -> &mut RoleProfile {
        if self.profiles.is_empty() {
            info!("no engine profiles configured, creating '{}'", DEFAULT_PROFILE);
            self.profiles.push(RoleProfile::new(DEFAULT_PROFILE));
        }
        if self.active >= self.profiles.len() {
            self.active = 0;
        }
        &mut self.profiles[self.active]
    }

    /// Bring engine roles in line with the active profile.
    pub fn sync(&mut self, engines: &mut [Actuator]) {
        let profile = self.active_mut();
        if profile.changed {
            profile.apply(engines);
        } else {
            profile.update(engines);
        }
    }

    pub fn activate(&mut self, name: &str, engines: &mut [Actuator]) -> bool {
        match self.profiles.iter().position(|p| p.name == name) {
            Some(i) => {
                self.switch_to(i, engines);
                true
            }
            None => false,
        }
    }

    /// Switch to the profile bound to `stage`, if any. Returns true when a
    /// profile was activated.
    pub fn activate_on_stage(&mut self, stage: u32, engines: &mut [Actuator]) -> bool {
        match self.profiles.iter().position(|p| p.on_stage == Some(stage)) {
            Some(i) if i != self.active => {
                self.switch_to(i, engines);
                true
            }
            _ => false,
        }
    }

    fn switch_to(&mut self, i: usize, engines: &mut [Actuator]) {
        self.active = i;
        let profile = &mut self.profiles[i];
        info!("activating engine profile '{}'", profile.name);
        profile.apply(engines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::actuator::ActuatorSpec;
    use nalgebra::Vector3;

    fn engines(n: u32) -> Vec<Actuator> {
        (0..n)
            .map(|i| Actuator::new(ActuatorSpec::engine(i, 100.0, Vector3::zeros(), Vector3::z())))
            .collect()
    }

    #[test]
    fn default_profile_is_created_on_demand() {
        let mut set = ProfileSet::default();
        let mut es = engines(3);
        set.sync(&mut es);
        assert_eq!(set.active().map(|p| p.name.as_str()), Some(DEFAULT_PROFILE));
        assert_eq!(set.active().map(|p| p.roles.len()), Some(3));
    }

    #[test]
    fn stored_roles_survive_reenumeration() {
        let mut set = ProfileSet::default();
        set.add(RoleProfile::new("hover").with_role(1, Role::Balance));
        let mut es = engines(3);
        set.sync(&mut es);
        assert_eq!(es[1].role, Role::Balance);

        let mut fresh = engines(3);
        set.sync(&mut fresh);
        assert_eq!(fresh[1].role, Role::Balance);
        assert_eq!(fresh[0].role, Role::Main);
    }

    #[test]
    fn stage_activation_switches_profile() {
        let mut set = ProfileSet::default();
        set.add(RoleProfile::new("ascent"));
        set.add(RoleProfile::new("landing").with_role(0, Role::Manual).activated_on_stage(2));
        let mut es = engines(2);
        set.sync(&mut es);
        assert!(!set.activate_on_stage(1, &mut es));
        assert!(set.activate_on_stage(2, &mut es));
        assert_eq!(es[0].role, Role::Manual);
        assert!(!set.activate_on_stage(2, &mut es));
    }
}
