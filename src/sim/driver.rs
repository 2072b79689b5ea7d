use log::{debug, info, trace};
use nalgebra::Vector3;
use serde::Serialize;

use crate::config::{Globals, VerticalMode, VesselConfig};
use crate::gnc::altitude::AltitudeControl;
use crate::gnc::attitude::AttitudeTrim;
use crate::gnc::collision::CollisionPrevention;
use crate::gnc::controller::{ControlStage, TickContext};
use crate::gnc::flags::ControlStateFlags;
use crate::gnc::limiter::ThrustLimiter;
use crate::gnc::vertical_speed::VerticalSpeedControl;
use crate::sim::scheduler::{DeferredAction, Scheduler};
use crate::util::clamp01;
use crate::vehicle::{ActuatorId, RawVessel, VehicleState};

// ---------------------------------------------------------------------------
// Commands written back to the physics engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorCommand {
    pub id: ActuatorId,
    pub thruster: bool,
    /// Throttle the actuator receives, [0, 1].
    pub throttle: f64,
    /// Thrust limit, [0, 1].
    pub limit: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Commands {
    pub main_throttle: f64,
    pub actuators: Vec<ActuatorCommand>,
    pub steering: [f64; 3],
    pub translation: [f64; 3],
    pub flags: ControlStateFlags,
}

impl Commands {
    pub fn limit_of(&self, id: ActuatorId) -> Option<f64> {
        self.actuators.iter().find(|c| c.id == id && !c.thruster).map(|c| c.limit)
    }

    pub fn steering(&self) -> Vector3<f64> {
        Vector3::from(self.steering)
    }
}

// ---------------------------------------------------------------------------
// Pipeline driver
// ---------------------------------------------------------------------------

/// Runs the control stages once per physics tick, in a fixed order, and
/// turns the result into [`Commands`].
///
/// Order (each step depends on everything before it):
/// 1. deferred actions, vehicle state refresh
/// 2. early exit without power or active actuators
/// 3. torque envelopes and on-planet statistics
/// 4. collaborator stages (maneuver / trajectory autopilots)
/// 5. altitude stage, producing the vertical speed setpoint
/// 6. collision override of that setpoint
/// 7. vertical speed stage consuming the final setpoint, attitude trim
/// 8. limiter: tuning, classification, optimization
/// 9. command commit
pub struct Pipeline {
    pub globals: Globals,
    pub cfg: VesselConfig,
    pub vsl: VehicleState,
    altitude: AltitudeControl,
    collision: CollisionPrevention,
    vertical_speed: VerticalSpeedControl,
    attitude: AttitudeTrim,
    limiter: ThrustLimiter,
    collaborators: Vec<Box<dyn ControlStage>>,
    scheduler: Scheduler,
    vessel_id: Option<u64>,
}

impl Pipeline {
    pub fn new(globals: Globals, cfg: VesselConfig) -> Self {
        Self {
            altitude: AltitudeControl::new(&globals),
            collision: CollisionPrevention::new(),
            vertical_speed: VerticalSpeedControl::new(&globals),
            attitude: AttitudeTrim::new(&globals),
            limiter: ThrustLimiter::new(),
            collaborators: Vec::new(),
            scheduler: Scheduler::new(),
            vessel_id: None,
            vsl: VehicleState::new(),
            globals,
            cfg,
        }
    }

    /// Register a collaborator; collaborators run in registration order.
    pub fn add_stage(&mut self, stage: Box<dyn ControlStage>) {
        debug!("registered stage '{}'", stage.name());
        self.collaborators.push(stage);
    }

    pub fn altitude_control(&self) -> &AltitudeControl {
        &self.altitude
    }

    pub fn vertical_speed_control(&self) -> &VerticalSpeedControl {
        &self.vertical_speed
    }

    pub fn attitude_trim(&self) -> &AttitudeTrim {
        &self.attitude
    }

    pub fn flags(&self) -> ControlStateFlags {
        self.vsl.flags
    }

    pub fn is_pending(&self, action: DeferredAction) -> bool {
        self.scheduler.is_pending(action)
    }

    // -----------------------------------------------------------------------
    // External commands
    // -----------------------------------------------------------------------

    pub fn enable(&mut self) {
        if self.cfg.enabled {
            return;
        }
        info!("control enabled");
        self.cfg.enabled = true;
        self.vsl.request_refresh();
    }

    /// Switch control off: reset every stage and restore all limits to 100%.
    pub fn disable(&mut self) -> Commands {
        if self.cfg.enabled {
            info!("control disabled, restoring actuator limits");
        }
        self.cfg.enabled = false;
        self.reset_stages();
        self.scheduler.clear();
        self.vsl.release_limits();
        self.vsl.flags = ControlStateFlags::DISABLED;
        self.commit(false)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Option<Commands> {
        if enabled {
            self.enable();
            None
        } else {
            Some(self.disable())
        }
    }

    /// Switch to altitude hold at the vehicle's current altitude.
    pub fn hold_current_altitude(&mut self) {
        self.cfg.vertical_mode = VerticalMode::Altitude;
        self.cfg.desired_altitude = AltitudeControl::initial_altitude(&self.vsl, self.cfg.altitude_above_terrain);
        info!("holding altitude {:.1} m", self.cfg.desired_altitude);
    }

    /// The vessel's part structure changed; refresh actuators once it settles.
    pub fn on_vessel_modified(&mut self, time: f64) {
        if !self.cfg.enabled {
            return;
        }
        debug!("vessel modified at t={:.2}s", time);
        self.scheduler
            .schedule(DeferredAction::RefreshActuators, time + self.globals.timing.refresh_delay);
    }

    /// A stage fired: switch to the profile bound to it, or refresh actuators
    /// after the refresh delay.
    pub fn on_stage_activated(&mut self, stage: u32, time: f64) {
        if !self.cfg.enabled {
            return;
        }
        if self.cfg.profiles.activate_on_stage(stage, &mut self.vsl.engines) {
            return;
        }
        debug!("stage {} activated at t={:.2}s", stage, time);
        self.scheduler
            .schedule(DeferredAction::RefreshActuators, time + self.globals.timing.refresh_delay);
    }

    fn reset_stages(&mut self) {
        self.altitude.reset();
        self.collision.reset();
        self.vertical_speed.reset();
        self.attitude.reset();
        self.limiter.reset();
        for stage in self.collaborators.iter_mut() {
            stage.reset();
        }
    }

    fn run_deferred(&mut self, now: f64) {
        for action in self.scheduler.take_due(now) {
            match action {
                DeferredAction::RefreshActuators => {
                    debug!("deferred actuator refresh at t={:.2}s", now);
                    self.vsl.request_refresh();
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-tick pipeline
    // -----------------------------------------------------------------------

    pub fn tick(&mut self, raw: &RawVessel) -> Commands {
        if self.vessel_id != Some(raw.id) {
            if self.vessel_id.is_some() {
                info!("vessel changed ({:?} -> {}), resetting", self.vessel_id, raw.id);
                self.reset_stages();
                self.scheduler.clear();
            }
            self.vsl.reset();
            self.vessel_id = Some(raw.id);
        }

        // 1. state refresh
        self.run_deferred(raw.time);
        self.vsl.update_state(raw, &self.cfg);
        if !self.cfg.enabled {
            self.vsl.flags = ControlStateFlags::DISABLED;
            return self.passthrough(raw);
        }

        // 2. feasibility
        if !raw.has_power() {
            self.vsl.flags = ControlStateFlags::base(true, false, false);
            return self.passthrough(raw);
        }
        self.vsl.update_physics(raw);
        let has_active = self.vsl.check_actuators(raw, &mut self.cfg, &self.globals);
        self.vsl.flags = ControlStateFlags::base(true, true, has_active);
        if !has_active {
            return self.passthrough(raw);
        }

        // 3. torque budget, on-planet statistics
        self.vsl.update_commons(&self.globals);
        self.vsl.update_on_planet_stats(raw, &self.cfg, &self.globals);

        let mut ctx = TickContext::new(&mut self.vsl, &mut self.cfg, &self.globals);
        // 4. collaborators
        for stage in self.collaborators.iter_mut() {
            stage.update(&mut ctx);
        }
        // 5-7. vertical cascade and attitude
        self.altitude.update(&mut ctx);
        self.collision.update(&mut ctx);
        self.vertical_speed.update(&mut ctx);
        self.attitude.update(&mut ctx);
        // 8. allocation
        self.limiter.update(&mut ctx);

        trace!(
            "t={:.2} flags={} cutoff={:.2} vsf={:.3}",
            self.vsl.time, self.vsl.flags, self.cfg.vertical_cutoff, self.vsl.vsf
        );
        // 9. commit
        self.commit(true)
    }

    /// Neutral output: the pilot's input with every limit at 100%.
    fn passthrough(&mut self, raw: &RawVessel) -> Commands {
        for a in self.vsl.engines.iter_mut().chain(self.vsl.thrusters.iter_mut()) {
            a.thrust_limit = 1.0;
        }
        let mut cmd = self.commit(false);
        cmd.main_throttle = clamp01(raw.main_throttle);
        cmd
    }

    fn commit(&self, active: bool) -> Commands {
        let vsl = &self.vsl;
        let main_throttle = vsl.main_throttle;
        let rcs_throttle = if active && !vsl.no_active_rcs { 1.0 } else { 0.0 };
        let actuators = vsl
            .engines
            .iter()
            .chain(vsl.thrusters.iter())
            .map(|a| ActuatorCommand {
                id: a.id(),
                thruster: !a.is_engine(),
                throttle: if a.is_engine() { main_throttle } else { rcs_throttle },
                limit: a.thrust_limit,
            })
            .collect();
        let steering = if active { vsl.effective_steering() } else { vsl.steering };
        Commands {
            main_throttle,
            actuators,
            steering: steering.into(),
            translation: vsl.translation.into(),
            flags: vsl.flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::inertia::PartMass;
    use crate::vehicle::ActuatorSpec;
    use nalgebra::UnitQuaternion;

    fn raw() -> RawVessel {
        let mut raw = RawVessel::default();
        raw.parts = vec![PartMass {
            mass: 1000.0,
            center_of_mass: Vector3::zeros(),
            principal_moments: Vector3::new(800.0, 800.0, 500.0),
            principal_axes: UnitQuaternion::identity(),
        }];
        raw.engines = [(1.5, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)]
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| ActuatorSpec::engine(i as u32, 8000.0, Vector3::new(x, y, -1.0), Vector3::z()))
            .collect();
        raw.main_throttle = 0.5;
        raw.altitude = 100.0;
        raw
    }

    fn pipeline() -> Pipeline {
        let cfg = VesselConfig { enabled: true, ..VesselConfig::default() };
        Pipeline::new(Globals::default(), cfg)
    }

    #[test]
    fn nominal_tick_balances_asymmetric_engines() {
        let mut p = pipeline();
        let cmd = p.tick(&raw());
        assert!(p.flags().is_nominal());
        assert_eq!(cmd.actuators.len(), 4);
        // The engine on the long arm is throttled back relative to its twin.
        let long_arm = cmd.limit_of(0).unwrap_or(1.0);
        let short_arm = cmd.limit_of(1).unwrap_or(0.0);
        assert!(long_arm < short_arm);
        for c in &cmd.actuators {
            assert!((0.0..=1.0).contains(&c.limit));
            assert!((0.0..=1.0).contains(&c.throttle));
        }
    }

    #[test]
    fn no_power_gives_neutral_commands() {
        let mut p = pipeline();
        p.tick(&raw());
        let mut r = raw();
        r.time = 0.02;
        r.electric_charge = 0.0;
        let cmd = p.tick(&r);
        assert_eq!(cmd.flags, ControlStateFlags::NO_POWER);
        assert!(cmd.actuators.iter().all(|c| c.limit == 1.0));
    }

    #[test]
    fn disabled_passes_pilot_input_through() {
        let mut p = Pipeline::new(Globals::default(), VesselConfig::default());
        let cmd = p.tick(&raw());
        assert_eq!(cmd.flags, ControlStateFlags::DISABLED);
        assert_eq!(cmd.main_throttle, 0.5);
    }

    #[test]
    fn vessel_modification_schedules_one_refresh() {
        let mut p = pipeline();
        p.tick(&raw());
        p.on_vessel_modified(0.0);
        p.on_vessel_modified(0.1);
        assert!(p.is_pending(DeferredAction::RefreshActuators));
        let mut r = raw();
        r.time = 0.3;
        p.tick(&r);
        assert!(p.is_pending(DeferredAction::RefreshActuators));
        r.time = 0.6;
        p.tick(&r);
        assert!(!p.is_pending(DeferredAction::RefreshActuators));
    }

    #[test]
    fn vertical_speed_mode_sets_flag() {
        let mut p = pipeline();
        p.cfg.vertical_mode = VerticalMode::VerticalSpeed;
        let cmd = p.tick(&raw());
        assert!(cmd.flags.is_set(ControlStateFlags::VERTICAL_SPEED_CONTROL));
        assert_eq!(cmd.main_throttle, 1.0);
    }
}
