use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gnc::pid::PidGains;
use crate::vehicle::profile::ProfileSet;

// ---------------------------------------------------------------------------
// Global tunables
// ---------------------------------------------------------------------------

/// Engine allocation tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Exponent of the torque ratio weighting.
    pub torque_ratio_factor: f64,
    pub max_iterations: usize,
    /// Relative torque error at which the optimizer stops.
    pub optimization_precision: f64,
    /// Torque error below this angular acceleration is considered met, rad/s^2.
    pub optimization_torque_cutoff: f64,
    /// Angle between demand and achieved torque above which the pass counts as failed, deg.
    pub optimization_angle_cutoff: f64,
    /// Fraction of the computed correction applied per iteration.
    pub step_damping: f64,
    /// Minimum thrust limit commanded to a flamed-out engine so it can relight.
    pub flameout_recovery_limit: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            torque_ratio_factor: 0.1,
            max_iterations: 50,
            optimization_precision: 0.01,
            optimization_torque_cutoff: 0.005,
            optimization_angle_cutoff: 45.0,
            step_damping: 0.5,
            flameout_recovery_limit: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RcsParams {
    pub torque_ratio_factor: f64,
}

impl Default for RcsParams {
    fn default() -> Self {
        Self { torque_ratio_factor: 0.1 }
    }
}

/// Vertical speed control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VscParams {
    /// Largest vertical speed the altitude stage may request, m/s.
    pub max_speed: f64,
    pub balance_correction: f64,
    /// Angular acceleration the vehicle must retain when throttled down, rad/s^2.
    pub min_vsf_torque: f64,
    /// Slow-engine lag weighting on spool-up.
    pub accel_time_factor: f64,
    /// Slow-engine lag weighting on spool-down.
    pub decel_time_factor: f64,
    pub accel_pid: PidGains,
}

impl Default for VscParams {
    fn default() -> Self {
        Self {
            max_speed: 10.0,
            balance_correction: 1.5,
            min_vsf_torque: 1.2,
            accel_time_factor: 2.0,
            decel_time_factor: 1.0,
            accel_pid: PidGains::new(2.0, 0.1, 0.0, -20.0, 20.0),
        }
    }
}

/// Altitude control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AltParams {
    pub max_speed_error_f: f64,
    pub max_speed_low: f64,
    pub max_speed_high: f64,
    pub err_f: f64,
    /// Jets gain denominator applied to max TWR.
    pub twr_denominator: f64,
    pub rel_altitude_factor: f64,
    /// Seconds the vehicle must be falling before the alert is raised.
    pub falling_time: f64,
    /// Look-ahead used by the falling alert, s.
    pub time_ahead: f64,
    pub rocket_pid: PidGains,
    pub jets_pid: PidGains,
}

impl Default for AltParams {
    fn default() -> Self {
        let low = 10.0;
        Self {
            max_speed_error_f: 100.0,
            max_speed_low: low,
            max_speed_high: 300.0,
            err_f: 1.0,
            twr_denominator: 2.0,
            rel_altitude_factor: 50.0,
            falling_time: 1.0,
            time_ahead: 5.0,
            rocket_pid: PidGains::new(0.1, 0.5, 0.03, -low, low),
            jets_pid: PidGains::new(0.5, 0.0, 0.5, -low, low),
        }
    }
}

/// Collision prevention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpsParams {
    pub look_ahead_time: f64,
    /// Minimal clearance kept above an obstacle, m.
    pub safe_clearance: f64,
}

impl Default for CpsParams {
    fn default() -> Self {
        Self { look_ahead_time: 2.0, safe_clearance: 5.0 }
    }
}

/// Attitude trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StbParams {
    pub pid: PidGains,
    /// Angular speed below which no trim is applied, rad/s.
    pub min_angular_velocity: f64,
}

impl Default for StbParams {
    fn default() -> Self {
        Self {
            pid: PidGains::pi(1.0, 0.1, 1.0),
            min_angular_velocity: 0.01,
        }
    }
}

/// Process-wide tunables shared by all vessels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Globals {
    pub timing: TimingParams,
    pub eng: EngineParams,
    pub rcs: RcsParams,
    pub vsc: VscParams,
    pub alt: AltParams,
    pub cps: CpsParams,
    pub stb: StbParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingParams {
    /// Pilot input below this magnitude counts as no input.
    pub input_dead_zone: f64,
    /// Delay before actuator lists are rebuilt after a structural change, s.
    pub refresh_delay: f64,
    /// Horizontal speed above which terrain look-ahead applies, m/s.
    pub moving_fast_speed: f64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            input_dead_zone: 0.01,
            refresh_delay: 0.5,
            moving_fast_speed: 10.0,
        }
    }
}

impl Globals {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let globals: Globals = serde_json::from_str(s)?;
        globals.validate()?;
        Ok(globals)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_gains("vsc.accel_pid", &self.vsc.accel_pid)?;
        check_gains("alt.rocket_pid", &self.alt.rocket_pid)?;
        check_gains("alt.jets_pid", &self.alt.jets_pid)?;
        check_gains("stb.pid", &self.stb.pid)?;
        positive("vsc.max_speed", self.vsc.max_speed)?;
        positive("alt.max_speed_low", self.alt.max_speed_low)?;
        positive("alt.err_f", self.alt.err_f)?;
        positive("alt.twr_denominator", self.alt.twr_denominator)?;
        positive("alt.rel_altitude_factor", self.alt.rel_altitude_factor)?;
        positive("eng.step_damping", self.eng.step_damping)?;
        if self.alt.max_speed_high < self.alt.max_speed_low {
            return Err(ConfigError::invalid(
                "alt.max_speed_high",
                format!("must not be below max_speed_low ({})", self.alt.max_speed_low),
            ));
        }
        if self.eng.max_iterations == 0 {
            return Err(ConfigError::invalid("eng.max_iterations", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.eng.flameout_recovery_limit) {
            return Err(ConfigError::invalid("eng.flameout_recovery_limit", "must be within [0, 1]"));
        }
        if self.timing.refresh_delay < 0.0 {
            return Err(ConfigError::invalid("timing.refresh_delay", "must not be negative"));
        }
        Ok(())
    }
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {v}")))
    }
}

fn check_gains(field: &'static str, g: &PidGains) -> Result<(), ConfigError> {
    if ![g.p, g.i, g.d, g.min, g.max].iter().all(|v| v.is_finite()) {
        return Err(ConfigError::invalid(field, "gains and limits must be finite"));
    }
    if g.min > g.max {
        return Err(ConfigError::invalid(field, format!("min {} exceeds max {}", g.min, g.max)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-vessel configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VerticalMode {
    #[default]
    Off,
    /// Hold `vertical_cutoff`.
    VerticalSpeed,
    /// Hold `desired_altitude`.
    Altitude,
}

/// Settings owned by a single vessel. Stages may write the setpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselConfig {
    pub enabled: bool,
    pub vertical_mode: VerticalMode,
    pub desired_altitude: f64, // m
    pub vertical_cutoff: f64,  // m/s
    pub altitude_above_terrain: bool,
    /// Hold attitude when the pilot gives no steering input.
    pub stabilize: bool,
    pub profiles: ProfileSet,
}

impl Default for VesselConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            vertical_mode: VerticalMode::Off,
            desired_altitude: 0.0,
            vertical_cutoff: 0.0,
            altitude_above_terrain: false,
            stabilize: true,
            profiles: ProfileSet::default(),
        }
    }
}

impl VesselConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: VesselConfig = serde_json::from_str(s)?;
        if !cfg.desired_altitude.is_finite() {
            return Err(ConfigError::invalid("desired_altitude", "must be finite"));
        }
        if !cfg.vertical_cutoff.is_finite() {
            return Err(ConfigError::invalid("vertical_cutoff", "must be finite"));
        }
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn vertical_speed_enabled(&self) -> bool {
        self.vertical_mode != VerticalMode::Off
    }

    pub fn altitude_enabled(&self) -> bool {
        self.vertical_mode == VerticalMode::Altitude
    }
}
