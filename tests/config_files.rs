use std::fs;

use throttle_avionics::vehicle::Role;
use throttle_avionics::{ConfigError, Globals, VerticalMode, VesselConfig};

#[test]
fn globals_survive_a_trip_through_disk() {
    let mut g = Globals::default();
    g.vsc.max_speed = 12.5;
    g.alt.rocket_pid.i = 0.25;
    let path = std::env::temp_dir().join(format!("throttle-avionics-globals-{}.json", std::process::id()));
    fs::write(&path, g.to_json().unwrap()).unwrap();

    let loaded = Globals::from_file(&path).unwrap();
    fs::remove_file(&path).ok();
    assert_eq!(loaded.vsc.max_speed, 12.5);
    assert_eq!(loaded.alt.rocket_pid.i, 0.25);
    assert_eq!(loaded.timing.refresh_delay, 0.5);
}

#[test]
fn invalid_values_name_the_field() {
    let err = Globals::from_json_str(r#"{ "eng": { "flameout_recovery_limit": 2.0 } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "eng.flameout_recovery_limit", .. }));
    assert!(err.to_string().contains("eng.flameout_recovery_limit"));
}

#[test]
fn vessel_config_with_profiles() {
    let cfg = VesselConfig::from_json_str(
        r#"{
            "enabled": true,
            "vertical_mode": "VerticalSpeed",
            "vertical_cutoff": 3.0,
            "profiles": {
                "profiles": [
                    { "name": "Hover", "roles": { "0": "Main", "1": "Balance" } },
                    { "name": "Cruise", "roles": { "1": "Maneuver" }, "on_stage": 1 }
                ],
                "active": 0
            }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.vertical_mode, VerticalMode::VerticalSpeed);
    assert!(!cfg.altitude_enabled());
    let active = cfg.profiles.active().unwrap();
    assert_eq!(active.name, "Hover");
    assert_eq!(active.roles.get(&1), Some(&Role::Balance));
    assert_eq!(cfg.profiles.profiles[1].on_stage, Some(1));
}

#[test]
fn non_finite_setpoint_is_rejected() {
    // Out of f64 range.
    let err = VesselConfig::from_json_str(r#"{ "vertical_cutoff": 1e400 }"#);
    assert!(err.is_err());
}
