use nalgebra::Vector3;

use throttle_avionics::gnc::ControlStateFlags;
use throttle_avionics::io::FlightSummary;
use throttle_avionics::sim::event::{ContactDetector, EventDetector, EventKind};
use throttle_avionics::sim::plant::Obstacle;
use throttle_avionics::sim::{simulate, simulate_with, HoverPlant, Pipeline, SimConfig};
use throttle_avionics::{Globals, VerticalMode, VesselConfig};

fn pipeline(mode: VerticalMode, desired_altitude: f64, vertical_cutoff: f64) -> Pipeline {
    let cfg = VesselConfig {
        enabled: true,
        vertical_mode: mode,
        desired_altitude,
        vertical_cutoff,
        ..VesselConfig::default()
    };
    Pipeline::new(Globals::default(), cfg)
}

#[test]
fn vertical_speed_hold_tracks_setpoint() {
    let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0).with_altitude(50.0);
    let mut p = pipeline(VerticalMode::VerticalSpeed, 0.0, 2.0);
    let records = simulate(&mut plant, &mut p, &SimConfig { dt: 0.02, max_time: 15.0 });
    let tail = &records[records.len() - 100..];
    for r in tail {
        assert!((r.vertical_speed - 2.0).abs() < 0.5, "v={} at t={}", r.vertical_speed, r.time);
    }
}

#[test]
fn offset_center_of_mass_is_trimmed_out() {
    let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0)
        .with_com(Vector3::new(0.3, 0.0, 0.0))
        .with_altitude(20.0);
    let mut p = pipeline(VerticalMode::Altitude, 20.0, 0.0);
    let records = simulate(&mut plant, &mut p, &SimConfig { dt: 0.02, max_time: 10.0 });
    let summary = FlightSummary::from_records(&records).expect("records");
    assert!(summary.max_angular_rate < 0.2, "body rate {}", summary.max_angular_rate);
    // The engine on the short arm is the one throttled back.
    let last = records.last().expect("records");
    assert!(last.min_limit < last.max_limit);
}

#[test]
fn takeoff_and_climb_to_desired_altitude() {
    let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0);
    let mut p = pipeline(VerticalMode::Altitude, 25.0, 0.0);
    let mut detectors: Vec<Box<dyn EventDetector>> = vec![Box::new(ContactDetector)];
    let (records, events) =
        simulate_with(&mut plant, &mut p, &SimConfig { dt: 0.02, max_time: 45.0 }, &mut detectors);

    assert_eq!(events.first().map(|e| &e.kind), Some(&EventKind::Liftoff));
    let last = records.last().expect("records");
    assert!((last.altitude - 25.0).abs() < 8.0, "altitude {}", last.altitude);
    assert!(records.iter().skip(1).all(|r| r.flags.is_set(ControlStateFlags::ALTITUDE_CONTROL)));
}

#[test]
fn obstacle_makes_vehicle_climb() {
    let mut plant = HoverPlant::quad(1000.0, 5000.0, 1.0).with_altitude(20.0);
    plant.state.vel.x = 5.0;
    plant.drag_area = 0.0;
    plant.obstacle = Some(Obstacle { x: 40.0, top: 35.0 });
    let mut p = pipeline(VerticalMode::VerticalSpeed, 0.0, 0.0);
    let records = simulate(&mut plant, &mut p, &SimConfig { dt: 0.02, max_time: 7.5 });

    assert!(records.iter().any(|r| r.setpoint > 0.0));
    let alert = ControlStateFlags::OBSTACLE_AHEAD | ControlStateFlags::GROUND_COLLISION;
    assert!(records.iter().any(|r| r.flags.bits() & alert.bits() != 0));
    assert!(plant.altitude() > 25.0, "altitude {}", plant.altitude());
}
