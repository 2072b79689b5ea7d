use std::process;

use clap::Parser;
use log::{error, info, LevelFilter};
use nalgebra::Vector3;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use throttle_avionics::gnc::ControlStateFlags;
use throttle_avionics::io::{self, FlightSummary};
use throttle_avionics::sim::event::{ContactDetector, EventDetector, FlagDetector, SettledDetector};
use throttle_avionics::sim::{simulate_with, HoverPlant, Pipeline, SimConfig};
use throttle_avionics::{Globals, VerticalMode, VesselConfig};

/// Closed-loop altitude hold of a quad lander.
#[derive(Debug, Parser)]
#[command(name = "throttle-avionics", version, about)]
struct Args {
    /// Tunables file (JSON); defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    globals: Option<String>,
    /// Write per-tick telemetry as CSV
    #[arg(long, value_name = "FILE")]
    csv: Option<String>,
    /// Write the flight summary as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<String>,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    // Only fails if a logger is already installed.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto);

    let globals = match &args.globals {
        Some(path) => match Globals::from_file(path) {
            Ok(g) => g,
            Err(e) => {
                error!("{path}: {e}");
                process::exit(1);
            }
        },
        None => Globals::default(),
    };

    // -----------------------------------------------------------------------
    // Vehicle: 1.2 t quad lander, CoM shifted toward engine 0
    // -----------------------------------------------------------------------
    let mass = 1200.0;
    let engine_thrust = 6000.0; // N per engine
    let mut plant = HoverPlant::quad(mass, engine_thrust, 1.5)
        .with_com(Vector3::new(0.25, 0.0, 0.0))
        .with_wheels(Vector3::new(500.0, 500.0, 300.0));

    let first_target = 50.0;
    let second_target = 20.0;
    let cfg = VesselConfig {
        enabled: true,
        vertical_mode: VerticalMode::Altitude,
        desired_altitude: first_target,
        ..VesselConfig::default()
    };
    let mut pipeline = Pipeline::new(globals, cfg);

    // -----------------------------------------------------------------------
    // Run: climb and hold, then step down
    // -----------------------------------------------------------------------
    let mut detectors: Vec<Box<dyn EventDetector>> = vec![
        Box::new(ContactDetector),
        Box::new(FlagDetector::new(ControlStateFlags::UNOPTIMIZED)),
        Box::new(SettledDetector::new(1.0)),
    ];
    let (mut records, mut events) =
        simulate_with(&mut plant, &mut pipeline, &SimConfig { dt: 0.02, max_time: 30.0 }, &mut detectors);

    info!("new target altitude {:.0} m", second_target);
    pipeline.cfg.desired_altitude = second_target;
    let mut detectors: Vec<Box<dyn EventDetector>> =
        vec![Box::new(ContactDetector), Box::new(SettledDetector::new(1.0))];
    let (more_records, more_events) =
        simulate_with(&mut plant, &mut pipeline, &SimConfig { dt: 0.02, max_time: 60.0 }, &mut detectors);
    // Skip the second run's initial sample, it repeats our last one.
    records.extend(more_records.into_iter().skip(1));
    events.extend(more_events);

    let Some(summary) = FlightSummary::from_records(&records) else {
        error!("simulation produced no samples");
        process::exit(1);
    };

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    println!();
    println!("====================================================================");
    println!("  ALTITUDE HOLD: quad lander");
    println!("====================================================================");
    println!();
    println!("  Vehicle Parameters");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Mass:          {:>8.1} kg    Engines:      {:>8}",
        mass,
        plant.engines.len()
    );
    println!(
        "  Thrust/engine: {:>8.0} N     Max TWR:      {:>8.2}",
        engine_thrust,
        pipeline.vsl.max_twr
    );
    println!(
        "  CoM offset:    {:>8.2} m     Targets:      {:>4.0} / {:.0} m",
        plant.com.x, first_target, second_target
    );
    println!();

    println!("  Flight Events");
    println!("  ──────────────────────────────────────────────────────────────────");
    for e in &events {
        println!("  t={:>6.2}s   {:?}", e.time, e.kind);
    }
    println!();

    println!("  Performance Summary");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!("  Max altitude:     {:>8.1} m", summary.max_altitude);
    println!("  Final altitude:   {:>8.1} m  (target {:.0} m)", summary.final_altitude, summary.desired_altitude);
    println!("  Settling error:   {:>8.2} m", summary.settling_error);
    println!("  Max climb rate:   {:>8.1} m/s", summary.max_climb_rate);
    println!("  Max descent rate: {:>8.1} m/s", summary.max_descent_rate);
    println!("  Max body rate:    {:>8.4} rad/s", summary.max_angular_rate);
    println!("  Unoptimized:      {:>8} of {} ticks", summary.unoptimized_ticks, summary.ticks);
    println!();

    // -----------------------------------------------------------------------
    // Telemetry table (sampled)
    // -----------------------------------------------------------------------
    println!("  Telemetry");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  {:>7}  {:>8}  {:>8}  {:>8}  {:>6}  {:>6}  {:>6}",
        "t (s)", "alt (m)", "vs (m/s)", "set(m/s)", "vsf", "lim lo", "lim hi"
    );
    println!("  {}", "─".repeat(62));
    let sample_interval = (records.len() / 30).max(1);
    for (i, r) in records.iter().enumerate() {
        if i % sample_interval != 0 && i != records.len() - 1 {
            continue;
        }
        println!(
            "  {:>7.2}  {:>8.2}  {:>8.2}  {:>8.2}  {:>6.3}  {:>6.3}  {:>6.3}",
            r.time, r.altitude, r.vertical_speed, r.setpoint, r.vsf, r.min_limit, r.max_limit
        );
    }
    println!();
    println!("  Simulation: {} ticks, dt=0.02 s", records.len());
    println!("====================================================================");
    println!();

    if let Some(path) = &args.csv {
        match io::write_telemetry_file(path, &records) {
            Ok(()) => info!("telemetry written to {path}"),
            Err(e) => error!("{path}: {e}"),
        }
    }
    if let Some(path) = &args.json {
        match io::write_summary_file(path, "altitude hold", &summary) {
            Ok(()) => info!("summary written to {path}"),
            Err(e) => error!("{path}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_output_paths() {
        let args = Args::try_parse_from(["throttle-avionics", "--csv", "out.csv", "-v"]).unwrap();
        assert_eq!(args.csv.as_deref(), Some("out.csv"));
        assert!(args.json.is_none());
        assert!(args.verbose);
        assert!(Args::try_parse_from(["throttle-avionics", "--bogus"]).is_err());
    }
}
