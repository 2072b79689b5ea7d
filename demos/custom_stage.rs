use throttle_avionics::gnc::{ControlStage, TickContext};
use throttle_avionics::sim::{simulate, HoverPlant, Pipeline, SimConfig};
use throttle_avionics::{Globals, VerticalMode, VesselConfig};

/// Vertical speed schedule: climb, hover, then descend to touchdown.
/// Runs before the core stages and writes only the vertical speed setpoint.
struct HopProfile {
    climb_until: f64,
    hover_until: f64,
    climb_rate: f64,
    descent_rate: f64,
}

impl ControlStage for HopProfile {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let t = ctx.vsl.time;
        ctx.cfg.vertical_cutoff = if t < self.climb_until {
            self.climb_rate
        } else if t < self.hover_until {
            0.0
        } else {
            -self.descent_rate
        };
    }

    fn name(&self) -> &str {
        "hop profile"
    }
}

fn main() {
    let mut plant = HoverPlant::quad(800.0, 4000.0, 1.2);
    let cfg = VesselConfig {
        enabled: true,
        vertical_mode: VerticalMode::VerticalSpeed,
        ..VesselConfig::default()
    };
    let mut pipeline = Pipeline::new(Globals::default(), cfg);
    let hop = HopProfile { climb_until: 6.0, hover_until: 12.0, climb_rate: 4.0, descent_rate: 2.0 };
    println!("Flying with '{}' collaborator...", hop.name());
    pipeline.add_stage(Box::new(hop));

    let records = simulate(&mut plant, &mut pipeline, &SimConfig { dt: 0.02, max_time: 40.0 });

    let peak = records.iter().map(|r| r.altitude).fold(0.0_f64, f64::max);
    let touchdown = records.iter().skip_while(|r| r.landed).find(|r| r.landed);
    println!("Peak altitude: {:.1} m", peak);
    match touchdown {
        Some(r) => println!("Touchdown at t={:.1} s", r.time),
        None => println!("Still airborne at t={:.1} s", plant.time),
    }
    println!("Samples: {}", records.len());
}
