use log::info;

use crate::sim::driver::{Commands, Pipeline};
use crate::sim::event::{EventDetector, SimEvent};
use crate::sim::plant::HoverPlant;
use crate::sim::telemetry::TelemetryRecord;

#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub dt: f64,       // s
    pub max_time: f64, // s
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { dt: 0.02, max_time: 60.0 }
    }
}

// ---------------------------------------------------------------------------
// Closed-loop simulation
// ---------------------------------------------------------------------------

/// Run the pipeline against the plant until `max_time`, feeding every pair
/// of consecutive samples to the detectors.
pub fn simulate_with(
    plant: &mut HoverPlant,
    pipeline: &mut Pipeline,
    config: &SimConfig,
    detectors: &mut [Box<dyn EventDetector>],
) -> (Vec<TelemetryRecord>, Vec<SimEvent>) {
    let capacity = ((config.max_time / config.dt) as usize + 1).min(200_000);
    let mut records: Vec<TelemetryRecord> = Vec::with_capacity(capacity);
    let mut events = Vec::new();
    let initial = Commands { flags: pipeline.flags(), ..Commands::default() };
    records.push(TelemetryRecord::capture(plant, pipeline, &initial));

    while plant.time < config.max_time {
        let raw = plant.raw(config.dt);
        let cmd = pipeline.tick(&raw);
        plant.step(&cmd, config.dt);

        let record = TelemetryRecord::capture(plant, pipeline, &cmd);
        if let Some(prev) = records.last() {
            for det in detectors.iter_mut() {
                if let Some(kind) = det.check(prev, &record) {
                    info!("t={:.2}s {:?}", record.time, kind);
                    events.push(SimEvent { time: record.time, kind });
                }
            }
        }
        records.push(record);
    }

    (records, events)
}

/// Run without event detection.
pub fn simulate(plant: &mut HoverPlant, pipeline: &mut Pipeline, config: &SimConfig) -> Vec<TelemetryRecord> {
    simulate_with(plant, pipeline, config, &mut []).0
}
