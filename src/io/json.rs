use std::io::{self, Write};

use serde::Serialize;

use crate::gnc::flags::ControlStateFlags;
use crate::sim::telemetry::TelemetryRecord;

/// Summary statistics of a closed-loop run.
#[derive(Debug, Clone, Serialize)]
pub struct FlightSummary {
    pub flight_time: f64,
    pub max_altitude: f64,
    pub final_altitude: f64,
    pub desired_altitude: f64,
    /// Mean |altitude error| over the last quarter of the run, m.
    pub settling_error: f64,
    pub max_climb_rate: f64,
    pub max_descent_rate: f64,
    pub max_angular_rate: f64,
    pub min_vsf: f64,
    pub unoptimized_ticks: usize,
    pub ticks: usize,
}

impl FlightSummary {
    /// None for an empty run.
    pub fn from_records(records: &[TelemetryRecord]) -> Option<Self> {
        let last = records.last()?;
        let tail = &records[records.len() - records.len().div_ceil(4)..];
        let settling_error =
            tail.iter().map(|r| (r.altitude - r.desired_altitude).abs()).sum::<f64>() / tail.len() as f64;

        Some(FlightSummary {
            flight_time: last.time,
            max_altitude: records.iter().map(|r| r.altitude).fold(f64::MIN, f64::max),
            final_altitude: last.altitude,
            desired_altitude: last.desired_altitude,
            settling_error,
            max_climb_rate: records.iter().map(|r| r.vertical_speed).fold(0.0_f64, f64::max),
            max_descent_rate: records.iter().map(|r| -r.vertical_speed).fold(0.0_f64, f64::max),
            max_angular_rate: records.iter().map(|r| r.angular_rate).fold(0.0_f64, f64::max),
            min_vsf: records.iter().map(|r| r.vsf).fold(f64::MAX, f64::min),
            unoptimized_ticks: records
                .iter()
                .filter(|r| r.flags.is_effective(ControlStateFlags::UNOPTIMIZED))
                .count(),
            ticks: records.len(),
        })
    }
}

#[derive(Serialize)]
struct Report<'a> {
    scenario: &'a str,
    summary: &'a FlightSummary,
}

/// Write the summary as pretty-printed JSON.
pub fn write_summary<W: Write>(writer: &mut W, scenario: &str, summary: &FlightSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &Report { scenario, summary })?;
    writeln!(writer)
}

pub fn write_summary_file(path: &str, scenario: &str, summary: &FlightSummary) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, scenario, summary)
}
