use std::io::{self, Write};

use crate::sim::telemetry::TelemetryRecord;

/// Write closed-loop telemetry as CSV.
///
/// Columns: time, altitude, vertical_speed, horizontal_speed, angular_rate,
///          setpoint, desired_altitude, vsf, main_throttle, min_limit,
///          max_limit, flags, landed
pub fn write_telemetry<W: Write>(writer: &mut W, records: &[TelemetryRecord]) -> io::Result<()> {
    writeln!(
        writer,
        "time,altitude,vertical_speed,horizontal_speed,angular_rate,\
         setpoint,desired_altitude,vsf,main_throttle,min_limit,max_limit,flags,landed"
    )?;

    for r in records {
        writeln!(
            writer,
            "{:.3},{:.3},{:.3},{:.3},{:.5},\
             {:.3},{:.2},{:.4},{:.4},{:.4},{:.4},{},{}",
            r.time,
            r.altitude,
            r.vertical_speed,
            r.horizontal_speed,
            r.angular_rate,
            r.setpoint,
            r.desired_altitude,
            r.vsf,
            r.main_throttle,
            r.min_limit,
            r.max_limit,
            r.flags.bits(),
            u8::from(r.landed),
        )?;
    }

    Ok(())
}

pub fn write_telemetry_file(path: &str, records: &[TelemetryRecord]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_telemetry(&mut file, records)
}
