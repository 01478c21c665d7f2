//! CSV and JSON export of a summary.
//!
//! CSV rows resolve zone ids back to coordinates and stamp each period with
//! the wall-clock time it starts at, counted from the summary's start time.

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::grid::{Period, ZoneId};
use crate::metrics::Metrics;

#[derive(Debug, Serialize)]
struct VolumeRow {
    id: ZoneId,
    lat: f64,
    long: f64,
    value: u64,
    start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct FlowRow {
    id: String,
    pickup_lat: f64,
    pickup_long: f64,
    dropoff_lat: f64,
    dropoff_long: f64,
    value: u64,
    start_time: Option<DateTime<Utc>>,
}

/// Wall-clock start of `period`, if the summary recorded a start time.
pub fn period_start(metrics: &Metrics, period: Period) -> Option<DateTime<Utc>> {
    let offset = i64::from(period) * i64::from(metrics.period_seconds);
    DateTime::from_timestamp(metrics.start_time? + offset, 0)
}

fn lat_long(metrics: &Metrics, zone: ZoneId) -> Result<(f64, f64)> {
    metrics
        .zones
        .lat_long(zone)
        .ok_or_else(|| MetricsError::InvalidZoneTable(format!("zone {zone} has no coordinates")))
}

/// Writes one CSV row per (period, zone) trip volume. Returns the row count.
pub fn write_volume_csv<W: Write>(metrics: &Metrics, writer: W) -> Result<usize> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let mut rows = 0;

    for (&period, zones) in &metrics.trip_volumes {
        let start_time = period_start(metrics, period);
        for (&zone, &value) in zones {
            let (lat, long) = lat_long(metrics, zone)?;
            writer.serialize(VolumeRow {
                id: zone,
                lat,
                long,
                value,
                start_time,
            })?;
            rows += 1;
        }
    }
    writer.flush()?;

    debug!(rows, "Wrote volume CSV");
    Ok(rows)
}

/// Writes one CSV row per (period, pickup, dropoff) flow. Returns the row count.
pub fn write_flow_csv<W: Write>(metrics: &Metrics, writer: W) -> Result<usize> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    let mut rows = 0;

    for (&period, pickups) in &metrics.flows {
        let start_time = period_start(metrics, period);
        for (&pickup, dropoffs) in pickups {
            let (pickup_lat, pickup_long) = lat_long(metrics, pickup)?;
            for (&dropoff, &value) in dropoffs {
                let (dropoff_lat, dropoff_long) = lat_long(metrics, dropoff)?;
                writer.serialize(FlowRow {
                    id: format!("{pickup}->{dropoff}"),
                    pickup_lat,
                    pickup_long,
                    dropoff_lat,
                    dropoff_long,
                    value,
                    start_time,
                })?;
                rows += 1;
            }
        }
    }
    writer.flush()?;

    debug!(rows, "Wrote flow CSV");
    Ok(rows)
}

/// Writes the whole summary as pretty-printed JSON.
pub fn write_json<W: Write>(metrics: &Metrics, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, metrics)?;
    writeln!(writer)?;
    Ok(())
}
