//! Plain-text report over a summary: totals, per-period sparklines, the
//! busiest zones and how much each privacy level would suppress.

use chrono::DateTime;
use std::collections::BTreeMap;
use std::io::Write;

use crate::analyzers::utility::{mean, pct, ratio};
use crate::error::Result;
use crate::grid::{Period, ZoneId};
use crate::metrics::{Metrics, ZoneCounts, flow_total, zone_total};
use crate::privacy::suppress;

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Sums a period -> zone map down to period totals.
pub fn volume_by_period(map: &BTreeMap<Period, ZoneCounts>) -> BTreeMap<Period, u64> {
    map.iter().map(|(&period, zones)| (period, zone_total(zones))).collect()
}

/// Sums every flow started in each period.
pub fn flows_by_period(metrics: &Metrics) -> BTreeMap<Period, u64> {
    metrics
        .flows
        .iter()
        .map(|(&period, flows)| (period, flow_total(flows)))
        .collect()
}

/// One value per period of the cycle, missing periods as 0.
pub fn cycle_series(cycle_length: u32, value: impl Fn(Period) -> f64) -> Vec<f64> {
    (0..cycle_length).map(value).collect()
}

/// Min/average/max/sum of a series plus its bar rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Sparkline {
    pub min: f64,
    pub ave: f64,
    pub max: f64,
    pub sum: f64,
    pub bars: String,
}

impl Sparkline {
    pub fn new(series: &[f64]) -> Self {
        let min = series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = if series.is_empty() { (0.0, 0.0) } else { (min, max) };
        let scale = ratio((SPARK_CHARS.len() - 1) as f64, max - min);

        let bars = series
            .iter()
            .map(|value| SPARK_CHARS[((value - min) * scale).round() as usize])
            .collect();

        Self {
            min,
            ave: mean(series),
            max,
            sum: series.iter().sum(),
            bars,
        }
    }
}

/// The `n` largest (period, zone) trip volumes, largest first.
pub fn top_volumes(metrics: &Metrics, n: usize) -> Vec<(Period, ZoneId, u64)> {
    let mut volumes: Vec<_> = metrics
        .trip_volumes
        .iter()
        .flat_map(|(&period, zones)| zones.iter().map(move |(&zone, &count)| (period, zone, count)))
        .collect();
    volumes.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));
    volumes.truncate(n);
    volumes
}

/// What suppression at one privacy level would remove.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivacyRow {
    pub privacy_level: u32,
    pub volume_suppressed: u64,
    pub volume_pct: f64,
    pub flows_suppressed: u64,
    pub flows_pct: f64,
}

/// Suppresses `metrics` at each level and tabulates the removed totals.
pub fn privacy_table(metrics: &Metrics, levels: &[u32]) -> Result<Vec<PrivacyRow>> {
    let total_volume = metrics.total_trip_volume();
    let total_flows = metrics.total_flow_volume();

    levels
        .iter()
        .map(|&level| {
            let suppressed = suppress(metrics, level)?;
            let volume_suppressed =
                suppressed.trip_volume_suppressed - metrics.trip_volume_suppressed;
            let flows_suppressed = suppressed.flows_suppressed - metrics.flows_suppressed;
            Ok(PrivacyRow {
                privacy_level: level,
                volume_suppressed,
                volume_pct: pct(volume_suppressed, total_volume),
                flows_suppressed,
                flows_pct: pct(flows_suppressed, total_flows),
            })
        })
        .collect()
}

fn write_sparkline<W: Write>(
    out: &mut W,
    title: &str,
    series: &[f64],
    units: &str,
    precision: usize,
) -> Result<()> {
    if series.iter().all(|v| *v == 0.0) {
        return Ok(());
    }
    let s = Sparkline::new(series);
    writeln!(
        out,
        "{title:<18} Min: {:>6.precision$} {units:3} Ave: {:>6.precision$} {units:3} Max: {:>6.precision$} {units:3} Sum: {:>6.precision$}",
        s.min, s.ave, s.max, s.sum
    )?;
    writeln!(out, "{}", s.bars)?;
    Ok(())
}

fn format_time(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .map_or_else(|| "n/a".to_string(), |dt| dt.to_rfc3339())
}

/// Renders the full report for `metrics`.
pub fn write_report<W: Write>(
    metrics: &Metrics,
    levels: &[u32],
    top_n: usize,
    out: &mut W,
) -> Result<()> {
    let cycle = metrics.cycle_length;
    let trips = |p: Period| metrics.total_trips.get(&p).copied().unwrap_or(0) as f64;
    let duration = |p: Period| metrics.total_duration.get(&p).copied().unwrap_or(0.0);
    let distance = |p: Period| metrics.total_distance.get(&p).copied().unwrap_or(0.0);
    let lookup = |map: &BTreeMap<Period, u64>, p: Period| map.get(&p).copied().unwrap_or(0) as f64;

    let volume = volume_by_period(&metrics.trip_volumes);
    let flows = flows_by_period(metrics);
    let available = volume_by_period(&metrics.availability);
    let on_street = volume_by_period(&metrics.on_street);

    writeln!(out, "Total trips: {}", metrics.total_trip_count())?;
    writeln!(out, "Start: {}", format_time(metrics.start_time))?;
    writeln!(out, "End: {}", format_time(metrics.end_time))?;
    writeln!(out, "Period: {} seconds", metrics.period_seconds)?;
    writeln!(out, "Cycle length: {cycle}")?;
    writeln!(out, "Privacy: {}", metrics.privacy_level)?;
    writeln!(
        out,
        "Volume Suppressed: {}\tTotal Volume: {}",
        metrics.trip_volume_suppressed,
        metrics.total_trip_volume()
    )?;
    writeln!(
        out,
        "Flow Suppressed: {}\tTotal Flows: {}",
        metrics.flows_suppressed,
        metrics.total_flow_volume()
    )?;

    write_sparkline(out, "Trips by period", &cycle_series(cycle, trips), "", 0)?;
    write_sparkline(
        out,
        "Average distance",
        &cycle_series(cycle, |p| ratio(distance(p), trips(p))),
        "M",
        0,
    )?;
    write_sparkline(
        out,
        "Average duration",
        &cycle_series(cycle, |p| ratio(duration(p), trips(p))),
        "s",
        0,
    )?;
    write_sparkline(
        out,
        "Average speed",
        &cycle_series(cycle, |p| ratio(distance(p), duration(p))),
        "M/s",
        2,
    )?;
    write_sparkline(out, "Trip Volume", &cycle_series(cycle, |p| lookup(&volume, p)), "", 0)?;
    write_sparkline(out, "Flows", &cycle_series(cycle, |p| lookup(&flows, p)), "", 0)?;
    write_sparkline(out, "Availability", &cycle_series(cycle, |p| lookup(&available, p)), "", 0)?;
    write_sparkline(out, "On Street", &cycle_series(cycle, |p| lookup(&on_street, p)), "", 0)?;

    writeln!(out)?;
    writeln!(out, "Top Trip Volumes")?;
    writeln!(out, "{:<10}{:<10}{:<10}{:<10}", "Period", "Lat", "Long", "Count")?;
    for (period, zone, count) in top_volumes(metrics, top_n) {
        if let Some((lat, long)) = metrics.zones.coordinates(zone).and_then(|c| c.split_once(':')) {
            writeln!(out, "{period:<10}{lat:<10}{long:<10}{count:<10}")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Privacy Flow Suppression")?;
    writeln!(
        out,
        "{:>15}{:>15}{:>8}{:>15}{:>8}",
        "Privacy Level", "Supp. Volume", "%", "Supp. Flows", "%"
    )?;
    for row in privacy_table(metrics, levels)? {
        writeln!(
            out,
            "{:>15}{:>15}{:>8.2}{:>15}{:>8.2}",
            row.privacy_level,
            row.volume_suppressed,
            row.volume_pct,
            row.flows_suppressed,
            row.flows_pct
        )?;
    }
    Ok(())
}
