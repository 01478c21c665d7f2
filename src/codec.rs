//! Protobuf persistence for [`Metrics`] summaries.

use bytes::Bytes;
use prost::Message;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::grid::{Period, ZoneTable};
use crate::metrics::{FlowCounts, Metrics, ZoneCounts};
use crate::pb;

impl From<&Metrics> for pb::Metrics {
    fn from(m: &Metrics) -> Self {
        pb::Metrics {
            period_seconds: m.period_seconds,
            cycle_length: m.cycle_length,
            start_time: m.start_time,
            end_time: m.end_time,
            geo_ids: m
                .zones
                .iter()
                .map(|(id, coordinate)| (id, coordinate.to_string()))
                .collect(),
            total_trips: m.total_trips.clone(),
            total_duration: m.total_duration.clone(),
            total_distance: m.total_distance.clone(),
            pickups: zone_counts_to_pb(&m.pickups),
            dropoffs: zone_counts_to_pb(&m.dropoffs),
            trip_volumes: zone_counts_to_pb(&m.trip_volumes),
            flows: m
                .flows
                .iter()
                .map(|(&period, flows)| {
                    let data = flows
                        .iter()
                        .map(|(&pickup, dropoffs)| {
                            let data = dropoffs.clone();
                            (pickup, pb::ZoneCounts { data })
                        })
                        .collect();
                    (period, pb::FlowCounts { data })
                })
                .collect(),
            availability: zone_counts_to_pb(&m.availability),
            on_street: zone_counts_to_pb(&m.on_street),
            privacy_level: m.privacy_level,
            trip_volume_suppressed: m.trip_volume_suppressed,
            flows_suppressed: m.flows_suppressed,
        }
    }
}

impl TryFrom<pb::Metrics> for Metrics {
    type Error = MetricsError;

    fn try_from(p: pb::Metrics) -> Result<Self> {
        // Aggregating into a loaded summary buckets by its own grid.
        if p.period_seconds == 0 || p.cycle_length == 0 {
            return Err(MetricsError::InvalidConfig(format!(
                "summary grid needs a positive period and cycle, found {}s x {}",
                p.period_seconds, p.cycle_length
            )));
        }
        // Zone ids must be exactly 0..n for the table to be a bijection.
        for (expected, &id) in p.geo_ids.keys().enumerate() {
            if id as usize != expected {
                return Err(MetricsError::InvalidZoneTable(format!(
                    "zone ids are not dense: expected {expected}, found {id}"
                )));
            }
        }
        let zones = ZoneTable::from_coordinates(p.geo_ids.into_values())?;

        Ok(Metrics {
            period_seconds: p.period_seconds,
            cycle_length: p.cycle_length,
            start_time: p.start_time,
            end_time: p.end_time,
            zones,
            total_trips: p.total_trips,
            total_duration: p.total_duration,
            total_distance: p.total_distance,
            pickups: zone_counts_from_pb(p.pickups),
            dropoffs: zone_counts_from_pb(p.dropoffs),
            trip_volumes: zone_counts_from_pb(p.trip_volumes),
            flows: p
                .flows
                .into_iter()
                .map(|(period, flows)| {
                    let flows: FlowCounts = flows
                        .data
                        .into_iter()
                        .map(|(pickup, dropoffs)| (pickup, dropoffs.data))
                        .collect();
                    (period, flows)
                })
                .collect(),
            availability: zone_counts_from_pb(p.availability),
            on_street: zone_counts_from_pb(p.on_street),
            privacy_level: p.privacy_level,
            trip_volume_suppressed: p.trip_volume_suppressed,
            flows_suppressed: p.flows_suppressed,
        })
    }
}

fn zone_counts_to_pb(map: &BTreeMap<Period, ZoneCounts>) -> BTreeMap<Period, pb::ZoneCounts> {
    map.iter()
        .map(|(&period, zones)| (period, pb::ZoneCounts { data: zones.clone() }))
        .collect()
}

fn zone_counts_from_pb(map: BTreeMap<Period, pb::ZoneCounts>) -> BTreeMap<Period, ZoneCounts> {
    map.into_iter().map(|(period, zones)| (period, zones.data)).collect()
}

/// Encodes a summary to protobuf bytes.
pub fn encode_metrics(metrics: &Metrics) -> Bytes {
    Bytes::from(pb::Metrics::from(metrics).encode_to_vec())
}

/// Decodes a summary from protobuf bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid `Metrics` message or its
/// zone table is not a dense bijection.
pub fn decode_metrics(bytes: &[u8]) -> Result<Metrics> {
    Metrics::try_from(pb::Metrics::decode(bytes)?)
}

/// Writes a summary to `path`.
#[tracing::instrument(skip(metrics), fields(path = %path.display()))]
pub fn write_metrics(path: &Path, metrics: &Metrics) -> Result<()> {
    let bytes = encode_metrics(metrics);
    debug!(bytes = bytes.len(), "Writing summary");
    std::fs::write(path, &bytes)?;
    Ok(())
}

/// Reads a summary from `path`.
#[tracing::instrument(fields(path = %path.display()))]
pub fn read_metrics(path: &Path) -> Result<Metrics> {
    let bytes = Bytes::from(std::fs::read(path)?);
    debug!(bytes = bytes.len(), "Read summary");
    decode_metrics(&bytes)
}
