//! The time-bucketed spatial summary produced by the aggregators.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::grid::{Period, ZoneId, ZoneTable};

/// Counts keyed by zone.
pub type ZoneCounts = BTreeMap<ZoneId, u64>;

/// Counts keyed by pickup zone, then dropoff zone.
pub type FlowCounts = BTreeMap<ZoneId, ZoneCounts>;

/// Aggregated trip and fleet metrics over a repeating cycle of periods.
///
/// Every nested map treats a missing key as zero. Periods are always in
/// `[0, cycle_length)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub period_seconds: u32,
    pub cycle_length: u32,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    #[serde(rename = "geo_ids")]
    pub zones: ZoneTable,

    pub total_trips: BTreeMap<Period, u64>,
    pub total_duration: BTreeMap<Period, f64>,
    pub total_distance: BTreeMap<Period, f64>,
    pub pickups: BTreeMap<Period, ZoneCounts>,
    pub dropoffs: BTreeMap<Period, ZoneCounts>,
    /// Every route point visited, not only trip endpoints.
    pub trip_volumes: BTreeMap<Period, ZoneCounts>,
    /// Indexed by the period the trip started in.
    pub flows: BTreeMap<Period, FlowCounts>,
    /// Distinct vehicles seen with an `available` event.
    pub availability: BTreeMap<Period, ZoneCounts>,
    /// Distinct vehicles seen with any event.
    pub on_street: BTreeMap<Period, ZoneCounts>,

    pub privacy_level: u32,
    pub trip_volume_suppressed: u64,
    pub flows_suppressed: u64,
}

impl Metrics {
    pub fn new(period_seconds: u32, cycle_length: u32) -> Self {
        Self {
            period_seconds,
            cycle_length,
            ..Default::default()
        }
    }

    /// Widens the observed time span to include `timestamp`.
    pub fn observe_time(&mut self, timestamp: f64) {
        let seconds = timestamp.floor() as i64;
        self.start_time = Some(self.start_time.map_or(seconds, |t| t.min(seconds)));
        self.end_time = Some(self.end_time.map_or(seconds, |t| t.max(seconds)));
    }

    pub fn total_trip_count(&self) -> u64 {
        self.total_trips.values().sum()
    }

    pub fn total_trip_volume(&self) -> u64 {
        self.trip_volumes.values().map(zone_total).sum()
    }

    pub fn total_flow_volume(&self) -> u64 {
        self.flows.values().map(flow_total).sum()
    }

    /// Flow count for one pickup/dropoff pair, zero when absent.
    pub fn flow(&self, period: Period, pickup: ZoneId, dropoff: ZoneId) -> u64 {
        self.flows
            .get(&period)
            .and_then(|pickups| pickups.get(&pickup))
            .and_then(|dropoffs| dropoffs.get(&dropoff))
            .copied()
            .unwrap_or(0)
    }

    /// Trip volume for one zone, zero when absent.
    pub fn trip_volume(&self, period: Period, zone: ZoneId) -> u64 {
        zone_count(&self.trip_volumes, period, zone)
    }

    pub fn is_suppressed(&self) -> bool {
        self.privacy_level > 0
    }
}

/// Looks up a count in a period -> zone map, zero when absent.
pub fn zone_count(map: &BTreeMap<Period, ZoneCounts>, period: Period, zone: ZoneId) -> u64 {
    map.get(&period)
        .and_then(|zones| zones.get(&zone))
        .copied()
        .unwrap_or(0)
}

pub fn zone_total(counts: &ZoneCounts) -> u64 {
    counts.values().sum()
}

pub fn flow_total(flows: &FlowCounts) -> u64 {
    flows.values().map(zone_total).sum()
}

/// Increments a nested period -> zone counter.
pub(crate) fn bump(map: &mut BTreeMap<Period, ZoneCounts>, period: Period, zone: ZoneId) {
    *map.entry(period).or_default().entry(zone).or_default() += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let metrics = Metrics::new(3600, 168);
        assert_eq!(metrics.period_seconds, 3600);
        assert_eq!(metrics.cycle_length, 168);
        assert_eq!(metrics.start_time, None);
        assert_eq!(metrics.total_trip_count(), 0);
        assert!(!metrics.is_suppressed());
    }

    #[test]
    fn test_observe_time_tracks_span() {
        let mut metrics = Metrics::new(3600, 24);
        metrics.observe_time(500.7);
        metrics.observe_time(100.2);
        metrics.observe_time(900.0);
        assert_eq!(metrics.start_time, Some(100));
        assert_eq!(metrics.end_time, Some(900));
    }

    #[test]
    fn test_missing_keys_read_as_zero() {
        let mut metrics = Metrics::new(3600, 24);
        bump(&mut metrics.trip_volumes, 2, 5);
        bump(&mut metrics.trip_volumes, 2, 5);
        metrics.flows.entry(1).or_default().entry(0).or_default().insert(3, 4);

        assert_eq!(metrics.trip_volume(2, 5), 2);
        assert_eq!(metrics.trip_volume(2, 6), 0);
        assert_eq!(metrics.flow(1, 0, 3), 4);
        assert_eq!(metrics.flow(1, 3, 0), 0);
        assert_eq!(metrics.total_trip_volume(), 2);
        assert_eq!(metrics.total_flow_volume(), 4);
    }
}
