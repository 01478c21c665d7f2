use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::config::AggregationConfig;
use crate::grid::{Period, ZoneId, period_of};
use crate::metrics::{Metrics, ZoneCounts};
use crate::parser::{EventType, VehicleEvent};

/// Counts from one vehicle-event pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventPassSummary {
    pub events: usize,
    pub available_events: usize,
    pub vehicles: usize,
}

type VehicleSets<'a> = BTreeMap<(Period, ZoneId), HashSet<&'a str>>;

/// Counts distinct vehicles per period and zone into `metrics.on_street` and
/// `metrics.availability`.
///
/// A vehicle reporting many events in the same cell is counted once. Zones
/// come from the summary's existing zone table, so running this after a trip
/// pass keeps the two aligned.
#[tracing::instrument(skip_all, fields(events = events.len()))]
pub fn aggregate_events(
    metrics: &mut Metrics,
    config: &AggregationConfig,
    events: &[VehicleEvent],
) -> EventPassSummary {
    let mut summary = EventPassSummary::default();
    let mut on_street: VehicleSets = BTreeMap::new();
    let mut available: VehicleSets = BTreeMap::new();
    let mut vehicles = HashSet::new();

    for event in events {
        summary.events += 1;
        metrics.observe_time(event.event_time);

        let period = period_of(event.event_time, metrics.period_seconds, metrics.cycle_length);
        let zone = metrics.zones.intern(event.lat, event.long, config.gps_precision);
        let vehicle = event.vehicle_id.as_str();
        vehicles.insert(vehicle);

        on_street.entry((period, zone)).or_default().insert(vehicle);
        if event.event_type == EventType::Available {
            summary.available_events += 1;
            available.entry((period, zone)).or_default().insert(vehicle);
        }
    }
    summary.vehicles = vehicles.len();

    store_distinct_counts(&mut metrics.on_street, on_street);
    store_distinct_counts(&mut metrics.availability, available);

    info!(
        events = summary.events,
        available_events = summary.available_events,
        vehicles = summary.vehicles,
        zones = metrics.zones.len(),
        "Vehicle event pass complete"
    );
    summary
}

fn store_distinct_counts(target: &mut BTreeMap<Period, ZoneCounts>, sets: VehicleSets) {
    for ((period, zone), vehicles) in sets {
        target
            .entry(period)
            .or_default()
            .insert(zone, vehicles.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time: f64, vehicle: &str, kind: &str, lat: f64, long: f64) -> VehicleEvent {
        VehicleEvent {
            event_time: time,
            vehicle_id: vehicle.to_string(),
            event_type: EventType::from(kind.to_string()),
            lat,
            long,
        }
    }

    #[test]
    fn test_repeated_available_events_count_once() {
        let mut metrics = Metrics::new(3600, 24);
        let events: Vec<_> = (0..10)
            .map(|i| event(100.0 + i as f64, "v1", "available", 36.1, -86.8))
            .collect();

        let summary = aggregate_events(&mut metrics, &AggregationConfig::default(), &events);

        assert_eq!(summary.events, 10);
        assert_eq!(summary.vehicles, 1);
        assert_eq!(metrics.availability[&0][&0], 1);
        assert_eq!(metrics.on_street[&0][&0], 1);
    }

    #[test]
    fn test_on_street_counts_any_event_type() {
        let mut metrics = Metrics::new(3600, 24);
        let events = vec![
            event(10.0, "v1", "available", 36.1, -86.8),
            event(20.0, "v2", "reserved", 36.1, -86.8),
            event(30.0, "v3", "unavailable", 36.1, -86.8),
            event(40.0, "v3", "available", 36.1, -86.8),
        ];

        aggregate_events(&mut metrics, &AggregationConfig::default(), &events);

        assert_eq!(metrics.on_street[&0][&0], 3);
        assert_eq!(metrics.availability[&0][&0], 2);
    }

    #[test]
    fn test_reuses_existing_zone_table() {
        let mut metrics = Metrics::new(3600, 24);
        let existing = metrics.zones.intern(36.2, -86.7, 3);
        metrics.observe_time(5.0);

        let events = vec![
            event(7300.0, "v1", "available", 36.2, -86.7),
            event(7400.0, "v1", "available", 36.3, -86.6),
        ];
        let config = AggregationConfig {
            cycle_length: 24,
            ..Default::default()
        };
        aggregate_events(&mut metrics, &config, &events);

        assert_eq!(metrics.availability[&2][&existing], 1);
        assert_eq!(metrics.availability[&2][&1], 1);
        assert_eq!(metrics.zones.len(), 2);
        assert_eq!(metrics.start_time, Some(5));
        assert_eq!(metrics.end_time, Some(7400));
    }

    #[test]
    fn test_no_available_events_leaves_availability_empty() {
        let mut metrics = Metrics::new(3600, 24);
        let events = vec![event(10.0, "v1", "trip_start", 36.1, -86.8)];

        aggregate_events(&mut metrics, &AggregationConfig::default(), &events);

        assert!(metrics.availability.is_empty());
        assert_eq!(metrics.on_street[&0][&0], 1);
    }
}
