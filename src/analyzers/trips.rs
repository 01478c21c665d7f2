use tracing::{debug, info};

use crate::config::AggregationConfig;
use crate::grid::period_of;
use crate::metrics::{Metrics, bump};
use crate::parser::TripRecord;

/// Counts from one trip pass, for logging and reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TripPassSummary {
    pub trips: usize,
    pub route_points: usize,
    /// Trips with no route points; these only reach the trip totals.
    pub empty_routes: usize,
}

/// Tallies trips into `metrics`.
///
/// Trip, duration, distance, pickup and flow counts are keyed by the period
/// the trip started in. Route volumes use each point's own period, and the
/// dropoff uses the period of the final point. Buckets follow the summary's
/// own grid; `config` supplies the zone precision.
#[tracing::instrument(
    skip_all,
    fields(period_seconds = metrics.period_seconds, cycle_length = metrics.cycle_length)
)]
pub fn aggregate_trips<I>(
    metrics: &mut Metrics,
    config: &AggregationConfig,
    trips: I,
) -> TripPassSummary
where
    I: IntoIterator<Item = TripRecord>,
{
    let mut summary = TripPassSummary::default();
    let (period_seconds, cycle_length) = (metrics.period_seconds, metrics.cycle_length);
    let bucket = |timestamp: f64| period_of(timestamp, period_seconds, cycle_length);

    for trip in trips {
        summary.trips += 1;
        let start_period = bucket(trip.start_time);
        metrics.observe_time(trip.start_time);

        *metrics.total_trips.entry(start_period).or_default() += 1;
        *metrics.total_duration.entry(start_period).or_default() += trip.trip_duration;
        *metrics.total_distance.entry(start_period).or_default() += trip.trip_distance;

        let mut endpoints = None;
        for point in &trip.route {
            summary.route_points += 1;
            metrics.observe_time(point.timestamp);

            let period = bucket(point.timestamp);
            let zone = metrics.zones.intern(point.lat, point.long, config.gps_precision);
            bump(&mut metrics.trip_volumes, period, zone);

            endpoints = match endpoints {
                None => Some((zone, zone, period)),
                Some((pickup, _, _)) => Some((pickup, zone, period)),
            };
        }

        let Some((pickup, dropoff, dropoff_period)) = endpoints else {
            summary.empty_routes += 1;
            debug!(start_time = trip.start_time, "Trip has no route points");
            continue;
        };

        bump(&mut metrics.pickups, start_period, pickup);
        bump(&mut metrics.dropoffs, dropoff_period, dropoff);
        *metrics
            .flows
            .entry(start_period)
            .or_default()
            .entry(pickup)
            .or_default()
            .entry(dropoff)
            .or_default() += 1;
    }

    info!(
        trips = summary.trips,
        route_points = summary.route_points,
        empty_routes = summary.empty_routes,
        zones = metrics.zones.len(),
        "Trip pass complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RoutePoint;

    fn point(timestamp: f64, lat: f64, long: f64) -> RoutePoint {
        RoutePoint { timestamp, lat, long }
    }

    fn config() -> AggregationConfig {
        AggregationConfig {
            cycle_length: 24,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_trip_tallies() {
        let mut metrics = Metrics::new(3600, 24);
        let trip = TripRecord {
            start_time: 3600.0 * 2.0 + 10.0,
            trip_duration: 4000.0,
            trip_distance: 2500.0,
            route: vec![
                point(7210.0, 36.1331, -86.8251),
                point(9000.0, 36.1501, -86.8001),
                point(11210.0, 36.2001, -86.7001),
            ],
        };

        let summary = aggregate_trips(&mut metrics, &config(), vec![trip]);

        assert_eq!(summary.trips, 1);
        assert_eq!(summary.route_points, 3);
        assert_eq!(metrics.total_trips[&2], 1);
        assert_eq!(metrics.total_duration[&2], 4000.0);
        assert_eq!(metrics.total_distance[&2], 2500.0);

        // Zones in first-seen order.
        assert_eq!(metrics.zones.coordinates(0), Some("36.133:-86.825"));
        assert_eq!(metrics.zones.coordinates(2), Some("36.200:-86.700"));

        assert_eq!(metrics.trip_volume(2, 0), 1);
        assert_eq!(metrics.trip_volume(2, 1), 1);
        assert_eq!(metrics.trip_volume(3, 2), 1);

        assert_eq!(metrics.pickups[&2][&0], 1);
        // Dropoff is keyed by the last point's period.
        assert_eq!(metrics.dropoffs[&3][&2], 1);
        assert!(!metrics.dropoffs.contains_key(&2));
        // Flow is keyed by the start period.
        assert_eq!(metrics.flow(2, 0, 2), 1);

        assert_eq!(metrics.start_time, Some(7210));
        assert_eq!(metrics.end_time, Some(11210));
    }

    #[test]
    fn test_repeated_trips_accumulate() {
        let mut metrics = Metrics::new(3600, 24);
        let trip = TripRecord {
            start_time: 100.0,
            trip_duration: 60.0,
            trip_distance: 10.0,
            route: vec![point(100.0, 1.0, 1.0), point(160.0, 2.0, 2.0)],
        };

        aggregate_trips(&mut metrics, &config(), vec![trip.clone(), trip]);

        assert_eq!(metrics.total_trips[&0], 2);
        assert_eq!(metrics.total_duration[&0], 120.0);
        assert_eq!(metrics.flow(0, 0, 1), 2);
        assert_eq!(metrics.pickups[&0][&0], 2);
        assert_eq!(metrics.dropoffs[&0][&1], 2);
    }

    #[test]
    fn test_empty_route_only_counts_totals() {
        let mut metrics = Metrics::new(3600, 24);
        let trip = TripRecord {
            start_time: 50.0,
            trip_duration: 30.0,
            trip_distance: 5.0,
            route: vec![],
        };

        let summary = aggregate_trips(&mut metrics, &config(), vec![trip]);

        assert_eq!(summary.empty_routes, 1);
        assert_eq!(metrics.total_trips[&0], 1);
        assert!(metrics.pickups.is_empty());
        assert!(metrics.dropoffs.is_empty());
        assert!(metrics.flows.is_empty());
        assert!(metrics.trip_volumes.is_empty());
        assert!(metrics.zones.is_empty());
    }

    #[test]
    fn test_single_point_route_is_its_own_pickup_and_dropoff() {
        let mut metrics = Metrics::new(3600, 24);
        let trip = TripRecord {
            start_time: 0.0,
            trip_duration: 0.0,
            trip_distance: 0.0,
            route: vec![point(0.0, 1.0, 1.0)],
        };

        aggregate_trips(&mut metrics, &config(), vec![trip]);

        assert_eq!(metrics.flow(0, 0, 0), 1);
        assert_eq!(metrics.pickups[&0][&0], 1);
        assert_eq!(metrics.dropoffs[&0][&0], 1);
    }

    #[test]
    fn test_cycle_folds_periods() {
        let mut metrics = Metrics::new(3600, 24);
        let day = 24.0 * 3600.0;
        let trips = [5.0, day + 5.0].map(|start| TripRecord {
            start_time: start,
            trip_duration: 1.0,
            trip_distance: 1.0,
            route: vec![point(start, 1.0, 1.0)],
        });

        aggregate_trips(&mut metrics, &config(), trips);

        assert_eq!(metrics.total_trips.len(), 1);
        assert_eq!(metrics.total_trips[&0], 2);
        assert_eq!(metrics.trip_volume(0, 0), 2);
    }
}
