//! Readers for trip and vehicle-event input files.
//!
//! Trips arrive as MDS-style JSON lines (one trip per line with a GeoJSON
//! route) or as flat CSV rows; vehicle status changes arrive as JSON lines.
//! Any file ending in `.gz` is decompressed on the fly. Every record is
//! validated here so the aggregators can assume well-formed input: the first
//! bad record rejects the whole file.

use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::error::{MetricsError, Result};

/// One timestamped GPS fix along a trip's route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePoint {
    pub timestamp: f64,
    pub lat: f64,
    pub long: f64,
}

/// A completed trip with its ordered route.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub start_time: f64,
    pub trip_duration: f64,
    pub trip_distance: f64,
    pub route: Vec<RoutePoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    Available,
    Other(String),
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        if value == "available" {
            EventType::Available
        } else {
            EventType::Other(value)
        }
    }
}

/// A vehicle status change at a location.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleEvent {
    pub event_time: f64,
    pub vehicle_id: String,
    pub event_type: EventType,
    pub lat: f64,
    pub long: f64,
}

/// Kinds of trip input recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    JsonLines,
    Csv,
    /// An already aggregated, persisted summary.
    Metrics,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);

        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("json" | "jsonl" | "ndjson") => Ok(InputFormat::JsonLines),
            Some("csv") => Ok(InputFormat::Csv),
            Some("pbf" | "pb") => Ok(InputFormat::Metrics),
            _ => Err(MetricsError::UnsupportedInput(path.display().to_string())),
        }
    }
}

/// Opens a file for buffered reading, gunzipping `.gz` files.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let gzipped = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(path = %path.display(), gzipped, "Opening input");

    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Reads every trip from a JSON-lines or CSV file.
#[tracing::instrument(fields(path = %path.display()))]
pub fn read_trips(path: &Path) -> Result<Vec<TripRecord>> {
    let reader = open_input(path)?;
    let trips = match InputFormat::from_path(path)? {
        InputFormat::JsonLines => parse_trip_lines(reader)?,
        InputFormat::Csv => parse_trip_csv(reader)?,
        InputFormat::Metrics => {
            return Err(MetricsError::UnsupportedInput(format!(
                "{} is a persisted summary, not a trip file",
                path.display()
            )));
        }
    };
    debug!(trips = trips.len(), "Trips read");
    Ok(trips)
}

/// Reads every vehicle event from a JSON-lines file.
#[tracing::instrument(fields(path = %path.display()))]
pub fn read_events(path: &Path) -> Result<Vec<VehicleEvent>> {
    let events = parse_event_lines(open_input(path)?)?;
    debug!(events = events.len(), "Vehicle events read");
    Ok(events)
}

/// Numbers in MDS exports sometimes arrive as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(self, field: &str, line: usize) -> Result<f64> {
        match self {
            Numeric::Number(n) => Ok(n),
            Numeric::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| invalid(line, format!("{field} is not numeric: {s:?}"))),
        }
    }
}

#[derive(Deserialize)]
struct RawTrip {
    start_time: f64,
    trip_duration: Numeric,
    trip_distance: Numeric,
    route: RawRoute,
}

#[derive(Deserialize)]
struct RawRoute {
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    properties: RawProperties,
    geometry: RawGeometry,
}

#[derive(Deserialize)]
struct RawProperties {
    timestamp: f64,
}

#[derive(Deserialize)]
struct RawGeometry {
    coordinates: Vec<f64>,
}

impl RawGeometry {
    /// GeoJSON positions are `[long, lat]`.
    fn lat_long(&self, line: usize) -> Result<(f64, f64)> {
        match self.coordinates.as_slice() {
            [long, lat, ..] => Ok((
                finite(*lat, "latitude", line)?,
                finite(*long, "longitude", line)?,
            )),
            _ => Err(invalid(line, "point needs [long, lat] coordinates".to_string())),
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    event_time: f64,
    vehicle_id: String,
    event_type: String,
    event_location: RawLocation,
}

#[derive(Deserialize)]
struct RawLocation {
    geometry: RawGeometry,
}

/// Parses JSON-lines trips, skipping blank lines.
pub fn parse_trip_lines<R: BufRead>(reader: R) -> Result<Vec<TripRecord>> {
    let mut trips = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawTrip =
            serde_json::from_str(&line).map_err(|e| invalid(line_no, e.to_string()))?;
        trips.push(trip_from_raw(raw, line_no)?);
    }
    Ok(trips)
}

fn trip_from_raw(raw: RawTrip, line: usize) -> Result<TripRecord> {
    let start_time = finite(raw.start_time, "start_time", line)?;
    let trip_duration = non_negative(
        raw.trip_duration.value("trip_duration", line)?,
        "trip_duration",
        line,
    )?;
    let trip_distance = non_negative(
        raw.trip_distance.value("trip_distance", line)?,
        "trip_distance",
        line,
    )?;

    let route = raw
        .route
        .features
        .iter()
        .map(|feature| {
            let (lat, long) = feature.geometry.lat_long(line)?;
            Ok(RoutePoint {
                timestamp: finite(feature.properties.timestamp, "timestamp", line)?,
                lat,
                long,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TripRecord {
        start_time,
        trip_duration,
        trip_distance,
        route,
    })
}

/// Parses JSON-lines vehicle events, skipping blank lines.
pub fn parse_event_lines<R: BufRead>(reader: R) -> Result<Vec<VehicleEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawEvent =
            serde_json::from_str(&line).map_err(|e| invalid(line_no, e.to_string()))?;
        let (lat, long) = raw.event_location.geometry.lat_long(line_no)?;
        events.push(VehicleEvent {
            event_time: finite(raw.event_time, "event_time", line_no)?,
            vehicle_id: raw.vehicle_id,
            event_type: EventType::from(raw.event_type),
            lat,
            long,
        });
    }
    Ok(events)
}

const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CsvTripRow {
    pickup_date: String,
    pickup_time: String,
    dropoff_date: String,
    dropoff_time: String,
    pickup_lat: f64,
    pickup_long: f64,
    dropoff_lat: f64,
    dropoff_long: f64,
}

/// Parses CSV trips into two-point routes (pickup, then dropoff).
///
/// CSV rows carry no distance, so it is recorded as zero.
pub fn parse_trip_csv<R: Read>(reader: R) -> Result<Vec<TripRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut trips = Vec::new();
    for (index, result) in rdr.deserialize::<CsvTripRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.map_err(|e| invalid(line, e.to_string()))?;

        let pickup_at = csv_timestamp(&row.pickup_date, &row.pickup_time, line)?;
        let dropoff_at = csv_timestamp(&row.dropoff_date, &row.dropoff_time, line)?;
        if dropoff_at < pickup_at {
            return Err(invalid(line, "dropoff precedes pickup".to_string()));
        }

        trips.push(TripRecord {
            start_time: pickup_at,
            trip_duration: dropoff_at - pickup_at,
            trip_distance: 0.0,
            route: vec![
                RoutePoint {
                    timestamp: pickup_at,
                    lat: finite(row.pickup_lat, "pickup_lat", line)?,
                    long: finite(row.pickup_long, "pickup_long", line)?,
                },
                RoutePoint {
                    timestamp: dropoff_at,
                    lat: finite(row.dropoff_lat, "dropoff_lat", line)?,
                    long: finite(row.dropoff_long, "dropoff_long", line)?,
                },
            ],
        });
    }
    Ok(trips)
}

fn csv_timestamp(date: &str, time: &str, line: usize) -> Result<f64> {
    let text = format!("{date} {time}");
    NaiveDateTime::parse_from_str(&text, CSV_DATETIME_FORMAT)
        .map(|dt| dt.and_utc().timestamp() as f64)
        .map_err(|e| invalid(line, format!("bad datetime {text:?}: {e}")))
}

fn finite(value: f64, field: &str, line: usize) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(line, format!("{field} is not finite")))
    }
}

fn non_negative(value: f64, field: &str, line: usize) -> Result<f64> {
    let value = finite(value, field, line)?;
    if value < 0.0 {
        return Err(invalid(line, format!("{field} is negative")));
    }
    Ok(value)
}

fn invalid(line: usize, reason: String) -> MetricsError {
    MetricsError::InvalidRecord { line, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRIP_LINE: &str = r#"{"start_time": 7200, "trip_duration": "600.5", "trip_distance": 1500, "route": {"features": [
        {"properties": {"timestamp": 7200}, "geometry": {"coordinates": [-86.8251, 36.1331]}},
        {"properties": {"timestamp": 7800}, "geometry": {"coordinates": [-86.7001, 36.2001]}}]}}"#;

    #[test]
    fn test_parse_trip_line() {
        let input = TRIP_LINE.replace('\n', " ");
        let trips = parse_trip_lines(Cursor::new(input)).unwrap();

        assert_eq!(trips.len(), 1);
        let trip = &trips[0];
        assert_eq!(trip.start_time, 7200.0);
        assert_eq!(trip.trip_duration, 600.5);
        assert_eq!(trip.trip_distance, 1500.0);
        assert_eq!(trip.route.len(), 2);
        assert_eq!(trip.route[0].lat, 36.1331);
        assert_eq!(trip.route[0].long, -86.8251);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let input = format!("\n{}\n\n", TRIP_LINE.replace('\n', " "));
        let trips = parse_trip_lines(Cursor::new(input)).unwrap();
        assert_eq!(trips.len(), 1);
    }

    #[test]
    fn test_missing_route_is_rejected_with_line() {
        let input = "{\"start_time\": 1, \"trip_duration\": 1, \"trip_distance\": 1}\n";
        let err = parse_trip_lines(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_short_coordinates_rejected() {
        let input = r#"{"start_time": 1, "trip_duration": 1, "trip_distance": 1, "route": {"features": [{"properties": {"timestamp": 1}, "geometry": {"coordinates": [1.0]}}]}}"#;
        let err = parse_trip_lines(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_non_numeric_duration_rejected() {
        let input = r#"{"start_time": 1, "trip_duration": "soon", "trip_distance": 1, "route": {"features": []}}"#;
        let err = parse_trip_lines(Cursor::new(input)).unwrap_err();
        assert!(err.to_string().contains("trip_duration is not numeric"));
    }

    #[test]
    fn test_negative_distance_rejected() {
        let input = r#"{"start_time": 1, "trip_duration": 1, "trip_distance": -4, "route": {"features": []}}"#;
        assert!(parse_trip_lines(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_parse_events() {
        let input = concat!(
            r#"{"event_time": 100, "vehicle_id": "v1", "event_type": "available", "event_location": {"geometry": {"coordinates": [-86.8, 36.1]}}}"#,
            "\n",
            r#"{"event_time": 200, "vehicle_id": "v2", "event_type": "reserved", "event_location": {"geometry": {"coordinates": [-86.8, 36.1]}}}"#,
        );
        let events = parse_event_lines(Cursor::new(input)).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Available);
        assert_eq!(events[1].event_type, EventType::Other("reserved".to_string()));
        assert_eq!(events[1].lat, 36.1);
        assert_eq!(events[1].long, -86.8);
    }

    #[test]
    fn test_parse_trip_csv() {
        let input = "pickup_date, pickup_time, dropoff_date, dropoff_time, pickup_lat, pickup_long, dropoff_lat, dropoff_long\n\
                     2019-01-01, 00:10:00, 2019-01-01, 00:25:00, 36.1331, -86.8251, 36.2001, -86.7001\n";
        let trips = parse_trip_csv(Cursor::new(input)).unwrap();

        assert_eq!(trips.len(), 1);
        let trip = &trips[0];
        assert_eq!(trip.start_time, 1546301400.0);
        assert_eq!(trip.trip_duration, 900.0);
        assert_eq!(trip.trip_distance, 0.0);
        assert_eq!(trip.route[1].timestamp, 1546302300.0);
        assert_eq!(trip.route[1].lat, 36.2001);
    }

    #[test]
    fn test_csv_dropoff_before_pickup_rejected() {
        let input = "pickup_date,pickup_time,dropoff_date,dropoff_time,pickup_lat,pickup_long,dropoff_lat,dropoff_long\n\
                     2019-01-01,00:30:00,2019-01-01,00:25:00,36.1,-86.8,36.2,-86.7\n";
        let err = parse_trip_csv(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidRecord { line: 2, .. }));
    }

    #[test]
    fn test_input_format_from_path() {
        let format = |name: &str| InputFormat::from_path(Path::new(name));

        assert_eq!(format("trips.json").unwrap(), InputFormat::JsonLines);
        assert_eq!(format("trips.json.gz").unwrap(), InputFormat::JsonLines);
        assert_eq!(format("trips.CSV").unwrap(), InputFormat::Csv);
        assert_eq!(format("out.pbf").unwrap(), InputFormat::Metrics);
        assert!(format("trips.xml").is_err());
    }
}
