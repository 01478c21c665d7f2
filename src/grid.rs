//! Spatial and temporal quantization shared by every aggregation pass.
//!
//! Coordinates are coarsened into zones by rounding them to a fixed number of
//! decimal digits, and timestamps are folded into periods of a repeating
//! cycle (hour-of-week by default).

use serde::Serialize;
use serde::ser::Serializer;
use std::collections::HashMap;

use crate::error::{MetricsError, Result};

/// Dense zone identifier, assigned in first-seen order from 0.
pub type ZoneId = u32;

/// Bucket index within a cycle, always in `[0, cycle_length)`.
pub type Period = u32;

/// Maps a timestamp in seconds to its bucket within the cycle.
///
/// Negative timestamps wrap the same way positive ones do, so the result is
/// always in `[0, cycle_length)`.
pub fn period_of(timestamp: f64, period_seconds: u32, cycle_length: u32) -> Period {
    let bucket = (timestamp / f64::from(period_seconds)).floor() as i64;
    bucket.rem_euclid(i64::from(cycle_length)) as Period
}

/// Formats a coordinate pair as the `"lat:long"` zone key.
pub fn zone_key(lat: f64, long: f64, precision: usize) -> String {
    format!("{lat:03.precision$}:{long:03.precision$}")
}

/// Bijection between zone ids and their coordinate strings.
///
/// Both lookup directions live in one structure so they cannot drift apart;
/// ids are never reassigned once handed out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneTable {
    coordinates: Vec<String>,
    ids: HashMap<String, ZoneId>,
}

impl ZoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a table from coordinate strings ordered by zone id.
    pub fn from_coordinates<I>(coordinates: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut table = Self::new();
        for coordinate in coordinates {
            if table.ids.contains_key(&coordinate) {
                return Err(MetricsError::InvalidZoneTable(format!(
                    "duplicate coordinate {coordinate}"
                )));
            }
            table.insert(coordinate);
        }
        Ok(table)
    }

    /// Returns the zone for a coordinate pair, assigning the next id if the
    /// rounded coordinates have not been seen before.
    pub fn intern(&mut self, lat: f64, long: f64, precision: usize) -> ZoneId {
        let key = zone_key(lat, long, precision);
        match self.ids.get(&key) {
            Some(&id) => id,
            None => self.insert(key),
        }
    }

    fn insert(&mut self, key: String) -> ZoneId {
        let id = self.coordinates.len() as ZoneId;
        self.ids.insert(key.clone(), id);
        self.coordinates.push(key);
        id
    }

    pub fn coordinates(&self, id: ZoneId) -> Option<&str> {
        self.coordinates.get(id as usize).map(String::as_str)
    }

    pub fn id_of(&self, coordinate: &str) -> Option<ZoneId> {
        self.ids.get(coordinate).copied()
    }

    /// Splits a zone's key back into `(lat, long)`.
    pub fn lat_long(&self, id: ZoneId) -> Option<(f64, f64)> {
        let (lat, long) = self.coordinates(id)?.split_once(':')?;
        Some((lat.parse().ok()?, long.parse().ok()?))
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Iterates zones in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ZoneId, &str)> {
        self.coordinates
            .iter()
            .enumerate()
            .map(|(id, coordinate)| (id as ZoneId, coordinate.as_str()))
    }
}

impl Serialize for ZoneTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_of_hour_of_week() {
        assert_eq!(period_of(0.0, 3600, 168), 0);
        assert_eq!(period_of(3599.9, 3600, 168), 0);
        assert_eq!(period_of(3600.0, 3600, 168), 1);
        assert_eq!(period_of(168.0 * 3600.0 + 7200.0, 3600, 168), 2);
    }

    #[test]
    fn test_period_of_negative_timestamp_wraps() {
        assert_eq!(period_of(-1.0, 3600, 24), 23);
        assert_eq!(period_of(-3600.0, 3600, 24), 23);
        assert_eq!(period_of(-3601.0, 3600, 24), 22);
    }

    #[test]
    fn test_zone_key_format() {
        assert_eq!(zone_key(36.13312, -86.82549, 3), "36.133:-86.825");
        assert_eq!(zone_key(5.0, -5.0, 0), "005:-05");
        assert_eq!(zone_key(1.26, 2.0, 1), "1.3:2.0");
    }

    #[test]
    fn test_intern_assigns_dense_ids_in_first_seen_order() {
        let mut zones = ZoneTable::new();
        assert_eq!(zones.intern(36.1331, -86.8251, 3), 0);
        assert_eq!(zones.intern(36.2, -86.7, 3), 1);
        assert_eq!(zones.intern(36.1332, -86.8252, 3), 0);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones.coordinates(1), Some("36.200:-86.700"));
        assert_eq!(zones.id_of("36.133:-86.825"), Some(0));
    }

    #[test]
    fn test_precision_controls_coarsening() {
        let mut zones = ZoneTable::new();
        let a = zones.intern(36.11, -86.81, 1);
        let b = zones.intern(36.14, -86.79, 1);
        assert_eq!(a, b);

        let mut fine = ZoneTable::new();
        assert_ne!(fine.intern(36.11, -86.81, 2), fine.intern(36.14, -86.79, 2));
    }

    #[test]
    fn test_from_coordinates_rejects_duplicates() {
        let duplicate = "1.0:2.0".to_string();
        let result = ZoneTable::from_coordinates(vec![duplicate.clone(), duplicate]);
        assert!(matches!(result, Err(MetricsError::InvalidZoneTable(_))));
    }

    #[test]
    fn test_lat_long_round_trip() {
        let mut zones = ZoneTable::new();
        let id = zones.intern(36.133, -86.825, 3);
        assert_eq!(zones.lat_long(id), Some((36.133, -86.825)));
        assert_eq!(zones.lat_long(42), None);
    }

    #[test]
    fn test_serialize_as_id_map() {
        let mut zones = ZoneTable::new();
        zones.intern(1.0, 2.0, 1);
        let json = serde_json::to_string(&zones).unwrap();
        assert_eq!(json, r#"{"0":"1.0:2.0"}"#);
    }
}
