//! Record validation
//!
//! Validation is split in two passes. [`RecordValidator::validate_structure`]
//! runs before any derivation, in order:
//!
//! 1. structure: identifier present, numeric fields parse, flag present
//! 2. geofence: pickup and dropoff inside the bounding box
//! 3. timestamps: pickup and dropoff parse to calendar instants
//!
//! [`RecordValidator::validate_plausibility`] runs on the derived duration,
//! distance and speed. Both return a [`Rejection`] instead of an error.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{RawRecord, Rejection};

/// Timestamp layout used by the trip export files
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Latitude/longitude bounding box, inclusive on every edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for Geofence {
    fn default() -> Self {
        Self {
            min_lat: 40.4,
            max_lat: 41.0,
            min_lon: -74.3,
            max_lon: -73.7,
        }
    }
}

impl Geofence {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    pub fn is_well_formed(&self) -> bool {
        self.min_lat < self.max_lat && self.min_lon < self.max_lon
    }
}

/// Inclusive physical ranges a trip has to fall into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityLimits {
    pub min_duration_secs: i64,
    pub max_duration_secs: i64,
    pub min_distance_km: f64,
    pub max_distance_km: f64,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

impl Default for PlausibilityLimits {
    fn default() -> Self {
        Self {
            min_duration_secs: 60,
            max_duration_secs: 5 * 3600,
            min_distance_km: 0.1,
            max_distance_km: 100.0,
            min_speed_kmh: 1.0,
            max_speed_kmh: 100.0,
        }
    }
}

/// Full rule set applied to every row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub geofence: Geofence,
    pub limits: PlausibilityLimits,
}

/// A row that passed the structural, geofence and timestamp checks
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrip {
    pub id: String,
    pub vendor_id: i32,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i32,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub store_and_fwd_flag: char,
    pub trip_duration_secs: i64,
}

#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    rules: ValidationRules,
}

impl RecordValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// Structural, geofence and timestamp checks, short-circuiting in that order
    pub fn validate_structure(&self, raw: &RawRecord) -> Result<ParsedTrip, Rejection> {
        let id = raw.id.trim();
        if id.is_empty() {
            return Err(Rejection::Malformed("empty identifier".to_string()));
        }

        let vendor_id: i32 = parse_field(&raw.vendor_id, "vendor_id")?;
        let passenger_count: i32 = parse_field(&raw.passenger_count, "passenger_count")?;
        if passenger_count < 0 {
            return Err(Rejection::Malformed(format!(
                "passenger_count: negative value {}",
                passenger_count
            )));
        }
        let pickup_latitude = parse_coordinate(&raw.pickup_latitude, "pickup_latitude")?;
        let pickup_longitude = parse_coordinate(&raw.pickup_longitude, "pickup_longitude")?;
        let dropoff_latitude = parse_coordinate(&raw.dropoff_latitude, "dropoff_latitude")?;
        let dropoff_longitude = parse_coordinate(&raw.dropoff_longitude, "dropoff_longitude")?;
        let trip_duration_secs = parse_duration(&raw.trip_duration)?;
        let store_and_fwd_flag = parse_flag(&raw.store_and_fwd_flag)?;

        let fence = &self.rules.geofence;
        if !fence.contains(pickup_latitude, pickup_longitude) {
            return Err(Rejection::OutOfBounds(format!(
                "pickup ({}, {})",
                pickup_latitude, pickup_longitude
            )));
        }
        if !fence.contains(dropoff_latitude, dropoff_longitude) {
            return Err(Rejection::OutOfBounds(format!(
                "dropoff ({}, {})",
                dropoff_latitude, dropoff_longitude
            )));
        }

        let pickup_datetime = parse_timestamp(&raw.pickup_datetime, "pickup_datetime")?;
        let dropoff_datetime = parse_timestamp(&raw.dropoff_datetime, "dropoff_datetime")?;

        Ok(ParsedTrip {
            id: id.to_string(),
            vendor_id,
            pickup_datetime,
            dropoff_datetime,
            passenger_count,
            pickup_latitude,
            pickup_longitude,
            dropoff_latitude,
            dropoff_longitude,
            store_and_fwd_flag,
            trip_duration_secs,
        })
    }

    /// Range checks on duration, derived distance and derived speed
    pub fn validate_plausibility(
        &self,
        duration_secs: i64,
        distance_km: f64,
        speed_kmh: f64,
    ) -> Result<(), Rejection> {
        let limits = &self.rules.limits;

        if !(limits.min_duration_secs..=limits.max_duration_secs).contains(&duration_secs) {
            return Err(Rejection::Outlier(format!("duration {}s", duration_secs)));
        }
        if !(limits.min_distance_km..=limits.max_distance_km).contains(&distance_km) {
            return Err(Rejection::Outlier(format!("distance {:.3} km", distance_km)));
        }
        if !(limits.min_speed_kmh..=limits.max_speed_kmh).contains(&speed_kmh) {
            return Err(Rejection::Outlier(format!("speed {:.2} km/h", speed_kmh)));
        }

        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, Rejection> {
    value
        .trim()
        .parse()
        .map_err(|_| Rejection::Malformed(format!("{}: not a number: {:?}", field, value)))
}

/// Whole seconds, written as an integer or an integral decimal such as "600.0"
fn parse_duration(value: &str) -> Result<i64, Rejection> {
    if let Ok(secs) = value.trim().parse::<i64>() {
        return Ok(secs);
    }

    let secs: f64 = parse_field(value, "trip_duration")?;
    // The range is [-2^63, 2^63), so the cast below is exact
    if secs.fract() != 0.0 || !(i64::MIN as f64..i64::MAX as f64).contains(&secs) {
        return Err(Rejection::Malformed(format!(
            "trip_duration: not a whole number of seconds: {:?}",
            value
        )));
    }
    Ok(secs as i64)
}

fn parse_coordinate(value: &str, field: &str) -> Result<f64, Rejection> {
    let parsed: f64 = parse_field(value, field)?;
    if !parsed.is_finite() {
        return Err(Rejection::Malformed(format!("{}: not finite: {:?}", field, value)));
    }
    Ok(parsed)
}

fn parse_flag(value: &str) -> Result<char, Rejection> {
    let mut chars = value.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(flag), None) => Ok(flag),
        (None, _) => Err(Rejection::Malformed("store_and_fwd_flag: missing".to_string())),
        (Some(_), Some(_)) => Err(Rejection::Malformed(format!(
            "store_and_fwd_flag: expected one character, got {:?}",
            value
        ))),
    }
}

/// Parse a local `YYYY-MM-DD HH:MM:SS` timestamp or an RFC 3339 instant
///
/// RFC 3339 values keep the wall-clock time of the offset they carry.
pub fn parse_timestamp(value: &str, field: &str) -> Result<NaiveDateTime, Rejection> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.naive_local()))
        .map_err(|_| Rejection::Malformed(format!("{}: invalid timestamp {:?}", field, value)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn raw() -> RawRecord {
        RawRecord {
            id: "id2875421".to_string(),
            vendor_id: "2".to_string(),
            pickup_datetime: "2016-03-14 17:24:55".to_string(),
            dropoff_datetime: "2016-03-14 17:34:55".to_string(),
            passenger_count: "1".to_string(),
            pickup_latitude: "40.7128".to_string(),
            pickup_longitude: "-74.0060".to_string(),
            dropoff_latitude: "40.7306".to_string(),
            dropoff_longitude: "-73.9352".to_string(),
            store_and_fwd_flag: "N".to_string(),
            trip_duration: "600".to_string(),
        }
    }

    fn validator() -> RecordValidator {
        RecordValidator::default()
    }

    #[test]
    fn test_valid_record_parses() {
        let trip = validator().validate_structure(&raw()).unwrap();
        assert_eq!(trip.id, "id2875421");
        assert_eq!(trip.vendor_id, 2);
        assert_eq!(trip.store_and_fwd_flag, 'N');
        assert_eq!(trip.trip_duration_secs, 600);
        assert_eq!(trip.pickup_datetime.hour(), 17);
    }

    #[test]
    fn test_empty_identifier_is_malformed() {
        let mut record = raw();
        record.id = "   ".to_string();
        let err = validator().validate_structure(&record).unwrap_err();
        assert_eq!(err.code(), "malformed");
    }

    #[test]
    fn test_non_numeric_fields_are_malformed() {
        for field in ["vendor", "passengers", "lat", "duration"] {
            let mut record = raw();
            match field {
                "vendor" => record.vendor_id = "two".to_string(),
                "passengers" => record.passenger_count = String::new(),
                "lat" => record.pickup_latitude = "north".to_string(),
                _ => record.trip_duration = "10m".to_string(),
            }
            let err = validator().validate_structure(&record).unwrap_err();
            assert!(matches!(err, Rejection::Malformed(_)), "{}: {:?}", field, err);
        }
    }

    #[test]
    fn test_integral_decimal_duration_is_accepted() {
        let mut record = raw();
        record.trip_duration = "600.0".to_string();
        let trip = validator().validate_structure(&record).unwrap();
        assert_eq!(trip.trip_duration_secs, 600);
    }

    #[test]
    fn test_fractional_or_non_finite_duration_is_malformed() {
        for value in ["600.5", "inf", "NaN", "1e30"] {
            let mut record = raw();
            record.trip_duration = value.to_string();
            assert!(
                matches!(validator().validate_structure(&record), Err(Rejection::Malformed(_))),
                "{}",
                value
            );
        }
    }

    #[test]
    fn test_negative_passenger_count_is_malformed() {
        let mut record = raw();
        record.passenger_count = "-1".to_string();
        assert!(matches!(
            validator().validate_structure(&record),
            Err(Rejection::Malformed(_))
        ));
    }

    #[test]
    fn test_nan_coordinate_is_malformed_not_out_of_bounds() {
        let mut record = raw();
        record.dropoff_longitude = "NaN".to_string();
        assert!(matches!(
            validator().validate_structure(&record),
            Err(Rejection::Malformed(_))
        ));
    }

    #[test]
    fn test_flag_must_be_single_character() {
        let mut record = raw();
        record.store_and_fwd_flag = String::new();
        assert!(validator().validate_structure(&record).is_err());
        record.store_and_fwd_flag = "NO".to_string();
        assert!(validator().validate_structure(&record).is_err());
    }

    #[test]
    fn test_geofence_rejects_pickup_and_dropoff() {
        let mut record = raw();
        record.pickup_latitude = "45.0".to_string();
        assert!(matches!(
            validator().validate_structure(&record),
            Err(Rejection::OutOfBounds(_))
        ));

        let mut record = raw();
        record.dropoff_longitude = "-73.5".to_string();
        assert!(matches!(
            validator().validate_structure(&record),
            Err(Rejection::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_geofence_edges_are_inclusive() {
        let fence = Geofence::default();
        assert!(fence.contains(40.4, -74.3));
        assert!(fence.contains(41.0, -73.7));
        assert!(!fence.contains(41.0001, -74.0));
    }

    #[test]
    fn test_geofence_checked_before_timestamps() {
        let mut record = raw();
        record.pickup_latitude = "39.0".to_string();
        record.pickup_datetime = "yesterday".to_string();
        assert!(matches!(
            validator().validate_structure(&record),
            Err(Rejection::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let mut record = raw();
        record.dropoff_datetime = "2016-02-30 10:00:00".to_string();
        assert!(matches!(
            validator().validate_structure(&record),
            Err(Rejection::Malformed(_))
        ));
    }

    #[test]
    fn test_rfc3339_timestamp_keeps_local_wall_clock() {
        let parsed = parse_timestamp("2016-03-14T23:10:00-05:00", "pickup_datetime").unwrap();
        assert_eq!(parsed.hour(), 23);
    }

    #[test]
    fn test_plausibility_ranges() {
        let v = validator();
        assert!(v.validate_plausibility(600, 6.3, 37.7).is_ok());
        assert!(v.validate_plausibility(60, 0.1, 1.0).is_ok());
        assert!(v.validate_plausibility(18000, 100.0, 100.0).is_ok());

        assert!(v.validate_plausibility(30, 6.3, 37.7).is_err());
        assert!(v.validate_plausibility(18001, 6.3, 37.7).is_err());
        assert!(v.validate_plausibility(600, 0.05, 37.7).is_err());
        assert!(v.validate_plausibility(600, 6.3, 120.0).is_err());
        assert!(v.validate_plausibility(600, 6.3, 0.5).is_err());
    }

    #[test]
    fn test_custom_rules() {
        let rules = ValidationRules {
            limits: PlausibilityLimits {
                min_duration_secs: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(RecordValidator::new(rules)
            .validate_plausibility(30, 1.0, 50.0)
            .is_ok());
    }
}
