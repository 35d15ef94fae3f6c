//! Derived trip features
//!
//! Distance and speed come from [`crate::geo`]; hour, weekday and the weekend
//! flag come from the pickup timestamp. Derivation is a pure function of the
//! parsed fields, so re-deriving an accepted record yields the same values.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::geo;
use crate::models::{CleanRecord, Rejection};
use crate::validator::{ParsedTrip, RecordValidator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub hour_of_day: u8,
    pub day_of_week: u8,
    pub is_weekend: bool,
}

pub fn derive_features(trip: &ParsedTrip) -> DerivedFeatures {
    let distance_km = geo::distance_km(
        trip.pickup_latitude,
        trip.pickup_longitude,
        trip.dropoff_latitude,
        trip.dropoff_longitude,
    );
    let speed_kmh = geo::speed_kmh(distance_km, trip.trip_duration_secs);
    let (hour_of_day, day_of_week) = temporal_parts(&trip.pickup_datetime);

    DerivedFeatures {
        distance_km,
        speed_kmh,
        hour_of_day,
        day_of_week,
        is_weekend: day_of_week == 0 || day_of_week == 6,
    }
}

/// Hour of day and weekday index (0 = Sunday)
fn temporal_parts(ts: &NaiveDateTime) -> (u8, u8) {
    // hour() < 24 and num_days_from_sunday() < 7, so the narrowing is lossless
    (ts.hour() as u8, ts.weekday().num_days_from_sunday() as u8)
}

/// Turns parsed trips into [`CleanRecord`]s, rejecting implausible ones
pub struct FeatureDeriver<'a> {
    validator: &'a RecordValidator,
}

impl<'a> FeatureDeriver<'a> {
    pub fn new(validator: &'a RecordValidator) -> Self {
        Self { validator }
    }

    pub fn derive(&self, trip: ParsedTrip) -> Result<CleanRecord, Rejection> {
        let features = derive_features(&trip);

        self.validator.validate_plausibility(
            trip.trip_duration_secs,
            features.distance_km,
            features.speed_kmh,
        )?;

        Ok(CleanRecord {
            id: trip.id,
            vendor_id: trip.vendor_id,
            pickup_datetime: trip.pickup_datetime,
            dropoff_datetime: trip.dropoff_datetime,
            passenger_count: trip.passenger_count,
            pickup_latitude: trip.pickup_latitude,
            pickup_longitude: trip.pickup_longitude,
            dropoff_latitude: trip.dropoff_latitude,
            dropoff_longitude: trip.dropoff_longitude,
            store_and_fwd_flag: trip.store_and_fwd_flag,
            trip_duration_secs: trip.trip_duration_secs,
            distance_km: features.distance_km,
            speed_kmh: features.speed_kmh,
            hour_of_day: features.hour_of_day,
            day_of_week: features.day_of_week,
            is_weekend: features.is_weekend,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trip_at(year: i32, month: u32, day: u32, hour: u32) -> ParsedTrip {
        let pickup = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 5, 0)
            .unwrap();
        ParsedTrip {
            id: "id1".to_string(),
            vendor_id: 1,
            pickup_datetime: pickup,
            dropoff_datetime: pickup + chrono::Duration::seconds(600),
            passenger_count: 1,
            pickup_latitude: 40.7128,
            pickup_longitude: -74.0060,
            dropoff_latitude: 40.7306,
            dropoff_longitude: -73.9352,
            store_and_fwd_flag: 'N',
            trip_duration_secs: 600,
        }
    }

    #[test]
    fn test_weekday_and_hour() {
        // 2016-03-14 was a Monday
        let features = derive_features(&trip_at(2016, 3, 14, 17));
        assert_eq!(features.hour_of_day, 17);
        assert_eq!(features.day_of_week, 1);
        assert!(!features.is_weekend);
    }

    #[test]
    fn test_weekend_days() {
        let sunday = derive_features(&trip_at(2016, 3, 13, 0));
        assert_eq!(sunday.day_of_week, 0);
        assert!(sunday.is_weekend);

        let saturday = derive_features(&trip_at(2016, 3, 19, 23));
        assert_eq!(saturday.day_of_week, 6);
        assert_eq!(saturday.hour_of_day, 23);
        assert!(saturday.is_weekend);
    }

    #[test]
    fn test_distance_and_speed() {
        let features = derive_features(&trip_at(2016, 3, 14, 8));
        assert!((features.distance_km - 6.286).abs() < 0.01);
        assert!((features.speed_kmh - features.distance_km * 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let validator = RecordValidator::default();
        let deriver = FeatureDeriver::new(&validator);
        let trip = trip_at(2016, 6, 4, 2);

        let record = deriver.derive(trip.clone()).unwrap();
        let again = derive_features(&trip);

        assert_eq!(record.distance_km.to_bits(), again.distance_km.to_bits());
        assert_eq!(record.speed_kmh.to_bits(), again.speed_kmh.to_bits());
        assert_eq!(record.hour_of_day, again.hour_of_day);
        assert_eq!(record.day_of_week, again.day_of_week);
        assert_eq!(record.is_weekend, again.is_weekend);
    }

    #[test]
    fn test_short_trip_is_outlier() {
        let validator = RecordValidator::default();
        let mut trip = trip_at(2016, 3, 14, 9);
        trip.trip_duration_secs = 30;
        let err = FeatureDeriver::new(&validator).derive(trip).unwrap_err();
        assert!(matches!(err, Rejection::Outlier(_)));
    }

    #[test]
    fn test_stationary_trip_is_outlier() {
        let validator = RecordValidator::default();
        let mut trip = trip_at(2016, 3, 14, 9);
        trip.dropoff_latitude = trip.pickup_latitude;
        trip.dropoff_longitude = trip.pickup_longitude;
        assert!(FeatureDeriver::new(&validator).derive(trip).is_err());
    }
}
