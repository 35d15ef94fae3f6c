//! Shared fixtures for tripflow-ingest integration tests

#![allow(dead_code)]

use tripflow_ingest::RawRecord;

/// CSV header in the column order of the public trip exports
pub const CSV_HEADER: &str = "id,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,\
pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,store_and_fwd_flag,trip_duration";

/// Lower Manhattan to Williamsburg, ten minutes on a Monday afternoon
pub fn valid_trip(id: &str) -> RawRecord {
    RawRecord {
        id: id.to_string(),
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

pub fn valid_trips(count: usize) -> Vec<RawRecord> {
    (0..count).map(|i| valid_trip(&format!("id{:05}", i))).collect()
}

/// Render a record as a CSV line matching [`CSV_HEADER`]
pub fn csv_line(r: &RawRecord) -> String {
    [
        r.id.as_str(),
        &r.vendor_id,
        &r.pickup_datetime,
        &r.dropoff_datetime,
        &r.passenger_count,
        &r.pickup_longitude,
        &r.pickup_latitude,
        &r.dropoff_longitude,
        &r.dropoff_latitude,
        &r.store_and_fwd_flag,
        &r.trip_duration,
    ]
    .join(",")
}
