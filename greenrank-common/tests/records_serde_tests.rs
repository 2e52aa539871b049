//! Wire-shape tests for the data model
//!
//! Collaborator layers hand the pipeline JSON; raw fields must accept
//! numbers, strings, null, and plain omission, and unknown fields must be
//! ignored.

use greenrank_common::records::{RawRecord, RawValue};

#[test]
fn test_raw_value_accepts_number_string_null_and_absent() {
    let json = r#"{
        "company": "aws",
        "month": "2024-01",
        "region": "us-east",
        "gpu_hours": 1000,
        "energy": "1.2 MWh",
        "tokens": null,
        "pue": 1.12
    }"#;

    let record: RawRecord = serde_json::from_str(json).expect("parse");
    assert_eq!(record.gpu_hours, RawValue::Number(1000.0));
    assert_eq!(record.energy, RawValue::Text("1.2 MWh".to_string()));
    assert!(record.tokens.is_absent(), "null maps to Absent");
    assert!(record.api_calls.is_absent(), "omitted maps to Absent");
    assert_eq!(record.pue, RawValue::Number(1.12));
}

#[test]
fn test_unknown_fields_ignored() {
    let json = r#"{
        "company": "Google",
        "month": "2024-01",
        "region": "US-EAST",
        "data_center_nickname": "big-blue",
        "utilization": "90%"
    }"#;

    let record: RawRecord = serde_json::from_str(json).expect("unknown fields tolerated");
    assert_eq!(record.utilization, RawValue::Text("90%".to_string()));
}

#[test]
fn test_record_id_assigned_when_missing() {
    let json = r#"{"company": "A", "month": "2024-01", "region": "X"}"#;
    let a: RawRecord = serde_json::from_str(json).unwrap();
    let b: RawRecord = serde_json::from_str(json).unwrap();
    assert_ne!(a.id, b.id, "each ingestion gets its own identity");
}

#[test]
fn test_round_trip_preserves_raw_values() {
    let mut record = RawRecord::new("Acme", "2024-02", "EU-NL");
    record.energy = RawValue::Text("450 kWh".to_string());
    record.gpu_hours = RawValue::Number(812.0);

    let json = serde_json::to_string(&record).unwrap();
    let back: RawRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, record.id);
    assert_eq!(back.energy, record.energy);
    assert_eq!(back.gpu_hours, record.gpu_hours);
    assert!(back.tokens.is_absent());
}
