//! Messy-vendor sample batch generator
//!
//! Three vendor feed styles covering the defects the pipeline exists for:
//! - Vendor A: clean numbers, fuzzy token counts, occasionally missing PUE
//! - Vendor B: mixed units (MWh, "hrs" suffixes), frequently missing energy
//! - Vendor C: unknown region, fraction-of-100 utilization, sparse fields
//!
//! Seeded RNG keeps batches reproducible for the CLI demo and tests.

use greenrank_common::records::{RawRecord, RawValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MONTHS: [&str; 3] = ["2024-01", "2024-02", "2024-03"];

/// Generate a deterministic messy batch: `per_vendor` records for each of
/// the three vendor styles.
pub fn sample_batch(seed: u64, per_vendor: usize) -> Vec<RawRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(per_vendor * 3);
    for i in 0..per_vendor {
        let month = MONTHS[i % MONTHS.len()];
        records.push(vendor_a(&mut rng, month));
        records.push(vendor_b(&mut rng, month));
        records.push(vendor_c(&mut rng, month));
    }
    records
}

/// Clean format, fuzzy token counts, some missing PUE.
fn vendor_a(rng: &mut StdRng, month: &str) -> RawRecord {
    let mut r = RawRecord::new("CloudAI-Pro", month, "US-East");
    r.gpu_hours = RawValue::Number(rng.gen_range(800..1200) as f64);
    r.energy = RawValue::Text(format!("{} kWh", rng.gen_range(320..480)));
    r.tokens = RawValue::Text(format!("{:.1}B", rng.gen_range(8.0..15.0)));
    r.api_calls = RawValue::Number(rng.gen_range(10_000..50_000) as f64);
    r.pue = if rng.gen_bool(0.7) {
        RawValue::Text("1.2".to_string())
    } else {
        RawValue::Absent
    };
    r.utilization = RawValue::Text(format!("{}%", rng.gen_range(65..95)));
    r
}

/// Mixed units, often missing energy.
fn vendor_b(rng: &mut StdRng, month: &str) -> RawRecord {
    let mut r = RawRecord::new("DataForge-LLC", month, "us-west");
    r.gpu_hours = RawValue::Text(format!("{} hrs", rng.gen_range(600..1000)));
    r.energy = if rng.gen_bool(0.6) {
        RawValue::Text(format!("{:.2} MWh", rng.gen_range(0.2..0.4)))
    } else {
        RawValue::Absent
    };
    r.tokens = RawValue::Text(format!("{}M", rng.gen_range(5..12)));
    r.api_calls = RawValue::Number(rng.gen_range(8_000..25_000) as f64);
    r.pue = RawValue::Number(rng.gen_range(1.1..1.4));
    r.utilization = RawValue::Number(rng.gen_range(45..85) as f64);
    r
}

/// Very messy: unknown region, sparse fields, fraction-style utilization.
fn vendor_c(rng: &mut StdRng, month: &str) -> RawRecord {
    let mut r = RawRecord::new("GreenCompute-Inc", month, "datacenter-7");
    r.gpu_hours = RawValue::Number(rng.gen_range(100..500) as f64);
    r.energy = if rng.gen_bool(0.3) {
        RawValue::Number(rng.gen_range(50..150) as f64)
    } else {
        RawValue::Absent
    };
    r.tokens = if rng.gen_bool(0.5) {
        RawValue::Text(format!("{}k", rng.gen_range(500..5000)))
    } else {
        RawValue::Absent
    };
    r.api_calls = RawValue::Number(rng.gen_range(1_000..5_000) as f64);
    r.pue = RawValue::Absent;
    r.utilization = if rng.gen_bool(0.5) {
        // Fraction where a percentage belongs
        RawValue::Number(rng.gen_range(0.4..0.9))
    } else {
        RawValue::Number(rng.gen_range(30..70) as f64)
    };
    r
}
