//! Imputation rules for missing fields
//!
//! Applied only when a required field is absent after normalization —
//! never to override a value the vendor actually reported. Every
//! imputation decreases the record's quality score by the configured
//! per-field penalty (floor 0) and records the field in `imputed_fields`.

use greenrank_common::config::PipelineConfig;
use greenrank_common::records::Field;

/// Derive missing energy from GPU hours:
/// `gpu_hours × assumed_watts_per_gpu_hour / 1000 × pue`, using the
/// record's own PUE when present, else the configured default.
///
/// Returns None when GPU hours cannot support the derivation.
pub fn correlate_energy_kwh(
    gpu_hours: Option<f64>,
    pue: Option<f64>,
    config: &PipelineConfig,
) -> Option<f64> {
    let gpu = gpu_hours?;
    if gpu <= 0.0 {
        return None;
    }
    let pue = pue.unwrap_or(config.default_pue);
    Some(gpu * config.assumed_watts_per_gpu_hour / 1000.0 * pue)
}

/// Configured default for a missing field, as a float.
///
/// None means the field has no default and stays unresolved when missing.
/// Counts default to 0 (downstream metrics treat a 0 denominator as
/// undefined rather than dividing by it).
pub fn default_value(field: Field, config: &PipelineConfig) -> Option<f64> {
    match field {
        Field::GpuHours => Some(0.0),
        Field::Tokens | Field::ApiCalls => Some(0.0),
        Field::Pue => Some(config.default_pue),
        Field::Utilization => config.default_utilization,
        Field::EnergyKwh | Field::Company | Field::Month | Field::Region => None,
    }
}
