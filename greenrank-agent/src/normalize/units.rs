//! Unit & token normalizer
//!
//! Converts raw field values (mixed energy units, fuzzy magnitude
//! suffixes, percentage strings, decorated counts) into canonical numeric
//! form.
//!
//! # Rules
//! - Energy: plain numbers are already kWh; `kWh` accepted verbatim;
//!   `MWh` scaled ×1000; magnitude suffixes k/M/B (case-insensitive)
//!   scale 1e3/1e6/1e9.
//! - Counts (tokens, API calls): magnitude suffixes, thousands separators,
//!   and trailing words ("tokens", "calls") are stripped.
//! - Percentages: trailing `%` stripped, value kept on the 0–100 scale.
//!   Values strictly between 0 and 1 are NOT rescaled ×100 — they are
//!   flagged as fraction-of-100 defects and routed to imputation instead
//!   of guessed at.
//! - Months: `YYYY-MM` with `/` or `.` separators and unpadded months is
//!   mechanically repaired; free-text dates belong to an upstream adapter.

use crate::types::UnparseableValue;
use greenrank_common::records::{Field, RawValue};

/// Scale factor for a magnitude suffix (k/M/B, case-insensitive).
fn magnitude(suffix: char) -> Option<f64> {
    match suffix.to_ascii_lowercase() {
        'k' => Some(1e3),
        'm' => Some(1e6),
        'b' => Some(1e9),
        _ => None,
    }
}

/// Parse a number with optional thousands separators and an optional
/// trailing magnitude suffix ("12.2B", "5 M", "12,000").
fn parse_scaled(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<f64>() {
        return Some(n);
    }
    let mut chars = cleaned.chars();
    let last = chars.next_back()?;
    let scale = magnitude(last)?;
    let head = chars.as_str().trim();
    head.parse::<f64>().ok().map(|n| n * scale)
}

/// Parse a plain number, tolerating thousands separators.
fn parse_plain(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn unparseable(field: Field, raw: &RawValue) -> UnparseableValue {
    let raw = match raw {
        RawValue::Number(n) => n.to_string(),
        RawValue::Text(s) => s.clone(),
        RawValue::Absent => String::new(),
    };
    UnparseableValue { field, raw }
}

/// Energy in kWh from a raw value.
pub fn parse_energy_kwh(raw: &RawValue) -> Result<f64, UnparseableValue> {
    match raw {
        RawValue::Number(n) => Ok(*n),
        RawValue::Text(s) => {
            parse_energy_text(s).ok_or_else(|| unparseable(Field::EnergyKwh, raw))
        }
        RawValue::Absent => Err(unparseable(Field::EnergyKwh, raw)),
    }
}

/// Text form of the energy rules, used by the Planner for classification.
pub fn parse_energy_text(s: &str) -> Option<f64> {
    let lower = s.trim().to_lowercase();
    if let Some(body) = lower.strip_suffix("mwh") {
        return parse_scaled(body).map(|n| n * 1000.0);
    }
    if let Some(body) = lower.strip_suffix("kwh") {
        return parse_scaled(body);
    }
    parse_scaled(&lower)
}

/// Non-negative count (tokens, API calls) from a raw value.
pub fn parse_count(raw: &RawValue, field: Field) -> Result<u64, UnparseableValue> {
    let n = match raw {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => parse_count_text(s).ok_or_else(|| unparseable(field, raw))?,
        RawValue::Absent => return Err(unparseable(field, raw)),
    };
    if n.is_finite() && n >= 0.0 {
        Ok(n.round() as u64)
    } else {
        Err(unparseable(field, raw))
    }
}

/// Text form of the count rules ("12.2B", "8,500 calls").
pub fn parse_count_text(s: &str) -> Option<f64> {
    let mut body = s.trim().to_lowercase();
    for word in ["tokens", "token", "tok", "requests", "request", "calls", "call"] {
        if let Some(stripped) = body.strip_suffix(word) {
            body = stripped.trim().to_string();
            break;
        }
    }
    parse_scaled(&body)
}

/// GPU hours from a raw value ("800", "650 hrs").
pub fn parse_gpu_hours(raw: &RawValue) -> Result<f64, UnparseableValue> {
    match raw {
        RawValue::Number(n) => Ok(*n),
        RawValue::Text(s) => {
            parse_gpu_hours_text(s).ok_or_else(|| unparseable(Field::GpuHours, raw))
        }
        RawValue::Absent => Err(unparseable(Field::GpuHours, raw)),
    }
}

/// Text form of the GPU-hour rules.
pub fn parse_gpu_hours_text(s: &str) -> Option<f64> {
    let mut body = s.trim().to_lowercase();
    for word in ["hours", "hrs", "hr"] {
        if let Some(stripped) = body.strip_suffix(word) {
            body = stripped.trim().to_string();
            break;
        }
    }
    parse_plain(&body)
}

/// PUE from a raw value. Plain ratio, no units.
pub fn parse_pue(raw: &RawValue) -> Result<f64, UnparseableValue> {
    match raw {
        RawValue::Number(n) => Ok(*n),
        RawValue::Text(s) => parse_plain(s).ok_or_else(|| unparseable(Field::Pue, raw)),
        RawValue::Absent => Err(unparseable(Field::Pue, raw)),
    }
}

/// A parsed percentage on the 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentValue {
    pub value: f64,
    /// True when the value lies strictly between 0 and 1: almost
    /// certainly a fraction reported where a percentage was expected.
    /// The normalizer does not guess ×100; the field goes to imputation.
    pub fraction_defect: bool,
}

/// Percentage (utilization) from a raw value.
pub fn parse_percent(raw: &RawValue) -> Result<PercentValue, UnparseableValue> {
    let value = match raw {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => {
            parse_percent_text(s).ok_or_else(|| unparseable(Field::Utilization, raw))?
        }
        RawValue::Absent => return Err(unparseable(Field::Utilization, raw)),
    };
    Ok(PercentValue {
        value,
        fraction_defect: value > 0.0 && value < 1.0,
    })
}

/// Text form of the percentage rules ("90%", "87.5").
pub fn parse_percent_text(s: &str) -> Option<f64> {
    let body = s.trim().strip_suffix('%').unwrap_or(s.trim());
    parse_plain(body)
}

/// Mechanically repair a month string to YYYY-MM.
///
/// Accepts `-`, `/`, or `.` separators and unpadded months. Returns None
/// for anything needing actual interpretation.
pub fn repair_month(raw: &str) -> Option<String> {
    let cleaned = raw.trim().replace(['/', '.'], "-");
    let mut parts = cleaned.split('-');
    let year = parts.next()?.trim();
    let month = parts.next()?.trim();
    if parts.next().is_some() || year.len() != 4 {
        return None;
    }
    let y: u16 = year.parse().ok()?;
    let m: u8 = month.parse().ok()?;
    if !(1..=12).contains(&m) {
        return None;
    }
    Some(format!("{:04}-{:02}", y, m))
}
