//! Data model for the normalization-and-ranking pipeline
//!
//! Four stages of data: raw vendor submissions → normalized events →
//! monthly rollups → rankings. All types are plain serde values; wire
//! formats and persistence belong to the collaborator layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Field identifiers used across plans, imputation logs, and validation
/// reasons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Company,
    Month,
    Region,
    GpuHours,
    EnergyKwh,
    Tokens,
    ApiCalls,
    Pue,
    Utilization,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Company => "company",
            Field::Month => "month",
            Field::Region => "region",
            Field::GpuHours => "gpu_hours",
            Field::EnergyKwh => "energy_kwh",
            Field::Tokens => "tokens",
            Field::ApiCalls => "api_calls",
            Field::Pue => "pue",
            Field::Utilization => "utilization",
        };
        write!(f, "{}", name)
    }
}

/// Raw field value at the ingestion boundary.
///
/// Vendor submissions arrive as numbers, strings, or nothing at all; the
/// tagged variant keeps the normalizer's contract exhaustive instead of
/// pushing an untyped blob through the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl RawValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, RawValue::Absent)
    }

    /// Numeric view, if the value is already a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view, if the value is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

/// One vendor-month-region submission as received.
///
/// No invariants are enforced here: fields may be absent, carry the wrong
/// unit, or hold out-of-range values. Immutable once handed to the
/// pipeline; retained for audit alongside its processing outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Ingestion identity, assigned when the record enters the system.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Free-form vendor name ("AWS", "amazon web services", ...)
    pub company: String,
    /// Reporting month, expected YYYY-MM but not guaranteed
    pub month: String,
    /// Free-form region string
    pub region: String,
    #[serde(default)]
    pub gpu_hours: RawValue,
    #[serde(default)]
    pub energy: RawValue,
    #[serde(default)]
    pub tokens: RawValue,
    #[serde(default)]
    pub api_calls: RawValue,
    #[serde(default)]
    pub pue: RawValue,
    #[serde(default)]
    pub utilization: RawValue,
}

impl RawRecord {
    /// Empty record for the given identity fields; numeric fields absent.
    pub fn new(company: impl Into<String>, month: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company: company.into(),
            month: month.into(),
            region: region.into(),
            gpu_hours: RawValue::Absent,
            energy: RawValue::Absent,
            tokens: RawValue::Absent,
            api_calls: RawValue::Absent,
            pue: RawValue::Absent,
            utilization: RawValue::Absent,
        }
    }
}

/// Canonical form of a raw record after the Plan→Execute→Validate loop.
///
/// Either every numeric field is present and within its declared bound, or
/// `degraded` is set and `unresolved_fields` names what could not be
/// resolved. Unresolved numerics are carried as 0 placeholders so the type
/// stays plain; the rollup aggregator never sums degraded events, so the
/// placeholders do not leak into metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub id: Uuid,
    /// Source record, for audit linkage
    pub raw_record_id: Uuid,
    /// Trimmed, synonym-canonicalized company key
    pub company: String,
    /// YYYY-MM
    pub month: String,
    /// Uppercase region code
    pub region: String,
    /// GPU hours, >= 0
    pub gpu_hours: f64,
    /// Energy in kWh, > 0 for non-degraded events
    pub energy_kwh: f64,
    pub tokens: u64,
    pub api_calls: u64,
    /// Power Usage Effectiveness, >= 1.0
    pub pue: f64,
    /// Percentage in [0, 100]
    pub utilization: f64,
    /// Data quality, 100 minus imputation penalties, floor 0
    pub quality_score: f64,
    /// Fields whose values were imputed rather than reported
    pub imputed_fields: BTreeSet<Field>,
    /// Identity fields that passed through verbatim without a synonym match
    pub low_confidence_fields: BTreeSet<Field>,
    /// Set when the record exhausted its retries; degraded events are
    /// excluded from ranking but surfaced in rollups
    pub degraded: bool,
    /// Fields that no remediation could resolve
    pub unresolved_fields: BTreeSet<Field>,
    /// Terminal validation violation, recorded for audit
    pub failure_reason: Option<String>,
    /// Grid carbon intensity applied for this region (g CO2 per kWh)
    pub grid_intensity_g_per_kwh: f64,
    /// Tonnes CO2-equivalent: energy_kwh × intensity / 1e6
    pub tco2e: f64,
    /// Grams CO2 per 1000 tokens; None when tokens is 0
    pub intensity_g_per_1k_tokens: Option<f64>,
    /// Grams CO2 per API call; None when api_calls is 0
    pub g_per_call: Option<f64>,
    /// Tokens per tonne CO2e; None when tco2e is 0
    pub efficiency_tokens_per_tco2e: Option<f64>,
}

/// Grouping key for monthly rollups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RollupKey {
    pub company: String,
    pub month: String,
    pub region: String,
}

/// Monthly aggregated metrics for one company/month/region.
///
/// Recomputed in full whenever constituent events change — never patched
/// incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyCompanyRollup {
    pub company: String,
    pub month: String,
    pub region: String,
    /// Constituent events, including degraded ones
    pub event_count: usize,
    /// Degraded constituents (flagged, not summed)
    pub degraded_event_count: usize,
    pub energy_kwh: f64,
    pub gpu_hours: f64,
    pub tokens: u64,
    pub api_calls: u64,
    /// Energy-weighted average PUE (simple average when total weight is 0)
    pub pue: f64,
    /// Energy-weighted average utilization
    pub utilization: f64,
    pub tco2e: f64,
    /// Minimum quality across ALL constituents: one bad input taints the
    /// aggregate
    pub quality_score: f64,
    pub intensity_g_per_1k_tokens: Option<f64>,
    pub g_per_call: Option<f64>,
    pub efficiency_tokens_per_tco2e: Option<f64>,
}

impl MonthlyCompanyRollup {
    /// Number of non-degraded constituents. Rollups without any are
    /// excluded from ranking cohorts.
    pub fn intact_event_count(&self) -> usize {
        self.event_count - self.degraded_event_count
    }
}

/// One row of a ranking, recomputed in full for every request.
///
/// Scores are relative to the request's cohort and are not stable across
/// cohort changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub company: String,
    /// Composite score in [0, 100], higher is greener
    pub green_score: f64,
    /// Dense 1-based rank; equal scores share a rank
    pub rank: u32,
    pub tco2e: f64,
    pub intensity_g_per_1k_tokens: Option<f64>,
    pub efficiency_tokens_per_tco2e: Option<f64>,
    pub utilization: f64,
    /// Minimum constituent quality carried up from the rollups
    pub quality_score: f64,
    /// 1 = lowest emissions in the cohort
    pub emissions_rank: u32,
    /// 1 = lowest g/1k-tokens in the cohort
    pub intensity_rank: u32,
    /// 1 = most tokens per tonne in the cohort
    pub efficiency_rank: u32,
    /// 1 = highest utilization in the cohort
    pub utilization_rank: u32,
}
