//! Core types for the Plan→Execute→Validate loop
//!
//! Defines the shapes the three loop roles exchange:
//! - **Planner:** field defect classification and `NormalizationPlan`
//! - **Executor:** `CandidateEvent` (normalized values before validation)
//! - **Critic/Validator:** `Violation` reason codes

use greenrank_common::records::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Numeric fields in deterministic processing/validation order.
pub const NUMERIC_FIELDS: [Field; 6] = [
    Field::GpuHours,
    Field::Pue,
    Field::EnergyKwh,
    Field::Utilization,
    Field::Tokens,
    Field::ApiCalls,
];

/// Planner's classification of one raw field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// Parseable as-is
    Ok,
    /// Carries a unit or suffix that needs conversion (MWh, "%", "hrs")
    NeedsUnitFix,
    /// Fuzzy magnitude notation ("12.2B", "5M")
    NeedsFuzzyParse,
    /// Absent, unparseable, or defective (treated as absent downstream)
    Missing,
}

/// One remediation action the Executor can apply to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    ConvertUnit,
    ParseFuzzyToken,
    ImputeFromCorrelate,
    ImputeDefault,
    MarkUnresolvable,
}

/// One `(field, action)` pair of a normalization plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub field: Field,
    pub action: PlanAction,
}

/// Ordered remediation plan for a single record's pipeline run.
///
/// Owned exclusively by that run and discarded when the run terminates. At
/// most one step per field; escalation replaces the step with the next
/// rung of the field's remediation ladder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationPlan {
    pub steps: Vec<PlanStep>,
    /// Escalations applied so far (0 = the conservative first plan)
    pub escalations: u32,
}

impl NormalizationPlan {
    /// Current action for a field, if the plan has one.
    pub fn action_for(&self, field: Field) -> Option<PlanAction> {
        self.steps
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.action)
    }

    /// Set the action for a field, replacing any existing step.
    pub fn set_action(&mut self, field: Field, action: PlanAction) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.field == field) {
            step.action = action;
        } else {
            self.steps.push(PlanStep { field, action });
        }
    }
}

/// Validator failure, in machine-readable form.
///
/// The Critic keys its escalation choice off the violation, never
/// replaying an identical plan.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Violation {
    #[error("energy must be positive, got {energy_kwh} kWh")]
    NonPositiveEnergy { energy_kwh: f64 },

    #[error("PUE must be >= 1.0, got {pue}")]
    InvalidPue { pue: f64 },

    #[error("utilization must be in [0, 100], got {utilization}%")]
    UtilizationOutOfRange { utilization: f64 },

    #[error("required field {field} unresolved")]
    UnresolvedRequiredField { field: Field },
}

impl Violation {
    /// Stable reason code for audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Violation::NonPositiveEnergy { .. } => "non_positive_energy",
            Violation::InvalidPue { .. } => "invalid_pue",
            Violation::UtilizationOutOfRange { .. } => "utilization_out_of_range",
            Violation::UnresolvedRequiredField { .. } => "unresolved_required_field",
        }
    }

    /// The field the remediation ladder should target.
    pub fn field(&self) -> Field {
        match self {
            Violation::NonPositiveEnergy { .. } => Field::EnergyKwh,
            Violation::InvalidPue { .. } => Field::Pue,
            Violation::UtilizationOutOfRange { .. } => Field::Utilization,
            Violation::UnresolvedRequiredField { field } => *field,
        }
    }
}

/// Normalizer failure: the raw token cannot be interpreted at all.
///
/// Recovered locally by leaving the field missing and letting the
/// imputation/validation path deal with it; never surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unparseable {field} value: {raw:?}")]
pub struct UnparseableValue {
    pub field: Field,
    pub raw: String,
}

/// Executor output for one attempt: normalized values before validation.
///
/// `None` means the field is absent after normalization and imputation.
/// The Critic validates this shape; only accepted or exhausted candidates
/// become `NormalizedEvent`s.
#[derive(Debug, Clone, Default)]
pub struct CandidateEvent {
    pub company: String,
    /// None when the month string could not be mechanically repaired
    pub month: Option<String>,
    pub region: String,
    pub gpu_hours: Option<f64>,
    pub energy_kwh: Option<f64>,
    pub tokens: Option<u64>,
    pub api_calls: Option<u64>,
    pub pue: Option<f64>,
    pub utilization: Option<f64>,
    /// Accumulated imputation penalty (quality = 100 - penalty, floor 0)
    pub penalty: f64,
    pub imputed_fields: BTreeSet<Field>,
    pub low_confidence_fields: BTreeSet<Field>,
    /// Fields explicitly marked unresolvable by the plan
    pub unresolved_fields: BTreeSet<Field>,
}

impl CandidateEvent {
    pub fn quality_score(&self) -> f64 {
        (100.0 - self.penalty).clamp(0.0, 100.0)
    }
}
