//! Planner: defect detection and remediation planning
//!
//! Classifies each raw field, emits the most conservative plan first
//! (convert units, fuzzy-parse, impute only what computation requires),
//! and on validation failure escalates EXACTLY ONE remediation step chosen
//! by the violation's reason code.
//!
//! # Escalation ladders
//! Per violating field, rungs are tried in order and never repeated:
//! - energy: impute-from-correlate → impute-default → mark-unresolvable
//! - all other fields: impute-default → impute-from-correlate →
//!   mark-unresolvable
//!
//! A saturated ladder returns None and the loop terminates Exhausted, so
//! every record makes progress or stops within the retry cap.

use crate::normalize::units;
use crate::types::{FieldStatus, NormalizationPlan, PlanAction, Violation, NUMERIC_FIELDS};
use greenrank_common::config::PipelineConfig;
use greenrank_common::records::{Field, RawRecord, RawValue};
use std::sync::Arc;

/// Remediation ladder for a field.
fn ladder(field: Field) -> [PlanAction; 3] {
    match field {
        Field::EnergyKwh => [
            PlanAction::ImputeFromCorrelate,
            PlanAction::ImputeDefault,
            PlanAction::MarkUnresolvable,
        ],
        _ => [
            PlanAction::ImputeDefault,
            PlanAction::ImputeFromCorrelate,
            PlanAction::MarkUnresolvable,
        ],
    }
}

#[derive(Debug, Clone)]
pub struct Planner {
    config: Arc<PipelineConfig>,
}

impl Planner {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// Classify every pipeline-relevant raw field, in deterministic order.
    pub fn classify(&self, record: &RawRecord) -> Vec<(Field, FieldStatus)> {
        let mut out = Vec::with_capacity(NUMERIC_FIELDS.len() + 1);
        let month_status = if units::repair_month(&record.month).is_some() {
            FieldStatus::Ok
        } else {
            FieldStatus::Missing
        };
        out.push((Field::Month, month_status));
        for field in NUMERIC_FIELDS {
            out.push((field, classify_field(field, raw_value(record, field))));
        }
        out
    }

    /// Most conservative plan: convert what needs converting, impute only
    /// what is required for computation.
    pub fn initial_plan(&self, record: &RawRecord) -> NormalizationPlan {
        let mut plan = NormalizationPlan::default();
        for (field, status) in self.classify(record) {
            match status {
                FieldStatus::Ok => {}
                FieldStatus::NeedsUnitFix => plan.set_action(field, PlanAction::ConvertUnit),
                FieldStatus::NeedsFuzzyParse => {
                    plan.set_action(field, PlanAction::ParseFuzzyToken)
                }
                FieldStatus::Missing => {
                    let action = match field {
                        Field::EnergyKwh => Some(PlanAction::ImputeFromCorrelate),
                        Field::Utilization => self
                            .config
                            .default_utilization
                            .map(|_| PlanAction::ImputeDefault),
                        Field::GpuHours | Field::Pue | Field::Tokens | Field::ApiCalls => {
                            Some(PlanAction::ImputeDefault)
                        }
                        Field::Month | Field::Company | Field::Region => None,
                    };
                    if let Some(action) = action {
                        plan.set_action(field, action);
                    }
                }
            }
        }
        plan
    }

    /// Escalate one remediation step for the violating field.
    ///
    /// Returns None when the field's ladder is saturated — the loop has
    /// nothing left to try and must terminate.
    pub fn escalate(
        &self,
        plan: &NormalizationPlan,
        violation: &Violation,
    ) -> Option<NormalizationPlan> {
        let field = violation.field();
        let rungs = ladder(field);
        let next_index = match plan.action_for(field) {
            // Conversion steps are not remediations; the ladder starts fresh
            Some(current) => match rungs.iter().position(|r| *r == current) {
                Some(i) => i + 1,
                None => 0,
            },
            None => 0,
        };
        let action = *rungs.get(next_index)?;
        let mut next = plan.clone();
        next.set_action(field, action);
        next.escalations = plan.escalations + 1;
        Some(next)
    }
}

pub(crate) fn raw_value(record: &RawRecord, field: Field) -> &RawValue {
    match field {
        Field::GpuHours => &record.gpu_hours,
        Field::EnergyKwh => &record.energy,
        Field::Tokens => &record.tokens,
        Field::ApiCalls => &record.api_calls,
        Field::Pue => &record.pue,
        Field::Utilization => &record.utilization,
        Field::Company | Field::Month | Field::Region => &RawValue::Absent,
    }
}

fn classify_field(field: Field, raw: &RawValue) -> FieldStatus {
    match raw {
        RawValue::Absent => FieldStatus::Missing,
        RawValue::Number(n) => match field {
            // A fraction where a percentage belongs is a defect, not a value
            Field::Utilization if *n > 0.0 && *n < 1.0 => FieldStatus::Missing,
            _ => FieldStatus::Ok,
        },
        RawValue::Text(s) => classify_text(field, s),
    }
}

fn classify_text(field: Field, s: &str) -> FieldStatus {
    let plain = s.trim().replace(',', "").parse::<f64>().is_ok();
    match field {
        Field::EnergyKwh => {
            if plain {
                FieldStatus::Ok
            } else if units::parse_energy_text(s).is_some() {
                FieldStatus::NeedsUnitFix
            } else {
                FieldStatus::Missing
            }
        }
        Field::Tokens | Field::ApiCalls => {
            if plain {
                FieldStatus::Ok
            } else if units::parse_count_text(s).is_some() {
                FieldStatus::NeedsFuzzyParse
            } else {
                FieldStatus::Missing
            }
        }
        Field::GpuHours => {
            if plain {
                FieldStatus::Ok
            } else if units::parse_gpu_hours_text(s).is_some() {
                FieldStatus::NeedsUnitFix
            } else {
                FieldStatus::Missing
            }
        }
        Field::Pue => {
            if plain {
                FieldStatus::Ok
            } else {
                FieldStatus::Missing
            }
        }
        Field::Utilization => match units::parse_percent_text(s) {
            Some(v) if v > 0.0 && v < 1.0 => FieldStatus::Missing,
            Some(_) if plain => FieldStatus::Ok,
            Some(_) => FieldStatus::NeedsUnitFix,
            None => FieldStatus::Missing,
        },
        Field::Company | Field::Month | Field::Region => FieldStatus::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenrank_common::records::RawRecord;

    fn planner() -> Planner {
        Planner::new(Arc::new(PipelineConfig::default()))
    }

    fn clean_record() -> RawRecord {
        let mut r = RawRecord::new("Google", "2024-01", "US-EAST");
        r.gpu_hours = RawValue::Number(1000.0);
        r.energy = RawValue::Number(1120.0);
        r.tokens = RawValue::Number(50_000_000.0);
        r.api_calls = RawValue::Number(100_000.0);
        r.pue = RawValue::Number(1.12);
        r.utilization = RawValue::Number(90.0);
        r
    }

    #[test]
    fn test_clean_record_gets_empty_plan() {
        let plan = planner().initial_plan(&clean_record());
        assert!(plan.steps.is_empty());
        assert_eq!(plan.escalations, 0);
    }

    #[test]
    fn test_unit_defects_classified() {
        let mut r = clean_record();
        r.energy = "1.2 MWh".into();
        r.tokens = "12.2B".into();
        r.utilization = "90%".into();
        r.gpu_hours = "650 hrs".into();

        let statuses: std::collections::BTreeMap<_, _> =
            planner().classify(&r).into_iter().collect();
        assert_eq!(statuses[&Field::EnergyKwh], FieldStatus::NeedsUnitFix);
        assert_eq!(statuses[&Field::Tokens], FieldStatus::NeedsFuzzyParse);
        assert_eq!(statuses[&Field::Utilization], FieldStatus::NeedsUnitFix);
        assert_eq!(statuses[&Field::GpuHours], FieldStatus::NeedsUnitFix);
    }

    #[test]
    fn test_missing_energy_planned_from_correlate() {
        let mut r = clean_record();
        r.energy = RawValue::Absent;
        let plan = planner().initial_plan(&r);
        assert_eq!(
            plan.action_for(Field::EnergyKwh),
            Some(PlanAction::ImputeFromCorrelate)
        );
    }

    #[test]
    fn test_missing_utilization_not_planned_without_default() {
        let mut r = clean_record();
        r.utilization = RawValue::Absent;
        let plan = planner().initial_plan(&r);
        assert_eq!(plan.action_for(Field::Utilization), None);
    }

    #[test]
    fn test_missing_utilization_planned_with_default() {
        let mut config = PipelineConfig::default();
        config.default_utilization = Some(50.0);
        let planner = Planner::new(Arc::new(config));

        let mut r = clean_record();
        r.utilization = RawValue::Absent;
        let plan = planner.initial_plan(&r);
        assert_eq!(
            plan.action_for(Field::Utilization),
            Some(PlanAction::ImputeDefault)
        );
    }

    #[test]
    fn test_fraction_utilization_classified_missing() {
        let mut r = clean_record();
        r.utilization = RawValue::Number(0.9);
        let statuses: std::collections::BTreeMap<_, _> =
            planner().classify(&r).into_iter().collect();
        assert_eq!(statuses[&Field::Utilization], FieldStatus::Missing);
    }

    #[test]
    fn test_escalation_walks_ladder_once() {
        let planner = planner();
        let plan = NormalizationPlan::default();
        let violation = Violation::UnresolvedRequiredField {
            field: Field::Utilization,
        };

        let esc1 = planner.escalate(&plan, &violation).unwrap();
        assert_eq!(
            esc1.action_for(Field::Utilization),
            Some(PlanAction::ImputeDefault)
        );
        assert_eq!(esc1.escalations, 1);

        let esc2 = planner.escalate(&esc1, &violation).unwrap();
        assert_eq!(
            esc2.action_for(Field::Utilization),
            Some(PlanAction::ImputeFromCorrelate)
        );

        let esc3 = planner.escalate(&esc2, &violation).unwrap();
        assert_eq!(
            esc3.action_for(Field::Utilization),
            Some(PlanAction::MarkUnresolvable)
        );
        assert_eq!(esc3.escalations, 3);

        // Ladder saturated: nothing left to try
        assert!(planner.escalate(&esc3, &violation).is_none());
    }

    #[test]
    fn test_energy_ladder_prefers_correlate() {
        let planner = planner();
        let plan = NormalizationPlan::default();
        let violation = Violation::NonPositiveEnergy { energy_kwh: 0.0 };

        let esc1 = planner.escalate(&plan, &violation).unwrap();
        assert_eq!(
            esc1.action_for(Field::EnergyKwh),
            Some(PlanAction::ImputeFromCorrelate)
        );
    }

    #[test]
    fn test_escalation_restarts_after_conversion_step() {
        let planner = planner();
        let mut plan = NormalizationPlan::default();
        plan.set_action(Field::Utilization, PlanAction::ConvertUnit);
        let violation = Violation::UtilizationOutOfRange { utilization: 145.0 };

        let esc = planner.escalate(&plan, &violation).unwrap();
        assert_eq!(
            esc.action_for(Field::Utilization),
            Some(PlanAction::ImputeDefault)
        );
    }
}
