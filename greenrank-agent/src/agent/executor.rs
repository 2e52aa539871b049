//! Executor: applies a normalization plan and computes carbon metrics
//!
//! Runs the unit/token normalizer and the imputation rules a plan calls
//! for, producing a candidate event for the Critic. Parse failures never
//! abort a record — the field is left absent and the validation path
//! decides what happens next. Reported values are only replaced when they
//! are absent or fail their own range check; imputation never overrides a
//! valid reported value.

use super::planner::raw_value;
use crate::audit::{ProcessingLog, Stage};
use crate::metrics;
use crate::normalize::{imputation, synonyms, units};
use crate::types::{CandidateEvent, NormalizationPlan, PlanAction, Violation, NUMERIC_FIELDS};
use crate::validate;
use greenrank_common::config::PipelineConfig;
use greenrank_common::records::{Field, NormalizedEvent, RawRecord, RawValue};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Executor {
    config: Arc<PipelineConfig>,
}

impl Executor {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// Apply the plan to the raw record, producing a candidate event.
    pub fn execute(
        &self,
        record: &RawRecord,
        plan: &NormalizationPlan,
        log: &mut ProcessingLog,
    ) -> CandidateEvent {
        let attempt = plan.escalations;
        let mut candidate = CandidateEvent::default();

        let (company, company_known) = synonyms::canonical_company(&record.company);
        if !company_known && !company.is_empty() {
            candidate.low_confidence_fields.insert(Field::Company);
        }
        candidate.company = company;

        let (region, region_known) = synonyms::canonical_region(&record.region);
        if !region_known && !region.is_empty() {
            candidate.low_confidence_fields.insert(Field::Region);
        }
        candidate.region = region;

        candidate.month = units::repair_month(&record.month);
        if candidate.month.is_none() {
            if plan.action_for(Field::Month) == Some(PlanAction::MarkUnresolvable) {
                candidate.unresolved_fields.insert(Field::Month);
            }
            log.record(
                Stage::Executor,
                "month_unparsed",
                format!("month {:?} is not YYYY-MM", record.month),
                attempt,
            );
        }

        for field in NUMERIC_FIELDS {
            self.resolve_field(field, record, plan, &mut candidate, log);
        }

        debug!(
            company = %candidate.company,
            attempt,
            quality = candidate.quality_score(),
            "candidate event ready"
        );
        candidate
    }

    fn resolve_field(
        &self,
        field: Field,
        record: &RawRecord,
        plan: &NormalizationPlan,
        candidate: &mut CandidateEvent,
        log: &mut ProcessingLog,
    ) {
        let attempt = plan.escalations;
        let raw = raw_value(record, field);
        let parsed = self.parse_field(field, raw, log, attempt);
        let in_range = parsed.map(|v| field_in_range(field, v)).unwrap_or(false);

        let value = match plan.action_for(field) {
            Some(PlanAction::ImputeDefault) if !in_range => {
                match imputation::default_value(field, &self.config) {
                    Some(default) => {
                        let penalty = self.config.imputation_penalties.penalty_for(field);
                        candidate.penalty += penalty;
                        candidate.imputed_fields.insert(field);
                        log.record(
                            Stage::Executor,
                            "impute_default",
                            format!("{} <- {} (penalty -{})", field, default, penalty),
                            attempt,
                        );
                        Some(default)
                    }
                    None => {
                        log.record(
                            Stage::Executor,
                            "impute_default",
                            format!("no default configured for {}", field),
                            attempt,
                        );
                        None
                    }
                }
            }
            Some(PlanAction::ImputeFromCorrelate) if !in_range => {
                if field == Field::EnergyKwh {
                    match imputation::correlate_energy_kwh(
                        candidate.gpu_hours,
                        candidate.pue,
                        &self.config,
                    ) {
                        Some(energy) => {
                            let penalty = self.config.imputation_penalties.penalty_for(field);
                            candidate.penalty += penalty;
                            candidate.imputed_fields.insert(field);
                            log.record(
                                Stage::Executor,
                                "impute_from_correlate",
                                format!(
                                    "energy_kwh <- {:.2} from gpu_hours x {} W x PUE (penalty -{})",
                                    energy, self.config.assumed_watts_per_gpu_hour, penalty
                                ),
                                attempt,
                            );
                            Some(energy)
                        }
                        None => {
                            log.record(
                                Stage::Executor,
                                "impute_from_correlate",
                                "cannot derive energy_kwh: gpu_hours unavailable".to_string(),
                                attempt,
                            );
                            None
                        }
                    }
                } else {
                    log.record(
                        Stage::Executor,
                        "impute_from_correlate",
                        format!("no correlate rule for {}", field),
                        attempt,
                    );
                    None
                }
            }
            Some(PlanAction::MarkUnresolvable) if !in_range => {
                candidate.unresolved_fields.insert(field);
                log.record(
                    Stage::Executor,
                    "mark_unresolvable",
                    format!("{} left absent", field),
                    attempt,
                );
                None
            }
            // ConvertUnit/ParseFuzzyToken are handled by the parsers; a
            // present value (even an invalid one) is kept for the
            // Validator so the failure reason stays specific.
            _ => parsed,
        };

        set_field(candidate, field, value);
    }

    /// Parse one raw field. Total: failures leave the field absent.
    fn parse_field(
        &self,
        field: Field,
        raw: &RawValue,
        log: &mut ProcessingLog,
        attempt: u32,
    ) -> Option<f64> {
        if raw.is_absent() {
            return None;
        }
        let result = match field {
            Field::GpuHours => units::parse_gpu_hours(raw).map(|g| {
                // Negative hours cannot be a measurement; treat as absent
                if g >= 0.0 {
                    Some(g)
                } else {
                    None
                }
            }),
            Field::Pue => units::parse_pue(raw).map(Some),
            Field::EnergyKwh => units::parse_energy_kwh(raw).map(Some),
            Field::Utilization => units::parse_percent(raw).map(|p| {
                if p.fraction_defect {
                    log.record(
                        Stage::Executor,
                        "fraction_defect",
                        format!(
                            "utilization {} looks like a fraction of 1; flagged for imputation",
                            p.value
                        ),
                        attempt,
                    );
                    None
                } else {
                    Some(p.value)
                }
            }),
            Field::Tokens | Field::ApiCalls => {
                units::parse_count(raw, field).map(|n| Some(n as f64))
            }
            Field::Company | Field::Month | Field::Region => Ok(None),
        };

        match result {
            Ok(value) => value,
            Err(err) => {
                log.record(
                    Stage::Executor,
                    "unparseable_value",
                    err.to_string(),
                    attempt,
                );
                None
            }
        }
    }

    /// Build the final normalized event from the loop's last candidate.
    ///
    /// An exhausted record keeps its unresolved fields listed and carries 0
    /// placeholders for them; its quality score is forced to 0 and all
    /// derived metrics are undefined.
    pub fn finalize(
        &self,
        record: &RawRecord,
        candidate: &CandidateEvent,
        accepted: bool,
        failure: Option<&Violation>,
    ) -> NormalizedEvent {
        let degraded = !accepted;
        let grid = self.config.intensity_for_region(&candidate.region);

        let mut unresolved = candidate.unresolved_fields.clone();
        if degraded {
            if candidate.month.is_none() {
                unresolved.insert(Field::Month);
            }
            for field in NUMERIC_FIELDS {
                if field_value(candidate, field).is_none() {
                    unresolved.insert(field);
                }
            }
        }

        let energy_kwh = candidate.energy_kwh.unwrap_or(0.0);
        let tokens = candidate.tokens.unwrap_or(0);
        let api_calls = candidate.api_calls.unwrap_or(0);
        let tco2e = if degraded {
            0.0
        } else {
            metrics::tco2e(energy_kwh, grid)
        };

        NormalizedEvent {
            id: Uuid::new_v4(),
            raw_record_id: record.id,
            company: candidate.company.clone(),
            month: candidate
                .month
                .clone()
                .unwrap_or_else(|| record.month.trim().to_string()),
            region: candidate.region.clone(),
            gpu_hours: candidate.gpu_hours.unwrap_or(0.0),
            energy_kwh,
            tokens,
            api_calls,
            pue: candidate.pue.unwrap_or(0.0),
            utilization: candidate.utilization.unwrap_or(0.0),
            quality_score: if degraded {
                0.0
            } else {
                candidate.quality_score()
            },
            imputed_fields: candidate.imputed_fields.clone(),
            low_confidence_fields: candidate.low_confidence_fields.clone(),
            degraded,
            unresolved_fields: unresolved,
            failure_reason: failure.map(|v| v.code().to_string()),
            grid_intensity_g_per_kwh: grid,
            tco2e,
            intensity_g_per_1k_tokens: if degraded {
                None
            } else {
                metrics::intensity_g_per_1k_tokens(tco2e, tokens)
            },
            g_per_call: if degraded {
                None
            } else {
                metrics::g_per_call(tco2e, api_calls)
            },
            efficiency_tokens_per_tco2e: if degraded {
                None
            } else {
                metrics::efficiency_tokens_per_tco2e(tokens, tco2e)
            },
        }
    }
}

fn field_in_range(field: Field, value: f64) -> bool {
    match field {
        Field::EnergyKwh => validate::energy_in_range(value),
        Field::Pue => validate::pue_in_range(value),
        Field::Utilization => validate::utilization_in_range(value),
        Field::GpuHours | Field::Tokens | Field::ApiCalls => value >= 0.0,
        Field::Company | Field::Month | Field::Region => true,
    }
}

fn set_field(candidate: &mut CandidateEvent, field: Field, value: Option<f64>) {
    match field {
        Field::GpuHours => candidate.gpu_hours = value,
        Field::Pue => candidate.pue = value,
        Field::EnergyKwh => candidate.energy_kwh = value,
        Field::Utilization => candidate.utilization = value,
        Field::Tokens => candidate.tokens = value.map(|v| v.round() as u64),
        Field::ApiCalls => candidate.api_calls = value.map(|v| v.round() as u64),
        Field::Company | Field::Month | Field::Region => {}
    }
}

fn field_value(candidate: &CandidateEvent, field: Field) -> Option<f64> {
    match field {
        Field::GpuHours => candidate.gpu_hours,
        Field::Pue => candidate.pue,
        Field::EnergyKwh => candidate.energy_kwh,
        Field::Utilization => candidate.utilization,
        Field::Tokens => candidate.tokens.map(|t| t as f64),
        Field::ApiCalls => candidate.api_calls.map(|c| c as f64),
        Field::Company | Field::Month | Field::Region => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::planner::Planner;

    fn setup() -> (Planner, Executor) {
        let config = Arc::new(PipelineConfig::default());
        (Planner::new(config.clone()), Executor::new(config))
    }

    fn clean_record() -> RawRecord {
        let mut r = RawRecord::new("Google", "2024-01", "US-CA");
        r.gpu_hours = RawValue::Number(1000.0);
        r.energy = RawValue::Number(1120.0);
        r.tokens = RawValue::Number(50_000_000.0);
        r.api_calls = RawValue::Number(100_000.0);
        r.pue = RawValue::Number(1.12);
        r.utilization = RawValue::Number(90.0);
        r
    }

    #[test]
    fn test_clean_record_full_quality() {
        let (planner, executor) = setup();
        let record = clean_record();
        let plan = planner.initial_plan(&record);
        let mut log = ProcessingLog::new();

        let candidate = executor.execute(&record, &plan, &mut log);
        assert_eq!(candidate.quality_score(), 100.0);
        assert!(candidate.imputed_fields.is_empty());
        assert_eq!(candidate.energy_kwh, Some(1120.0));
        assert_eq!(candidate.tokens, Some(50_000_000));
        assert_eq!(candidate.company, "Google");
        // US-CA is not in the synonym table: verbatim, low confidence
        assert_eq!(candidate.region, "US-CA");
        assert!(candidate.low_confidence_fields.contains(&Field::Region));
    }

    #[test]
    fn test_unit_fixes_applied() {
        let (planner, executor) = setup();
        let mut record = clean_record();
        record.energy = "1.2 MWh".into();
        record.tokens = "12.2B".into();
        record.utilization = "85%".into();
        let plan = planner.initial_plan(&record);
        let mut log = ProcessingLog::new();

        let candidate = executor.execute(&record, &plan, &mut log);
        assert_eq!(candidate.energy_kwh, Some(1200.0));
        assert_eq!(candidate.tokens, Some(12_200_000_000));
        assert_eq!(candidate.utilization, Some(85.0));
        // Unit conversion is not imputation: quality untouched
        assert_eq!(candidate.quality_score(), 100.0);
    }

    #[test]
    fn test_missing_energy_imputed_from_correlate() {
        let (planner, executor) = setup();
        let mut record = clean_record();
        record.energy = RawValue::Absent;
        let plan = planner.initial_plan(&record);
        let mut log = ProcessingLog::new();

        let candidate = executor.execute(&record, &plan, &mut log);
        // 1000 h × 400 W / 1000 × 1.12 PUE
        let energy = candidate.energy_kwh.unwrap();
        assert!((energy - 448.0).abs() < 1e-9);
        assert!(candidate.imputed_fields.contains(&Field::EnergyKwh));
        assert_eq!(candidate.quality_score(), 85.0);
    }

    #[test]
    fn test_imputation_never_overrides_valid_value() {
        let (_, executor) = setup();
        let record = clean_record();
        // Plan demands a default, but the reported PUE is valid
        let mut plan = NormalizationPlan::default();
        plan.set_action(Field::Pue, PlanAction::ImputeDefault);
        let mut log = ProcessingLog::new();

        let candidate = executor.execute(&record, &plan, &mut log);
        assert_eq!(candidate.pue, Some(1.12));
        assert!(candidate.imputed_fields.is_empty());
    }

    #[test]
    fn test_invalid_pue_replaced_by_default_when_planned() {
        let (_, executor) = setup();
        let mut record = clean_record();
        record.pue = RawValue::Number(0.9);
        let mut plan = NormalizationPlan::default();
        plan.set_action(Field::Pue, PlanAction::ImputeDefault);
        let mut log = ProcessingLog::new();

        let candidate = executor.execute(&record, &plan, &mut log);
        assert_eq!(candidate.pue, Some(1.2));
        assert!(candidate.imputed_fields.contains(&Field::Pue));
    }

    #[test]
    fn test_invalid_value_kept_without_plan_action() {
        let (planner, executor) = setup();
        let mut record = clean_record();
        record.utilization = RawValue::Number(145.0);
        let plan = planner.initial_plan(&record);
        let mut log = ProcessingLog::new();

        // The Validator, not the Executor, owns the out-of-range verdict
        let candidate = executor.execute(&record, &plan, &mut log);
        assert_eq!(candidate.utilization, Some(145.0));
    }

    #[test]
    fn test_finalize_clean_event_metrics() {
        let (planner, executor) = setup();
        let record = clean_record();
        let plan = planner.initial_plan(&record);
        let mut log = ProcessingLog::new();
        let candidate = executor.execute(&record, &plan, &mut log);

        let event = executor.finalize(&record, &candidate, true, None);
        assert!(!event.degraded);
        assert_eq!(event.quality_score, 100.0);
        // US-CA falls back to the market-average intensity (400 g/kWh)
        assert_eq!(event.grid_intensity_g_per_kwh, 400.0);
        assert!((event.tco2e - 0.448).abs() < 1e-12);
        let g = event.intensity_g_per_1k_tokens.unwrap();
        assert!((g - 8.96).abs() < 1e-9);
        assert_eq!(event.raw_record_id, record.id);
    }

    #[test]
    fn test_finalize_degraded_zeroes_quality_and_metrics() {
        let (planner, executor) = setup();
        let mut record = clean_record();
        record.utilization = RawValue::Absent;
        let plan = planner.initial_plan(&record);
        let mut log = ProcessingLog::new();
        let candidate = executor.execute(&record, &plan, &mut log);

        let violation = Violation::UnresolvedRequiredField {
            field: Field::Utilization,
        };
        let event = executor.finalize(&record, &candidate, false, Some(&violation));
        assert!(event.degraded);
        assert_eq!(event.quality_score, 0.0);
        assert_eq!(event.tco2e, 0.0);
        assert_eq!(event.intensity_g_per_1k_tokens, None);
        assert!(event.unresolved_fields.contains(&Field::Utilization));
        assert_eq!(
            event.failure_reason.as_deref(),
            Some("unresolved_required_field")
        );
    }
}
