//! Validator: pure predicate over a candidate event
//!
//! Checks the candidate against the domain invariants and returns the
//! FIRST violation found, in a fixed field-priority order: energy, PUE,
//! utilization, then required-field completeness. The deterministic order
//! and machine-readable reason codes are what the Critic keys its
//! escalation choice off — it never retries an identical plan.

use crate::types::{CandidateEvent, Violation, NUMERIC_FIELDS};
use greenrank_common::records::Field;

/// Energy must be strictly positive.
pub fn energy_in_range(energy_kwh: f64) -> bool {
    energy_kwh > 0.0
}

/// PUE is total-facility over IT energy; by definition >= 1.0.
pub fn pue_in_range(pue: f64) -> bool {
    pue >= 1.0
}

/// Utilization is a percentage.
pub fn utilization_in_range(utilization: f64) -> bool {
    (0.0..=100.0).contains(&utilization)
}

fn field_present(candidate: &CandidateEvent, field: Field) -> bool {
    match field {
        Field::GpuHours => candidate.gpu_hours.is_some(),
        Field::Pue => candidate.pue.is_some(),
        Field::EnergyKwh => candidate.energy_kwh.is_some(),
        Field::Utilization => candidate.utilization.is_some(),
        Field::Tokens => candidate.tokens.is_some(),
        Field::ApiCalls => candidate.api_calls.is_some(),
        Field::Month => candidate.month.is_some(),
        Field::Company | Field::Region => true,
    }
}

/// First violation in deterministic priority order, or None if the
/// candidate satisfies every invariant.
pub fn first_violation(candidate: &CandidateEvent) -> Option<Violation> {
    if let Some(energy_kwh) = candidate.energy_kwh {
        if !energy_in_range(energy_kwh) {
            return Some(Violation::NonPositiveEnergy { energy_kwh });
        }
    }
    if let Some(pue) = candidate.pue {
        if !pue_in_range(pue) {
            return Some(Violation::InvalidPue { pue });
        }
    }
    if let Some(utilization) = candidate.utilization {
        if !utilization_in_range(utilization) {
            return Some(Violation::UtilizationOutOfRange { utilization });
        }
    }
    if !field_present(candidate, Field::Month) {
        return Some(Violation::UnresolvedRequiredField { field: Field::Month });
    }
    for field in NUMERIC_FIELDS {
        if !field_present(candidate, field) {
            return Some(Violation::UnresolvedRequiredField { field });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_candidate() -> CandidateEvent {
        CandidateEvent {
            company: "Google".to_string(),
            month: Some("2024-01".to_string()),
            region: "US-EAST".to_string(),
            gpu_hours: Some(1000.0),
            energy_kwh: Some(1120.0),
            tokens: Some(50_000_000),
            api_calls: Some(100_000),
            pue: Some(1.12),
            utilization: Some(90.0),
            ..CandidateEvent::default()
        }
    }

    #[test]
    fn test_complete_candidate_passes() {
        assert_eq!(first_violation(&complete_candidate()), None);
    }

    #[test]
    fn test_energy_checked_before_pue() {
        let mut c = complete_candidate();
        c.energy_kwh = Some(-10.0);
        c.pue = Some(0.5);
        assert!(matches!(
            first_violation(&c),
            Some(Violation::NonPositiveEnergy { .. })
        ));
    }

    #[test]
    fn test_pue_checked_before_utilization() {
        let mut c = complete_candidate();
        c.pue = Some(0.9);
        c.utilization = Some(150.0);
        assert!(matches!(first_violation(&c), Some(Violation::InvalidPue { pue }) if pue == 0.9));
    }

    #[test]
    fn test_utilization_out_of_range() {
        let mut c = complete_candidate();
        c.utilization = Some(145.0);
        assert!(matches!(
            first_violation(&c),
            Some(Violation::UtilizationOutOfRange { utilization }) if utilization == 145.0
        ));
    }

    #[test]
    fn test_absent_field_reported_as_unresolved() {
        let mut c = complete_candidate();
        c.utilization = None;
        assert_eq!(
            first_violation(&c),
            Some(Violation::UnresolvedRequiredField {
                field: Field::Utilization
            })
        );
    }

    #[test]
    fn test_unparseable_month_is_unresolved() {
        let mut c = complete_candidate();
        c.month = None;
        assert_eq!(
            first_violation(&c),
            Some(Violation::UnresolvedRequiredField { field: Field::Month })
        );
    }

    #[test]
    fn test_boundary_values_pass() {
        let mut c = complete_candidate();
        c.utilization = Some(0.0);
        c.pue = Some(1.0);
        assert_eq!(first_violation(&c), None);
        c.utilization = Some(100.0);
        assert_eq!(first_violation(&c), None);
    }
}
