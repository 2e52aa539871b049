//! End-to-end pipeline tests
//!
//! Drives whole batches through RankerAgent::process_batch and checks the
//! pipeline's observable contracts: quality scoring, imputation, bounded
//! retries with graceful degradation, rollup aggregation, and ranking
//! determinism.

use greenrank_agent::{demo, RankerAgent};
use greenrank_common::config::PipelineConfig;
use greenrank_common::records::{Field, RawRecord, RawValue};

fn agent() -> RankerAgent {
    RankerAgent::new(PipelineConfig::default())
}

fn clean_record(company: &str, month: &str, energy_kwh: f64, tokens: f64) -> RawRecord {
    let mut r = RawRecord::new(company, month, "US-EAST");
    r.gpu_hours = RawValue::Number(1000.0);
    r.energy = RawValue::Number(energy_kwh);
    r.tokens = RawValue::Number(tokens);
    r.api_calls = RawValue::Number(100_000.0);
    r.pue = RawValue::Number(1.12);
    r.utilization = RawValue::Number(80.0);
    r
}

#[tokio::test]
async fn test_clean_batch_accepted_at_full_quality() {
    let records = vec![
        clean_record("Google", "2024-01", 1120.0, 50_000_000.0),
        clean_record("aws", "2024-01", 2000.0, 60_000_000.0),
    ];
    let outcome = agent().process_batch(records).await;

    assert_eq!(outcome.outcomes.len(), 2);
    assert_eq!(outcome.degraded_count(), 0);
    for o in &outcome.outcomes {
        assert!(o.accepted);
        assert_eq!(o.event.quality_score, 100.0);
        assert!(o.event.utilization >= 0.0 && o.event.utilization <= 100.0);
    }
    // Synonym canonicalization applied
    assert_eq!(outcome.outcomes[1].event.company, "Amazon Web Services");
    assert_eq!(outcome.rankings.len(), 2);
}

#[tokio::test]
async fn test_messy_record_normalized_in_batch() {
    let mut messy = RawRecord::new("amazon", "2024/1", "us east");
    messy.gpu_hours = RawValue::Text("650 hrs".into());
    messy.energy = RawValue::Text("1.2 MWh".into());
    messy.tokens = RawValue::Text("12.2B".into());
    messy.api_calls = RawValue::Text("8,500 calls".into());
    messy.pue = RawValue::Text("1.15".into());
    messy.utilization = RawValue::Text("88%".into());

    let outcome = agent().process_batch(vec![messy]).await;
    let event = &outcome.outcomes[0].event;

    assert!(outcome.outcomes[0].accepted);
    assert_eq!(event.company, "Amazon Web Services");
    assert_eq!(event.month, "2024-01");
    assert_eq!(event.region, "US-EAST");
    assert_eq!(event.energy_kwh, 1200.0);
    assert_eq!(event.tokens, 12_200_000_000);
    assert_eq!(event.api_calls, 8_500);
    assert_eq!(event.utilization, 88.0);
    // Conversions are not imputations
    assert_eq!(event.quality_score, 100.0);
}

#[tokio::test]
async fn test_degraded_record_never_aborts_siblings() {
    let mut hopeless = RawRecord::new("BrokenCo", "2024-01", "US-EAST");
    hopeless.gpu_hours = RawValue::Number(100.0);
    hopeless.energy = RawValue::Number(500.0);
    hopeless.tokens = RawValue::Number(1_000_000.0);
    hopeless.api_calls = RawValue::Number(1_000.0);
    hopeless.pue = RawValue::Number(1.2);
    // No utilization and no configured default: unresolvable
    hopeless.utilization = RawValue::Absent;

    let records = vec![
        clean_record("Google", "2024-01", 1120.0, 50_000_000.0),
        hopeless,
        clean_record("Microsoft", "2024-01", 900.0, 40_000_000.0),
    ];
    let outcome = agent().process_batch(records).await;

    assert_eq!(outcome.outcomes.len(), 3, "no record silently dropped");
    assert_eq!(outcome.degraded_count(), 1);

    let broken = outcome
        .outcomes
        .iter()
        .find(|o| o.raw.company == "BrokenCo")
        .unwrap();
    assert!(!broken.accepted);
    assert!(broken.event.degraded);
    assert_eq!(broken.event.quality_score, 0.0);
    assert_eq!(broken.escalations, 3);
    assert!(broken
        .event
        .unresolved_fields
        .contains(&Field::Utilization));

    // Degraded events are flagged in rollups but excluded from ranking
    let broken_rollup = outcome
        .rollups
        .iter()
        .find(|r| r.company == "BrokenCo")
        .unwrap();
    assert_eq!(broken_rollup.degraded_event_count, 1);
    assert_eq!(broken_rollup.quality_score, 0.0);
    assert!(!outcome.rankings.iter().any(|e| e.company == "BrokenCo"));
    assert_eq!(outcome.rankings.len(), 2);
}

#[tokio::test]
async fn test_two_company_ranking_scenario() {
    // Same intensity (tokens proportional to emissions) and utilization;
    // only total emissions differ
    let records = vec![
        clean_record("LowCarbon", "2024-01", 1000.0, 1_000_000.0),
        clean_record("HighCarbon", "2024-01", 10_000.0, 10_000_000.0),
    ];
    let outcome = agent().process_batch(records).await;

    assert_eq!(outcome.rankings[0].company, "LowCarbon");
    assert_eq!(outcome.rankings[0].rank, 1);
    assert_eq!(outcome.rankings[1].company, "HighCarbon");
    assert_eq!(outcome.rankings[1].rank, 2);
    assert!(outcome.rankings[0].green_score > outcome.rankings[1].green_score);
}

#[tokio::test]
async fn test_parallel_batch_matches_serial_processing() {
    let records = demo::sample_batch(11, 6);

    let agent = agent();
    let parallel = agent.process_batch(records.clone()).await;
    let serial_outcomes: Vec<_> = records.iter().map(|r| agent.process_record(r)).collect();
    let serial = agent.summarize(serial_outcomes);

    assert_eq!(parallel.outcomes.len(), serial.outcomes.len());
    for (p, s) in parallel.outcomes.iter().zip(serial.outcomes.iter()) {
        assert_eq!(p.raw.id, s.raw.id, "input order preserved");
        assert_eq!(p.accepted, s.accepted);
        assert_eq!(p.escalations, s.escalations);
        assert_eq!(p.event.company, s.event.company);
        assert_eq!(p.event.quality_score, s.event.quality_score);
        assert_eq!(p.event.energy_kwh, s.event.energy_kwh);
        assert_eq!(p.event.tco2e, s.event.tco2e);
    }
    assert_eq!(parallel.rollups.len(), serial.rollups.len());
    for (p, s) in parallel.rankings.iter().zip(serial.rankings.iter()) {
        assert_eq!(p.company, s.company);
        assert_eq!(p.green_score, s.green_score);
        assert_eq!(p.rank, s.rank);
    }
}

#[tokio::test]
async fn test_demo_batch_terminates_within_retry_cap() {
    let records = demo::sample_batch(42, 10);
    let total = records.len();
    let outcome = agent().process_batch(records).await;

    assert_eq!(outcome.outcomes.len(), total);
    for o in &outcome.outcomes {
        assert!(o.escalations <= 3, "retry cap exceeded");
        if !o.event.degraded {
            assert!(o.event.quality_score >= 0.0 && o.event.quality_score <= 100.0);
            assert!(o.event.utilization >= 0.0 && o.event.utilization <= 100.0);
            assert!(o.event.energy_kwh > 0.0);
            assert!(o.event.pue >= 1.0);
        } else {
            assert_eq!(o.event.quality_score, 0.0);
            assert!(o.event.failure_reason.is_some());
        }
    }
}

#[tokio::test]
async fn test_rollup_groups_by_company_month_region() {
    let records = vec![
        clean_record("Google", "2024-01", 1000.0, 1_000_000.0),
        clean_record("Google", "2024-01", 2000.0, 2_000_000.0),
        clean_record("Google", "2024-02", 1500.0, 1_500_000.0),
    ];
    let outcome = agent().process_batch(records).await;

    assert_eq!(outcome.rollups.len(), 2);
    let january = outcome
        .rollups
        .iter()
        .find(|r| r.month == "2024-01")
        .unwrap();
    assert_eq!(january.event_count, 2);
    assert_eq!(january.energy_kwh, 3000.0);
    assert_eq!(january.tokens, 3_000_000);

    // One ranking entry per company across its rollups
    assert_eq!(outcome.rankings.len(), 1);
    assert_eq!(outcome.rankings[0].company, "Google");
}

#[tokio::test]
async fn test_configured_default_utilization_rescues_missing_field() {
    let mut config = PipelineConfig::default();
    config.default_utilization = Some(60.0);
    let agent = RankerAgent::new(config);

    let mut record = clean_record("Google", "2024-01", 1120.0, 50_000_000.0);
    record.utilization = RawValue::Absent;

    let outcome = agent.process_batch(vec![record]).await;
    let o = &outcome.outcomes[0];
    assert!(o.accepted);
    assert_eq!(o.event.utilization, 60.0);
    assert_eq!(o.event.quality_score, 95.0);
    assert!(o.event.imputed_fields.contains(&Field::Utilization));
}

#[tokio::test]
async fn test_audit_log_traces_every_stage() {
    let mut record = clean_record("Google", "2024-01", 1120.0, 50_000_000.0);
    record.energy = RawValue::Absent;

    let outcome = agent().process_batch(vec![record]).await;
    let log = &outcome.outcomes[0].log;

    use greenrank_agent::audit::Stage;
    assert!(log.entries.iter().any(|e| e.stage == Stage::Planner));
    assert!(log.entries.iter().any(|e| e.stage == Stage::Executor));
    assert!(log.entries.iter().any(|e| e.stage == Stage::Critic));
    assert!(log
        .entries
        .iter()
        .any(|e| e.action == "impute_from_correlate"));
}
