//! Plan→Execute→Validate loop and batch driver
//!
//! Each record runs through an explicit finite state machine:
//!
//! `Planning → Executing → Validating → {Accepted | Retrying → Planning |
//! Exhausted}`
//!
//! The transition function is pure, so the retry cap and escalation order
//! are testable independently of the loop roles. Records within a batch
//! are independent — no shared mutable plan state — and run as parallel
//! tokio tasks. A record that exhausts its retries degrades gracefully and
//! never aborts its siblings.

pub mod critic;
pub mod executor;
pub mod planner;

pub use critic::{Critic, CritiqueResult};
pub use executor::Executor;
pub use planner::Planner;

use crate::audit::{ProcessingLog, Stage};
use crate::ranking;
use crate::rollup;
use crate::types::{CandidateEvent, NormalizationPlan, PlanAction, Violation};
use greenrank_common::config::PipelineConfig;
use greenrank_common::records::{
    MonthlyCompanyRollup, NormalizedEvent, RankingEntry, RawRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// States of the per-record loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Planning,
    Executing,
    Validating,
    Retrying,
    Accepted,
    Exhausted,
}

/// Events that drive the loop from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    PlanReady,
    /// The Planner has no remediation left to try
    PlanSaturated,
    CandidateReady,
    Passed,
    Failed,
    RetryGranted,
}

/// Pure transition function for the per-record state machine.
///
/// `escalations` is the number of Planner escalations already applied;
/// a validation failure retries only while it is below `retry_cap`.
pub fn transition(
    state: LoopState,
    signal: LoopSignal,
    escalations: u32,
    retry_cap: u32,
) -> LoopState {
    match (state, signal) {
        (LoopState::Planning, LoopSignal::PlanReady) => LoopState::Executing,
        (LoopState::Planning, LoopSignal::PlanSaturated) => LoopState::Exhausted,
        (LoopState::Executing, LoopSignal::CandidateReady) => LoopState::Validating,
        (LoopState::Validating, LoopSignal::Passed) => LoopState::Accepted,
        (LoopState::Validating, LoopSignal::Failed) if escalations < retry_cap => {
            LoopState::Retrying
        }
        (LoopState::Validating, LoopSignal::Failed) => LoopState::Exhausted,
        (LoopState::Retrying, LoopSignal::RetryGranted) => LoopState::Planning,
        // Terminal and mismatched signals leave the state unchanged
        (state, _) => state,
    }
}

/// Outcome of one record's run, retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// The submission exactly as received
    pub raw: RawRecord,
    pub event: NormalizedEvent,
    pub accepted: bool,
    /// Planner escalations spent (0 = first plan passed)
    pub escalations: u32,
    pub log: ProcessingLog,
}

/// Everything a batch run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub outcomes: Vec<RecordOutcome>,
    pub rollups: Vec<MonthlyCompanyRollup>,
    pub rankings: Vec<RankingEntry>,
}

impl BatchOutcome {
    pub fn degraded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.event.degraded).count()
    }
}

/// The carbon ranker agent: owns the three loop roles and the injected
/// configuration.
#[derive(Debug, Clone)]
pub struct RankerAgent {
    config: Arc<PipelineConfig>,
    planner: Planner,
    executor: Executor,
    critic: Critic,
}

impl RankerAgent {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_shared(Arc::new(config))
    }

    pub fn with_shared(config: Arc<PipelineConfig>) -> Self {
        Self {
            planner: Planner::new(config.clone()),
            executor: Executor::new(config.clone()),
            critic: Critic::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one record through the bounded-retry loop.
    ///
    /// Always terminates: either Accepted, or Exhausted with a degraded
    /// event carrying quality 0 and the triggering violation.
    pub fn process_record(&self, record: &RawRecord) -> RecordOutcome {
        let retry_cap = self.config.retry_cap;
        let mut log = ProcessingLog::new();
        let mut state = LoopState::Planning;
        let mut plan = NormalizationPlan::default();
        let mut candidate = CandidateEvent::default();
        let mut violation: Option<Violation> = None;

        let accepted = loop {
            match state {
                LoopState::Planning => {
                    let signal = match &violation {
                        None => {
                            plan = self.planner.initial_plan(record);
                            log.record(Stage::Planner, "plan", describe_plan(&plan), 0);
                            LoopSignal::PlanReady
                        }
                        Some(v) => match self.planner.escalate(&plan, v) {
                            Some(next) => {
                                log.record(
                                    Stage::Planner,
                                    "escalate",
                                    format!("{} -> {}", v.code(), describe_plan(&next)),
                                    next.escalations,
                                );
                                plan = next;
                                LoopSignal::PlanReady
                            }
                            None => {
                                log.record(
                                    Stage::Planner,
                                    "escalate",
                                    format!("remediation ladder exhausted for {}", v.field()),
                                    plan.escalations,
                                );
                                LoopSignal::PlanSaturated
                            }
                        },
                    };
                    state = transition(state, signal, plan.escalations, retry_cap);
                }
                LoopState::Executing => {
                    candidate = self.executor.execute(record, &plan, &mut log);
                    state = transition(
                        state,
                        LoopSignal::CandidateReady,
                        plan.escalations,
                        retry_cap,
                    );
                }
                LoopState::Validating => {
                    let critique = self.critic.critique(&candidate);
                    for warning in &critique.warnings {
                        log.record(Stage::Critic, "warning", warning.clone(), plan.escalations);
                    }
                    let signal = match &critique.violation {
                        None => {
                            log.record(
                                Stage::Critic,
                                "accepted",
                                format!("quality {:.1}", candidate.quality_score()),
                                plan.escalations,
                            );
                            LoopSignal::Passed
                        }
                        Some(v) => {
                            log.record(
                                Stage::Critic,
                                "violation",
                                format!("{}: {}", v.code(), v),
                                plan.escalations,
                            );
                            LoopSignal::Failed
                        }
                    };
                    violation = critique.violation;
                    state = transition(state, signal, plan.escalations, retry_cap);
                }
                LoopState::Retrying => {
                    debug!(
                        company = %record.company,
                        escalations = plan.escalations,
                        "retrying with escalated plan"
                    );
                    state = transition(
                        state,
                        LoopSignal::RetryGranted,
                        plan.escalations,
                        retry_cap,
                    );
                }
                LoopState::Accepted => break true,
                LoopState::Exhausted => break false,
            }
        };

        if !accepted {
            let reason = violation
                .as_ref()
                .map(|v| v.code())
                .unwrap_or("unknown");
            log.record(
                Stage::Critic,
                "exhausted",
                format!("degraded after {} escalations: {}", plan.escalations, reason),
                plan.escalations,
            );
            warn!(
                company = %record.company,
                month = %record.month,
                reason,
                "record degraded after exhausting retries"
            );
        }

        let event = self
            .executor
            .finalize(record, &candidate, accepted, violation.as_ref());
        RecordOutcome {
            raw: record.clone(),
            event,
            accepted,
            escalations: plan.escalations,
            log,
        }
    }

    /// Process a batch: records in parallel, then rollups and ranking over
    /// the joined results.
    pub async fn process_batch(&self, records: Vec<RawRecord>) -> BatchOutcome {
        let total = records.len();
        info!("processing batch of {} records", total);

        let mut tasks = JoinSet::new();
        for (index, record) in records.into_iter().enumerate() {
            let agent = self.clone();
            tasks.spawn(async move { (index, agent.process_record(&record)) });
        }

        let mut slots: Vec<Option<RecordOutcome>> = Vec::new();
        slots.resize_with(total, || None);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!("record task failed: {}", e),
            }
        }
        let outcomes: Vec<RecordOutcome> = slots.into_iter().flatten().collect();

        self.summarize(outcomes)
    }

    /// Fold processed records into rollups and a ranking.
    ///
    /// Also the serial path: `process_batch` is equivalent to running
    /// `process_record` per record and summarizing.
    pub fn summarize(&self, outcomes: Vec<RecordOutcome>) -> BatchOutcome {
        let events: Vec<NormalizedEvent> = outcomes.iter().map(|o| o.event.clone()).collect();
        let rollups = rollup::aggregate(&events);
        let rankings = ranking::rank(&rollups, &self.config.ranking_weights);

        let degraded = outcomes.iter().filter(|o| o.event.degraded).count();
        info!(
            records = outcomes.len(),
            degraded,
            rollups = rollups.len(),
            ranked = rankings.len(),
            "batch complete"
        );

        BatchOutcome {
            outcomes,
            rollups,
            rankings,
        }
    }
}

fn action_name(action: PlanAction) -> &'static str {
    match action {
        PlanAction::ConvertUnit => "convert_unit",
        PlanAction::ParseFuzzyToken => "parse_fuzzy_token",
        PlanAction::ImputeFromCorrelate => "impute_from_correlate",
        PlanAction::ImputeDefault => "impute_default",
        PlanAction::MarkUnresolvable => "mark_unresolvable",
    }
}

fn describe_plan(plan: &NormalizationPlan) -> String {
    if plan.steps.is_empty() {
        return "no remediation needed".to_string();
    }
    plan.steps
        .iter()
        .map(|s| format!("{}:{}", s.field, action_name(s.action)))
        .collect::<Vec<_>>()
        .join(", ")
}
