//! Processing log: the audit trail of loop decisions
//!
//! Every Planner/Executor/Critic step appends an entry. The log travels
//! with the record outcome so a ranking can always be traced back to the
//! plans, imputations, and violations that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which loop role produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planner,
    Executor,
    Critic,
}

/// One processing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub at: DateTime<Utc>,
    pub stage: Stage,
    pub action: String,
    pub details: String,
    /// Escalation count at the time of the entry (0 = first attempt)
    pub attempt: u32,
}

/// Append-only audit log for one record's pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub entries: Vec<ProcessingLogEntry>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        stage: Stage,
        action: impl Into<String>,
        details: impl Into<String>,
        attempt: u32,
    ) {
        self.entries.push(ProcessingLogEntry {
            at: Utc::now(),
            stage,
            action: action.into(),
            details: details.into(),
            attempt,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
