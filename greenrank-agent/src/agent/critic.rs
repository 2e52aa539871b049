//! Critic: validates executor output and judges retry worthiness
//!
//! Runs the Validator over each candidate and surfaces anomaly warnings
//! for the audit log. Retries are keyed strictly to Validator reason
//! codes; warnings (low quality, suspicious PUE, hot grid) never trigger
//! a retry by themselves.

use crate::types::{CandidateEvent, Violation};
use crate::validate;
use greenrank_common::config::PipelineConfig;
use std::sync::Arc;

/// Quality score below this is flagged for review.
pub const QUALITY_WARN_THRESHOLD: f64 = 70.0;
/// A PUE above this is unusual for production fleets.
const HIGH_PUE_THRESHOLD: f64 = 2.0;
/// Sustained utilization above this is suspicious for a monthly average.
const HIGH_UTILIZATION_THRESHOLD: f64 = 95.0;
/// Grid intensity above this marks a notably carbon-heavy region.
const HIGH_GRID_INTENSITY_THRESHOLD: f64 = 800.0;

/// Critic verdict for one candidate.
#[derive(Debug, Clone)]
pub struct CritiqueResult {
    /// First validation violation, if any; drives the retry escalation
    pub violation: Option<Violation>,
    /// Non-blocking anomalies, recorded for audit
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Critic {
    config: Arc<PipelineConfig>,
}

impl Critic {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    pub fn critique(&self, candidate: &CandidateEvent) -> CritiqueResult {
        let violation = validate::first_violation(candidate);
        let mut warnings = Vec::new();

        let quality = candidate.quality_score();
        if quality < QUALITY_WARN_THRESHOLD {
            warnings.push(format!(
                "quality score {:.1} below threshold {:.0}",
                quality, QUALITY_WARN_THRESHOLD
            ));
        }
        if let Some(pue) = candidate.pue {
            if pue > HIGH_PUE_THRESHOLD {
                warnings.push(format!("unusually high PUE {}", pue));
            }
        }
        if let Some(utilization) = candidate.utilization {
            if utilization > HIGH_UTILIZATION_THRESHOLD
                && validate::utilization_in_range(utilization)
            {
                warnings.push(format!("unusually high utilization {}%", utilization));
            }
        }
        let grid = self.config.intensity_for_region(&candidate.region);
        if grid > HIGH_GRID_INTENSITY_THRESHOLD {
            warnings.push(format!(
                "high grid carbon intensity for {}: {} g/kWh",
                candidate.region, grid
            ));
        }

        CritiqueResult {
            violation,
            warnings,
        }
    }
}
