//! Green Score Ranker
//!
//! Computes composite efficiency scores over a cohort of rollups and
//! produces a deterministic ordered ranking. Scoring is relative: each
//! sub-metric is min-max normalized within the request's cohort, so scores
//! are not comparable across cohort changes.
//!
//! Sub-metrics and weights (configurable, must sum to 1.0):
//! - emissions (tCO2e, lower better) — default 0.4
//! - intensity (g CO2 per 1k tokens, lower better) — default 0.4
//! - utilization (higher better) — default 0.2
//!
//! Cohorts where every member shares a sub-metric value score 100 on that
//! sub-metric. An undefined intensity (no tokens) scores 0 — worst — unless
//! the whole cohort is undefined. Ties break by higher utilization, then
//! company name ascending; ranks are dense and 1-based.

use crate::metrics;
use greenrank_common::config::RankingWeights;
use greenrank_common::records::{MonthlyCompanyRollup, RankingEntry};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct CompanyAggregate {
    tco2e: f64,
    tokens: u64,
    energy_kwh: f64,
    utilization_weighted: f64,
    utilization_sum: f64,
    rollup_count: usize,
    quality_min: f64,
}

impl CompanyAggregate {
    fn new() -> Self {
        Self {
            tco2e: 0.0,
            tokens: 0,
            energy_kwh: 0.0,
            utilization_weighted: 0.0,
            utilization_sum: 0.0,
            rollup_count: 0,
            quality_min: 100.0,
        }
    }
}

#[derive(Debug)]
struct ScoredCompany {
    company: String,
    tco2e: f64,
    intensity: Option<f64>,
    efficiency: Option<f64>,
    utilization: f64,
    quality: f64,
}

/// Min-max score where lower raw values are better.
fn score_lower_better(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        100.0
    } else {
        (max - value) / (max - min) * 100.0
    }
}

/// Min-max score where higher raw values are better.
fn score_higher_better(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        100.0
    } else {
        (value - min) / (max - min) * 100.0
    }
}

/// Rank a cohort of rollups.
///
/// The caller chooses the cohort (typically one month's rollups); rollups
/// for the same company are merged additively with energy-weighted
/// utilization. Rollups without any intact constituent are excluded —
/// degraded data never ranks.
pub fn rank(rollups: &[MonthlyCompanyRollup], weights: &RankingWeights) -> Vec<RankingEntry> {
    let mut companies: BTreeMap<String, CompanyAggregate> = BTreeMap::new();
    for rollup in rollups.iter().filter(|r| r.intact_event_count() > 0) {
        let agg = companies
            .entry(rollup.company.clone())
            .or_insert_with(CompanyAggregate::new);
        agg.tco2e += rollup.tco2e;
        agg.tokens += rollup.tokens;
        agg.energy_kwh += rollup.energy_kwh;
        agg.utilization_weighted += rollup.utilization * rollup.energy_kwh;
        agg.utilization_sum += rollup.utilization;
        agg.rollup_count += 1;
        agg.quality_min = agg.quality_min.min(rollup.quality_score);
    }
    if companies.is_empty() {
        return Vec::new();
    }

    let scored: Vec<ScoredCompany> = companies
        .into_iter()
        .map(|(company, agg)| {
            let utilization = if agg.energy_kwh > 0.0 {
                agg.utilization_weighted / agg.energy_kwh
            } else {
                agg.utilization_sum / agg.rollup_count as f64
            };
            ScoredCompany {
                company,
                tco2e: agg.tco2e,
                intensity: metrics::intensity_g_per_1k_tokens(agg.tco2e, agg.tokens),
                efficiency: metrics::efficiency_tokens_per_tco2e(agg.tokens, agg.tco2e),
                utilization,
                quality: agg.quality_min,
            }
        })
        .collect();

    let tco2e_min = scored.iter().map(|s| s.tco2e).fold(f64::INFINITY, f64::min);
    let tco2e_max = scored
        .iter()
        .map(|s| s.tco2e)
        .fold(f64::NEG_INFINITY, f64::max);
    let util_min = scored
        .iter()
        .map(|s| s.utilization)
        .fold(f64::INFINITY, f64::min);
    let util_max = scored
        .iter()
        .map(|s| s.utilization)
        .fold(f64::NEG_INFINITY, f64::max);
    let defined_intensities: Vec<f64> = scored.iter().filter_map(|s| s.intensity).collect();
    let intensity_min = defined_intensities
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let intensity_max = defined_intensities
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let mut entries: Vec<RankingEntry> = scored
        .iter()
        .map(|s| {
            let emissions_score = score_lower_better(s.tco2e, tco2e_min, tco2e_max);
            let intensity_score = match s.intensity {
                Some(i) => score_lower_better(i, intensity_min, intensity_max),
                // Undefined intensity ranks worst, unless nobody defines one
                None if defined_intensities.is_empty() => 100.0,
                None => 0.0,
            };
            let utilization_score = score_higher_better(s.utilization, util_min, util_max);
            let green_score = (weights.emissions * emissions_score
                + weights.intensity * intensity_score
                + weights.utilization * utilization_score)
                .clamp(0.0, 100.0);

            debug!(
                company = %s.company,
                emissions_score,
                intensity_score,
                utilization_score,
                green_score,
                "scored company"
            );

            RankingEntry {
                company: s.company.clone(),
                green_score,
                rank: 0, // assigned after sorting
                tco2e: s.tco2e,
                intensity_g_per_1k_tokens: s.intensity,
                efficiency_tokens_per_tco2e: s.efficiency,
                utilization: s.utilization,
                quality_score: s.quality,
                emissions_rank: count_rank(scored.iter().map(|o| o.tco2e), s.tco2e, false),
                intensity_rank: option_rank(
                    scored.iter().map(|o| o.intensity),
                    s.intensity,
                    false,
                ),
                efficiency_rank: option_rank(
                    scored.iter().map(|o| o.efficiency),
                    s.efficiency,
                    true,
                ),
                utilization_rank: count_rank(
                    scored.iter().map(|o| o.utilization),
                    s.utilization,
                    true,
                ),
            }
        })
        .collect();

    // Total, deterministic order: score desc, utilization desc, name asc
    entries.sort_by(|a, b| {
        b.green_score
            .total_cmp(&a.green_score)
            .then(b.utilization.total_cmp(&a.utilization))
            .then(a.company.cmp(&b.company))
    });

    // Dense 1-based ranks: equal scores share a rank
    let mut rank = 0;
    let mut last_score = f64::NAN;
    for entry in &mut entries {
        if entry.green_score != last_score {
            rank += 1;
            last_score = entry.green_score;
        }
        entry.rank = rank;
    }

    entries
}

/// 1-based position by counting strictly-better cohort members.
fn count_rank(values: impl Iterator<Item = f64>, mine: f64, higher_better: bool) -> u32 {
    let better = values
        .filter(|v| if higher_better { *v > mine } else { *v < mine })
        .count();
    better as u32 + 1
}

/// As `count_rank`, with undefined values ranking after every defined one.
fn option_rank(
    values: impl Iterator<Item = Option<f64>>,
    mine: Option<f64>,
    higher_better: bool,
) -> u32 {
    match mine {
        Some(m) => count_rank(values.flatten(), m, higher_better),
        None => values.flatten().count() as u32 + 1,
    }
}
