//! Rollup Aggregator: monthly per-company fold
//!
//! Deterministic fold of normalized events into `(company, month, region)`
//! rollups. Additive fields are summed, PUE and utilization are averaged
//! weighted by energy (simple average when the total weight is 0), and the
//! rollup quality score is the MINIMUM across constituents — one bad input
//! taints the aggregate, so a procurement team is never shown inflated
//! confidence.
//!
//! Degraded events are counted and drag the quality minimum down, but
//! their placeholder numerics are never summed. Rollups are recomputed in
//! full from their constituent events, never patched incrementally.

use crate::metrics;
use greenrank_common::records::{MonthlyCompanyRollup, NormalizedEvent, RollupKey};
use std::collections::BTreeMap;

/// Fold events into one rollup per `(company, month, region)` key.
///
/// Output order is deterministic (key order). The fold owns every key for
/// the duration of the aggregation, which is the per-key exclusive-write
/// discipline concurrent ingestion requires.
pub fn aggregate(events: &[NormalizedEvent]) -> Vec<MonthlyCompanyRollup> {
    let mut groups: BTreeMap<RollupKey, Vec<&NormalizedEvent>> = BTreeMap::new();
    for event in events {
        let key = RollupKey {
            company: event.company.clone(),
            month: event.month.clone(),
            region: event.region.clone(),
        };
        groups.entry(key).or_default().push(event);
    }

    groups
        .into_iter()
        .map(|(key, group)| fold_group(key, &group))
        .collect()
}

fn fold_group(key: RollupKey, group: &[&NormalizedEvent]) -> MonthlyCompanyRollup {
    let intact: Vec<&&NormalizedEvent> = group.iter().filter(|e| !e.degraded).collect();

    let energy_kwh: f64 = intact.iter().map(|e| e.energy_kwh).sum();
    let gpu_hours: f64 = intact.iter().map(|e| e.gpu_hours).sum();
    let tokens: u64 = intact.iter().map(|e| e.tokens).sum();
    let api_calls: u64 = intact.iter().map(|e| e.api_calls).sum();
    let tco2e: f64 = intact.iter().map(|e| e.tco2e).sum();

    let (pue, utilization) = if energy_kwh > 0.0 {
        (
            intact.iter().map(|e| e.pue * e.energy_kwh).sum::<f64>() / energy_kwh,
            intact.iter().map(|e| e.utilization * e.energy_kwh).sum::<f64>() / energy_kwh,
        )
    } else if !intact.is_empty() {
        // Zero total weight: fall back to a simple average
        let n = intact.len() as f64;
        (
            intact.iter().map(|e| e.pue).sum::<f64>() / n,
            intact.iter().map(|e| e.utilization).sum::<f64>() / n,
        )
    } else {
        (0.0, 0.0)
    };

    let quality_score = group
        .iter()
        .map(|e| e.quality_score)
        .fold(f64::INFINITY, f64::min)
        .min(100.0);

    MonthlyCompanyRollup {
        company: key.company,
        month: key.month,
        region: key.region,
        event_count: group.len(),
        degraded_event_count: group.len() - intact.len(),
        energy_kwh,
        gpu_hours,
        tokens,
        api_calls,
        pue,
        utilization,
        tco2e,
        quality_score,
        intensity_g_per_1k_tokens: metrics::intensity_g_per_1k_tokens(tco2e, tokens),
        g_per_call: metrics::g_per_call(tco2e, api_calls),
        efficiency_tokens_per_tco2e: metrics::efficiency_tokens_per_tco2e(tokens, tco2e),
    }
}
