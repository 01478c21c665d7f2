use std::collections::BTreeMap;
use tracing::{debug, error, info};

use crate::error::{MetricsError, Result};
use crate::grid::Period;
use crate::metrics::{FlowCounts, Metrics, ZoneCounts, flow_total};
use crate::privacy::decompose::{FlowGraph, decompose};

/// Builds a privacy-suppressed copy of `metrics` at privacy level `k`.
///
/// Trip volumes below `k` are dropped (k-anonymity). Each period's flow graph
/// is peeled at rising degree thresholds below `k` until a threshold removes
/// nothing (l-diversity); see [`decompose`]. Every other field is copied
/// unchanged.
///
/// The suppressed counters are weighted: they add up the removed counts, on
/// top of whatever the input had already recorded, so suppressing an already
/// suppressed summary at the same `k` returns it unchanged.
///
/// # Errors
///
/// Returns [`MetricsError::InvalidPrivacyLevel`] when `k` is zero and
/// [`MetricsError::InconsistentDecomposition`] when peeling leaves the
/// outbound and inbound graphs disagreeing about the surviving edges.
#[tracing::instrument(skip(metrics), fields(periods = metrics.flows.len()))]
pub fn suppress(metrics: &Metrics, k: u32) -> Result<Metrics> {
    if k == 0 {
        return Err(MetricsError::InvalidPrivacyLevel(k));
    }

    let (trip_volumes, volume_removed) = suppress_volumes(&metrics.trip_volumes, k);

    let mut flows = BTreeMap::new();
    let mut original_flow_total = 0;
    let mut surviving_flow_total = 0;
    for (&period, period_flows) in &metrics.flows {
        original_flow_total += flow_total(period_flows);
        let kept = suppress_period_flows(period, period_flows, k)?;
        surviving_flow_total += flow_total(&kept);
        if !kept.is_empty() {
            flows.insert(period, kept);
        }
    }
    let flows_removed = original_flow_total - surviving_flow_total;

    info!(
        privacy_level = k,
        volume_removed,
        flows_removed,
        original_flow_total,
        "Suppression complete"
    );

    Ok(Metrics {
        privacy_level: k,
        trip_volumes,
        flows,
        trip_volume_suppressed: metrics.trip_volume_suppressed + volume_removed,
        flows_suppressed: metrics.flows_suppressed + flows_removed,
        ..metrics.clone()
    })
}

/// Keeps only zone volumes of at least `k`; returns them with the removed total.
pub fn suppress_volumes(
    volumes: &BTreeMap<Period, ZoneCounts>,
    k: u32,
) -> (BTreeMap<Period, ZoneCounts>, u64) {
    let threshold = u64::from(k);
    let mut removed = 0;
    let mut kept = BTreeMap::new();

    for (&period, zones) in volumes {
        let mut kept_zones = ZoneCounts::new();
        for (&zone, &count) in zones {
            if count >= threshold {
                kept_zones.insert(zone, count);
            } else {
                removed += count;
            }
        }
        if !kept_zones.is_empty() {
            kept.insert(period, kept_zones);
        }
    }
    (kept, removed)
}

/// Peels one period's flow graph and copies the surviving pairs' counts.
fn suppress_period_flows(period: Period, flows: &FlowCounts, k: u32) -> Result<FlowCounts> {
    let decomposition = decompose(FlowGraph::from_flows(flows), k as usize);

    let outbound = decomposition.graph.outbound_edges();
    let inbound = decomposition.graph.inbound_edges();
    let mismatched: Vec<_> = outbound.symmetric_difference(&inbound).copied().collect();
    if !mismatched.is_empty() {
        error!(period, mismatched = mismatched.len(), "Outbound and inbound flow graphs diverged");
        return Err(MetricsError::InconsistentDecomposition { period, mismatched });
    }

    debug!(
        period,
        surviving_edges = outbound.len(),
        deepest_level = ?decomposition.deepest_level(),
        "Flow graph peeled"
    );

    let mut kept = FlowCounts::new();
    for (pickup, dropoff) in outbound {
        if let Some(&count) = flows.get(&pickup).and_then(|d| d.get(&dropoff)) {
            kept.entry(pickup).or_default().insert(dropoff, count);
        }
    }
    Ok(kept)
}
