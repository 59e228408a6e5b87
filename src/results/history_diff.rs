use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::history::History;
use crate::model::Time;

use super::diff::function_status;
use super::Status;

/// Aggregates of one entity over a history comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetrics {
    /// Ticks on which the entity was not nominal.
    pub degraded_ticks: usize,
    /// Largest number of simultaneously active fault modes (always 0 for flows).
    pub max_faults: usize,
    /// Deviation from nominal integrated over time (rectangle rule).
    pub integrated_deviation: f64,
}

/// Tick-by-tick comparison of a faulty history against the nominal one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryDiff {
    /// Shared time axis of both histories.
    pub times: Vec<Time>,
    /// Status of each tracked flow, one entry per tick.
    pub flow_status: BTreeMap<String, Vec<Status>>,
    /// Status of each tracked function, one entry per tick.
    pub function_status: BTreeMap<String, Vec<Status>>,
    /// Aggregates per tracked flow.
    pub flow_metrics: BTreeMap<String, EntityMetrics>,
    /// Aggregates per tracked function.
    pub function_metrics: BTreeMap<String, EntityMetrics>,
    /// Largest number of fault modes active across all tracked functions on
    /// any single tick.
    pub max_concurrent_faults: usize,
}

impl HistoryDiff {
    /// Status of a flow or function at position `idx` of the axis.
    pub fn status_at(&self, entity: &str, idx: usize) -> Option<Status> {
        self.flow_status
            .get(entity)
            .or_else(|| self.function_status.get(entity))
            .and_then(|s| s.get(idx).copied())
    }

    /// First tick on which anything left the nominal status.
    pub fn first_deviation(&self) -> Option<Time> {
        (0..self.times.len())
            .find(|&i| {
                self.flow_status
                    .values()
                    .chain(self.function_status.values())
                    .any(|s| !s[i].is_nominal())
            })
            .map(|i| self.times[i])
    }

    /// Whether every tracked entity stayed nominal throughout.
    pub fn is_nominal(&self) -> bool {
        self.first_deviation().is_none()
    }
}

/// Width of each tick's interval: the gap to the next tick, the last tick
/// reusing the gap before it.
fn intervals(times: &[Time]) -> Vec<f64> {
    let mut dt: Vec<f64> = times.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    dt.push(dt.last().copied().unwrap_or(1.0));
    dt
}

/// Compares `faulty` against `nominal` at every recorded tick.
///
/// Statuses follow [`super::diff`]. For every tracked entity the comparison
/// also yields the number of non-nominal ticks, the peak number of active
/// fault modes and the time-integrated deviation of its values.
///
/// # Errors
///
/// `HistoryMismatch` if the histories have different time axes or track
/// different entities.
pub fn diff_history(faulty: &History, nominal: &History) -> Result<HistoryDiff, ValidationError> {
    if faulty.times() != nominal.times() {
        return Err(ValidationError::HistoryMismatch {
            reason: format!(
                "time axes differ ({} vs {} ticks)",
                faulty.len(),
                nominal.len()
            ),
        });
    }
    if !faulty.same_tracking(nominal) {
        return Err(ValidationError::HistoryMismatch {
            reason: "histories track different entities".to_string(),
        });
    }

    let dt = intervals(faulty.times());
    let mut out = HistoryDiff {
        times: faulty.times().to_vec(),
        ..HistoryDiff::default()
    };

    for (name, series) in faulty.flows() {
        let base = nominal.flow(name).unwrap_or_default();
        let mut statuses = Vec::with_capacity(series.len());
        let mut metrics = EntityMetrics::default();
        for (i, (record, reference)) in series.iter().zip(base).enumerate() {
            let deviation = record.deviation(reference);
            let status = if record.changed_fields(reference).next().is_some() {
                metrics.degraded_ticks += 1;
                Status::Degraded
            } else {
                Status::Nominal
            };
            metrics.integrated_deviation += deviation * dt[i];
            statuses.push(status);
        }
        out.flow_status.insert(name.to_string(), statuses);
        out.flow_metrics.insert(name.to_string(), metrics);
    }

    let mut concurrent = vec![0usize; out.times.len()];
    for (name, series) in faulty.functions() {
        let base = nominal.function(name).unwrap_or_default();
        let mut statuses = Vec::with_capacity(series.len());
        let mut metrics = EntityMetrics::default();
        for (i, (snap, reference)) in series.iter().zip(base).enumerate() {
            let status = function_status(snap, Some(reference));
            if !status.is_nominal() {
                metrics.degraded_ticks += 1;
            }
            metrics.max_faults = metrics.max_faults.max(snap.faults.len());
            metrics.integrated_deviation += snap.state.deviation(&reference.state) * dt[i];
            concurrent[i] += snap.faults.len();
            statuses.push(status);
        }
        out.function_status.insert(name.to_string(), statuses);
        out.function_metrics.insert(name.to_string(), metrics);
    }
    out.max_concurrent_faults = concurrent.into_iter().max().unwrap_or(0);

    Ok(out)
}
