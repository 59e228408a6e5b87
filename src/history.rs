//! Per-tick record of tracked flows and functions over a run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{FunctionSnapshot, Model, Time};
use crate::record::Record;

/// Which entities a run records into its [`History`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSpec {
    /// Record only the time axis.
    #[default]
    None,
    /// Record every flow and every function.
    All,
    /// Record the named flows and functions.
    Only {
        /// Flow names.
        flows: BTreeSet<String>,
        /// Function names.
        functions: BTreeSet<String>,
    },
}

impl TrackSpec {
    /// Tracks the given flows and functions.
    pub fn only<F, G>(flows: F, functions: G) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        Self::Only {
            flows: flows.into_iter().map(Into::into).collect(),
            functions: functions.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolves the selection to flow and function names, checking that each
    /// exists in `model`.
    fn resolve(&self, model: &Model) -> Result<(Vec<String>, Vec<String>), ValidationError> {
        match self {
            Self::None => Ok((Vec::new(), Vec::new())),
            Self::All => Ok((
                model.flows().iter().map(|f| f.name().to_string()).collect(),
                model.functions().iter().map(|f| f.name().to_string()).collect(),
            )),
            Self::Only { flows, functions } => {
                for name in flows {
                    if model.flow_id(name).is_none() {
                        return Err(ValidationError::UnknownFlow { name: name.clone() });
                    }
                }
                for name in functions {
                    if model.function_id(name).is_none() {
                        return Err(ValidationError::UnknownFunction { name: name.clone() });
                    }
                }
                Ok((flows.iter().cloned().collect(), functions.iter().cloned().collect()))
            }
        }
    }
}

/// Time-indexed values of the tracked flows and functions.
///
/// Entry `i` of every series belongs to `times()[i]`. Append-only while the
/// run is in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    times: Vec<Time>,
    flows: BTreeMap<String, Vec<Record>>,
    functions: BTreeMap<String, Vec<FunctionSnapshot>>,
}

impl History {
    /// Creates an empty history tracking what `track` selects in `model`.
    ///
    /// # Errors
    ///
    /// `UnknownFlow` or `UnknownFunction` for names not in the model.
    pub fn new(model: &Model, track: &TrackSpec) -> Result<Self, ValidationError> {
        let (flows, functions) = track.resolve(model)?;
        Ok(Self {
            times: Vec::new(),
            flows: flows.into_iter().map(|name| (name, Vec::new())).collect(),
            functions: functions.into_iter().map(|name| (name, Vec::new())).collect(),
        })
    }

    /// Appends the model's current values as tick `time`.
    pub(crate) fn record(&mut self, time: Time, model: &Model) {
        self.times.push(time);
        for (name, series) in &mut self.flows {
            if let Some(flow) = model.flow_by_name(name) {
                series.push(flow.status().clone());
            }
        }
        for (name, series) in &mut self.functions {
            if let Some(function) = model.function_by_name(name) {
                series.push(FunctionSnapshot {
                    state: function.current_state().clone(),
                    faults: function.active_faults().clone(),
                });
            }
        }
    }

    /// The time axis.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Number of recorded ticks.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Position of `time` on the history's axis.
    pub fn index_of(&self, time: Time) -> Option<usize> {
        self.times.binary_search(&time).ok()
    }

    /// Names of the tracked flows, sorted.
    pub fn tracked_flows(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    /// Names of the tracked functions, sorted.
    pub fn tracked_functions(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Attribute records of one flow, one per tick.
    pub fn flow(&self, name: &str) -> Option<&[Record]> {
        self.flows.get(name).map(Vec::as_slice)
    }

    /// State and faults of one function, one per tick.
    pub fn function(&self, name: &str) -> Option<&[FunctionSnapshot]> {
        self.functions.get(name).map(Vec::as_slice)
    }

    /// Every tracked flow series.
    pub fn flows(&self) -> impl Iterator<Item = (&str, &[Record])> {
        self.flows.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every tracked function series.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &[FunctionSnapshot])> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether both histories track the same flows and functions.
    pub fn same_tracking(&self, other: &Self) -> bool {
        self.flows.keys().eq(other.flows.keys()) && self.functions.keys().eq(other.functions.keys())
    }

    /// The entries strictly before `time`.
    #[must_use]
    pub fn prefix_before(&self, time: Time) -> Self {
        let cut = self.times.partition_point(|&t| t < time);
        Self {
            times: self.times[..cut].to_vec(),
            flows: self
                .flows
                .iter()
                .map(|(k, v)| (k.clone(), v[..cut.min(v.len())].to_vec()))
                .collect(),
            functions: self
                .functions
                .iter()
                .map(|(k, v)| (k.clone(), v[..cut.min(v.len())].to_vec()))
                .collect(),
        }
    }

    /// Appends every entry of `later`, which must start after this history
    /// ends and track the same entities.
    ///
    /// # Errors
    ///
    /// `HistoryMismatch` if the tracked sets differ or the axes overlap.
    pub fn extend_with(&mut self, later: Self) -> Result<(), ValidationError> {
        if !self.same_tracking(&later) {
            return Err(ValidationError::HistoryMismatch {
                reason: "histories track different entities".to_string(),
            });
        }
        if let (Some(&last), Some(&first)) = (self.times.last(), later.times.first()) {
            if first <= last {
                return Err(ValidationError::HistoryMismatch {
                    reason: format!("cannot append history starting at t={first} after t={last}"),
                });
            }
        }
        self.times.extend(later.times);
        for (name, series) in later.flows {
            self.flows.entry(name).or_default().extend(series);
        }
        for (name, series) in later.functions {
            self.functions.entry(name).or_default().extend(series);
        }
        Ok(())
    }

    /// Stable content hash over the time axis and every recorded value.
    #[must_use]
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.times.len() as u64).to_le_bytes());
        for t in &self.times {
            hasher.update(&t.to_le_bytes());
        }
        hasher.update(b"flows");
        for (name, series) in &self.flows {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            for record in series {
                record.hash_into(&mut hasher);
            }
        }
        hasher.update(b"functions");
        for (name, series) in &self.functions {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            for snap in series {
                snap.state.hash_into(&mut hasher);
                hasher.update(&(snap.faults.len() as u64).to_le_bytes());
                for mode in snap.faults.iter() {
                    hasher.update(&(mode.len() as u64).to_le_bytes());
                    hasher.update(mode.as_bytes());
                }
            }
        }
        hasher.finalize()
    }
}
