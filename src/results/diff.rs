use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fault::FaultSet;
use crate::model::{FunctionSnapshot, Model, ModelSnapshot, Time};
use crate::record::Record;
use crate::value::Value;

use super::Status;

/// Differences between a faulty snapshot and its nominal counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Per flow, the attributes that differ, with their value in the faulty
    /// snapshot. Flows with no differing attribute are absent.
    pub flows: BTreeMap<String, BTreeMap<String, Value>>,
    /// Status of every flow present in both snapshots.
    pub flow_status: BTreeMap<String, Status>,
    /// Status of every function of the faulty snapshot.
    pub function_status: BTreeMap<String, Status>,
}

impl SnapshotDiff {
    /// Names of the changed attributes of `flow`.
    pub fn changed_attributes(&self, flow: &str) -> Vec<&str> {
        self.flows
            .get(flow)
            .map(|attrs| attrs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// True when every flow and function is nominal.
    pub fn is_nominal(&self) -> bool {
        self.flow_status.values().chain(self.function_status.values()).all(|s| s.is_nominal())
    }
}

pub(super) fn function_status(faulty: &FunctionSnapshot, nominal: Option<&FunctionSnapshot>) -> Status {
    if !faulty.faults.is_nominal() {
        Status::Faulty
    } else if nominal.is_some_and(|n| n.state != faulty.state) {
        Status::Degraded
    } else {
        Status::Nominal
    }
}

fn changed_values(faulty: &Record, nominal: &Record) -> BTreeMap<String, Value> {
    faulty
        .changed_fields(nominal)
        .filter_map(|name| faulty.get(name).ok().map(|v| (name.to_string(), v.clone())))
        .collect()
}

/// Compares `faulty` against `nominal`.
///
/// A flow is `Degraded` when any of its attributes differs. A function is
/// `Faulty` when it has an active non-nominal mode, `Degraded` when only its
/// state differs, and `Nominal` otherwise. Only flows present in both
/// snapshots are compared, so the set of changed attributes is the same
/// whichever snapshot is passed first.
pub fn diff(faulty: &ModelSnapshot, nominal: &ModelSnapshot) -> SnapshotDiff {
    let mut out = SnapshotDiff::default();
    for (name, record) in &faulty.flows {
        let Some(base) = nominal.flows.get(name) else {
            continue;
        };
        let changed = changed_values(record, base);
        let status = if changed.is_empty() {
            Status::Nominal
        } else {
            out.flows.insert(name.clone(), changed);
            Status::Degraded
        };
        out.flow_status.insert(name.clone(), status);
    }
    for (name, function) in &faulty.functions {
        out.function_status
            .insert(name.clone(), function_status(function, nominal.functions.get(name)));
    }
    out
}

/// A flow's values with its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFlow {
    /// Attribute values in the faulty run.
    pub values: Record,
    /// Status against the nominal flow.
    pub status: Status,
}

/// A function's state and faults with its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFunction {
    /// State in the faulty run.
    pub state: Record,
    /// Active fault modes in the faulty run.
    pub faults: FaultSet,
    /// Status against the nominal function.
    pub status: Status,
}

/// A snapshot whose every entity carries its status, plus the function/flow
/// connections, for rendering the model as a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSnapshot {
    /// Tick the snapshot was taken at.
    pub time: Time,
    /// Every flow by name.
    pub flows: BTreeMap<String, AnnotatedFlow>,
    /// Every function by name.
    pub functions: BTreeMap<String, AnnotatedFunction>,
    /// `(function, flow)` pairs.
    pub connections: Vec<(String, String)>,
}

impl AnnotatedSnapshot {
    /// Annotates `faulty` with the statuses from [`diff`] against `nominal`.
    pub fn compare(model: &Model, faulty: &ModelSnapshot, nominal: &ModelSnapshot) -> Self {
        let d = diff(faulty, nominal);
        let flows = faulty
            .flows
            .iter()
            .map(|(name, values)| {
                let status = d.flow_status.get(name).copied().unwrap_or(Status::Nominal);
                (
                    name.clone(),
                    AnnotatedFlow {
                        values: values.clone(),
                        status,
                    },
                )
            })
            .collect();
        let functions = faulty
            .functions
            .iter()
            .map(|(name, f)| {
                let status = d.function_status.get(name).copied().unwrap_or(Status::Nominal);
                (
                    name.clone(),
                    AnnotatedFunction {
                        state: f.state.clone(),
                        faults: f.faults.clone(),
                        status,
                    },
                )
            })
            .collect();
        let connections = model
            .adjacency()
            .edges()
            .map(|(function, flow)| {
                (
                    model.function(function).name().to_string(),
                    model.flow(flow).name().to_string(),
                )
            })
            .collect();
        Self {
            time: faulty.time,
            flows,
            functions,
            connections,
        }
    }

    /// Status of a flow, if it exists.
    pub fn flow_status(&self, name: &str) -> Option<Status> {
        self.flows.get(name).map(|f| f.status)
    }

    /// Status of a function, if it exists.
    pub fn function_status(&self, name: &str) -> Option<Status> {
        self.functions.get(name).map(|f| f.status)
    }

    /// Worst status of any entity.
    pub fn worst(&self) -> Status {
        self.flows
            .values()
            .map(|f| f.status)
            .chain(self.functions.values().map(|f| f.status))
            .max()
            .unwrap_or(Status::Nominal)
    }
}
