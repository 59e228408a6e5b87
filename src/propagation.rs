//! Fixed-point fault propagation over one timestep.
//!
//! The function/flow graph is not guaranteed acyclic, so a tick is computed by
//! relaxation: evaluate the active blocks, find the flows that changed, and
//! re-evaluate the blocks adjacent to those flows until nothing changes. The
//! round cap in [`PropagationConfig`] bounds oscillating feedback loops.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConvergencePolicy, PropagationConfig};
use crate::error::{ExecutionError, FaultPropResult, ValidationError};
use crate::fault::NOMINAL;
use crate::flow::{Flow, FlowId};
use crate::function::FunctionId;
use crate::model::{Model, Time};
use crate::record::Record;

/// Attribute values of every flow, indexed by [`FlowId`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSnapshot {
    records: Vec<Record>,
}

impl FlowSnapshot {
    pub(crate) fn capture(flows: &[Flow]) -> Self {
        Self {
            records: flows.iter().map(|f| f.status().clone()).collect(),
        }
    }

    /// Attributes of one flow.
    ///
    /// # Panics
    ///
    /// If `id` belongs to a model with more flows than this snapshot.
    pub fn get(&self, id: FlowId) -> &Record {
        &self.records[id.0]
    }

    /// Number of flows captured.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no flows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flows in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FlowId, &Record)> {
        self.records.iter().enumerate().map(|(idx, r)| (FlowId(idx), r))
    }
}

/// A fault mode to insert into a function at the start of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Injection {
    function: FunctionId,
    mode: String,
}

impl Injection {
    /// Resolves a function/mode pair against a model's fault catalogs.
    ///
    /// # Errors
    ///
    /// `UnknownFunction` if the function does not exist, `UnknownFaultMode`
    /// if the mode is neither nominal nor in the function's catalog.
    pub fn resolve(model: &Model, function: &str, mode: &str) -> Result<Self, ValidationError> {
        let id = model
            .function_id(function)
            .ok_or_else(|| ValidationError::UnknownFunction {
                name: function.to_string(),
            })?;
        if mode != NOMINAL && model.function(id).fault_mode(mode).is_none() {
            return Err(ValidationError::UnknownFaultMode {
                function: function.to_string(),
                mode: mode.to_string(),
            });
        }
        Ok(Self {
            function: id,
            mode: mode.to_string(),
        })
    }

    /// Target function.
    pub const fn function(&self) -> FunctionId {
        self.function
    }

    /// Fault mode to insert.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Whether the injection leaves the function nominal.
    pub fn is_nominal(&self) -> bool {
        self.mode == NOMINAL
    }
}

/// Diagnostic produced when a tick does not reach a fixed point within the
/// round cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonConvergence {
    /// Tick that failed to settle.
    pub time: Time,
    /// Rounds executed before giving up.
    pub rounds: usize,
    /// Injections applied on this tick, as `function:mode`.
    pub injections: Vec<String>,
    /// Last function evaluated before the cap was hit.
    pub last_function: Option<String>,
    /// Functions that were still due for re-evaluation.
    pub still_active: Vec<String>,
}

impl fmt::Display for NonConvergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no fixed point at t={} after {} rounds (injections: [{}], last function: {})",
            self.time,
            self.rounds,
            self.injections.join(", "),
            self.last_function.as_deref().unwrap_or("-"),
        )
    }
}

impl From<NonConvergence> for ExecutionError {
    fn from(d: NonConvergence) -> Self {
        Self::NonConvergence {
            time: d.time,
            rounds: d.rounds,
            injections: d.injections,
            last_function: d.last_function,
        }
    }
}

/// Result of advancing one tick.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Flow values after the tick.
    pub flows: FlowSnapshot,
    /// Relaxation rounds executed.
    pub rounds: usize,
    /// Set when the round cap was hit under [`ConvergencePolicy::Report`].
    pub diagnostic: Option<NonConvergence>,
}

impl StepOutcome {
    /// Whether the tick reached a fixed point.
    pub const fn converged(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// Advances `model` by one tick at `time`.
///
/// Injections with a non-nominal mode are inserted into their function, which
/// is updated immediately and seeded into the active set together with every
/// time-dependent function. Active functions are then re-evaluated round by
/// round; a function stays active when its own state or faults changed, and
/// every function adjacent to a changed flow joins the next round. The tick
/// ends when a round leaves nothing active.
///
/// `previous` is the flow snapshot returned by the previous tick; when `None`,
/// or when it does not cover exactly the model's flows, it is recomputed from
/// the model's current flows.
///
/// The model is mutated in place; the returned snapshot equals its flows on
/// return.
///
/// # Errors
///
/// `ExecutionError::Behavior` if a block hook fails, and
/// `ExecutionError::NonConvergence` if the round cap is exceeded under
/// [`ConvergencePolicy::Fail`].
pub fn advance(
    model: &mut Model,
    injections: &[Injection],
    time: Time,
    previous: Option<FlowSnapshot>,
    config: &PropagationConfig,
) -> FaultPropResult<StepOutcome> {
    let mut flow_states = match previous {
        Some(snapshot) if snapshot.len() == model.flows().len() => snapshot,
        Some(snapshot) => {
            debug!(
                time,
                captured = snapshot.len(),
                flows = model.flows().len(),
                "previous flow snapshot does not match the model, recapturing"
            );
            model.flow_snapshot()
        }
        None => model.flow_snapshot(),
    };
    let mut active: BTreeSet<FunctionId> = model.timely_functions().clone();

    for injection in injections.iter().filter(|i| !i.is_nominal()) {
        model.update_function(injection.function, Some(&injection.mode), time)?;
        active.insert(injection.function);
    }

    let mut rounds = 0usize;
    let mut last_function = None;
    let mut next = BTreeSet::new();
    while !active.is_empty() {
        if rounds >= config.max_rounds {
            let diagnostic = NonConvergence {
                time,
                rounds,
                injections: injections
                    .iter()
                    .filter(|i| !i.is_nominal())
                    .map(|i| format!("{}:{}", model.function(i.function).name(), i.mode))
                    .collect(),
                last_function: last_function.map(|id| model.function(id).name().to_string()),
                still_active: active
                    .iter()
                    .map(|id| model.function(*id).name().to_string())
                    .collect(),
            };
            warn!(
                time,
                rounds,
                injections = ?diagnostic.injections,
                last_function = ?diagnostic.last_function,
                "propagation did not reach a fixed point"
            );
            return match config.on_nonconvergence {
                ConvergencePolicy::Report => Ok(StepOutcome {
                    flows: flow_states,
                    rounds,
                    diagnostic: Some(diagnostic),
                }),
                ConvergencePolicy::Fail => Err(ExecutionError::from(diagnostic).into()),
            };
        }

        for &id in &active {
            let function = model.function(id);
            let before_state = function.current_state().clone();
            let before_faults = function.active_faults().clone();
            model.update_function(id, None, time)?;
            let function = model.function(id);
            if *function.current_state() != before_state || *function.active_faults() != before_faults {
                next.insert(id);
            }
            last_function = Some(id);
        }

        for (idx, flow) in model.flows().iter().enumerate() {
            let seen = &mut flow_states.records[idx];
            if flow.status() != seen {
                next.extend(model.adjacency().functions_of(FlowId(idx)).iter().copied());
                seen.clone_from(flow.status());
            }
        }

        std::mem::swap(&mut active, &mut next);
        next.clear();
        rounds += 1;
    }

    debug!(time, rounds, "tick converged");
    Ok(StepOutcome {
        flows: flow_states,
        rounds,
        diagnostic: None,
    })
}
