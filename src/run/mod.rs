//! Run orchestration: drives [`advance`] across a timeline for one scenario.
//!
//! A run exclusively owns its model. It is either a fresh copy of a pristine
//! model, a model that was explicitly reset, or a [`Checkpoint`] taken from a
//! nominal run. The [`Simulator`] façade chooses between these per batch.

mod runtime;
mod simulator;

pub use simulator::{BatchReport, FaultRun, NominalRun, ScenarioOutcome, Simulator};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::PropagationConfig;
use crate::error::{FaultPropResult, ValidationError};
use crate::history::{History, TrackSpec};
use crate::model::{Model, ModelSnapshot, Time};
use crate::propagation::{advance, NonConvergence};
use crate::scenario::Scenario;

/// Unique identifier of a run or batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a run records besides its final state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Entities recorded into the history at every tick.
    pub track: TrackSpec,
    /// Ticks after which a full model snapshot is kept.
    pub snapshot_times: BTreeSet<Time>,
    /// Ticks on entry to which a checkpoint is captured.
    pub checkpoint_times: BTreeSet<Time>,
}

impl RunOptions {
    /// Selects the entities recorded into the history.
    #[must_use]
    pub fn track(mut self, track: TrackSpec) -> Self {
        self.track = track;
        self
    }

    /// Keeps a full snapshot after each of `times`.
    #[must_use]
    pub fn snapshot_at(mut self, times: impl IntoIterator<Item = Time>) -> Self {
        self.snapshot_times.extend(times);
        self
    }

    /// Captures a checkpoint on entry to each of `times`.
    #[must_use]
    pub fn checkpoint_at(mut self, times: impl IntoIterator<Item = Time>) -> Self {
        self.checkpoint_times.extend(times);
        self
    }

    fn validate(&self, model: &Model) -> Result<(), ValidationError> {
        for &t in self.snapshot_times.iter().chain(&self.checkpoint_times) {
            model.timeline().ensure_contains(t)?;
        }
        History::new(model, &self.track).map(|_| ())
    }
}

/// Independent copy of a model as it was on entry to tick `entry_time`,
/// before any propagation at that tick.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    entry_time: Time,
    model: Model,
}

impl Checkpoint {
    /// Captures `model` as the state on entry to `entry_time`.
    #[must_use]
    pub fn capture(model: &Model, entry_time: Time) -> Self {
        Self {
            entry_time,
            model: model.checkpoint(),
        }
    }

    /// Tick the captured state is the entry state of.
    pub const fn entry_time(&self) -> Time {
        self.entry_time
    }

    /// The captured model.
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// Hands over the captured model for a resumed run.
    pub fn into_model(self) -> Model {
        self.model
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunTrace {
    /// Identifier of this run.
    pub id: RunId,
    /// Scenario the run simulated.
    pub scenario: Scenario,
    /// Tracked values at every tick of the run.
    pub history: History,
    /// Full snapshots at the requested ticks.
    pub snapshots: BTreeMap<Time, ModelSnapshot>,
    /// Checkpoints at the requested ticks.
    pub checkpoints: BTreeMap<Time, Checkpoint>,
    /// Ticks that hit the round cap.
    pub diagnostics: Vec<NonConvergence>,
    /// Model state after the last tick.
    pub final_snapshot: ModelSnapshot,
    /// Relaxation rounds summed over all ticks.
    pub rounds: usize,
}

impl RunTrace {
    /// Whether every tick reached a fixed point.
    pub fn converged(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

fn drive(
    model: &mut Model,
    scenario: &Scenario,
    from: Time,
    options: &RunOptions,
    config: &PropagationConfig,
) -> FaultPropResult<RunTrace> {
    let mut history = History::new(model, &options.track)?;
    let mut snapshots = BTreeMap::new();
    let mut checkpoints = BTreeMap::new();
    let mut diagnostics = Vec::new();
    let mut rounds = 0;
    let mut previous = None;
    let mut last = from;

    let ticks: Vec<Time> = model.timeline().ticks_from(from).collect();
    for time in ticks {
        if options.checkpoint_times.contains(&time) {
            checkpoints.insert(time, Checkpoint::capture(model, time));
        }
        let injections = scenario.injections_at(model, time)?;
        let outcome = advance(model, &injections, time, previous.take(), config)?;
        rounds += outcome.rounds;
        if let Some(diagnostic) = outcome.diagnostic {
            diagnostics.push(diagnostic);
        }
        previous = Some(outcome.flows);

        history.record(time, model);
        if options.snapshot_times.contains(&time) {
            snapshots.insert(time, model.snapshot(time));
        }
        last = time;
    }

    debug!(
        scenario = %scenario,
        from,
        rounds,
        nonconverged = diagnostics.len(),
        "run finished"
    );
    Ok(RunTrace {
        id: RunId::new(),
        scenario: scenario.clone(),
        history,
        snapshots,
        checkpoints,
        diagnostics,
        final_snapshot: model.snapshot(last),
        rounds,
    })
}

/// Runs `scenario` over the whole timeline of `model`.
///
/// The fault, if any, is injected at its injection tick only. `model` is
/// advanced in place and holds the final state on return; it must be a fresh
/// copy or freshly reset.
///
/// # Errors
///
/// Configuration errors for an invalid scenario, options or config; runtime
/// errors from [`advance`].
pub fn propagate_scenario(
    model: &mut Model,
    scenario: &Scenario,
    options: &RunOptions,
    config: &PropagationConfig,
) -> FaultPropResult<RunTrace> {
    config.validate()?;
    scenario.validate(model)?;
    options.validate(model)?;
    let start = model.timeline().start();
    drive(model, scenario, start, options, config)
}

/// Resumes `scenario` from a checkpoint taken at its injection time.
///
/// Only the ticks from the checkpoint on are simulated. When the nominal
/// trace the checkpoint came from is given, its history and snapshots before
/// the checkpoint are prepended, so the result covers the whole timeline
/// exactly like a full run would.
///
/// Returns the advanced model with the trace.
///
/// # Errors
///
/// `CheckpointMismatch` if the scenario's injection time differs from the
/// checkpoint's entry time, `HistoryMismatch` if `nominal` tracks different
/// entities, and everything [`propagate_scenario`] reports.
pub fn resume_from_checkpoint(
    checkpoint: Checkpoint,
    scenario: &Scenario,
    options: &RunOptions,
    nominal: Option<&RunTrace>,
    config: &PropagationConfig,
) -> FaultPropResult<(Model, RunTrace)> {
    config.validate()?;
    let entry = checkpoint.entry_time();
    let mut model = checkpoint.into_model();
    scenario.validate(&model)?;
    options.validate(&model)?;
    if let Some(time) = scenario.injection_time() {
        if time != entry {
            return Err(ValidationError::CheckpointMismatch {
                checkpoint: entry,
                scenario: time,
            }
            .into());
        }
    }

    let mut trace = drive(&mut model, scenario, entry, options, config)?;
    if let Some(nominal) = nominal {
        let mut history = nominal.history.prefix_before(entry);
        history.extend_with(trace.history)?;
        trace.history = history;
        for (time, snapshot) in nominal.snapshots.range(..entry) {
            if options.snapshot_times.contains(time) {
                trace.snapshots.insert(*time, snapshot.clone());
            }
        }
    }
    Ok((model, trace))
}
