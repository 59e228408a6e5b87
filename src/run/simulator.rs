use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{BatchOptions, ExecutionMode, SimulationConfig};
use crate::error::{FaultPropError, FaultPropResult};
use crate::history::History;
use crate::model::{Model, Time};
use crate::propagation::NonConvergence;
use crate::results::{diff_history, AnnotatedSnapshot, HistoryDiff, ResultRecord};
use crate::scenario::{enumerate_single_fault_scenarios, Scenario};

use super::runtime;
use super::{propagate_scenario, resume_from_checkpoint, RunId, RunOptions, RunTrace};

/// Outcome of the nominal scenario.
#[derive(Debug, Clone)]
pub struct NominalRun {
    /// End-of-run summary.
    pub result: ResultRecord,
    /// Final state, every entity nominal.
    pub annotated: AnnotatedSnapshot,
    /// Everything the nominal run recorded.
    pub trace: RunTrace,
}

/// Outcome of one scenario compared against the nominal run.
#[derive(Debug, Clone)]
pub struct FaultRun {
    /// Scenario that was run.
    pub scenario: Scenario,
    /// End-of-run summary against nominal.
    pub result: ResultRecord,
    /// Final state annotated against the nominal final state.
    pub annotated: AnnotatedSnapshot,
    /// Annotated snapshots at every requested snapshot time.
    pub annotated_history: BTreeMap<Time, AnnotatedSnapshot>,
    /// Tick-by-tick comparison of the tracked entities.
    pub history_diff: HistoryDiff,
    /// Trace of the nominal run.
    pub nominal: RunTrace,
    /// Trace of the faulty run, stitched to the nominal prefix when staged.
    pub faulty: RunTrace,
}

impl FaultRun {
    /// Ticks of the faulty run that hit the round cap.
    pub fn diagnostics(&self) -> &[NonConvergence] {
        &self.faulty.diagnostics
    }
}

/// One row of a batch: the scenario and what it led to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario that was run.
    pub scenario: Scenario,
    /// End-of-run summary against nominal.
    pub result: ResultRecord,
    /// Tracked values of the scenario's run.
    pub history: History,
    /// Ticks that hit the round cap.
    pub diagnostics: Vec<NonConvergence>,
}

/// Everything a batch produced, in scenario order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Identifier of the batch.
    pub id: RunId,
    /// How scenario models were obtained.
    pub mode: ExecutionMode,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the last outcome was collected.
    pub finished_at: DateTime<Utc>,
    /// Result of the nominal run every scenario was compared against.
    pub nominal: ResultRecord,
    /// Tracked values of the nominal run.
    pub nominal_history: History,
    /// One outcome per scenario, in scenario order.
    pub outcomes: Vec<ScenarioOutcome>,
}

impl BatchReport {
    /// Number of outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Scenarios with at least one tick that hit the round cap.
    pub fn nonconverged(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.diagnostics.is_empty())
    }

    /// Sum of expected costs over all scenarios.
    pub fn total_expected_cost(&self) -> f64 {
        self.outcomes.iter().map(|o| o.result.classification.expected_cost).sum()
    }
}

/// Shared inputs of every scenario in a batch.
pub(super) struct BatchContext {
    pub(super) template: Model,
    pub(super) mode: ExecutionMode,
    pub(super) options: RunOptions,
    pub(super) config: SimulationConfig,
    pub(super) nominal: RunTrace,
}

impl BatchContext {
    /// Runs one scenario on a model obtained according to the batch mode.
    ///
    /// `working` is the caller's reusable model in [`ExecutionMode::Reuse`];
    /// it is created on first use and reset before every run.
    pub(super) fn execute(&self, working: &mut Option<Model>, scenario: &Scenario) -> FaultPropResult<ScenarioOutcome> {
        let propagation = &self.config.propagation;
        let staged_at = match self.mode {
            ExecutionMode::Staged => scenario.injection_time(),
            _ => None,
        };
        let outcome = if let Some(time) = staged_at {
            let checkpoint = self
                .nominal
                .checkpoints
                .get(&time)
                .cloned()
                .ok_or_else(|| FaultPropError::internal(format!("no nominal checkpoint at t={time}")))?;
            let (model, trace) =
                resume_from_checkpoint(checkpoint, scenario, &self.options, Some(&self.nominal), propagation)?;
            self.outcome(&model, scenario, trace)
        } else if self.mode == ExecutionMode::Reuse {
            let model = working.get_or_insert_with(|| self.template.checkpoint());
            model.reset();
            let trace = propagate_scenario(model, scenario, &self.options, propagation)?;
            self.outcome(model, scenario, trace)
        } else {
            let mut model = self.template.checkpoint();
            let trace = propagate_scenario(&mut model, scenario, &self.options, propagation)?;
            self.outcome(&model, scenario, trace)
        };
        Ok(outcome)
    }

    fn outcome(&self, model: &Model, scenario: &Scenario, trace: RunTrace) -> ScenarioOutcome {
        let result = ResultRecord::from_snapshots(model, scenario, &trace.final_snapshot, &self.nominal.final_snapshot);
        debug!(
            scenario = %scenario,
            expected_cost = result.classification.expected_cost,
            "scenario finished"
        );
        ScenarioOutcome {
            scenario: scenario.clone(),
            result,
            history: trace.history,
            diagnostics: trace.diagnostics,
        }
    }
}

/// Runs scenarios against a pristine template model.
///
/// The template is never advanced: every run gets its own copy, a reset
/// reusable copy, or a checkpoint copy.
#[derive(Debug, Clone)]
pub struct Simulator {
    template: Model,
    config: SimulationConfig,
}

impl Simulator {
    /// Creates a simulator with the default configuration.
    pub fn new(template: Model) -> Self {
        Self {
            template,
            config: SimulationConfig::default(),
        }
    }

    /// Creates a simulator with an explicit configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration does not validate.
    pub fn with_config(template: Model, config: SimulationConfig) -> FaultPropResult<Self> {
        config.validate()?;
        Ok(Self { template, config })
    }

    /// The pristine template model.
    pub const fn model(&self) -> &Model {
        &self.template
    }

    /// Active configuration.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn nominal_trace(&self, options: &RunOptions) -> FaultPropResult<(Model, RunTrace)> {
        let mut model = self.template.checkpoint();
        let trace = propagate_scenario(&mut model, &Scenario::Nominal, options, &self.config.propagation)?;
        Ok((model, trace))
    }

    /// Runs the nominal scenario.
    pub fn run_nominal(&self, options: &RunOptions) -> FaultPropResult<NominalRun> {
        let (model, trace) = self.nominal_trace(options)?;
        let end = &trace.final_snapshot;
        Ok(NominalRun {
            result: ResultRecord::from_snapshots(&model, &Scenario::Nominal, end, end),
            annotated: AnnotatedSnapshot::compare(&model, end, end),
            trace,
        })
    }

    /// Injects `mode` into `function` at `time` and compares against nominal.
    ///
    /// When `staged`, the faulty run resumes from a nominal checkpoint at
    /// `time` instead of simulating the ticks before it again.
    pub fn run_one_fault(
        &self,
        function: &str,
        mode: &str,
        time: Time,
        staged: bool,
        options: &RunOptions,
    ) -> FaultPropResult<FaultRun> {
        let scenario = Scenario::single_fault(&self.template, function, mode, time)?;
        self.run_compared(&scenario, staged, options)
    }

    /// Runs any scenario from the start and compares against nominal.
    pub fn run_scenario(&self, scenario: &Scenario, options: &RunOptions) -> FaultPropResult<FaultRun> {
        self.run_compared(scenario, false, options)
    }

    fn run_compared(&self, scenario: &Scenario, staged: bool, options: &RunOptions) -> FaultPropResult<FaultRun> {
        scenario.validate(&self.template)?;
        let propagation = &self.config.propagation;
        let staged_at = scenario.injection_time().filter(|_| staged);

        let mut nominal_options = options.clone();
        nominal_options.checkpoint_times.extend(staged_at);
        let (_, mut nominal) = self.nominal_trace(&nominal_options)?;

        let (model, faulty) = if let Some(time) = staged_at {
            let checkpoint = nominal
                .checkpoints
                .remove(&time)
                .ok_or_else(|| FaultPropError::internal(format!("no nominal checkpoint at t={time}")))?;
            resume_from_checkpoint(checkpoint, scenario, options, Some(&nominal), propagation)?
        } else {
            let mut model = self.template.checkpoint();
            let trace = propagate_scenario(&mut model, scenario, options, propagation)?;
            (model, trace)
        };

        let result = ResultRecord::from_snapshots(&model, scenario, &faulty.final_snapshot, &nominal.final_snapshot);
        let annotated = AnnotatedSnapshot::compare(&model, &faulty.final_snapshot, &nominal.final_snapshot);
        let annotated_history = faulty
            .snapshots
            .iter()
            .filter_map(|(time, snap)| {
                nominal
                    .snapshots
                    .get(time)
                    .map(|base| (*time, AnnotatedSnapshot::compare(&model, snap, base)))
            })
            .collect();
        let history_diff = diff_history(&faulty.history, &nominal.history)?;

        Ok(FaultRun {
            scenario: scenario.clone(),
            result,
            annotated,
            annotated_history,
            history_diff,
            nominal,
            faulty,
        })
    }

    fn prepare_batch(&self, scenarios: &[Scenario], batch: &BatchOptions) -> FaultPropResult<BatchContext> {
        let mode = batch.mode()?;
        for scenario in scenarios {
            scenario.validate(&self.template)?;
        }
        let options = RunOptions {
            track: batch.track.clone(),
            ..RunOptions::default()
        };
        let mut nominal_options = options.clone();
        if mode == ExecutionMode::Staged {
            nominal_options.checkpoint_times = scenarios
                .iter()
                .filter_map(Scenario::injection_time)
                .collect::<BTreeSet<_>>();
        }
        let (_, nominal) = self.nominal_trace(&nominal_options)?;
        Ok(BatchContext {
            template: self.template.checkpoint(),
            mode,
            options,
            config: self.config,
            nominal,
        })
    }

    fn report(
        context: &BatchContext,
        started_at: DateTime<Utc>,
        outcomes: Vec<ScenarioOutcome>,
    ) -> BatchReport {
        let end = &context.nominal.final_snapshot;
        let report = BatchReport {
            id: RunId::new(),
            mode: context.mode,
            started_at,
            finished_at: Utc::now(),
            nominal: ResultRecord::from_snapshots(&context.template, &Scenario::Nominal, end, end),
            nominal_history: context.nominal.history.clone(),
            outcomes,
        };
        info!(
            batch = %report.id,
            scenarios = report.len(),
            nonconverged = report.nonconverged().count(),
            "batch finished"
        );
        report
    }

    /// Runs `scenarios` one after another.
    ///
    /// # Errors
    ///
    /// `ConflictingRunModes` when both `reuse` and `staged` are set, any
    /// scenario validation error before anything runs, and the first runtime
    /// error otherwise.
    pub fn run_batch(&self, scenarios: &[Scenario], batch: &BatchOptions) -> FaultPropResult<BatchReport> {
        let started_at = Utc::now();
        let context = self.prepare_batch(scenarios, batch)?;
        info!(scenarios = scenarios.len(), mode = %context.mode, "batch started");
        let mut working = None;
        let outcomes = scenarios
            .iter()
            .map(|s| context.execute(&mut working, s))
            .collect::<FaultPropResult<Vec<_>>>()?;
        Ok(Self::report(&context, started_at, outcomes))
    }

    /// Runs every single-fault scenario of the model.
    pub fn run_list(&self, batch: &BatchOptions) -> FaultPropResult<BatchReport> {
        self.run_batch(&enumerate_single_fault_scenarios(&self.template), batch)
    }

    /// Like [`Simulator::run_batch`], spread over the worker pool of
    /// [`crate::config::RuntimeConfig`]. The report equals the sequential one
    /// apart from ids and timestamps.
    pub fn run_batch_parallel(&self, scenarios: &[Scenario], batch: &BatchOptions) -> FaultPropResult<BatchReport> {
        let started_at = Utc::now();
        let context = Arc::new(self.prepare_batch(scenarios, batch)?);
        info!(
            scenarios = scenarios.len(),
            mode = %context.mode,
            workers = self.config.runtime.workers,
            "parallel batch started"
        );
        let outcomes = runtime::run_parallel(Arc::clone(&context), scenarios.to_vec(), &self.config.runtime)?;
        Ok(Self::report(&context, started_at, outcomes))
    }

    /// Runs every single-fault scenario of the model on the worker pool.
    pub fn run_list_parallel(&self, batch: &BatchOptions) -> FaultPropResult<BatchReport> {
        self.run_batch_parallel(&enumerate_single_fault_scenarios(&self.template), batch)
    }
}
