//! Result differencing and classification.
//!
//! A faulty run is always judged against the nominal run of the same model:
//! [`diff`] compares two snapshots, [`diff_history`] compares two histories
//! tick by tick, and a [`Classifier`] turns the end state into a rate/cost
//! summary.

mod diff;
mod history_diff;

pub use diff::{diff, AnnotatedFlow, AnnotatedFunction, AnnotatedSnapshot, SnapshotDiff};
pub use history_diff::{diff_history, EntityMetrics, HistoryDiff};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fault::FaultSet;
use crate::model::{Model, ModelSnapshot};
use crate::scenario::Scenario;
use crate::value::Value;

/// Health of a flow or function relative to the nominal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Indistinguishable from the nominal run.
    Nominal,
    /// Values differ from nominal but no fault is active.
    Degraded,
    /// At least one non-nominal fault mode is active.
    Faulty,
}

impl Status {
    /// Whether the status is [`Status::Nominal`].
    pub const fn is_nominal(self) -> bool {
        matches!(self, Self::Nominal)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Degraded => write!(f, "degraded"),
            Self::Faulty => write!(f, "faulty"),
        }
    }
}

/// Rate/cost summary of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Occurrence rate of the scenario.
    pub rate: f64,
    /// Cost of the end state.
    pub cost: f64,
    /// Rate-weighted cost.
    pub expected_cost: f64,
}

/// What a [`Classifier`] gets to look at.
#[derive(Debug)]
pub struct ClassificationInput<'a> {
    /// Model at the end of the run; catalogs are reachable through it.
    pub model: &'a Model,
    /// Scenario that was run.
    pub scenario: &'a Scenario,
    /// Non-nominal fault sets at the end of the run.
    pub faults: &'a BTreeMap<String, FaultSet>,
    /// Flow attributes that differ from nominal at the end of the run.
    pub flow_effects: &'a BTreeMap<String, BTreeMap<String, Value>>,
}

/// Computes the rate/cost summary of a finished run.
///
/// Models supply one through [`crate::ModelBuilder::classifier`]; the default
/// is [`ExpectedCostClassifier`].
pub trait Classifier: Send + Sync {
    /// Classifies one finished run.
    fn classify(&self, input: &ClassificationInput<'_>) -> Classification;
}

/// `rate` is the scenario rate, `cost` the summed repair cost of every active
/// fault mode, and `expected_cost = rate * cost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedCostClassifier;

impl Classifier for ExpectedCostClassifier {
    fn classify(&self, input: &ClassificationInput<'_>) -> Classification {
        let rate = input.scenario.rate();
        let cost: f64 = input
            .faults
            .iter()
            .filter_map(|(name, modes)| input.model.function_by_name(name).map(|f| (f, modes)))
            .flat_map(|(function, modes)| modes.iter().filter_map(|m| function.fault_mode(m)))
            .map(|mode| mode.repair_cost)
            .sum();
        Classification {
            rate,
            cost,
            expected_cost: rate * cost,
        }
    }
}

/// End-of-run summary of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Changed attributes per flow, with their faulty values.
    pub flows: BTreeMap<String, BTreeMap<String, Value>>,
    /// Active non-nominal fault modes per function.
    pub faults: BTreeMap<String, FaultSet>,
    /// Rate and cost of the scenario.
    pub classification: Classification,
}

impl ResultRecord {
    /// Summarizes a run ending in `faulty`, judged against `nominal`, using
    /// the model's classifier.
    pub fn from_snapshots(
        model: &Model,
        scenario: &Scenario,
        faulty: &ModelSnapshot,
        nominal: &ModelSnapshot,
    ) -> Self {
        let flows = diff(faulty, nominal).flows;
        let faults = faulty.faulty_functions();
        let classification = model.classifier().classify(&ClassificationInput {
            model,
            scenario,
            faults: &faults,
            flow_effects: &flows,
        });
        Self {
            flows,
            faults,
            classification,
        }
    }

    /// Whether the run ended without faults or flow effects.
    pub fn is_nominal(&self) -> bool {
        self.flows.is_empty() && self.faults.is_empty()
    }
}
