//! Scenarios: what to inject, where and when.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{Model, Time};
use crate::propagation::Injection;

/// A single fault injected into one function at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultInjection {
    function: String,
    mode: String,
    time: Time,
    rate: f64,
}

impl FaultInjection {
    /// Name of the faulted function.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Injected fault mode.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Tick at which the fault is inserted.
    pub const fn time(&self) -> Time {
        self.time
    }

    /// Occurrence rate of the injected mode.
    pub const fn rate(&self) -> f64 {
        self.rate
    }
}

/// A simulation intent: no faults, or one fault at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    /// No fault is injected.
    Nominal,
    /// One fault mode inserted at one tick.
    SingleFault(FaultInjection),
}

impl Scenario {
    /// Builds a single-fault scenario, checking it against the model.
    ///
    /// The rate is taken from the function's fault catalog.
    ///
    /// # Errors
    ///
    /// `UnknownFunction`, `UnknownFaultMode` or `TimeOutsideTimeline`.
    pub fn single_fault(
        model: &Model,
        function: &str,
        mode: &str,
        time: Time,
    ) -> Result<Self, ValidationError> {
        let fxn = model
            .function_by_name(function)
            .ok_or_else(|| ValidationError::UnknownFunction {
                name: function.to_string(),
            })?;
        let fault = fxn.fault_mode(mode).ok_or_else(|| ValidationError::UnknownFaultMode {
            function: function.to_string(),
            mode: mode.to_string(),
        })?;
        model.timeline().ensure_contains(time)?;
        Ok(Self::SingleFault(FaultInjection {
            function: function.to_string(),
            mode: mode.to_string(),
            time,
            rate: fault.rate,
        }))
    }

    /// Whether this is the nominal scenario.
    pub const fn is_nominal(&self) -> bool {
        matches!(self, Self::Nominal)
    }

    /// The injected fault, if any.
    pub const fn fault(&self) -> Option<&FaultInjection> {
        match self {
            Self::Nominal => None,
            Self::SingleFault(f) => Some(f),
        }
    }

    /// Tick at which the fault is injected.
    pub const fn injection_time(&self) -> Option<Time> {
        match self {
            Self::Nominal => None,
            Self::SingleFault(f) => Some(f.time),
        }
    }

    /// Scenario rate used for classification; `1.0` for the nominal scenario.
    pub const fn rate(&self) -> f64 {
        match self {
            Self::Nominal => 1.0,
            Self::SingleFault(f) => f.rate,
        }
    }

    /// Checks that the scenario names an existing function, one of its fault
    /// modes, and a tick of the model's timeline.
    pub fn validate(&self, model: &Model) -> Result<(), ValidationError> {
        match self {
            Self::Nominal => Ok(()),
            Self::SingleFault(f) => {
                let function = model
                    .function_by_name(&f.function)
                    .ok_or_else(|| ValidationError::UnknownFunction {
                        name: f.function.clone(),
                    })?;
                if function.fault_mode(&f.mode).is_none() {
                    return Err(ValidationError::UnknownFaultMode {
                        function: f.function.clone(),
                        mode: f.mode.clone(),
                    });
                }
                model.timeline().ensure_contains(f.time)
            }
        }
    }

    /// Injections to apply at `time`: the scenario's fault at its injection
    /// tick, nothing otherwise.
    pub(crate) fn injections_at(&self, model: &Model, time: Time) -> Result<Vec<Injection>, ValidationError> {
        match self {
            Self::SingleFault(f) if f.time == time => Ok(vec![Injection::resolve(model, &f.function, &f.mode)?]),
            _ => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::SingleFault(x) => write!(f, "{} {} @ t={}", x.function, x.mode, x.time),
        }
    }
}

/// The baseline scenario with no injected faults.
#[must_use]
pub const fn nominal_scenario() -> Scenario {
    Scenario::Nominal
}

/// Every single-fault scenario of a model.
///
/// For each injection point of the timeline, each function (declaration
/// order) and each of its fault modes (name order), one scenario is emitted.
/// There is no deduplication: the result has exactly
/// `Σ modes × |injection points|` entries.
pub fn enumerate_single_fault_scenarios(model: &Model) -> Vec<Scenario> {
    let times = model.timeline().injection_points();
    let mut scenarios = Vec::with_capacity(times.len() * model.fault_mode_count());
    for &time in &times {
        for function in model.functions() {
            for (mode, fault) in function.catalog() {
                scenarios.push(Scenario::SingleFault(FaultInjection {
                    function: function.name().to_string(),
                    mode: mode.clone(),
                    time,
                    rate: fault.rate,
                }));
            }
        }
    }
    scenarios
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::fault::NOMINAL;
    use crate::function::{BlockContext, BlockResult, FunctionSpec};
    use crate::model::Timeline;
    use crate::record::Record;

    fn idle(_ctx: &mut BlockContext<'_>) -> BlockResult {
        Ok(())
    }

    fn model() -> Model {
        Model::builder("m")
            .flow("F", Record::new().with("rate", 1.0))
            .function(
                FunctionSpec::from_fn("A", idle)
                    .port("out", "F")
                    .mode("short", 1e-5, 100.0)
                    .mode("open", 2e-5, 50.0),
            )
            .function(FunctionSpec::from_fn("B", idle).port("in", "F").mode("leak", 1e-3, 5.0))
            .function(FunctionSpec::from_fn("C", idle))
            .timeline(Timeline::new(0, 20, 5).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn enumeration_is_complete_and_unique() {
        let model = model();
        let scenarios = enumerate_single_fault_scenarios(&model);
        assert_eq!(scenarios.len(), 3 * 5);
        let keys: HashSet<(String, String, Time)> = scenarios
            .iter()
            .map(|s| {
                let f = s.fault().unwrap();
                (f.function().to_string(), f.mode().to_string(), f.time())
            })
            .collect();
        assert_eq!(keys.len(), scenarios.len());
    }

    #[test]
    fn enumeration_uses_injection_points() {
        let model = Model::builder("m")
            .function(FunctionSpec::from_fn("A", idle).mode("short", 1e-5, 1.0))
            .timeline(Timeline::new(0, 55, 1).unwrap().with_injection_times([0, 3, 15, 55]).unwrap())
            .build()
            .unwrap();
        let times: Vec<Time> = enumerate_single_fault_scenarios(&model)
            .iter()
            .filter_map(Scenario::injection_time)
            .collect();
        assert_eq!(times, vec![0, 3, 15, 55]);
    }

    #[test]
    fn single_fault_takes_rate_from_catalog() {
        let model = model();
        let s = Scenario::single_fault(&model, "A", "open", 10).unwrap();
        assert!((s.rate() - 2e-5).abs() < f64::EPSILON);
        assert_eq!(s.injection_time(), Some(10));
        assert_eq!(s.to_string(), "A open @ t=10");
    }

    #[test]
    fn single_fault_rejects_bad_input() {
        let model = model();
        assert!(matches!(
            Scenario::single_fault(&model, "Z", "short", 0),
            Err(ValidationError::UnknownFunction { .. })
        ));
        assert!(matches!(
            Scenario::single_fault(&model, "A", "melt", 0),
            Err(ValidationError::UnknownFaultMode { .. })
        ));
        assert!(matches!(
            Scenario::single_fault(&model, "A", NOMINAL, 0),
            Err(ValidationError::UnknownFaultMode { .. })
        ));
        assert!(matches!(
            Scenario::single_fault(&model, "A", "short", 7),
            Err(ValidationError::TimeOutsideTimeline { .. })
        ));
    }

    #[test]
    fn nominal_scenario_is_trivially_valid() {
        let model = model();
        let s = nominal_scenario();
        assert!(s.is_nominal());
        s.validate(&model).unwrap();
        assert!(s.injections_at(&model, 0).unwrap().is_empty());
    }

    #[test]
    fn deserialized_scenario_is_revalidated() {
        let json = r#"{"type":"single_fault","function":"A","mode":"melt","time":5,"rate":0.1}"#;
        let s: Scenario = serde_json::from_str(json).unwrap();
        assert!(matches!(s.validate(&model()), Err(ValidationError::UnknownFaultMode { .. })));
    }
}
