mod common;

use std::collections::HashSet;

use faultprop::{
    enumerate_single_fault_scenarios, BatchOptions, ConvergencePolicy, ExecutionMode, FaultPropError,
    PropagationConfig, RuntimeConfig, Scenario, SimulationConfig, Simulator, TrackSpec, ValidationError,
};

fn options(reuse: bool, staged: bool) -> BatchOptions {
    BatchOptions {
        reuse,
        staged,
        track: TrackSpec::All,
    }
}

#[test]
fn enumeration_covers_every_mode_at_every_injection_point() {
    let model = common::pump_model();
    let scenarios = enumerate_single_fault_scenarios(&model);
    assert_eq!(scenarios.len(), 6 * 4);
    assert_eq!(
        scenarios.len(),
        model.fault_mode_count() * model.timeline().injection_points().len()
    );
    let unique: HashSet<_> = scenarios
        .iter()
        .map(|s| {
            let f = s.fault().unwrap();
            (f.function().to_string(), f.mode().to_string(), f.time())
        })
        .collect();
    assert_eq!(unique.len(), scenarios.len());

    let model = common::two_function_model();
    assert_eq!(enumerate_single_fault_scenarios(&model).len(), 21);
}

#[test]
fn all_execution_modes_produce_the_same_outcomes() {
    let sim = Simulator::new(common::pump_model());
    let fresh = sim.run_list(&options(false, false)).unwrap();
    let reuse = sim.run_list(&options(true, false)).unwrap();
    let staged = sim.run_list(&options(false, true)).unwrap();

    assert_eq!(fresh.mode, ExecutionMode::Fresh);
    assert_eq!(reuse.mode, ExecutionMode::Reuse);
    assert_eq!(staged.mode, ExecutionMode::Staged);
    assert_eq!(fresh.len(), 24);
    assert_eq!(fresh.outcomes, reuse.outcomes);
    assert_eq!(fresh.outcomes, staged.outcomes);
    assert_eq!(fresh.nominal, staged.nominal);
    assert!(fresh.nominal.is_nominal());
    assert!(fresh.started_at <= fresh.finished_at);
    assert_ne!(fresh.id, reuse.id);
}

#[test]
fn outcomes_follow_scenario_order() {
    let sim = Simulator::new(common::pump_model());
    let report = sim.run_list(&BatchOptions::default()).unwrap();
    let expected = enumerate_single_fault_scenarios(sim.model());
    let got: Vec<&Scenario> = report.outcomes.iter().map(|o| &o.scenario).collect();
    assert_eq!(got, expected.iter().collect::<Vec<_>>());
    assert!(report.outcomes.iter().all(|o| !o.result.faults.is_empty()));
    assert!(report.total_expected_cost() > 0.0);
}

#[test]
fn reuse_and_staged_together_are_rejected() {
    let sim = Simulator::new(common::two_function_model());
    let err = sim.run_list(&options(true, true)).unwrap_err();
    assert_eq!(err, FaultPropError::Validation(ValidationError::ConflictingRunModes));
    assert!(err.is_configuration());
}

#[test]
fn unknown_names_are_configuration_errors() {
    let sim = Simulator::new(common::two_function_model());
    let err = sim
        .run_one_fault("Nope", "short", 3, false, &Default::default())
        .unwrap_err();
    assert!(matches!(err, FaultPropError::Validation(ValidationError::UnknownFunction { .. })));

    let err = sim.run_one_fault("A", "melt", 3, true, &Default::default()).unwrap_err();
    assert!(matches!(err, FaultPropError::Validation(ValidationError::UnknownFaultMode { .. })));

    let bad: Scenario =
        serde_json::from_str(r#"{"type":"single_fault","function":"B","mode":"short","time":2,"rate":1.0}"#).unwrap();
    let err = sim.run_batch(&[bad], &BatchOptions::default()).unwrap_err();
    assert!(err.is_configuration());

    let err = sim
        .run_batch(
            &[],
            &BatchOptions {
                track: TrackSpec::only(["Missing"], Vec::<String>::new()),
                ..BatchOptions::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, FaultPropError::Validation(ValidationError::UnknownFlow { .. })));
}

#[test]
fn parallel_batch_equals_sequential() {
    let config = SimulationConfig {
        runtime: RuntimeConfig {
            workers: 3,
            queue_capacity: 4,
        },
        ..SimulationConfig::default()
    };
    let sim = Simulator::with_config(common::pump_model(), config).unwrap();
    for (reuse, staged) in [(false, false), (true, false), (false, true)] {
        let sequential = sim.run_list(&options(reuse, staged)).unwrap();
        let parallel = sim.run_list_parallel(&options(reuse, staged)).unwrap();
        assert_eq!(sequential.outcomes, parallel.outcomes);
        assert_eq!(sequential.mode, parallel.mode);
    }
}

#[test]
fn nonconvergence_is_reported_per_scenario() {
    let config = SimulationConfig {
        propagation: PropagationConfig {
            max_rounds: 20,
            ..PropagationConfig::default()
        },
        ..SimulationConfig::default()
    };
    let sim = Simulator::with_config(common::oscillating_model(), config).unwrap();
    let report = sim.run_list(&BatchOptions::default()).unwrap();
    assert_eq!(report.len(), 4);
    assert_eq!(report.nonconverged().count(), 4);
    let first = &report.outcomes[0];
    assert!(first.diagnostics.iter().all(|d| d.rounds == 20));
    assert!(first.diagnostics.iter().any(|d| d.injections == vec!["P:stuck".to_string()]));
}

#[test]
fn fail_policy_aborts_the_batch() {
    let config = SimulationConfig {
        propagation: PropagationConfig {
            max_rounds: 20,
            on_nonconvergence: ConvergencePolicy::Fail,
        },
        ..SimulationConfig::default()
    };
    let sim = Simulator::with_config(common::oscillating_model(), config).unwrap();
    let err = sim.run_list(&BatchOptions::default()).unwrap_err();
    assert!(err.is_non_convergence());
    let err = sim.run_list_parallel(&BatchOptions::default()).unwrap_err();
    assert!(err.is_non_convergence());
}

#[test]
fn invalid_runtime_config_is_rejected() {
    let config = SimulationConfig {
        runtime: RuntimeConfig {
            workers: 0,
            queue_capacity: 1,
        },
        ..SimulationConfig::default()
    };
    let err = Simulator::with_config(common::pump_model(), config).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn batch_report_serializes_to_json() {
    let sim = Simulator::new(common::two_function_model());
    let report = sim.run_batch(
        &[Scenario::single_fault(sim.model(), "A", "short", 10).unwrap()],
        &BatchOptions::default(),
    );
    let report = report.unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"single_fault\""));
    let back: faultprop::BatchReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, report.id);
    assert_eq!(back.outcomes[0].scenario.injection_time(), Some(10));
    assert_eq!(back.outcomes[0].result.faults, report.outcomes[0].result.faults);
}
