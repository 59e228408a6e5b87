mod common;

use faultprop::{
    propagate_scenario, PropagationConfig, RunOptions, Scenario, Simulator, Status, TrackSpec, Value,
};

fn tracked() -> RunOptions {
    RunOptions::default().track(TrackSpec::All)
}

#[test]
fn nominal_run_is_nominal_everywhere_and_reproducible() {
    for model in [common::two_function_model(), common::pump_model()] {
        let sim = Simulator::new(model);
        let first = sim.run_nominal(&tracked()).unwrap();
        let second = sim.run_nominal(&tracked()).unwrap();

        assert!(first.result.is_nominal());
        assert_eq!(first.annotated.worst(), Status::Nominal);
        assert_eq!(first.trace.history, second.trace.history);
        assert_eq!(first.trace.history.fingerprint(), second.trace.history.fingerprint());

        let d = faultprop::diff_history(&first.trace.history, &second.trace.history).unwrap();
        assert!(d.is_nominal());
    }
}

#[test]
fn template_model_is_never_advanced() {
    let model = common::pump_model();
    let pristine = model.snapshot(0);
    let sim = Simulator::new(model);
    sim.run_one_fault("ImportEE", "inf_v", 5, false, &tracked()).unwrap();
    sim.run_one_fault("ImportEE", "inf_v", 5, true, &tracked()).unwrap();
    assert_eq!(sim.model().snapshot(0), pristine);
}

#[test]
fn two_function_short_at_ten() {
    let sim = Simulator::new(common::two_function_model());
    let run = sim.run_one_fault("A", "short", 10, false, &tracked()).unwrap();

    let f = run.faulty.history.flow("F").unwrap();
    let times = run.faulty.history.times();
    for (t, record) in times.iter().zip(f) {
        let rate = record.float("rate").unwrap();
        if *t < 10 {
            assert!((rate - 1.0).abs() < f64::EPSILON, "t={t}: rate {rate}");
        } else {
            assert!((rate - 1.0).abs() > f64::EPSILON, "t={t}: rate {rate}");
        }
    }

    let a = run.faulty.history.function("A").unwrap();
    let idx = run.faulty.history.index_of(10).unwrap();
    assert!(a[idx - 1].faults.is_nominal());
    assert!(a[idx].faults.contains("short"));

    for (i, t) in run.history_diff.times.iter().enumerate() {
        let expected = if *t >= 10 { Status::Degraded } else { Status::Nominal };
        assert_eq!(run.history_diff.status_at("B", i), Some(expected), "t={t}");
    }
    assert_eq!(run.annotated.function_status("B"), Some(Status::Degraded));
    assert_eq!(run.annotated.function_status("A"), Some(Status::Faulty));

    assert_eq!(run.result.faults.len(), 1);
    assert_eq!(run.result.faults["A"].iter().collect::<Vec<_>>(), vec!["short"]);
    assert_eq!(run.result.flows["F"]["rate"], Value::Float(10.0));
    assert!((run.result.classification.rate - 1e-5).abs() < 1e-12);
    assert!((run.result.classification.expected_cost - 1e-3).abs() < 1e-12);
}

#[test]
fn nothing_changes_before_injection() {
    let sim = Simulator::new(common::pump_model());
    for time in [5, 15, 30] {
        for (function, mode) in [("ImportEE", "inf_v"), ("ExportWater", "block"), ("ImportWater", "no_wat")] {
            let run = sim.run_one_fault(function, mode, time, false, &tracked()).unwrap();
            let cut = run.faulty.history.index_of(time).unwrap();
            for (name, series) in run.faulty.history.flows() {
                let nominal = run.nominal.history.flow(name).unwrap();
                assert_eq!(&series[..cut], &nominal[..cut], "{function}:{mode}@{time} flow {name}");
            }
            for (name, series) in run.faulty.history.functions() {
                let nominal = run.nominal.history.function(name).unwrap();
                assert_eq!(&series[..cut], &nominal[..cut], "{function}:{mode}@{time} function {name}");
            }
            assert_eq!(run.history_diff.first_deviation(), Some(time));
        }
    }
}

#[test]
fn conditional_faults_escalate_overvoltage() {
    let sim = Simulator::new(common::pump_model());
    let run = sim.run_one_fault("ImportEE", "inf_v", 5, false, &tracked()).unwrap();
    let faults = &run.result.faults;
    assert!(faults["ImportEE"].contains("inf_v"));
    assert!(faults["MoveWater"].contains("short"));
    assert!(faults["MoveWater"].contains("mech_break"));
    // inf_v 200, short 200, mech_break 500
    assert!((run.result.classification.cost - 900.0).abs() < 1e-9);
    assert_eq!(run.annotated.flow_status("Wat_2"), Some(Status::Degraded));
    assert!(run.history_diff.max_concurrent_faults >= 3);
}

#[test]
fn feedback_loop_settles() {
    let sim = Simulator::new(common::pump_model());
    let run = sim.run_one_fault("ExportWater", "block", 15, false, &tracked()).unwrap();
    assert!(run.diagnostics().is_empty());
    let end = &run.faulty.final_snapshot;
    assert!(end.functions["MoveWater"].state.bool("overpressure").unwrap());
    assert_eq!(run.annotated.function_status("MoveWater"), Some(Status::Degraded));
}

#[test]
fn oscillation_is_reported_not_fatal() {
    let mut model = common::oscillating_model();
    let config = PropagationConfig {
        max_rounds: 40,
        ..PropagationConfig::default()
    };
    let trace = propagate_scenario(&mut model, &Scenario::Nominal, &RunOptions::default(), &config).unwrap();
    assert_eq!(trace.diagnostics.len(), 4);
    assert!(trace.diagnostics.iter().all(|d| d.rounds == 40));
    assert_eq!(trace.diagnostics[0].time, 0);
}
