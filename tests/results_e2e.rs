mod common;

use faultprop::{diff, enumerate_single_fault_scenarios, AnnotatedSnapshot, RunOptions, Simulator, Status, TrackSpec};

#[test]
fn diff_reports_the_same_attributes_both_ways() {
    let sim = Simulator::new(common::pump_model());
    let nominal = sim.run_nominal(&RunOptions::default()).unwrap();
    for scenario in enumerate_single_fault_scenarios(sim.model()) {
        let run = sim.run_scenario(&scenario, &RunOptions::default()).unwrap();
        let a = &run.faulty.final_snapshot;
        let b = &nominal.trace.final_snapshot;
        let ab = diff(a, b);
        let ba = diff(b, a);
        for flow in a.flows.keys() {
            assert_eq!(ab.changed_attributes(flow), ba.changed_attributes(flow), "{scenario} {flow}");
        }
        assert_eq!(ab.flow_status, ba.flow_status, "{scenario}");
    }
}

#[test]
fn annotated_snapshot_marks_the_injected_function_faulty() {
    let sim = Simulator::new(common::pump_model());
    let run = sim
        .run_one_fault("ImportWater", "no_wat", 15, true, &RunOptions::default())
        .unwrap();
    let annotated = &run.annotated;
    assert_eq!(annotated.function_status("ImportWater"), Some(Status::Faulty));
    assert_eq!(annotated.flow_status("Wat_1"), Some(Status::Degraded));
    assert_eq!(annotated.flow_status("Wat_2"), Some(Status::Degraded));
    assert_eq!(annotated.flow_status("EE"), Some(Status::Nominal));
    assert_eq!(annotated.connections.len(), 6);

    let again = AnnotatedSnapshot::compare(sim.model(), &run.faulty.final_snapshot, &run.nominal.final_snapshot);
    assert_eq!(&again, annotated);
}

#[test]
fn history_metrics_count_degraded_ticks() {
    let sim = Simulator::new(common::two_function_model());
    let options = RunOptions::default().track(TrackSpec::All);
    let run = sim.run_one_fault("A", "short", 10, true, &options).unwrap();
    let metrics = &run.history_diff;
    // ticks 10..=20
    assert_eq!(metrics.flow_metrics["F"].degraded_ticks, 11);
    assert_eq!(metrics.function_metrics["B"].degraded_ticks, 11);
    assert_eq!(metrics.function_metrics["A"].max_faults, 1);
    // |10 - 1| per unit tick
    assert!((metrics.flow_metrics["F"].integrated_deviation - 99.0).abs() < 1e-9);
    assert_eq!(metrics.max_concurrent_faults, 1);
}

#[test]
fn untracked_runs_still_compare() {
    let sim = Simulator::new(common::two_function_model());
    let run = sim.run_one_fault("A", "short", 4, false, &RunOptions::default()).unwrap();
    assert!(run.history_diff.flow_status.is_empty());
    assert_eq!(run.history_diff.times.len(), 21);
    assert_eq!(run.result.flows["F"].len(), 1);
}
