mod common;

use faultprop::{
    enumerate_single_fault_scenarios, propagate_scenario, resume_from_checkpoint, Checkpoint, PropagationConfig,
    RunOptions, Scenario, Simulator, TrackSpec,
};

#[test]
fn staged_runs_equal_full_runs_for_every_scenario() {
    let template = common::pump_model();
    let config = PropagationConfig::default();
    let options = RunOptions::default().track(TrackSpec::All).snapshot_at([0, 10, 20, 30]);
    let scenarios = enumerate_single_fault_scenarios(&template);
    let injection_times = template.timeline().injection_points();

    let mut nominal_model = template.checkpoint();
    let nominal = propagate_scenario(
        &mut nominal_model,
        &Scenario::Nominal,
        &options.clone().checkpoint_at(injection_times),
        &config,
    )
    .unwrap();

    for scenario in &scenarios {
        let mut full_model = template.checkpoint();
        let full = propagate_scenario(&mut full_model, scenario, &options, &config).unwrap();

        let time = scenario.injection_time().unwrap();
        let checkpoint = nominal.checkpoints[&time].clone();
        let (_, staged) = resume_from_checkpoint(checkpoint, scenario, &options, Some(&nominal), &config).unwrap();

        assert_eq!(staged.history, full.history, "{scenario}");
        assert_eq!(staged.snapshots, full.snapshots, "{scenario}");
        assert_eq!(staged.final_snapshot, full.final_snapshot, "{scenario}");
        assert_eq!(
            staged.final_snapshot.fingerprint(),
            full.final_snapshot.fingerprint(),
            "{scenario}"
        );
    }
}

#[test]
fn staged_run_without_nominal_covers_only_the_tail() {
    let template = common::pump_model();
    let config = PropagationConfig::default();
    let options = RunOptions::default().track(TrackSpec::All);
    let checkpoint = Checkpoint::capture(&template, 0);
    let mut model = template.checkpoint();
    let nominal = propagate_scenario(&mut model, &Scenario::Nominal, &options.clone().checkpoint_at([15]), &config).unwrap();
    assert_eq!(checkpoint.entry_time(), 0);

    let scenario = Scenario::single_fault(&template, "ImportWater", "no_wat", 15).unwrap();
    let (_, tail) =
        resume_from_checkpoint(nominal.checkpoints[&15].clone(), &scenario, &options, None, &config).unwrap();
    assert_eq!(tail.history.times().first(), Some(&15));
    assert_eq!(tail.history.len(), 16);
}

#[test]
fn checkpoints_are_isolated_from_each_other() {
    let template = common::pump_model();
    let config = PropagationConfig::default();
    let mut model = template.checkpoint();
    let nominal = propagate_scenario(
        &mut model,
        &Scenario::Nominal,
        &RunOptions::default().checkpoint_at([5]),
        &config,
    )
    .unwrap();

    let before = nominal.checkpoints[&5].model().snapshot(5);
    let scenario = Scenario::single_fault(&template, "ImportEE", "inf_v", 5).unwrap();
    let (mut advanced, _) = resume_from_checkpoint(
        nominal.checkpoints[&5].clone(),
        &scenario,
        &RunOptions::default(),
        None,
        &config,
    )
    .unwrap();
    assert_eq!(nominal.checkpoints[&5].model().snapshot(5), before);
    assert_ne!(advanced.snapshot(5), before);

    advanced.reset();
    assert_eq!(advanced.snapshot(0), template.snapshot(0));
    assert_eq!(model.snapshot(30).functions["MoveWater"].faults.len(), 0);
}

#[test]
fn simulator_staged_and_full_agree() {
    let sim = Simulator::new(common::pump_model());
    let options = RunOptions::default().track(TrackSpec::All).snapshot_at([3, 15, 22]);
    for (function, mode, time) in [("MoveWater", "short", 0), ("ExportWater", "block", 15), ("ImportEE", "no_v", 30)] {
        let full = sim.run_one_fault(function, mode, time, false, &options).unwrap();
        let staged = sim.run_one_fault(function, mode, time, true, &options).unwrap();
        assert_eq!(full.result, staged.result);
        assert_eq!(full.history_diff, staged.history_diff);
        assert_eq!(full.annotated_history, staged.annotated_history);
        assert_eq!(full.annotated_history.len(), 3);
    }
}
