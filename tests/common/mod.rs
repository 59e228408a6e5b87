//! Shared model fixtures for the integration tests.
#![allow(dead_code)]

use faultprop::{BlockContext, BlockResult, FunctionBlock, FunctionSpec, Model, Record, Timeline};

/// `A -> F -> B`: A drives `F.rate` (1.0 nominal, 10.0 when shorted), B
/// copies it into its `received` state.
pub fn two_function_model() -> Model {
    fn produce(ctx: &mut BlockContext<'_>) -> BlockResult {
        let rate = if ctx.has_fault("short") { 10.0 } else { 1.0 };
        ctx.write("out", "rate", rate)?;
        Ok(())
    }

    fn consume(ctx: &mut BlockContext<'_>) -> BlockResult {
        let rate = ctx.read("in", "rate")?;
        ctx.state_mut().set("received", rate)?;
        Ok(())
    }

    Model::builder("two_function")
        .flow("F", Record::new().with("rate", 1.0))
        .function(
            FunctionSpec::from_fn("A", produce)
                .port("out", "F")
                .mode("short", 1e-5, 100.0),
        )
        .function(FunctionSpec::from_fn("B", consume).port("in", "F").state("received", 1.0))
        .timeline(Timeline::new(0, 20, 1).unwrap())
        .build()
        .unwrap()
}

struct ImportEe;

impl FunctionBlock for ImportEe {
    fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        let effort = if ctx.has_fault("no_v") {
            0.0
        } else if ctx.has_fault("inf_v") {
            100.0
        } else {
            1.0
        };
        ctx.write("out", "effort", effort)?;
        Ok(())
    }
}

struct ImportWater;

impl FunctionBlock for ImportWater {
    fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        let effort = if ctx.has_fault("no_wat") { 0.0 } else { 1.0 };
        ctx.write("out", "effort", effort)?;
        Ok(())
    }
}

/// Wears by the supplied electrical effort once per tick; overvoltage shorts
/// it and accumulated wear breaks it.
struct MoveWater;

impl FunctionBlock for MoveWater {
    fn conditional_faults(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        if ctx.read("ee", "effort")? > 2.0 {
            ctx.add_fault("short")?;
        }
        if ctx.state().float("wear")? >= 100.0 {
            ctx.add_fault("mech_break")?;
        }
        Ok(())
    }

    fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        let power = ctx.read("ee", "effort")?;
        let now = i64::try_from(ctx.time()).unwrap_or(i64::MAX);
        if ctx.state().int("tick")? != now {
            let wear = ctx.state().float("wear")? + power;
            ctx.state_mut().set("wear", wear)?;
            ctx.state_mut().set("tick", now)?;
        }

        let eff = if ctx.has_any_fault(["short", "mech_break"]) { 0.0 } else { 1.0 };
        ctx.state_mut().set("eff", eff)?;
        let supply = ctx.read("wat_in", "effort")?;
        ctx.write("wat_out", "rate", supply * eff * power.min(1.0))?;

        let pressure = ctx.read("wat_out", "effort")?;
        ctx.state_mut().set("overpressure", pressure > 5.0)?;
        Ok(())
    }
}

/// Pushes back on the pump through `Wat_2.effort`.
struct ExportWater;

impl FunctionBlock for ExportWater {
    fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        let rate = ctx.read("in", "rate")?;
        let pressure = if ctx.has_fault("block") { 10.0 } else { rate };
        ctx.write("in", "effort", pressure)?;
        Ok(())
    }
}

/// Four-function pump with a pressure feedback loop, a time-dependent block
/// and conditional faults. Faults are injected at ticks 0, 5, 15 and 30.
pub fn pump_model() -> Model {
    let water = || Record::new().with("rate", 1.0).with("effort", 1.0);
    Model::builder("pump")
        .flow("EE", Record::new().with("effort", 1.0))
        .flow("Wat_1", water())
        .flow("Wat_2", water())
        .function(
            FunctionSpec::new("ImportEE", ImportEe)
                .port("out", "EE")
                .mode("no_v", 1e-5, 100.0)
                .mode("inf_v", 5e-6, 200.0),
        )
        .function(
            FunctionSpec::new("ImportWater", ImportWater)
                .port("out", "Wat_1")
                .mode("no_wat", 1e-5, 50.0),
        )
        .function(
            FunctionSpec::new("MoveWater", MoveWater)
                .port("ee", "EE")
                .port("wat_in", "Wat_1")
                .port("wat_out", "Wat_2")
                .state("eff", 1.0)
                .state("wear", 0.0)
                .state("tick", -1)
                .state("overpressure", false)
                .mode("mech_break", 1e-4, 500.0)
                .mode("short", 1e-5, 200.0)
                .timely(),
        )
        .function(
            FunctionSpec::new("ExportWater", ExportWater)
                .port("in", "Wat_2")
                .mode("block", 1e-5, 10.0),
        )
        .timeline(
            Timeline::new(0, 30, 1)
                .unwrap()
                .with_injection_times([0, 5, 15, 30])
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// P inverts `A.x` into `B.x` every tick, Q copies `B.x` back into `A.x`;
/// the loop never settles.
pub fn oscillating_model() -> Model {
    fn flip(ctx: &mut BlockContext<'_>) -> BlockResult {
        let x = ctx.read("in", "x")?;
        ctx.write("out", "x", 1.0 - x)?;
        Ok(())
    }

    fn relay(ctx: &mut BlockContext<'_>) -> BlockResult {
        let x = ctx.read("in", "x")?;
        ctx.write("out", "x", x)?;
        Ok(())
    }

    Model::builder("oscillator")
        .flow("A", Record::new().with("x", 0.0))
        .flow("B", Record::new().with("x", 0.0))
        .function(
            FunctionSpec::from_fn("P", flip)
                .port("in", "A")
                .port("out", "B")
                .mode("stuck", 1e-3, 1.0)
                .timely(),
        )
        .function(FunctionSpec::from_fn("Q", relay).port("in", "B").port("out", "A"))
        .timeline(Timeline::new(0, 3, 1).unwrap())
        .build()
        .unwrap()
}
