use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use faultprop::{
    advance, enumerate_single_fault_scenarios, BatchOptions, BlockContext, BlockResult, FunctionSpec, Injection,
    Model, PropagationConfig, Record, Simulator, Timeline,
};

fn source(ctx: &mut BlockContext<'_>) -> BlockResult {
    let rate = if ctx.has_fault("short") { 10.0 } else { 1.0 };
    ctx.write("out", "rate", rate)?;
    Ok(())
}

fn relay(ctx: &mut BlockContext<'_>) -> BlockResult {
    let rate = ctx.read("in", "rate")?;
    let gain = if ctx.has_fault("stuck") { 0.0 } else { 1.0 };
    ctx.state_mut().set("seen", rate)?;
    ctx.write("out", "rate", rate * gain)?;
    Ok(())
}

/// Source followed by `len` relays, every relay with one fault mode.
fn chain(len: usize, end: u64) -> Model {
    let mut builder = Model::builder("chain").timeline(Timeline::new(0, end, 1).unwrap());
    for i in 0..=len {
        builder = builder.flow(format!("F{i}"), Record::new().with("rate", 1.0));
    }
    builder = builder.function(FunctionSpec::from_fn("Src", source).port("out", "F0").mode("short", 1e-5, 10.0));
    for i in 0..len {
        builder = builder.function(
            FunctionSpec::from_fn(format!("R{i}"), relay)
                .port("in", format!("F{i}"))
                .port("out", format!("F{}", i + 1))
                .state("seen", 1.0)
                .mode("stuck", 1e-4, 5.0),
        );
    }
    builder.build().unwrap()
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/advance");
    for len in [8usize, 64, 256] {
        let model = chain(len, 1);
        let injection = Injection::resolve(&model, "Src", "short").unwrap();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_function(format!("chain_{len}"), |b| {
            b.iter_batched(
                || model.checkpoint(),
                |mut m| advance(&mut m, std::slice::from_ref(&injection), 0, None, &PropagationConfig::default()).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let sim = Simulator::new(chain(16, 20));
    let scenarios = enumerate_single_fault_scenarios(sim.model()).len();
    let mut group = c.benchmark_group("propagation/run_list");
    group.throughput(Throughput::Elements(scenarios as u64));
    group.sample_size(10);
    for (name, options) in [
        ("fresh", BatchOptions::default()),
        (
            "staged",
            BatchOptions {
                staged: true,
                ..BatchOptions::default()
            },
        ),
    ] {
        group.bench_function(name, |b| b.iter(|| sim.run_list(&options).unwrap()));
    }
    group.bench_function("parallel_fresh", |b| {
        b.iter(|| sim.run_list_parallel(&BatchOptions::default()).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_advance, bench_batch);
criterion_main!(benches);
