//! # faultprop - fault propagation over function/flow models
//!
//! faultprop simulates how injected faults spread through a network of
//! stateful function blocks connected by shared flows, tick by tick, and
//! compares every faulty run against the nominal one.
//!
//! ## Core Concepts
//!
//! - **Flow**: a shared record of scalar attributes connecting function blocks
//! - **Function block**: a stateful subsystem with fault modes, implemented
//!   through the [`FunctionBlock`] capability trait
//! - **Model**: flows, blocks, their bipartite adjacency and a timeline; the
//!   unit of checkpointing
//! - **Scenario**: nominal, or one fault injected at one tick
//! - **Result**: flow effects, active faults and a rate/cost classification
//!
//! ## Usage
//!
//! ```rust
//! use faultprop::{
//!     BlockContext, BlockResult, FunctionSpec, Model, Record, RunOptions, Simulator, Status,
//!     Timeline,
//! };
//!
//! fn supply(ctx: &mut BlockContext<'_>) -> BlockResult {
//!     let rate = if ctx.has_fault("short") { 0.0 } else { 1.0 };
//!     ctx.write("out", "rate", rate)?;
//!     Ok(())
//! }
//!
//! fn consume(ctx: &mut BlockContext<'_>) -> BlockResult {
//!     let rate = ctx.read("in", "rate")?;
//!     ctx.state_mut().set("received", rate)?;
//!     Ok(())
//! }
//!
//! let model = Model::builder("demo")
//!     .flow("Power", Record::new().with("rate", 1.0))
//!     .function(FunctionSpec::from_fn("Supply", supply).port("out", "Power").mode("short", 1e-5, 100.0))
//!     .function(FunctionSpec::from_fn("Load", consume).port("in", "Power").state("received", 1.0))
//!     .timeline(Timeline::new(0, 20, 1)?)
//!     .build()?;
//!
//! let sim = Simulator::new(model);
//! let run = sim.run_one_fault("Supply", "short", 10, true, &RunOptions::default())?;
//! assert_eq!(run.annotated.function_status("Load"), Some(Status::Degraded));
//! # Ok::<(), faultprop::FaultPropError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod error;
pub mod fault;
pub mod flow;
pub mod function;
pub mod model;
pub mod record;
pub mod value;

// Simulation
pub mod config;
pub mod history;
pub mod propagation;
pub mod run;
pub mod scenario;

// Comparison
pub mod results;

pub use config::{BatchOptions, ConvergencePolicy, ExecutionMode, PropagationConfig, RuntimeConfig, SimulationConfig};
pub use error::{ExecutionError, FaultPropError, FaultPropResult, ValidationError};
pub use fault::{FaultCatalog, FaultMode, FaultSet, NOMINAL};
pub use flow::{Flow, FlowId};
pub use function::{BlockContext, BlockResult, Function, FunctionBlock, FunctionId, FunctionSpec};
pub use history::{History, TrackSpec};
pub use model::{Adjacency, FunctionSnapshot, Model, ModelBuilder, ModelSnapshot, Time, Timeline};
pub use propagation::{advance, FlowSnapshot, Injection, NonConvergence, StepOutcome};
pub use record::{FieldError, Record};
pub use results::{
    diff, diff_history, AnnotatedSnapshot, Classification, ClassificationInput, Classifier, EntityMetrics,
    ExpectedCostClassifier, HistoryDiff, ResultRecord, SnapshotDiff, Status,
};
pub use run::{
    propagate_scenario, resume_from_checkpoint, BatchReport, Checkpoint, FaultRun, NominalRun, RunId,
    RunOptions, RunTrace, ScenarioOutcome, Simulator,
};
pub use scenario::{enumerate_single_fault_scenarios, nominal_scenario, FaultInjection, Scenario};
pub use value::{Value, ValueKind};
