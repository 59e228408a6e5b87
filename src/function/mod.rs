//! Function blocks: stateful nodes with fault modes and update hooks.
//!
//! The engine only ever talks to the [`FunctionBlock`] capability trait. The
//! trait object holds behavior, not state: everything that changes during a
//! run (state record, active faults, flow values) lives in the [`Function`]
//! and its model, so copying a model never aliases mutable data.

mod context;

pub use context::BlockContext;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fault::{FaultCatalog, FaultMode, FaultSet};
use crate::flow::{Flow, FlowId};
use crate::model::Time;
use crate::record::{FieldError, Record};
use crate::value::Value;

/// Result of a block hook.
pub type BlockResult = Result<(), FieldError>;

/// Capability interface implemented by every concrete function-block variant.
///
/// `conditional_faults` runs first on every update and may activate catalog
/// fault modes based on the current state; `behavior` then computes the new
/// internal state and writes output flows.
///
/// # Examples
///
/// ```
/// use faultprop::{BlockContext, BlockResult, FunctionBlock};
///
/// #[derive(Debug)]
/// struct SupplyPower;
///
/// impl FunctionBlock for SupplyPower {
///     fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
///         let effort = if ctx.has_fault("short") { 10.0 } else { 1.0 };
///         ctx.write("out", "effort", effort)?;
///         Ok(())
///     }
/// }
/// ```
pub trait FunctionBlock: Send + Sync {
    /// Self-injects faults from the current state. Defaults to doing nothing.
    fn conditional_faults(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        let _ = ctx;
        Ok(())
    }

    /// Computes new internal state and flow outputs.
    fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult;
}

impl<F> FunctionBlock for F
where
    F: Fn(&mut BlockContext<'_>) -> BlockResult + Send + Sync,
{
    fn behavior(&self, ctx: &mut BlockContext<'_>) -> BlockResult {
        self(ctx)
    }
}

/// Index of a function within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(pub(crate) usize);

impl FunctionId {
    /// Position of the function in model declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fxn#{}", self.0)
    }
}

/// Author-facing declaration of a function block, resolved by
/// [`crate::ModelBuilder::build`].
#[derive(Clone)]
pub struct FunctionSpec {
    pub(crate) name: String,
    pub(crate) block: Arc<dyn FunctionBlock>,
    pub(crate) ports: Vec<(String, String)>,
    pub(crate) state: Record,
    pub(crate) modes: FaultCatalog,
    pub(crate) timely: bool,
}

impl FunctionSpec {
    /// Starts a declaration for a function driven by `block`.
    pub fn new(name: impl Into<String>, block: impl FunctionBlock + 'static) -> Self {
        Self {
            name: name.into(),
            block: Arc::new(block),
            ports: Vec::new(),
            state: Record::new(),
            modes: FaultCatalog::new(),
            timely: false,
        }
    }

    /// Declares a function whose behavior is a plain closure.
    pub fn from_fn<F>(name: impl Into<String>, behavior: F) -> Self
    where
        F: Fn(&mut BlockContext<'_>) -> BlockResult + Send + Sync + 'static,
    {
        Self::new(name, behavior)
    }

    /// Connects local port name `port` to the model flow named `flow`.
    #[must_use]
    pub fn port(mut self, port: impl Into<String>, flow: impl Into<String>) -> Self {
        self.ports.push((port.into(), flow.into()));
        self
    }

    /// Declares an internal state field with its initial value.
    #[must_use]
    pub fn state(mut self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.state = self.state.with(name, initial);
        self
    }

    /// Declares a fault mode with its occurrence rate and repair cost.
    #[must_use]
    pub fn mode(mut self, name: impl Into<String>, rate: f64, repair_cost: f64) -> Self {
        self.modes.insert(name.into(), FaultMode::new(rate, repair_cost));
        self
    }

    /// Marks the block as time-dependent: it is evaluated on every tick
    /// regardless of upstream change.
    #[must_use]
    pub fn timely(mut self) -> Self {
        self.timely = true;
        self
    }
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("ports", &self.ports)
            .field("state", &self.state)
            .field("modes", &self.modes)
            .field("timely", &self.timely)
            .finish_non_exhaustive()
    }
}

/// A function block instance inside a model.
#[derive(Clone)]
pub struct Function {
    name: String,
    block: Arc<dyn FunctionBlock>,
    catalog: Arc<FaultCatalog>,
    ports: Arc<BTreeMap<String, FlowId>>,
    state: Record,
    initial_state: Record,
    faults: FaultSet,
    timely: bool,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("faults", &self.faults)
            .field("timely", &self.timely)
            .finish_non_exhaustive()
    }
}

impl Function {
    pub(crate) fn new(
        name: String,
        block: Arc<dyn FunctionBlock>,
        catalog: FaultCatalog,
        ports: BTreeMap<String, FlowId>,
        state: Record,
        timely: bool,
    ) -> Self {
        Self {
            name,
            block,
            catalog: Arc::new(catalog),
            ports: Arc::new(ports),
            initial_state: state.clone(),
            state,
            faults: FaultSet::nominal(),
            timely,
        }
    }

    /// Function name, unique within its model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Internal state as of the last update.
    pub fn current_state(&self) -> &Record {
        &self.state
    }

    /// Non-nominal fault modes currently active.
    pub fn active_faults(&self) -> &FaultSet {
        &self.faults
    }

    /// Declared fault modes.
    pub fn catalog(&self) -> &FaultCatalog {
        &self.catalog
    }

    /// Looks up one declared fault mode.
    pub fn fault_mode(&self, mode: &str) -> Option<&FaultMode> {
        self.catalog.get(mode)
    }

    /// Port name to flow mapping.
    pub fn ports(&self) -> &BTreeMap<String, FlowId> {
        &self.ports
    }

    /// Whether the function is evaluated on every tick.
    pub const fn is_timely(&self) -> bool {
        self.timely
    }

    /// Runs one update: inserts `injected` (if any) into the active set, then
    /// the conditional-fault hook, then the behavior hook.
    pub(crate) fn update(&mut self, flows: &mut [Flow], injected: Option<&str>, time: Time) -> BlockResult {
        if let Some(mode) = injected {
            self.faults.insert(mode);
        }
        let mut ctx = BlockContext {
            time,
            function: &self.name,
            state: &mut self.state,
            faults: &mut self.faults,
            catalog: &self.catalog,
            ports: &self.ports,
            flows,
        };
        self.block.conditional_faults(&mut ctx)?;
        self.block.behavior(&mut ctx)
    }

    pub(crate) fn reset(&mut self) {
        self.state.clone_from(&self.initial_state);
        self.faults.clear();
    }
}
