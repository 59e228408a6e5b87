//! The model aggregate: flows, function blocks, adjacency and timeline.
//!
//! A [`Model`] is the unit of checkpointing. Everything that changes during a
//! run is owned by the model itself, while the immutable parts (adjacency,
//! behaviors, catalogs, name tables) are shared behind `Arc`s, so
//! [`Model::checkpoint`] is a deep copy in every observable sense.

mod adjacency;
mod snapshot;
mod timeline;
pub(crate) mod validation;

pub use adjacency::Adjacency;
pub use snapshot::{FunctionSnapshot, ModelSnapshot};
pub use timeline::{Time, Timeline};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{ExecutionError, ValidationError};
use crate::fault::{FaultSet, NOMINAL};
use crate::flow::{Flow, FlowId};
use crate::function::{Function, FunctionId, FunctionSpec};
use crate::propagation::FlowSnapshot;
use crate::record::Record;
use crate::results::{Classifier, ExpectedCostClassifier};

use validation::validate_name;

/// A function/flow network with its timeline.
#[derive(Clone)]
pub struct Model {
    name: String,
    flows: Vec<Flow>,
    functions: Vec<Function>,
    flow_ids: Arc<BTreeMap<String, FlowId>>,
    function_ids: Arc<BTreeMap<String, FunctionId>>,
    adjacency: Arc<Adjacency>,
    timely: Arc<BTreeSet<FunctionId>>,
    timeline: Timeline,
    classifier: Arc<dyn Classifier>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("flows", &self.flows)
            .field("functions", &self.functions)
            .field("timeline", &self.timeline)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Starts a model declaration.
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tick grid and injection points.
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Function/flow connections.
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Flows in declaration order, indexed by [`FlowId`].
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Functions in declaration order, indexed by [`FunctionId`].
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// The flow with `id`.
    ///
    /// # Panics
    ///
    /// If `id` was issued by a different model.
    pub fn flow(&self, id: FlowId) -> &Flow {
        &self.flows[id.0]
    }

    /// The function with `id`.
    ///
    /// # Panics
    ///
    /// If `id` was issued by a different model.
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    /// Resolves a flow name.
    pub fn flow_id(&self, name: &str) -> Option<FlowId> {
        self.flow_ids.get(name).copied()
    }

    /// Resolves a function name.
    pub fn function_id(&self, name: &str) -> Option<FunctionId> {
        self.function_ids.get(name).copied()
    }

    pub fn flow_by_name(&self, name: &str) -> Option<&Flow> {
        self.flow_id(name).map(|id| self.flow(id))
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.function_id(name).map(|id| self.function(id))
    }

    /// Functions evaluated on every tick regardless of upstream change.
    pub fn timely_functions(&self) -> &BTreeSet<FunctionId> {
        &self.timely
    }

    pub(crate) fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Returns an independent deep copy of the model.
    ///
    /// No mutable state is shared: advancing or resetting either copy is never
    /// observable in the other.
    #[must_use]
    pub fn checkpoint(&self) -> Self {
        self.clone()
    }

    /// Restores every flow and function to its post-construction values and
    /// clears all injected faults.
    pub fn reset(&mut self) {
        for flow in &mut self.flows {
            flow.reset();
        }
        for function in &mut self.functions {
            function.reset();
        }
    }

    /// Current attribute values of every flow, indexed by [`FlowId`].
    pub fn flow_snapshot(&self) -> FlowSnapshot {
        FlowSnapshot::capture(&self.flows)
    }

    /// Copies every observable value of the model.
    pub fn snapshot(&self, time: Time) -> ModelSnapshot {
        ModelSnapshot {
            time,
            flows: self
                .flows
                .iter()
                .map(|f| (f.name().to_string(), f.status().clone()))
                .collect(),
            functions: self
                .functions
                .iter()
                .map(|f| {
                    (
                        f.name().to_string(),
                        FunctionSnapshot {
                            state: f.current_state().clone(),
                            faults: f.active_faults().clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Non-nominal fault sets by function name.
    pub fn fault_modes(&self) -> BTreeMap<String, FaultSet> {
        self.functions
            .iter()
            .filter(|f| !f.active_faults().is_nominal())
            .map(|f| (f.name().to_string(), f.active_faults().clone()))
            .collect()
    }

    /// Total number of declared fault modes across all functions.
    pub fn fault_mode_count(&self) -> usize {
        self.functions.iter().map(|f| f.catalog().len()).sum()
    }

    pub(crate) fn update_function(
        &mut self,
        id: FunctionId,
        injected: Option<&str>,
        time: Time,
    ) -> Result<(), ExecutionError> {
        let Self { functions, flows, .. } = self;
        let function = &mut functions[id.0];
        function
            .update(flows, injected, time)
            .map_err(|e| ExecutionError::Behavior {
                function: function.name().to_string(),
                time,
                message: e.to_string(),
            })
    }
}

/// Declarative builder for a [`Model`].
///
/// All names, ports, fault modes and the timeline are validated in
/// [`ModelBuilder::build`]; nothing is checked again during simulation.
pub struct ModelBuilder {
    name: String,
    flows: Vec<(String, Record)>,
    functions: Vec<FunctionSpec>,
    timeline: Option<Timeline>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl ModelBuilder {
    /// Creates an empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flows: Vec::new(),
            functions: Vec::new(),
            timeline: None,
            classifier: None,
        }
    }

    /// Declares a flow with its attributes and their initial values.
    #[must_use]
    pub fn flow(mut self, name: impl Into<String>, attributes: Record) -> Self {
        self.flows.push((name.into(), attributes));
        self
    }

    /// Declares a function block.
    #[must_use]
    pub fn function(mut self, spec: FunctionSpec) -> Self {
        self.functions.push(spec);
        self
    }

    /// Sets the tick grid. Required.
    #[must_use]
    pub fn timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Overrides the default rate/cost classification.
    #[must_use]
    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Validates the declaration and builds the model.
    ///
    /// # Errors
    ///
    /// The first `ValidationError` found: a missing timeline, an invalid or
    /// duplicate name, a port to an unknown flow, or an invalid fault mode.
    pub fn build(self) -> Result<Model, ValidationError> {
        validate_name("model", &self.name)?;
        let timeline = self.timeline.ok_or_else(|| ValidationError::InvalidTimeline {
            reason: "no timeline declared".to_string(),
        })?;

        let mut flow_ids = BTreeMap::new();
        let mut flows = Vec::with_capacity(self.flows.len());
        for (name, attributes) in self.flows {
            validate_name("flow", &name)?;
            for attribute in attributes.names() {
                validate_name("attribute", attribute)?;
            }
            if flow_ids.contains_key(&name) {
                return Err(ValidationError::DuplicateName { kind: "flow", name });
            }
            flow_ids.insert(name.clone(), FlowId(flows.len()));
            flows.push(Flow::new(name, attributes));
        }

        let mut function_ids = BTreeMap::new();
        let mut functions = Vec::with_capacity(self.functions.len());
        let mut timely = BTreeSet::new();
        for spec in self.functions {
            validate_name("function", &spec.name)?;
            if function_ids.contains_key(&spec.name) || flow_ids.contains_key(&spec.name) {
                return Err(ValidationError::DuplicateName {
                    kind: "function",
                    name: spec.name,
                });
            }

            let mut ports = BTreeMap::new();
            for (port, flow) in spec.ports {
                validate_name("port", &port)?;
                let Some(&flow_id) = flow_ids.get(&flow) else {
                    return Err(ValidationError::UnknownPortFlow {
                        function: spec.name,
                        port,
                        flow,
                    });
                };
                if ports.insert(port.clone(), flow_id).is_some() {
                    return Err(ValidationError::DuplicateName { kind: "port", name: port });
                }
            }

            for field in spec.state.names() {
                validate_name("state", field)?;
            }

            for (mode, fault) in &spec.modes {
                validate_name("fault mode", mode)?;
                if mode == NOMINAL {
                    return Err(ValidationError::InvalidFaultMode {
                        function: spec.name,
                        mode: mode.clone(),
                        reason: format!("'{NOMINAL}' is reserved for the nominal mode"),
                    });
                }
                if !fault.rate.is_finite() || fault.rate < 0.0 {
                    return Err(ValidationError::InvalidFaultMode {
                        function: spec.name,
                        mode: mode.clone(),
                        reason: format!("rate {} must be finite and >= 0", fault.rate),
                    });
                }
                if !fault.repair_cost.is_finite() || fault.repair_cost < 0.0 {
                    return Err(ValidationError::InvalidFaultMode {
                        function: spec.name,
                        mode: mode.clone(),
                        reason: format!("repair cost {} must be finite and >= 0", fault.repair_cost),
                    });
                }
            }

            let id = FunctionId(functions.len());
            if spec.timely {
                timely.insert(id);
            }
            function_ids.insert(spec.name.clone(), id);
            functions.push(Function::new(
                spec.name,
                spec.block,
                spec.modes,
                ports,
                spec.state,
                spec.timely,
            ));
        }

        let adjacency = Adjacency::build(&functions, flows.len());

        Ok(Model {
            name: self.name,
            flows,
            functions,
            flow_ids: Arc::new(flow_ids),
            function_ids: Arc::new(function_ids),
            adjacency: Arc::new(adjacency),
            timely: Arc::new(timely),
            timeline,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(ExpectedCostClassifier)),
        })
    }
}
