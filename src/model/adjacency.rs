//! Bipartite function/flow adjacency.

use std::collections::BTreeSet;

use crate::flow::FlowId;
use crate::function::{Function, FunctionId};

/// Static mapping between function blocks and the flows they are ported to.
///
/// Built once when the model is constructed and never mutated afterwards;
/// model copies share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    flow_functions: Vec<BTreeSet<FunctionId>>,
    function_flows: Vec<BTreeSet<FlowId>>,
}

impl Adjacency {
    pub(crate) fn build(functions: &[Function], flow_count: usize) -> Self {
        let mut flow_functions = vec![BTreeSet::new(); flow_count];
        let mut function_flows = Vec::with_capacity(functions.len());
        for (idx, function) in functions.iter().enumerate() {
            let flows: BTreeSet<FlowId> = function.ports().values().copied().collect();
            for flow in &flows {
                flow_functions[flow.0].insert(FunctionId(idx));
            }
            function_flows.push(flows);
        }
        Self {
            flow_functions,
            function_flows,
        }
    }

    /// Functions that must be re-evaluated when `flow` changes.
    pub fn functions_of(&self, flow: FlowId) -> &BTreeSet<FunctionId> {
        &self.flow_functions[flow.0]
    }

    /// Flows a function is connected to.
    pub fn flows_of(&self, function: FunctionId) -> &BTreeSet<FlowId> {
        &self.function_flows[function.0]
    }

    /// Every function/flow connection, ordered by function then flow.
    pub fn edges(&self) -> impl Iterator<Item = (FunctionId, FlowId)> + '_ {
        self.function_flows
            .iter()
            .enumerate()
            .flat_map(|(idx, flows)| flows.iter().map(move |flow| (FunctionId(idx), *flow)))
    }

    /// Flows with no connected function.
    pub fn dangling_flows(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.flow_functions
            .iter()
            .enumerate()
            .filter(|(_, fxns)| fxns.is_empty())
            .map(|(idx, _)| FlowId(idx))
    }
}
