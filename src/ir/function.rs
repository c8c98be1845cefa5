// Function Container
//
// A named graph with designated boundary nodes: ordered `Parameter`
// inputs and ordered `Result` outputs. Functions are what backends compile
// and what `Call` nodes invoke.

use crate::core::error::{GraphError, Result};
use crate::ir::graph::Graph;
use crate::ir::node::{NodeId, OpKind};
use crate::ir::tensor::TensorDescriptor;

#[derive(Debug)]
pub struct Function {
    name: String,
    graph: Graph,
    parameters: Vec<NodeId>,
    results: Vec<NodeId>,
}

impl Function {
    /// Wrap `graph` with its boundary.
    ///
    /// Every parameter must be a `Parameter` node and every result a
    /// `Result` node of `graph`.
    pub fn new(
        name: impl Into<String>,
        graph: Graph,
        parameters: Vec<NodeId>,
        results: Vec<NodeId>,
    ) -> Result<Self> {
        let name = name.into();

        for &id in &parameters {
            let kind = graph.node(id)?.kind();
            if kind != OpKind::Parameter {
                return Err(GraphError::InvalidFunction(format!(
                    "{}: parameter {} is a {} node",
                    name, id, kind
                )));
            }
        }
        for &id in &results {
            let kind = graph.node(id)?.kind();
            if kind != OpKind::Result {
                return Err(GraphError::InvalidFunction(format!(
                    "{}: result {} is a {} node",
                    name, id, kind
                )));
            }
        }

        Ok(Self {
            name,
            graph,
            parameters,
            results,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// All nodes in execution order
    pub fn ordered_ops(&self) -> Result<Vec<NodeId>> {
        self.graph.topological_order()
    }

    /// Declared descriptors of the parameters, in parameter order
    pub fn parameter_descriptors(&self) -> Result<Vec<TensorDescriptor>> {
        self.parameters
            .iter()
            .map(|&id| self.graph.node(id)?.output_descriptor(0).cloned())
            .collect()
    }

    /// Descriptors of the results, in result order
    pub fn output_descriptors(&self) -> Result<Vec<TensorDescriptor>> {
        self.results
            .iter()
            .map(|&id| self.graph.node(id)?.output_descriptor(0).cloned())
            .collect()
    }

    /// Every output of every node has a known element type and shape
    pub fn is_static(&self) -> bool {
        self.graph.nodes().iter().all(|node| {
            (0..node.output_size()).all(|index| {
                node.output_descriptor(index)
                    .map(TensorDescriptor::is_static)
                    .unwrap_or(false)
            })
        })
    }
}
