// IR Builder: Public API for composing computation graphs
//
// Provides a fluent interface for building IR graphs. Parameters and
// results are recorded in creation order so the finished graph can be
// wrapped as a `Function`.

use crate::core::error::{GraphError, Result};
use crate::ir::function::Function;
use crate::ir::graph::Graph;
use crate::ir::handles::OutputRef;
use crate::ir::node::{NodeId, Operation};
use crate::ir::options::BuildOptions;
use crate::ir::shape::{AxisSet, PartialShape};
use crate::types::ElementType;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for constructing IR graphs
pub struct GraphBuilder {
    graph: Graph,
    /// Map from user-provided names to node IDs
    named_nodes: HashMap<String, NodeId>,
    parameters: Vec<NodeId>,
    results: Vec<NodeId>,
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new() -> Self {
        Self::with_options(BuildOptions::new())
    }

    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            graph: Graph::with_options(options),
            named_nodes: HashMap::new(),
            parameters: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Add a named graph input
    pub fn parameter(
        &mut self,
        name: impl Into<String>,
        element_type: ElementType,
        shape: impl Into<PartialShape>,
    ) -> Result<NodeId> {
        let name = name.into();

        let node_id = self.graph.add_node(
            Operation::Parameter {
                element_type,
                shape: shape.into(),
            },
            &[],
        )?;

        self.graph.node_mut(node_id)?.set_friendly_name(name.clone())?;
        self.parameters.push(node_id);
        self.named_nodes.insert(name, node_id);
        Ok(node_id)
    }

    /// Mark a node's value as a graph output
    pub fn result(&mut self, node: NodeId) -> Result<NodeId> {
        let node_id = self.graph.add_node_from_nodes(Operation::Result, &[node])?;
        self.results.push(node_id);
        Ok(node_id)
    }

    // ===== Elementwise =====

    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Add, a, b)
    }

    pub fn subtract(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Subtract, a, b)
    }

    pub fn multiply(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Multiply, a, b)
    }

    pub fn divide(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Divide, a, b)
    }

    pub fn maximum(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Maximum, a, b)
    }

    pub fn minimum(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Minimum, a, b)
    }

    pub fn power(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Power, a, b)
    }

    pub fn and(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::And, a, b)
    }

    pub fn or(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Or, a, b)
    }

    pub fn xor(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.binary(Operation::Xor, a, b)
    }

    /// Element type conversion
    pub fn convert(&mut self, a: NodeId, destination_type: ElementType) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::Convert { destination_type }, &[a])
    }

    fn binary(&mut self, op: Operation, a: NodeId, b: NodeId) -> Result<NodeId> {
        self.graph.add_node_from_nodes(op, &[a, b])
    }

    // ===== Reductions =====

    pub fn all(&mut self, a: NodeId, axes: impl Into<AxisSet>) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::All { axes: axes.into() }, &[a])
    }

    pub fn any(&mut self, a: NodeId, axes: impl Into<AxisSet>) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::Any { axes: axes.into() }, &[a])
    }

    pub fn sum(&mut self, a: NodeId, axes: impl Into<AxisSet>) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::Sum { axes: axes.into() }, &[a])
    }

    pub fn product(&mut self, a: NodeId, axes: impl Into<AxisSet>) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::Product { axes: axes.into() }, &[a])
    }

    // ===== Structural =====

    /// Split into `parts` pieces along `axis`; the node has one output per piece
    pub fn split(&mut self, a: NodeId, axis: usize, parts: usize) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::Split { axis, parts }, &[a])
    }

    /// Single-output node carrying output `n` of `producer`
    pub fn get_output_element(&mut self, producer: NodeId, n: usize) -> Result<NodeId> {
        self.graph.add_node(
            Operation::GetOutputElement { n },
            &[OutputRef::new(producer, n)],
        )
    }

    /// Invoke `function` with one argument per parameter
    pub fn call(&mut self, function: Arc<Function>, args: &[NodeId]) -> Result<NodeId> {
        self.graph
            .add_node_from_nodes(Operation::Call { function }, args)
    }

    // ===== Access =====

    /// Get reference to the graph being built
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access for naming, provenance and control dependencies
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Finish building and return the graph
    pub fn build(self) -> Graph {
        self.graph
    }

    /// Finish building and wrap the graph with the recorded parameters
    /// and results
    pub fn build_function(self, name: impl Into<String>) -> Result<Function> {
        if self.results.is_empty() {
            return Err(GraphError::InvalidFunction(
                "function has no results".to_string(),
            ));
        }
        Function::new(name, self.graph, self.parameters, self.results)
    }

    /// Get node ID by parameter name
    pub fn get_by_name(&self, name: &str) -> Option<NodeId> {
        self.named_nodes.get(name).copied()
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::shape::{Dimension, Shape};

    #[test]
    fn test_builder_create() {
        let builder = GraphBuilder::new();
        assert!(builder.graph().is_empty());
    }

    #[test]
    fn test_parameter_is_named() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .parameter("A", ElementType::F64, Shape::from([10, 20]))
            .unwrap();

        assert_eq!(builder.get_by_name("A"), Some(a));
        assert_eq!(builder.graph().node(a).unwrap().friendly_name(), "A");
    }

    #[test]
    fn test_elementwise_chain() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .parameter("A", ElementType::F64, Shape::from([10, 20]))
            .unwrap();
        let b = builder
            .parameter("B", ElementType::F64, Shape::from([10, 20]))
            .unwrap();

        let c = builder.add(a, b).unwrap();
        let d = builder.multiply(c, b).unwrap();

        assert_eq!(builder.graph().len(), 4);
        assert_eq!(builder.graph().node(d).unwrap().shape().unwrap(), Shape::from([10, 20]));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .parameter("A", ElementType::F64, Shape::from([10, 20]))
            .unwrap();
        let b = builder
            .parameter("B", ElementType::F64, Shape::from([15, 30]))
            .unwrap();

        let err = builder.add(a, b).unwrap_err();
        assert!(err.to_string().contains("Argument shapes are inconsistent"));
    }

    #[test]
    fn test_build_function() {
        let mut builder = GraphBuilder::new();
        let x = builder
            .parameter("x", ElementType::F32, PartialShape::from([Dimension::Dynamic, Dimension::Static(3)]))
            .unwrap();
        let s = builder.sum(x, [1]).unwrap();
        builder.result(s).unwrap();

        let f = builder.build_function("row_sum").unwrap();
        assert_eq!(f.parameters(), &[x]);
        assert_eq!(f.results().len(), 1);
        assert!(!f.is_static());
    }

    #[test]
    fn test_build_function_without_results() {
        let mut builder = GraphBuilder::new();
        builder.parameter("x", ElementType::F32, Shape::from([1])).unwrap();
        assert!(matches!(
            builder.build_function("empty"),
            Err(GraphError::InvalidFunction(_))
        ));
    }

    #[test]
    fn test_call_nested_function() {
        let mut inner = GraphBuilder::new();
        let x = inner.parameter("x", ElementType::F32, Shape::from([4, 2])).unwrap();
        let y = inner.sum(x, [0]).unwrap();
        inner.result(y).unwrap();
        let inner = Arc::new(inner.build_function("column_sum").unwrap());

        let mut outer = GraphBuilder::new();
        let a = outer
            .parameter("a", ElementType::Dynamic, PartialShape::dynamic())
            .unwrap();
        let call = outer.call(Arc::clone(&inner), &[a]).unwrap();

        let node = outer.graph().node(call).unwrap();
        assert_eq!(node.shape().unwrap(), Shape::from([2]));
        assert_eq!(node.get_functions().len(), 1);

        let b = outer.parameter("b", ElementType::I32, Shape::from([4, 2])).unwrap();
        let err = outer.call(inner, &[b]).unwrap_err();
        assert!(err.is_validation());
    }
}
