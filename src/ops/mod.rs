// Inference Rules
//
// Shape/type inference for every operation, grouped by family so each
// rule is written once and shared by all members of the family:
// - elementwise: binary arithmetic, binary logical, element conversion
// - reduction: logical and arithmetic reductions over an axis set
// - structural: graph boundary, split, output selection, nested calls
//
// Every family defers the same way: element-type checks wait until the
// input type is known, axis checks wait until the input rank is known, and
// an unknown input rank yields an unknown output rank.

pub mod elementwise;
pub mod reduction;
pub mod structural;

use crate::core::error::{GraphError, NodeValidationFailure, Result};
use crate::ir::graph::Graph;
use crate::ir::handles::OutputRef;
use crate::ir::node::{Node, NodeId, Operation};
use crate::ir::shape::PartialShape;
use crate::ir::tensor::TensorDescriptor;
use crate::types::ElementType;

/// Read-only view of one node and its inputs while its rule runs
pub struct InferenceContext<'g> {
    graph: &'g Graph,
    node: &'g Node,
}

impl<'g> InferenceContext<'g> {
    pub fn new(graph: &'g Graph, id: NodeId) -> Result<Self> {
        Ok(Self {
            graph,
            node: graph.node(id)?,
        })
    }

    pub fn node(&self) -> &'g Node {
        self.node
    }

    pub fn input_count(&self) -> usize {
        self.node.input_size()
    }

    pub fn input_source(&self, index: usize) -> Result<OutputRef> {
        self.node.input_source_output(index)
    }

    pub fn input_descriptor(&self, index: usize) -> Result<&'g TensorDescriptor> {
        self.graph.input_descriptor(self.node.id(), index)
    }

    pub fn input_element_type(&self, index: usize) -> Result<ElementType> {
        self.input_descriptor(index).map(TensorDescriptor::element_type)
    }

    pub fn input_partial_shape(&self, index: usize) -> Result<&'g PartialShape> {
        self.input_descriptor(index).map(TensorDescriptor::partial_shape)
    }

    /// Validation failure attributed to this node
    pub fn failure(&self, explanation: impl Into<String>) -> GraphError {
        let description = self
            .graph
            .describe_node(self.node.id(), false)
            .unwrap_or_else(|_| self.node.name().to_string());
        NodeValidationFailure::new(description, explanation).into()
    }

    /// Fail with the explanation unless `condition` holds
    pub fn check(&self, condition: bool, explanation: impl FnOnce() -> String) -> Result<()> {
        if condition {
            Ok(())
        } else {
            Err(self.failure(explanation()))
        }
    }
}

/// Compute the output descriptors of `id` from its current inputs.
///
/// Pure function of graph state: running it twice without an edge change
/// in between yields identical descriptors.
pub fn infer(graph: &Graph, id: NodeId) -> Result<Vec<TensorDescriptor>> {
    let ctx = InferenceContext::new(graph, id)?;

    match ctx.node().op() {
        Operation::Parameter {
            element_type,
            shape,
        } => Ok(vec![structural::infer_parameter(*element_type, shape)]),
        Operation::Result => structural::infer_result(&ctx).map(|d| vec![d]),
        Operation::Add
        | Operation::Subtract
        | Operation::Multiply
        | Operation::Divide
        | Operation::Maximum
        | Operation::Minimum
        | Operation::Power => elementwise::infer_binary_arithmetic(&ctx).map(|d| vec![d]),
        Operation::And | Operation::Or | Operation::Xor => {
            elementwise::infer_binary_logical(&ctx).map(|d| vec![d])
        }
        Operation::Convert { destination_type } => {
            elementwise::infer_convert(&ctx, *destination_type).map(|d| vec![d])
        }
        Operation::All { axes } | Operation::Any { axes } => {
            reduction::infer_logical_reduction(&ctx, axes).map(|d| vec![d])
        }
        Operation::Sum { axes } | Operation::Product { axes } => {
            reduction::infer_arithmetic_reduction(&ctx, axes).map(|d| vec![d])
        }
        Operation::Split { axis, parts } => structural::infer_split(&ctx, *axis, *parts),
        Operation::GetOutputElement { n } => {
            structural::infer_get_output_element(&ctx, *n).map(|d| vec![d])
        }
        Operation::Call { function } => structural::infer_call(&ctx, function),
    }
}
