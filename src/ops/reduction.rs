// Reduction Inference
//
// A reduction collapses every axis in its axis set. The output shape is
// the input shape with the reduced positions removed; the remaining
// dimensions keep their relative order and their static/dynamic state.
//
// Logical reductions (`All`, `Any`) require a boolean input and always
// produce boolean. Arithmetic reductions (`Sum`, `Product`) reject boolean
// input and keep the input's element type.

use crate::core::error::Result;
use crate::ir::shape::{AxisSet, PartialShape};
use crate::ir::tensor::TensorDescriptor;
use crate::ops::InferenceContext;
use crate::types::ElementType;

/// Output shape of reducing `input` over `axes`.
///
/// An unknown input rank yields an unknown output rank and no axis is
/// checked. With a known rank, axes are checked in ascending order and the
/// first one out of range is reported.
pub fn reduce_shape(ctx: &InferenceContext, input: &PartialShape, axes: &AxisSet) -> Result<PartialShape> {
    let Some(dims) = input.dims() else {
        return Ok(PartialShape::dynamic());
    };

    for axis in axes.iter() {
        ctx.check(axis < dims.len(), || {
            format!(
                "Reduction axis ({}) is out of bounds (argument shape: {}, reduction axes: {}).",
                axis, input, axes
            )
        })?;
    }

    Ok(dims
        .iter()
        .enumerate()
        .filter(|(position, _)| !axes.contains(*position))
        .map(|(_, dim)| *dim)
        .collect())
}

/// Shared rule of `All` and `Any`
pub fn infer_logical_reduction(ctx: &InferenceContext, axes: &AxisSet) -> Result<TensorDescriptor> {
    let input = ctx.input_descriptor(0)?;
    let element_type = input.element_type();

    ctx.check(
        element_type.is_dynamic() || element_type == ElementType::Boolean,
        || "Input element type must be boolean.".to_string(),
    )?;

    let shape = reduce_shape(ctx, input.partial_shape(), axes)?;
    Ok(TensorDescriptor::new(ElementType::Boolean, shape))
}

/// Shared rule of `Sum` and `Product`
pub fn infer_arithmetic_reduction(ctx: &InferenceContext, axes: &AxisSet) -> Result<TensorDescriptor> {
    let input = ctx.input_descriptor(0)?;
    let element_type = input.element_type();

    ctx.check(element_type != ElementType::Boolean, || {
        "Input element type cannot be boolean.".to_string()
    })?;

    let shape = reduce_shape(ctx, input.partial_shape(), axes)?;
    Ok(TensorDescriptor::new(element_type, shape))
}

#[cfg(test)]
mod tests {
    use crate::ir::graph::Graph;
    use crate::ir::node::{NodeId, Operation};
    use crate::ir::shape::{AxisSet, Dimension, PartialShape, Shape};
    use crate::types::ElementType;

    fn reduce(element_type: ElementType, shape: PartialShape, op: Operation) -> crate::core::error::Result<(Graph, NodeId)> {
        let mut graph = Graph::new();
        let arg = graph.add_node(Operation::Parameter { element_type, shape }, &[])?;
        let id = graph.add_node_from_nodes(op, &[arg])?;
        Ok((graph, id))
    }

    #[test]
    fn test_sum_keeps_element_type() {
        let (graph, id) = reduce(
            ElementType::F32,
            Shape::from([3, 4, 5]).into(),
            Operation::Sum { axes: AxisSet::from([1]) },
        )
        .unwrap();

        let node = graph.node(id).unwrap();
        assert_eq!(node.element_type().unwrap(), ElementType::F32);
        assert_eq!(node.shape().unwrap(), Shape::from([3, 5]));
    }

    #[test]
    fn test_product_rejects_boolean() {
        let err = reduce(
            ElementType::Boolean,
            Shape::from([3]).into(),
            Operation::Product { axes: AxisSet::from([0]) },
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Input element type cannot be boolean"));
    }

    #[test]
    fn test_any_with_dynamic_type_is_boolean() {
        let (graph, id) = reduce(
            ElementType::Dynamic,
            PartialShape::from([Dimension::Dynamic, Dimension::Static(7)]),
            Operation::Any { axes: AxisSet::from([0]) },
        )
        .unwrap();

        let node = graph.node(id).unwrap();
        assert_eq!(node.element_type().unwrap(), ElementType::Boolean);
        assert_eq!(node.shape().unwrap(), Shape::from([7]));
    }

    #[test]
    fn test_first_out_of_bounds_axis_reported() {
        let err = reduce(
            ElementType::F64,
            Shape::from([2, 2]).into(),
            Operation::Sum { axes: AxisSet::from([5, 3]) },
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Reduction axis (3) is out of bounds"));
        assert!(message.contains("argument shape: {2,2}"));
        assert!(message.contains("reduction axes: {3,5}"));
    }
}
