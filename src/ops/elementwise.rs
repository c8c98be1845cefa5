// Elementwise Inference
//
// Binary elementwise operations apply one scalar operation to each pair of
// corresponding elements, so both operands must agree in element type and
// shape and the result has that same type and shape. Agreement is checked
// by merging the two descriptors, which lets a dynamic side take on the
// other side's knowledge.

use crate::core::error::Result;
use crate::ir::shape::PartialShape;
use crate::ir::tensor::TensorDescriptor;
use crate::ops::InferenceContext;
use crate::types::ElementType;

/// Merge the descriptors of all inputs into one.
///
/// Fails citing both operands when their element types or shapes cannot
/// describe the same tensor.
pub fn infer_elementwise_args(ctx: &InferenceContext) -> Result<(ElementType, PartialShape)> {
    let first = ctx.input_descriptor(0)?;
    let mut element_type = first.element_type();
    let mut shape = first.partial_shape().clone();

    for index in 1..ctx.input_count() {
        let other = ctx.input_descriptor(index)?;

        let merged_type = ElementType::merge(element_type, other.element_type());
        ctx.check(merged_type.is_some(), || {
            format!(
                "Argument element types are inconsistent (argument 0: {}, argument {}: {}).",
                first.element_type(),
                index,
                other.element_type()
            )
        })?;
        element_type = merged_type.unwrap_or(element_type);

        ctx.check(PartialShape::merge_into(&mut shape, other.partial_shape()), || {
            format!(
                "Argument shapes are inconsistent (argument 0: {}, argument {}: {}).",
                first.partial_shape(),
                index,
                other.partial_shape()
            )
        })?;
    }

    Ok((element_type, shape))
}

/// Shared rule of `Add`, `Subtract`, `Multiply`, `Divide`, `Maximum`,
/// `Minimum` and `Power`.
///
/// Boolean operands are rejected once the merged type is known.
pub fn infer_binary_arithmetic(ctx: &InferenceContext) -> Result<TensorDescriptor> {
    let (element_type, shape) = infer_elementwise_args(ctx)?;

    ctx.check(element_type != ElementType::Boolean, || {
        format!(
            "Arguments cannot have boolean element type (argument element type: {}).",
            element_type
        )
    })?;

    Ok(TensorDescriptor::new(element_type, shape))
}

/// Shared rule of `And`, `Or` and `Xor`: operands must be boolean, and the
/// output is boolean even while the operand type is still dynamic.
pub fn infer_binary_logical(ctx: &InferenceContext) -> Result<TensorDescriptor> {
    let (element_type, shape) = infer_elementwise_args(ctx)?;

    ctx.check(
        element_type.is_dynamic() || element_type == ElementType::Boolean,
        || {
            format!(
                "Operands for logical operators must have boolean element type but have element type {}.",
                element_type
            )
        },
    )?;

    Ok(TensorDescriptor::new(ElementType::Boolean, shape))
}

/// `Convert`: same shape, new element type
pub fn infer_convert(ctx: &InferenceContext, destination_type: ElementType) -> Result<TensorDescriptor> {
    let shape = ctx.input_partial_shape(0)?.clone();
    Ok(TensorDescriptor::new(destination_type, shape))
}

#[cfg(test)]
mod tests {
    use crate::ir::graph::Graph;
    use crate::ir::node::{NodeId, Operation};
    use crate::ir::shape::{Dimension, PartialShape, Shape};
    use crate::types::ElementType;

    fn parameter(graph: &mut Graph, element_type: ElementType, shape: PartialShape) -> NodeId {
        graph
            .add_node(Operation::Parameter { element_type, shape }, &[])
            .unwrap()
    }

    #[test]
    fn test_add_static() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, Shape::from([2, 3]).into());
        let b = parameter(&mut graph, ElementType::F32, Shape::from([2, 3]).into());
        let add = graph.add_node_from_nodes(Operation::Add, &[a, b]).unwrap();

        let node = graph.node(add).unwrap();
        assert_eq!(node.element_type().unwrap(), ElementType::F32);
        assert_eq!(node.shape().unwrap(), Shape::from([2, 3]));
    }

    #[test]
    fn test_dynamic_sides_take_known_information() {
        let mut graph = Graph::new();
        let a = parameter(
            &mut graph,
            ElementType::Dynamic,
            PartialShape::from([Dimension::Static(2), Dimension::Dynamic]),
        );
        let b = parameter(
            &mut graph,
            ElementType::I64,
            PartialShape::from([Dimension::Dynamic, Dimension::Static(5)]),
        );
        let mul = graph.add_node_from_nodes(Operation::Multiply, &[a, b]).unwrap();

        let node = graph.node(mul).unwrap();
        assert_eq!(node.element_type().unwrap(), ElementType::I64);
        assert_eq!(node.shape().unwrap(), Shape::from([2, 5]));
    }

    #[test]
    fn test_inconsistent_element_types() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, Shape::from([2, 2]).into());
        let b = parameter(&mut graph, ElementType::I32, Shape::from([2, 2]).into());
        let err = graph.add_node_from_nodes(Operation::Add, &[a, b]).unwrap_err();

        assert!(err.is_validation());
        let failure = err.as_validation().unwrap();
        assert_eq!(
            failure.explanation(),
            "Argument element types are inconsistent (argument 0: f32, argument 1: i32)."
        );
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_boolean_arithmetic_rejected() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::Boolean, Shape::from([2]).into());
        let b = parameter(&mut graph, ElementType::Boolean, Shape::from([2]).into());
        let err = graph.add_node_from_nodes(Operation::Subtract, &[a, b]).unwrap_err();
        assert!(err.to_string().contains("Arguments cannot have boolean element type"));
    }

    #[test]
    fn test_logical_output_is_boolean_while_input_dynamic() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::Dynamic, PartialShape::dynamic());
        let b = parameter(&mut graph, ElementType::Dynamic, Shape::from([4]).into());
        let and = graph.add_node_from_nodes(Operation::And, &[a, b]).unwrap();

        let node = graph.node(and).unwrap();
        assert_eq!(node.element_type().unwrap(), ElementType::Boolean);
        assert_eq!(node.shape().unwrap(), Shape::from([4]));
    }

    #[test]
    fn test_logical_rejects_numeric() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, Shape::from([4]).into());
        let b = parameter(&mut graph, ElementType::F32, Shape::from([4]).into());
        let err = graph.add_node_from_nodes(Operation::Or, &[a, b]).unwrap_err();
        assert!(err
            .to_string()
            .contains("Operands for logical operators must have boolean element type but have element type f32"));
    }

    #[test]
    fn test_convert_keeps_shape() {
        let mut graph = Graph::new();
        let a = parameter(
            &mut graph,
            ElementType::I32,
            PartialShape::from([Dimension::Dynamic, Dimension::Static(3)]),
        );
        let convert = graph
            .add_node_from_nodes(
                Operation::Convert {
                    destination_type: ElementType::F16,
                },
                &[a],
            )
            .unwrap();

        let node = graph.node(convert).unwrap();
        assert_eq!(node.element_type().unwrap(), ElementType::F16);
        assert!(node
            .output_partial_shape(0)
            .unwrap()
            .same_scheme(&PartialShape::from([Dimension::Dynamic, Dimension::Static(3)])));
    }
}
