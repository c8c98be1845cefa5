// Structural Inference
//
// Operations that route values rather than compute on elements: graph
// boundary markers, multi-output splitting, output selection and nested
// function calls.

use crate::core::error::Result;
use crate::ir::function::Function;
use crate::ir::shape::{Dimension, PartialShape};
use crate::ir::tensor::TensorDescriptor;
use crate::ops::InferenceContext;
use crate::types::ElementType;

/// `Parameter`: the declared descriptor
pub fn infer_parameter(element_type: ElementType, shape: &PartialShape) -> TensorDescriptor {
    TensorDescriptor::new(element_type, shape.clone())
}

/// `Result`: passes its argument through unchanged
pub fn infer_result(ctx: &InferenceContext) -> Result<TensorDescriptor> {
    Ok(ctx.input_descriptor(0)?.clone())
}

/// `Split`: `parts` equal pieces along `axis`.
///
/// The axis is checked once the rank is known, and divisibility once the
/// extent along the axis is known.
pub fn infer_split(ctx: &InferenceContext, axis: usize, parts: usize) -> Result<Vec<TensorDescriptor>> {
    ctx.check(parts > 0, || "Split must produce at least one part.".to_string())?;

    let input = ctx.input_descriptor(0)?;
    let element_type = input.element_type();
    let shape = input.partial_shape();

    let Some(dims) = shape.dims() else {
        return Ok(vec![TensorDescriptor::new(element_type, PartialShape::dynamic()); parts]);
    };

    ctx.check(axis < dims.len(), || {
        format!("Split axis ({}) is out of bounds (argument shape: {}).", axis, shape)
    })?;

    let piece = match dims[axis] {
        Dimension::Static(extent) => {
            ctx.check(extent % parts == 0, || {
                format!(
                    "Dimension {} along split axis ({}) is not divisible by the number of parts ({}).",
                    extent, axis, parts
                )
            })?;
            Dimension::Static(extent / parts)
        }
        Dimension::Dynamic => Dimension::Dynamic,
    };

    let mut out = dims.to_vec();
    out[axis] = piece;
    Ok(vec![TensorDescriptor::new(element_type, out); parts])
}

/// `GetOutputElement`: forwards output `n` of its producer.
///
/// The argument must be bound to exactly that output.
pub fn infer_get_output_element(ctx: &InferenceContext, n: usize) -> Result<TensorDescriptor> {
    let source = ctx.input_source(0)?;
    ctx.check(source.index == n, || {
        format!(
            "Output element index ({}) does not match the bound producer output ({}).",
            n, source.index
        )
    })?;
    Ok(ctx.input_descriptor(0)?.clone())
}

/// `Call`: arguments must be compatible with the function's parameters;
/// outputs are the function's result descriptors
pub fn infer_call(ctx: &InferenceContext, function: &Function) -> Result<Vec<TensorDescriptor>> {
    let parameters = function.parameter_descriptors()?;

    for (index, expected) in parameters.iter().enumerate() {
        let actual = ctx.input_descriptor(index)?;
        ctx.check(actual.merge(expected).is_some(), || {
            format!(
                "Argument {} ({}) does not match parameter {} of function '{}' ({}).",
                index,
                actual,
                index,
                function.name(),
                expected
            )
        })?;
    }

    function.output_descriptors()
}
