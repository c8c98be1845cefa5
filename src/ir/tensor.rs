// Tensor Descriptor
//
// Static metadata (element type + partial shape) for one graph value.

use crate::core::error::Result;
use crate::ir::shape::{PartialShape, Shape};
use crate::types::ElementType;
use std::fmt;

/// Element type and shape knowledge of a single node output
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorDescriptor {
    element_type: ElementType,
    partial_shape: PartialShape,
}

impl TensorDescriptor {
    pub fn new(element_type: ElementType, partial_shape: impl Into<PartialShape>) -> Self {
        Self {
            element_type,
            partial_shape: partial_shape.into(),
        }
    }

    /// Nothing known yet: dynamic type, dynamic rank
    pub fn unresolved() -> Self {
        Self::new(ElementType::Dynamic, PartialShape::dynamic())
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn partial_shape(&self) -> &PartialShape {
        &self.partial_shape
    }

    /// Static shape; fails while the shape is partially dynamic
    pub fn shape(&self) -> Result<Shape> {
        self.partial_shape.to_shape()
    }

    /// Element type and shape both fully known
    pub fn is_static(&self) -> bool {
        self.element_type.is_static() && self.partial_shape.is_static()
    }

    /// Same element type and same shape scheme
    pub fn same_scheme(&self, other: &TensorDescriptor) -> bool {
        self.element_type == other.element_type
            && self.partial_shape.same_scheme(&other.partial_shape)
    }

    /// Unify with another descriptor, `None` if either part conflicts
    pub fn merge(&self, other: &TensorDescriptor) -> Option<TensorDescriptor> {
        let element_type = ElementType::merge(self.element_type, other.element_type)?;
        let partial_shape = self.partial_shape.merge(&other.partial_shape)?;
        Some(TensorDescriptor {
            element_type,
            partial_shape,
        })
    }

    pub(crate) fn set(&mut self, element_type: ElementType, partial_shape: PartialShape) {
        self.element_type = element_type;
        self.partial_shape = partial_shape;
    }
}

impl Default for TensorDescriptor {
    fn default() -> Self {
        Self::unresolved()
    }
}

impl fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.element_type, self.partial_shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::shape::Dimension;

    #[test]
    fn test_unresolved() {
        let d = TensorDescriptor::unresolved();
        assert!(d.element_type().is_dynamic());
        assert!(!d.partial_shape().rank_is_static());
        assert!(!d.is_static());
        assert_eq!(d.to_string(), "??");
    }

    #[test]
    fn test_static_descriptor() {
        let d = TensorDescriptor::new(ElementType::Boolean, Shape::from([2, 4]));
        assert!(d.is_static());
        assert_eq!(d.shape().unwrap(), Shape::from([2, 4]));
        assert_eq!(d.to_string(), "boolean{2,4}");
    }

    #[test]
    fn test_merge() {
        let a = TensorDescriptor::new(ElementType::Dynamic, [Dimension::Static(2), Dimension::Dynamic]);
        let b = TensorDescriptor::new(ElementType::F32, PartialShape::dynamic());
        let m = a.merge(&b).unwrap();
        assert_eq!(m.element_type(), ElementType::F32);
        assert!(m.partial_shape().same_scheme(&a.partial_shape().clone()));

        let c = TensorDescriptor::new(ElementType::I32, Shape::from([2, 3]));
        assert!(b.merge(&c).is_none());
    }
}
