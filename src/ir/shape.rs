// Shape Algebra
//
// Static and partially-known tensor shapes:
// - Dimension: a concrete extent or "dynamic"
// - PartialShape: a rank that may itself be unknown, plus dimensions
// - Shape: a fully static extent list
// - AxisSet: an ordered set of axis positions

use crate::core::error::{GraphError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Deref, Mul};

/// One dimension of a partial shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Known extent
    Static(usize),
    /// Unknown extent
    Dynamic,
}

impl Dimension {
    pub fn dynamic() -> Self {
        Dimension::Dynamic
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Dimension::Static(_))
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// Extent if known
    pub fn length(&self) -> Option<usize> {
        match self {
            Dimension::Static(n) => Some(*n),
            Dimension::Dynamic => None,
        }
    }

    /// Extent, failing when the dimension is dynamic
    pub fn get_length(&self) -> Result<usize> {
        self.length()
            .ok_or_else(|| GraphError::NotStatic("dimension ?".to_string()))
    }

    /// True if the two dimensions could describe the same extent
    pub fn compatible(&self, other: &Dimension) -> bool {
        Dimension::merge(*self, *other).is_some()
    }

    /// Both dynamic, or both static and equal
    pub fn same_scheme(&self, other: &Dimension) -> bool {
        self == other
    }

    /// Most specific dimension consistent with both sides
    pub fn merge(a: Dimension, b: Dimension) -> Option<Dimension> {
        match (a, b) {
            (Dimension::Dynamic, d) | (d, Dimension::Dynamic) => Some(d),
            (Dimension::Static(x), Dimension::Static(y)) if x == y => Some(a),
            _ => None,
        }
    }

    /// `self` is at least as specific as `other`
    pub fn refines(&self, other: &Dimension) -> bool {
        match (self, other) {
            (_, Dimension::Dynamic) => true,
            (Dimension::Static(x), Dimension::Static(y)) => x == y,
            (Dimension::Dynamic, Dimension::Static(_)) => false,
        }
    }

    /// `self` is at most as specific as `other`
    pub fn relaxes(&self, other: &Dimension) -> bool {
        other.refines(self)
    }
}

impl From<usize> for Dimension {
    fn from(n: usize) -> Self {
        Dimension::Static(n)
    }
}

impl Add for Dimension {
    type Output = Dimension;

    /// An extent that does not fit in `usize` is unknown
    fn add(self, rhs: Dimension) -> Dimension {
        match (self, rhs) {
            (Dimension::Static(a), Dimension::Static(b)) => {
                a.checked_add(b).map_or(Dimension::Dynamic, Dimension::Static)
            }
            _ => Dimension::Dynamic,
        }
    }
}

impl Mul for Dimension {
    type Output = Dimension;

    /// An extent that does not fit in `usize` is unknown
    fn mul(self, rhs: Dimension) -> Dimension {
        match (self, rhs) {
            (Dimension::Static(a), Dimension::Static(b)) => {
                a.checked_mul(b).map_or(Dimension::Dynamic, Dimension::Static)
            }
            // Zero times anything is zero, even when the other side is unknown
            (Dimension::Static(0), _) | (_, Dimension::Static(0)) => Dimension::Static(0),
            _ => Dimension::Dynamic,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Dimension::Static(n) => write!(f, "{}", n),
            Dimension::Dynamic => write!(f, "?"),
        }
    }
}

/// Fully static shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// Rank-0 shape
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Product of all extents (1 for a scalar), `None` if it overflows
    pub fn num_elements(&self) -> Option<usize> {
        if self.0.contains(&0) {
            return Some(0);
        }
        self.0.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_braced(f, self.0.iter())
    }
}

/// Shape whose rank and/or extents may be unknown
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialShape {
    /// `None` when the rank itself is unknown
    dims: Option<Vec<Dimension>>,
}

impl PartialShape {
    /// Rank-dynamic shape
    pub fn dynamic() -> Self {
        Self { dims: None }
    }

    /// Shape of known rank with every dimension dynamic
    pub fn dynamic_rank(rank: usize) -> Self {
        Self {
            dims: Some(vec![Dimension::Dynamic; rank]),
        }
    }

    pub fn new(dims: Vec<Dimension>) -> Self {
        Self { dims: Some(dims) }
    }

    /// Rank as a dimension: dynamic when unknown
    pub fn rank(&self) -> Dimension {
        match &self.dims {
            Some(dims) => Dimension::Static(dims.len()),
            None => Dimension::Dynamic,
        }
    }

    pub fn rank_is_static(&self) -> bool {
        self.dims.is_some()
    }

    /// Dimensions, if the rank is known
    pub fn dims(&self) -> Option<&[Dimension]> {
        self.dims.as_deref()
    }

    /// Dimension at `axis`, if the rank is known and `axis` is in range
    pub fn get(&self, axis: usize) -> Option<Dimension> {
        self.dims.as_ref().and_then(|dims| dims.get(axis).copied())
    }

    /// Rank known and every dimension known
    pub fn is_static(&self) -> bool {
        match &self.dims {
            Some(dims) => dims.iter().all(Dimension::is_static),
            None => false,
        }
    }

    /// Rank unknown or some dimension unknown
    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    /// True if the two shapes could describe the same tensor
    pub fn compatible(&self, other: &PartialShape) -> bool {
        self.merge(other).is_some()
    }

    /// Identical structure: same rank knowledge and the same dimension schemes
    pub fn same_scheme(&self, other: &PartialShape) -> bool {
        match (&self.dims, &other.dims) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_scheme(y))
            }
            _ => false,
        }
    }

    /// `self` is at least as specific as `other`
    pub fn refines(&self, other: &PartialShape) -> bool {
        match (&self.dims, &other.dims) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.refines(y)),
        }
    }

    /// `self` is at most as specific as `other`
    pub fn relaxes(&self, other: &PartialShape) -> bool {
        other.refines(self)
    }

    /// Most specific partial shape consistent with both sides.
    ///
    /// A rank-dynamic side adopts the other side entirely. Two known ranks
    /// must agree, and each position merges as a `Dimension`. Returns `None`
    /// when the shapes are provably incompatible.
    pub fn merge(&self, other: &PartialShape) -> Option<PartialShape> {
        match (&self.dims, &other.dims) {
            (None, _) => Some(other.clone()),
            (_, None) => Some(self.clone()),
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                a.iter()
                    .zip(b)
                    .map(|(x, y)| Dimension::merge(*x, *y))
                    .collect::<Option<Vec<_>>>()
                    .map(PartialShape::new)
            }
        }
    }

    /// Merge `src` into `dst` in place; `dst` is left untouched on failure
    pub fn merge_into(dst: &mut PartialShape, src: &PartialShape) -> bool {
        match dst.merge(src) {
            Some(merged) => {
                *dst = merged;
                true
            }
            None => false,
        }
    }

    /// Merge, reporting incompatibility as an error
    pub fn try_merge(&self, other: &PartialShape) -> Result<PartialShape> {
        self.merge(other).ok_or_else(|| GraphError::IncompatibleMerge {
            lhs: self.to_string(),
            rhs: other.to_string(),
        })
    }

    /// Concretize into a static shape; fails unless fully static
    pub fn to_shape(&self) -> Result<Shape> {
        self.dims
            .as_ref()
            .and_then(|dims| dims.iter().map(Dimension::length).collect::<Option<Vec<_>>>())
            .map(Shape)
            .ok_or_else(|| GraphError::NotStatic(format!("shape {}", self)))
    }
}

impl Default for PartialShape {
    fn default() -> Self {
        PartialShape::dynamic()
    }
}

impl From<Shape> for PartialShape {
    fn from(shape: Shape) -> Self {
        PartialShape::new(shape.0.into_iter().map(Dimension::Static).collect())
    }
}

impl From<&Shape> for PartialShape {
    fn from(shape: &Shape) -> Self {
        PartialShape::from(shape.clone())
    }
}

impl From<Vec<Dimension>> for PartialShape {
    fn from(dims: Vec<Dimension>) -> Self {
        PartialShape::new(dims)
    }
}

impl<const N: usize> From<[Dimension; N]> for PartialShape {
    fn from(dims: [Dimension; N]) -> Self {
        PartialShape::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for PartialShape {
    fn from(dims: [usize; N]) -> Self {
        PartialShape::from(Shape::from(dims))
    }
}

impl FromIterator<Dimension> for PartialShape {
    fn from_iter<I: IntoIterator<Item = Dimension>>(iter: I) -> Self {
        PartialShape::new(iter.into_iter().collect())
    }
}

impl fmt::Display for PartialShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.dims {
            Some(dims) => write_braced(f, dims.iter()),
            None => write!(f, "?"),
        }
    }
}

/// Ordered set of axis positions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AxisSet(BTreeSet<usize>);

impl AxisSet {
    pub fn new() -> Self {
        AxisSet(BTreeSet::new())
    }

    pub fn contains(&self, axis: usize) -> bool {
        self.0.contains(&axis)
    }

    pub fn insert(&mut self, axis: usize) -> bool {
        self.0.insert(axis)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Axes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vector(&self) -> Vec<usize> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<usize> for AxisSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        AxisSet(iter.into_iter().collect())
    }
}

impl From<Vec<usize>> for AxisSet {
    fn from(axes: Vec<usize>) -> Self {
        axes.into_iter().collect()
    }
}

impl<const N: usize> From<[usize; N]> for AxisSet {
    fn from(axes: [usize; N]) -> Self {
        axes.into_iter().collect()
    }
}

impl fmt::Display for AxisSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_braced(f, self.0.iter())
    }
}

fn write_braced<T: fmt::Display>(
    f: &mut fmt::Formatter,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "}}")
}
