// TensorGraph: dataflow graph IR for tensor compilers
//
// Graphs of tensor operations whose element types and shapes are inferred
// as nodes are wired, with partial knowledge (unknown rank, unknown
// dimensions, unknown element type) carried through until it resolves.
//
// Architecture:
// - types: element types
// - core: crate-wide error handling
// - ir: shapes, nodes, graphs, functions, verification, fingerprints
// - ops: per-family shape/type inference rules
// - optimizer: rewrite capability, pass manager, CSE
// - compiler: backend boundary (buffer plans, schedules) and kernel cache
// - autodiff: reverse-mode adjoint propagation

// Public modules
pub mod core;
pub mod types;

// Graph IR and inference
pub mod ir;
pub mod ops;

// Graph consumers
pub mod autodiff;
pub mod compiler;
pub mod optimizer;

// Re-export commonly used items for convenience
pub use crate::core::{GraphError, NodeValidationFailure, Result};
pub use ir::{
    AxisSet, Dimension, Function, Graph, GraphBuilder, InputRef, NodeId, OpKind, Operation,
    OutputRef, PartialShape, Shape, TensorDescriptor,
};
pub use types::ElementType;
