// Core Layer: Error Types
//
// Two families of failure share one enum: validation failures describe a
// malformed model and are reported to its author, every other variant
// signals misuse of the graph API.

use crate::ir::node::NodeId;

/// A static-inference precondition that does not hold for a node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("While validating node '{node}':\n{explanation}")]
pub struct NodeValidationFailure {
    node: String,
    explanation: String,
}

impl NodeValidationFailure {
    /// Create a failure from a rendered node description and an explanation
    pub fn new(node: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            explanation: explanation.into(),
        }
    }

    /// Rendered description of the offending node
    pub fn node_description(&self) -> &str {
        &self.node
    }

    /// Which precondition failed
    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

/// Error type for graph construction, mutation and inference
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The graph being built violates an operation's type/shape contract
    #[error(transparent)]
    Validation(#[from] NodeValidationFailure),
    /// Node handle does not refer to a live node of this graph
    #[error("node {0} does not exist in this graph")]
    NodeNotFound(NodeId),
    /// Input slot index past the node's input count
    #[error("input index {index} is out of bounds for node {node} with {count} inputs")]
    InputIndexOutOfBounds {
        node: NodeId,
        index: usize,
        count: usize,
    },
    /// Output slot index past the node's output count
    #[error("output index {index} is out of bounds for node {node} with {count} outputs")]
    OutputIndexOutOfBounds {
        node: NodeId,
        index: usize,
        count: usize,
    },
    /// Single-output accessor used on a node with a different output count
    #[error("node {node} has {count} outputs where exactly one was expected")]
    NotSingleOutput { node: NodeId, count: usize },
    /// Operation constructed with the wrong number of arguments
    #[error("{op} expects {expected} arguments but was given {actual}")]
    ArityMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },
    /// Friendly name may only be set once
    #[error("friendly name of node {node} is already '{current}'; cannot rename to '{requested}'")]
    FriendlyNameAlreadySet {
        node: NodeId,
        current: String,
        requested: String,
    },
    /// A static shape was required but the value is still partially dynamic
    #[error("{0} is not static")]
    NotStatic(String),
    /// Input/fan-out bookkeeping disagrees
    #[error("inconsistent edge: {0}")]
    EdgeInconsistent(String),
    /// Node cannot be removed while it still feeds other nodes
    #[error("node {node} still has {users} users")]
    NodeHasUsers { node: NodeId, users: usize },
    /// Two shapes or element types could not be unified
    #[error("cannot merge {lhs} with {rhs}")]
    IncompatibleMerge { lhs: String, rhs: String },
    /// Byte or element count of a static shape does not fit in `usize`
    #[error("size of {0} overflows usize")]
    SizeOverflow(String),
    /// Data or control edges form a cycle
    #[error("graph contains a cycle through node {0}")]
    Cycle(NodeId),
    /// Function boundary nodes are malformed
    #[error("invalid function: {0}")]
    InvalidFunction(String),
    /// Rewrite request cannot be carried out
    #[error("invalid rewrite: {0}")]
    InvalidRewrite(String),
    /// Adjoint rule misbehaved
    #[error("autodiff: {0}")]
    Autodiff(String),
    /// Backend rejected or failed a compilation
    #[error("backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },
}

impl GraphError {
    /// Model-facing failure (recoverable by reporting to the model author)
    pub fn is_validation(&self) -> bool {
        matches!(self, GraphError::Validation(_))
    }

    /// Core-usage bug
    pub fn is_internal(&self) -> bool {
        !self.is_validation()
    }

    pub fn as_validation(&self) -> Option<&NodeValidationFailure> {
        match self {
            GraphError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
