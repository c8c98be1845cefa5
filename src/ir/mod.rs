// IR Module: graph intermediate representation

pub mod builder;
pub mod fingerprint;
pub mod function;
pub mod graph;
pub mod handles;
pub mod node;
pub mod options;
pub mod shape;
pub mod tensor;
pub mod verify;

// Re-exports
pub use builder::GraphBuilder;
pub use fingerprint::{fingerprint, Fingerprint};
pub use function::Function;
pub use graph::Graph;
pub use handles::{Input, InputRef, Output, OutputRef};
pub use node::{Node, NodeId, OpKind, Operation, Placement};
pub use options::BuildOptions;
pub use shape::{AxisSet, Dimension, PartialShape, Shape};
pub use tensor::TensorDescriptor;
pub use verify::{require_static, verify_graph};
