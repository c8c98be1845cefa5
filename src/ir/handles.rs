// Edge Handles
//
// `InputRef`/`OutputRef` name a slot by (node, index). They are plain
// index pairs and own nothing. `Input`/`Output` are borrowed views that
// resolve a handle against the graph it belongs to.

use crate::core::error::Result;
use crate::ir::graph::Graph;
use crate::ir::node::NodeId;
use crate::ir::shape::PartialShape;
use crate::ir::tensor::TensorDescriptor;
use crate::types::ElementType;
use std::fmt;

/// Input slot `index` of `node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputRef {
    pub node: NodeId,
    pub index: usize,
}

impl InputRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.in{}", self.node, self.index)
    }
}

/// Output slot `index` of `node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: NodeId,
    pub index: usize,
}

impl OutputRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl From<NodeId> for OutputRef {
    /// Output 0 of `node`
    fn from(node: NodeId) -> Self {
        OutputRef { node, index: 0 }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.out{}", self.node, self.index)
    }
}

/// Borrowed view of one input slot
#[derive(Clone, Copy)]
pub struct Input<'g> {
    graph: &'g Graph,
    at: InputRef,
}

impl<'g> Input<'g> {
    pub(crate) fn new(graph: &'g Graph, at: InputRef) -> Self {
        Self { graph, at }
    }

    pub fn handle(&self) -> InputRef {
        self.at
    }

    /// The output this input is bound to
    pub fn source_output(&self) -> Result<Output<'g>> {
        let source = self.graph.node(self.at.node)?.input_source_output(self.at.index)?;
        Ok(Output::new(self.graph, source))
    }

    pub fn element_type(&self) -> Result<ElementType> {
        self.source_output()?.element_type()
    }

    pub fn partial_shape(&self) -> Result<&'g PartialShape> {
        self.source_output()?.partial_shape()
    }
}

/// Borrowed view of one output slot
#[derive(Clone, Copy)]
pub struct Output<'g> {
    graph: &'g Graph,
    at: OutputRef,
}

impl<'g> Output<'g> {
    pub(crate) fn new(graph: &'g Graph, at: OutputRef) -> Self {
        Self { graph, at }
    }

    pub fn handle(&self) -> OutputRef {
        self.at
    }

    pub fn descriptor(&self) -> Result<&'g TensorDescriptor> {
        self.graph.node(self.at.node)?.output_descriptor(self.at.index)
    }

    pub fn element_type(&self) -> Result<ElementType> {
        self.descriptor().map(TensorDescriptor::element_type)
    }

    pub fn partial_shape(&self) -> Result<&'g PartialShape> {
        self.descriptor().map(TensorDescriptor::partial_shape)
    }

    /// Consumer inputs currently bound to this output, in handle order
    pub fn target_inputs(&self) -> Result<Vec<Input<'g>>> {
        let graph = self.graph;
        let targets = graph.node(self.at.node)?.output_target_inputs(self.at.index)?;
        Ok(targets.iter().map(|&target| Input::new(graph, target)).collect())
    }
}
