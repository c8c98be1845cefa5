// IR Computation Graph
//
// Arena of nodes addressed by `NodeId`. Edges are index pairs kept on both
// ends: every input slot names its producer output, and every output slot
// keeps the set of inputs bound to it. All structural mutation goes through
// this type so the two ends never drift apart.

use crate::core::error::{GraphError, Result};
use crate::ir::handles::{Input, InputRef, Output, OutputRef};
use crate::ir::node::{Node, NodeId, Operation};
use crate::ir::options::BuildOptions;
use crate::ir::shape::PartialShape;
use crate::ir::tensor::TensorDescriptor;
use crate::ops;
use crate::types::ElementType;
use std::collections::{BTreeMap, BTreeSet};

/// Dataflow graph of operations
#[derive(Debug, Default)]
pub struct Graph {
    /// Node slots; a removed node leaves `None` behind so ids stay stable
    nodes: Vec<Option<Node>>,
    options: BuildOptions,
}

impl Graph {
    /// Create a new empty graph with default options
    pub fn new() -> Self {
        Self::with_options(BuildOptions::new())
    }

    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            nodes: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    // ===== Construction =====

    /// Construct a node for `op`, binding input `i` to `args[i]`.
    ///
    /// Outputs start unresolved. With eager validation the inference hook
    /// runs immediately; if it fails the node is unwired and dropped, so
    /// the graph is left exactly as it was.
    pub fn add_node(&mut self, op: Operation, args: &[OutputRef]) -> Result<NodeId> {
        if args.len() != op.arity() {
            return Err(GraphError::ArityMismatch {
                op: op.kind().name().to_string(),
                expected: op.arity(),
                actual: args.len(),
            });
        }
        for arg in args {
            self.node(arg.node)?.output_slot(arg.index)?;
        }

        let id = NodeId(self.nodes.len());
        let node = Node::new(id, op, args, self.options.default_placement);
        for (index, source) in args.iter().enumerate() {
            self.node_mut(source.node)?
                .output_slot_mut(source.index)?
                .targets
                .insert(InputRef::new(id, index));
        }
        self.nodes.push(Some(node));

        if self.options.validate_on_construct {
            if let Err(err) = self.validate_and_infer_types(id) {
                log::warn!("construction of {} aborted: {}", id, err);
                self.discard(id);
                return Err(err);
            }
        }

        log::debug!("constructed {} as {}", self.node(id)?.name(), id);
        Ok(id)
    }

    /// Construct a node whose arguments are single-output nodes
    pub fn add_node_from_nodes(&mut self, op: Operation, args: &[NodeId]) -> Result<NodeId> {
        let sources = args
            .iter()
            .map(|&arg| self.single_output(arg))
            .collect::<Result<Vec<_>>>()?;
        self.add_node(op, &sources)
    }

    /// Construct a copy of `node` bound to new producers.
    ///
    /// The copy goes through normal construction, so it is validated
    /// against `args`. Provenance tags and placement carry over; the
    /// friendly name and control dependencies do not.
    pub fn copy_with_new_args(&mut self, node: NodeId, args: &[OutputRef]) -> Result<NodeId> {
        let original = self.node(node)?;
        let op = original.op().clone();
        let tags = original.provenance_tags().clone();
        let placement = original.placement();
        let placement_index = original.placement_index();

        let copy = self.add_node(op, args)?;
        let copied = self.node_mut(copy)?;
        copied.provenance_tags.extend(tags);
        copied.set_placement(placement);
        copied.set_placement_index(placement_index);

        log::trace!("copied {} as {}", node, copy);
        Ok(copy)
    }

    /// Output 0 of `node`, which must have exactly one output
    pub fn single_output(&self, node: NodeId) -> Result<OutputRef> {
        let count = self.node(node)?.output_size();
        if count != 1 {
            return Err(GraphError::NotSingleOutput { node, count });
        }
        Ok(OutputRef::new(node, 0))
    }

    /// Undo a construction that never became visible to the caller
    fn discard(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for (index, slot) in node.inputs.iter().enumerate() {
            if let Ok(source) = self.node_mut(slot.source.node) {
                if let Ok(output) = source.output_slot_mut(slot.source.index) {
                    output.targets.remove(&InputRef::new(id, index));
                }
            }
        }
        if id.0 + 1 == self.nodes.len() {
            self.nodes.pop();
        }
    }

    /// Remove a node that no longer feeds anything.
    ///
    /// Its inputs are dropped from their producers' fan-out and it is
    /// removed from every control-dependency set.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let users: usize = self.node(id)?.outputs.iter().map(|slot| slot.targets.len()).sum();
        if users > 0 {
            return Err(GraphError::NodeHasUsers { node: id, users });
        }

        let sources: Vec<OutputRef> = self.node(id)?.input_sources().collect();
        for (index, source) in sources.into_iter().enumerate() {
            self.remove_output_target_input(source, InputRef::new(id, index))?;
        }
        for other in self.nodes.iter_mut().flatten() {
            other.control_dependencies.remove(&id);
        }

        let node = self.nodes[id.0].take().ok_or(GraphError::NodeNotFound(id))?;
        log::debug!("removed {} ({})", node.name(), id);
        Ok(node)
    }

    // ===== Lookup =====

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(GraphError::NodeNotFound(id))
    }

    /// Mutable access for naming, provenance and placement bookkeeping.
    /// Edges are only reachable through `Graph` methods.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes in instance-id order
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.iter().flatten().collect();
        nodes.sort_by_key(|node| node.instance_id());
        nodes
    }

    /// Live node ids in instance-id order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().into_iter().map(Node::id).collect()
    }

    pub fn input(&self, at: InputRef) -> Result<Input<'_>> {
        self.node(at.node)?.input_slot(at.index)?;
        Ok(Input::new(self, at))
    }

    pub fn output(&self, at: OutputRef) -> Result<Output<'_>> {
        self.node(at.node)?.output_slot(at.index)?;
        Ok(Output::new(self, at))
    }

    /// Producer output bound to an input
    pub fn input_source_output(&self, at: InputRef) -> Result<OutputRef> {
        self.node(at.node)?.input_source_output(at.index)
    }

    pub fn output_descriptor(&self, at: OutputRef) -> Result<&TensorDescriptor> {
        self.node(at.node)?.output_descriptor(at.index)
    }

    /// Descriptor currently flowing into input `index` of `node`
    pub fn input_descriptor(&self, node: NodeId, index: usize) -> Result<&TensorDescriptor> {
        let source = self.node(node)?.input_source_output(index)?;
        self.output_descriptor(source)
    }

    pub fn input_element_type(&self, node: NodeId, index: usize) -> Result<ElementType> {
        self.input_descriptor(node, index).map(TensorDescriptor::element_type)
    }

    pub fn input_partial_shape(&self, node: NodeId, index: usize) -> Result<&PartialShape> {
        self.input_descriptor(node, index).map(TensorDescriptor::partial_shape)
    }

    /// Consumer inputs bound to an output
    pub fn output_target_inputs(&self, at: OutputRef) -> Result<&BTreeSet<InputRef>> {
        self.node(at.node)?.output_target_inputs(at.index)
    }

    /// Nodes consuming any output of `id`, in instance-id order
    pub fn users(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut users: Vec<&Node> = Vec::new();
        for slot in &self.node(id)?.outputs {
            for target in &slot.targets {
                let user = self.node(target.node)?;
                if !users.iter().any(|u| u.id() == user.id()) {
                    users.push(user);
                }
            }
        }
        users.sort();
        Ok(users.into_iter().map(Node::id).collect())
    }

    // ===== Edge mutation =====

    /// Rebind one input to a different producer output.
    ///
    /// Fan-out sets on the old and new producers are updated together.
    /// Inference is not re-run; call `revalidate_and_infer_types`.
    pub fn replace_input_source_output(&mut self, at: InputRef, new_source: OutputRef) -> Result<()> {
        self.node(new_source.node)?.output_slot(new_source.index)?;
        let old_source = self.input_source_output(at)?;
        if old_source == new_source {
            return Ok(());
        }

        self.node_mut(old_source.node)?
            .output_slot_mut(old_source.index)?
            .targets
            .remove(&at);
        self.node_mut(new_source.node)?
            .output_slot_mut(new_source.index)?
            .targets
            .insert(at);
        self.node_mut(at.node)?.inputs[at.index].source = new_source;

        log::trace!("rebound {} from {} to {}", at, old_source, new_source);
        Ok(())
    }

    /// Drop `target` from the fan-out of `output`.
    ///
    /// The target input keeps its binding; callers pair this with rebinding
    /// or removing the consumer. Returns whether the entry was present.
    pub fn remove_output_target_input(&mut self, output: OutputRef, target: InputRef) -> Result<bool> {
        let removed = self
            .node_mut(output.node)?
            .output_slot_mut(output.index)?
            .targets
            .remove(&target);
        log::trace!("dropped {} from fan-out of {}", target, output);
        Ok(removed)
    }

    // ===== Inference =====

    /// Run the node's inference hook and store the computed descriptors.
    ///
    /// Outputs are only written when inference succeeds.
    fn validate_and_infer_types(&mut self, id: NodeId) -> Result<()> {
        let inferred = ops::infer(self, id)?;
        let node = self.node_mut(id)?;
        debug_assert_eq!(inferred.len(), node.outputs.len());
        for (slot, descriptor) in node.outputs.iter_mut().zip(inferred) {
            slot.descriptor = descriptor;
        }
        log::trace!("inferred outputs of {}", id);
        Ok(())
    }

    /// Recompute a node's outputs after its inputs changed
    pub fn revalidate_and_infer_types(&mut self, id: NodeId) -> Result<()> {
        self.validate_and_infer_types(id)
    }

    /// First inference for nodes built with delayed validation
    pub fn delayed_validate_and_infer_types(&mut self, id: NodeId) -> Result<()> {
        self.validate_and_infer_types(id)
    }

    /// Overwrite an output descriptor directly
    pub fn set_output_type(
        &mut self,
        at: OutputRef,
        element_type: ElementType,
        shape: PartialShape,
    ) -> Result<()> {
        self.node_mut(at.node)?
            .output_slot_mut(at.index)?
            .descriptor
            .set(element_type, shape);
        Ok(())
    }

    // ===== Metadata =====

    /// Order `dependency` before `node` without a data edge
    pub fn add_control_dependency(&mut self, node: NodeId, dependency: NodeId) -> Result<()> {
        self.node(dependency)?;
        self.node_mut(node)?.control_dependencies.insert(dependency);
        Ok(())
    }

    pub fn remove_control_dependency(&mut self, node: NodeId, dependency: NodeId) -> Result<()> {
        self.node_mut(node)?.control_dependencies.remove(&dependency);
        Ok(())
    }

    /// Union the provenance tags of `source` into `target`
    pub fn merge_provenance_tags_from(&mut self, target: NodeId, source: NodeId) -> Result<()> {
        let tags = self.node(source)?.provenance_tags().clone();
        self.node_mut(target)?.provenance_tags.extend(tags);
        Ok(())
    }

    // ===== Ordering =====

    /// Nodes ordered so that every producer and control dependency comes
    /// before its consumers. Ties are broken by instance id, so the order
    /// is the same on every run.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut successors: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();

        for node in self.nodes.iter().flatten() {
            let mut preds: BTreeSet<NodeId> = node.input_sources().map(|src| src.node).collect();
            preds.extend(node.control_dependencies.iter().copied().filter(|d| self.contains(*d)));
            pending.insert(node.id(), preds.len());
            for pred in preds {
                successors.entry(pred).or_default().push(node.id());
            }
        }

        let mut ready: BTreeSet<(usize, NodeId)> = BTreeSet::new();
        for (&id, &count) in &pending {
            if count == 0 {
                ready.insert((self.node(id)?.instance_id(), id));
            }
        }

        let mut order = Vec::with_capacity(pending.len());
        while let Some((instance_id, id)) = ready.iter().next().copied() {
            ready.remove(&(instance_id, id));
            order.push(id);
            for &succ in successors.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = pending.get_mut(&succ) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((self.node(succ)?.instance_id(), succ));
                    }
                }
            }
        }

        if order.len() < pending.len() {
            let stuck = pending
                .iter()
                .find(|(_, &count)| count > 0)
                .map(|(&id, _)| id)
                .unwrap_or(NodeId(0));
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    // ===== Diagnostics =====

    /// Render a node for diagnostics.
    ///
    /// Short form: `Kind name`. Long form adds inputs and outputs:
    /// `Add Add_7 (Parameter_3[0]:f32{2,3}, Parameter_4[0]:f32{2,3}) -> (f32{2,3})`.
    pub fn describe_node(&self, id: NodeId, short: bool) -> Result<String> {
        let node = self.node(id)?;
        let mut text = format!("{} {}", node.description(), node.name());
        if short {
            return Ok(text);
        }

        let inputs: Vec<String> = node
            .input_sources()
            .map(|src| match self.node(src.node) {
                Ok(producer) => {
                    let descriptor = producer
                        .output_descriptor(src.index)
                        .map(ToString::to_string)
                        .unwrap_or_else(|_| "?".to_string());
                    format!("{}[{}]:{}", producer.name(), src.index, descriptor)
                }
                Err(_) => format!("{}[{}]", src.node, src.index),
            })
            .collect();
        let outputs: Vec<String> = node.outputs.iter().map(|slot| slot.descriptor.to_string()).collect();

        text.push_str(&format!(" ({}) -> ({})", inputs.join(", "), outputs.join(", ")));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::shape::{AxisSet, Shape};

    fn parameter(graph: &mut Graph, element_type: ElementType, shape: impl Into<PartialShape>) -> NodeId {
        graph
            .add_node(
                Operation::Parameter {
                    element_type,
                    shape: shape.into(),
                },
                &[],
            )
            .unwrap()
    }

    #[test]
    fn test_empty_graph() {
        let graph = Graph::new();
        assert!(graph.is_empty());
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn test_add_node_wires_both_ends() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, [2, 3]);
        let b = parameter(&mut graph, ElementType::F32, [2, 3]);
        let add = graph.add_node_from_nodes(Operation::Add, &[a, b]).unwrap();

        assert_eq!(graph.input_source_output(InputRef::new(add, 0)).unwrap(), OutputRef::new(a, 0));
        assert!(graph
            .output_target_inputs(OutputRef::new(b, 0))
            .unwrap()
            .contains(&InputRef::new(add, 1)));
        assert_eq!(graph.users(a).unwrap(), vec![add]);
        assert_eq!(graph.node(add).unwrap().shape().unwrap(), Shape::from([2, 3]));
    }

    #[test]
    fn test_failed_construction_leaves_graph_unchanged() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::I32, [2, 4]);
        let err = graph
            .add_node_from_nodes(Operation::All { axes: AxisSet::from([0]) }, &[a])
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(graph.len(), 1);
        assert!(graph.output_target_inputs(OutputRef::new(a, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_copy_with_new_args() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, [2, 3]);
        let b = parameter(&mut graph, ElementType::F32, [4, 3]);
        let sum = graph
            .add_node_from_nodes(Operation::Sum { axes: AxisSet::from([1]) }, &[a])
            .unwrap();
        graph.node_mut(sum).unwrap().add_provenance_tag("row-sum");

        let copy = graph.copy_with_new_args(sum, &[OutputRef::new(b, 0)]).unwrap();

        assert_ne!(copy, sum);
        assert!(graph.node(copy).unwrap().op().same_attributes(graph.node(sum).unwrap().op()));
        assert_eq!(graph.node(copy).unwrap().shape().unwrap(), Shape::from([4]));
        assert!(graph.node(copy).unwrap().provenance_tags().contains("row-sum"));
        assert_eq!(graph.users(b).unwrap(), vec![copy]);
        // The original keeps its producer and descriptor
        assert_eq!(graph.node(sum).unwrap().shape().unwrap(), Shape::from([2]));
    }

    #[test]
    fn test_copy_with_invalid_args_leaves_graph_unchanged() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::Boolean, [2, 2]);
        let b = parameter(&mut graph, ElementType::I32, [2, 2]);
        let any = graph
            .add_node_from_nodes(Operation::Any { axes: AxisSet::from([0]) }, &[a])
            .unwrap();

        let err = graph.copy_with_new_args(any, &[OutputRef::new(b, 0)]).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(graph.len(), 3);
        assert!(graph.output_target_inputs(OutputRef::new(b, 0)).unwrap().is_empty());

        let err = graph.copy_with_new_args(any, &[]).unwrap_err();
        assert!(matches!(err, GraphError::ArityMismatch { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn test_arity_mismatch_is_internal() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, [2]);
        let err = graph.add_node_from_nodes(Operation::Add, &[a]).unwrap_err();
        assert!(matches!(err, GraphError::ArityMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_remove_node_requires_no_users() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, [2]);
        let r = graph.add_node_from_nodes(Operation::Result, &[a]).unwrap();

        assert!(matches!(graph.remove_node(a), Err(GraphError::NodeHasUsers { users: 1, .. })));
        graph.remove_node(r).unwrap();
        assert!(graph.output_target_inputs(OutputRef::new(a, 0)).unwrap().is_empty());
        assert!(matches!(graph.node(r), Err(GraphError::NodeNotFound(_))));
        graph.remove_node(a).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_topological_order_respects_control_dependencies() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, [2]);
        let b = parameter(&mut graph, ElementType::F32, [2]);
        // b must come after the result of a even though no data flows between them
        let ra = graph.add_node_from_nodes(Operation::Result, &[a]).unwrap();
        graph.add_control_dependency(b, ra).unwrap();

        let order = graph.topological_order().unwrap();
        let pos = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(ra) < pos(b));
        assert!(pos(a) < pos(ra));
    }

    #[test]
    fn test_control_dependency_cycle_detected() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::F32, [2]);
        let r = graph.add_node_from_nodes(Operation::Result, &[a]).unwrap();
        graph.add_control_dependency(a, r).unwrap();
        assert!(matches!(graph.topological_order(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_describe_node() {
        let mut graph = Graph::new();
        let a = parameter(&mut graph, ElementType::Boolean, [2, 4]);
        let all = graph
            .add_node_from_nodes(Operation::All { axes: AxisSet::from([1]) }, &[a])
            .unwrap();

        let short = graph.describe_node(all, true).unwrap();
        assert!(short.starts_with("All All_"));
        let long = graph.describe_node(all, false).unwrap();
        assert!(long.contains("[0]:boolean{2,4}"));
        assert!(long.ends_with("-> (boolean{2})"));
    }
}
