// Graph Rewriting
//
// Graph surgery for optimization passes. A `Rewriter` holds the graph
// mutably for the duration of a rewrite and keeps fan-out sets, provenance
// and control dependencies consistent while edges move. Consumers whose
// inputs changed are revalidated in execution order.

use crate::core::error::{GraphError, Result};
use crate::ir::graph::Graph;
use crate::ir::handles::{InputRef, OutputRef};
use crate::ir::node::{Node, NodeId};
use std::collections::BTreeSet;

/// Mutation capability handed to optimization passes
pub struct Rewriter<'g> {
    graph: &'g mut Graph,
}

impl<'g> Rewriter<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    /// Rebind every consumer of `from` to `to`.
    ///
    /// Returns the rebound inputs. Consumers are not revalidated.
    pub fn replace_output_uses(&mut self, from: OutputRef, to: OutputRef) -> Result<Vec<InputRef>> {
        if from == to {
            return Ok(Vec::new());
        }
        let targets: Vec<InputRef> = self.graph.output_target_inputs(from)?.iter().copied().collect();
        for &target in &targets {
            if target.node == to.node {
                return Err(GraphError::InvalidRewrite(format!(
                    "rebinding {} to {} would make {} consume itself",
                    target, to, to.node
                )));
            }
        }
        for &target in &targets {
            self.graph.replace_input_source_output(target, to)?;
        }
        Ok(targets)
    }

    /// Make `replacement` stand in for `target`.
    ///
    /// Each output of `target` hands its consumers to the same-index output
    /// of `replacement`. Provenance tags and control dependencies carry
    /// over, and every affected consumer is revalidated. `target` is left
    /// in the graph without users.
    ///
    /// Fails without touching the graph if the moved edges would close a
    /// cycle through `replacement`.
    pub fn replace_node(&mut self, target: NodeId, replacement: NodeId) -> Result<()> {
        if target == replacement {
            return Ok(());
        }
        let target_outputs = self.graph.node(target)?.output_size();
        let replacement_outputs = self.graph.node(replacement)?.output_size();
        if target_outputs != replacement_outputs {
            return Err(GraphError::InvalidRewrite(format!(
                "{} has {} outputs but its replacement {} has {}",
                target, target_outputs, replacement, replacement_outputs
            )));
        }
        self.check_replacement_acyclic(target, replacement)?;

        let mut consumers = BTreeSet::new();
        for index in 0..target_outputs {
            let moved = self.replace_output_uses(
                OutputRef::new(target, index),
                OutputRef::new(replacement, index),
            )?;
            consumers.extend(moved.into_iter().map(|input| input.node));
        }

        self.graph.merge_provenance_tags_from(replacement, target)?;

        let dependencies: Vec<NodeId> = self.graph.node(target)?.control_dependencies().iter().copied().collect();
        for dependency in dependencies {
            if dependency != replacement {
                self.graph.add_control_dependency(replacement, dependency)?;
            }
        }
        let dependents: Vec<NodeId> = self
            .graph
            .nodes()
            .into_iter()
            .filter(|node| node.control_dependencies().contains(&target))
            .map(Node::id)
            .collect();
        for dependent in dependents {
            self.graph.remove_control_dependency(dependent, target)?;
            if dependent != replacement {
                self.graph.add_control_dependency(dependent, replacement)?;
            }
        }

        log::debug!("replaced {} with {}", target, replacement);
        self.revalidate_downstream(consumers)
    }

    /// Every edge `replace_node` adds ends at or starts from
    /// `replacement`, so a new cycle must pass through it. Walk its
    /// predecessors as they would be after the rewrite.
    fn check_replacement_acyclic(&self, target: NodeId, replacement: NodeId) -> Result<()> {
        let graph = &*self.graph;
        let substitute = |id: NodeId| if id == target { replacement } else { id };
        let predecessors = |id: NodeId| -> Result<Vec<NodeId>> {
            let node = graph.node(id)?;
            let mut preds: Vec<NodeId> = node.input_sources().map(|source| substitute(source.node)).collect();
            preds.extend(
                node.control_dependencies()
                    .iter()
                    .filter(|&&dependency| !(id == replacement && dependency == target))
                    .map(|&dependency| substitute(dependency)),
            );
            if id == replacement {
                preds.extend(
                    graph
                        .node(target)?
                        .control_dependencies()
                        .iter()
                        .copied()
                        .filter(|&dependency| dependency != replacement),
                );
            }
            Ok(preds)
        };

        let mut visited = BTreeSet::new();
        let mut stack = predecessors(replacement)?;
        while let Some(id) = stack.pop() {
            if id == replacement {
                return Err(GraphError::InvalidRewrite(format!(
                    "replacing {} with {} would create a cycle through {}",
                    target, replacement, replacement
                )));
            }
            if visited.insert(id) {
                stack.extend(predecessors(id)?);
            }
        }
        Ok(())
    }

    /// Splice single-input `new_node` into the edge feeding `at`.
    ///
    /// `new_node` takes over the producer `at` was bound to, and `at` is
    /// rebound to output 0 of `new_node`.
    pub fn insert_new_node_between(&mut self, at: InputRef, new_node: NodeId) -> Result<()> {
        let node = self.graph.node(new_node)?;
        if node.input_size() != 1 || node.output_size() != 1 {
            return Err(GraphError::InvalidRewrite(format!(
                "{} must have exactly one input and one output to be inserted on an edge",
                new_node
            )));
        }
        if at.node == new_node {
            return Err(GraphError::InvalidRewrite(format!(
                "{} cannot be inserted in front of itself",
                new_node
            )));
        }

        let source = self.graph.input_source_output(at)?;
        self.graph
            .replace_input_source_output(InputRef::new(new_node, 0), source)?;
        self.graph
            .replace_input_source_output(at, OutputRef::new(new_node, 0))?;

        log::debug!("inserted {} between {} and {}", new_node, source, at);
        self.revalidate_downstream([new_node])
    }

    /// Remove a node that has no remaining users
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        self.graph.remove_node(id)
    }

    /// Revalidate `start` and everything reachable from it through data
    /// edges, producers before consumers
    pub fn revalidate_downstream(&mut self, start: impl IntoIterator<Item = NodeId>) -> Result<()> {
        let mut affected: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack: Vec<NodeId> = start.into_iter().collect();
        while let Some(id) = stack.pop() {
            if affected.insert(id) {
                stack.extend(self.graph.users(id)?);
            }
        }

        for id in self.graph.topological_order()? {
            if affected.contains(&id) {
                self.graph.revalidate_and_infer_types(id)?;
            }
        }
        Ok(())
    }
}
