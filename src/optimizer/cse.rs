// Common Subexpression Elimination Pass
//
// Identifies and eliminates redundant computations by finding nodes
// with identical operations and inputs.
//
// Two nodes are equivalent if:
// - They have the same operation kind and parameters
// - They read the same producer outputs (in the same order, or in any
//   order for commutative operations)
// - They have the same control dependencies
//
// Parameters and results are graph boundary and never merged.

use crate::core::error::Result;
use crate::ir::graph::Graph;
use crate::ir::handles::OutputRef;
use crate::ir::node::{Node, NodeId, OpKind};
use crate::optimizer::pass::OptimizationPass;
use crate::optimizer::rewrite::Rewriter;
use std::collections::{BTreeMap, HashMap};

/// Common subexpression elimination pass
pub struct CsePass;

impl CsePass {
    /// Create a new CSE pass
    pub fn new() -> Self {
        Self
    }

    /// Inputs after replacing each eliminated producer by its canonical node
    fn remapped_inputs(node: &Node, canonical_map: &BTreeMap<NodeId, NodeId>) -> Vec<OutputRef> {
        let mut inputs: Vec<OutputRef> = node
            .input_sources()
            .map(|source| OutputRef {
                node: canonical_map.get(&source.node).copied().unwrap_or(source.node),
                index: source.index,
            })
            .collect();
        if node.is_commutative() {
            inputs.sort();
        }
        inputs
    }

    /// Map every redundant node to the earliest equivalent node in
    /// execution order
    pub fn find_equivalence_classes(&self, graph: &Graph) -> Result<BTreeMap<NodeId, NodeId>> {
        let mut canonical_map = BTreeMap::new();
        let mut buckets: HashMap<(OpKind, Vec<OutputRef>), Vec<NodeId>> = HashMap::new();

        for node_id in graph.topological_order()? {
            let node = graph.node(node_id)?;

            // Skip nodes that shouldn't be eliminated
            if node.is_parameter() || node.is_output() {
                continue;
            }

            let key = (node.kind(), Self::remapped_inputs(node, &canonical_map));
            let candidates = buckets.entry(key).or_default();

            let mut found_canonical = None;
            for &earlier_id in candidates.iter() {
                let earlier = graph.node(earlier_id)?;
                if earlier.op().same_attributes(node.op())
                    && earlier.control_dependencies() == node.control_dependencies()
                {
                    found_canonical = Some(earlier_id);
                    break;
                }
            }

            // Map this node to its canonical representative
            match found_canonical {
                Some(canonical_id) => {
                    canonical_map.insert(node_id, canonical_id);
                }
                None => candidates.push(node_id),
            }
        }

        Ok(canonical_map)
    }
}

impl OptimizationPass for CsePass {
    fn run(&mut self, graph: &mut Graph) -> Result<bool> {
        let canonical_map = self.find_equivalence_classes(graph)?;

        if canonical_map.is_empty() {
            return Ok(false);
        }

        // Producers are handled before their consumers so each removal
        // happens once the node's users have moved away
        let order = graph.topological_order()?;
        let mut rewriter = Rewriter::new(graph);
        for node_id in order {
            if let Some(&canonical_id) = canonical_map.get(&node_id) {
                rewriter.replace_node(node_id, canonical_id)?;
                rewriter.remove_node(node_id)?;
                log::trace!("cse: {} folded into {}", node_id, canonical_id);
            }
        }

        log::debug!("cse eliminated {} nodes", canonical_map.len());
        Ok(true)
    }

    fn name(&self) -> &str {
        "cse"
    }
}

impl Default for CsePass {
    fn default() -> Self {
        Self::new()
    }
}
