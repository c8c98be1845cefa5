// Graph Verification
//
// Structural checks that hold for every well-formed graph no matter what
// rewrites ran on it, plus the static-shape precondition backends rely on.

use crate::core::error::{GraphError, Result};
use crate::ir::graph::Graph;
use crate::ir::handles::{InputRef, OutputRef};

/// Verify that a [`Graph`] is well-formed.
///
/// Every input must appear in its producer's fan-out, every fan-out entry
/// must point back at the output holding it, control dependencies must
/// name live nodes, and data plus control edges must be acyclic.
pub fn verify_graph(graph: &Graph) -> Result<()> {
    for node in graph.nodes() {
        let id = node.id();

        for (index, source) in node.input_sources().enumerate() {
            let at = InputRef::new(id, index);
            let targets = graph.output_target_inputs(source).map_err(|_| {
                GraphError::EdgeInconsistent(format!("{} is bound to missing output {}", at, source))
            })?;
            if !targets.contains(&at) {
                return Err(GraphError::EdgeInconsistent(format!(
                    "{} is bound to {} but missing from its fan-out",
                    at, source
                )));
            }
        }

        for index in 0..node.output_size() {
            let output = OutputRef::new(id, index);
            for &target in node.output_target_inputs(index)? {
                match graph.input_source_output(target) {
                    Ok(source) if source == output => {}
                    _ => {
                        return Err(GraphError::EdgeInconsistent(format!(
                            "fan-out of {} lists {} which is not bound to it",
                            output, target
                        )))
                    }
                }
            }
        }

        for &dependency in node.control_dependencies() {
            if !graph.contains(dependency) {
                return Err(GraphError::EdgeInconsistent(format!(
                    "{} has a control dependency on missing node {}",
                    id, dependency
                )));
            }
        }
    }

    graph.topological_order()?;
    Ok(())
}

/// Fail with `NotStatic` naming the first node, in execution order, with
/// an output whose element type or shape is not fully known
pub fn require_static(graph: &Graph) -> Result<()> {
    for id in graph.topological_order()? {
        let node = graph.node(id)?;
        for index in 0..node.output_size() {
            let descriptor = node.output_descriptor(index)?;
            if !descriptor.is_static() {
                return Err(GraphError::NotStatic(format!(
                    "{} output {} is {}",
                    graph.describe_node(id, true)?,
                    index,
                    descriptor
                )));
            }
        }
    }
    Ok(())
}
