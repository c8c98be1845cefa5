// Reverse-mode Adjoints
//
// Backpropagation over a graph: nodes feeding the root are visited in
// reverse execution order, and each node's rule turns the adjoints of its
// outputs into adjoint contributions for its inputs. Contributions that
// reach the same output are summed with `Add` nodes. The adjoint nodes are
// ordinary graph nodes built through normal construction, so they are
// validated like any other.

use crate::core::error::{GraphError, Result};
use crate::ir::graph::Graph;
use crate::ir::handles::OutputRef;
use crate::ir::node::{NodeId, Operation};
use std::collections::{BTreeSet, HashMap};

/// Per-node adjoint generation
pub trait AdjointRule {
    /// Build adjoint nodes for the inputs of `node`.
    ///
    /// `deltas[i]` is the adjoint of output `i`, `None` when nothing
    /// downstream depends on that output. The returned vector has one entry
    /// per input, `None` for inputs that receive no contribution.
    fn generate_adjoints(
        &self,
        graph: &mut Graph,
        node: NodeId,
        deltas: &[Option<OutputRef>],
    ) -> Result<Vec<Option<OutputRef>>>;
}

/// Adjoints of every output reachable backwards from a root
#[derive(Debug, Default)]
pub struct Adjoints {
    adjoints: HashMap<OutputRef, OutputRef>,
}

impl Adjoints {
    /// Propagate `seed` as the adjoint of `root` back through the graph.
    ///
    /// The rule is called exactly once for every node at least one of
    /// whose outputs received a contribution.
    pub fn backprop(graph: &mut Graph, root: OutputRef, seed: OutputRef, rule: &dyn AdjointRule) -> Result<Self> {
        graph.output(root)?;
        graph.output(seed)?;

        let mut ancestors: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack = vec![root.node];
        while let Some(id) = stack.pop() {
            if ancestors.insert(id) {
                stack.extend(graph.node(id)?.input_sources().map(|source| source.node));
            }
        }
        let order: Vec<NodeId> = graph
            .topological_order()?
            .into_iter()
            .filter(|id| ancestors.contains(id))
            .collect();

        let mut contributions: HashMap<OutputRef, Vec<OutputRef>> = HashMap::new();
        contributions.insert(root, vec![seed]);
        let mut adjoints = HashMap::new();

        for &id in order.iter().rev() {
            let output_count = graph.node(id)?.output_size();
            let mut deltas = Vec::with_capacity(output_count);
            for index in 0..output_count {
                let output = OutputRef::new(id, index);
                let delta = match contributions.remove(&output) {
                    Some(parts) => Some(Self::accumulate(graph, parts)?),
                    None => None,
                };
                if let Some(delta) = delta {
                    adjoints.insert(output, delta);
                }
                deltas.push(delta);
            }
            if deltas.iter().all(Option::is_none) {
                continue;
            }

            let input_adjoints = rule.generate_adjoints(graph, id, &deltas)?;
            let sources: Vec<OutputRef> = graph.node(id)?.input_sources().collect();
            if input_adjoints.len() != sources.len() {
                return Err(GraphError::Autodiff(format!(
                    "rule for {} returned {} adjoints for {} inputs",
                    graph.describe_node(id, true)?,
                    input_adjoints.len(),
                    sources.len()
                )));
            }
            for (source, adjoint) in sources.into_iter().zip(input_adjoints) {
                if let Some(adjoint) = adjoint {
                    contributions.entry(source).or_default().push(adjoint);
                }
            }
            log::trace!("adjoints generated for {}", id);
        }

        Ok(Self { adjoints })
    }

    /// Sum contributions pairwise in arrival order
    fn accumulate(graph: &mut Graph, parts: Vec<OutputRef>) -> Result<OutputRef> {
        let mut parts = parts.into_iter();
        let Some(mut total) = parts.next() else {
            return Err(GraphError::Autodiff("empty adjoint contribution list".to_string()));
        };
        for part in parts {
            total = OutputRef::from(graph.add_node(Operation::Add, &[total, part])?);
        }
        Ok(total)
    }

    /// Adjoint of `output`, if it lies on a path to the root
    pub fn get(&self, output: OutputRef) -> Option<OutputRef> {
        self.adjoints.get(&output).copied()
    }

    pub fn len(&self) -> usize {
        self.adjoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjoints.is_empty()
    }
}

/// Adjoint rules for ops whose derivatives need no constants
#[derive(Debug, Default)]
pub struct ElementwiseAdjoints;

impl AdjointRule for ElementwiseAdjoints {
    fn generate_adjoints(
        &self,
        graph: &mut Graph,
        node: NodeId,
        deltas: &[Option<OutputRef>],
    ) -> Result<Vec<Option<OutputRef>>> {
        let op = graph.node(node)?.op().clone();
        let sources: Vec<OutputRef> = graph.node(node)?.input_sources().collect();
        let delta = deltas.first().copied().flatten();

        match op {
            Operation::Parameter { .. } => Ok(Vec::new()),
            Operation::Result | Operation::GetOutputElement { .. } => Ok(vec![delta]),
            Operation::Add => Ok(vec![delta, delta]),
            Operation::Multiply => {
                let Some(delta) = delta else {
                    return Ok(vec![None, None]);
                };
                let da = graph.add_node(Operation::Multiply, &[delta, sources[1]])?;
                let db = graph.add_node(Operation::Multiply, &[delta, sources[0]])?;
                Ok(vec![Some(da.into()), Some(db.into())])
            }
            Operation::Convert { .. } => {
                let Some(delta) = delta else {
                    return Ok(vec![None]);
                };
                let destination_type = graph.input_element_type(node, 0)?;
                let back = graph.add_node(Operation::Convert { destination_type }, &[delta])?;
                Ok(vec![Some(back.into())])
            }
            other => Err(GraphError::Autodiff(format!(
                "no adjoint rule for {}",
                other.kind()
            ))),
        }
    }
}
