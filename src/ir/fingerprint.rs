// Function Fingerprint
//
// SHA-256 over the structure of a function. Nodes are identified by their
// position in the topological order rather than by instance id, so two
// structurally identical functions built in different processes, or in a
// different construction order that yields the same execution order, hash
// equal.

use crate::core::error::Result;
use crate::ir::function::Function;
use crate::ir::node::{NodeId, Operation};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub type Fingerprint = [u8; 32];

/// Hash a function's ops, op parameters, edges, descriptors and boundary
pub fn fingerprint(function: &Function) -> Result<Fingerprint> {
    let graph = function.graph();
    let order = function.ordered_ops()?;
    let position: HashMap<NodeId, usize> = order.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
    let position_of = |id: &NodeId| position.get(id).copied().unwrap_or(usize::MAX);

    let mut hasher = Sha256::new();

    for &id in &order {
        let node = graph.node(id)?;

        // Operation type and its parameters
        update_field(&mut hasher, node.kind().name().as_bytes());
        update_field(&mut hasher, node.op().attributes().as_bytes());
        if let Operation::Call { function: callee } = node.op() {
            hasher.update(fingerprint(callee)?);
        }

        // Input dependencies
        hasher.update((node.input_size() as u64).to_le_bytes());
        for source in node.input_sources() {
            hasher.update(position_of(&source.node).to_le_bytes());
            hasher.update(source.index.to_le_bytes());
        }
        for dependency in node.control_dependencies() {
            hasher.update(b"ctrl");
            hasher.update(position_of(dependency).to_le_bytes());
        }

        // Output types
        hasher.update((node.output_size() as u64).to_le_bytes());
        for index in 0..node.output_size() {
            update_field(&mut hasher, node.output_descriptor(index)?.to_string().as_bytes());
        }
        hasher.update(b";");
    }

    for id in function.parameters() {
        hasher.update(b"param");
        hasher.update(position_of(id).to_le_bytes());
    }
    for id in function.results() {
        hasher.update(b"result");
        hasher.update(position_of(id).to_le_bytes());
    }

    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    Ok(hash)
}

/// Length-prefixed, so adjacent variable-length fields cannot run together
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
