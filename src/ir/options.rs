// Build Options
//
// Graph-wide settings applied when nodes are constructed:
// - Validation: infer types as soon as a node is wired, or leave it to the caller
// - Placement: device assignment given to every new node

use crate::ir::node::Placement;

/// Settings a graph applies to every node it constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Run shape/type inference as part of node construction
    pub validate_on_construct: bool,

    /// Placement assigned to newly constructed nodes
    pub default_placement: Placement,
}

impl BuildOptions {
    /// Eager validation, unassigned placement
    pub fn new() -> Self {
        Self {
            validate_on_construct: true,
            default_placement: Placement::Default,
        }
    }

    /// Construction only wires edges; the caller runs
    /// `Graph::delayed_validate_and_infer_types` later
    pub fn with_delayed_validation() -> Self {
        Self {
            validate_on_construct: false,
            ..Self::new()
        }
    }

    /// Place every new node on `placement`
    pub fn with_default_placement(placement: Placement) -> Self {
        Self {
            default_placement: placement,
            ..Self::new()
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new()
    }
}
