// Optimization Pass Infrastructure

use crate::core::error::Result;
use crate::ir::graph::Graph;
use crate::ir::verify::verify_graph;

/// Optimization pass trait
pub trait OptimizationPass {
    /// Run the pass on a graph
    /// Returns true if the graph was modified
    fn run(&mut self, graph: &mut Graph) -> Result<bool>;

    /// Get pass name
    fn name(&self) -> &str;
}

/// Pass manager for running multiple passes
pub struct PassManager {
    passes: Vec<Box<dyn OptimizationPass>>,
    /// Check graph structure after every pass that changed it
    verify: bool,
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            verify: cfg!(debug_assertions),
        }
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.passes.push(pass);
    }

    /// Run every pass once, in insertion order.
    /// Returns true if any pass modified the graph
    pub fn run_all(&mut self, graph: &mut Graph) -> Result<bool> {
        let mut any_changed = false;
        for pass in &mut self.passes {
            log::debug!("Running optimization pass: {}", pass.name());
            let changed = pass.run(graph)?;
            if changed {
                log::debug!("Pass '{}' modified the graph", pass.name());
                if self.verify {
                    verify_graph(graph)?;
                }
            } else {
                log::trace!("Pass '{}' made no changes", pass.name());
            }
            any_changed |= changed;
        }
        Ok(any_changed)
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}
