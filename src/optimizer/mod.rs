// Optimizer Module: IR optimization passes and the rewrite capability
// they use to edit graphs

pub mod cse;
pub mod pass;
pub mod rewrite;

// Re-exports
pub use cse::CsePass;
pub use pass::{OptimizationPass, PassManager};
pub use rewrite::Rewriter;
