// Compiler Module: backend boundary and compiled-function caching

pub mod backend;
pub mod cache;

// Re-exports
pub use backend::{
    compile_function, schedule, Backend, BufferPlan, BufferSpec, CompiledFunction, KernelStep,
    ScheduleBackend,
};
pub use cache::{CacheKey, CacheStats, CachedKernel, KernelCache};
