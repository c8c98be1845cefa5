// Kernel Cache: Cache compiled functions to avoid recompilation
//
// Cache key is the structural fingerprint of the function (ops, op
// parameters, edges and output descriptors), so rebuilding the same graph
// hits the cache even though its instance ids differ.

use crate::compiler::backend::{compile_function, Backend, CompiledFunction};
use crate::core::error::Result;
use crate::ir::fingerprint::{fingerprint, Fingerprint};
use crate::ir::function::Function;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cache key for compiled functions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Hash of the function structure
    ir_hash: Fingerprint,
    /// Backend the function was compiled for
    backend: String,
}

impl CacheKey {
    /// Create a cache key from a function
    pub fn from_function(function: &Function, backend: &str) -> Result<Self> {
        Ok(Self {
            ir_hash: fingerprint(function)?,
            backend: backend.to_string(),
        })
    }

    pub fn ir_hash(&self) -> &Fingerprint {
        &self.ir_hash
    }
}

/// Compiled function with metadata
#[derive(Clone)]
pub struct CachedKernel {
    /// The compiled function
    pub function: Arc<CompiledFunction>,
    /// Number of times this kernel has been used
    pub use_count: usize,
    /// Approximate size in bytes
    pub size_bytes: usize,
}

struct CacheState {
    entries: HashMap<CacheKey, CachedKernel>,
    size_bytes: usize,
}

/// Kernel cache with least-used eviction
pub struct KernelCache {
    state: Mutex<CacheState>,
    /// Maximum cache size in bytes
    max_size_bytes: usize,
}

impl KernelCache {
    /// Create a new kernel cache
    ///
    /// # Arguments
    /// * `max_size_mb` - Maximum cache size in megabytes
    pub fn new(max_size_mb: usize) -> Self {
        Self::with_capacity_bytes(max_size_mb * 1024 * 1024)
    }

    pub fn with_capacity_bytes(max_size_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                size_bytes: 0,
            }),
            max_size_bytes,
        }
    }

    /// Entries stay consistent across a panic in another holder, so a
    /// poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to get a compiled function from the cache
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CompiledFunction>> {
        let mut state = self.lock();

        if let Some(kernel) = state.entries.get_mut(key) {
            kernel.use_count += 1;
            Some(kernel.function.clone())
        } else {
            None
        }
    }

    /// Insert a compiled function into the cache
    pub fn insert(&self, key: CacheKey, function: CompiledFunction) -> Arc<CompiledFunction> {
        let size_bytes = function.size_bytes();
        let function = Arc::new(function);
        let mut state = self.lock();

        if let Some(previous) = state.entries.remove(&key) {
            state.size_bytes = state.size_bytes.saturating_sub(previous.size_bytes);
        }

        // Evict if necessary
        while state.size_bytes.saturating_add(size_bytes) > self.max_size_bytes && !state.entries.is_empty() {
            Self::evict_least_used(&mut state);
        }

        state.entries.insert(
            key,
            CachedKernel {
                function: function.clone(),
                use_count: 1,
                size_bytes,
            },
        );
        state.size_bytes = state.size_bytes.saturating_add(size_bytes);
        function
    }

    /// Cached compilation of `function` for `backend`
    pub fn get_or_compile(&self, backend: &dyn Backend, function: &Function) -> Result<Arc<CompiledFunction>> {
        let key = CacheKey::from_function(function, backend.name())?;
        if let Some(hit) = self.get(&key) {
            log::trace!("kernel cache hit for '{}'", function.name());
            return Ok(hit);
        }

        log::debug!("kernel cache miss for '{}'", function.name());
        let compiled = compile_function(backend, function)?;
        Ok(self.insert(key, compiled))
    }

    fn evict_least_used(state: &mut CacheState) {
        // Find entry with lowest use count
        if let Some((key_to_remove, size_to_remove)) = state
            .entries
            .iter()
            .min_by_key(|(_, kernel)| kernel.use_count)
            .map(|(k, kernel)| (k.clone(), kernel.size_bytes))
        {
            state.entries.remove(&key_to_remove);
            state.size_bytes = state.size_bytes.saturating_sub(size_to_remove);
        }
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.size_bytes = 0;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();

        CacheStats {
            num_entries: state.entries.len(),
            size_bytes: state.size_bytes,
            max_size_bytes: self.max_size_bytes,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub num_entries: usize,
    pub size_bytes: usize,
    pub max_size_bytes: usize,
}

impl Default for KernelCache {
    fn default() -> Self {
        // Default to 100 MB cache
        Self::new(100)
    }
}
