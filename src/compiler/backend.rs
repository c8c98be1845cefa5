// Compiler Backend Abstraction
//
// Trait for execution backends plus the boundary data they consume: a
// buffer plan giving every node output its element type, static shape and
// byte size, and a kernel schedule listing nodes in execution order with
// their op kind for dispatch. Backends only ever see fully static
// functions.

use crate::core::error::{GraphError, Result};
use crate::ir::function::Function;
use crate::ir::handles::OutputRef;
use crate::ir::node::{NodeId, OpKind};
use crate::ir::shape::Shape;
use crate::ir::verify::require_static;
use crate::types::ElementType;
use std::collections::HashMap;

/// Storage requirements of one node output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSpec {
    pub output: OutputRef,
    pub element_type: ElementType,
    pub shape: Shape,
    pub size_bytes: usize,
}

/// Buffer requirements of every output of a function, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPlan {
    buffers: Vec<BufferSpec>,
    index: HashMap<OutputRef, usize>,
    total_bytes: usize,
}

impl BufferPlan {
    /// Plan buffers for `function`, which must be fully static
    pub fn from_function(function: &Function) -> Result<Self> {
        let graph = function.graph();
        require_static(graph)?;

        let mut plan = BufferPlan::default();
        for id in function.ordered_ops()? {
            let node = graph.node(id)?;
            for index in 0..node.output_size() {
                let descriptor = node.output_descriptor(index)?;
                let shape = descriptor.shape()?;
                let element_type = descriptor.element_type();
                let output = OutputRef::new(id, index);
                let overflow = || GraphError::SizeOverflow(format!("output {} ({})", output, descriptor));
                let size_bytes = shape
                    .num_elements()
                    .and_then(|count| count.checked_mul(element_type.size()))
                    .ok_or_else(overflow)?;
                plan.total_bytes = plan.total_bytes.checked_add(size_bytes).ok_or_else(overflow)?;

                plan.index.insert(output, plan.buffers.len());
                plan.buffers.push(BufferSpec {
                    output,
                    element_type,
                    size_bytes,
                    shape,
                });
            }
        }
        Ok(plan)
    }

    pub fn buffers(&self) -> &[BufferSpec] {
        &self.buffers
    }

    pub fn get(&self, output: OutputRef) -> Option<&BufferSpec> {
        self.index.get(&output).map(|&i| &self.buffers[i])
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

/// One node to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelStep {
    pub node: NodeId,
    pub kind: OpKind,
    pub inputs: Vec<OutputRef>,
    pub outputs: Vec<OutputRef>,
}

/// Every node of `function` in execution order
pub fn schedule(function: &Function) -> Result<Vec<KernelStep>> {
    let graph = function.graph();
    function
        .ordered_ops()?
        .into_iter()
        .map(|id| {
            let node = graph.node(id)?;
            Ok(KernelStep {
                node: id,
                kind: node.kind(),
                inputs: node.input_sources().collect(),
                outputs: (0..node.output_size()).map(|index| OutputRef::new(id, index)).collect(),
            })
        })
        .collect()
}

/// Result of compiling a function for one backend
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    name: String,
    backend: String,
    plan: BufferPlan,
    schedule: Vec<KernelStep>,
}

impl CompiledFunction {
    pub fn new(
        name: impl Into<String>,
        backend: impl Into<String>,
        plan: BufferPlan,
        schedule: Vec<KernelStep>,
    ) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            plan,
            schedule,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn plan(&self) -> &BufferPlan {
        &self.plan
    }

    pub fn schedule(&self) -> &[KernelStep] {
        &self.schedule
    }

    /// Approximate footprint, used by the kernel cache for eviction
    pub fn size_bytes(&self) -> usize {
        self.plan.total_bytes()
    }
}

/// Execution backend trait
pub trait Backend: Send + Sync {
    /// Compile a static function using its buffer plan
    fn compile(&self, function: &Function, plan: &BufferPlan) -> Result<CompiledFunction>;

    /// Check if backend has a kernel for an op kind
    fn supports(&self, _kind: OpKind) -> bool {
        true
    }

    /// Get backend name
    fn name(&self) -> &str;
}

/// Check the static precondition and op support, plan buffers and hand
/// the function to `backend`
pub fn compile_function(backend: &dyn Backend, function: &Function) -> Result<CompiledFunction> {
    let plan = BufferPlan::from_function(function)?;

    for id in function.ordered_ops()? {
        let kind = function.graph().node(id)?.kind();
        if !backend.supports(kind) {
            return Err(GraphError::Backend {
                backend: backend.name().to_string(),
                message: format!("no kernel for {} ({})", kind, id),
            });
        }
    }

    log::debug!(
        "compiling '{}' with {} ({} buffers, {} bytes)",
        function.name(),
        backend.name(),
        plan.buffers().len(),
        plan.total_bytes()
    );
    backend.compile(function, &plan)
}

/// Backend that emits the kernel schedule without generating code
#[derive(Debug, Default)]
pub struct ScheduleBackend;

impl ScheduleBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for ScheduleBackend {
    fn compile(&self, function: &Function, plan: &BufferPlan) -> Result<CompiledFunction> {
        Ok(CompiledFunction::new(
            function.name(),
            self.name(),
            plan.clone(),
            schedule(function)?,
        ))
    }

    fn name(&self) -> &str {
        "schedule"
    }
}
