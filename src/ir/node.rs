// IR Node Types
//
// Defines the closed set of operations and the graph vertex that carries
// one operation instance together with its edges and inferred outputs.

use crate::core::error::{GraphError, Result};
use crate::ir::function::Function;
use crate::ir::handles::{InputRef, OutputRef};
use crate::ir::shape::{AxisSet, PartialShape, Shape};
use crate::ir::tensor::TensorDescriptor;
use crate::types::ElementType;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Process-wide instance counter. Starts at zero when the process starts,
/// only ever increases, and is never reset.
static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn next_instance_id() -> usize {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::SeqCst)
}

lazy_static::lazy_static! {
    static ref KINDS_BY_NAME: HashMap<&'static str, OpKind> = OpKind::ALL
        .iter()
        .map(|kind| (kind.name(), *kind))
        .collect();
}

/// Stable handle of a node inside one graph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operation tag, compared by value for pattern matching and kernel dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Parameter,
    Result,
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    Power,
    And,
    Or,
    Xor,
    All,
    Any,
    Sum,
    Product,
    Convert,
    Split,
    GetOutputElement,
    Call,
}

impl OpKind {
    pub const ALL: [OpKind; 20] = [
        OpKind::Parameter,
        OpKind::Result,
        OpKind::Add,
        OpKind::Subtract,
        OpKind::Multiply,
        OpKind::Divide,
        OpKind::Maximum,
        OpKind::Minimum,
        OpKind::Power,
        OpKind::And,
        OpKind::Or,
        OpKind::Xor,
        OpKind::All,
        OpKind::Any,
        OpKind::Sum,
        OpKind::Product,
        OpKind::Convert,
        OpKind::Split,
        OpKind::GetOutputElement,
        OpKind::Call,
    ];

    /// Type name of the operation. Contains no spaces; backends use it
    /// verbatim for dispatch.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Parameter => "Parameter",
            OpKind::Result => "Result",
            OpKind::Add => "Add",
            OpKind::Subtract => "Subtract",
            OpKind::Multiply => "Multiply",
            OpKind::Divide => "Divide",
            OpKind::Maximum => "Maximum",
            OpKind::Minimum => "Minimum",
            OpKind::Power => "Power",
            OpKind::And => "And",
            OpKind::Or => "Or",
            OpKind::Xor => "Xor",
            OpKind::All => "All",
            OpKind::Any => "Any",
            OpKind::Sum => "Sum",
            OpKind::Product => "Product",
            OpKind::Convert => "Convert",
            OpKind::Split => "Split",
            OpKind::GetOutputElement => "GetOutputElement",
            OpKind::Call => "Call",
        }
    }

    pub fn from_name(name: &str) -> Option<OpKind> {
        KINDS_BY_NAME.get(name).copied()
    }

    pub fn is_binary_arithmetic(&self) -> bool {
        matches!(
            self,
            OpKind::Add
                | OpKind::Subtract
                | OpKind::Multiply
                | OpKind::Divide
                | OpKind::Maximum
                | OpKind::Minimum
                | OpKind::Power
        )
    }

    pub fn is_binary_logical(&self) -> bool {
        matches!(self, OpKind::And | OpKind::Or | OpKind::Xor)
    }

    pub fn is_reduction(&self) -> bool {
        matches!(self, OpKind::All | OpKind::Any | OpKind::Sum | OpKind::Product)
    }

    /// Operand order does not affect the result
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            OpKind::Add
                | OpKind::Multiply
                | OpKind::Maximum
                | OpKind::Minimum
                | OpKind::And
                | OpKind::Or
                | OpKind::Xor
        )
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Operation with its op-specific parameters
#[derive(Debug, Clone)]
pub enum Operation {
    // ===== Graph boundary =====
    /// Graph input with a declared descriptor
    Parameter {
        element_type: ElementType,
        shape: PartialShape,
    },
    /// Graph output marker
    Result,

    // ===== Binary elementwise arithmetic =====
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    Power,

    // ===== Binary elementwise logical =====
    And,
    Or,
    Xor,

    // ===== Reductions =====
    /// Logical conjunction over `axes`
    All { axes: AxisSet },
    /// Logical disjunction over `axes`
    Any { axes: AxisSet },
    Sum { axes: AxisSet },
    Product { axes: AxisSet },

    // ===== Structural =====
    /// Element type conversion
    Convert { destination_type: ElementType },
    /// Split into `parts` equal pieces along `axis`; one output per piece
    Split { axis: usize, parts: usize },
    /// Forward output `n` of a multi-output producer as a single value
    GetOutputElement { n: usize },
    /// Invoke a nested function
    Call { function: Arc<Function> },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Parameter { .. } => OpKind::Parameter,
            Operation::Result => OpKind::Result,
            Operation::Add => OpKind::Add,
            Operation::Subtract => OpKind::Subtract,
            Operation::Multiply => OpKind::Multiply,
            Operation::Divide => OpKind::Divide,
            Operation::Maximum => OpKind::Maximum,
            Operation::Minimum => OpKind::Minimum,
            Operation::Power => OpKind::Power,
            Operation::And => OpKind::And,
            Operation::Or => OpKind::Or,
            Operation::Xor => OpKind::Xor,
            Operation::All { .. } => OpKind::All,
            Operation::Any { .. } => OpKind::Any,
            Operation::Sum { .. } => OpKind::Sum,
            Operation::Product { .. } => OpKind::Product,
            Operation::Convert { .. } => OpKind::Convert,
            Operation::Split { .. } => OpKind::Split,
            Operation::GetOutputElement { .. } => OpKind::GetOutputElement,
            Operation::Call { .. } => OpKind::Call,
        }
    }

    /// Number of arguments the operation takes
    pub fn arity(&self) -> usize {
        match self {
            Operation::Parameter { .. } => 0,
            Operation::Call { function } => function.parameters().len(),
            op if op.kind().is_binary_arithmetic() || op.kind().is_binary_logical() => 2,
            _ => 1,
        }
    }

    /// Number of outputs, fixed when the node is created
    pub fn output_count(&self) -> usize {
        match self {
            Operation::Split { parts, .. } => *parts,
            Operation::Call { function } => function.results().len(),
            _ => 1,
        }
    }

    /// Same kind and same op-specific parameters
    pub fn same_attributes(&self, other: &Operation) -> bool {
        use Operation::*;

        match (self, other) {
            (
                Parameter {
                    element_type: t1,
                    shape: s1,
                },
                Parameter {
                    element_type: t2,
                    shape: s2,
                },
            ) => t1 == t2 && s1.same_scheme(s2),
            (All { axes: a1 }, All { axes: a2 })
            | (Any { axes: a1 }, Any { axes: a2 })
            | (Sum { axes: a1 }, Sum { axes: a2 })
            | (Product { axes: a1 }, Product { axes: a2 }) => a1 == a2,
            (
                Convert {
                    destination_type: t1,
                },
                Convert {
                    destination_type: t2,
                },
            ) => t1 == t2,
            (
                Split {
                    axis: a1,
                    parts: p1,
                },
                Split {
                    axis: a2,
                    parts: p2,
                },
            ) => a1 == a2 && p1 == p2,
            (GetOutputElement { n: n1 }, GetOutputElement { n: n2 }) => n1 == n2,
            (Call { function: f1 }, Call { function: f2 }) => Arc::ptr_eq(f1, f2),
            _ => self.kind() == other.kind(),
        }
    }

    /// Rendered op-specific parameters, empty when there are none
    pub fn attributes(&self) -> String {
        match self {
            Operation::Parameter {
                element_type,
                shape,
            } => format!("element_type={}, shape={}", element_type, shape),
            Operation::All { axes }
            | Operation::Any { axes }
            | Operation::Sum { axes }
            | Operation::Product { axes } => format!("axes={}", axes),
            Operation::Convert { destination_type } => {
                format!("destination_type={}", destination_type)
            }
            Operation::Split { axis, parts } => format!("axis={}, parts={}", axis, parts),
            Operation::GetOutputElement { n } => format!("n={}", n),
            Operation::Call { function } => format!("function={}", function.name()),
            _ => String::new(),
        }
    }
}

/// Device or partition an operation is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Placement {
    /// Not assigned
    #[default]
    Default,
    Interpreter,
    Cpu,
    Gpu,
    Nnp,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Placement::Default => write!(f, "default"),
            Placement::Interpreter => write!(f, "interpreter"),
            Placement::Cpu => write!(f, "cpu"),
            Placement::Gpu => write!(f, "gpu"),
            Placement::Nnp => write!(f, "nnp"),
        }
    }
}

/// Input slot bound to exactly one producer output
#[derive(Debug, Clone)]
pub(crate) struct InputSlot {
    pub(crate) source: OutputRef,
}

/// Output slot: its descriptor plus the consumer inputs bound to it
#[derive(Debug, Clone)]
pub(crate) struct OutputSlot {
    pub(crate) descriptor: TensorDescriptor,
    pub(crate) targets: BTreeSet<InputRef>,
}

impl OutputSlot {
    pub(crate) fn unresolved() -> Self {
        Self {
            descriptor: TensorDescriptor::unresolved(),
            targets: BTreeSet::new(),
        }
    }
}

/// Graph vertex: one operation instance.
///
/// Nodes compare, order and hash by instance id, never by address, so
/// iteration over node sets is reproducible from run to run.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) instance_id: usize,
    pub(crate) op: Operation,
    pub(crate) unique_name: String,
    pub(crate) friendly_name: Option<String>,
    pub(crate) inputs: Vec<InputSlot>,
    pub(crate) outputs: Vec<OutputSlot>,
    pub(crate) control_dependencies: BTreeSet<NodeId>,
    pub(crate) provenance_tags: BTreeSet<String>,
    pub(crate) placement: Placement,
    pub(crate) placement_index: Option<usize>,
}

impl Node {
    pub(crate) fn new(id: NodeId, op: Operation, sources: &[OutputRef], placement: Placement) -> Self {
        let instance_id = next_instance_id();
        let unique_name = format!("{}_{}", op.kind().name(), instance_id);
        let outputs = (0..op.output_count()).map(|_| OutputSlot::unresolved()).collect();

        Self {
            id,
            instance_id,
            unique_name,
            inputs: sources.iter().map(|&source| InputSlot { source }).collect(),
            outputs,
            op,
            friendly_name: None,
            control_dependencies: BTreeSet::new(),
            provenance_tags: BTreeSet::new(),
            placement,
            placement_index: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn instance_id(&self) -> usize {
        self.instance_id
    }

    pub fn op(&self) -> &Operation {
        &self.op
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }

    /// Operation type name, e.g. `Add`
    pub fn description(&self) -> &'static str {
        self.op.kind().name()
    }

    /// Same operation kind as `other`
    pub fn is_same_op_type(&self, other: &Node) -> bool {
        self.kind() == other.kind()
    }

    /// Unique name, fixed at construction
    pub fn name(&self) -> &str {
        &self.unique_name
    }

    /// Friendly name, or the unique name if none was set
    pub fn friendly_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.unique_name)
    }

    /// Set the friendly name. It may be set once; setting the same name
    /// again is accepted, a different one is an error.
    pub fn set_friendly_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        match &self.friendly_name {
            None => {
                self.friendly_name = Some(name);
                Ok(())
            }
            Some(current) if *current == name => Ok(()),
            Some(current) => Err(GraphError::FriendlyNameAlreadySet {
                node: self.id,
                current: current.clone(),
                requested: name,
            }),
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.op, Operation::Parameter { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self.op, Operation::Result)
    }

    pub fn is_commutative(&self) -> bool {
        self.kind().is_commutative()
    }

    /// Nested functions, for nodes that contain subgraphs
    pub fn get_functions(&self) -> Vec<Arc<Function>> {
        match &self.op {
            Operation::Call { function } => vec![Arc::clone(function)],
            _ => Vec::new(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_size(&self) -> usize {
        self.outputs.len()
    }

    /// Producer output bound to input `index`
    pub fn input_source_output(&self, index: usize) -> Result<OutputRef> {
        self.input_slot(index).map(|slot| slot.source)
    }

    /// Producer outputs of every input, in slot order
    pub fn input_sources(&self) -> impl Iterator<Item = OutputRef> + '_ {
        self.inputs.iter().map(|slot| slot.source)
    }

    pub fn output_descriptor(&self, index: usize) -> Result<&TensorDescriptor> {
        self.output_slot(index).map(|slot| &slot.descriptor)
    }

    pub fn output_element_type(&self, index: usize) -> Result<ElementType> {
        self.output_descriptor(index).map(TensorDescriptor::element_type)
    }

    pub fn output_partial_shape(&self, index: usize) -> Result<&PartialShape> {
        self.output_descriptor(index).map(TensorDescriptor::partial_shape)
    }

    /// Static shape of output `index`
    pub fn output_shape(&self, index: usize) -> Result<Shape> {
        self.output_descriptor(index)?.shape()
    }

    /// Element type of the only output
    pub fn element_type(&self) -> Result<ElementType> {
        self.check_single_output()?;
        self.output_element_type(0)
    }

    /// Static shape of the only output
    pub fn shape(&self) -> Result<Shape> {
        self.check_single_output()?;
        self.output_shape(0)
    }

    /// Consumers bound to output `index`
    pub fn output_target_inputs(&self, index: usize) -> Result<&BTreeSet<InputRef>> {
        self.output_slot(index).map(|slot| &slot.targets)
    }

    /// One output with the same element type and shape as `other`'s one output
    pub fn has_same_type(&self, other: &Node) -> bool {
        if self.output_size() != 1 || other.output_size() != 1 {
            return false;
        }
        self.outputs[0].descriptor.same_scheme(&other.outputs[0].descriptor)
    }

    pub fn control_dependencies(&self) -> &BTreeSet<NodeId> {
        &self.control_dependencies
    }

    pub fn provenance_tags(&self) -> &BTreeSet<String> {
        &self.provenance_tags
    }

    pub fn add_provenance_tag(&mut self, tag: impl Into<String>) {
        self.provenance_tags.insert(tag.into());
    }

    pub fn remove_provenance_tag(&mut self, tag: &str) {
        self.provenance_tags.remove(tag);
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    /// Partition index; `None` until assigned
    pub fn placement_index(&self) -> Option<usize> {
        self.placement_index
    }

    pub fn set_placement_index(&mut self, index: Option<usize>) {
        self.placement_index = index;
    }

    fn check_single_output(&self) -> Result<()> {
        if self.outputs.len() != 1 {
            return Err(GraphError::NotSingleOutput {
                node: self.id,
                count: self.outputs.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn input_slot(&self, index: usize) -> Result<&InputSlot> {
        self.inputs
            .get(index)
            .ok_or(GraphError::InputIndexOutOfBounds {
                node: self.id,
                index,
                count: self.inputs.len(),
            })
    }

    pub(crate) fn output_slot(&self, index: usize) -> Result<&OutputSlot> {
        self.outputs
            .get(index)
            .ok_or(GraphError::OutputIndexOutOfBounds {
                node: self.id,
                index,
                count: self.outputs.len(),
            })
    }

    pub(crate) fn output_slot_mut(&mut self, index: usize) -> Result<&mut OutputSlot> {
        let (node, count) = (self.id, self.outputs.len());
        self.outputs
            .get_mut(index)
            .ok_or(GraphError::OutputIndexOutOfBounds { node, index, count })
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.instance_id.cmp(&other.instance_id)
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance_id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_kind_registry() {
        for kind in OpKind::ALL {
            assert_eq!(OpKind::from_name(kind.name()), Some(kind));
            assert!(!kind.name().contains(' '));
        }
        assert_eq!(OpKind::from_name("Conv"), None);
    }

    #[test]
    fn test_kind_families() {
        assert!(OpKind::Add.is_binary_arithmetic());
        assert!(OpKind::Add.is_commutative());
        assert!(!OpKind::Subtract.is_commutative());
        assert!(OpKind::Xor.is_binary_logical());
        assert!(OpKind::All.is_reduction());
        assert!(!OpKind::Split.is_reduction());
    }

    #[test]
    fn test_arity_and_output_count() {
        assert_eq!(Operation::Add.arity(), 2);
        assert_eq!(Operation::And.arity(), 2);
        assert_eq!(Operation::Result.arity(), 1);
        let param = Operation::Parameter {
            element_type: ElementType::F32,
            shape: PartialShape::dynamic(),
        };
        assert_eq!(param.arity(), 0);
        assert_eq!(Operation::Split { axis: 0, parts: 3 }.output_count(), 3);
        assert_eq!(Operation::All { axes: AxisSet::new() }.output_count(), 1);
    }

    #[test]
    fn test_same_attributes() {
        let a = Operation::All {
            axes: AxisSet::from([0, 1]),
        };
        let b = Operation::All {
            axes: AxisSet::from([1, 0]),
        };
        let c = Operation::Any {
            axes: AxisSet::from([0, 1]),
        };
        assert!(a.same_attributes(&b));
        assert!(!a.same_attributes(&c));
        assert!(Operation::Add.same_attributes(&Operation::Add));
        assert!(!Operation::Add.same_attributes(&Operation::Multiply));
    }

    #[test]
    fn test_instance_ids_increase() {
        let first = next_instance_id();
        let second = next_instance_id();
        assert!(second > first);
    }

    #[test]
    fn test_friendly_name_set_once() {
        let mut node = Node::new(NodeId(0), Operation::Result, &[], Placement::Default);
        assert_eq!(node.friendly_name(), node.name());
        node.set_friendly_name("out").unwrap();
        assert_eq!(node.friendly_name(), "out");
        node.set_friendly_name("out").unwrap();
        let err = node.set_friendly_name("other").unwrap_err();
        assert!(matches!(err, GraphError::FriendlyNameAlreadySet { .. }));
        assert!(node.name().starts_with("Result_"));
    }
}
