// End-to-End Integration Tests
//
// Tests the complete pipeline: IR Building -> Optimization -> Buffer
// Planning -> Compilation -> Caching, plus adjoint generation on a built
// graph.

use std::sync::Arc;

use tensorgraph::autodiff::{Adjoints, ElementwiseAdjoints};
use tensorgraph::compiler::{compile_function, KernelCache, ScheduleBackend};
use tensorgraph::ir::builder::GraphBuilder;
use tensorgraph::ir::fingerprint::fingerprint;
use tensorgraph::ir::verify::verify_graph;
use tensorgraph::optimizer::{CsePass, PassManager};
use tensorgraph::{ElementType, Function, GraphError, OpKind, OutputRef, PartialShape, Shape};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `sum((a * b) + (a * b), axis 1)` with the product written twice
fn redundant_function() -> Function {
    let mut builder = GraphBuilder::new();
    let a = builder.parameter("a", ElementType::F32, Shape::from([4, 8])).unwrap();
    let b = builder.parameter("b", ElementType::F32, Shape::from([4, 8])).unwrap();
    let p1 = builder.multiply(a, b).unwrap();
    let p2 = builder.multiply(b, a).unwrap();
    let s = builder.add(p1, p2).unwrap();
    let r = builder.sum(s, [1]).unwrap();
    builder.result(r).unwrap();
    builder.build_function("redundant").unwrap()
}

#[test]
fn test_optimize_then_compile() {
    init_logging();
    let mut function = redundant_function();
    assert_eq!(function.graph().len(), 7);

    let mut manager = PassManager::new().with_verification(true);
    manager.add_pass(Box::new(CsePass::new()));
    assert!(manager.run_all(function.graph_mut()).unwrap());
    assert_eq!(function.graph().len(), 6);
    verify_graph(function.graph()).unwrap();

    let compiled = compile_function(&ScheduleBackend::new(), &function).unwrap();
    let kinds: Vec<OpKind> = compiled.schedule().iter().map(|step| step.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OpKind::Parameter,
            OpKind::Parameter,
            OpKind::Multiply,
            OpKind::Add,
            OpKind::Sum,
            OpKind::Result
        ]
    );

    // 4x8 f32 for a, b, product and sum; 4 f32 for reduction and result
    assert_eq!(compiled.plan().total_bytes(), 4 * 128 + 2 * 16);
}

#[test]
fn test_cache_reuses_structurally_equal_functions() {
    init_logging();
    let cache = KernelCache::default();
    let backend = ScheduleBackend::new();

    let first = redundant_function();
    let second = redundant_function();
    assert_eq!(fingerprint(&first).unwrap(), fingerprint(&second).unwrap());

    let a = cache.get_or_compile(&backend, &first).unwrap();
    let b = cache.get_or_compile(&backend, &second).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats().num_entries, 1);
}

#[test]
fn test_dynamic_function_is_not_compiled() {
    let mut builder = GraphBuilder::new();
    let x = builder
        .parameter("x", ElementType::F32, PartialShape::dynamic())
        .unwrap();
    let y = builder.add(x, x).unwrap();
    builder.result(y).unwrap();
    let function = builder.build_function("dynamic").unwrap();

    let err = KernelCache::default()
        .get_or_compile(&ScheduleBackend::new(), &function)
        .unwrap_err();
    assert!(matches!(err, GraphError::NotStatic(_)));
}

#[test]
fn test_oversized_function_is_not_compiled() {
    let mut builder = GraphBuilder::new();
    let x = builder
        .parameter("x", ElementType::F32, Shape::from([usize::MAX / 2, 2]))
        .unwrap();
    builder.result(x).unwrap();
    let function = builder.build_function("oversized").unwrap();

    let cache = KernelCache::default();
    let err = cache.get_or_compile(&ScheduleBackend::new(), &function).unwrap_err();
    assert!(matches!(err, GraphError::SizeOverflow(_)));
    assert_eq!(cache.stats().num_entries, 0);
}

#[test]
fn test_nested_call_compiles() {
    let mut inner = GraphBuilder::new();
    let x = inner.parameter("x", ElementType::I32, Shape::from([6])).unwrap();
    let halves = inner.split(x, 0, 2).unwrap();
    let lo = inner.get_output_element(halves, 0).unwrap();
    let hi = inner.get_output_element(halves, 1).unwrap();
    let m = inner.maximum(lo, hi).unwrap();
    inner.result(m).unwrap();
    let inner = Arc::new(inner.build_function("fold_max").unwrap());

    let mut outer = GraphBuilder::new();
    let v = outer.parameter("v", ElementType::I32, Shape::from([6])).unwrap();
    let call = outer.call(inner, &[v]).unwrap();
    outer.result(call).unwrap();
    let outer = outer.build_function("outer").unwrap();

    assert_eq!(
        outer.output_descriptors().unwrap()[0].shape().unwrap(),
        Shape::from([3])
    );
    let compiled = compile_function(&ScheduleBackend::new(), &outer).unwrap();
    assert!(compiled.schedule().iter().any(|step| step.kind == OpKind::Call));
}

#[test]
fn test_backprop_through_product() {
    init_logging();
    let mut builder = GraphBuilder::new();
    let a = builder.parameter("a", ElementType::F32, Shape::from([3])).unwrap();
    let b = builder.parameter("b", ElementType::F32, Shape::from([3])).unwrap();
    let p = builder.multiply(a, b).unwrap();
    let y = builder.add(p, a).unwrap();
    let seed = builder.parameter("dy", ElementType::F32, Shape::from([3])).unwrap();
    let mut graph = builder.build();

    let adjoints = Adjoints::backprop(
        &mut graph,
        OutputRef::from(y),
        OutputRef::from(seed),
        &ElementwiseAdjoints,
    )
    .unwrap();

    // a gets dy * b from the product and dy from the sum
    let da = adjoints.get(OutputRef::from(a)).unwrap();
    assert_eq!(graph.node(da.node).unwrap().kind(), OpKind::Add);
    assert_eq!(graph.node(da.node).unwrap().shape().unwrap(), Shape::from([3]));

    let db = adjoints.get(OutputRef::from(b)).unwrap();
    assert_eq!(graph.node(db.node).unwrap().kind(), OpKind::Multiply);
    verify_graph(&graph).unwrap();
}
