use rustml_core::{DType, LazyTensor, ParamTree, Tensor};
use rustml_load::{eval_all, CancellationToken, IntoValue, Value, WeightMapping};
use rustml_nn::{Linear, ModuleGraph, ModuleNode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn counted(calls: &Arc<AtomicUsize>) -> LazyTensor {
    let calls = calls.clone();
    LazyTensor::from_fn(vec![1], DType::F32, move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Tensor::from_vec(vec![0.0], vec![1])
    })
}

#[test]
fn twelve_handles_force_in_batches_of_five_five_two() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tensors: Vec<LazyTensor> = (0..12).map(|_| counted(&calls)).collect();

    let report = eval_all(&[(&tensors).into_value()], 5, &CancellationToken::new()).unwrap();

    assert_eq!(report.tensors, 12);
    assert_eq!(report.batch_sizes, vec![5, 5, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 12);
    assert!(tensors.iter().all(LazyTensor::is_evaluated));
}

#[test]
fn mixed_roots_are_walked_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let tagged = |tag: &'static str| {
        let order = order.clone();
        LazyTensor::from_fn(vec![1], DType::F32, move || {
            order.lock().unwrap().push(tag);
            Tensor::from_vec(vec![0.0], vec![1])
        })
    };

    let mut weights = WeightMapping::new();
    weights.insert("z".into(), tagged("map.z"));
    weights.insert("a".into(), tagged("map.a"));
    let tree = ParamTree::unflatten(vec![("layers.1.w", tagged("tree.1")), ("layers.0.w", tagged("tree.0"))]).unwrap();
    let graph = ModuleGraph::new(ModuleNode::dict([("proj", ModuleNode::leaf(Linear::new(2, 2, false)))]));

    let roots = vec![
        (&weights).into_value(),
        Value::Seq(vec![(7i64, tagged("pair")).into_value(), (&tree).into_value()]),
        (&graph).into_value(),
    ];
    let report = eval_all(&roots, 3, &CancellationToken::new()).unwrap();

    assert_eq!(report.tensors, 6);
    assert_eq!(report.batch_sizes, vec![3, 3]);
    assert_eq!(*order.lock().unwrap(), vec!["map.a", "map.z", "pair", "tree.0", "tree.1"]);
    assert!(graph.parameters().iter().all(|(_, t)| t.is_evaluated()));
}

#[test]
fn shared_handles_are_forced_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let t = counted(&calls);
    let report = eval_all(
        &[(t.clone(), t.clone()).into_value(), vec![t.clone()].into_value()],
        2,
        &CancellationToken::new(),
    )
    .unwrap();
    assert_eq!(report.batch_sizes, vec![2, 1]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "unsupported container shape: std::fs::File")]
fn unknown_shape_aborts() {
    let _ = eval_all(&[Value::Other("std::fs::File")], 5, &CancellationToken::new());
}
