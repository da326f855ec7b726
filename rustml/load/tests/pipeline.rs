mod common;

use common::{ramp, write_shard, Behavior, Data, FakeHub};
use rustml_core::LazyTensor;
use rustml_load::{
    CancellationToken, KeyRemap, LoadConfig, LoadError, LoadResult, ModelLoader, ModelReference, NoSanitize,
    QuantizationSpec, WeightMapping,
};
use rustml_nn::{Linear, ModuleGraph, ModuleNode, RmsNorm};
use std::path::Path;

fn write_two_shard_model(dir: &Path) {
    write_shard(
        &dir.join("model-00001-of-00002.safetensors"),
        vec![
            ("model.embed_tokens.weight", ramp(&[4, 8], 0.0)),
            ("model.layers.0.proj.weight", (vec![2, 8], Data::U32((0..16).collect()))),
            ("model.layers.0.proj.scales", ramp(&[2, 1], 0.5)),
            ("model.layers.0.proj.biases", ramp(&[2, 1], -1.0)),
        ],
    );
    write_shard(
        &dir.join("model-00002-of-00002.safetensors"),
        vec![
            ("model.layers.0.norm.weight", ramp(&[8], 1.0)),
            ("model.head.weight", ramp(&[3, 8], 0.1)),
        ],
    );
    std::fs::write(dir.join("config.json"), r#"{"hidden_size": 8}"#).unwrap();
}

/// A graph scaffolded from its own read of `dir`, so no load under test
/// shares tensors with it.
fn scaffold_from(dir: &Path) -> ModuleGraph {
    let hub = FakeHub::new(Behavior::ServerError, dir);
    let reference = ModelReference::LocalDirectory(dir.to_path_buf());
    let (_, weights) = ModelLoader::new(LoadConfig::default())
        .load_weights(&reference, &hub, &NoSanitize)
        .unwrap();
    ModuleGraph::scaffold(&weights).unwrap()
}

fn assert_untouched(before: &[(String, LazyTensor)], graph: &ModuleGraph) {
    let after = graph.parameters();
    assert_eq!(before.len(), after.len());
    for ((k0, t0), (k1, t1)) in before.iter().zip(&after) {
        assert_eq!(k0, k1);
        assert!(t0.same_node(t1), "{} was rebound", k1);
        assert!(!t1.is_evaluated(), "{} was evaluated", k1);
    }
    assert!(graph.leaves().iter().all(|(_, layer)| !layer.is_quantized()));
}

#[test]
fn offline_remote_load_falls_back_and_forces_everything() {
    let tmp = tempfile::tempdir().unwrap();
    write_two_shard_model(&tmp.path().join("org--model"));
    let hub = FakeHub::new(Behavior::Offline, tmp.path());
    let loader = ModelLoader::new(LoadConfig::default());

    let reference = ModelReference::RemoteId("org/model".into());
    let (dir, weights) = loader.load_weights(&reference, &hub, &NoSanitize).unwrap();
    assert_eq!(dir, tmp.path().join("org--model"));
    assert_eq!(weights.len(), 6);
    assert!(weights.values().all(|t| !t.is_evaluated()));

    let mut graph = ModuleGraph::scaffold(&weights).unwrap();
    let spec = QuantizationSpec::new(64, 4).unwrap();
    let report = loader.finish(&dir, weights.clone(), &mut graph, Some(&spec)).unwrap();

    assert_eq!(report.quantized, vec!["model.layers.0.proj".to_string()]);
    assert!(graph.layer("model.layers.0.proj").unwrap().is_quantized());
    for path in ["model.embed_tokens", "model.layers.0.norm", "model.head"] {
        assert!(!graph.layer(path).unwrap().is_quantized(), "{}", path);
    }
    assert_eq!(report.tensors, 6);
    // graph parameters and mapping entries are the same handles
    assert_eq!(report.eval.tensors, 12);
    assert_eq!(report.eval.batch_sizes, vec![5, 5, 2]);
    assert!(graph.parameters().iter().all(|(_, t)| t.is_evaluated()));
    assert!(weights.values().all(|t| t.is_evaluated()));

    let (_, scales) = graph
        .parameters()
        .into_iter()
        .find(|(k, _)| k == "model.layers.0.proj.scales")
        .unwrap();
    assert!(scales.same_node(&weights["model.layers.0.proj.scales"]));
}

#[test]
fn structural_mismatch_leaves_graph_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    write_two_shard_model(tmp.path());
    let loader = ModelLoader::new(LoadConfig::default());
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());

    let mut graph = ModuleGraph::new(ModuleNode::dict([(
        "model",
        ModuleNode::dict([
            ("head", ModuleNode::leaf(Linear::new(8, 3, false))),
            ("final_norm", ModuleNode::leaf(RmsNorm::new(8, 1e-5))),
        ]),
    )]));
    let before = graph.parameters();

    let err = loader
        .load(
            &ModelReference::LocalDirectory(tmp.path().to_path_buf()),
            &hub,
            &NoSanitize,
            &mut graph,
            None,
        )
        .unwrap_err();

    match err {
        LoadError::StructuralMismatch(report) => {
            assert!(report.missing.contains("model.final_norm.weight"));
            assert!(report.unexpected.contains("model.embed_tokens.weight"));
            assert!(!report.unexpected.contains("model.head.weight"));
        }
        other => panic!("expected structural mismatch, got {:?}", other),
    }
    assert_eq!(hub.snapshot_count(), 0);
    let after = graph.parameters();
    assert_eq!(before.len(), after.len());
    for ((k0, t0), (k1, t1)) in before.iter().zip(&after) {
        assert_eq!(k0, k1);
        assert!(t0.same_node(t1));
        assert!(!t1.is_evaluated());
    }
}

#[test]
fn sanitizer_runs_before_apply() {
    let tmp = tempfile::tempdir().unwrap();
    write_shard(
        &tmp.path().join("model.safetensors"),
        vec![
            ("transformer.head.weight", ramp(&[3, 8], 0.0)),
            ("transformer.rotary.inv_freq", ramp(&[4], 0.0)),
        ],
    );
    let loader = ModelLoader::new(LoadConfig::default());
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());
    let reference = ModelReference::LocalDirectory(tmp.path().to_path_buf());
    let remap = KeyRemap::new()
        .prefix("transformer.", "model.")
        .drop_prefix("transformer.rotary.");

    let mut graph = ModuleGraph::new(ModuleNode::dict([(
        "model",
        ModuleNode::dict([("head", ModuleNode::leaf(Linear::new(8, 3, false)))]),
    )]));
    let report = loader.load(&reference, &hub, &remap, &mut graph, None).unwrap();

    assert_eq!(report.tensors, 1);
    assert!(report.quantized.is_empty());
    let head = graph.layer("model.head").unwrap().parameters();
    assert_eq!(head[0].1.eval().unwrap().to_f32_vec().unwrap()[1], 0.01);
}

#[test]
fn sanitizer_errors_abort_the_load() {
    let tmp = tempfile::tempdir().unwrap();
    write_shard(&tmp.path().join("model.safetensors"), vec![("x.weight", ramp(&[2], 0.0))]);
    let loader = ModelLoader::new(LoadConfig::default());
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());
    let reject = |_: WeightMapping| -> LoadResult<WeightMapping> { Err(LoadError::Sanitize("no thanks".into())) };

    let err = loader
        .load_weights(&ModelReference::LocalDirectory(tmp.path().to_path_buf()), &hub, &reject)
        .unwrap_err();
    assert!(matches!(err, LoadError::Sanitize(_)), "got {:?}", err);
}

#[test]
fn cancellation_during_materialize_leaves_graph_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    write_two_shard_model(tmp.path());
    let mut graph = scaffold_from(tmp.path());
    let before = graph.parameters();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let loader = ModelLoader::new(LoadConfig::default()).with_cancellation(cancel);
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());
    let spec = QuantizationSpec::new(64, 4).unwrap();

    let err = loader
        .load(
            &ModelReference::LocalDirectory(tmp.path().to_path_buf()),
            &hub,
            &NoSanitize,
            &mut graph,
            Some(&spec),
        )
        .unwrap_err();
    assert!(err.is_cancelled(), "got {:?}", err);
    assert_untouched(&before, &graph);
}

#[test]
fn cancellation_before_quantize_and_apply_leaves_graph_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    write_two_shard_model(tmp.path());
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());
    let reference = ModelReference::LocalDirectory(tmp.path().to_path_buf());
    let spec = QuantizationSpec::new(64, 4).unwrap();

    // with a spec the quantize phase sees the cancel first; without one, apply
    for quantization in [Some(&spec), None] {
        let mut graph = scaffold_from(tmp.path());
        let before = graph.parameters();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let cancel_after_sanitize = move |weights: WeightMapping| -> LoadResult<WeightMapping> {
            token.cancel();
            Ok(weights)
        };
        let loader = ModelLoader::new(LoadConfig::default()).with_cancellation(cancel);

        let err = loader
            .load(&reference, &hub, &cancel_after_sanitize, &mut graph, quantization)
            .unwrap_err();
        assert!(err.is_cancelled(), "got {:?}", err);
        assert_untouched(&before, &graph);
    }
}
