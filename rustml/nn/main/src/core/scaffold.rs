//! Generic module graphs inferred from a flat weight mapping.
//!
//! Used when no architecture-specific graph is available: each key prefix
//! becomes a leaf, chosen from the names and ranks of its tensors.

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use crate::core::block::ParameterBlock;
use crate::core::embedding::Embedding;
use crate::core::linear::Linear;
use crate::core::module::{ModuleGraph, ModuleNode};
use crate::core::rms_norm::RmsNorm;
use rustml_core::{LazyTensor, SEPARATOR};
use std::collections::BTreeMap;

const EMBEDDING_MARKERS: [&str; 3] = ["embed", "wte", "wpe"];
const SIDE_TENSORS: [&str; 2] = ["scales", "biases"];
const RMS_NORM_EPS: f32 = 1e-5;

enum Pending {
    Leaf(Box<dyn Layer>),
    Node(BTreeMap<String, Pending>),
}

impl Pending {
    fn insert(&mut self, path: &str, segments: &[&str], layer: Box<dyn Layer>) -> NnResult<()> {
        let Pending::Node(children) = self else {
            return Err(NnError::InvalidConfig(format!("'{}' nests under a parameter", path)));
        };
        match segments {
            [] => Err(NnError::InvalidConfig(format!("empty module path for '{}'", path))),
            [last] => {
                if children.contains_key(*last) {
                    return Err(NnError::InvalidConfig(format!("'{}' is both a module and a container", path)));
                }
                children.insert(last.to_string(), Pending::Leaf(layer));
                Ok(())
            }
            [head, rest @ ..] => children
                .entry(head.to_string())
                .or_insert_with(|| Pending::Node(BTreeMap::new()))
                .insert(path, rest, layer),
        }
    }

    fn build(self) -> ModuleNode {
        match self {
            Pending::Leaf(layer) => ModuleNode::Leaf(layer),
            Pending::Node(children) => {
                let indices: Option<Vec<usize>> = children.keys().map(|k| list_index(k)).collect();
                match indices {
                    Some(indices) if !indices.is_empty() => {
                        let len = indices.iter().max().map_or(0, |m| m + 1);
                        let mut items: Vec<ModuleNode> =
                            (0..len).map(|_| ModuleNode::Dict(BTreeMap::new())).collect();
                        for (idx, (_, child)) in indices.into_iter().zip(children) {
                            items[idx] = child.build();
                        }
                        ModuleNode::List(items)
                    }
                    _ => ModuleNode::Dict(children.into_iter().map(|(k, v)| (k, v.build())).collect()),
                }
            }
        }
    }
}

fn list_index(key: &str) -> Option<usize> {
    let idx: usize = key.parse().ok()?;
    (idx.to_string() == key).then_some(idx)
}

fn infer_layer(path: &str, mut params: BTreeMap<String, LazyTensor>) -> NnResult<Box<dyn Layer>> {
    let quantized_source = params.contains_key("weight") && params.contains_key("scales");
    if quantized_source {
        for side in SIDE_TENSORS {
            params.remove(side);
        }
    }
    let last = path.rsplit(SEPARATOR).next().unwrap_or(path);
    let weight = params.get("weight").cloned();
    let bias = params.get("bias").cloned();
    let only_weight_and_bias = params.keys().all(|k| k == "weight" || k == "bias");

    let layer: Box<dyn Layer> = match (weight, only_weight_and_bias) {
        (Some(w), true) if w.shape().len() == 2 && bias.is_none()
            && EMBEDDING_MARKERS.iter().any(|m| last.contains(m)) =>
        {
            Box::new(Embedding::from_weights(w)?)
        }
        (Some(w), true) if w.shape().len() == 2 => Box::new(Linear { weight: w, bias }),
        (Some(w), true) if w.shape().len() == 1 && bias.is_none() => {
            Box::new(RmsNorm::from_weight(w, RMS_NORM_EPS))
        }
        _ => Box::new(ParameterBlock::new(params)),
    };
    Ok(layer)
}

impl ModuleGraph {
    /// Build a graph whose slots are the keys of `weights`.
    ///
    /// Keys are grouped by everything before their last separator. A group
    /// holding `weight` (and optionally `bias`) becomes an `Embedding` when
    /// its name marks an embedding table, a `Linear` when the weight is 2-D,
    /// and an `RmsNorm` when it is 1-D. Any other group is a
    /// `ParameterBlock`. A group that also carries `scales` describes a
    /// quantized checkpoint: its `scales`/`biases` are left out so the slots
    /// appear only once the leaf is quantized. Initial slot values are the
    /// given tensors.
    pub fn scaffold<'a, I>(weights: I) -> NnResult<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a LazyTensor)>,
    {
        let mut groups: BTreeMap<String, BTreeMap<String, LazyTensor>> = BTreeMap::new();
        for (key, value) in weights {
            let (path, name) = key.rsplit_once(SEPARATOR).ok_or_else(|| {
                NnError::InvalidConfig(format!("key '{}' has no module path", key))
            })?;
            groups
                .entry(path.to_string())
                .or_default()
                .insert(name.to_string(), value.clone());
        }

        let mut root = Pending::Node(BTreeMap::new());
        for (path, params) in groups {
            let layer = infer_layer(&path, params)?;
            let segments: Vec<&str> = path.split(SEPARATOR).collect();
            root.insert(&path, &segments, layer)?;
        }
        let graph = ModuleGraph::new(root.build());
        log::debug!("Scaffolded {} module(s)", graph.leaves().len());
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Verify;
    use rustml_core::{DType, ParamTree};

    fn mapping(entries: &[(&str, Vec<usize>, DType)]) -> BTreeMap<String, LazyTensor> {
        entries
            .iter()
            .map(|(k, shape, dtype)| {
                let shape = shape.clone();
                let numel: usize = shape.iter().product();
                let dtype = *dtype;
                let t = LazyTensor::from_fn(shape.clone(), dtype, move || {
                    rustml_core::Tensor::new(vec![0u8; numel * dtype.size()], shape, dtype)
                });
                (k.to_string(), t)
            })
            .collect()
    }

    #[test]
    fn test_scaffold_infers_layers() {
        let weights = mapping(&[
            ("model.embed_tokens.weight", vec![16, 8], DType::F32),
            ("model.layers.0.proj.weight", vec![8, 8], DType::F32),
            ("model.layers.0.proj.bias", vec![8], DType::F32),
            ("model.layers.1.proj.weight", vec![8, 8], DType::F32),
            ("model.norm.weight", vec![8], DType::F32),
            ("model.rotary.inv_freq", vec![4], DType::F32),
        ]);
        let graph = ModuleGraph::scaffold(&weights).unwrap();

        assert_eq!(graph.layer("model.embed_tokens").unwrap().kind(), "Embedding");
        assert_eq!(graph.layer("model.layers.0.proj").unwrap().kind(), "Linear");
        assert_eq!(graph.layer("model.norm").unwrap().kind(), "RmsNorm");
        assert_eq!(graph.layer("model.rotary").unwrap().kind(), "ParameterBlock");
        assert!(matches!(graph.get("model.layers"), Some(ModuleNode::List(items)) if items.len() == 2));

        let keys: Vec<String> = graph.parameters().into_iter().map(|(k, _)| k).collect();
        let expected: Vec<String> = weights.keys().cloned().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, expected);
        assert!(graph.parameters().iter().all(|(_, t)| !t.is_evaluated()));
    }

    #[test]
    fn test_scaffold_defers_side_tensors() {
        let weights = mapping(&[
            ("proj.weight", vec![4, 8], DType::U32),
            ("proj.scales", vec![4, 1], DType::F32),
            ("proj.biases", vec![4, 1], DType::F32),
            ("head.weight", vec![2, 64], DType::F32),
        ]);
        let mut graph = ModuleGraph::scaffold(&weights).unwrap();
        let tree = ParamTree::unflatten(weights.clone()).unwrap();

        assert!(graph.update(&tree, Verify::All).is_err());
        let quantized = graph
            .quantize(64, 4, |path, _| weights.contains_key(&format!("{}.scales", path)))
            .unwrap();
        assert_eq!(quantized, vec!["proj"]);
        graph.update(&tree, Verify::All).unwrap();
        assert_eq!(graph.layer("head").unwrap().kind(), "Linear");
    }

    #[test]
    fn test_scaffold_rejects_bare_keys() {
        let weights = mapping(&[("lonely", vec![1], DType::F32)]);
        assert!(matches!(ModuleGraph::scaffold(&weights), Err(NnError::InvalidConfig(_))));
    }
}
