//! Nested parameter trees and dotted-key flatten/unflatten.
//!
//! `model.layers.0.attn.weight` unflattens into
//! `Dict{model: Dict{layers: List[Dict{attn: Dict{weight: Tensor}}]}}`.
//! A level whose keys are all canonical non-negative integers becomes a
//! `List`; missing indices are filled with empty dicts.

use crate::api::error::{TensorError, TensorResult};
use crate::core::lazy::LazyTensor;
use std::collections::BTreeMap;

/// Separator between path segments in flat parameter keys.
pub const SEPARATOR: char = '.';

/// A nested structure of lazy tensors.
#[derive(Debug, Clone)]
pub enum ParamTree {
    Tensor(LazyTensor),
    Dict(BTreeMap<String, ParamTree>),
    List(Vec<ParamTree>),
}

enum Builder {
    Leaf(LazyTensor),
    Node(BTreeMap<String, Builder>),
}

impl Builder {
    fn insert(&mut self, full_key: &str, segments: &[&str], value: LazyTensor) -> TensorResult<()> {
        let Builder::Node(children) = self else {
            return Err(TensorError::TreeConflict(full_key.to_string()));
        };
        match segments {
            [] => Err(TensorError::TreeConflict(full_key.to_string())),
            [last] => match children.get(*last) {
                Some(Builder::Node(_)) => Err(TensorError::TreeConflict(full_key.to_string())),
                _ => {
                    children.insert(last.to_string(), Builder::Leaf(value));
                    Ok(())
                }
            },
            [head, rest @ ..] => children
                .entry(head.to_string())
                .or_insert_with(|| Builder::Node(BTreeMap::new()))
                .insert(full_key, rest, value),
        }
    }

    fn build(self) -> ParamTree {
        match self {
            Builder::Leaf(t) => ParamTree::Tensor(t),
            Builder::Node(children) => {
                let indices: Option<Vec<usize>> = children.keys().map(|k| list_index(k)).collect();
                match indices {
                    Some(indices) if !indices.is_empty() => {
                        let len = indices.iter().max().map_or(0, |m| m + 1);
                        let mut items: Vec<ParamTree> =
                            (0..len).map(|_| ParamTree::Dict(BTreeMap::new())).collect();
                        for (idx, (_, child)) in indices.into_iter().zip(children) {
                            items[idx] = child.build();
                        }
                        ParamTree::List(items)
                    }
                    _ => ParamTree::Dict(
                        children.into_iter().map(|(k, v)| (k, v.build())).collect(),
                    ),
                }
            }
        }
    }
}

fn list_index(key: &str) -> Option<usize> {
    let idx: usize = key.parse().ok()?;
    (idx.to_string() == key).then_some(idx)
}

impl ParamTree {
    /// Build a tree from flat dotted keys.
    ///
    /// A key that names both a tensor and the prefix of another key is a
    /// `TreeConflict`. Repeated identical keys keep the last value.
    pub fn unflatten<I, K>(pairs: I) -> TensorResult<Self>
    where
        I: IntoIterator<Item = (K, LazyTensor)>,
        K: AsRef<str>,
    {
        let mut root = Builder::Node(BTreeMap::new());
        for (key, value) in pairs {
            let key = key.as_ref();
            let segments: Vec<&str> = key.split(SEPARATOR).collect();
            root.insert(key, &segments, value)?;
        }
        Ok(root.build())
    }

    /// Flatten back into dotted keys, dict keys in sorted order and list
    /// items in index order.
    pub fn flatten(&self) -> Vec<(String, LazyTensor)> {
        let mut out = Vec::new();
        self.flatten_into(String::new(), &mut out);
        out
    }

    fn flatten_into(&self, prefix: String, out: &mut Vec<(String, LazyTensor)>) {
        let join = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{}{}{}", prefix, SEPARATOR, segment)
            }
        };
        match self {
            ParamTree::Tensor(t) => out.push((prefix.clone(), t.clone())),
            ParamTree::Dict(children) => {
                for (k, v) in children {
                    v.flatten_into(join(k), out);
                }
            }
            ParamTree::List(items) => {
                for (i, v) in items.iter().enumerate() {
                    v.flatten_into(join(&i.to_string()), out);
                }
            }
        }
    }

    /// Every tensor in flatten order.
    pub fn tensors(&self) -> Vec<LazyTensor> {
        self.flatten().into_iter().map(|(_, t)| t).collect()
    }

    /// Look up a subtree by dotted path.
    pub fn get(&self, path: &str) -> Option<&ParamTree> {
        path.split(SEPARATOR).try_fold(self, |node, segment| match node {
            ParamTree::Dict(children) => children.get(segment),
            ParamTree::List(items) => items.get(list_index(segment)?),
            ParamTree::Tensor(_) => None,
        })
    }

    /// Number of tensors in the tree.
    pub fn len(&self) -> usize {
        match self {
            ParamTree::Tensor(_) => 1,
            ParamTree::Dict(children) => children.values().map(ParamTree::len).sum(),
            ParamTree::List(items) => items.iter().map(ParamTree::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
