//! The module graph: layers arranged in dicts and lists whose paths match
//! dotted checkpoint keys.

use crate::api::error::{NnError, NnResult};
use crate::api::traits::Layer;
use crate::api::types::{MismatchReport, Verify};
use rustml_core::{Evaluatable, LazyTensor, ParamTree, SEPARATOR};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

/// A node of the module graph.
#[derive(Debug)]
pub enum ModuleNode {
    Leaf(Box<dyn Layer>),
    Dict(BTreeMap<String, ModuleNode>),
    List(Vec<ModuleNode>),
}

impl ModuleNode {
    pub fn leaf(layer: impl Layer + 'static) -> Self {
        ModuleNode::Leaf(Box::new(layer))
    }

    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ModuleNode)>,
        K: Into<String>,
    {
        ModuleNode::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(items: impl IntoIterator<Item = ModuleNode>) -> Self {
        ModuleNode::List(items.into_iter().collect())
    }

    fn child(&self, segment: &str) -> Option<&ModuleNode> {
        match self {
            ModuleNode::Dict(children) => children.get(segment),
            ModuleNode::List(items) => items.get(segment.parse::<usize>().ok()?),
            ModuleNode::Leaf(_) => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut ModuleNode> {
        match self {
            ModuleNode::Dict(children) => children.get_mut(segment),
            ModuleNode::List(items) => items.get_mut(segment.parse::<usize>().ok()?),
            ModuleNode::Leaf(_) => None,
        }
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a dyn Layer)>) {
        match self {
            ModuleNode::Leaf(layer) => out.push((prefix.to_string(), layer.as_ref())),
            ModuleNode::Dict(children) => {
                for (k, v) in children {
                    v.collect_leaves(&join(prefix, k), out);
                }
            }
            ModuleNode::List(items) => {
                for (i, v) in items.iter().enumerate() {
                    v.collect_leaves(&join(prefix, &i.to_string()), out);
                }
            }
        }
    }
}

pub(crate) fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, segment)
    }
}

/// Owner of a module tree.
///
/// Mutation happens only through `update` and `quantize`; both validate
/// everything they need before touching a leaf.
#[derive(Debug)]
pub struct ModuleGraph {
    root: ModuleNode,
}

impl ModuleGraph {
    pub fn new(root: ModuleNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &ModuleNode {
        &self.root
    }

    /// Leaf layers with their dotted paths, dict keys sorted, list items in order.
    pub fn leaves(&self) -> Vec<(String, &dyn Layer)> {
        let mut out = Vec::new();
        self.root.collect_leaves("", &mut out);
        out
    }

    /// Every parameter slot as `(dotted key, current value)`.
    pub fn parameters(&self) -> Vec<(String, LazyTensor)> {
        self.leaves()
            .into_iter()
            .flat_map(|(path, layer)| {
                layer
                    .parameters()
                    .into_iter()
                    .map(move |(name, t)| (join(&path, &name), t))
            })
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<&ModuleNode> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split(SEPARATOR).try_fold(&self.root, |node, segment| node.child(segment))
    }

    /// The layer at `path`, if that path names a leaf.
    pub fn layer(&self, path: &str) -> Option<&dyn Layer> {
        match self.get(path)? {
            ModuleNode::Leaf(layer) => Some(layer.as_ref()),
            _ => None,
        }
    }

    fn leaf_mut(&mut self, path: &str) -> Option<&mut Box<dyn Layer>> {
        let node = if path.is_empty() {
            &mut self.root
        } else {
            path.split(SEPARATOR)
                .try_fold(&mut self.root, |node, segment| node.child_mut(segment))?
        };
        match node {
            ModuleNode::Leaf(layer) => Some(layer),
            _ => None,
        }
    }

    /// Bind the tensors of `tree` onto parameter slots.
    ///
    /// With `Verify::All` the slot keys and the tree keys must be equal
    /// sets; otherwise nothing is bound and the difference is returned as a
    /// `StructuralMismatch`. With `Verify::None` unmatched keys on either
    /// side are ignored.
    pub fn update(&mut self, tree: &ParamTree, verify: Verify) -> NnResult<()> {
        let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

        // slot key -> (leaf path, parameter name)
        let mut slots: HashMap<String, (String, String)> = HashMap::new();
        for (path, layer) in self.leaves() {
            for (name, _) in layer.parameters() {
                slots.insert(join(&path, &name), (path.clone(), name));
            }
        }
        let supplied = tree.flatten();

        if verify == Verify::All {
            let supplied_keys: BTreeSet<&str> = supplied.iter().map(|(k, _)| k.as_str()).collect();
            let report = MismatchReport {
                missing: slots
                    .keys()
                    .filter(|k| !supplied_keys.contains(k.as_str()))
                    .cloned()
                    .collect(),
                unexpected: supplied_keys
                    .iter()
                    .filter(|k| !slots.contains_key(**k))
                    .map(|k| k.to_string())
                    .collect(),
            };
            if !report.is_empty() {
                return Err(NnError::StructuralMismatch(report));
            }
        }

        let assignments: Vec<(String, String, LazyTensor)> = supplied
            .into_iter()
            .filter_map(|(key, value)| {
                slots.get(&key).map(|(path, name)| (path.clone(), name.clone(), value))
            })
            .collect();

        let bound = assignments.len();
        for (path, name, value) in assignments {
            let layer = self
                .leaf_mut(&path)
                .ok_or_else(|| NnError::UnknownModule(path.clone()))?;
            layer.set_parameter(&name, value)?;
        }

        log::debug!("Bound {} parameter(s) onto {} slot(s)", bound, slots.len());
        if let Some(t) = _t {
            log::trace!("[perf] nn::module::update n={} {:.3}ms", bound, t.elapsed().as_secs_f64() * 1000.0);
        }
        Ok(())
    }

    /// Replace quantizable leaves selected by `predicate` with their
    /// quantized form. Returns the replaced paths in traversal order.
    ///
    /// Every replacement is built before any leaf is swapped, so a failure
    /// leaves the graph unchanged.
    pub fn quantize<P>(&mut self, group_size: usize, bits: u32, mut predicate: P) -> NnResult<Vec<String>>
    where
        P: FnMut(&str, &dyn Layer) -> bool,
    {
        let mut replacements = Vec::new();
        for (path, layer) in self.leaves() {
            if layer.is_quantizable() && !layer.is_quantized() && predicate(&path, layer) {
                replacements.push((path, layer.to_quantized(group_size, bits)?));
            }
        }

        let mut quantized = Vec::with_capacity(replacements.len());
        for (path, replacement) in replacements {
            let slot = self
                .leaf_mut(&path)
                .ok_or_else(|| NnError::UnknownModule(path.clone()))?;
            log::debug!("Quantized {} ({} -> {})", path, slot.kind(), replacement.kind());
            *slot = replacement;
            quantized.push(path);
        }
        Ok(quantized)
    }
}

impl Evaluatable for ModuleGraph {
    fn inner_state(&self) -> Vec<LazyTensor> {
        self.parameters().into_iter().map(|(_, t)| t).collect()
    }
}
