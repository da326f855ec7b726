//! Batched forcing of every lazy tensor reachable from a set of roots.
//!
//! Roots are described with the closed `Value` shape set. Collection walks
//! each root depth-first, in order, so the forcing order is deterministic.

use crate::api::error::LoadResult;
use crate::api::types::{EvalReport, WeightMapping};
use crate::core::cancel::CancellationToken;
use crate::core::chunk::batches;
use rustml_core::{eval_many, Evaluatable, LazyTensor, ParamTree};
use rustml_nn::ModuleGraph;
use std::time::Instant;

/// Largest tuple arity the collector decomposes.
pub const MAX_TUPLE_ARITY: usize = 5;

/// A collectible shape.
pub enum Value<'a> {
    Tensor(LazyTensor),
    Tensors(&'a [LazyTensor]),
    TensorMap(&'a WeightMapping),
    Tree(&'a ParamTree),
    /// Anything exposing its inner lazy state
    Evaluatable(&'a dyn Evaluatable),
    Seq(Vec<Value<'a>>),
    /// String-keyed entries, walked in the given order
    Map(Vec<(String, Value<'a>)>),
    /// Heterogeneous group of arity 1 to 5
    Tuple(Vec<Value<'a>>),
    Text(String),
    Int(i64),
    Float(f64),
    /// A shape the collector cannot decompose, by type name
    Other(&'static str),
}

impl std::fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Tensor(t) => write!(f, "Tensor({:?})", t.shape()),
            Value::Tensors(ts) => write!(f, "Tensors(len={})", ts.len()),
            Value::TensorMap(m) => write!(f, "TensorMap(len={})", m.len()),
            Value::Tree(t) => write!(f, "Tree(len={})", t.len()),
            Value::Evaluatable(_) => f.write_str("Evaluatable"),
            Value::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Value::Text(s) => write!(f, "Text({:?})", s),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Other(name) => write!(f, "Other({})", name),
        }
    }
}

/// Conversion into a collectible shape.
pub trait IntoValue<'a> {
    fn into_value(self) -> Value<'a>;
}

impl<'a> IntoValue<'a> for Value<'a> {
    fn into_value(self) -> Value<'a> {
        self
    }
}

impl<'a> IntoValue<'a> for LazyTensor {
    fn into_value(self) -> Value<'a> {
        Value::Tensor(self)
    }
}

impl<'a> IntoValue<'a> for &'a LazyTensor {
    fn into_value(self) -> Value<'a> {
        Value::Tensor(self.clone())
    }
}

impl<'a> IntoValue<'a> for &'a [LazyTensor] {
    fn into_value(self) -> Value<'a> {
        Value::Tensors(self)
    }
}

impl<'a> IntoValue<'a> for &'a Vec<LazyTensor> {
    fn into_value(self) -> Value<'a> {
        Value::Tensors(self.as_slice())
    }
}

impl<'a> IntoValue<'a> for &'a WeightMapping {
    fn into_value(self) -> Value<'a> {
        Value::TensorMap(self)
    }
}

impl<'a> IntoValue<'a> for &'a ParamTree {
    fn into_value(self) -> Value<'a> {
        Value::Tree(self)
    }
}

impl<'a> IntoValue<'a> for &'a ModuleGraph {
    fn into_value(self) -> Value<'a> {
        Value::Evaluatable(self)
    }
}

impl<'a, T: IntoValue<'a>> IntoValue<'a> for Vec<T> {
    fn into_value(self) -> Value<'a> {
        Value::Seq(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<'a> IntoValue<'a> for &str {
    fn into_value(self) -> Value<'a> {
        Value::Text(self.to_string())
    }
}

impl<'a> IntoValue<'a> for String {
    fn into_value(self) -> Value<'a> {
        Value::Text(self)
    }
}

impl<'a> IntoValue<'a> for i64 {
    fn into_value(self) -> Value<'a> {
        Value::Int(self)
    }
}

impl<'a> IntoValue<'a> for usize {
    fn into_value(self) -> Value<'a> {
        Value::Int(self as i64)
    }
}

impl<'a> IntoValue<'a> for f64 {
    fn into_value(self) -> Value<'a> {
        Value::Float(self)
    }
}

macro_rules! tuple_into_value {
    ($($name:ident),+) => {
        impl<'a, $($name: IntoValue<'a>),+> IntoValue<'a> for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_value(self) -> Value<'a> {
                let ($($name,)+) = self;
                Value::Tuple(vec![$($name.into_value()),+])
            }
        }
    };
}

tuple_into_value!(A);
tuple_into_value!(A, B);
tuple_into_value!(A, B, C);
tuple_into_value!(A, B, C, D);
tuple_into_value!(A, B, C, D, E);

/// Append every lazy tensor under `value` to `out`, depth-first.
///
/// Scalars contribute nothing. A handle reachable twice is collected twice.
///
/// # Panics
///
/// On `Value::Other` and on tuples outside arity 1 to 5. These mean the
/// caller built roots the loader was never meant to see.
pub fn collect(value: &Value<'_>, out: &mut Vec<LazyTensor>) {
    match value {
        Value::Tensor(t) => out.push(t.clone()),
        Value::Tensors(ts) => out.extend(ts.iter().cloned()),
        Value::TensorMap(m) => out.extend(m.values().cloned()),
        Value::Tree(tree) => out.extend(tree.tensors()),
        Value::Evaluatable(e) => out.extend(e.inner_state()),
        Value::Seq(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Map(entries) => entries.iter().for_each(|(_, v)| collect(v, out)),
        Value::Tuple(items) => {
            if items.is_empty() || items.len() > MAX_TUPLE_ARITY {
                panic!("unsupported container shape: tuple of arity {}", items.len());
            }
            items.iter().for_each(|v| collect(v, out));
        }
        Value::Text(_) | Value::Int(_) | Value::Float(_) => {}
        Value::Other(name) => panic!("unsupported container shape: {}", name),
    }
}

/// Collect every tensor under `roots` and force them `batch_size` at a
/// time, in collection order. Each batch completes before the next starts.
///
/// Cancellation is checked before every batch.
///
/// # Panics
///
/// See [`collect`].
pub fn eval_all(roots: &[Value<'_>], batch_size: usize, cancel: &CancellationToken) -> LoadResult<EvalReport> {
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };

    let mut tensors = Vec::new();
    for root in roots {
        collect(root, &mut tensors);
    }

    let mut report = EvalReport { tensors: tensors.len(), batch_sizes: Vec::new() };
    for batch in batches(&tensors, batch_size) {
        cancel.checkpoint()?;
        eval_many(batch)?;
        report.batch_sizes.push(batch.len());
        log::debug!("Evaluated batch {} ({} tensor(s))", report.batch_sizes.len(), batch.len());
        std::thread::yield_now();
    }

    log::info!("Evaluated {} tensor(s) in {} batch(es)", report.tensors, report.batch_sizes.len());
    if let Some(t) = _t {
        log::trace!("[perf] load::eval_all n={} {:.3}ms", report.tensors, t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustml_core::{DType, Tensor};
    use std::sync::{Arc, Mutex};

    fn recorded(log: &Arc<Mutex<Vec<u32>>>, id: u32) -> LazyTensor {
        let log = log.clone();
        LazyTensor::from_fn(vec![1], DType::F32, move || {
            log.lock().unwrap().push(id);
            Tensor::from_vec(vec![id as f32], vec![1])
        })
    }

    #[test]
    fn test_collect_order_is_root_then_depth_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t: Vec<LazyTensor> = (0..6).map(|i| recorded(&log, i)).collect();
        let roots = [
            t[0].clone().into_value(),
            Value::Map(vec![
                ("b".into(), (t[1].clone(), "label", 3usize).into_value()),
                ("a".into(), vec![t[2].clone(), t[3].clone()].into_value()),
            ]),
            (1.5f64, &t[4..]).into_value(),
        ];
        let report = eval_all(&roots, 2, &CancellationToken::new()).unwrap();
        assert_eq!(report.tensors, 6);
        assert_eq!(report.batch_sizes, vec![2, 2, 2]);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cancel_before_batch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t: Vec<LazyTensor> = (0..3).map(|i| recorded(&log, i)).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = eval_all(&[(&t).into_value()], 5, &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_scalars_only() {
        let report = eval_all(&[(1i64, "x").into_value()], 5, &CancellationToken::new()).unwrap();
        assert_eq!(report, EvalReport::default());
    }

    #[test]
    #[should_panic(expected = "unsupported container shape: tuple of arity 6")]
    fn test_wide_tuple_panics() {
        let items = (0..6).map(|i| Value::Int(i)).collect();
        let mut out = Vec::new();
        collect(&Value::Tuple(items), &mut out);
    }
}
