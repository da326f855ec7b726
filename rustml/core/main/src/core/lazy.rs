//! Lazy tensor handles.
//!
//! A `LazyTensor` carries its shape and dtype up front and defers producing
//! the bytes until forced. Forcing is memoizing: the computation runs at most
//! once, and every clone of the handle observes the same result.

use crate::api::error::{TensorError, TensorResult};
use crate::api::types::DType;
use crate::core::tensor::{Tensor, TensorShape};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

type Thunk = Box<dyn FnOnce() -> TensorResult<Tensor> + Send>;

enum State {
    Pending(Thunk),
    /// The thunk has been taken and is executing (or panicked mid-run).
    Running,
    Ready(Tensor),
    Failed(TensorError),
}

struct Node {
    shape: TensorShape,
    dtype: DType,
    state: Mutex<State>,
}

impl Node {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared handle to a possibly-unevaluated tensor.
#[derive(Clone)]
pub struct LazyTensor {
    node: Arc<Node>,
}

impl LazyTensor {
    /// Defer `f`, which must produce a tensor of the declared shape and dtype.
    pub fn from_fn<F>(shape: impl Into<TensorShape>, dtype: DType, f: F) -> Self
    where
        F: FnOnce() -> TensorResult<Tensor> + Send + 'static,
    {
        Self {
            node: Arc::new(Node {
                shape: shape.into(),
                dtype,
                state: Mutex::new(State::Pending(Box::new(f))),
            }),
        }
    }

    /// Wrap an already computed tensor.
    pub fn from_tensor(tensor: Tensor) -> Self {
        Self {
            node: Arc::new(Node {
                shape: TensorShape::from_slice(tensor.shape()),
                dtype: tensor.dtype(),
                state: Mutex::new(State::Ready(tensor)),
            }),
        }
    }

    /// A pending F32 tensor of zeros, allocated only when forced.
    pub fn zeros(shape: impl Into<TensorShape>) -> Self {
        let shape: TensorShape = shape.into();
        let alloc = shape.clone();
        Self::from_fn(shape, DType::F32, move || Ok(Tensor::zeros(alloc)))
    }

    /// Derive a new lazy node from this one. `f` receives the forced value.
    pub fn map<F>(&self, shape: impl Into<TensorShape>, dtype: DType, f: F) -> Self
    where
        F: FnOnce(Tensor) -> TensorResult<Tensor> + Send + 'static,
    {
        let parent = self.clone();
        Self::from_fn(shape, dtype, move || f(parent.eval()?))
    }

    pub fn shape(&self) -> &[usize] {
        &self.node.shape
    }

    pub fn dtype(&self) -> DType {
        self.node.dtype
    }

    pub fn numel(&self) -> usize {
        self.node.shape.iter().product()
    }

    /// True once a value has been computed.
    pub fn is_evaluated(&self) -> bool {
        matches!(*self.node.lock(), State::Ready(_))
    }

    /// The computed value, if any, without forcing.
    pub fn value(&self) -> Option<Tensor> {
        match &*self.node.lock() {
            State::Ready(t) => Some(t.clone()),
            _ => None,
        }
    }

    /// True when both handles refer to the same computation.
    pub fn same_node(&self, other: &LazyTensor) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Force the computation and return its value.
    ///
    /// Runs the deferred work on first call only; afterwards returns the
    /// memoized tensor (or the memoized failure).
    pub fn eval(&self) -> TensorResult<Tensor> {
        let mut state = self.node.lock();
        let thunk = match std::mem::replace(&mut *state, State::Running) {
            State::Pending(thunk) => thunk,
            State::Ready(t) => {
                *state = State::Ready(t.clone());
                return Ok(t);
            }
            State::Failed(e) => {
                *state = State::Failed(e.clone());
                return Err(e);
            }
            State::Running => {
                return Err(TensorError::EvaluationFailed(
                    "computation did not complete on a previous attempt".into(),
                ));
            }
        };

        let result = thunk().and_then(|t| self.check(t));
        *state = match &result {
            Ok(t) => State::Ready(t.clone()),
            Err(e) => State::Failed(e.clone()),
        };
        result
    }

    fn check(&self, t: Tensor) -> TensorResult<Tensor> {
        if t.shape() != self.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: t.shape().to_vec(),
            });
        }
        if t.dtype() != self.dtype() {
            return Err(TensorError::DTypeMismatch {
                expected: self.dtype(),
                got: t.dtype(),
            });
        }
        Ok(t)
    }
}

impl fmt::Debug for LazyTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyTensor")
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}

/// Force a group of handles, in order, before returning.
///
/// Stops at the first failure. Handles already evaluated cost nothing.
pub fn eval_many(tensors: &[LazyTensor]) -> TensorResult<()> {
    let _t = if log::log_enabled!(log::Level::Trace) { Some(Instant::now()) } else { None };
    for t in tensors {
        t.eval()?;
    }
    if let Some(t) = _t {
        log::trace!("[perf] lazy::eval_many n={} {:.3}ms", tensors.len(), t.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(())
}
