//! # RustML Core
//!
//! Tensor storage and lazy evaluation primitives shared by the RustML crates.
//!
//! This crate provides:
//! - `Tensor`: an immutable, multi-dtype value backed by owned or mmap'd bytes
//! - `LazyTensor`: a shared handle to a deferred, memoizing tensor computation
//! - `ParamTree`: nested parameter structures with dotted-key flatten/unflatten
//! - `Evaluatable`: the capability of exposing inner lazy state for forcing
//!
//! ## Example
//!
//! ```rust
//! use rustml_core::{LazyTensor, Tensor};
//!
//! let t = LazyTensor::from_fn(vec![2], rustml_core::DType::F32, || {
//!     Tensor::from_vec(vec![1.0, 2.0], vec![2])
//! });
//! assert!(!t.is_evaluated());
//! t.eval().unwrap();
//! assert!(t.is_evaluated());
//! ```

pub mod api;
mod core;
mod saf;

pub use saf::*;
