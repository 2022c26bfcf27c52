//! Plan-time computation: diffing and prediction.
//!
//! Everything in this module is pure. Remote calls happen only in the
//! resource orchestrators, after planning has decided what to do.

pub mod diff;
pub mod modifier;

pub use diff::{DiffEngine, DiffResult, Reconcilable};
