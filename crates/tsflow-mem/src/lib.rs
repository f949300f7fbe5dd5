#![forbid(unsafe_code)]
//! tsflow-mem: hard memory budgeting for retained buffers.
//!
//! Concrete implementations of the interfaces in `tsflow-core::budget`.
//! Operators that hold buffers beyond a delivery call reserve their bytes
//! here and keep the RAII guard beside the data, so releasing the data and
//! returning the bytes happen together.

pub mod error;
pub mod guard;
pub mod tracking;

pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use tracking::PeakTracker;
