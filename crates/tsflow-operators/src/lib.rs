#![forbid(unsafe_code)]
//! tsflow-operators: built-in stream operators.
//!
//! Design intent:
//! - Operators are synchronous; the engine owns threads and scheduling.
//! - Data retained past a delivery call is reserved against the memory
//!   budget (`tsflow-mem`) and released with it.
//! - The engine talks to an operator through the seams in `traits`.

pub mod builder;
pub mod join;
pub mod traits;

pub use builder::TableBuilder;
pub use join::{
    EvalContext, JoinFn, MergeJoinTransformation, PartitionCache, PreparedJoinFn, RowFn,
    RowFnCompiler, RowIterator,
};
pub use traits::{Dataset, TableCache, Transformation};
