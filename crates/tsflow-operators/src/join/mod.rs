//! Group-key merge join.
//!
//! Joins the rows of two upstream streams that share a partition key on
//! equal timestamps, combining each matching pair through a user-provided
//! row function.
//!
//! Layout:
//! - `rows`: random access over the buffers of one (side, key) pair.
//! - `function`: per-layout compilation of the row function.
//! - `merge`: the two-cursor join for a single partition.
//! - `cache`: pending rows per key, owner of every retained buffer.
//! - `transform`: upstream event dispatch and completion.

pub mod cache;
pub mod function;
pub mod merge;
pub mod rows;
pub mod transform;

pub use cache::PartitionCache;
pub use function::{EvalContext, FnCompiler, JoinFn, PreparedJoinFn, RowFn, RowFnCompiler};
pub use merge::merge_join;
pub use rows::RowIterator;
pub use transform::MergeJoinTransformation;
