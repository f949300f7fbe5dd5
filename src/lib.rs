#![forbid(unsafe_code)]
//! tsflow: a group-key merge join for partitioned time-series streams.
//!
//! The workspace crates, re-exported under one roof:
//! - `tsflow_core`: keys, buffers, records, config, errors.
//! - `tsflow_mem`: the byte budget retained buffers are reserved against.
//! - `tsflow_operators`: the merge join and the engine seams.
//! - `tsflow_exec`: downstream datasets and sinks.

pub use tsflow_core;
pub use tsflow_exec;
pub use tsflow_mem;
pub use tsflow_operators;

pub use tsflow_core::prelude;
