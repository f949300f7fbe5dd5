#![forbid(unsafe_code)]
//! tsflow-exec: the downstream end of an operator.
//!
//! A `FinishTriggeredDataset` plays the scheduler for an operator's cache:
//! it pulls every ready partition once the operator completes and hands the
//! tables to a `TableSink`.

pub mod dataset;
pub mod metrics;
pub mod sink;

pub use dataset::FinishTriggeredDataset;
pub use sink::{CollectingSink, Completion, TableSink};
