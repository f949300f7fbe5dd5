//! Seams between an operator and the engine around it.
//!
//! The engine delivers upstream events to a `Transformation`. The
//! transformation forwards progress and completion to its downstream
//! `Dataset`, handing it the operator's `TableCache` so the dataset can decide
//! which partitions to pull, and when.
//!
//! Invariants:
//! - `Transformation` methods may be called concurrently from different
//!   upstream threads; implementations serialize them internally.
//! - `Dataset` methods are only ever called with the transformation's lock
//!   held, so they see a consistent cache.

use tsflow_core::prelude::{DatasetId, Error, PartitionKey, Result, Table, Time};

/// Entry point for upstream events.
pub trait Transformation: Send + Sync {
    /// Deliver one partition's table from upstream `id`. Ownership of the
    /// table's buffers moves to the operator.
    fn process(&self, id: DatasetId, table: Table) -> Result<()>;

    fn retract_table(&self, id: DatasetId, key: &PartitionKey) -> Result<()>;

    fn update_watermark(&self, id: DatasetId, mark: Time) -> Result<()>;

    fn update_processing_time(&self, id: DatasetId, time: Time) -> Result<()>;

    /// Called once per upstream parent when it completes, with the error it
    /// failed with, if any.
    fn finish(&self, id: DatasetId, err: Option<Error>);
}

/// Scheduler-facing view of an operator's pending partitions.
pub trait TableCache {
    /// Materialize the output table for a ready partition.
    fn table(&mut self, key: &PartitionKey) -> Result<Table>;

    /// Visit every ready partition key, in key order.
    fn for_each_ready(&self, f: &mut dyn FnMut(&PartitionKey));

    /// Every key currently held, ready or not.
    fn keys(&self) -> Vec<PartitionKey>;

    /// Drop a partition whose table has been consumed.
    fn discard_table(&mut self, key: &PartitionKey);

    /// Drop a partition that will never be consumed.
    fn expire_table(&mut self, key: &PartitionKey);
}

/// Downstream consumer of an operator's output.
pub trait Dataset: Send {
    fn update_watermark(&mut self, cache: &mut dyn TableCache, mark: Time) -> Result<()>;

    fn update_processing_time(&mut self, cache: &mut dyn TableCache, time: Time) -> Result<()>;

    /// Completion of the operator. Called exactly once, before the cache is
    /// cleaned.
    fn finish(&mut self, cache: &mut dyn TableCache, err: Option<Error>);
}
