//! Upstream event dispatch for the merge join.
//!
//! One mutex guards the cache, the downstream dataset and the completion
//! state, so left and right deliveries may arrive on different threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tsflow_core::prelude::{
    DataType, DatasetId, Error, JoinConfig, PartitionKey, Result, Side, Table, Time,
};

use crate::join::cache::PartitionCache;
use crate::join::rows::RowIterator;
use crate::traits::{Dataset, Transformation};

struct JoinState<D> {
    cache: PartitionCache,
    dataset: D,
    /// A parent has finished cleanly.
    done: bool,
    /// Completion was forwarded downstream.
    forwarded: bool,
}

pub struct MergeJoinTransformation<D: Dataset> {
    left: DatasetId,
    right: DatasetId,
    time_column: String,
    state: Mutex<JoinState<D>>,
}

impl<D: Dataset> MergeJoinTransformation<D> {
    pub fn new(
        left: DatasetId,
        right: DatasetId,
        cache: PartitionCache,
        dataset: D,
        config: &JoinConfig,
    ) -> Self {
        Self {
            left,
            right,
            time_column: config.time_column.clone(),
            state: Mutex::new(JoinState {
                cache,
                dataset,
                done: false,
                forwarded: false,
            }),
        }
    }

    pub fn side_of(&self, id: DatasetId) -> Result<Side> {
        if id == self.left {
            Ok(Side::Left)
        } else if id == self.right {
            Ok(Side::Right)
        } else {
            Err(Error::Internal(format!(
                "{} is neither the left ({}) nor the right ({}) parent of this join",
                id, self.left, self.right
            )))
        }
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    /// Run `f` against the cache and dataset under the operator lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&PartitionCache, &D) -> R) -> Result<R> {
        let state = self.lock()?;
        Ok(f(&state.cache, &state.dataset))
    }

    /// True once completion has been forwarded downstream.
    pub fn is_finished(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forwarded
    }

    fn lock(&self) -> Result<MutexGuard<'_, JoinState<D>>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("merge join state lock poisoned".into()))
    }

    /// Index of the time column, if `table` has a usable one.
    fn time_index(&self, table: &Table) -> Result<usize> {
        let key = table.key();
        let idx = table.schema().index_of(&self.time_column).ok_or_else(|| {
            Error::FailedPrecondition(format!(
                "no {} column found in table with key {}",
                self.time_column, key
            ))
        })?;
        if let Some(field) = table.schema().field(idx) {
            if field.data_type != DataType::Time {
                return Err(Error::FailedPrecondition(format!(
                    "column {} in table with key {} has type {}, expected {}",
                    self.time_column,
                    key,
                    field.data_type,
                    DataType::Time
                )));
            }
        }
        let has_null = table
            .buffers()
            .iter()
            .filter_map(|b| b.column(idx))
            .any(|c| c.values.iter().any(|v| v.is_null()));
        if has_null {
            return Err(Error::FailedPrecondition(format!(
                "column {} in table with key {} contains null times",
                self.time_column, key
            )));
        }
        Ok(idx)
    }
}

impl<D: Dataset> Transformation for MergeJoinTransformation<D> {
    fn process(&self, id: DatasetId, table: Table) -> Result<()> {
        let side = self.side_of(id)?;
        let mut state = self.lock()?;
        if state.forwarded {
            return Err(Error::FailedPrecondition(format!(
                "{} table for key {} arrived after the join finished",
                side,
                table.key()
            )));
        }

        let time_col = match self.time_index(&table) {
            Ok(idx) => idx,
            Err(e) => {
                // Dropping `table` below releases its buffers.
                state.cache.fail(table.key());
                return Err(e);
            }
        };

        let key: PartitionKey = table.key().clone();
        let columns = table.schema().fields.clone();
        let rows = RowIterator::new(columns, table.into_buffers(), time_col);
        #[cfg(feature = "tracing")]
        tracing::trace!(
            %key,
            %side,
            rows = rows.len(),
            buffers = rows.buffers().len(),
            "received table"
        );
        state.cache.insert(side, key, rows)
    }

    fn retract_table(&self, _id: DatasetId, _key: &PartitionKey) -> Result<()> {
        Err(Error::Unimplemented(
            "merge join does not support retractions".into(),
        ))
    }

    fn update_watermark(&self, _id: DatasetId, mark: Time) -> Result<()> {
        let mut state = self.lock()?;
        let JoinState { cache, dataset, .. } = &mut *state;
        dataset.update_watermark(cache, mark)
    }

    fn update_processing_time(&self, _id: DatasetId, time: Time) -> Result<()> {
        let mut state = self.lock()?;
        let JoinState { cache, dataset, .. } = &mut *state;
        dataset.update_processing_time(cache, time)
    }

    fn finish(&self, id: DatasetId, err: Option<Error>) {
        // Completion must still be delivered if another caller panicked.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let JoinState {
            cache,
            dataset,
            done,
            forwarded,
        } = &mut *state;

        if *forwarded {
            #[cfg(feature = "tracing")]
            tracing::debug!(%id, failed = err.is_some(), "ignoring finish after completion");
            return;
        }
        if err.is_some() || *done {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                %id,
                failed = err.is_some(),
                pending = cache.len(),
                "forwarding completion"
            );
            *forwarded = true;
            dataset.finish(&mut *cache, err);
            cache.clean();
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(%id, "parent finished, waiting for the other");
        }
        *done = true;
        #[cfg(not(feature = "tracing"))]
        let _ = id;
    }
}
