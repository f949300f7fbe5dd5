//! Dataset that emits an operator's partitions when the operator completes.

use tsflow_core::prelude::{Error, PartitionKey, Result, Time};
use tsflow_operators::traits::{Dataset, TableCache};

use crate::metrics::emit_span;
use crate::sink::TableSink;

/// Pulls every ready partition from the cache on a clean finish and sends
/// it to `S`. Keys that never became ready are expired unread.
pub struct FinishTriggeredDataset<S> {
    sink: S,
}

impl<S: TableSink> FinishTriggeredDataset<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn flush(&mut self, cache: &mut dyn TableCache) -> Result<()> {
        let mut ready: Vec<PartitionKey> = vec![];
        cache.for_each_ready(&mut |k: &PartitionKey| ready.push(k.clone()));

        let (mut tables, mut rows) = (0usize, 0usize);
        for key in &ready {
            let table = cache.table(key)?;
            rows += table.num_rows();
            tables += 1;
            self.sink.process(table)?;
            cache.discard_table(key);
        }
        for key in cache.keys() {
            #[cfg(feature = "tracing")]
            tracing::debug!(%key, "expiring partition that never became ready");
            cache.expire_table(&key);
        }

        emit_span(
            "merge_join_flush",
            &[("tables", tables.to_string()), ("rows", rows.to_string())],
        );
        Ok(())
    }
}

impl<S: TableSink> Dataset for FinishTriggeredDataset<S> {
    fn update_watermark(&mut self, _cache: &mut dyn TableCache, mark: Time) -> Result<()> {
        self.sink.update_watermark(mark)
    }

    fn update_processing_time(&mut self, _cache: &mut dyn TableCache, time: Time) -> Result<()> {
        self.sink.update_processing_time(time)
    }

    fn finish(&mut self, cache: &mut dyn TableCache, err: Option<Error>) {
        let err = match err {
            Some(e) => Some(e),
            None => self.flush(cache).err(),
        };
        #[cfg(feature = "tracing")]
        if let Some(e) = &err {
            tracing::warn!(error = %e, "dataset finished with error");
        }
        self.sink.finish(err);
    }
}
