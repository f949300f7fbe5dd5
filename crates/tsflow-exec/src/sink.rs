//! Final destinations for operator output.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tsflow_core::error::Code;
use tsflow_core::prelude::{Error, Result, Table, Time};

/// Consumer of the tables a dataset materializes.
pub trait TableSink: Send {
    fn process(&mut self, table: Table) -> Result<()>;

    fn update_watermark(&mut self, mark: Time) -> Result<()>;

    fn update_processing_time(&mut self, time: Time) -> Result<()>;

    fn finish(&mut self, err: Option<Error>);
}

/// How a stream ended, as seen by its sink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Completion {
    #[default]
    Pending,
    Succeeded,
    Failed { code: Code, message: String },
}

impl Completion {
    pub fn is_done(&self) -> bool {
        !matches!(self, Completion::Pending)
    }
}

#[derive(Default)]
struct Collected {
    tables: Vec<Table>,
    watermarks: Vec<Time>,
    processing_times: Vec<Time>,
    completion: Completion,
    finish_calls: usize,
    /// Refuse tables once this many have been accepted.
    accept_limit: Option<usize>,
}

/// Sink that keeps everything it receives.
///
/// Clones share the same state, so a test can keep one handle while the
/// dataset owns another.
#[derive(Clone, Default)]
pub struct CollectingSink {
    inner: Arc<Mutex<Collected>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that fails `process` after accepting `n` tables.
    pub fn rejecting_after(n: usize) -> Self {
        let sink = Self::new();
        sink.state().accept_limit = Some(n);
        sink
    }

    fn state(&self) -> MutexGuard<'_, Collected> {
        // Collected data stays readable after a panicking writer.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tables(&self) -> Vec<Table> {
        self.state().tables.clone()
    }

    pub fn table_count(&self) -> usize {
        self.state().tables.len()
    }

    pub fn watermarks(&self) -> Vec<Time> {
        self.state().watermarks.clone()
    }

    pub fn processing_times(&self) -> Vec<Time> {
        self.state().processing_times.clone()
    }

    pub fn completion(&self) -> Completion {
        self.state().completion.clone()
    }

    pub fn finish_calls(&self) -> usize {
        self.state().finish_calls
    }
}

impl TableSink for CollectingSink {
    fn process(&mut self, table: Table) -> Result<()> {
        let mut state = self.state();
        if let Some(limit) = state.accept_limit {
            if state.tables.len() >= limit {
                return Err(Error::ResourceExhausted(format!(
                    "sink is full after {} tables",
                    limit
                )));
            }
        }
        state.tables.push(table);
        Ok(())
    }

    fn update_watermark(&mut self, mark: Time) -> Result<()> {
        self.state().watermarks.push(mark);
        Ok(())
    }

    fn update_processing_time(&mut self, time: Time) -> Result<()> {
        self.state().processing_times.push(time);
        Ok(())
    }

    fn finish(&mut self, err: Option<Error>) {
        let mut state = self.state();
        state.finish_calls += 1;
        state.completion = match err {
            None => Completion::Succeeded,
            Some(e) => Completion::Failed {
                code: e.code(),
                message: e.to_string(),
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsflow_core::prelude::{PartitionKey, Schema};

    #[test]
    fn clones_share_state() {
        let seen = CollectingSink::new();
        let mut writer = seen.clone();
        writer.update_watermark(3).unwrap();
        writer.finish(Some(Error::Invalid("bad".into())));
        assert_eq!(seen.watermarks(), vec![3]);
        assert_eq!(
            seen.completion(),
            Completion::Failed {
                code: Code::Invalid,
                message: "invalid: bad".into()
            }
        );
    }

    #[test]
    fn rejecting_sink_refuses_past_limit() {
        let mut sink = CollectingSink::rejecting_after(0);
        let empty = Table::try_new(PartitionKey::empty(), Schema::empty(), vec![]).unwrap();
        let err = sink.process(empty).unwrap_err();
        assert_eq!(err.code(), Code::ResourceExhausted);
        assert_eq!(sink.table_count(), 0);
    }
}
