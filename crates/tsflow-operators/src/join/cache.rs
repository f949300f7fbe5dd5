//! Partition-key-indexed store of pending left/right rows.
//!
//! The cache is the sole owner of every buffer it accepts. Each side's rows
//! are held together with the budget guard reserving their bytes, so
//! removing an entry releases the buffers and returns the bytes in one step.

use std::collections::{BTreeMap, BTreeSet};

use tsflow_core::budget::MemoryBudget;
#[cfg(feature = "tracing")]
use tsflow_core::hash::hash_key;
use tsflow_core::prelude::{
    Error, JoinConfig, LateBufferPolicy, PartitionKey, Result, Side, Table,
};
use tsflow_mem::{BudgetGuardImpl, MemoryBudgetImpl, PeakTracker};

use crate::join::function::{EvalContext, JoinFn};
use crate::join::merge::merge_join;
use crate::join::rows::RowIterator;
use crate::traits::TableCache;

const BUDGET_TAG: &str = "merge_join_cache";

struct SideRows {
    rows: RowIterator,
    guard: BudgetGuardImpl,
}

#[derive(Default)]
struct CacheEntry {
    left: Option<SideRows>,
    right: Option<SideRows>,
}

impl CacheEntry {
    fn ready(&self) -> bool {
        matches!(
            (&self.left, &self.right),
            (Some(l), Some(r)) if !l.rows.is_empty() && !r.rows.is_empty()
        )
    }

    fn side_mut(&mut self, side: Side) -> &mut Option<SideRows> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

pub struct PartitionCache {
    join_fn: JoinFn,
    entries: BTreeMap<PartitionKey, CacheEntry>,
    /// Keys whose processing was aborted; their rows are refused.
    failed: BTreeSet<PartitionKey>,
    late_buffers: LateBufferPolicy,
    budget: MemoryBudgetImpl,
    peak: PeakTracker,
    ctx: EvalContext,
}

impl PartitionCache {
    pub fn new(join_fn: JoinFn, config: &JoinConfig) -> Self {
        Self {
            join_fn,
            entries: BTreeMap::new(),
            failed: BTreeSet::new(),
            late_buffers: config.late_buffers,
            budget: MemoryBudgetImpl::new(config.mem_cap_bytes),
            peak: PeakTracker::new(),
            ctx: EvalContext::new(),
        }
    }

    /// Evaluate row functions under `ctx` instead of a private context.
    pub fn with_context(mut self, ctx: EvalContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Store `rows` for `side` of `key`.
    ///
    /// If the side already holds rows, the late-buffer policy decides whether
    /// the new rows are appended or released unread. Rows for a failed key are
    /// released unread. On error the offered rows are released.
    pub fn insert(&mut self, side: Side, key: PartitionKey, rows: RowIterator) -> Result<()> {
        if self.failed.contains(&key) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%key, %side, "dropping rows for failed partition");
            return Ok(());
        }

        let bytes = rows.retained_bytes();
        let entry = self.entries.entry(key.clone()).or_default();
        let slot = entry.side_mut(side);
        let res = match slot {
            // An empty side has nothing to lose; let the new rows take its place.
            Some(existing) if !existing.rows.is_empty() => match self.late_buffers {
                LateBufferPolicy::KeepFirst => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        %key,
                        %side,
                        rows = rows.len(),
                        "side already bound, dropping late table"
                    );
                    Ok(())
                }
                LateBufferPolicy::Append => {
                    if rows.columns() != existing.rows.columns() {
                        Err(Error::Invalid(format!(
                            "late {} table for key {} changes the column layout of its stream",
                            side, key
                        )))
                    } else {
                        match existing.guard.try_grow(bytes) {
                            Ok(()) => existing.rows.extend(rows.into_buffers()),
                            Err(e) => Err(e.into()),
                        }
                    }
                }
            },
            _ => match self.budget.acquire(bytes, BUDGET_TAG) {
                Ok(guard) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%key, %side, rows = rows.len(), bytes, "bound side rows");
                    // Replacing an empty side drops its guard and buffers here.
                    *slot = Some(SideRows { rows, guard });
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
        };

        if entry.left.is_none() && entry.right.is_none() {
            // Nothing was stored; don't leave an empty entry behind.
            self.entries.remove(&key);
        }
        self.peak.record_used(self.budget.used_bytes());
        res
    }

    /// Both sides present, each with at least one row.
    pub fn is_ready(&self, key: &PartitionKey) -> bool {
        self.entries.get(key).map_or(false, CacheEntry::ready)
    }

    pub fn contains(&self, key: &PartitionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_failed(&self, key: &PartitionKey) -> bool {
        self.failed.contains(key)
    }

    /// Run the merge join for a ready partition.
    ///
    /// The entry stays in the cache; the caller discards or expires it.
    pub fn materialize(&mut self, key: &PartitionKey) -> Result<Table> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| {
                Error::Internal(format!("no entry for partition key {} in cache", key))
            })?;
        let (left, right) = match (&entry.left, &entry.right) {
            (Some(l), Some(r)) if entry.ready() => (&l.rows, &r.rows),
            _ => {
                return Err(Error::Internal(format!(
                    "partition key {} is not ready to be joined",
                    key
                )))
            }
        };

        let f = self.join_fn.prepare(left.columns(), right.columns())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            %key,
            key_hash = hash_key(key).short(),
            left_rows = left.len(),
            right_rows = right.len(),
            left_last = ?left.last_time(),
            right_last = ?right.last_time(),
            "joining partition"
        );
        let table = merge_join(&self.ctx, key, left, right, &f)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(%key, rows = table.num_rows(), "joined partition");
        Ok(table)
    }

    /// Remove a consumed partition, releasing its buffers.
    pub fn discard(&mut self, key: &PartitionKey) {
        self.delete(key);
    }

    /// Remove a partition that will never be consumed, releasing its buffers.
    pub fn expire(&mut self, key: &PartitionKey) {
        self.delete(key);
    }

    /// Release a partition's buffers and refuse any it is sent later.
    pub fn fail(&mut self, key: &PartitionKey) {
        self.delete(key);
        self.failed.insert(key.clone());
        #[cfg(feature = "tracing")]
        tracing::debug!(%key, "partition failed");
    }

    fn delete(&mut self, key: &PartitionKey) -> bool {
        // Dropping the entry drops both iterators (releasing their buffers)
        // and both guards (returning their bytes).
        self.entries.remove(key).is_some()
    }

    /// Visit ready keys in key order.
    pub fn for_each_ready<F: FnMut(&PartitionKey)>(&self, mut f: F) {
        for (key, entry) in &self.entries {
            if entry.ready() {
                f(key);
            }
        }
    }

    pub fn ready_keys(&self) -> Vec<PartitionKey> {
        let mut keys = vec![];
        self.for_each_ready(|k| keys.push(k.clone()));
        keys
    }

    /// Discard every partition and forget failed keys.
    pub fn clean(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            partitions = self.entries.len(),
            bytes = self.budget.used_bytes(),
            peak = self.peak.peak(),
            "cleaning merge join cache"
        );
        self.entries.clear();
        self.failed.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently reserved for retained buffers.
    pub fn retained_bytes(&self) -> usize {
        self.budget.used_bytes()
    }

    pub fn peak_retained_bytes(&self) -> usize {
        self.peak.peak()
    }

    pub fn join_fn(&self) -> &JoinFn {
        &self.join_fn
    }
}

impl TableCache for PartitionCache {
    fn table(&mut self, key: &PartitionKey) -> Result<Table> {
        self.materialize(key)
    }

    fn for_each_ready(&self, f: &mut dyn FnMut(&PartitionKey)) {
        PartitionCache::for_each_ready(self, f)
    }

    fn keys(&self) -> Vec<PartitionKey> {
        self.entries.keys().cloned().collect()
    }

    fn discard_table(&mut self, key: &PartitionKey) {
        self.discard(key)
    }

    fn expire_table(&mut self, key: &PartitionKey) {
        self.expire(key)
    }
}
