//! MemoryBudget + RAII guard implementations.
//!
//! A guard is held for as long as the bytes it accounts for are retained.
//! Dropping it returns the bytes to the budget (panic-safe).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tsflow_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};

struct BudgetInner {
    capacity: usize,
    used: AtomicUsize,
}

impl BudgetInner {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    fn try_acquire(&self, bytes: usize) -> bool {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Shared byte budget. Clones share the same counter.
#[derive(Clone)]
pub struct MemoryBudgetImpl {
    inner: Arc<BudgetInner>,
}

impl MemoryBudgetImpl {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner::new(capacity_bytes)),
        }
    }

    /// Like `try_acquire`, but reports a refusal as an error carrying the
    /// budget's state at the time.
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<BudgetGuardImpl> {
        self.try_acquire(bytes, tag)
            .ok_or_else(|| Error::BudgetExceeded {
                tag,
                requested: bytes,
                capacity: self.inner.capacity,
                used: self.inner.used.load(Ordering::Relaxed),
            })
    }
}

/// RAII guard that accounts for a number of bytes.
pub struct BudgetGuardImpl {
    inner: Arc<BudgetInner>,
    bytes: usize,
    tag: &'static str,
}

impl Drop for BudgetGuardImpl {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            // NOTE: do not log here to keep drop path fast.
            self.bytes = 0;
        }
    }
}

impl BudgetGuard for BudgetGuardImpl {
    fn bytes(&self) -> usize {
        self.bytes
    }
}

impl BudgetGuardImpl {
    /// Grow this guard by `extra` bytes. On refusal the guard is unchanged.
    pub fn try_grow(&mut self, extra: usize) -> Result<()> {
        if extra == 0 {
            return Ok(());
        }
        if self.inner.try_acquire(extra) {
            self.bytes += extra;
            Ok(())
        } else {
            Err(Error::BudgetExceeded {
                tag: self.tag,
                requested: extra,
                capacity: self.inner.capacity,
                used: self.inner.used.load(Ordering::Relaxed),
            })
        }
    }
}

impl MemoryBudget for MemoryBudgetImpl {
    type Guard = BudgetGuardImpl;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard> {
        if bytes > 0 && !self.inner.try_acquire(bytes) {
            return None;
        }
        Some(BudgetGuardImpl {
            inner: Arc::clone(&self.inner),
            bytes,
            tag,
        })
    }

    fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_returns_bytes() {
        let budget = MemoryBudgetImpl::new(100);
        let g = budget.acquire(60, "test").unwrap();
        assert_eq!(budget.used_bytes(), 60);
        assert!(budget.acquire(50, "test").is_err());
        drop(g);
        assert_eq!(budget.used_bytes(), 0);
    }

    #[test]
    fn grow_is_all_or_nothing() {
        let budget = MemoryBudgetImpl::new(100);
        let mut g = budget.acquire(60, "test").unwrap();
        assert!(g.try_grow(50).is_err());
        assert_eq!(g.bytes(), 60);
        g.try_grow(40).unwrap();
        assert_eq!(budget.used_bytes(), 100);
    }
}
