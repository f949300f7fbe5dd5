//! Byte accounting for retained buffers.
//!
//! `tsflow-mem` provides the implementation; operators only see these traits.

/// Reservation of bytes against a [`MemoryBudget`]. The bytes go back to the
/// budget when the guard is dropped.
pub trait BudgetGuard: Send {
    fn bytes(&self) -> usize;
}

/// Cap on the bytes an operator may keep alive at once.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    /// Reserve `bytes`, or `None` when the cap would be exceeded. A refused
    /// caller must not retain the data.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    /// Bytes currently reserved across all live guards.
    fn used_bytes(&self) -> usize;
}
