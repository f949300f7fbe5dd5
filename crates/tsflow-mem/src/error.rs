use thiserror::Error;

/// Result type local to tsflow-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memory budget exceeded for tag '{tag}': requested {requested} bytes, capacity {capacity}, used {used}")]
    BudgetExceeded {
        tag: &'static str,
        requested: usize,
        capacity: usize,
        used: usize,
    },
}

impl From<Error> for tsflow_core::error::Error {
    fn from(e: Error) -> Self {
        tsflow_core::error::Error::ResourceExhausted(e.to_string())
    }
}
