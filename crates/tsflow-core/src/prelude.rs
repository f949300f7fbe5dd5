//! Convenient re-exports for downstream crates.

pub use crate::buffer::{Buffer, Table};
pub use crate::config::{JoinConfig, LateBufferPolicy};
pub use crate::error::{Code, Error, Result};
pub use crate::id::{DatasetId, Side};
pub use crate::key::{KeyColumn, PartitionKey};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::{Column, Datum, Record, Scalar, Time};
