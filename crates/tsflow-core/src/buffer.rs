//! Immutable columnar buffers and the tables built from them.
//!
//! A `Buffer` is a shared handle: cloning it retains the underlying columns
//! and dropping it releases them. Storage is freed when the last handle goes.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::key::PartitionKey;
use crate::schema::Schema;
use crate::types::{Column, Scalar, Time};

#[derive(Debug, PartialEq)]
struct BufferData {
    key: PartitionKey,
    schema: Schema,
    columns: Vec<Column>,
    len: usize,
}

#[derive(Debug, Clone)]
pub struct Buffer {
    inner: Arc<BufferData>,
}

impl Buffer {
    /// Validate and wrap a set of columns.
    ///
    /// Every column must have the same row count and the name of the matching
    /// schema field, and every non-null value must match the field's type.
    pub fn try_new(key: PartitionKey, schema: Schema, columns: Vec<Column>) -> Result<Self> {
        if schema.len() != columns.len() {
            return Err(Error::Invalid(format!(
                "buffer has {} columns but schema has {} fields",
                columns.len(),
                schema.len()
            )));
        }
        let len = columns.first().map(|c| c.len()).unwrap_or(0);
        for (field, col) in schema.fields.iter().zip(columns.iter()) {
            if field.name != col.name {
                return Err(Error::Invalid(format!(
                    "column '{}' does not match schema field '{}'",
                    col.name, field.name
                )));
            }
            if col.len() != len {
                return Err(Error::Invalid(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name,
                    col.len(),
                    len
                )));
            }
            if let Some(bad) = col.values.iter().find(|v| !v.fits(field.data_type)) {
                return Err(Error::Invalid(format!(
                    "column '{}' of type {} holds value {}",
                    col.name, field.data_type, bad
                )));
            }
        }
        Ok(Self {
            inner: Arc::new(BufferData {
                key,
                schema,
                columns,
                len,
            }),
        })
    }

    pub fn key(&self) -> &PartitionKey {
        &self.inner.key
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    pub fn num_cols(&self) -> usize {
        self.inner.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.inner.columns.get(idx)
    }

    pub fn columns(&self) -> &[Column] {
        &self.inner.columns
    }

    /// Cell at (`row`, `col`); `None` if either index is out of range.
    pub fn value(&self, row: usize, col: usize) -> Option<&Scalar> {
        self.inner.columns.get(col).and_then(|c| c.values.get(row))
    }

    /// Time accessor for a `Time` column. `None` for nulls, non-time cells and
    /// out-of-range indices.
    pub fn time(&self, row: usize, col: usize) -> Option<Time> {
        match self.value(row, col) {
            Some(Scalar::Time(t)) => Some(*t),
            _ => None,
        }
    }

    /// Number of live handles to this buffer's storage.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Estimated bytes held by the buffer's cells.
    pub fn byte_size(&self) -> usize {
        self.inner
            .columns
            .iter()
            .flat_map(|c| c.values.iter())
            .map(Scalar::approx_size)
            .sum()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

/// A partition's rows: a key, a column layout, and the buffers carrying them.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    key: PartitionKey,
    schema: Schema,
    buffers: Vec<Buffer>,
}

impl Table {
    /// Every buffer must share the table's key and schema.
    pub fn try_new(key: PartitionKey, schema: Schema, buffers: Vec<Buffer>) -> Result<Self> {
        for b in &buffers {
            if b.key() != &key {
                return Err(Error::Invalid(format!(
                    "buffer key {} does not match table key {}",
                    b.key(),
                    key
                )));
            }
            if b.schema() != &schema {
                return Err(Error::Invalid(format!(
                    "buffer layout does not match table layout for key {}",
                    key
                )));
            }
        }
        Ok(Self {
            key,
            schema,
            buffers,
        })
    }

    /// Single-buffer table built straight from columns.
    pub fn from_columns(key: PartitionKey, schema: Schema, columns: Vec<Column>) -> Result<Self> {
        let buffer = Buffer::try_new(key.clone(), schema.clone(), columns)?;
        Ok(Self {
            key,
            schema,
            buffers: vec![buffer],
        })
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Hand over the buffers. The caller becomes their owner.
    pub fn into_buffers(self) -> Vec<Buffer> {
        self.buffers
    }

    pub fn num_rows(&self) -> usize {
        self.buffers.iter().map(Buffer::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Column `name` across all buffers, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<Scalar>> {
        let idx = self.schema.index_of(name)?;
        Some(
            self.buffers
                .iter()
                .filter_map(|b| b.column(idx))
                .flat_map(|c| c.values.iter().cloned())
                .collect(),
        )
    }

    /// Rows across all buffers, each as cells in schema order.
    pub fn rows(&self) -> Vec<Vec<Scalar>> {
        let mut rows = Vec::with_capacity(self.num_rows());
        for b in &self.buffers {
            for r in 0..b.len() {
                rows.push(b.columns().iter().map(|c| c.values[r].clone()).collect());
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, Field};

    fn key() -> PartitionKey {
        PartitionKey::from_values([("_field", Scalar::Str("v".into()))]).unwrap()
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("_time", DataType::Time),
            Field::new("v", DataType::Float64),
        ])
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Buffer::try_new(
            key(),
            schema(),
            vec![
                Column::new("_time", vec![Scalar::Time(1), Scalar::Time(2)]),
                Column::new("v", vec![Scalar::F64(1.0)]),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("has 1 rows"));
    }

    #[test]
    fn rejects_mistyped_values() {
        let res = Buffer::try_new(
            key(),
            schema(),
            vec![
                Column::new("_time", vec![Scalar::I64(1)]),
                Column::new("v", vec![Scalar::F64(1.0)]),
            ],
        );
        assert!(res.is_err());
    }

    #[test]
    fn clone_retains_and_drop_releases() {
        let b = Buffer::try_new(
            key(),
            schema(),
            vec![
                Column::new("_time", vec![Scalar::Time(1)]),
                Column::new("v", vec![Scalar::Null]),
            ],
        )
        .unwrap();
        let held = b.clone();
        assert_eq!(b.ref_count(), 2);
        drop(held);
        assert_eq!(b.ref_count(), 1);
        assert_eq!(b.time(0, 0), Some(1));
        assert_eq!(b.time(1, 0), None);
    }
}
