//! Column-list table builder for operator output.

use tsflow_core::prelude::{Column, Error, Field, PartitionKey, Result, Scalar, Schema, Table};

/// Builds one output table for a partition key, column by column.
///
/// Columns are appended to independently; `table()` requires them to be of
/// equal length. Use `pad_to` to fill short columns with nulls.
#[derive(Debug)]
pub struct TableBuilder {
    key: PartitionKey,
    schema: Schema,
    columns: Vec<Vec<Scalar>>,
}

impl TableBuilder {
    pub fn new(key: PartitionKey) -> Self {
        Self {
            key,
            schema: Schema::empty(),
            columns: vec![],
        }
    }

    /// Add a column; returns its index. Existing columns are back-filled with
    /// nulls so lengths stay aligned.
    pub fn add_col(&mut self, field: Field) -> Result<usize> {
        if self.schema.index_of(&field.name).is_some() {
            return Err(Error::Invalid(format!(
                "table builder already has a column named '{}'",
                field.name
            )));
        }
        let rows = self.num_rows();
        self.schema.fields.push(field);
        self.columns.push(vec![Scalar::Null; rows]);
        Ok(self.columns.len() - 1)
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Append a value to column `idx`. Non-null values must match the
    /// column's type.
    pub fn append_value(&mut self, idx: usize, value: Scalar) -> Result<()> {
        let field = self
            .schema
            .field(idx)
            .ok_or_else(|| Error::Internal(format!("table builder has no column {}", idx)))?;
        if !value.fits(field.data_type) {
            return Err(Error::Invalid(format!(
                "column '{}' has type {}, got value {}",
                field.name, field.data_type, value
            )));
        }
        self.columns[idx].push(value);
        Ok(())
    }

    /// Fill every column shorter than `rows` with nulls.
    pub fn pad_to(&mut self, rows: usize) {
        for col in &mut self.columns {
            if col.len() < rows {
                col.resize(rows, Scalar::Null);
            }
        }
    }

    /// Row count, taken as the longest column.
    pub fn num_rows(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Finish the table. A builder with no columns yields a table with no
    /// buffers.
    pub fn table(self) -> Result<Table> {
        let rows = self.num_rows();
        if let Some(f) = self
            .schema
            .fields
            .iter()
            .zip(self.columns.iter())
            .find(|(_, c)| c.len() != rows)
            .map(|(f, _)| f)
        {
            return Err(Error::Internal(format!(
                "table builder column '{}' is shorter than {} rows",
                f.name, rows
            )));
        }
        if self.schema.is_empty() {
            return Table::try_new(self.key, self.schema, vec![]);
        }
        let columns = self
            .schema
            .fields
            .iter()
            .zip(self.columns)
            .map(|(f, values)| Column::new(f.name.clone(), values))
            .collect();
        Table::from_columns(self.key, self.schema, columns)
    }
}
