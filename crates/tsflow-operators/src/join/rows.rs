//! Random access over the rows of many buffers.

use tsflow_core::prelude::{Buffer, Datum, Error, Field, Record, Result, Time};

/// Rows of one (side, partition) pair, stitched from the buffers that
/// delivered them into one logically contiguous sequence.
///
/// Rows are assumed time-ascending across buffers, with a non-null time in
/// every row; neither is checked. A null time reads as the end of the rows.
#[derive(Debug)]
pub struct RowIterator {
    len: usize,
    time_col: usize,
    /// First logical row index of each buffer.
    offsets: Vec<usize>,
    buffers: Vec<Buffer>,
    columns: Vec<Field>,
}

impl RowIterator {
    pub fn new(columns: Vec<Field>, buffers: Vec<Buffer>, time_col: usize) -> Self {
        let mut offsets = Vec::with_capacity(buffers.len());
        let mut len = 0;
        for b in &buffers {
            offsets.push(len);
            len += b.len();
        }
        Self {
            len,
            time_col,
            offsets,
            buffers,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn columns(&self) -> &[Field] {
        &self.columns
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn time_col(&self) -> usize {
        self.time_col
    }

    pub fn into_buffers(self) -> Vec<Buffer> {
        self.buffers
    }

    /// Owning buffer and local offset of logical row `idx`.
    ///
    /// Scans from the most recently appended buffer backwards.
    fn locate(&self, idx: usize) -> Option<(&Buffer, usize)> {
        for (offset, buffer) in self.offsets.iter().zip(self.buffers.iter()).rev() {
            if idx >= *offset {
                let local = idx - offset;
                if local >= buffer.len() {
                    return None;
                }
                return Some((buffer, local));
            }
        }
        None
    }

    /// Time at logical row `idx`, or `None` past the last row or at a null
    /// time cell.
    pub fn time(&self, idx: usize) -> Option<Time> {
        let (buffer, local) = self.locate(idx)?;
        buffer.time(local, self.time_col)
    }

    pub fn last_time(&self) -> Option<Time> {
        self.len.checked_sub(1).and_then(|i| self.time(i))
    }

    /// Snapshot of logical row `idx` as a record, or `None` past the last row.
    ///
    /// Every call allocates a fresh record, so returned rows never alias.
    pub fn record(&self, idx: usize) -> Option<Record> {
        let (buffer, local) = self.locate(idx)?;
        let mut rec = Record::new();
        for (field, col) in buffer.schema().fields.iter().zip(buffer.columns()) {
            rec.put(
                field.name.clone(),
                Datum {
                    data_type: field.data_type,
                    value: col.values[local].clone(),
                },
            );
        }
        Some(rec)
    }

    /// Append buffers after the current last row.
    ///
    /// Buffers must have this iterator's column layout.
    pub fn extend(&mut self, buffers: Vec<Buffer>) -> Result<()> {
        if let Some(b) = buffers.iter().find(|b| b.schema().fields != self.columns) {
            return Err(Error::Invalid(format!(
                "buffer for key {} changes the column layout of its stream",
                b.key()
            )));
        }
        for b in buffers {
            self.offsets.push(self.len);
            self.len += b.len();
            self.buffers.push(b);
        }
        Ok(())
    }

    /// Estimated bytes held by the retained buffers.
    pub fn retained_bytes(&self) -> usize {
        self.buffers.iter().map(Buffer::byte_size).sum()
    }
}
