//! Time-equality merge join over one partition.
//!
//! Precondition: both iterators are time-ascending (guaranteed upstream, not
//! checked here).
//!
//! Two forward cursors `i` (left) and `j` (right). The lower side advances on
//! a mismatch. On a tie, every right row in the run starting at `j` is joined
//! with left row `i`, then only `i` advances. Leaving `j` in place lets the
//! next left row with the same time rescan the same run, which is what yields
//! the full cross product for duplicate timestamps.
//!
//! The scan does not poll for cancellation; a long run of duplicates is
//! joined to completion once started.

use std::cmp::Ordering;

use tsflow_core::prelude::{Error, Field, PartitionKey, Record, Result, Table};
use tsflow_core::types::scalar_cmp;

use crate::builder::TableBuilder;
use crate::join::function::{EvalContext, PreparedJoinFn};
use crate::join::rows::RowIterator;

pub fn merge_join(
    ctx: &EvalContext,
    key: &PartitionKey,
    left: &RowIterator,
    right: &RowIterator,
    f: &PreparedJoinFn,
) -> Result<Table> {
    let mut builder = TableBuilder::new(key.clone());
    let (mut i, mut j) = (0, 0);
    // The first output record fixes the layout, even when it has no fields.
    let mut first_row = true;

    while let (Some(ta), Some(tb)) = (left.time(i), right.time(j)) {
        match ta.cmp(&tb) {
            Ordering::Less => {
                i += 1;
                continue;
            }
            Ordering::Greater => {
                j += 1;
                continue;
            }
            Ordering::Equal => {}
        }

        let lrow = left
            .record(i)
            .ok_or_else(|| Error::Internal(format!("left row {} vanished during join", i)))?;

        let mut k = j;
        while right.time(k) == Some(ta) {
            let rrow = right
                .record(k)
                .ok_or_else(|| Error::Internal(format!("right row {} vanished during join", k)))?;

            let out = f.eval(ctx, &lrow, &rrow)?;

            if first_row {
                build_schema(&mut builder, &out)?;
                first_row = false;
            }
            check_key(&out, key)?;
            append_record(&mut builder, &out)?;
            k += 1;
        }
        i += 1;
    }

    builder.table()
}

/// Freeze the output layout from the first output record, sorted by name.
fn build_schema(builder: &mut TableBuilder, rec: &Record) -> Result<()> {
    // Record iteration is already in name order.
    for (name, datum) in rec.iter() {
        builder.add_col(Field::new(name, datum.data_type))?;
    }
    Ok(())
}

/// The output must carry every partition-key column unchanged.
fn check_key(rec: &Record, key: &PartitionKey) -> Result<()> {
    for col in key.cols() {
        let same = rec.datum(&col.name).map_or(false, |d| {
            d.data_type == col.data_type && scalar_cmp(&d.value, &col.value) == Ordering::Equal
        });
        if !same {
            return Err(Error::Invalid(format!(
                "function may not modify the partition key: output record has a missing or different value for column '{}'",
                col.name
            )));
        }
    }
    Ok(())
}

fn append_record(builder: &mut TableBuilder, rec: &Record) -> Result<()> {
    let row = builder.num_rows();
    for (name, datum) in rec.iter() {
        let idx = builder
            .col_index(name)
            .ok_or_else(|| Error::NotFound(format!("column {} not found", name)))?;
        builder.append_value(idx, datum.value.clone())?;
    }
    builder.pad_to(row + 1);
    Ok(())
}
