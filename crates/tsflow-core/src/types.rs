//! Lightweight logical value/column types to avoid bringing Arrow into core.
//!
//! `Scalar` is the per-value cell (with `Null` as the null marker), `Column`
//! is a named run of cells, and `Record` is one row viewed as a name -> value
//! mapping, which is the shape row functions consume and produce.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Field};

/// Nanoseconds since the Unix epoch.
pub type Time = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Time(Time),
}

impl Scalar {
    /// Type of a non-null value. `Null` carries no type on its own; the
    /// column or record entry holding it does.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
            Scalar::Time(_) => Some(DataType::Time),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// True if the value may be stored in a column of type `dt`.
    pub fn fits(&self, dt: DataType) -> bool {
        self.data_type().map_or(true, |t| t == dt)
    }

    /// Rough heap + inline footprint, for budget accounting.
    pub fn approx_size(&self) -> usize {
        let heap = match self {
            Scalar::Str(s) => s.len(),
            Scalar::Bin(b) => b.len(),
            _ => 0,
        };
        std::mem::size_of::<Scalar>() + heap
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::I32(i) => write!(f, "{}", i),
            Scalar::I64(i) => write!(f, "{}", i),
            Scalar::F32(x) => write!(f, "{}", x),
            Scalar::F64(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::Bin(b) => write!(f, "<{} bytes>", b.len()),
            Scalar::Time(t) => write!(f, "{}ns", t),
        }
    }
}

/// Minimal column representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A typed cell inside a `Record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub data_type: DataType,
    pub value: Scalar,
}

/// One row as an ordered name -> value mapping.
///
/// Every entry carries its type so that a null read from a typed column stays
/// typed after it is copied into an output record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entries: BTreeMap<String, Datum>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.entries.get(name).map(|d| &d.value)
    }

    pub fn datum(&self, name: &str) -> Option<&Datum> {
        self.entries.get(name)
    }

    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.entries.get(name).map(|d| d.data_type)
    }

    /// Insert a typed value. Fails if a non-null value does not match `data_type`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        value: Scalar,
    ) -> Result<()> {
        let name = name.into();
        if !value.fits(data_type) {
            return Err(Error::Invalid(format!(
                "value {} for field '{}' is not of type {}",
                value, name, data_type
            )));
        }
        self.entries.insert(name, Datum { data_type, value });
        Ok(())
    }

    /// Insert an already-typed cell as-is.
    pub fn put(&mut self, name: impl Into<String>, datum: Datum) {
        self.entries.insert(name.into(), datum);
    }

    /// Insert a value, inferring its type. A null keeps the type of the entry
    /// it overwrites; a null for a new field has no type and is rejected.
    pub fn set(&mut self, name: impl Into<String>, value: Scalar) -> Result<()> {
        let name = name.into();
        let data_type = match value.data_type() {
            Some(dt) => dt,
            None => self.data_type(&name).ok_or_else(|| {
                Error::Invalid(format!("cannot infer the type of null field '{}'", name))
            })?,
        };
        self.entries.insert(name, Datum { data_type, value });
        Ok(())
    }

    /// Copy `src_name` from `src` into this record as `dst_name`, keeping its type.
    /// Returns false if `src` has no such field.
    pub fn copy_from(&mut self, src: &Record, src_name: &str, dst_name: impl Into<String>) -> bool {
        match src.entries.get(src_name) {
            Some(d) => {
                self.entries.insert(dst_name.into(), d.clone());
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Datum> {
        self.entries.remove(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field layout of this record, sorted by name.
    pub fn fields(&self) -> Vec<Field> {
        self.entries
            .iter()
            .map(|(k, d)| Field::new(k.clone(), d.data_type))
            .collect()
    }
}

/// Total order over scalars.
///
/// Nulls are sorted first, NaN after every other float, then values are
/// compared by type.
pub fn scalar_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    use Scalar::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (I32(x), I32(y)) => x.cmp(y),
        (I64(x), I64(y)) => x.cmp(y),
        (F32(x), F32(y)) => float_cmp(f64::from(*x), f64::from(*y)),
        (F64(x), F64(y)) => float_cmp(*x, *y),
        (Str(x), Str(y)) => x.cmp(y),
        (Bin(x), Bin(y)) => x.cmp(y),
        (Time(x), Time(y)) => x.cmp(y),
        // Mixed types: order by variant order
        _ => scalar_type_order(a).cmp(&scalar_type_order(b)),
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Assign a numeric order to scalar types for mixed-type comparisons.
pub(crate) fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        Bin(_) => 7,
        Time(_) => 8,
    }
}
