//! Partition keys: the identifying column values of one logical series.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Field};
use crate::types::{scalar_cmp, Scalar};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyColumn {
    pub name: String,
    pub data_type: DataType,
    pub value: Scalar,
}

/// Ordered, immutable list of (name, type, value) triples.
///
/// Two keys are equal iff every triple matches. Ordering is lexicographic
/// over the triples and is total (NaN equals NaN), so keys can index ordered
/// maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionKey {
    cols: Vec<KeyColumn>,
}

impl PartitionKey {
    pub fn new(cols: Vec<KeyColumn>) -> Result<Self> {
        for c in &cols {
            if !c.value.fits(c.data_type) {
                return Err(Error::Invalid(format!(
                    "partition key column '{}' has value {} which is not of type {}",
                    c.name, c.value, c.data_type
                )));
            }
        }
        Ok(Self { cols })
    }

    /// Build a key from (name, value) pairs, inferring types. Null values are
    /// rejected since they carry no type.
    pub fn from_values<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Scalar)>,
        S: Into<String>,
    {
        let cols = values
            .into_iter()
            .map(|(name, value)| {
                let name = name.into();
                let data_type = value.data_type().ok_or_else(|| {
                    Error::Invalid(format!(
                        "partition key column '{}' needs an explicit type for a null value",
                        name
                    ))
                })?;
                Ok(KeyColumn {
                    name,
                    data_type,
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { cols })
    }

    pub fn empty() -> Self {
        Self { cols: vec![] }
    }

    pub fn cols(&self) -> &[KeyColumn] {
        &self.cols
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&KeyColumn> {
        self.cols.iter().find(|c| c.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&Scalar> {
        self.column(name).map(|c| &c.value)
    }

    pub fn fields(&self) -> Vec<Field> {
        self.cols
            .iter()
            .map(|c| Field::new(c.name.clone(), c.data_type))
            .collect()
    }
}

fn key_column_cmp(a: &KeyColumn, b: &KeyColumn) -> Ordering {
    a.name
        .cmp(&b.name)
        .then_with(|| (a.data_type as u8).cmp(&(b.data_type as u8)))
        .then_with(|| scalar_cmp(&a.value, &b.value))
}

impl Ord for PartitionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.cols.iter().zip(other.cols.iter()) {
            match key_column_cmp(a, b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.cols.len().cmp(&other.cols.len())
    }
}

impl PartialOrd for PartitionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PartitionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PartitionKey {}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, c) in self.cols.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", c.name, c.value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(field: &str) -> PartitionKey {
        PartitionKey::from_values([("_field", Scalar::Str(field.into()))]).unwrap()
    }

    #[test]
    fn keys_compare_by_triples() {
        assert_eq!(key("a"), key("a"));
        assert_ne!(key("a"), key("b"));
        assert!(key("a") < key("b"));
    }

    #[test]
    fn type_participates_in_equality() {
        let a = PartitionKey::from_values([("id", Scalar::I64(1))]).unwrap();
        let b = PartitionKey::from_values([("id", Scalar::I32(1))]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_shapes_never_match() {
        let a = key("a");
        let b = PartitionKey::from_values([
            ("_field", Scalar::Str("a".into())),
            ("host", Scalar::Str("h1".into())),
        ])
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn nan_key_equals_itself() {
        let k = PartitionKey::from_values([("x", Scalar::F64(f64::NAN))]).unwrap();
        assert_eq!(k, k.clone());
    }

    #[test]
    fn display_lists_columns() {
        assert_eq!(key("cpu").to_string(), "{_field=cpu}");
    }
}
