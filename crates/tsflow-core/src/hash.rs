//! Stable hashing helpers for layouts and partition keys.

use blake3::Hasher;
use serde::Serialize;

use crate::key::PartitionKey;
use crate::types::{scalar_type_order, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }

    /// First 8 bytes, little-endian. Enough to tag log lines.
    pub fn short(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(head)
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    Hash256(h.finalize().into())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, crate::error::Error> {
    let bytes = serde_json::to_vec(v)?;
    Ok(hash_bytes(&bytes))
}

/// Fingerprint of a partition key. Equal keys hash equally.
pub fn hash_key(key: &PartitionKey) -> Hash256 {
    let mut h = Hasher::new();
    for col in key.cols() {
        h.update(col.name.as_bytes());
        h.update(&[0, col.data_type as u8]);
        hash_scalar(&col.value, &mut h);
    }
    Hash256(h.finalize().into())
}

fn hash_scalar(scalar: &Scalar, hasher: &mut Hasher) {
    use Scalar::*;

    // Write type discriminant first
    hasher.update(&[scalar_type_order(scalar)]);

    match scalar {
        Null => {}
        Bool(b) => {
            hasher.update(&[*b as u8]);
        }
        I32(i) => {
            hasher.update(&i.to_le_bytes());
        }
        I64(i) | Time(i) => {
            hasher.update(&i.to_le_bytes());
        }
        F32(f) => {
            hasher.update(&canonical_bits(f64::from(*f)).to_le_bytes());
        }
        F64(f) => {
            hasher.update(&canonical_bits(*f).to_le_bytes());
        }
        Str(s) => {
            hasher.update(s.as_bytes());
        }
        Bin(b) => {
            hasher.update(b);
        }
    }
}

/// Floats that compare equal must hash equally: one NaN, one zero.
fn canonical_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: f64) -> PartitionKey {
        PartitionKey::from_values([("host", Scalar::Str("a".into())), ("v", Scalar::F64(v))])
            .unwrap()
    }

    #[test]
    fn equal_keys_hash_equally() {
        assert_eq!(hash_key(&key(1.5)), hash_key(&key(1.5)));
        assert_eq!(hash_key(&key(0.0)), hash_key(&key(-0.0)));
        assert_eq!(hash_key(&key(f64::NAN)), hash_key(&key(-f64::NAN)));
        assert_ne!(hash_key(&key(1.5)), hash_key(&key(2.5)));
    }

    #[test]
    fn layout_hash_is_stable() {
        let a = hash_serde(&("_time", 1u8)).unwrap();
        let b = hash_serde(&("_time", 1u8)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }
}
