//! Serialization contract for map keys and values.
//!
//! Keys serialize by primitive rule so the off-chain bytes match what the
//! script interpreter hashes; struct values go through bincode as the
//! canonical-bytes routine for their resolved type.

use crate::{CovMapError, Result};
use serde::Serialize;

/// A map key usable inside a contract method.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// Unsigned integer, encoded as minimal big-endian bytes (zero => empty)
    Int(u64),
    /// Single byte, 0 or 1
    Bool(bool),
    /// Byte string, used as-is
    Bytes(Vec<u8>),
}

impl MapKey {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MapKey::Int(v) => covbytes::minimal_be(*v),
            MapKey::Bool(b) => vec![u8::from(*b)],
            MapKey::Bytes(b) => b.clone(),
        }
    }
}

impl From<&[u8]> for MapKey {
    fn from(bytes: &[u8]) -> Self {
        MapKey::Bytes(bytes.to_vec())
    }
}

impl From<u64> for MapKey {
    fn from(v: u64) -> Self {
        MapKey::Int(v)
    }
}

impl From<bool> for MapKey {
    fn from(v: bool) -> Self {
        MapKey::Bool(v)
    }
}

/// Canonical bytes for a struct value.
pub fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CovMapError::Serialization(e.to_string()))
}
