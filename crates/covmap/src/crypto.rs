//! Consensus-fixed hashing for the state tree.

use crate::Hash20;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// HASH160: RIPEMD160(SHA256(data)). Every node and leaf digest in the tree.
pub fn hash160(data: &[u8]) -> Hash20 {
    let sha = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

/// Position of a key in the tree (used ONLY for path bits).
pub fn hash_key(key: &[u8]) -> Hash20 {
    hash160(key)
}

/// Leaf hash depends ONLY on the serialized value.
pub fn hash_leaf(value: &[u8]) -> Hash20 {
    hash160(value)
}

/// Internal node hash.
pub fn hash_internal(left: Hash20, right: Hash20) -> Hash20 {
    let mut data = [0u8; 40];
    data[..20].copy_from_slice(&left);
    data[20..].copy_from_slice(&right);
    hash160(&data)
}

/// Canonical empty leaf: the hash of the empty byte string. An absent key
/// carries the empty value, so this also proves non-membership.
pub fn empty_leaf_hash() -> Hash20 {
    hash160(&[])
}
