//! Core types for the verifiable state map

use serde::{Deserialize, Serialize};

/// 20-byte HASH160 digest
pub type Hash20 = [u8; 20];

/// Tree depth in levels; also the number of siblings per proof.
pub const TREE_DEPTH: usize = 160;

/// Wire size of one proof: leaf hash + 160 siblings, 20 bytes each.
pub const PROOF_SIZE: usize = 20 + TREE_DEPTH * 20;

/// Hard cap on distinct keys per traced call; access indices are one byte
/// with the high bit reserved.
pub const MAX_TRACED_KEYS: usize = 127;

/// Sparse Merkle tree proof (160-bit depth)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof160 {
    /// Leaf hash at the key's position before any associated write
    pub leaf: Hash20,
    /// Sibling hashes from leaf to root
    pub siblings: Vec<Hash20>,
}

impl MerkleProof160 {
    /// Exact 3,220-byte wire form: leaf hash then the sibling path.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PROOF_SIZE);
        out.extend_from_slice(&self.leaf);
        for sibling in &self.siblings {
            out.extend_from_slice(sibling);
        }
        out
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != PROOF_SIZE {
            return None;
        }
        let mut leaf = [0u8; 20];
        leaf.copy_from_slice(&data[..20]);
        let siblings = data[20..]
            .chunks_exact(20)
            .map(|c| {
                let mut h = [0u8; 20];
                h.copy_from_slice(c);
                h
            })
            .collect();
        Some(Self { leaf, siblings })
    }
}

/// Everything one traced call commits to: which keys it touched, in what
/// order, their before/after values, and the Merkle proofs chaining the
/// before-root to the after-root.
///
/// `keys`, `before_values`, `after_values` and `written` are padded with
/// empty entries up to the map's configured maximum (the on-chain check runs
/// over fixed-size arrays). `proofs` is never padded; the distinct-key count
/// is `proofs.len() / PROOF_SIZE`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessContext {
    pub before_root: Hash20,
    pub after_root: Hash20,
    /// Concatenated fixed-length proofs, one per distinct key in access order
    pub proofs: Vec<u8>,
    pub keys: Vec<Vec<u8>>,
    pub before_values: Vec<Vec<u8>>,
    pub after_values: Vec<Vec<u8>>,
    /// Whether the call intended to mutate the slot, per distinct key
    pub written: Vec<bool>,
    /// One byte per access (repeats included), each the distinct-key position
    pub access_indices: Vec<u8>,
}

impl AccessContext {
    /// Number of distinct keys actually touched (excludes padding).
    pub fn distinct_count(&self) -> usize {
        self.proofs.len() / PROOF_SIZE
    }
}
