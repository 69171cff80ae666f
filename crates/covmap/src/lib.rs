//! Merkle-Backed Verifiable Map
//!
//! A key/value map usable inside a contract method, committed to by a
//! depth-160 sparse Merkle root. A trace wrapper records which keys one
//! invocation touched and in what order; extraction derives before/after
//! roots and per-key proofs; the verifier reproduces the on-chain check.

mod crypto;
mod keys;
mod nodestore;
mod smt;
mod statemap;
mod types;
mod verify;

pub use keys::{encode_value, MapKey};
pub use nodestore::{InMemoryNodeStore, NodeId, NodeStore};
pub use smt::{compute_root, fold_path, verify_leaf, SparseMerkleTree};
pub use statemap::{StateMap, TracePhase, TracedStateMap};
pub use types::{AccessContext, Hash20, MerkleProof160, MAX_TRACED_KEYS, PROOF_SIZE, TREE_DEPTH};
pub use verify::verify_access_context;

pub use crypto::{empty_leaf_hash, hash160, hash_internal, hash_key, hash_leaf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CovMapError {
    #[error("access overflow: {count} distinct keys exceeds limit {limit}")]
    AccessOverflow { count: usize, limit: usize },

    #[error("before-leaf hash mismatch at entry {0}")]
    BeforeLeafMismatch(usize),

    #[error("merkle path mismatch at entry {0}")]
    PathMismatch(usize),

    #[error("running root does not match claimed next root")]
    RootMismatch,

    #[error("unwritten slot {0} was mutated")]
    UnwrittenSlotMutated(usize),

    #[error("malformed proof batch: {0}")]
    MalformedBatch(&'static str),

    #[error("malformed access index list: {0}")]
    MalformedAccessIndices(&'static str),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CovMapError>;
