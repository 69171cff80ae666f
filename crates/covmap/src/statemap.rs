//! The Merkle-backed verifiable map and its access tracer.

use crate::nodestore::{InMemoryNodeStore, NodeStore};
use crate::smt::SparseMerkleTree;
use crate::types::{AccessContext, MAX_TRACED_KEYS, PROOF_SIZE};
use crate::{CovMapError, Hash20, MapKey, Result};

/// A key/value map whose contents are committed to by a depth-160 sparse
/// Merkle root. Mutations before tracing build the map directly; one contract
/// call is then traced through [`TracedStateMap`].
pub struct StateMap<N: NodeStore = InMemoryNodeStore> {
    tree: SparseMerkleTree<N>,
    max_accesses: usize,
}

impl StateMap<InMemoryNodeStore> {
    pub fn new(max_accesses: usize) -> Result<Self> {
        Self::with_store(InMemoryNodeStore::new(), max_accesses)
    }
}

impl<N: NodeStore> StateMap<N> {
    pub fn with_store(store: N, max_accesses: usize) -> Result<Self> {
        if max_accesses == 0 || max_accesses > MAX_TRACED_KEYS {
            return Err(CovMapError::AccessOverflow {
                count: max_accesses,
                limit: MAX_TRACED_KEYS,
            });
        }
        Ok(Self { tree: SparseMerkleTree::new(store), max_accesses })
    }

    pub fn max_accesses(&self) -> usize {
        self.max_accesses
    }

    pub fn root(&self) -> Hash20 {
        self.tree.root()
    }

    pub fn set(&mut self, key: &MapKey, value: Vec<u8>) {
        self.tree.update_leaf(&key.to_bytes(), &value);
    }

    pub fn get(&self, key: &MapKey) -> Option<&[u8]> {
        self.tree.value(&key.to_bytes())
    }

    /// Begins tracing one contract call over this map.
    pub fn trace(self) -> TracedStateMap<N> {
        TracedStateMap {
            base: self,
            delta: Vec::new(),
            distinct: Vec::new(),
            written: Vec::new(),
            access_indices: Vec::new(),
            phase: TracePhase::Idle,
        }
    }
}

/// Idle until the first access, Tracing from then on. The terminal state
/// ("Extracted", no further access allowed) is expressed by
/// [`TracedStateMap::extract_context`] consuming the tracer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracePhase {
    Idle,
    Tracing,
}

/// Records, in call order, every key one invocation reads or writes.
///
/// The wrapped map is the immutable before-snapshot; writes land in an
/// ordered delta list and are only folded into the tree during extraction.
/// Single-owner by construction: clone the base map per build if concurrent
/// construction is needed.
pub struct TracedStateMap<N: NodeStore = InMemoryNodeStore> {
    base: StateMap<N>,
    /// Ordered write list; the last entry per key wins
    delta: Vec<(Vec<u8>, Vec<u8>)>,
    /// Distinct touched keys in first-access order
    distinct: Vec<Vec<u8>>,
    /// Parallel to `distinct`: whether the slot was written
    written: Vec<bool>,
    /// One entry per access, repeats included
    access_indices: Vec<u8>,
    phase: TracePhase,
}

impl<N: NodeStore> TracedStateMap<N> {
    pub fn phase(&self) -> TracePhase {
        self.phase
    }

    /// Current value of `key` as this call sees it: the latest delta write,
    /// else the before-snapshot, else the empty byte string.
    pub fn get(&mut self, key: &MapKey) -> Result<Vec<u8>> {
        let key_bytes = key.to_bytes();
        self.record_access(&key_bytes, false)?;
        Ok(self.lookup(&key_bytes))
    }

    pub fn set(&mut self, key: &MapKey, value: Vec<u8>) -> Result<()> {
        let key_bytes = key.to_bytes();
        self.record_access(&key_bytes, true)?;
        self.delta.push((key_bytes, value));
        Ok(())
    }

    fn lookup(&self, key_bytes: &[u8]) -> Vec<u8> {
        for (k, v) in self.delta.iter().rev() {
            if k == key_bytes {
                return v.clone();
            }
        }
        self.base
            .tree
            .value(key_bytes)
            .map(|v| v.to_vec())
            .unwrap_or_default()
    }

    fn record_access(&mut self, key_bytes: &[u8], write: bool) -> Result<()> {
        self.phase = TracePhase::Tracing;
        let index = match self.distinct.iter().position(|k| k == key_bytes) {
            Some(i) => i,
            None => {
                let limit = self.base.max_accesses.min(MAX_TRACED_KEYS);
                if self.distinct.len() >= limit {
                    return Err(CovMapError::AccessOverflow {
                        count: self.distinct.len() + 1,
                        limit,
                    });
                }
                self.distinct.push(key_bytes.to_vec());
                self.written.push(false);
                self.distinct.len() - 1
            }
        };
        if write {
            self.written[index] = true;
        }
        self.access_indices.push(index as u8);
        Ok(())
    }

    /// Closes the trace and derives the proof bundle for the on-chain check.
    ///
    /// The before-tree already holds the BEFORE value of every key; each
    /// distinct key is then replayed in first-access order through
    /// `update_leaf(key, after_value)`, which yields that key's proof and
    /// advances the tree toward the after-root.
    pub fn extract_context(mut self) -> Result<AccessContext> {
        let count = self.distinct.len();
        let limit = self.base.max_accesses.min(MAX_TRACED_KEYS);
        if count > limit {
            return Err(CovMapError::AccessOverflow { count, limit });
        }

        let max = self.base.max_accesses;
        let before_root = self.base.tree.root();

        let mut proofs = Vec::with_capacity(count * PROOF_SIZE);
        let mut keys = Vec::with_capacity(max);
        let mut before_values = Vec::with_capacity(max);
        let mut after_values = Vec::with_capacity(max);

        for (i, key) in self.distinct.iter().enumerate() {
            let before = self
                .base
                .tree
                .value(key)
                .map(|v| v.to_vec())
                .unwrap_or_default();
            let after = if self.written[i] {
                last_write(&self.delta, key).unwrap_or_else(|| before.clone())
            } else {
                before.clone()
            };

            let proof = self.base.tree.update_leaf(key, &after);
            proofs.extend_from_slice(&proof.to_bytes());
            keys.push(key.clone());
            before_values.push(before);
            after_values.push(after);
        }

        let after_root = self.base.tree.root();

        // pad the fixed-size slots up to the configured maximum
        let mut written = self.written;
        while keys.len() < max {
            keys.push(Vec::new());
            before_values.push(Vec::new());
            after_values.push(Vec::new());
            written.push(false);
        }

        tracing::debug!(
            distinct = count,
            accesses = self.access_indices.len(),
            "extracted access context"
        );

        Ok(AccessContext {
            before_root,
            after_root,
            proofs,
            keys,
            before_values,
            after_values,
            written,
            access_indices: self.access_indices,
        })
    }
}

fn last_write(delta: &[(Vec<u8>, Vec<u8>)], key: &[u8]) -> Option<Vec<u8>> {
    delta
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}
