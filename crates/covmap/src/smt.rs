use crate::crypto;
use crate::nodestore::{InMemoryNodeStore, NodeId, NodeStore};
use crate::{Hash20, MerkleProof160};
use std::collections::BTreeMap;

pub(crate) use crate::types::TREE_DEPTH as DEPTH;

/// Fixed-depth sparse Merkle tree over HASH160 key positions.
///
/// Unset branches share the per-depth empty hash, so the root over any
/// key/value subset equals the root over the full 2^160 key space.
pub struct SparseMerkleTree<N: NodeStore> {
    root: Hash20,
    default_hashes: Vec<Hash20>,
    store: N,
    leaves: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl SparseMerkleTree<InMemoryNodeStore> {
    pub fn in_memory() -> Self {
        Self::new(InMemoryNodeStore::new())
    }
}

impl<N: NodeStore> SparseMerkleTree<N> {
    pub fn new(store: N) -> Self {
        let default_hashes = compute_default_hashes();
        let root = default_hashes[DEPTH];
        Self { root, default_hashes, store, leaves: BTreeMap::new() }
    }

    pub fn root(&self) -> Hash20 {
        self.root
    }

    pub fn default_hashes(&self) -> &[Hash20] {
        &self.default_hashes
    }

    /// Serialized value currently stored under `key`, if non-empty.
    pub fn value(&self, key: &[u8]) -> Option<&[u8]> {
        self.leaves.get(key).map(|v| v.as_slice())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.leaves.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Writes `value` under `key` and returns the neighbor-hash path for the
    /// key's position: the stored leaf hash before the write, followed by the
    /// 160 sibling hashes from leaf level to just below the root. The sibling
    /// path is unaffected by the write itself.
    ///
    /// An empty `value` clears the entry back to the empty leaf.
    pub fn update_leaf(&mut self, key: &[u8], value: &[u8]) -> MerkleProof160 {
        let key_hash = crypto::hash_key(key);
        let mut current = crypto::hash_leaf(value);

        if value.is_empty() {
            self.leaves.remove(key);
        } else {
            self.leaves.insert(key.to_vec(), value.to_vec());
        }

        // leaf
        let leaf_id = NodeId { height: 0, key: key_hash };
        let default_leaf = self.default_hashes[0];
        let old_leaf = self.store.get(&leaf_id).unwrap_or(default_leaf);

        if current == default_leaf {
            self.store.remove(&leaf_id);
        } else {
            self.store.insert(leaf_id, current);
        }

        // internal nodes bottom-up, collecting siblings on the way
        let mut siblings = Vec::with_capacity(DEPTH);
        for h in 0..DEPTH {
            let is_right = bit_at_lsb(&key_hash, h);
            let sibling_key = flip_bit_lsb(key_hash, h);
            let sibling_id = NodeId {
                height: h as u8,
                key: prefix_key(sibling_key, h),
            };
            let sibling_hash = self.get_node_or_default(&sibling_id);
            siblings.push(sibling_hash);

            let parent_id = NodeId {
                height: (h + 1) as u8,
                key: prefix_key(key_hash, h + 1),
            };

            let parent_hash = if is_right {
                crypto::hash_internal(sibling_hash, current)
            } else {
                crypto::hash_internal(current, sibling_hash)
            };

            let default_parent = self.default_hashes[h + 1];
            if parent_hash == default_parent {
                self.store.remove(&parent_id);
            } else {
                self.store.insert(parent_id, parent_hash);
            }

            current = parent_hash;
        }

        self.root = current;
        MerkleProof160 { leaf: old_leaf, siblings }
    }

    /// Neighbor-hash path for `key` without mutating anything.
    pub fn prove(&self, key: &[u8]) -> MerkleProof160 {
        let key_hash = crypto::hash_key(key);
        let leaf_id = NodeId { height: 0, key: key_hash };
        let leaf = self.get_node_or_default(&leaf_id);

        let mut siblings = Vec::with_capacity(DEPTH);
        for h in 0..DEPTH {
            let sibling_key = flip_bit_lsb(key_hash, h);
            let sibling_id = NodeId {
                height: h as u8,
                key: prefix_key(sibling_key, h),
            };
            siblings.push(self.get_node_or_default(&sibling_id));
        }
        MerkleProof160 { leaf, siblings }
    }

    fn get_node_or_default(&self, id: &NodeId) -> Hash20 {
        self.store.get(id).unwrap_or(self.default_hashes[id.height as usize])
    }
}

/// Walks a sibling path from a leaf hash up to the implied root.
pub fn fold_path(leaf: Hash20, key_hash: &Hash20, siblings: &[Hash20]) -> Hash20 {
    let mut current = leaf;
    for (h, sibling) in siblings.iter().enumerate() {
        current = if bit_at_lsb(key_hash, h) {
            crypto::hash_internal(*sibling, current)
        } else {
            crypto::hash_internal(current, *sibling)
        };
    }
    current
}

/// Verifies a single-leaf proof against a root.
pub fn verify_leaf(root: Hash20, key: &[u8], value: &[u8], proof: &MerkleProof160) -> bool {
    if proof.siblings.len() != DEPTH {
        return false;
    }
    let leaf = crypto::hash_leaf(value);
    if leaf != proof.leaf {
        return false;
    }
    let key_hash = crypto::hash_key(key);
    fold_path(leaf, &key_hash, &proof.siblings) == root
}

/// Pure root computation over a full key/value set.
pub fn compute_root<'a>(entries: impl IntoIterator<Item = (&'a [u8], &'a [u8])>) -> Hash20 {
    let mut tree = SparseMerkleTree::in_memory();
    for (key, value) in entries {
        tree.update_leaf(key, value);
    }
    tree.root()
}

// --- path-bit helpers ---

fn compute_default_hashes() -> Vec<Hash20> {
    let mut defaults = Vec::with_capacity(DEPTH + 1);
    defaults.push(crypto::empty_leaf_hash());
    for h in 0..DEPTH {
        let prev = defaults[h];
        defaults.push(crypto::hash_internal(prev, prev));
    }
    defaults
}

/// Bit `h` of the key hash taken as a big-endian integer.
pub(crate) fn bit_at_lsb(key: &Hash20, h: usize) -> bool {
    let byte_index = 19 - (h / 8);
    let bit_index = h % 8;
    ((key[byte_index] >> bit_index) & 1) == 1
}

fn flip_bit_lsb(mut key: Hash20, h: usize) -> Hash20 {
    let byte_index = 19 - (h / 8);
    let bit_index = h % 8;
    key[byte_index] ^= 1 << bit_index;
    key
}

fn prefix_key(mut key: Hash20, h: usize) -> Hash20 {
    let full_bytes = h / 8;
    for i in 0..full_bytes {
        key[19 - i] = 0;
    }
    let rem_bits = h % 8;
    if rem_bits != 0 {
        let idx = 19 - full_bytes;
        let mask = 0xFFu8 << rem_bits;
        key[idx] &= mask;
    }
    key
}
