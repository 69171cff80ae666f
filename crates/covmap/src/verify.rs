//! Off-chain equivalent of the on-chain access-proof check.

use crate::smt::{bit_at_lsb, DEPTH};
use crate::types::{AccessContext, MAX_TRACED_KEYS, PROOF_SIZE};
use crate::{crypto, CovMapError, Hash20, Result};

/// Validates a proof bundle against `before_root` and derives the resulting
/// root, which must equal the bundle's claimed after-root.
///
/// Each entry chains: the BEFORE leaf must be provable from the running root
/// along the key's path, then the AFTER leaf along the same path becomes the
/// next running root. Any mismatch signals a forged proof or a defect and is
/// an error, never a soft `false`.
pub fn verify_access_context(before_root: Hash20, ctx: &AccessContext) -> Result<Hash20> {
    if ctx.proofs.len() % PROOF_SIZE != 0 {
        return Err(CovMapError::MalformedBatch("proof bytes not a multiple of 3220"));
    }
    let count = ctx.proofs.len() / PROOF_SIZE;
    if count > MAX_TRACED_KEYS {
        return Err(CovMapError::AccessOverflow { count, limit: MAX_TRACED_KEYS });
    }
    if ctx.keys.len() < count
        || ctx.before_values.len() != ctx.keys.len()
        || ctx.after_values.len() != ctx.keys.len()
        || ctx.written.len() != ctx.keys.len()
    {
        return Err(CovMapError::MalformedBatch("slot arrays shorter than proof count"));
    }
    check_access_indices(&ctx.access_indices, count)?;

    tracing::debug!(entries = count, "verifying access context");

    let mut root = before_root;
    for i in 0..count {
        let proof = &ctx.proofs[i * PROOF_SIZE..(i + 1) * PROOF_SIZE];
        let mut stored_leaf = [0u8; 20];
        stored_leaf.copy_from_slice(&proof[..20]);

        let before_leaf = crypto::hash_leaf(&ctx.before_values[i]);
        if stored_leaf != before_leaf {
            return Err(CovMapError::BeforeLeafMismatch(i));
        }

        let key_hash = crypto::hash_key(&ctx.keys[i]);
        let siblings = &proof[20..];

        let implied = fold_raw_path(before_leaf, &key_hash, siblings);
        if implied != root {
            return Err(CovMapError::PathMismatch(i));
        }

        let after_leaf = crypto::hash_leaf(&ctx.after_values[i]);
        root = fold_raw_path(after_leaf, &key_hash, siblings);
    }

    if root != ctx.after_root {
        return Err(CovMapError::RootMismatch);
    }

    // slots the call did not intend to mutate must carry identical values
    for i in 0..ctx.keys.len() {
        if i >= count {
            // padding must stay inert
            if !ctx.keys[i].is_empty()
                || !ctx.before_values[i].is_empty()
                || !ctx.after_values[i].is_empty()
                || ctx.written[i]
            {
                return Err(CovMapError::MalformedBatch("non-empty padding slot"));
            }
            continue;
        }
        if !ctx.written[i] && ctx.before_values[i] != ctx.after_values[i] {
            return Err(CovMapError::UnwrittenSlotMutated(i));
        }
    }

    Ok(root)
}

fn check_access_indices(indices: &[u8], count: usize) -> Result<()> {
    let mut seen = 0usize;
    for &idx in indices {
        let idx = idx as usize;
        if idx > MAX_TRACED_KEYS {
            return Err(CovMapError::MalformedAccessIndices("index above 127"));
        }
        if idx >= count {
            return Err(CovMapError::MalformedAccessIndices("index beyond distinct keys"));
        }
        // a key's first access must mint the next unused index
        if idx > seen {
            return Err(CovMapError::MalformedAccessIndices("first occurrences out of order"));
        }
        if idx == seen {
            seen += 1;
        }
    }
    if seen != count {
        return Err(CovMapError::MalformedAccessIndices("unreferenced distinct key"));
    }
    Ok(())
}

fn fold_raw_path(leaf: Hash20, key_hash: &Hash20, siblings: &[u8]) -> Hash20 {
    debug_assert_eq!(siblings.len(), DEPTH * 20);
    let mut current = leaf;
    for h in 0..DEPTH {
        let mut sibling = [0u8; 20];
        sibling.copy_from_slice(&siblings[h * 20..(h + 1) * 20]);
        current = if bit_at_lsb(key_hash, h) {
            crypto::hash_internal(sibling, current)
        } else {
            crypto::hash_internal(current, sibling)
        };
    }
    current
}
