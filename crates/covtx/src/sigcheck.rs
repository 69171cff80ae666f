//! Off-chain equivalents of the interpreter's signature-check opcodes.
//!
//! The commitment context is passed explicitly; nothing here reads ambient
//! transaction state. Malformed public keys are structural errors; malformed
//! or failing signatures soft-fail to `false` the way the opcodes do.

use crate::hashes::{sha256, sha256d};
use crate::preimage::SHPreimage;
use crate::{CovTxError, Result};
use secp256k1::{ecdsa, All, Message, PublicKey, Secp256k1};
use std::sync::OnceLock;

fn secp() -> &'static Secp256k1<All> {
    static CTX: OnceLock<Secp256k1<All>> = OnceLock::new();
    CTX.get_or_init(Secp256k1::new)
}

/// The digest a transaction-commitment signature is computed over: the
/// double-SHA256 of the re-serialized preimage, byte-reversed because the
/// interpreter treats the commitment digest as little-endian.
fn commitment_digest(ctx: &SHPreimage) -> [u8; 32] {
    let mut digest = sha256d(&ctx.serialize());
    digest.reverse();
    digest
}

fn parse_pub_key(pub_key: &[u8]) -> Result<PublicKey> {
    PublicKey::from_slice(pub_key).map_err(|_| CovTxError::InvalidPublicKey)
}

/// Strips the trailing sighash-flag byte and parses the strict-DER body.
/// `None` means the slot soft-fails (empty or malformed encoding).
fn parse_tx_signature(sig: &[u8]) -> Option<ecdsa::Signature> {
    let (der, _flag) = sig.split_at(sig.len().checked_sub(1)?);
    ecdsa::Signature::from_der(der).ok()
}

/// Emulates the interpreter's CHECKSIG over the transaction commitment.
pub fn check_sig(ctx: &SHPreimage, sig: &[u8], pub_key: &[u8]) -> Result<bool> {
    let key = parse_pub_key(pub_key)?;
    let Some(signature) = parse_tx_signature(sig) else {
        return Ok(false);
    };
    let msg = Message::from_digest(commitment_digest(ctx));
    Ok(secp().verify_ecdsa(&msg, &signature, &key).is_ok())
}

/// Emulates the interpreter's multisig opcode: greedy forward matching.
///
/// Each well-formed signature must verify against some not-yet-consumed key,
/// scanning forward; exhausting the remaining keys fails the whole check, so
/// matched keys appear in non-decreasing order. A slot with a malformed
/// encoding is skipped without consuming a key (the interpreter's
/// placeholder-slot behavior).
pub fn check_multi_sig(ctx: &SHPreimage, sigs: &[&[u8]], pub_keys: &[&[u8]]) -> Result<bool> {
    let keys = pub_keys
        .iter()
        .map(|k| parse_pub_key(k))
        .collect::<Result<Vec<_>>>()?;
    let msg = Message::from_digest(commitment_digest(ctx));

    let mut key_pos = 0usize;
    for sig in sigs {
        let Some(signature) = parse_tx_signature(sig) else {
            continue;
        };
        let mut matched = false;
        while key_pos < keys.len() {
            let key = &keys[key_pos];
            key_pos += 1;
            if secp().verify_ecdsa(&msg, &signature, key).is_ok() {
                matched = true;
                break;
            }
        }
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Emulates the data-attestation check: a single SHA256 of explicit data,
/// no sighash-flag byte on the signature.
pub fn check_data_sig(message: &[u8], sig: &[u8], pub_key: &[u8]) -> Result<bool> {
    let key = parse_pub_key(pub_key)?;
    let Ok(signature) = ecdsa::Signature::from_der(sig) else {
        return Ok(false);
    };
    let msg = Message::from_digest(sha256(message));
    Ok(secp().verify_ecdsa(&msg, &signature, &key).is_ok())
}
