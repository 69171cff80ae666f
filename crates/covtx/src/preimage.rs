//! Commitment-preimage codec and the canonical-signature trick.
//!
//! A covenant is handed the raw preimage of the commitment hash the
//! interpreter signs over. [`SHPreimage::split`] decomposes it at fixed
//! offsets; [`to_canonical_signature`] rebuilds the one signature the
//! interpreter will accept for the generator-point public key, proving the
//! preimage really belongs to the spending transaction.

use crate::hashes::sha256;
use crate::{CovTxError, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Full preimage buffer length.
pub const SH_PREIMAGE_LEN: usize = 308;

/// Length of the fixed header: two 32-byte tag hashes, epoch, sighash type.
pub const PREFIX_LEN: usize = 66;

/// Bytes covered by the commitment hash (everything before the nonce tail).
const SIGHASH_SPAN: usize = 276;

const OFS_VERSION: usize = 66;
const OFS_LOCK_TIME: usize = 70;
const OFS_SHA_PREVOUTS: usize = 74;
const OFS_SHA_AMOUNTS: usize = 106;
const OFS_SHA_SCRIPTS: usize = 138;
const OFS_SHA_SEQUENCES: usize = 170;
const OFS_SHA_OUTPUTS: usize = 202;
const OFS_SPEND_TYPE: usize = 234;
const OFS_INPUT_INDEX: usize = 235;
const OFS_LEAF_HASH: usize = 239;
const OFS_KEY_VERSION: usize = 271;
const OFS_CODE_SEP_POS: usize = 272;
const OFS_E: usize = 276;

/// Fixed prefix occupying the first 66 bytes of every preimage:
/// `SHA256("TapSighash") x2 || epoch (0x00) || sighash type (0x00)`.
pub fn sighash_preimage_prefix() -> &'static [u8; PREFIX_LEN] {
    static PREFIX: OnceLock<[u8; PREFIX_LEN]> = OnceLock::new();
    PREFIX.get_or_init(|| {
        let tag = sha256(b"TapSighash");
        let mut out = [0u8; PREFIX_LEN];
        out[..32].copy_from_slice(&tag);
        out[32..64].copy_from_slice(&tag);
        // out[64] = epoch, out[65] = sighash type, both zero
        out
    })
}

/// Fixed 128-byte prefix for nonce derivation:
/// `SHA256("BIP0340/challenge") x2 || Gx || Gx`, the tagged challenge over
/// the generator point serving as both nonce point and public key.
pub fn nonce_preimage_prefix() -> &'static [u8; 128] {
    static PREFIX: OnceLock<[u8; 128]> = OnceLock::new();
    PREFIX.get_or_init(|| {
        let tag = sha256(b"BIP0340/challenge");
        let gx = secp256k1::constants::GENERATOR_X;
        let mut out = [0u8; 128];
        out[..32].copy_from_slice(&tag);
        out[32..64].copy_from_slice(&tag);
        out[64..96].copy_from_slice(&gx);
        out[96..128].copy_from_slice(&gx);
        out
    })
}

/// Decomposed commitment preimage for one input.
///
/// Multi-byte integer fields are kept in wire order (little-endian) so that
/// re-encoding in field order reproduces the interpreter's buffer exactly;
/// accessors decode them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SHPreimage {
    pub version: [u8; 4],
    pub lock_time: [u8; 4],
    pub sha_prevouts: [u8; 32],
    pub sha_amounts: [u8; 32],
    pub sha_scripts: [u8; 32],
    pub sha_sequences: [u8; 32],
    pub sha_outputs: [u8; 32],
    pub spend_type: u8,
    pub input_index: [u8; 4],
    pub leaf_hash: [u8; 32],
    pub key_version: u8,
    pub code_sep_pos: [u8; 4],
    /// First 31 bytes of the interpreter's nonce
    pub e_without_last_byte: [u8; 31],
    pub e_last_byte: u8,
}

fn slice<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

impl SHPreimage {
    /// Slices a flat preimage buffer at the fixed field offsets.
    pub fn split(data: &[u8]) -> Result<Self> {
        if data.len() != SH_PREIMAGE_LEN {
            return Err(CovTxError::PreimageLength(data.len()));
        }
        if data[..PREFIX_LEN] != sighash_preimage_prefix()[..] {
            return Err(CovTxError::PrefixMismatch);
        }
        Ok(Self {
            version: slice(data, OFS_VERSION),
            lock_time: slice(data, OFS_LOCK_TIME),
            sha_prevouts: slice(data, OFS_SHA_PREVOUTS),
            sha_amounts: slice(data, OFS_SHA_AMOUNTS),
            sha_scripts: slice(data, OFS_SHA_SCRIPTS),
            sha_sequences: slice(data, OFS_SHA_SEQUENCES),
            sha_outputs: slice(data, OFS_SHA_OUTPUTS),
            spend_type: data[OFS_SPEND_TYPE],
            input_index: slice(data, OFS_INPUT_INDEX),
            leaf_hash: slice(data, OFS_LEAF_HASH),
            key_version: data[OFS_KEY_VERSION],
            code_sep_pos: slice(data, OFS_CODE_SEP_POS),
            e_without_last_byte: slice(data, OFS_E),
            e_last_byte: data[SH_PREIMAGE_LEN - 1],
        })
    }

    /// Exact inverse of [`split`](Self::split); round-trips byte-for-byte.
    pub fn serialize(&self) -> [u8; SH_PREIMAGE_LEN] {
        let mut out = [0u8; SH_PREIMAGE_LEN];
        out[..PREFIX_LEN].copy_from_slice(sighash_preimage_prefix());
        out[OFS_VERSION..OFS_LOCK_TIME].copy_from_slice(&self.version);
        out[OFS_LOCK_TIME..OFS_SHA_PREVOUTS].copy_from_slice(&self.lock_time);
        out[OFS_SHA_PREVOUTS..OFS_SHA_AMOUNTS].copy_from_slice(&self.sha_prevouts);
        out[OFS_SHA_AMOUNTS..OFS_SHA_SCRIPTS].copy_from_slice(&self.sha_amounts);
        out[OFS_SHA_SCRIPTS..OFS_SHA_SEQUENCES].copy_from_slice(&self.sha_scripts);
        out[OFS_SHA_SEQUENCES..OFS_SHA_OUTPUTS].copy_from_slice(&self.sha_sequences);
        out[OFS_SHA_OUTPUTS..OFS_SPEND_TYPE].copy_from_slice(&self.sha_outputs);
        out[OFS_SPEND_TYPE] = self.spend_type;
        out[OFS_INPUT_INDEX..OFS_LEAF_HASH].copy_from_slice(&self.input_index);
        out[OFS_LEAF_HASH..OFS_KEY_VERSION].copy_from_slice(&self.leaf_hash);
        out[OFS_KEY_VERSION] = self.key_version;
        out[OFS_CODE_SEP_POS..OFS_E].copy_from_slice(&self.code_sep_pos);
        out[OFS_E..SH_PREIMAGE_LEN - 1].copy_from_slice(&self.e_without_last_byte);
        out[SH_PREIMAGE_LEN - 1] = self.e_last_byte;
        out
    }

    /// The commitment hash: SHA256 over the prefix and all fields, excluding
    /// the nonce tail.
    pub fn sighash(&self) -> [u8; 32] {
        sha256(&self.serialize()[..SIGHASH_SPAN])
    }

    pub fn version(&self) -> u32 {
        u32::from_le_bytes(self.version)
    }

    pub fn lock_time(&self) -> u32 {
        u32::from_le_bytes(self.lock_time)
    }

    pub fn input_index(&self) -> u32 {
        u32::from_le_bytes(self.input_index)
    }

    pub fn code_sep_pos(&self) -> u32 {
        u32::from_le_bytes(self.code_sep_pos)
    }
}

/// Recomputes the interpreter's nonce from the preimage and returns the
/// fixed-form 64-byte signature `Gx || e[..31] || (e_last_byte + 1)`.
///
/// With the generator as public key and nonce point and a private key of one,
/// `s = e + 1`, so the signature is valid exactly when the preimage hashes to
/// the commitment the interpreter built for the spending transaction. A
/// mismatch is fatal: the caller handed over a preimage that is not this
/// transaction's.
pub fn to_canonical_signature(preimage: &SHPreimage) -> Result<[u8; 64]> {
    let sighash = preimage.sighash();

    let mut e_input = [0u8; 160];
    e_input[..128].copy_from_slice(nonce_preimage_prefix());
    e_input[128..].copy_from_slice(&sighash);
    let e = sha256(&e_input);

    if e[..31] != preimage.e_without_last_byte || e[31] != preimage.e_last_byte {
        return Err(CovTxError::NonceMismatch);
    }
    // the +1 below must not carry into the upper bytes
    if preimage.e_last_byte == u8::MAX {
        return Err(CovTxError::NonceOverflow);
    }

    tracing::trace!(input_index = preimage.input_index(), "derived canonical signature");

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&secp256k1::constants::GENERATOR_X);
    sig[32..63].copy_from_slice(&preimage.e_without_last_byte);
    sig[63] = preimage.e_last_byte + 1;
    Ok(sig)
}
