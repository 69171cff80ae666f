//! Transaction-introspection covenant verification
//!
//! Off-chain engine reproducing the script interpreter's semantics
//! byte-for-byte: the commitment-preimage codec with its canonical-signature
//! trick, the signature-check opcode emulation, and the genesis backtrace
//! verifier. Every byte layout, truncation rule and comparison here must
//! match the interpreter exactly.

mod backtrace;
mod hashes;
mod preimage;
mod sigcheck;

pub use backtrace::{
    txid_of, verify_from_outpoint, verify_from_script, BacktraceInfo, Outpoint, TxInputRecord,
    TxOutputRecord, TxPreimage, INPUT_RECORD_LEN, OUTPUT_RECORD_LEN,
};
pub use hashes::{sha256, sha256d};
pub use preimage::{
    nonce_preimage_prefix, sighash_preimage_prefix, to_canonical_signature, SHPreimage,
    PREFIX_LEN, SH_PREIMAGE_LEN,
};
pub use sigcheck::{check_data_sig, check_multi_sig, check_sig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CovTxError {
    #[error("preimage length {0}, expected {}", SH_PREIMAGE_LEN)]
    PreimageLength(usize),

    #[error("preimage prefix mismatch")]
    PrefixMismatch,

    #[error("preimage/nonce mismatch")]
    NonceMismatch,

    #[error("nonce last byte 0xff cannot be incremented")]
    NonceOverflow,

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("lineage hash mismatch: {0}")]
    LineageHashMismatch(&'static str),

    #[error("input index {index} out of range ({count} records)")]
    InputIndexOutOfRange { index: usize, count: usize },

    #[error("outpoint does not match genesis outpoint")]
    GenesisOutpointMismatch,

    #[error("script hash matches neither genesis nor current script")]
    GenesisScriptMismatch,

    #[error("malformed transaction preimage: {0}")]
    MalformedTxPreimage(&'static str),

    #[error(transparent)]
    Bytes(#[from] covbytes::BytesError),
}

pub type Result<T> = std::result::Result<T, CovTxError>;
