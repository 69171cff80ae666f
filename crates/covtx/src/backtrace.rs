//! Genesis backtrace verifier.
//!
//! Proves the spent script is reachable one hop backward from a known genesis
//! outpoint or script. Callers supply the raw commitment preimages of the two
//! preceding transactions per hop; nothing here searches transitively.

use crate::hashes::sha256d;
use crate::{CovTxError, Result};
use serde::{Deserialize, Serialize};

/// Wire size of one input record: 36-byte outpoint + 32-byte script hash
/// + 4-byte sequence.
pub const INPUT_RECORD_LEN: usize = 72;

/// Wire size of one output record: 8-byte value + 32-byte script hash
/// + 32-byte data hash.
pub const OUTPUT_RECORD_LEN: usize = 72;

/// Reference to a transaction output. The txid is held in display order;
/// the wire form reverses it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: [u8; 32],
    pub vout: u32,
}

impl Outpoint {
    /// Reversed txid followed by the little-endian output index.
    pub fn serialize(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        for (i, b) in self.txid.iter().rev().enumerate() {
            out[i] = *b;
        }
        out[32..].copy_from_slice(&covbytes::u32_le(self.vout));
        out
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 36 {
            return Err(CovTxError::MalformedTxPreimage("truncated outpoint"));
        }
        let mut txid = [0u8; 32];
        for (i, b) in data[..32].iter().rev().enumerate() {
            txid[i] = *b;
        }
        let vout = covbytes::read_u32_le(data, 32)?;
        Ok(Self { txid, vout })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInputRecord {
    pub outpoint: Outpoint,
    pub script_hash: [u8; 32],
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutputRecord {
    pub value: u64,
    pub script_hash: [u8; 32],
    pub data_hash: [u8; 32],
}

/// A transaction's commitment preimage, parsed into fixed 72-byte records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxPreimage {
    pub version: u32,
    pub inputs: Vec<TxInputRecord>,
    pub outputs: Vec<TxOutputRecord>,
    pub lock_time: u32,
}

impl TxPreimage {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let version = covbytes::read_u32_le(data, 0)?;
        let mut pos = 4;

        let (input_count, used) = covbytes::read_varint(&data[pos.min(data.len())..])?;
        pos += used;
        if input_count > (data.len() / INPUT_RECORD_LEN) as u64 {
            return Err(CovTxError::MalformedTxPreimage("input count exceeds buffer"));
        }
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            let end = pos + INPUT_RECORD_LEN;
            if data.len() < end {
                return Err(CovTxError::MalformedTxPreimage("truncated input record"));
            }
            let record = &data[pos..end];
            inputs.push(TxInputRecord {
                outpoint: Outpoint::parse(&record[..36])?,
                script_hash: copy32(&record[36..68]),
                sequence: covbytes::read_u32_le(record, 68)?,
            });
            pos = end;
        }

        let (output_count, used) = covbytes::read_varint(&data[pos.min(data.len())..])?;
        pos += used;
        if output_count > (data.len() / OUTPUT_RECORD_LEN) as u64 {
            return Err(CovTxError::MalformedTxPreimage("output count exceeds buffer"));
        }
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            let end = pos + OUTPUT_RECORD_LEN;
            if data.len() < end {
                return Err(CovTxError::MalformedTxPreimage("truncated output record"));
            }
            let record = &data[pos..end];
            outputs.push(TxOutputRecord {
                value: covbytes::read_u64_le(record, 0)?,
                script_hash: copy32(&record[8..40]),
                data_hash: copy32(&record[40..72]),
            });
            pos = end;
        }

        let lock_time = covbytes::read_u32_le(data, pos)?;
        if data.len() != pos + 4 {
            return Err(CovTxError::MalformedTxPreimage("trailing bytes"));
        }
        Ok(Self { version, inputs, outputs, lock_time })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            8 + self.inputs.len() * INPUT_RECORD_LEN + self.outputs.len() * OUTPUT_RECORD_LEN + 18,
        );
        out.extend_from_slice(&covbytes::u32_le(self.version));
        out.extend_from_slice(&covbytes::write_varint(self.inputs.len() as u64));
        for input in &self.inputs {
            out.extend_from_slice(&input.outpoint.serialize());
            out.extend_from_slice(&input.script_hash);
            out.extend_from_slice(&covbytes::u32_le(input.sequence));
        }
        out.extend_from_slice(&covbytes::write_varint(self.outputs.len() as u64));
        for output in &self.outputs {
            out.extend_from_slice(&covbytes::u64_le(output.value));
            out.extend_from_slice(&output.script_hash);
            out.extend_from_slice(&output.data_hash);
        }
        out.extend_from_slice(&covbytes::u32_le(self.lock_time));
        out
    }
}

/// Transaction id of a raw preimage, in display order.
pub fn txid_of(preimage: &[u8]) -> [u8; 32] {
    let mut id = sha256d(preimage);
    id.reverse();
    id
}

/// The previous transaction and its relevant input, plus the transaction it
/// spends from. Used only for lineage verification, never persisted.
#[derive(Clone, Debug)]
pub struct BacktraceInfo {
    /// Raw commitment preimage of the transaction that created the spent UTXO
    pub prev_tx_preimage: Vec<u8>,
    /// Index of the input of interest within that transaction
    pub prev_tx_input_index: usize,
    /// Raw commitment preimage of the transaction that input spends from
    pub prev_prev_tx_preimage: Vec<u8>,
}

impl BacktraceInfo {
    /// Parses both preimages and checks the lineage hashes: the previous
    /// transaction must be the one the spent outpoint references, and the
    /// previous-previous transaction must be the one the sliced input
    /// references, with a matching script hash on the output it spends.
    fn checked_input(&self, spent_outpoint: &Outpoint) -> Result<TxInputRecord> {
        let prev = TxPreimage::parse(&self.prev_tx_preimage)?;
        let input = prev
            .inputs
            .get(self.prev_tx_input_index)
            .cloned()
            .ok_or(CovTxError::InputIndexOutOfRange {
                index: self.prev_tx_input_index,
                count: prev.inputs.len(),
            })?;

        if txid_of(&self.prev_tx_preimage) != spent_outpoint.txid {
            return Err(CovTxError::LineageHashMismatch("previous transaction id"));
        }

        let prev_prev = TxPreimage::parse(&self.prev_prev_tx_preimage)?;
        if txid_of(&self.prev_prev_tx_preimage) != input.outpoint.txid {
            return Err(CovTxError::LineageHashMismatch("previous-previous transaction id"));
        }
        let spent_output = prev_prev
            .outputs
            .get(input.outpoint.vout as usize)
            .ok_or(CovTxError::InputIndexOutOfRange {
                index: input.outpoint.vout as usize,
                count: prev_prev.outputs.len(),
            })?;
        if spent_output.script_hash != input.script_hash {
            return Err(CovTxError::LineageHashMismatch(
                "input script hash vs previous-previous output",
            ));
        }

        Ok(input)
    }
}

/// Outpoint mode: the previous input must reference the genesis outpoint.
pub fn verify_from_outpoint(
    info: &BacktraceInfo,
    spent_outpoint: &Outpoint,
    genesis_outpoint: &Outpoint,
) -> Result<()> {
    let input = info.checked_input(spent_outpoint)?;
    if input.outpoint != *genesis_outpoint {
        return Err(CovTxError::GenesisOutpointMismatch);
    }
    tracing::debug!(vout = input.outpoint.vout, "backtrace verified against genesis outpoint");
    Ok(())
}

/// Script mode: the previous input's script hash must equal the genesis
/// script's hash, or the current spent script's hash.
///
/// The second branch is the self-perpetuating case: a contract whose output
/// script equals the script now being spent is accepted regardless of the
/// genesis script. Its security implications relative to the strict genesis
/// path are under review; callers wanting the strict check should pass a
/// `current_script_hash` that cannot collide with their script lineage.
pub fn verify_from_script(
    info: &BacktraceInfo,
    spent_outpoint: &Outpoint,
    genesis_script_hash: &[u8; 32],
    current_script_hash: &[u8; 32],
) -> Result<()> {
    let input = info.checked_input(spent_outpoint)?;
    if input.script_hash != *genesis_script_hash && input.script_hash != *current_script_hash {
        return Err(CovTxError::GenesisScriptMismatch);
    }
    tracing::debug!("backtrace verified against genesis script");
    Ok(())
}

fn copy32(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(data);
    out
}
