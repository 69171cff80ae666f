use covtx::{
    check_data_sig, check_multi_sig, check_sig, nonce_preimage_prefix, sha256, sha256d,
    to_canonical_signature, txid_of, verify_from_outpoint, verify_from_script, BacktraceInfo,
    CovTxError, Outpoint, SHPreimage, TxInputRecord, TxOutputRecord, TxPreimage, SH_PREIMAGE_LEN,
};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

fn recompute_nonce(p: &mut SHPreimage) {
    let sighash = p.sighash();
    let mut buf = [0u8; 160];
    buf[..128].copy_from_slice(nonce_preimage_prefix());
    buf[128..].copy_from_slice(&sighash);
    let e = sha256(&buf);
    p.e_without_last_byte.copy_from_slice(&e[..31]);
    p.e_last_byte = e[31];
}

fn sample_preimage() -> SHPreimage {
    let mut p = SHPreimage {
        version: [2, 0, 0, 0],
        lock_time: [0; 4],
        sha_prevouts: [0x11; 32],
        sha_amounts: [0x22; 32],
        sha_scripts: [0x33; 32],
        sha_sequences: [0x44; 32],
        sha_outputs: [0x55; 32],
        spend_type: 0,
        input_index: [0; 4],
        leaf_hash: [0x66; 32],
        key_version: 0,
        code_sep_pos: [0xff; 4],
        e_without_last_byte: [0; 31],
        e_last_byte: 0,
    };
    // pick an input index whose nonce last byte can be incremented
    for i in 0u32..64 {
        p.input_index = i.to_le_bytes();
        recompute_nonce(&mut p);
        if p.e_last_byte != u8::MAX {
            return p;
        }
    }
    unreachable!("no incrementable nonce in 64 attempts");
}

// ---------------- preimage codec ---------------- //

#[test]
fn test_split_serialize_roundtrip() {
    let p = sample_preimage();
    let bytes = p.serialize();
    assert_eq!(bytes.len(), SH_PREIMAGE_LEN);

    let reparsed = SHPreimage::split(&bytes).unwrap();
    assert_eq!(reparsed, p);
    assert_eq!(reparsed.serialize()[..], bytes[..]);
}

#[test]
fn test_split_rejects_bad_input() {
    let p = sample_preimage();
    let bytes = p.serialize();

    assert!(matches!(
        SHPreimage::split(&bytes[..307]),
        Err(CovTxError::PreimageLength(307))
    ));

    let mut corrupt = bytes;
    corrupt[3] ^= 0x01; // inside the tag-hash header
    assert!(matches!(
        SHPreimage::split(&corrupt),
        Err(CovTxError::PrefixMismatch)
    ));
}

#[test]
fn test_canonical_signature_deterministic() {
    let p = sample_preimage();
    let sig1 = to_canonical_signature(&p).unwrap();
    let sig2 = to_canonical_signature(&p).unwrap();
    assert_eq!(sig1, sig2);

    assert_eq!(sig1[..32], secp256k1::constants::GENERATOR_X);
    assert_eq!(sig1[32..63], p.e_without_last_byte);
    assert_eq!(sig1[63], p.e_last_byte + 1);
}

#[test]
fn test_canonical_signature_rejects_flipped_field() {
    // flipping any committed field byte changes the derived nonce
    let mut p = sample_preimage();
    p.sha_outputs[5] ^= 0x01;
    assert!(matches!(
        to_canonical_signature(&p),
        Err(CovTxError::NonceMismatch)
    ));

    let mut p = sample_preimage();
    p.version[0] ^= 0x01;
    assert!(matches!(
        to_canonical_signature(&p),
        Err(CovTxError::NonceMismatch)
    ));

    let mut p = sample_preimage();
    p.e_last_byte ^= 0x01;
    assert!(matches!(
        to_canonical_signature(&p),
        Err(CovTxError::NonceMismatch)
    ));
}

// ---------------- signature checks ---------------- //

fn keypair(secp: &Secp256k1<secp256k1::All>) -> (SecretKey, PublicKey) {
    let sk = SecretKey::new(&mut rand::thread_rng());
    (sk, PublicKey::from_secret_key(secp, &sk))
}

fn sign_commitment(secp: &Secp256k1<secp256k1::All>, p: &SHPreimage, sk: &SecretKey) -> Vec<u8> {
    let mut digest = sha256d(&p.serialize());
    digest.reverse();
    let msg = Message::from_digest(digest);
    let mut sig = secp.sign_ecdsa(&msg, sk).serialize_der().to_vec();
    sig.push(0x41); // sighash flag
    sig
}

#[test]
fn test_check_sig() {
    let secp = Secp256k1::new();
    let p = sample_preimage();
    let (sk, pk) = keypair(&secp);
    let (_, other_pk) = keypair(&secp);

    let sig = sign_commitment(&secp, &p, &sk);
    assert!(check_sig(&p, &sig, &pk.serialize()).unwrap());
    assert!(!check_sig(&p, &sig, &other_pk.serialize()).unwrap());

    // malformed signature soft-fails
    assert!(!check_sig(&p, &[], &pk.serialize()).unwrap());
    assert!(!check_sig(&p, &[0x30, 0x01, 0x00, 0x41], &pk.serialize()).unwrap());

    // malformed public key is structural
    assert!(matches!(
        check_sig(&p, &sig, &[0x02, 0x03]),
        Err(CovTxError::InvalidPublicKey)
    ));
}

#[test]
fn test_check_multi_sig_matching() {
    let secp = Secp256k1::new();
    let p = sample_preimage();
    let (sk1, pk1) = keypair(&secp);
    let (_sk2, pk2) = keypair(&secp);
    let (sk3, pk3) = keypair(&secp);

    let sig1 = sign_commitment(&secp, &p, &sk1);
    let sig3 = sign_commitment(&secp, &p, &sk3);
    let invalid = vec![0u8; 10];

    let keys = [
        pk1.serialize().to_vec(),
        pk2.serialize().to_vec(),
        pk3.serialize().to_vec(),
    ];
    let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();

    // a malformed slot is skipped without consuming a key
    let sigs: Vec<&[u8]> = vec![&sig1, &invalid, &sig3];
    assert!(check_multi_sig(&p, &sigs, &key_refs).unwrap());

    // a duplicate well-formed signature exhausts the remaining keys
    let sigs: Vec<&[u8]> = vec![&sig1, &sig1, &sig3];
    assert!(!check_multi_sig(&p, &sigs, &key_refs).unwrap());

    // matched keys must be in non-decreasing order
    let sigs: Vec<&[u8]> = vec![&sig3, &sig1];
    assert!(!check_multi_sig(&p, &sigs, &key_refs).unwrap());

    let sigs: Vec<&[u8]> = vec![&sig1, &sig3];
    assert!(check_multi_sig(&p, &sigs, &key_refs).unwrap());
}

#[test]
fn test_check_data_sig() {
    let secp = Secp256k1::new();
    let (sk, pk) = keypair(&secp);
    let message = b"state commitment v7";

    let msg = Message::from_digest(sha256(message));
    let sig = secp.sign_ecdsa(&msg, &sk).serialize_der().to_vec();

    assert!(check_data_sig(message, &sig, &pk.serialize()).unwrap());
    assert!(!check_data_sig(b"other data", &sig, &pk.serialize()).unwrap());
    assert!(!check_data_sig(message, &[0xde, 0xad], &pk.serialize()).unwrap());
}

// ---------------- backtrace ---------------- //

struct Lineage {
    info: BacktraceInfo,
    spent_outpoint: Outpoint,
    genesis_outpoint: Outpoint,
    script_hash: [u8; 32],
}

fn build_lineage() -> Lineage {
    let script_hash = [0x5c; 32];

    let prev_prev = TxPreimage {
        version: 2,
        inputs: vec![TxInputRecord {
            outpoint: Outpoint { txid: [0x01; 32], vout: 0 },
            script_hash: [0x0a; 32],
            sequence: 0xffff_ffff,
        }],
        outputs: vec![
            TxOutputRecord { value: 546, script_hash: [0x0b; 32], data_hash: [0; 32] },
            TxOutputRecord { value: 10_000, script_hash, data_hash: [0x0c; 32] },
        ],
        lock_time: 0,
    };
    let prev_prev_raw = prev_prev.serialize();
    let genesis_outpoint = Outpoint { txid: txid_of(&prev_prev_raw), vout: 1 };

    let prev = TxPreimage {
        version: 2,
        inputs: vec![TxInputRecord {
            outpoint: genesis_outpoint,
            script_hash,
            sequence: 0xffff_ffff,
        }],
        outputs: vec![TxOutputRecord { value: 9_000, script_hash, data_hash: [0; 32] }],
        lock_time: 0,
    };
    let prev_raw = prev.serialize();
    let spent_outpoint = Outpoint { txid: txid_of(&prev_raw), vout: 0 };

    Lineage {
        info: BacktraceInfo {
            prev_tx_preimage: prev_raw,
            prev_tx_input_index: 0,
            prev_prev_tx_preimage: prev_prev_raw,
        },
        spent_outpoint,
        genesis_outpoint,
        script_hash,
    }
}

#[test]
fn test_tx_preimage_roundtrip() {
    let l = build_lineage();
    let parsed = TxPreimage::parse(&l.info.prev_tx_preimage).unwrap();
    assert_eq!(parsed.serialize(), l.info.prev_tx_preimage);
    assert_eq!(parsed.inputs.len(), 1);
    assert_eq!(parsed.outputs.len(), 1);
}

#[test]
fn test_tx_preimage_rejects_oversized_counts() {
    // claimed record counts far beyond the buffer must error, not allocate
    let mut raw = vec![2, 0, 0, 0, 0xff];
    raw.extend_from_slice(&u64::MAX.to_le_bytes());
    assert!(matches!(
        TxPreimage::parse(&raw),
        Err(CovTxError::MalformedTxPreimage(_))
    ));

    // zero inputs, absurd output count
    let mut raw = vec![2, 0, 0, 0, 0x00, 0xfe];
    raw.extend_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        TxPreimage::parse(&raw),
        Err(CovTxError::MalformedTxPreimage(_))
    ));
}

#[test]
fn test_backtrace_outpoint_mode() {
    let l = build_lineage();
    verify_from_outpoint(&l.info, &l.spent_outpoint, &l.genesis_outpoint).unwrap();

    // mutating one byte of the genesis target fails the equality
    let mut wrong = l.genesis_outpoint;
    wrong.txid[7] ^= 0x01;
    assert!(matches!(
        verify_from_outpoint(&l.info, &l.spent_outpoint, &wrong),
        Err(CovTxError::GenesisOutpointMismatch)
    ));
}

#[test]
fn test_backtrace_lineage_hash_mismatch() {
    let l = build_lineage();

    // spent outpoint referencing a different transaction
    let mut wrong_spent = l.spent_outpoint;
    wrong_spent.txid[0] ^= 0x01;
    assert!(matches!(
        verify_from_outpoint(&l.info, &wrong_spent, &l.genesis_outpoint),
        Err(CovTxError::LineageHashMismatch(_))
    ));

    // tampered previous-previous preimage breaks the inner link
    let mut tampered = l.info.clone();
    tampered.prev_prev_tx_preimage[0] ^= 0x01;
    assert!(matches!(
        verify_from_outpoint(&tampered, &l.spent_outpoint, &l.genesis_outpoint),
        Err(CovTxError::LineageHashMismatch(_))
    ));
}

#[test]
fn test_backtrace_script_mode() {
    let l = build_lineage();

    verify_from_script(&l.info, &l.spent_outpoint, &l.script_hash, &[0xee; 32]).unwrap();

    // self-perpetuating branch: current spent script matches the input's
    verify_from_script(&l.info, &l.spent_outpoint, &[0xee; 32], &l.script_hash).unwrap();

    assert!(matches!(
        verify_from_script(&l.info, &l.spent_outpoint, &[0xee; 32], &[0xdd; 32]),
        Err(CovTxError::GenesisScriptMismatch)
    ));
}

#[test]
fn test_backtrace_input_index_bounds() {
    let l = build_lineage();
    let mut info = l.info.clone();
    info.prev_tx_input_index = 3;
    assert!(matches!(
        verify_from_outpoint(&info, &l.spent_outpoint, &l.genesis_outpoint),
        Err(CovTxError::InputIndexOutOfRange { index: 3, count: 1 })
    ));
}
