//! Transaction signature hashes.
//!
//! Two schemes exist: the legacy one used by base scripts, which hashes a modified copy
//! of the whole transaction, and the BIP143 one used by version 0 witness programs,
//! which commits to the spent amount and reuses three per-transaction hashes cached in
//! [`TxSigHashes`].

use crate::error::Error;
use crate::opcode::{OP_CHECKSIG, OP_CODESEPARATOR, OP_DATA_20, OP_DUP, OP_EQUALVERIFY, OP_HASH160};
use crate::script::{ParsedOpcode, is_witness_pubkey_hash, parse_script, remove_opcode, unparse_script};
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::{Hash, sha256d};
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction};

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Selects the base type out of a hash type byte.
pub const SIGHASH_MASK: u32 = 0x1f;

/// Hash returned by the legacy scheme for SIGHASH_SINGLE without a matching output.
const ONE_HASH: [u8; 32] = {
    let mut hash = [0u8; 32];
    hash[0] = 1;
    hash
};

/// Per-transaction midstate hashes shared by every witness input of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSigHashes {
    pub hash_prevouts: sha256d::Hash,
    pub hash_sequence: sha256d::Hash,
    pub hash_outputs: sha256d::Hash,
}

impl TxSigHashes {
    pub fn new(tx: &Transaction) -> Self {
        let mut prevouts = Vec::with_capacity(tx.input.len() * 36);
        let mut sequences = Vec::with_capacity(tx.input.len() * 4);
        for input in &tx.input {
            prevouts.extend(serialize(&input.previous_output));
            sequences.extend_from_slice(&input.sequence.0.to_le_bytes());
        }

        let mut outputs = Vec::new();
        for output in &tx.output {
            outputs.extend(serialize(output));
        }

        Self {
            hash_prevouts: sha256d::Hash::hash(&prevouts),
            hash_sequence: sha256d::Hash::hash(&sequences),
            hash_outputs: sha256d::Hash::hash(&outputs),
        }
    }
}

fn check_index(tx: &Transaction, index: usize) -> Result<(), Error> {
    if index >= tx.input.len() {
        return Err(Error::InvalidIndex {
            index,
            inputs: tx.input.len(),
        });
    }
    Ok(())
}

/// Computes the legacy signature hash of input `index` signing `script`.
///
/// OP_CODESEPARATOR opcodes are stripped from the script before hashing.
pub fn calc_signature_hash(
    script: &[u8],
    hash_type: u32,
    tx: &Transaction,
    index: usize,
) -> Result<[u8; 32], Error> {
    let opcodes = parse_script(script)?;
    legacy_signature_hash(&opcodes, hash_type, tx, index)
}

fn legacy_signature_hash(
    script: &[ParsedOpcode<'_>],
    hash_type: u32,
    tx: &Transaction,
    index: usize,
) -> Result<[u8; 32], Error> {
    check_index(tx, index)?;

    let base_type = hash_type & SIGHASH_MASK;

    // Signing a non-existent output commits to the constant one instead of failing,
    // this has been part of consensus since the beginning.
    if base_type == SIGHASH_SINGLE && index >= tx.output.len() {
        return Ok(ONE_HASH);
    }

    let script_code = ScriptBuf::from_bytes(unparse_script(&remove_opcode(script, OP_CODESEPARATOR))?);

    let mut tx_copy = tx.clone();
    for (i, input) in tx_copy.input.iter_mut().enumerate() {
        input.witness.clear();
        input.script_sig = if i == index {
            script_code.clone()
        } else {
            ScriptBuf::new()
        };
    }

    match base_type {
        SIGHASH_NONE => {
            tx_copy.output.clear();
            zero_other_sequences(&mut tx_copy, index);
        }
        SIGHASH_SINGLE => {
            tx_copy.output.truncate(index + 1);
            for output in &mut tx_copy.output[..index] {
                // Serializes as a value of -1.
                output.value = Amount::from_sat(u64::MAX);
                output.script_pubkey = ScriptBuf::new();
            }
            zero_other_sequences(&mut tx_copy, index);
        }
        // SIGHASH_ALL and undefined types sign everything.
        _ => {}
    }

    if hash_type & SIGHASH_ANYONECANPAY != 0 {
        tx_copy.input.swap(0, index);
        tx_copy.input.truncate(1);
    }

    let mut preimage = serialize(&tx_copy);
    preimage.extend_from_slice(&hash_type.to_le_bytes());

    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}

fn zero_other_sequences(tx: &mut Transaction, index: usize) {
    for (i, input) in tx.input.iter_mut().enumerate() {
        if i != index {
            input.sequence = Sequence::ZERO;
        }
    }
}

/// Computes the BIP143 signature hash of input `index` spending `amount`.
///
/// A pay-to-witness-pubkey-hash program passed as `script` is expanded to the
/// pay-to-pubkey-hash script it commits to.
pub fn calc_witness_signature_hash(
    script: &[u8],
    sig_hashes: &TxSigHashes,
    hash_type: u32,
    tx: &Transaction,
    index: usize,
    amount: Amount,
) -> Result<[u8; 32], Error> {
    if is_witness_pubkey_hash(script) {
        let mut script_code = vec![OP_DUP, OP_HASH160, OP_DATA_20];
        script_code.extend_from_slice(&script[2..]);
        script_code.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        return witness_signature_hash(&script_code, sig_hashes, hash_type, tx, index, amount);
    }

    witness_signature_hash(script, sig_hashes, hash_type, tx, index, amount)
}

pub(crate) fn witness_signature_hash(
    script_code: &[u8],
    sig_hashes: &TxSigHashes,
    hash_type: u32,
    tx: &Transaction,
    index: usize,
    amount: Amount,
) -> Result<[u8; 32], Error> {
    check_index(tx, index)?;

    let base_type = hash_type & SIGHASH_MASK;
    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;
    let zero = [0u8; 32];

    let mut preimage = Vec::with_capacity(156 + script_code.len());

    preimage.extend_from_slice(&tx.version.0.to_le_bytes());

    if anyone_can_pay {
        preimage.extend_from_slice(&zero);
    } else {
        preimage.extend_from_slice(sig_hashes.hash_prevouts.as_byte_array());
    }

    if anyone_can_pay || base_type == SIGHASH_SINGLE || base_type == SIGHASH_NONE {
        preimage.extend_from_slice(&zero);
    } else {
        preimage.extend_from_slice(sig_hashes.hash_sequence.as_byte_array());
    }

    let input = &tx.input[index];
    preimage.extend(serialize(&input.previous_output));
    preimage.extend(serialize(&script_code.to_vec()));
    preimage.extend_from_slice(&amount.to_sat().to_le_bytes());
    preimage.extend_from_slice(&input.sequence.0.to_le_bytes());

    if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        preimage.extend_from_slice(sig_hashes.hash_outputs.as_byte_array());
    } else if base_type == SIGHASH_SINGLE && index < tx.output.len() {
        let output = serialize(&tx.output[index]);
        preimage.extend_from_slice(sha256d::Hash::hash(&output).as_byte_array());
    } else {
        preimage.extend_from_slice(&zero);
    }

    preimage.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
    preimage.extend_from_slice(&hash_type.to_le_bytes());

    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}
