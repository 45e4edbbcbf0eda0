//! End to end spends signed with freshly generated keys.

use crate::opcode::*;
use crate::{
    CheckMultiSigError, CheckSigError, Engine, Error, MANDATORY_VERIFY_FLAGS, SIGHASH_ALL,
    STANDARD_VERIFY_FLAGS, ScriptBuilder, ScriptClass, TxSigHashes, VerifyFlags,
    calc_signature_hash, calc_witness_signature_hash, extract_vote, get_script_class,
};
use bitcoin::hashes::{Hash, hash160};
use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

const AMOUNT: Amount = Amount::from_sat(50_000);

struct Signer {
    secp: Secp256k1<All>,
    keys: Vec<SecretKey>,
}

impl Signer {
    fn new(count: u8) -> Self {
        let keys = (1..=count)
            .map(|seed| SecretKey::from_slice(&[seed; 32]).unwrap())
            .collect();
        Self {
            secp: Secp256k1::new(),
            keys,
        }
    }

    fn pubkey(&self, index: usize) -> Vec<u8> {
        PublicKey::from_secret_key(&self.secp, &self.keys[index])
            .serialize()
            .to_vec()
    }

    fn sign(&self, index: usize, sighash: [u8; 32]) -> Vec<u8> {
        let sig = self
            .secp
            .sign_ecdsa(&Message::from_digest(sighash), &self.keys[index]);
        let mut sig = sig.serialize_der().to_vec();
        sig.push(SIGHASH_ALL as u8);
        sig
    }
}

fn spend_tx() -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: bitcoin::absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([7; 32]),
                vout: 1,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(40_000),
            script_pubkey: ScriptBuf::from_bytes(vec![OP_1]),
        }],
    }
}

fn multisig_script(signer: &Signer, required: i64) -> Vec<u8> {
    let mut builder = ScriptBuilder::new().add_int64(required);
    for index in 0..signer.keys.len() {
        builder = builder.add_data(&signer.pubkey(index));
    }
    builder
        .add_int64(signer.keys.len() as i64)
        .add_op(OP_CHECKMULTISIG)
        .script()
        .unwrap()
}

fn verify(script_pubkey: &[u8], tx: &Transaction, flags: VerifyFlags) -> Result<(), Error> {
    Engine::new(script_pubkey, tx, 0, flags, AMOUNT)?.execute()
}

/// Signs a bare 2-of-3 multisig output with the keys at `signers`, in that order.
fn bare_multisig_spend(signers: [usize; 2], dummy: u8) -> (Vec<u8>, Transaction) {
    let signer = Signer::new(3);
    let script_pubkey = multisig_script(&signer, 2);

    let mut tx = spend_tx();
    let sighash = calc_signature_hash(&script_pubkey, SIGHASH_ALL, &tx, 0).unwrap();

    let mut builder = ScriptBuilder::new().add_op(dummy);
    for index in signers {
        builder = builder.add_data(&signer.sign(index, sighash));
    }
    tx.input[0].script_sig = ScriptBuf::from_bytes(builder.script().unwrap());

    (script_pubkey, tx)
}

#[test]
fn test_bare_multisig() {
    let (script_pubkey, tx) = bare_multisig_spend([0, 2], OP_0);
    assert_eq!(get_script_class(&script_pubkey), ScriptClass::MultiSig);
    assert_eq!(verify(&script_pubkey, &tx, MANDATORY_VERIFY_FLAGS), Ok(()));
    assert_eq!(verify(&script_pubkey, &tx, STANDARD_VERIFY_FLAGS), Ok(()));
}

#[test]
fn test_multisig_signature_order() {
    let (script_pubkey, tx) = bare_multisig_spend([2, 0], OP_0);
    assert_eq!(
        verify(&script_pubkey, &tx, MANDATORY_VERIFY_FLAGS),
        Err(Error::EvalFalse)
    );
    assert_eq!(
        verify(&script_pubkey, &tx, STANDARD_VERIFY_FLAGS),
        Err(Error::CheckSig(CheckSigError::NullFail))
    );
}

#[test]
fn test_multisig_null_dummy() {
    let (script_pubkey, tx) = bare_multisig_spend([0, 1], OP_1);
    assert_eq!(verify(&script_pubkey, &tx, MANDATORY_VERIFY_FLAGS), Ok(()));
    assert_eq!(
        verify(&script_pubkey, &tx, STANDARD_VERIFY_FLAGS),
        Err(Error::CheckMultiSig(CheckMultiSigError::SignatureNullDummy(1)))
    );
}

#[test]
fn test_p2sh_multisig_with_vote() {
    let signer = Signer::new(3);
    let redeem_script = multisig_script(&signer, 2);
    let script_hash = hash160::Hash::hash(&redeem_script).to_byte_array();

    let script_pubkey = ScriptBuilder::new()
        .add_op(OP_HASH160)
        .add_data(&script_hash)
        .add_op(OP_EQUAL)
        .add_vote(b"vote for", &[])
        .script()
        .unwrap();

    assert_eq!(get_script_class(&script_pubkey), ScriptClass::ScriptHash);
    let vote = extract_vote(&script_pubkey).unwrap();
    assert_eq!(vote.vote_for, b"vote for");
    assert!(vote.vote_against.is_empty());

    let mut tx = spend_tx();
    let sighash = calc_signature_hash(&redeem_script, SIGHASH_ALL, &tx, 0).unwrap();
    let script_sig = ScriptBuilder::new()
        .add_op(OP_0)
        .add_data(&signer.sign(0, sighash))
        .add_data(&signer.sign(1, sighash))
        .add_data(&redeem_script)
        .script()
        .unwrap();
    tx.input[0].script_sig = ScriptBuf::from_bytes(script_sig);

    assert_eq!(verify(&script_pubkey, &tx, STANDARD_VERIFY_FLAGS), Ok(()));

    // A redeem script that does not hash to the committed hash.
    let other_redeem_script = multisig_script(&Signer::new(2), 1);
    let script_sig = ScriptBuilder::new()
        .add_op(OP_0)
        .add_data(&signer.sign(0, sighash))
        .add_data(&other_redeem_script)
        .script()
        .unwrap();
    tx.input[0].script_sig = ScriptBuf::from_bytes(script_sig);

    assert_eq!(
        verify(&script_pubkey, &tx, MANDATORY_VERIFY_FLAGS),
        Err(Error::EvalFalse)
    );
}

#[test]
fn test_p2wpkh_with_hash_cache() {
    let signer = Signer::new(1);
    let pubkey = signer.pubkey(0);
    let script_pubkey = ScriptBuilder::new()
        .add_op(OP_0)
        .add_data(&hash160::Hash::hash(&pubkey).to_byte_array())
        .script()
        .unwrap();

    let mut tx = spend_tx();
    let hash_cache = TxSigHashes::new(&tx);
    let sighash =
        calc_witness_signature_hash(&script_pubkey, &hash_cache, SIGHASH_ALL, &tx, 0, AMOUNT)
            .unwrap();
    tx.input[0].witness = Witness::from_slice(&[signer.sign(0, sighash), pubkey]);

    // The witness is not part of the midstate hashes.
    assert_eq!(TxSigHashes::new(&tx), hash_cache);

    assert_eq!(verify(&script_pubkey, &tx, STANDARD_VERIFY_FLAGS), Ok(()));
    assert_eq!(
        Engine::new(&script_pubkey, &tx, 0, STANDARD_VERIFY_FLAGS, AMOUNT)
            .unwrap()
            .with_hash_cache(&hash_cache)
            .execute(),
        Ok(())
    );

    // Witness signatures commit to the spent amount.
    let flags = VerifyFlags::P2SH | VerifyFlags::WITNESS;
    assert_eq!(
        Engine::new(&script_pubkey, &tx, 0, flags, Amount::from_sat(50_001))
            .unwrap()
            .execute(),
        Err(Error::EvalFalse)
    );
}
