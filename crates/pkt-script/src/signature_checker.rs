use crate::SigVersion;
use crate::constants::{
    LOCKTIME_THRESHOLD, SEQUENCE_FINAL, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use crate::error::Error;
use crate::num::ScriptNum;
use crate::sig_cache::SigCache;
use crate::sighash::{TxSigHashes, calc_signature_hash, witness_signature_hash};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, VerifyOnly, ecdsa};
use bitcoin::{Amount, Transaction};
use std::cell::OnceCell;
use std::sync::LazyLock;

pub static SECP: LazyLock<Secp256k1<VerifyOnly>> = LazyLock::new(Secp256k1::verification_only);

/// Checks transaction signatures and lock times on behalf of the engine.
pub trait SignatureChecker {
    /// Verifies `sig`, a DER signature followed by its hash type byte, against `pubkey`
    /// for the given script code.
    ///
    /// Unparsable signatures and keys are reported as `Ok(false)`, errors are reserved
    /// for failures to compute the signature hash.
    fn check_ecdsa_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
    ) -> Result<bool, Error>;

    fn check_lock_time(&self, lock_time: ScriptNum) -> bool;

    fn check_sequence(&self, sequence: ScriptNum) -> bool;
}

/// Accepts every signature and lock time.
pub struct NoSignatureCheck;

impl SignatureChecker for NoSignatureCheck {
    fn check_ecdsa_signature(
        &self,
        _sig: &[u8],
        _pubkey: &[u8],
        _script_code: &[u8],
        _sig_version: SigVersion,
    ) -> Result<bool, Error> {
        Ok(true)
    }

    fn check_lock_time(&self, _lock_time: ScriptNum) -> bool {
        true
    }

    fn check_sequence(&self, _sequence: ScriptNum) -> bool {
        true
    }
}

/// Checks signatures against an input of a transaction.
pub struct TransactionSignatureChecker<'a> {
    tx: &'a Transaction,
    input_index: usize,
    amount: Amount,
    sig_cache: Option<&'a SigCache>,
    hash_cache: Option<&'a TxSigHashes>,
    computed_hashes: OnceCell<TxSigHashes>,
}

impl<'a> TransactionSignatureChecker<'a> {
    /// `amount` is the value of the spent output, only committed to by witness signatures.
    pub fn new(tx: &'a Transaction, input_index: usize, amount: Amount) -> Self {
        Self {
            tx,
            input_index,
            amount,
            sig_cache: None,
            hash_cache: None,
            computed_hashes: OnceCell::new(),
        }
    }

    pub fn with_sig_cache(mut self, sig_cache: &'a SigCache) -> Self {
        self.sig_cache = Some(sig_cache);
        self
    }

    /// Reuses precomputed witness midstate hashes instead of deriving them on first use.
    pub fn with_hash_cache(mut self, hash_cache: &'a TxSigHashes) -> Self {
        self.hash_cache = Some(hash_cache);
        self
    }

    fn sig_hashes(&self) -> &TxSigHashes {
        match self.hash_cache {
            Some(hashes) => hashes,
            None => self
                .computed_hashes
                .get_or_init(|| TxSigHashes::new(self.tx)),
        }
    }

    fn input_sequence(&self) -> Option<u32> {
        self.tx
            .input
            .get(self.input_index)
            .map(|input| input.sequence.0)
    }
}

impl SignatureChecker for TransactionSignatureChecker<'_> {
    fn check_ecdsa_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
    ) -> Result<bool, Error> {
        let Some((&hash_type, der_sig)) = sig.split_last() else {
            return Ok(false);
        };

        let Ok(public_key) = PublicKey::from_slice(pubkey) else {
            return Ok(false);
        };

        let Ok(mut signature) = ecdsa::Signature::from_der_lax(der_sig) else {
            return Ok(false);
        };

        // libsecp256k1 only verifies lower-S signatures, the low-S requirement itself is
        // enforced by the LOW_S flag before getting here.
        signature.normalize_s();

        let hash_type = u32::from(hash_type);
        let sighash = match sig_version {
            SigVersion::Base => calc_signature_hash(script_code, hash_type, self.tx, self.input_index)?,
            SigVersion::WitnessV0 => witness_signature_hash(
                script_code,
                self.sig_hashes(),
                hash_type,
                self.tx,
                self.input_index,
                self.amount,
            )?,
        };

        let compact_sig = signature.serialize_compact();

        if let Some(sig_cache) = self.sig_cache {
            if sig_cache.exists(&sighash, &compact_sig, pubkey) {
                return Ok(true);
            }
        }

        let msg = Message::from_digest(sighash);
        let valid = SECP.verify_ecdsa(&msg, &signature, &public_key).is_ok();

        if valid {
            if let Some(sig_cache) = self.sig_cache {
                sig_cache.add(sighash, compact_sig.to_vec(), pubkey.to_vec());
            }
        }

        Ok(valid)
    }

    fn check_lock_time(&self, lock_time: ScriptNum) -> bool {
        let lock_time = lock_time.value();
        let tx_lock_time = i64::from(self.tx.lock_time.to_consensus_u32());

        // Both must be block heights or both must be timestamps.
        let same_kind = (tx_lock_time < LOCKTIME_THRESHOLD && lock_time < LOCKTIME_THRESHOLD)
            || (tx_lock_time >= LOCKTIME_THRESHOLD && lock_time >= LOCKTIME_THRESHOLD);
        if !same_kind {
            return false;
        }

        if lock_time > tx_lock_time {
            return false;
        }

        // A final input disables the transaction lock time altogether.
        match self.input_sequence() {
            Some(sequence) => sequence != SEQUENCE_FINAL,
            None => false,
        }
    }

    fn check_sequence(&self, sequence: ScriptNum) -> bool {
        let to_sequence = sequence.value();

        // Relative lock times only exist from version 2 on, compared as unsigned.
        if (self.tx.version.0 as u32) < 2 {
            return false;
        }

        let Some(tx_sequence) = self.input_sequence() else {
            return false;
        };

        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return false;
        }

        let mask = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK);
        let type_flag = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG);
        let tx_masked = i64::from(tx_sequence) & mask;
        let to_masked = to_sequence & mask;

        let same_kind = (tx_masked < type_flag && to_masked < type_flag)
            || (tx_masked >= type_flag && to_masked >= type_flag);
        if !same_kind {
            return false;
        }

        to_masked <= tx_masked
    }
}
