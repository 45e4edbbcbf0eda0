use super::sig::{CheckSigError, check_pubkey_encoding, check_signature_encoding, script_code};
use crate::constants::{MAX_OPS_PER_SCRIPT, MAX_PUBKEYS_PER_MULTISIG};
use crate::error::Error;
use crate::signature_checker::SignatureChecker;
use crate::stack::Stack;
use crate::{SigVersion, VerifyFlags};

/// Multisig error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CheckMultiSigError {
    #[error("Invalid number of pubkeys, expected in the range of [0, {MAX_PUBKEYS_PER_MULTISIG}]")]
    InvalidPubkeyCount,
    #[error("Invalid number of signatures, expected in the range of [0, {0}]")]
    InvalidSignatureCount(usize),
    #[error("Multisig dummy argument has length {0} instead of 0")]
    SignatureNullDummy(usize),
}

/// Evaluates OP_CHECKMULTISIG(VERIFY), consuming its operands from the stack.
///
/// ([dummy] [sig ...] num_of_signatures [pubkey ...] num_of_pubkeys -- )
///
/// Signatures must appear in the same order as their public keys. Every key is tried
/// at most once, so the evaluation stops as soon as the keys left can no longer cover
/// the signatures left.
pub(super) fn eval_checkmultisig<SC: SignatureChecker + ?Sized>(
    stack: &mut Stack,
    flags: &VerifyFlags,
    script: &[u8],
    begincode: usize,
    sig_version: SigVersion,
    checker: &SC,
    op_count: &mut usize,
) -> Result<bool, Error> {
    let keys_count = stack.pop_num()?.value();
    if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&keys_count) {
        return Err(CheckMultiSigError::InvalidPubkeyCount.into());
    }

    let keys_count = keys_count as usize;

    *op_count += keys_count;

    if *op_count > MAX_OPS_PER_SCRIPT {
        return Err(Error::OpCount);
    }

    // Topmost first.
    let mut keys = Vec::with_capacity(keys_count);
    for _ in 0..keys_count {
        keys.push(stack.pop()?);
    }

    let sigs_count = stack.pop_num()?.value();
    if sigs_count < 0 || sigs_count as usize > keys_count {
        return Err(CheckMultiSigError::InvalidSignatureCount(keys_count).into());
    }

    let sigs_count = sigs_count as usize;
    let mut sigs = Vec::with_capacity(sigs_count);
    for _ in 0..sigs_count {
        sigs.push(stack.pop()?);
    }

    // A bug in the first client release pops one more item than the operation uses, it is
    // part of consensus now.
    let dummy = stack.pop()?;

    // The dummy is otherwise unchecked and thus a source of malleability.
    if flags.contains(VerifyFlags::NULLDUMMY) && !dummy.is_empty() {
        return Err(CheckMultiSigError::SignatureNullDummy(dummy.len()).into());
    }

    let script_code = script_code(
        script,
        begincode,
        sigs.iter().map(Vec::as_slice),
        flags,
        sig_version,
    )?;

    let mut success = true;
    let mut checked_keys_count = 0;
    let mut satisfied_sigs_count = 0;

    while satisfied_sigs_count < sigs.len() && success {
        let key = &keys[checked_keys_count];
        let sig = &sigs[satisfied_sigs_count];

        check_signature_encoding(sig, flags)?;
        check_pubkey_encoding(key, flags, sig_version)?;

        if !sig.is_empty() && checker.check_ecdsa_signature(sig, key, &script_code, sig_version)? {
            satisfied_sigs_count += 1;
        }

        checked_keys_count += 1;

        // Fails once the remaining keys can't satisfy the remaining signatures.
        success = keys.len() - checked_keys_count >= sigs.len() - satisfied_sigs_count;
    }

    if !success && flags.contains(VerifyFlags::NULLFAIL) && sigs.iter().any(|sig| !sig.is_empty())
    {
        return Err(CheckSigError::NullFail.into());
    }

    tracing::trace!(
        keys = keys.len(),
        sigs = sigs.len(),
        checked_keys_count,
        success,
        "Evaluated multisig"
    );

    Ok(success)
}
