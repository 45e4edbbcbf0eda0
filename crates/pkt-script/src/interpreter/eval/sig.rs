use crate::constants::{COMPRESSED_PUBKEY_SIZE, HALF_ORDER, UNCOMPRESSED_PUBKEY_SIZE};
use crate::error::Error;
use crate::script::{parse_script, remove_opcode_by_data, unparse_script};
use crate::sighash::{SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_SINGLE};
use crate::signature_checker::SignatureChecker;
use crate::{SigVersion, VerifyFlags};
use num_bigint::Sign;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureEncodingError {
    #[error("DER encoded signature is too short")]
    TooShort,
    #[error("DER encoded signature is too long")]
    TooLong,
    #[error("signature does not have the expected ASN.1 sequence ID")]
    InvalidSequenceId,
    #[error("signature length")]
    InvalidDataLength,
    #[error("R integer marker")]
    InvalidIntegerIdR,
    #[error("R length is zero")]
    ZeroLengthR,
    #[error("R is negative")]
    NegativeR,
    #[error("R value has too much padding")]
    TooMuchPaddingR,
    #[error("S integer marker")]
    InvalidIntegerIdS,
    #[error("S length is zero")]
    ZeroLengthS,
    #[error("S is negative")]
    NegativeS,
    #[error("S value has too much padding")]
    TooMuchPaddingS,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckSigError {
    #[error("signature found in script code while CONST_SCRIPTCODE is set")]
    FindAndDelete,
    #[error("Unsupported signature hash type")]
    UnsupportedSigHashType,
    #[error("Unsupported public key type")]
    BadPubKey,
    #[error(
        "WITNESS_PUBKEYTYPE is set and the public key used in checksig/checkmultisig isn't serialized in a compressed format."
    )]
    WitnessPubKeyType,
    #[error("signature not empty on failed checksig")]
    NullFail,
    #[error("signature S value is higher than half the curve order")]
    HighS,
    #[error("invalid signature encoding: {0}")]
    Der(#[from] SignatureEncodingError),
}

/// Evaluates a single OP_CHECKSIG(VERIFY) on the popped `sig` and `pubkey`.
pub(super) fn eval_checksig<SC: SignatureChecker + ?Sized>(
    sig: &[u8],
    pubkey: &[u8],
    script: &[u8],
    begincode: usize,
    flags: &VerifyFlags,
    checker: &SC,
    sig_version: SigVersion,
) -> Result<bool, Error> {
    let script_code = script_code(script, begincode, [sig], flags, sig_version)?;

    check_signature_encoding(sig, flags)?;
    check_pubkey_encoding(pubkey, flags, sig_version)?;

    let success =
        !sig.is_empty() && checker.check_ecdsa_signature(sig, pubkey, &script_code, sig_version)?;

    if !success && flags.contains(VerifyFlags::NULLFAIL) && !sig.is_empty() {
        return Err(CheckSigError::NullFail.into());
    }

    Ok(success)
}

/// Returns the script signed by checksig operations: the script from the last executed
/// OP_CODESEPARATOR on.
///
/// Pre-segwit signatures can not sign themselves, so under [`SigVersion::Base`] every
/// canonical push containing one of `sigs` is removed first.
pub(super) fn script_code<'a>(
    script: &[u8],
    begincode: usize,
    sigs: impl IntoIterator<Item = &'a [u8]>,
    flags: &VerifyFlags,
    sig_version: SigVersion,
) -> Result<Vec<u8>, Error> {
    let subscript = script.get(begincode..).unwrap_or_default();

    if sig_version != SigVersion::Base {
        return Ok(subscript.to_vec());
    }

    let mut opcodes = parse_script(subscript)?;
    let mut removed = false;

    for sig in sigs {
        let remaining = remove_opcode_by_data(&opcodes, sig);
        removed |= remaining.len() != opcodes.len();
        opcodes = remaining;
    }

    if !removed {
        return Ok(subscript.to_vec());
    }

    if flags.contains(VerifyFlags::CONST_SCRIPTCODE) {
        return Err(CheckSigError::FindAndDelete.into());
    }

    unparse_script(&opcodes)
}

pub(super) fn check_signature_encoding(
    sig: &[u8],
    flags: &VerifyFlags,
) -> Result<(), CheckSigError> {
    // Empty signature. Not strictly DER encoded, but allowed to provide a
    // compact way to provide an invalid signature for use with CHECK(MULTI)SIG
    if sig.is_empty() {
        return Ok(());
    }

    if flags.intersects(VerifyFlags::DERSIG | VerifyFlags::LOW_S | VerifyFlags::STRICTENC) {
        is_valid_signature_encoding(sig)?;
    }

    if flags.contains(VerifyFlags::LOW_S) {
        is_low_der_signature(sig)?;
    }

    if flags.contains(VerifyFlags::STRICTENC) && !is_defined_hashtype_signature(sig) {
        return Err(CheckSigError::UnsupportedSigHashType);
    }

    Ok(())
}

struct EncodedS {
    /// S offset
    offset: usize,
    /// S length.
    length: usize,
}

// 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash-type]
//
// https://github.com/bitcoin/bips/blob/master/bip-0062.mediawiki#der-encoding
fn is_valid_signature_encoding(sig: &[u8]) -> Result<EncodedS, SignatureEncodingError> {
    // Minimum and maximum size constraints
    if sig.len() < 9 {
        return Err(SignatureEncodingError::TooShort);
    }

    if sig.len() > 73 {
        return Err(SignatureEncodingError::TooLong);
    }

    // A signature is of type 0x30 (compound)
    if sig[0] != 0x30 {
        return Err(SignatureEncodingError::InvalidSequenceId);
    }

    // Make sure the length covers the entire signature
    if sig[1] as usize != sig.len() - 3 {
        return Err(SignatureEncodingError::InvalidDataLength);
    }

    let len_r = sig[3] as usize;

    // Make sure the length of the S element is still inside the signature
    if 5 + len_r >= sig.len() {
        return Err(SignatureEncodingError::InvalidDataLength);
    }

    let len_s = sig[5 + len_r] as usize;

    if len_r + len_s + 7 != sig.len() {
        return Err(SignatureEncodingError::InvalidDataLength);
    }

    if sig[2] != 0x02 {
        return Err(SignatureEncodingError::InvalidIntegerIdR);
    }

    if len_r == 0 {
        return Err(SignatureEncodingError::ZeroLengthR);
    }

    if sig[4] & 0x80 != 0 {
        return Err(SignatureEncodingError::NegativeR);
    }

    // Null bytes at the start of R are not allowed, unless R would otherwise be interpreted as a negative number
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return Err(SignatureEncodingError::TooMuchPaddingR);
    }

    if sig[len_r + 4] != 0x02 {
        return Err(SignatureEncodingError::InvalidIntegerIdS);
    }

    if len_s == 0 {
        return Err(SignatureEncodingError::ZeroLengthS);
    }

    if sig[len_r + 6] & 0x80 != 0 {
        return Err(SignatureEncodingError::NegativeS);
    }

    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return Err(SignatureEncodingError::TooMuchPaddingS);
    }

    Ok(EncodedS {
        offset: len_r + 6,
        length: len_s,
    })
}

fn is_low_der_signature(sig: &[u8]) -> Result<(), CheckSigError> {
    let encoded_s = is_valid_signature_encoding(sig)?;

    let s_bytes = &sig[encoded_s.offset..encoded_s.offset + encoded_s.length];

    // S and N - S both verify, only the lower one is accepted.
    let s_value = num_bigint::BigInt::from_bytes_be(Sign::Plus, s_bytes);

    if s_value > *HALF_ORDER {
        return Err(CheckSigError::HighS);
    }

    Ok(())
}

fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    let Some(hash_type) = sig.last().copied() else {
        return false;
    };

    let base_type = u32::from(hash_type) & !SIGHASH_ANYONECANPAY;

    (SIGHASH_ALL..=SIGHASH_SINGLE).contains(&base_type)
}

// Checks whether or not the passed public key adheres to
// the strict encoding requirements if enabled.
pub(super) fn check_pubkey_encoding(
    pubkey: &[u8],
    flags: &VerifyFlags,
    sig_version: SigVersion,
) -> Result<(), CheckSigError> {
    if flags.contains(VerifyFlags::STRICTENC) && !is_public_key(pubkey) {
        return Err(CheckSigError::BadPubKey);
    }

    if flags.contains(VerifyFlags::WITNESS_PUBKEYTYPE)
        && sig_version == SigVersion::WitnessV0
        && !is_compressed_pubkey(pubkey)
    {
        return Err(CheckSigError::WitnessPubKeyType);
    }

    Ok(())
}

fn is_public_key(v: &[u8]) -> bool {
    match v.len() {
        COMPRESSED_PUBKEY_SIZE => v[0] == 2 || v[0] == 3,
        UNCOMPRESSED_PUBKEY_SIZE => v[0] == 4,
        _ => false,
    }
}

fn is_compressed_pubkey(pubkey: &[u8]) -> bool {
    pubkey.len() == COMPRESSED_PUBKEY_SIZE && matches!(pubkey[0], 0x02 | 0x03)
}
