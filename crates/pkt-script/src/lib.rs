//! Transaction script virtual machine of the PKT chain.
//!
//! The crate parses, executes and classifies transaction scripts. [`Engine`] decides
//! whether a transaction input may spend the output it references, the rest of the
//! crate provides the pieces it is built from: the opcode table, the script parser,
//! signature hashing, the signature cache and the standard script classifier.

mod address;
mod builder;
mod constants;
mod error;
mod flags;
mod interpreter;
mod num;
mod opcode;
mod script;
mod sig_cache;
mod sighash;
mod signature_checker;
mod solver;
mod stack;


pub use self::address::{Address, AddressParams, pay_to_addr_script};
pub use self::builder::ScriptBuilder;
pub use self::constants::*;
pub use self::error::Error;
pub use self::flags::{MANDATORY_VERIFY_FLAGS, STANDARD_VERIFY_FLAGS, VerifyFlags};
pub use self::interpreter::{
    CheckMultiSigError, CheckSigError, Engine, SignatureEncodingError, eval_script,
};
pub use self::num::{NumError, ScriptNum};
pub use self::opcode::*;
pub use self::script::{
    Instructions, ParsedOpcode, disasm_string, extract_witness_program_info,
    get_precise_sig_op_count, get_sig_op_count, get_witness_sig_op_count, is_pay_to_pubkey_hash,
    is_pay_to_script_hash, is_push_only, is_push_only_script, is_unspendable,
    is_witness_program, is_witness_pubkey_hash, is_witness_script_hash, parse_script,
    parse_script_partial, push_data, remove_opcode, remove_opcode_by_data, unparse_script,
};
pub use self::sig_cache::SigCache;
pub use self::sighash::{
    SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_MASK, SIGHASH_NONE, SIGHASH_SINGLE, TxSigHashes,
    calc_signature_hash, calc_witness_signature_hash,
};
pub use self::signature_checker::{NoSignatureCheck, SignatureChecker, TransactionSignatureChecker};
pub use self::solver::{
    ScriptClass, Vote, calc_multisig_stats, extract_pk_script_addrs, extract_vote,
    get_script_class, strip_vote, strip_vote_script,
};
pub use self::stack::{Stack, StackError};

/// Signature scheme a script is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigVersion {
    /// Bare scripts and BIP16 P2SH-wrapped redeem scripts.
    Base,
    /// Witness v0 (P2WPKH and P2WSH); see BIP 141.
    WitnessV0,
}
