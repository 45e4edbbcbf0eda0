use crate::constants::{
    MAX_OPS_PER_SCRIPT, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, MAX_STACK_SIZE,
};
use crate::interpreter::{CheckMultiSigError, CheckSigError};
use crate::num::NumError;
use crate::stack::StackError;

/// Script error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    ///////////////////////////
    // Parse errors.
    ///////////////////////////
    /// A push opcode declares more data than the script has left.
    #[error(
        "opcode {opcode} at offset {offset} requires {needed} bytes, but script only has {available} remaining"
    )]
    MalformedPush {
        opcode: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    ///////////////////////////
    // Script error.
    ///////////////////////////
    /// The script evaluated without error but terminated with a false top stack element.
    #[error("script terminated with a false stack element")]
    EvalFalse,
    #[error("script returned early")]
    EarlyReturn,

    // Max sizes.
    #[error("script size {0} is larger than max allowed size {MAX_SCRIPT_SIZE}")]
    ScriptSize(usize),
    #[error(
        "size of the element ({0}) pushed to the stack exceeds MAX_SCRIPT_ELEMENT_SIZE ({MAX_SCRIPT_ELEMENT_SIZE})"
    )]
    PushSize(usize),
    #[error("Exceeds max operations ({MAX_OPS_PER_SCRIPT}) per script")]
    OpCount,
    // Stack and altstack combined depth is over the limit.
    #[error("Exceeds stack limit ({MAX_STACK_SIZE})")]
    StackSize,

    // Failed verify operations.
    #[error("{0} failed")]
    Verify(&'static str),

    // Logical/Format/Canonical errors.
    #[error("attempt to execute disabled opcode {0}")]
    DisabledOpcode(&'static str),
    #[error("attempt to execute reserved opcode {0}")]
    ReservedOpcode(&'static str),
    #[error("attempt to execute invalid opcode {0}")]
    InvalidOpcode(&'static str),
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error(transparent)]
    Num(#[from] NumError),
    // An OP_ELSE or OP_ENDIF is encountered without first having an OP_IF or
    // OP_NOTIF, or the end of script is reached without an OP_ENDIF.
    #[error("unbalanced conditional")]
    UnbalancedConditional,
    #[error("Invalid alt stack operation")]
    InvalidAltStackOperation,
    #[error("non-minimal data push: {0}")]
    MinimalData(String),

    // CHECKLOCKTIMEVERIFY and CHECKSEQUENCEVERIFY
    #[error("Locktime is negative")]
    NegativeLocktime,
    #[error("Required lock time has not been reached.")]
    UnsatisfiedLocktime,

    // Malleability
    #[error("signature script is not push only")]
    SigPushOnly,
    // Stack must contain exactly one element after evaluation.
    #[error("stack is not clean after evaluation")]
    CleanStack,
    // The operand of an OP_IF/OP_NOTIF is not either an empty vector or [0x01].
    #[error("OP_IF/OP_NOTIF operand is not minimally encoded")]
    MinimalIf,
    #[error("Native witness program cannot also have a signature script")]
    WitnessMalleated,
    #[error("signature script for p2sh witness program is not a single canonical push")]
    WitnessMalleatedP2SH,
    #[error("witness provided for a non-witness script")]
    WitnessUnexpected,
    #[error("witness program witness empty")]
    WitnessProgramWitnessEmpty,
    #[error("witness program mismatch")]
    WitnessProgramMismatch,
    #[error("witness program has unexpected length {0}")]
    WitnessProgramWrongLength(usize),

    // Softfork safeness.
    #[error("{0} encountered when DISCOURAGE_UPGRADABLE_NOPS flag is set")]
    DiscourageUpgradableNops(&'static str),
    #[error("witness program version {0} is reserved for soft-fork upgrades")]
    DiscourageUpgradableWitnessProgram(u8),

    // Constant scriptCode
    #[error("OP_CODESEPARATOR is used in a non-segwit script.")]
    OpCodeSeparator,

    #[error(transparent)]
    CheckSig(#[from] CheckSigError),
    #[error(transparent)]
    CheckMultiSig(#[from] CheckMultiSigError),

    ///////////////////////////
    // Usage errors.
    ///////////////////////////
    #[error("invalid verification flags: {0}")]
    InvalidFlags(&'static str),
    #[error("input index {index} is out of range for a transaction with {inputs} inputs")]
    InvalidIndex { index: usize, inputs: usize },
    #[error("unsupported address: {0}")]
    UnsupportedAddress(&'static str),
    #[error("script is not a multisig script")]
    NotMultisigScript,
    #[error(
        "data of {0} bytes exceeds the maximum element size {MAX_SCRIPT_ELEMENT_SIZE}"
    )]
    ElementTooBig(usize),

    ///////////////////////////
    // Internal errors.
    ///////////////////////////
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}
