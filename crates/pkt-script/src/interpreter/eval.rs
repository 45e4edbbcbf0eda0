mod multisig;
mod sig;

use crate::constants::{
    MAX_OPS_PER_SCRIPT, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, MAX_STACK_SIZE,
    SEQUENCE_LOCKTIME_DISABLE_FLAG,
};
use crate::error::Error;
use crate::num::ScriptNum;
use crate::opcode::*;
use crate::script::Instructions;
use crate::signature_checker::SignatureChecker;
use crate::stack::{Stack, cast_to_bool};
use crate::{SigVersion, VerifyFlags};
use bitcoin::hashes::{Hash, hash160, ripemd160, sha1, sha256, sha256d};

pub use self::multisig::CheckMultiSigError;
pub use self::sig::{CheckSigError, SignatureEncodingError};

/// State of one IF/NOTIF branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cond {
    True,
    False,
    /// Nested inside a branch that is not executing, neither side ever runs.
    Skip,
}

/// Nesting of the conditional branches currently open.
///
/// A `True` on top implies every enclosing branch is `True` as well, so only the top
/// needs to be inspected.
#[derive(Debug, Default)]
struct ConditionStack {
    conds: Vec<Cond>,
}

impl ConditionStack {
    fn executing(&self) -> bool {
        self.conds.last().is_none_or(|cond| *cond == Cond::True)
    }

    /// Opens a branch, `None` when the enclosing branch is not executing.
    fn push(&mut self, value: Option<bool>) {
        self.conds.push(match value {
            Some(true) => Cond::True,
            Some(false) => Cond::False,
            None => Cond::Skip,
        });
    }

    fn toggle(&mut self) -> Result<(), Error> {
        let cond = self.conds.last_mut().ok_or(Error::UnbalancedConditional)?;
        *cond = match *cond {
            Cond::True => Cond::False,
            Cond::False => Cond::True,
            Cond::Skip => Cond::Skip,
        };
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Error> {
        self.conds
            .pop()
            .map(|_| ())
            .ok_or(Error::UnbalancedConditional)
    }

    fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }
}

/// Executes `script` on top of `stack`.
///
/// Returns whether the stack ends with a true top element. Failures of any rule
/// enabled by `flags` abort the execution with an error.
pub fn eval_script<SC: SignatureChecker + ?Sized>(
    stack: &mut Stack,
    script: &[u8],
    flags: &VerifyFlags,
    checker: &SC,
    sig_version: SigVersion,
) -> Result<bool, Error> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(Error::ScriptSize(script.len()));
    }

    let mut alt_stack = Stack::with_flags(flags);
    let mut conditions = ConditionStack::default();

    // Byte offset of the script code signed by checksig operations, moved past every
    // executed OP_CODESEPARATOR.
    let mut begincode = 0;
    let mut op_count = 0;

    let mut instructions = Instructions::new(script);

    while let Some(instruction) = instructions.next() {
        let op = instruction?;
        let info = op.info();
        let executing = conditions.executing();

        // Disabled and always illegal opcodes fail even in a branch that is not executing.
        if info.is_disabled() {
            return Err(Error::DisabledOpcode(info.name));
        }
        if info.always_illegal() {
            return Err(Error::ReservedOpcode(info.name));
        }

        // OP_RESERVED does not count towards the opcode limit.
        if info.value > OP_16 {
            op_count += 1;
            if op_count > MAX_OPS_PER_SCRIPT {
                return Err(Error::OpCount);
            }
        }

        if op.data().len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(Error::PushSize(op.data().len()));
        }

        if !executing && !info.is_conditional() {
            continue;
        }

        tracing::trace!(
            opcode = info.name,
            stack_depth = stack.len(),
            "Executing opcode"
        );

        if info.is_push() {
            if flags.verify_minimaldata() {
                op.check_minimal_data_push()?;
            }
            stack.push(op.data().to_vec());
        } else {
            match info.value {
                // Constants
                OP_1NEGATE | OP_1..=OP_16 => {
                    stack.push_num(i64::from(info.value) - i64::from(OP_1 - 1));
                }

                // Flow control
                OP_NOP => {}
                OP_IF | OP_NOTIF => {
                    let value = if executing {
                        let top = stack.pop()?;

                        // Under witness v0 rules minimal IF/NOTIF operands are only a
                        // policy, enabled through MINIMALIF.
                        if sig_version == SigVersion::WitnessV0
                            && flags.contains(VerifyFlags::MINIMALIF)
                            && (top.len() > 1 || (top.len() == 1 && top[0] != 1))
                        {
                            return Err(Error::MinimalIf);
                        }

                        let value = cast_to_bool(&top);
                        Some(if info.value == OP_NOTIF { !value } else { value })
                    } else {
                        None
                    };

                    conditions.push(value);
                }
                OP_ELSE => conditions.toggle()?,
                OP_ENDIF => conditions.pop()?,
                OP_VERIFY => {
                    if !stack.pop_bool()? {
                        return Err(Error::Verify(info.name));
                    }
                }
                OP_RETURN => return Err(Error::EarlyReturn),

                // Locktime
                OP_CHECKLOCKTIMEVERIFY => {
                    if !flags.contains(VerifyFlags::CHECKLOCKTIMEVERIFY) {
                        // Behaves as OP_NOP2.
                        if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                            return Err(Error::DiscourageUpgradableNops(info.name));
                        }
                    } else {
                        // Lock times are 5-byte numbers, the 4-byte limit of other
                        // operands would run out in 2038 while the transaction field is
                        // a u32.
                        let lock_time = stack.peek_num_with_max_size(5)?;

                        // Use `0 MAX CHECKLOCKTIMEVERIFY` for a value that may be negative.
                        if lock_time.is_negative() {
                            return Err(Error::NegativeLocktime);
                        }

                        if !checker.check_lock_time(lock_time) {
                            return Err(Error::UnsatisfiedLocktime);
                        }
                    }
                }
                OP_CHECKSEQUENCEVERIFY => {
                    if !flags.contains(VerifyFlags::CHECKSEQUENCEVERIFY) {
                        // Behaves as OP_NOP3.
                        if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                            return Err(Error::DiscourageUpgradableNops(info.name));
                        }
                    } else {
                        let sequence = stack.peek_num_with_max_size(5)?;

                        if sequence.is_negative() {
                            return Err(Error::NegativeLocktime);
                        }

                        // The disable flag turns the operand into a NOP for future soft forks.
                        if sequence.value() & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) == 0
                            && !checker.check_sequence(sequence)
                        {
                            return Err(Error::UnsatisfiedLocktime);
                        }
                    }
                }
                OP_NOP1 | OP_NOP4..=OP_NOP10 => {
                    if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                        return Err(Error::DiscourageUpgradableNops(info.name));
                    }
                }

                // Stack
                OP_TOALTSTACK => {
                    alt_stack.push(stack.pop()?);
                }
                OP_FROMALTSTACK => {
                    let v = alt_stack
                        .pop()
                        .map_err(|_| Error::InvalidAltStackOperation)?;
                    stack.push(v);
                }
                OP_2DROP => stack.drop(2)?,
                OP_2DUP => stack.dup(2)?,
                OP_3DUP => stack.dup(3)?,
                OP_2OVER => stack.over(2)?,
                OP_2ROT => stack.rot(2)?,
                OP_2SWAP => stack.swap(2)?,
                OP_IFDUP => {
                    if stack.peek_bool()? {
                        stack.dup(1)?;
                    }
                }
                OP_DEPTH => {
                    stack.push_num(stack.len() as i64);
                }
                OP_DROP => stack.drop(1)?,
                OP_DUP => stack.dup(1)?,
                OP_NIP => stack.nip()?,
                OP_OVER => stack.over(1)?,
                OP_PICK => {
                    let n = stack.pop_num()?;
                    stack.pick(i64::from(n.to_i32()))?;
                }
                OP_ROLL => {
                    let n = stack.pop_num()?;
                    stack.roll(i64::from(n.to_i32()))?;
                }
                OP_ROT => stack.rot(1)?,
                OP_SWAP => stack.swap(1)?,
                OP_TUCK => stack.tuck()?,

                // Splice
                OP_SIZE => {
                    stack.push_num(stack.last()?.len() as i64);
                }

                // Bitwise logic
                OP_EQUAL => {
                    let equal = stack.pop()? == stack.pop()?;
                    stack.push_bool(equal);
                }
                OP_EQUALVERIFY => {
                    let equal = stack.pop()? == stack.pop()?;
                    if !equal {
                        return Err(Error::Verify(info.name));
                    }
                }

                // Arithmetic
                OP_1ADD => {
                    let n = stack.pop_num()? + ScriptNum::from(1);
                    stack.push_num(n);
                }
                OP_1SUB => {
                    let n = stack.pop_num()? - ScriptNum::from(1);
                    stack.push_num(n);
                }
                OP_NEGATE => {
                    let n = -stack.pop_num()?;
                    stack.push_num(n);
                }
                OP_ABS => {
                    let n = stack.pop_num()?.abs();
                    stack.push_num(n);
                }
                OP_NOT => {
                    let n = stack.pop_num()?.is_zero();
                    stack.push_num(n);
                }
                OP_0NOTEQUAL => {
                    let n = !stack.pop_num()?.is_zero();
                    stack.push_num(n);
                }
                OP_ADD => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v1 + v2);
                }
                OP_SUB => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v2 - v1);
                }
                OP_BOOLAND => {
                    let v1 = !stack.pop_num()?.is_zero();
                    let v2 = !stack.pop_num()?.is_zero();
                    stack.push_num(v1 && v2);
                }
                OP_BOOLOR => {
                    let v1 = !stack.pop_num()?.is_zero();
                    let v2 = !stack.pop_num()?.is_zero();
                    stack.push_num(v1 || v2);
                }
                OP_NUMEQUAL => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v1 == v2);
                }
                OP_NUMEQUALVERIFY => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    if v1 != v2 {
                        return Err(Error::Verify(info.name));
                    }
                }
                OP_NUMNOTEQUAL => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v1 != v2);
                }
                OP_LESSTHAN => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v2 < v1);
                }
                OP_GREATERTHAN => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v2 > v1);
                }
                OP_LESSTHANOREQUAL => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v2 <= v1);
                }
                OP_GREATERTHANOREQUAL => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v2 >= v1);
                }
                OP_MIN => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v1.min(v2));
                }
                OP_MAX => {
                    let v1 = stack.pop_num()?;
                    let v2 = stack.pop_num()?;
                    stack.push_num(v1.max(v2));
                }
                OP_WITHIN => {
                    // [x min max]
                    let max = stack.pop_num()?;
                    let min = stack.pop_num()?;
                    let x = stack.pop_num()?;
                    stack.push_bool(min <= x && x < max);
                }

                // Crypto
                OP_RIPEMD160 => {
                    let v = ripemd160::Hash::hash(&stack.pop()?);
                    stack.push(v.to_byte_array().to_vec());
                }
                OP_SHA1 => {
                    let v = sha1::Hash::hash(&stack.pop()?);
                    stack.push(v.to_byte_array().to_vec());
                }
                OP_SHA256 => {
                    let v = sha256::Hash::hash(&stack.pop()?);
                    stack.push(v.to_byte_array().to_vec());
                }
                OP_HASH160 => {
                    let v = hash160::Hash::hash(&stack.pop()?);
                    stack.push(v.to_byte_array().to_vec());
                }
                OP_HASH256 => {
                    let v = sha256d::Hash::hash(&stack.pop()?);
                    stack.push(v.to_byte_array().to_vec());
                }
                OP_CODESEPARATOR => {
                    if sig_version == SigVersion::Base
                        && flags.contains(VerifyFlags::CONST_SCRIPTCODE)
                    {
                        return Err(Error::OpCodeSeparator);
                    }

                    begincode = instructions.offset();
                }
                OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                    // [sig pubkey] -> bool
                    let pubkey = stack.pop()?;
                    let sig = stack.pop()?;

                    let success = sig::eval_checksig(
                        &sig,
                        &pubkey,
                        script,
                        begincode,
                        flags,
                        checker,
                        sig_version,
                    )?;

                    if info.value == OP_CHECKSIG {
                        stack.push_bool(success);
                    } else if !success {
                        return Err(Error::Verify(info.name));
                    }
                }
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                    let success = multisig::eval_checkmultisig(
                        stack,
                        flags,
                        script,
                        begincode,
                        sig_version,
                        checker,
                        &mut op_count,
                    )?;

                    if info.value == OP_CHECKMULTISIG {
                        stack.push_bool(success);
                    } else if !success {
                        return Err(Error::Verify(info.name));
                    }
                }

                // Votes are tallied by block validation, the operands carry no meaning here.
                OP_VOTE => stack.drop(2)?,

                OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => {
                    return Err(Error::ReservedOpcode(info.name));
                }
                _ => return Err(Error::InvalidOpcode(info.name)),
            }
        }

        if stack.len() + alt_stack.len() > MAX_STACK_SIZE {
            return Err(Error::StackSize);
        }
    }

    if !conditions.is_empty() {
        return Err(Error::UnbalancedConditional);
    }

    let success = !stack.is_empty() && stack.peek_bool()?;

    Ok(success)
}
