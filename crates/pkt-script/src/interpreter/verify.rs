use super::eval_script;
use crate::builder::ScriptBuilder;
use crate::constants::{
    MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, WITNESS_V0_KEYHASH_SIZE, WITNESS_V0_SCRIPTHASH_SIZE,
};
use crate::error::Error;
use crate::opcode::{OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160};
use crate::script::{extract_witness_program_info, is_pay_to_script_hash, is_push_only_script};
use crate::sig_cache::SigCache;
use crate::sighash::TxSigHashes;
use crate::signature_checker::{SignatureChecker, TransactionSignatureChecker};
use crate::solver::strip_vote_script;
use crate::stack::Stack;
use crate::{SigVersion, VerifyFlags};
use bitcoin::hashes::{Hash, sha256};
use bitcoin::{Amount, Transaction};

/// Verifies the spend of a single transaction input.
///
/// The engine owns everything one verification needs and is discarded afterwards.
pub struct Engine<'a, SC = TransactionSignatureChecker<'a>> {
    script_sig: &'a [u8],
    script_pubkey: &'a [u8],
    witness: Vec<Vec<u8>>,
    flags: VerifyFlags,
    checker: SC,
    input_index: Option<usize>,
}

impl<'a> Engine<'a> {
    /// Creates an engine verifying `tx.input[input_index]` against `script_pubkey`, the
    /// script of the output it spends.
    ///
    /// `amount` is the value of that output, only committed to by witness signatures.
    pub fn new(
        script_pubkey: &'a [u8],
        tx: &'a Transaction,
        input_index: usize,
        flags: VerifyFlags,
        amount: Amount,
    ) -> Result<Self, Error> {
        let input = tx.input.get(input_index).ok_or(Error::InvalidIndex {
            index: input_index,
            inputs: tx.input.len(),
        })?;

        let mut engine = Self::with_checker(
            input.script_sig.as_bytes(),
            script_pubkey,
            input.witness.to_vec(),
            flags,
            TransactionSignatureChecker::new(tx, input_index, amount),
        )?;
        engine.input_index = Some(input_index);

        Ok(engine)
    }

    /// Looks verified signatures up in `sig_cache` and records new ones.
    pub fn with_sig_cache(mut self, sig_cache: &'a SigCache) -> Self {
        self.checker = self.checker.with_sig_cache(sig_cache);
        self
    }

    /// Uses precomputed witness signature hash midstates, shared by all inputs of the
    /// transaction.
    pub fn with_hash_cache(mut self, hash_cache: &'a TxSigHashes) -> Self {
        self.checker = self.checker.with_hash_cache(hash_cache);
        self
    }
}

impl<'a, SC: SignatureChecker> Engine<'a, SC> {
    pub fn with_checker(
        script_sig: &'a [u8],
        script_pubkey: &'a [u8],
        witness: Vec<Vec<u8>>,
        flags: VerifyFlags,
        checker: SC,
    ) -> Result<Self, Error> {
        // We can't check for correct unexpected witness data if P2SH was off, so require
        // that WITNESS implies P2SH. Otherwise, going from WITNESS->P2SH+WITNESS would be
        // possible, which is not a softfork.
        if flags.verify_witness() && !flags.verify_p2sh() {
            return Err(Error::InvalidFlags("WITNESS requires P2SH"));
        }

        // The non-P2SH evaluation of a P2SH script does not leave a clean stack, neither
        // does the evaluation of a witness program.
        if flags.contains(VerifyFlags::CLEANSTACK)
            && !(flags.verify_p2sh() && flags.verify_witness())
        {
            return Err(Error::InvalidFlags("CLEANSTACK requires P2SH and WITNESS"));
        }

        for script in [script_sig, script_pubkey] {
            if script.len() > MAX_SCRIPT_SIZE {
                return Err(Error::ScriptSize(script.len()));
            }
        }

        Ok(Self {
            script_sig,
            script_pubkey,
            witness,
            flags,
            checker,
            input_index: None,
        })
    }

    /// Runs the verification, `Ok(())` means the input may spend the output.
    ///
    /// A script that completes with a false result is reported as [`Error::EvalFalse`].
    pub fn execute(&self) -> Result<(), Error> {
        verify_script(
            self.script_sig,
            self.script_pubkey,
            &self.witness,
            &self.flags,
            &self.checker,
        )
        .inspect_err(|err| {
            tracing::debug!(
                input_index = ?self.input_index,
                script_pubkey = %hex::encode(self.script_pubkey),
                flags = ?self.flags,
                ?err,
                "Script verification failed"
            );
        })
    }
}

fn verify_script<SC: SignatureChecker>(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &[Vec<u8>],
    flags: &VerifyFlags,
    checker: &SC,
) -> Result<(), Error> {
    if flags.contains(VerifyFlags::SIGPUSHONLY) && !is_push_only_script(script_sig) {
        return Err(Error::SigPushOnly);
    }

    // The templates are matched without a trailing vote, the full script still runs.
    let template = strip_vote_script(script_pubkey);

    // scriptSig and scriptPubKey must be evaluated sequentially on the same stack rather
    // than being simply concatenated (see CVE-2010-5141).
    let mut stack = Stack::with_flags(flags);

    eval_script(&mut stack, script_sig, flags, checker, SigVersion::Base)?;

    let stack_copy = flags.verify_p2sh().then(|| stack.clone());

    if !eval_script(&mut stack, script_pubkey, flags, checker, SigVersion::Base)? {
        return Err(Error::EvalFalse);
    }

    let mut had_witness = false;

    if flags.verify_witness() {
        if let Some((version, program)) = extract_witness_program_info(template) {
            if !script_sig.is_empty() {
                return Err(Error::WitnessMalleated);
            }

            had_witness = true;

            verify_witness_program(witness, version, program, flags, checker)?;

            // The actual stack is obviously not clean for witness programs.
            stack.truncate(1);
        }
    }

    if let Some(mut stack_copy) = stack_copy.filter(|_| is_pay_to_script_hash(template)) {
        if !is_push_only_script(script_sig) {
            return Err(Error::SigPushOnly);
        }

        // The P2SH script evaluated to true above, so the script signature pushed at least
        // the redeem script.
        let redeem_script = stack_copy.pop()?;

        if !eval_script(&mut stack_copy, &redeem_script, flags, checker, SigVersion::Base)? {
            return Err(Error::EvalFalse);
        }

        stack = stack_copy;

        if flags.verify_witness() {
            if let Some((version, program)) = extract_witness_program_info(&redeem_script) {
                // The script signature must be exactly a single push of the redeem
                // script, otherwise malleability is reintroduced.
                let expected = ScriptBuilder::new().add_data(&redeem_script).script()?;
                if script_sig != expected.as_slice() {
                    return Err(Error::WitnessMalleatedP2SH);
                }

                had_witness = true;

                verify_witness_program(witness, version, program, flags, checker)?;

                stack.truncate(1);
            }
        }
    }

    // Only checked after a potential P2SH evaluation, the P2SH inputs remain on the stack
    // otherwise.
    if flags.contains(VerifyFlags::CLEANSTACK) && stack.len() != 1 {
        return Err(Error::CleanStack);
    }

    if flags.verify_witness() && !had_witness && !witness.is_empty() {
        return Err(Error::WitnessUnexpected);
    }

    Ok(())
}

fn verify_witness_program<SC: SignatureChecker>(
    witness: &[Vec<u8>],
    version: u8,
    program: &[u8],
    flags: &VerifyFlags,
    checker: &SC,
) -> Result<(), Error> {
    if version != 0 {
        if flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
            return Err(Error::DiscourageUpgradableWitnessProgram(version));
        }

        // Unknown versions are anyone-can-spend until a soft fork defines them.
        return Ok(());
    }

    match program.len() {
        WITNESS_V0_SCRIPTHASH_SIZE => {
            let Some((witness_script, stack)) = witness.split_last() else {
                return Err(Error::WitnessProgramWitnessEmpty);
            };

            let script_hash = sha256::Hash::hash(witness_script);
            if script_hash.as_byte_array().as_slice() != program {
                return Err(Error::WitnessProgramMismatch);
            }

            execute_witness_script(stack, witness_script, flags, checker)
        }
        WITNESS_V0_KEYHASH_SIZE => {
            if witness.len() != 2 {
                return Err(Error::WitnessProgramMismatch);
            }

            let script = ScriptBuilder::new()
                .add_ops(&[OP_DUP, OP_HASH160])
                .add_data(program)
                .add_ops(&[OP_EQUALVERIFY, OP_CHECKSIG])
                .script()?;

            execute_witness_script(witness, &script, flags, checker)
        }
        len => Err(Error::WitnessProgramWrongLength(len)),
    }
}

fn execute_witness_script<SC: SignatureChecker>(
    stack_items: &[Vec<u8>],
    script: &[u8],
    flags: &VerifyFlags,
    checker: &SC,
) -> Result<(), Error> {
    // Disallow stack item size > MAX_SCRIPT_ELEMENT_SIZE in witness stack
    if let Some(item) = stack_items
        .iter()
        .find(|item| item.len() > MAX_SCRIPT_ELEMENT_SIZE)
    {
        return Err(Error::PushSize(item.len()));
    }

    let mut stack = Stack::new(stack_items.to_vec(), flags.verify_minimaldata());

    eval_script(&mut stack, script, flags, checker, SigVersion::WitnessV0)?;

    // Scripts inside witness implicitly require cleanstack behavior
    if stack.len() != 1 {
        return Err(Error::CleanStack);
    }

    if !stack.peek_bool()? {
        return Err(Error::EvalFalse);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::*;
    use crate::signature_checker::NoSignatureCheck;

    fn new_engine<'a>(
        script_sig: &'a [u8],
        script_pubkey: &'a [u8],
        flags: VerifyFlags,
    ) -> Result<Engine<'a, NoSignatureCheck>, Error> {
        Engine::with_checker(script_sig, script_pubkey, Vec::new(), flags, NoSignatureCheck)
    }

    #[test]
    fn test_invalid_flags() {
        assert_eq!(
            new_engine(&[], &[OP_TRUE], VerifyFlags::WITNESS).err(),
            Some(Error::InvalidFlags("WITNESS requires P2SH"))
        );
        assert_eq!(
            new_engine(&[], &[OP_TRUE], VerifyFlags::CLEANSTACK | VerifyFlags::P2SH).err(),
            Some(Error::InvalidFlags("CLEANSTACK requires P2SH and WITNESS"))
        );
        assert!(new_engine(&[], &[OP_TRUE], VerifyFlags::P2SH).is_ok());
    }

    #[test]
    fn test_oversized_script() {
        let script = vec![OP_NOP; MAX_SCRIPT_SIZE + 1];
        assert_eq!(
            new_engine(&[], &script, VerifyFlags::NONE).err(),
            Some(Error::ScriptSize(MAX_SCRIPT_SIZE + 1))
        );
    }

    #[test]
    fn test_clean_stack() {
        let flags = VerifyFlags::P2SH | VerifyFlags::WITNESS | VerifyFlags::CLEANSTACK;
        let engine = new_engine(&[OP_1, OP_1], &[OP_TRUE], flags).unwrap();
        assert_eq!(engine.execute(), Err(Error::CleanStack));

        let engine = new_engine(&[OP_1], &[OP_NOP], flags).unwrap();
        assert_eq!(engine.execute(), Ok(()));
    }

    #[test]
    fn test_sig_push_only() {
        let engine = new_engine(&[OP_1, OP_DUP], &[OP_DROP], VerifyFlags::SIGPUSHONLY).unwrap();
        assert_eq!(engine.execute(), Err(Error::SigPushOnly));
    }

    #[test]
    fn test_p2sh_requires_push_only_script_sig() {
        let redeem_script = [OP_TRUE];
        let hash = bitcoin::hashes::hash160::Hash::hash(&redeem_script);
        let script_pubkey = ScriptBuilder::new()
            .add_op(OP_HASH160)
            .add_data(hash.as_byte_array())
            .add_op(OP_EQUAL)
            .script()
            .unwrap();

        let script_sig = [OP_DATA_1, OP_TRUE];
        let engine = new_engine(&script_sig, &script_pubkey, VerifyFlags::P2SH).unwrap();
        assert_eq!(engine.execute(), Ok(()));

        let script_sig = [OP_NOP, OP_DATA_1, OP_TRUE];
        let engine = new_engine(&script_sig, &script_pubkey, VerifyFlags::P2SH).unwrap();
        assert_eq!(engine.execute(), Err(Error::SigPushOnly));

        // A false redeem script.
        let redeem_script = [OP_FALSE];
        let hash = bitcoin::hashes::hash160::Hash::hash(&redeem_script);
        let script_pubkey = ScriptBuilder::new()
            .add_op(OP_HASH160)
            .add_data(hash.as_byte_array())
            .add_op(OP_EQUAL)
            .script()
            .unwrap();
        let script_sig = [OP_DATA_1, OP_FALSE];
        let engine = new_engine(&script_sig, &script_pubkey, VerifyFlags::P2SH).unwrap();
        assert_eq!(engine.execute(), Err(Error::EvalFalse));
    }
}
