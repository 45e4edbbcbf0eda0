use bitflags::bitflags;

bitflags! {
    /// Script verification flags.
    ///
    /// Each bit toggles one validation rule independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VerifyFlags: u32 {
        const NONE = 0;
        /// Evaluate P2SH subscripts (BIP16).
        const P2SH = 1 << 0;
        /// Passing a non-strict-DER signature or one with undefined hashtype to a checksig
        /// operation causes script failure. Evaluating a pubkey that is not (0x04 + 64 bytes)
        /// or (0x02 or 0x03 + 32 bytes) by checksig causes script failure.
        const STRICTENC = 1 << 1;
        /// Passing a non-strict-DER signature to a checksig operation causes script failure (BIP62 rule 1).
        const DERSIG = 1 << 2;
        /// Passing a non-strict-DER signature or one with S > order/2 to a checksig operation
        /// causes script failure (BIP62 rule 5).
        const LOW_S = 1 << 3;
        /// Verify dummy stack item consumed by CHECKMULTISIG is of zero-length (BIP62 rule 7).
        const NULLDUMMY = 1 << 4;
        /// Using a non-push operator in the scriptSig causes script failure (BIP62 rule 2).
        const SIGPUSHONLY = 1 << 5;
        /// Require minimal encodings for all push operations and number operands (BIP62 rules 3 and 4).
        const MINIMALDATA = 1 << 6;
        /// Discourage use of NOPs reserved for upgrades (NOP1, NOP4-NOP10).
        const DISCOURAGE_UPGRADABLE_NOPS = 1 << 7;
        /// Require that only a single stack element remains after evaluation (BIP62 rule 6).
        const CLEANSTACK = 1 << 8;
        /// Verify CHECKLOCKTIMEVERIFY (BIP65).
        const CHECKLOCKTIMEVERIFY = 1 << 9;
        /// Support CHECKSEQUENCEVERIFY opcode (BIP112).
        const CHECKSEQUENCEVERIFY = 1 << 10;
        /// Support segregated witness.
        const WITNESS = 1 << 11;
        /// Making v1-v16 witness program non-standard.
        const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM = 1 << 12;
        /// Segwit script only: Require the argument of OP_IF/NOTIF to be exactly 0x01 or empty vector.
        const MINIMALIF = 1 << 13;
        /// Signature(s) must be empty vector if a CHECK(MULTI)SIG operation failed.
        const NULLFAIL = 1 << 14;
        /// Public keys in segregated witness scripts must be compressed.
        const WITNESS_PUBKEYTYPE = 1 << 15;
        /// Making OP_CODESEPARATOR and FindAndDelete fail any non-segwit scripts.
        const CONST_SCRIPTCODE = 1 << 16;
    }
}

/// Flags every block must satisfy.
pub const MANDATORY_VERIFY_FLAGS: VerifyFlags = VerifyFlags::P2SH;

/// Flags applied to transactions entering the mempool.
pub const STANDARD_VERIFY_FLAGS: VerifyFlags = MANDATORY_VERIFY_FLAGS
    .union(VerifyFlags::DERSIG)
    .union(VerifyFlags::STRICTENC)
    .union(VerifyFlags::MINIMALDATA)
    .union(VerifyFlags::NULLDUMMY)
    .union(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS)
    .union(VerifyFlags::CLEANSTACK)
    .union(VerifyFlags::CHECKLOCKTIMEVERIFY)
    .union(VerifyFlags::CHECKSEQUENCEVERIFY)
    .union(VerifyFlags::LOW_S)
    .union(VerifyFlags::NULLFAIL)
    .union(VerifyFlags::WITNESS)
    .union(VerifyFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM)
    .union(VerifyFlags::WITNESS_PUBKEYTYPE);

impl VerifyFlags {
    pub fn verify_minimaldata(&self) -> bool {
        self.contains(Self::MINIMALDATA)
    }

    pub fn verify_p2sh(&self) -> bool {
        self.contains(Self::P2SH)
    }

    pub fn verify_witness(&self) -> bool {
        self.contains(Self::WITNESS)
    }

    pub fn verify_strictenc(&self) -> bool {
        self.contains(Self::STRICTENC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_flags_include_mandatory() {
        assert!(STANDARD_VERIFY_FLAGS.contains(MANDATORY_VERIFY_FLAGS));
        assert!(STANDARD_VERIFY_FLAGS.verify_witness());
        assert!(!STANDARD_VERIFY_FLAGS.contains(VerifyFlags::MINIMALIF));
    }
}
