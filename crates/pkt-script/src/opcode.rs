//! Opcode table.
//!
//! Every byte value maps to an [`OpcodeInfo`] in [`OPCODE_TABLE`]. The push-length
//! code tells the parser how many payload bytes follow the opcode, the class tells
//! the engine how the opcode behaves before its semantics are looked up.

pub const OP_0: u8 = 0x00;
pub const OP_DATA_1: u8 = 0x01;
pub const OP_DATA_20: u8 = 0x14;
pub const OP_DATA_32: u8 = 0x20;
pub const OP_DATA_33: u8 = 0x21;
pub const OP_DATA_65: u8 = 0x41;
pub const OP_DATA_75: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_RESERVED: u8 = 0x50;
pub const OP_1: u8 = 0x51;
pub const OP_2: u8 = 0x52;
pub const OP_3: u8 = 0x53;
pub const OP_4: u8 = 0x54;
pub const OP_5: u8 = 0x55;
pub const OP_6: u8 = 0x56;
pub const OP_7: u8 = 0x57;
pub const OP_8: u8 = 0x58;
pub const OP_9: u8 = 0x59;
pub const OP_10: u8 = 0x5a;
pub const OP_11: u8 = 0x5b;
pub const OP_12: u8 = 0x5c;
pub const OP_13: u8 = 0x5d;
pub const OP_14: u8 = 0x5e;
pub const OP_15: u8 = 0x5f;
pub const OP_16: u8 = 0x60;
pub const OP_NOP: u8 = 0x61;
pub const OP_VER: u8 = 0x62;
pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_VERIF: u8 = 0x65;
pub const OP_VERNOTIF: u8 = 0x66;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_TOALTSTACK: u8 = 0x6b;
pub const OP_FROMALTSTACK: u8 = 0x6c;
pub const OP_2DROP: u8 = 0x6d;
pub const OP_2DUP: u8 = 0x6e;
pub const OP_3DUP: u8 = 0x6f;
pub const OP_2OVER: u8 = 0x70;
pub const OP_2ROT: u8 = 0x71;
pub const OP_2SWAP: u8 = 0x72;
pub const OP_IFDUP: u8 = 0x73;
pub const OP_DEPTH: u8 = 0x74;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_NIP: u8 = 0x77;
pub const OP_OVER: u8 = 0x78;
pub const OP_PICK: u8 = 0x79;
pub const OP_ROLL: u8 = 0x7a;
pub const OP_ROT: u8 = 0x7b;
pub const OP_SWAP: u8 = 0x7c;
pub const OP_TUCK: u8 = 0x7d;
pub const OP_CAT: u8 = 0x7e;
pub const OP_SUBSTR: u8 = 0x7f;
pub const OP_LEFT: u8 = 0x80;
pub const OP_RIGHT: u8 = 0x81;
pub const OP_SIZE: u8 = 0x82;
pub const OP_INVERT: u8 = 0x83;
pub const OP_AND: u8 = 0x84;
pub const OP_OR: u8 = 0x85;
pub const OP_XOR: u8 = 0x86;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_RESERVED1: u8 = 0x89;
pub const OP_RESERVED2: u8 = 0x8a;
pub const OP_1ADD: u8 = 0x8b;
pub const OP_1SUB: u8 = 0x8c;
pub const OP_2MUL: u8 = 0x8d;
pub const OP_2DIV: u8 = 0x8e;
pub const OP_NEGATE: u8 = 0x8f;
pub const OP_ABS: u8 = 0x90;
pub const OP_NOT: u8 = 0x91;
pub const OP_0NOTEQUAL: u8 = 0x92;
pub const OP_ADD: u8 = 0x93;
pub const OP_SUB: u8 = 0x94;
pub const OP_MUL: u8 = 0x95;
pub const OP_DIV: u8 = 0x96;
pub const OP_MOD: u8 = 0x97;
pub const OP_LSHIFT: u8 = 0x98;
pub const OP_RSHIFT: u8 = 0x99;
pub const OP_BOOLAND: u8 = 0x9a;
pub const OP_BOOLOR: u8 = 0x9b;
pub const OP_NUMEQUAL: u8 = 0x9c;
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
pub const OP_NUMNOTEQUAL: u8 = 0x9e;
pub const OP_LESSTHAN: u8 = 0x9f;
pub const OP_GREATERTHAN: u8 = 0xa0;
pub const OP_LESSTHANOREQUAL: u8 = 0xa1;
pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;
pub const OP_MIN: u8 = 0xa3;
pub const OP_MAX: u8 = 0xa4;
pub const OP_WITHIN: u8 = 0xa5;
pub const OP_RIPEMD160: u8 = 0xa6;
pub const OP_SHA1: u8 = 0xa7;
pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
pub const OP_NOP1: u8 = 0xb0;
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;
pub const OP_NOP4: u8 = 0xb3;
pub const OP_NOP5: u8 = 0xb4;
pub const OP_NOP6: u8 = 0xb5;
pub const OP_NOP7: u8 = 0xb6;
pub const OP_NOP8: u8 = 0xb7;
pub const OP_NOP9: u8 = 0xb8;
pub const OP_NOP10: u8 = 0xb9;
pub const OP_VOTE: u8 = 0xc0;
pub const OP_SMALLINTEGER: u8 = 0xfa;
pub const OP_PUBKEYS: u8 = 0xfb;
pub const OP_PUBKEYHASH: u8 = 0xfd;
pub const OP_PUBKEY: u8 = 0xfe;
pub const OP_INVALIDOPCODE: u8 = 0xff;
pub const OP_FALSE: u8 = OP_0;
pub const OP_TRUE: u8 = OP_1;
pub const OP_NOP2: u8 = OP_CHECKLOCKTIMEVERIFY;
pub const OP_NOP3: u8 = OP_CHECKSEQUENCEVERIFY;

/// How the engine treats an opcode before dispatching on its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    /// OP_0 and the data pushes, 0x00..=0x4e.
    Push,
    /// OP_1NEGATE and OP_1..=OP_16.
    SmallInt,
    /// IF/NOTIF/ELSE/ENDIF, evaluated even inside a branch that is not executing.
    Conditional,
    /// Removed from the consensus set, fails wherever it appears in a script.
    Disabled,
    /// OP_VERIF and OP_VERNOTIF, fail wherever they appear in a script.
    AlwaysIllegal,
    /// Fails only when executed.
    Reserved,
    /// No-op reserved for soft forks.
    UpgradableNop,
    /// Unassigned byte value, fails only when executed.
    Invalid,
    /// Everything else.
    Normal,
}

/// Descriptor of a single opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub value: u8,
    pub name: &'static str,
    /// Push-length code.
    ///
    /// - `1`: the opcode carries no payload.
    /// - `N > 1`: fixed push of `N - 1` bytes.
    /// - `-1`, `-2`, `-4`: the payload length is a 1, 2 or 4 byte little-endian
    ///   prefix following the opcode.
    pub length: i8,
    pub class: OpcodeClass,
}

impl OpcodeInfo {
    /// Whether the opcode pushes data (including OP_0) rather than operating on the stack.
    pub fn is_push(&self) -> bool {
        matches!(self.class, OpcodeClass::Push)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.class, OpcodeClass::Disabled)
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self.class, OpcodeClass::Conditional)
    }

    pub fn always_illegal(&self) -> bool {
        matches!(self.class, OpcodeClass::AlwaysIllegal)
    }

    /// Whether this is OP_0 or one of OP_1..=OP_16.
    pub fn is_small_int(&self) -> bool {
        self.value == OP_0 || (OP_1..=OP_16).contains(&self.value)
    }
}

/// Returns the number represented by a small integer opcode.
///
/// OP_0 is 0, OP_1..=OP_16 are 1..=16. Other opcodes yield `None`.
pub fn as_small_int(opcode: u8) -> Option<u8> {
    match opcode {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some(opcode - (OP_1 - 1)),
        _ => None,
    }
}

/// Returns the descriptor of `opcode`.
#[inline]
pub fn opcode_info(opcode: u8) -> &'static OpcodeInfo {
    &OPCODE_TABLE[opcode as usize]
}

/// The process-wide opcode table, indexed by byte value.
pub static OPCODE_TABLE: [OpcodeInfo; 256] = build_table();

const fn push_length(value: u8) -> i8 {
    match value {
        OP_DATA_1..=OP_DATA_75 => value as i8 + 1,
        OP_PUSHDATA1 => -1,
        OP_PUSHDATA2 => -2,
        OP_PUSHDATA4 => -4,
        _ => 1,
    }
}

const fn classify(value: u8) -> OpcodeClass {
    match value {
        OP_0..=OP_PUSHDATA4 => OpcodeClass::Push,
        OP_1NEGATE | OP_1..=OP_16 => OpcodeClass::SmallInt,
        OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF => OpcodeClass::Conditional,
        OP_CAT | OP_SUBSTR | OP_LEFT | OP_RIGHT | OP_INVERT | OP_AND | OP_OR | OP_XOR
        | OP_2MUL | OP_2DIV | OP_MUL | OP_DIV | OP_MOD | OP_LSHIFT | OP_RSHIFT => {
            OpcodeClass::Disabled
        }
        OP_VERIF | OP_VERNOTIF => OpcodeClass::AlwaysIllegal,
        OP_RESERVED | OP_VER | OP_RESERVED1 | OP_RESERVED2 => OpcodeClass::Reserved,
        OP_NOP1 | OP_NOP4..=OP_NOP10 => OpcodeClass::UpgradableNop,
        OP_NOP..=OP_NOP10 | OP_VOTE => OpcodeClass::Normal,
        _ => OpcodeClass::Invalid,
    }
}

const fn build_table() -> [OpcodeInfo; 256] {
    let mut table = [OpcodeInfo {
        value: 0,
        name: "",
        length: 1,
        class: OpcodeClass::Normal,
    }; 256];

    let mut i = 0;
    while i < 256 {
        let value = i as u8;
        table[i] = OpcodeInfo {
            value,
            name: OPCODE_NAMES[i],
            length: push_length(value),
            class: classify(value),
        };
        i += 1;
    }

    table
}

const OPCODE_NAMES: [&str; 256] = [
    "OP_0", "OP_DATA_1", "OP_DATA_2", "OP_DATA_3", "OP_DATA_4", "OP_DATA_5",
    "OP_DATA_6", "OP_DATA_7", "OP_DATA_8", "OP_DATA_9", "OP_DATA_10", "OP_DATA_11",
    "OP_DATA_12", "OP_DATA_13", "OP_DATA_14", "OP_DATA_15", "OP_DATA_16",
    "OP_DATA_17", "OP_DATA_18", "OP_DATA_19", "OP_DATA_20", "OP_DATA_21",
    "OP_DATA_22", "OP_DATA_23", "OP_DATA_24", "OP_DATA_25", "OP_DATA_26",
    "OP_DATA_27", "OP_DATA_28", "OP_DATA_29", "OP_DATA_30", "OP_DATA_31",
    "OP_DATA_32", "OP_DATA_33", "OP_DATA_34", "OP_DATA_35", "OP_DATA_36",
    "OP_DATA_37", "OP_DATA_38", "OP_DATA_39", "OP_DATA_40", "OP_DATA_41",
    "OP_DATA_42", "OP_DATA_43", "OP_DATA_44", "OP_DATA_45", "OP_DATA_46",
    "OP_DATA_47", "OP_DATA_48", "OP_DATA_49", "OP_DATA_50", "OP_DATA_51",
    "OP_DATA_52", "OP_DATA_53", "OP_DATA_54", "OP_DATA_55", "OP_DATA_56",
    "OP_DATA_57", "OP_DATA_58", "OP_DATA_59", "OP_DATA_60", "OP_DATA_61",
    "OP_DATA_62", "OP_DATA_63", "OP_DATA_64", "OP_DATA_65", "OP_DATA_66",
    "OP_DATA_67", "OP_DATA_68", "OP_DATA_69", "OP_DATA_70", "OP_DATA_71",
    "OP_DATA_72", "OP_DATA_73", "OP_DATA_74", "OP_DATA_75", "OP_PUSHDATA1",
    "OP_PUSHDATA2", "OP_PUSHDATA4", "OP_1NEGATE", "OP_RESERVED", "OP_1", "OP_2",
    "OP_3", "OP_4", "OP_5", "OP_6", "OP_7", "OP_8", "OP_9", "OP_10", "OP_11",
    "OP_12", "OP_13", "OP_14", "OP_15", "OP_16", "OP_NOP", "OP_VER", "OP_IF",
    "OP_NOTIF", "OP_VERIF", "OP_VERNOTIF", "OP_ELSE", "OP_ENDIF", "OP_VERIFY",
    "OP_RETURN", "OP_TOALTSTACK", "OP_FROMALTSTACK", "OP_2DROP", "OP_2DUP",
    "OP_3DUP", "OP_2OVER", "OP_2ROT", "OP_2SWAP", "OP_IFDUP", "OP_DEPTH", "OP_DROP",
    "OP_DUP", "OP_NIP", "OP_OVER", "OP_PICK", "OP_ROLL", "OP_ROT", "OP_SWAP",
    "OP_TUCK", "OP_CAT", "OP_SUBSTR", "OP_LEFT", "OP_RIGHT", "OP_SIZE", "OP_INVERT",
    "OP_AND", "OP_OR", "OP_XOR", "OP_EQUAL", "OP_EQUALVERIFY", "OP_RESERVED1",
    "OP_RESERVED2", "OP_1ADD", "OP_1SUB", "OP_2MUL", "OP_2DIV", "OP_NEGATE",
    "OP_ABS", "OP_NOT", "OP_0NOTEQUAL", "OP_ADD", "OP_SUB", "OP_MUL", "OP_DIV",
    "OP_MOD", "OP_LSHIFT", "OP_RSHIFT", "OP_BOOLAND", "OP_BOOLOR", "OP_NUMEQUAL",
    "OP_NUMEQUALVERIFY", "OP_NUMNOTEQUAL", "OP_LESSTHAN", "OP_GREATERTHAN",
    "OP_LESSTHANOREQUAL", "OP_GREATERTHANOREQUAL", "OP_MIN", "OP_MAX", "OP_WITHIN",
    "OP_RIPEMD160", "OP_SHA1", "OP_SHA256", "OP_HASH160", "OP_HASH256",
    "OP_CODESEPARATOR", "OP_CHECKSIG", "OP_CHECKSIGVERIFY", "OP_CHECKMULTISIG",
    "OP_CHECKMULTISIGVERIFY", "OP_NOP1", "OP_CHECKLOCKTIMEVERIFY",
    "OP_CHECKSEQUENCEVERIFY", "OP_NOP4", "OP_NOP5", "OP_NOP6", "OP_NOP7", "OP_NOP8",
    "OP_NOP9", "OP_NOP10", "OP_UNKNOWN186", "OP_UNKNOWN187", "OP_UNKNOWN188",
    "OP_UNKNOWN189", "OP_UNKNOWN190", "OP_UNKNOWN191", "OP_VOTE", "OP_UNKNOWN193",
    "OP_UNKNOWN194", "OP_UNKNOWN195", "OP_UNKNOWN196", "OP_UNKNOWN197",
    "OP_UNKNOWN198", "OP_UNKNOWN199", "OP_UNKNOWN200", "OP_UNKNOWN201",
    "OP_UNKNOWN202", "OP_UNKNOWN203", "OP_UNKNOWN204", "OP_UNKNOWN205",
    "OP_UNKNOWN206", "OP_UNKNOWN207", "OP_UNKNOWN208", "OP_UNKNOWN209",
    "OP_UNKNOWN210", "OP_UNKNOWN211", "OP_UNKNOWN212", "OP_UNKNOWN213",
    "OP_UNKNOWN214", "OP_UNKNOWN215", "OP_UNKNOWN216", "OP_UNKNOWN217",
    "OP_UNKNOWN218", "OP_UNKNOWN219", "OP_UNKNOWN220", "OP_UNKNOWN221",
    "OP_UNKNOWN222", "OP_UNKNOWN223", "OP_UNKNOWN224", "OP_UNKNOWN225",
    "OP_UNKNOWN226", "OP_UNKNOWN227", "OP_UNKNOWN228", "OP_UNKNOWN229",
    "OP_UNKNOWN230", "OP_UNKNOWN231", "OP_UNKNOWN232", "OP_UNKNOWN233",
    "OP_UNKNOWN234", "OP_UNKNOWN235", "OP_UNKNOWN236", "OP_UNKNOWN237",
    "OP_UNKNOWN238", "OP_UNKNOWN239", "OP_UNKNOWN240", "OP_UNKNOWN241",
    "OP_UNKNOWN242", "OP_UNKNOWN243", "OP_UNKNOWN244", "OP_UNKNOWN245",
    "OP_UNKNOWN246", "OP_UNKNOWN247", "OP_UNKNOWN248", "OP_UNKNOWN249",
    "OP_SMALLINTEGER", "OP_PUBKEYS", "OP_UNKNOWN252", "OP_PUBKEYHASH", "OP_PUBKEY",
    "OP_INVALIDOPCODE",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table_is_indexed_by_value() {
        for (i, info) in OPCODE_TABLE.iter().enumerate() {
            assert_eq!(info.value as usize, i);
            assert!(!info.name.is_empty());
        }
    }

    #[test]
    fn test_push_lengths() {
        assert_eq!(opcode_info(OP_0).length, 1);
        assert_eq!(opcode_info(OP_DATA_1).length, 2);
        assert_eq!(opcode_info(OP_DATA_75).length, 76);
        assert_eq!(opcode_info(OP_PUSHDATA1).length, -1);
        assert_eq!(opcode_info(OP_PUSHDATA2).length, -2);
        assert_eq!(opcode_info(OP_PUSHDATA4).length, -4);
        assert_eq!(opcode_info(OP_1NEGATE).length, 1);
        assert_eq!(opcode_info(OP_CHECKSIG).length, 1);
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(opcode_info(0x14).name, "OP_DATA_20");
        assert_eq!(opcode_info(OP_NOP2).name, "OP_CHECKLOCKTIMEVERIFY");
        assert_eq!(opcode_info(OP_NOP10).name, "OP_NOP10");
        assert_eq!(opcode_info(0xba).name, "OP_UNKNOWN186");
        assert_eq!(opcode_info(OP_VOTE).name, "OP_VOTE");
        assert_eq!(opcode_info(0xc1).name, "OP_UNKNOWN193");
        assert_eq!(opcode_info(OP_INVALIDOPCODE).name, "OP_INVALIDOPCODE");
    }

    #[test]
    fn test_opcode_classes() {
        let disabled = OPCODE_TABLE.iter().filter(|op| op.is_disabled()).count();
        assert_eq!(disabled, 15);
        assert!(opcode_info(OP_VERIF).always_illegal());
        assert!(opcode_info(OP_VERNOTIF).always_illegal());
        assert_eq!(opcode_info(OP_RESERVED).class, OpcodeClass::Reserved);
        assert_eq!(opcode_info(OP_NOP1).class, OpcodeClass::UpgradableNop);
        assert_eq!(opcode_info(OP_NOP2).class, OpcodeClass::Normal);
        assert_eq!(opcode_info(OP_VOTE).class, OpcodeClass::Normal);
        assert_eq!(opcode_info(OP_PUBKEY).class, OpcodeClass::Invalid);
        assert!(opcode_info(OP_ELSE).is_conditional());
    }

    #[test]
    fn test_small_ints() {
        assert_eq!(as_small_int(OP_0), Some(0));
        assert_eq!(as_small_int(OP_1), Some(1));
        assert_eq!(as_small_int(OP_16), Some(16));
        assert_eq!(as_small_int(OP_1NEGATE), None);
        assert_eq!(as_small_int(OP_NOP), None);
        assert!(!opcode_info(OP_1NEGATE).is_small_int());
    }
}
