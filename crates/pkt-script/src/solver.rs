use crate::address::Address;
use crate::constants::{
    COMPRESSED_PUBKEY_SIZE, MAX_DATA_CARRIER_SIZE, UNCOMPRESSED_PUBKEY_SIZE,
    WITNESS_V0_KEYHASH_SIZE, WITNESS_V0_SCRIPTHASH_SIZE,
};
use crate::error::Error;
use crate::opcode::*;
use crate::script::{ParsedOpcode, parse_script};
use bitcoin::secp256k1::PublicKey;
use std::fmt;

/// Standard output script classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptClass {
    NonStandard,
    /// `<pubkey> OP_CHECKSIG`
    PubKey,
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    PubKeyHash,
    /// `OP_0 <20 bytes>`
    WitnessV0PubKeyHash,
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    ScriptHash,
    /// `OP_0 <32 bytes>`
    WitnessV0ScriptHash,
    /// `<m> <pubkey>... <n> OP_CHECKMULTISIG`
    MultiSig,
    /// `OP_RETURN [data]`, provably unspendable.
    NullData,
}

impl ScriptClass {
    /// Returns the class name as reported over RPC.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NonStandard => "nonstandard",
            Self::PubKey => "pubkey",
            Self::PubKeyHash => "pubkeyhash",
            Self::WitnessV0PubKeyHash => "witness_v0_keyhash",
            Self::ScriptHash => "scripthash",
            Self::WitnessV0ScriptHash => "witness_v0_scripthash",
            Self::MultiSig => "multisig",
            Self::NullData => "nulldata",
        }
    }
}

impl fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Network vote carried by an output script.
///
/// An empty side means no vote for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub vote_for: Vec<u8>,
    pub vote_against: Vec<u8>,
}

/// Whether the opcode can carry one side of a vote.
fn is_vote_item(op: &ParsedOpcode<'_>) -> bool {
    op.info().is_push() || op.opcode() == OP_1NEGATE || (OP_1..=OP_16).contains(&op.opcode())
}

/// Data of a vote item, small integers stand for their single byte push.
fn vote_item_data(op: &ParsedOpcode<'_>) -> Vec<u8> {
    match op.opcode() {
        OP_1NEGATE => vec![0x81],
        n @ OP_1..=OP_16 => vec![n - (OP_1 - 1)],
        _ => op.data().to_vec(),
    }
}

fn vote_suffix<'a, 'b>(
    opcodes: &'a [ParsedOpcode<'b>],
) -> Option<(&'a [ParsedOpcode<'b>], &'a [ParsedOpcode<'b>])> {
    match opcodes {
        [rest @ .., vote_for, vote_against, vote]
            if vote.opcode() == OP_VOTE && is_vote_item(vote_for) && is_vote_item(vote_against) =>
        {
            Some((rest, &opcodes[rest.len()..]))
        }
        _ => None,
    }
}

/// Removes a trailing `<for> <against> OP_VOTE` triple, if any.
pub fn strip_vote<'a, 'b>(opcodes: &'a [ParsedOpcode<'b>]) -> &'a [ParsedOpcode<'b>] {
    match vote_suffix(opcodes) {
        Some((rest, _)) => rest,
        None => opcodes,
    }
}

/// Byte level [`strip_vote`], scripts that fail to parse are returned unchanged.
pub fn strip_vote_script(script: &[u8]) -> &[u8] {
    let Ok(opcodes) = parse_script(script) else {
        return script;
    };

    match vote_suffix(&opcodes) {
        Some((_, vote)) => {
            let vote_len: usize = vote.iter().map(ParsedOpcode::encoded_len).sum();
            &script[..script.len() - vote_len]
        }
        None => script,
    }
}

/// Returns the vote carried by the script.
pub fn extract_vote(script: &[u8]) -> Option<Vote> {
    let opcodes = parse_script(script).ok()?;
    let (_, vote) = vote_suffix(&opcodes)?;

    Some(Vote {
        vote_for: vote_item_data(&vote[0]),
        vote_against: vote_item_data(&vote[1]),
    })
}

fn is_pubkey(opcodes: &[ParsedOpcode<'_>]) -> bool {
    matches!(opcodes, [pubkey, checksig]
        if is_pubkey_push(pubkey) && checksig.opcode() == OP_CHECKSIG)
}

fn is_pubkey_push(op: &ParsedOpcode<'_>) -> bool {
    op.info().is_push()
        && matches!(
            op.data().len(),
            COMPRESSED_PUBKEY_SIZE | UNCOMPRESSED_PUBKEY_SIZE
        )
}

fn is_pubkey_hash(opcodes: &[ParsedOpcode<'_>]) -> bool {
    matches!(opcodes, [dup, hash160, hash, equalverify, checksig]
        if dup.opcode() == OP_DUP
            && hash160.opcode() == OP_HASH160
            && hash.opcode() == OP_DATA_20
            && equalverify.opcode() == OP_EQUALVERIFY
            && checksig.opcode() == OP_CHECKSIG)
}

fn is_script_hash(opcodes: &[ParsedOpcode<'_>]) -> bool {
    matches!(opcodes, [hash160, hash, equal]
        if hash160.opcode() == OP_HASH160 && hash.opcode() == OP_DATA_20 && equal.opcode() == OP_EQUAL)
}

fn is_witness_v0(opcodes: &[ParsedOpcode<'_>], program_len: usize) -> bool {
    matches!(opcodes, [version, program]
        if version.opcode() == OP_0
            && program.opcode() as usize == program_len
            && program.data().len() == program_len)
}

/// Returns `(required_sigs, keys)` of a standard bare multisig script.
fn match_multisig<'a>(opcodes: &[ParsedOpcode<'a>]) -> Option<(usize, Vec<&'a [u8]>)> {
    let [first, keys @ .., last_count, checkmultisig] = opcodes else {
        return None;
    };

    if checkmultisig.opcode() != OP_CHECKMULTISIG {
        return None;
    }

    // 1 <= m <= n, as the standardness rules of the reference client require. A script
    // that can be satisfied without any signature, or never at all, is nonstandard.
    let required_sigs = as_small_int(first.opcode()).filter(|m| *m > 0)? as usize;
    let keys_count = as_small_int(last_count.opcode()).filter(|n| *n > 0)? as usize;

    if keys.len() != keys_count || required_sigs > keys_count {
        return None;
    }

    if !keys.iter().all(is_pubkey_push) {
        return None;
    }

    Some((required_sigs, keys.iter().map(|key| key.data()).collect()))
}

fn is_null_data(opcodes: &[ParsedOpcode<'_>]) -> bool {
    match opcodes {
        [ret] => ret.opcode() == OP_RETURN,
        [ret, data] => {
            ret.opcode() == OP_RETURN
                && (data.info().is_small_int() || data.info().is_push())
                && data.data().len() <= MAX_DATA_CARRIER_SIZE
        }
        _ => false,
    }
}

fn classify(opcodes: &[ParsedOpcode<'_>]) -> ScriptClass {
    if is_pubkey(opcodes) {
        ScriptClass::PubKey
    } else if is_pubkey_hash(opcodes) {
        ScriptClass::PubKeyHash
    } else if is_witness_v0(opcodes, WITNESS_V0_KEYHASH_SIZE) {
        ScriptClass::WitnessV0PubKeyHash
    } else if is_script_hash(opcodes) {
        ScriptClass::ScriptHash
    } else if is_witness_v0(opcodes, WITNESS_V0_SCRIPTHASH_SIZE) {
        ScriptClass::WitnessV0ScriptHash
    } else if match_multisig(opcodes).is_some() {
        ScriptClass::MultiSig
    } else if is_null_data(opcodes) {
        ScriptClass::NullData
    } else {
        ScriptClass::NonStandard
    }
}

/// Returns the class of the script, ignoring any trailing vote.
pub fn get_script_class(script: &[u8]) -> ScriptClass {
    match parse_script(script) {
        Ok(opcodes) => classify(strip_vote(&opcodes)),
        Err(_) => ScriptClass::NonStandard,
    }
}

/// Returns the class of the script along with the addresses it pays to and the number
/// of signatures required to spend it.
///
/// Multisig public keys that are not valid curve points are left out.
pub fn extract_pk_script_addrs(script: &[u8]) -> (ScriptClass, Vec<Address>, usize) {
    let Ok(opcodes) = parse_script(script) else {
        return (ScriptClass::NonStandard, Vec::new(), 0);
    };

    let opcodes = strip_vote(&opcodes);
    let class = classify(opcodes);

    let fixed = |data: &[u8]| -> [u8; 20] {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(data);
        hash
    };

    match class {
        ScriptClass::PubKey => {
            let pubkey = opcodes[0].data();
            let addrs = if PublicKey::from_slice(pubkey).is_ok() {
                vec![Address::PubKey(pubkey.to_vec())]
            } else {
                Vec::new()
            };
            (class, addrs, 1)
        }
        ScriptClass::PubKeyHash => (class, vec![Address::PubKeyHash(fixed(opcodes[2].data()))], 1),
        ScriptClass::WitnessV0PubKeyHash => (
            class,
            vec![Address::WitnessPubKeyHash(fixed(opcodes[1].data()))],
            1,
        ),
        ScriptClass::ScriptHash => (class, vec![Address::ScriptHash(fixed(opcodes[1].data()))], 1),
        ScriptClass::WitnessV0ScriptHash => {
            let mut program = [0u8; 32];
            program.copy_from_slice(opcodes[1].data());
            (class, vec![Address::WitnessScriptHash(program)], 1)
        }
        ScriptClass::MultiSig => match match_multisig(opcodes) {
            Some((required_sigs, keys)) => {
                let addrs = keys
                    .into_iter()
                    .filter(|key| PublicKey::from_slice(key).is_ok())
                    .map(|key| Address::PubKey(key.to_vec()))
                    .collect();
                (class, addrs, required_sigs)
            }
            None => (ScriptClass::NonStandard, Vec::new(), 0),
        },
        ScriptClass::NullData | ScriptClass::NonStandard => (class, Vec::new(), 0),
    }
}

/// Returns `(num_pubkeys, num_sigs)` of a standard multisig script.
pub fn calc_multisig_stats(script: &[u8]) -> Result<(usize, usize), Error> {
    let opcodes = parse_script(script)?;
    let (required_sigs, keys) =
        match_multisig(strip_vote(&opcodes)).ok_or(Error::NotMultisigScript)?;
    Ok((keys.len(), required_sigs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressParams, pay_to_addr_script};
    use crate::builder::ScriptBuilder;

    const PUBKEY1: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const PUBKEY2: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
    const PUBKEY3: &str = "02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";

    fn pubkey(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    fn multisig(m: i64, keys: &[&str], n: i64) -> Vec<u8> {
        let mut builder = ScriptBuilder::new().add_int64(m);
        for key in keys {
            builder = builder.add_data(&pubkey(key));
        }
        builder.add_int64(n).add_op(OP_CHECKMULTISIG).script().unwrap()
    }

    #[test]
    fn test_classify_standard_scripts() {
        let hash = [0x11u8; 20];

        let p2pkh = pay_to_addr_script(&Address::PubKeyHash(hash)).unwrap();
        let (class, addrs, required_sigs) = extract_pk_script_addrs(&p2pkh);
        assert_eq!(class, ScriptClass::PubKeyHash);
        assert_eq!(addrs, vec![Address::PubKeyHash(hash)]);
        assert_eq!(required_sigs, 1);

        let mut p2wsh = vec![OP_0, OP_DATA_32];
        p2wsh.extend_from_slice(&[0x22; 32]);
        assert_eq!(get_script_class(&p2wsh), ScriptClass::WitnessV0ScriptHash);

        let p2sh = pay_to_addr_script(&Address::ScriptHash(hash)).unwrap();
        assert_eq!(get_script_class(&p2sh), ScriptClass::ScriptHash);

        let p2wpkh = pay_to_addr_script(&Address::WitnessPubKeyHash(hash)).unwrap();
        assert_eq!(get_script_class(&p2wpkh), ScriptClass::WitnessV0PubKeyHash);

        let p2pk = pay_to_addr_script(&Address::PubKey(pubkey(PUBKEY1))).unwrap();
        let (class, addrs, required_sigs) = extract_pk_script_addrs(&p2pk);
        assert_eq!(class, ScriptClass::PubKey);
        assert_eq!(addrs, vec![Address::PubKey(pubkey(PUBKEY1))]);
        assert_eq!(required_sigs, 1);
    }

    #[test]
    fn test_classify_multisig() {
        let script = multisig(2, &[PUBKEY1, PUBKEY2, PUBKEY3], 3);
        let (class, addrs, required_sigs) = extract_pk_script_addrs(&script);
        assert_eq!(class, ScriptClass::MultiSig);
        assert_eq!(addrs.len(), 3);
        assert_eq!(required_sigs, 2);
        assert_eq!(calc_multisig_stats(&script), Ok((3, 2)));

        // m > n, key count mismatch, zero required signatures.
        assert_eq!(
            get_script_class(&multisig(3, &[PUBKEY1, PUBKEY2], 2)),
            ScriptClass::NonStandard
        );
        assert_eq!(
            get_script_class(&multisig(1, &[PUBKEY1, PUBKEY2], 3)),
            ScriptClass::NonStandard
        );
        assert_eq!(
            get_script_class(&multisig(0, &[PUBKEY1], 1)),
            ScriptClass::NonStandard
        );
        assert_eq!(
            calc_multisig_stats(&multisig(0, &[PUBKEY1], 1)),
            Err(Error::NotMultisigScript)
        );
        assert_eq!(
            extract_pk_script_addrs(&multisig(0, &[PUBKEY1], 1)),
            (ScriptClass::NonStandard, Vec::new(), 0)
        );

        // Keys of the right size that are not on the curve are classified but not extracted.
        let mut bogus = pubkey(PUBKEY1);
        bogus[0] = 0x05;
        let script = ScriptBuilder::new()
            .add_int64(1)
            .add_data(&pubkey(PUBKEY1))
            .add_data(&bogus)
            .add_int64(2)
            .add_op(OP_CHECKMULTISIG)
            .script()
            .unwrap();
        let (class, addrs, required_sigs) = extract_pk_script_addrs(&script);
        assert_eq!(class, ScriptClass::MultiSig);
        assert_eq!(addrs, vec![Address::PubKey(pubkey(PUBKEY1))]);
        assert_eq!(required_sigs, 1);
    }

    #[test]
    fn test_classify_null_data() {
        assert_eq!(get_script_class(&[OP_RETURN]), ScriptClass::NullData);

        let script = ScriptBuilder::new()
            .add_op(OP_RETURN)
            .add_data(&[0xab; MAX_DATA_CARRIER_SIZE])
            .script()
            .unwrap();
        let (class, addrs, required_sigs) = extract_pk_script_addrs(&script);
        assert_eq!(class, ScriptClass::NullData);
        assert!(addrs.is_empty());
        assert_eq!(required_sigs, 0);

        let script = ScriptBuilder::new()
            .add_op(OP_RETURN)
            .add_data(&[0xab; MAX_DATA_CARRIER_SIZE + 1])
            .script()
            .unwrap();
        assert_eq!(get_script_class(&script), ScriptClass::NonStandard);

        // Malformed scripts are non-standard.
        assert_eq!(get_script_class(&[OP_RETURN, OP_DATA_1]), ScriptClass::NonStandard);
        assert_eq!(
            extract_pk_script_addrs(&[OP_DATA_1]),
            (ScriptClass::NonStandard, Vec::new(), 0)
        );
    }

    #[test]
    fn test_vote_is_transparent() {
        let hash = [0x33u8; 20];
        let p2pkh = pay_to_addr_script(&Address::PubKeyHash(hash)).unwrap();

        let voting = ScriptBuilder::new()
            .add_ops(&p2pkh)
            .add_vote(&[0xaa; 21], &[])
            .script()
            .unwrap();

        assert_eq!(get_script_class(&voting), ScriptClass::PubKeyHash);
        assert_eq!(extract_pk_script_addrs(&voting), extract_pk_script_addrs(&p2pkh));
        assert_eq!(strip_vote_script(&voting), &p2pkh[..]);
        assert_eq!(
            extract_vote(&voting),
            Some(Vote {
                vote_for: vec![0xaa; 21],
                vote_against: vec![],
            })
        );

        assert_eq!(extract_vote(&p2pkh), None);
        assert_eq!(strip_vote_script(&p2pkh), &p2pkh[..]);

        // Small integer votes come from the builder's canonical pushes.
        let voting = ScriptBuilder::new()
            .add_ops(&p2pkh)
            .add_vote(&[5], &[0x81])
            .script()
            .unwrap();
        assert_eq!(get_script_class(&voting), ScriptClass::PubKeyHash);
        assert_eq!(
            extract_vote(&voting),
            Some(Vote {
                vote_for: vec![5],
                vote_against: vec![0x81],
            })
        );

        // Only a trailing triple is a vote.
        let mut not_trailing = voting.clone();
        not_trailing.push(OP_NOP);
        assert_eq!(extract_vote(&not_trailing), None);
        assert_eq!(get_script_class(&not_trailing), ScriptClass::NonStandard);
    }

    #[test]
    fn test_script_class_names() {
        assert_eq!(ScriptClass::WitnessV0PubKeyHash.name(), "witness_v0_keyhash");
        assert_eq!(ScriptClass::MultiSig.to_string(), "multisig");

        let address = Address::PubKeyHash([0x11; 20]);
        assert!(address.encode(&AddressParams::PKT_MAINNET).is_ok());
    }
}
