//! Script parsing and the routines operating on parsed scripts.
//!
//! A script is parsed into a sequence of [`ParsedOpcode`]s borrowing their push data
//! from the raw bytes. Parsing stops at the first malformed push; the opcodes read
//! before that point remain available through [`parse_script_partial`] for the
//! best-effort consumers (disassembly and signature operation counting).

use crate::constants::{MAX_PUBKEYS_PER_MULTISIG, WITNESS_V0_KEYHASH_SIZE, WITNESS_V0_SCRIPTHASH_SIZE};
use crate::error::Error;
use crate::opcode::*;
use crate::solver::strip_vote_script;
use std::fmt;

/// An opcode together with the data it pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedOpcode<'a> {
    info: &'static OpcodeInfo,
    data: &'a [u8],
}

impl<'a> ParsedOpcode<'a> {
    pub fn new(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            info: opcode_info(opcode),
            data,
        }
    }

    pub fn info(&self) -> &'static OpcodeInfo {
        self.info
    }

    /// Byte value of the opcode.
    pub fn opcode(&self) -> u8 {
        self.info.value
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Data pushed by the opcode, empty for non-push opcodes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Number of bytes the opcode occupies in its serialized form.
    pub fn encoded_len(&self) -> usize {
        let prefix = match self.info.length {
            -1 => 1,
            -2 => 2,
            -4 => 4,
            _ => 0,
        };
        1 + prefix + self.data.len()
    }

    /// Checks the push used the smallest possible opcode to represent its data.
    pub fn check_minimal_data_push(&self) -> Result<(), Error> {
        let data = self.data;
        let opcode = self.info.value;

        let expected = match data.len() {
            0 => OP_0,
            1 if (1..=16).contains(&data[0]) => OP_1 - 1 + data[0],
            1 if data[0] == 0x81 => OP_1NEGATE,
            len @ 1..=75 => len as u8,
            76..=255 => OP_PUSHDATA1,
            256..=65535 => OP_PUSHDATA2,
            _ => return Ok(()),
        };

        if opcode != expected {
            return Err(Error::MinimalData(format!(
                "{} bytes of data pushed with {} instead of {}",
                data.len(),
                self.info.name,
                opcode_info(expected).name
            )));
        }

        Ok(())
    }

    /// Returns whether the opcode is a non-push opcode or a push that used the most
    /// compact encoding for its data.
    pub fn is_canonical_push(&self) -> bool {
        let opcode = self.info.value;
        let data_len = self.data.len();

        if opcode > OP_16 {
            return true;
        }
        if opcode > OP_0 && opcode < OP_PUSHDATA1 && data_len == 1 && self.data[0] <= 16 {
            return false;
        }
        if opcode == OP_PUSHDATA1 && data_len < OP_PUSHDATA1 as usize {
            return false;
        }
        if opcode == OP_PUSHDATA2 && data_len <= 0xff {
            return false;
        }
        if opcode == OP_PUSHDATA4 && data_len <= 0xffff {
            return false;
        }

        true
    }

    /// Serializes the opcode and appends it to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let len = self.data.len();

        let fits = match self.info.length {
            1 => len == 0,
            -1 => u8::try_from(len).is_ok(),
            -2 => u16::try_from(len).is_ok(),
            -4 => u32::try_from(len).is_ok(),
            n => len == (n - 1) as usize,
        };

        if !fits {
            return Err(Error::InternalConsistency(format!(
                "parsed opcode {} has data length {len} which does not match its push-length code {}",
                self.info.name, self.info.length
            )));
        }

        out.push(self.info.value);
        match self.info.length {
            -1 => out.push(len as u8),
            -2 => out.extend_from_slice(&(len as u16).to_le_bytes()),
            -4 => out.extend_from_slice(&(len as u32).to_le_bytes()),
            _ => {}
        }
        out.extend_from_slice(self.data);

        Ok(())
    }
}

/// One-line disassembly of the opcode.
impl fmt::Display for ParsedOpcode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info.value {
            OP_0 => f.write_str("0"),
            OP_1NEGATE => f.write_str("-1"),
            OP_1..=OP_16 => write!(f, "{}", self.info.value - (OP_1 - 1)),
            _ if self.info.length == 1 => f.write_str(self.info.name),
            _ => f.write_str(&hex::encode(self.data)),
        }
    }
}

/// Iterator over the opcodes of a script.
///
/// Yields at most one error, after which the iteration ends.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    script: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self {
            script,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next opcode to be read.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<ParsedOpcode<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.script.len() {
            return None;
        }

        match read_opcode(self.script, self.offset) {
            Ok((opcode, next)) => {
                self.offset = next;
                Some(Ok(opcode))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads the opcode at `offset`, returning it with the offset of the following opcode.
fn read_opcode(script: &[u8], offset: usize) -> Result<(ParsedOpcode<'_>, usize), Error> {
    let info = opcode_info(script[offset]);
    let rest = &script[offset + 1..];

    let malformed = |needed: usize, available: usize| Error::MalformedPush {
        opcode: info.name,
        offset,
        needed,
        available,
    };

    let (data_len, prefix_len) = match info.length {
        1 => return Ok((ParsedOpcode { info, data: &[] }, offset + 1)),
        n if n > 1 => ((n - 1) as usize, 0),
        n => {
            let prefix_len = n.unsigned_abs() as usize;
            if rest.len() < prefix_len {
                return Err(malformed(prefix_len, rest.len()));
            }
            let data_len = match prefix_len {
                1 => rest[0] as usize,
                2 => u16::from_le_bytes([rest[0], rest[1]]) as usize,
                _ => u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize,
            };
            (data_len, prefix_len)
        }
    };

    let available = rest.len() - prefix_len;
    if data_len > available {
        return Err(malformed(data_len, available));
    }

    let start = offset + 1 + prefix_len;
    let data = &script[start..start + data_len];

    Ok((ParsedOpcode { info, data }, start + data_len))
}

/// Parses the whole script.
pub fn parse_script(script: &[u8]) -> Result<Vec<ParsedOpcode<'_>>, Error> {
    Instructions::new(script).collect()
}

/// Parses the script up to the first malformed push.
///
/// Returns the opcodes read before the failure along with the error, if any.
pub fn parse_script_partial(script: &[u8]) -> (Vec<ParsedOpcode<'_>>, Option<Error>) {
    let mut opcodes = Vec::new();
    for instruction in Instructions::new(script) {
        match instruction {
            Ok(opcode) => opcodes.push(opcode),
            Err(err) => return (opcodes, Some(err)),
        }
    }
    (opcodes, None)
}

/// Serializes parsed opcodes back into script bytes.
pub fn unparse_script(opcodes: &[ParsedOpcode<'_>]) -> Result<Vec<u8>, Error> {
    let mut script = Vec::with_capacity(opcodes.iter().map(ParsedOpcode::encoded_len).sum());
    for opcode in opcodes {
        opcode.write_to(&mut script)?;
    }
    Ok(script)
}

/// Returns a one-line disassembly of the script.
///
/// When the script fails to parse, the opcodes read so far are listed followed by
/// an `[error]` marker.
pub fn disasm_string(script: &[u8]) -> String {
    let (opcodes, err) = parse_script_partial(script);

    let mut disasm = opcodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    if err.is_some() {
        disasm.push_str("[error]");
    }

    disasm
}

/// Removes every occurrence of `opcode`.
pub fn remove_opcode<'a>(opcodes: &[ParsedOpcode<'a>], opcode: u8) -> Vec<ParsedOpcode<'a>> {
    opcodes
        .iter()
        .filter(|op| op.opcode() != opcode)
        .copied()
        .collect()
}

/// Removes every canonical push whose data contains `data`.
///
/// Empty `data` removes nothing.
pub fn remove_opcode_by_data<'a>(
    opcodes: &[ParsedOpcode<'a>],
    data: &[u8],
) -> Vec<ParsedOpcode<'a>> {
    if data.is_empty() {
        return opcodes.to_vec();
    }

    let contains = |haystack: &[u8]| haystack.windows(data.len()).any(|window| window == data);

    opcodes
        .iter()
        .filter(|op| !(op.info().is_push() && op.is_canonical_push() && contains(op.data())))
        .copied()
        .collect()
}

/// Returns whether the script only pushes data.
///
/// OP_RESERVED counts as a push here, matching the historical definition.
pub fn is_push_only(opcodes: &[ParsedOpcode<'_>]) -> bool {
    opcodes.iter().all(|op| op.opcode() <= OP_16)
}

/// Returns whether the raw script parses and only pushes data.
pub fn is_push_only_script(script: &[u8]) -> bool {
    parse_script(script).is_ok_and(|opcodes| is_push_only(&opcodes))
}

/// Returns the data of every push in the script, OP_0 included.
pub fn push_data(script: &[u8]) -> Result<Vec<&[u8]>, Error> {
    Ok(parse_script(script)?
        .into_iter()
        .filter(|op| op.info().is_push())
        .map(|op| op.data())
        .collect())
}

/// `OP_HASH160 <20 bytes> OP_EQUAL`
pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == OP_DATA_20 && script[22] == OP_EQUAL
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn is_pay_to_pubkey_hash(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == OP_DATA_20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

/// `OP_0 <20 bytes>`
pub fn is_witness_pubkey_hash(script: &[u8]) -> bool {
    script.len() == WITNESS_V0_KEYHASH_SIZE + 2
        && script[0] == OP_0
        && script[1] == WITNESS_V0_KEYHASH_SIZE as u8
}

/// `OP_0 <32 bytes>`
pub fn is_witness_script_hash(script: &[u8]) -> bool {
    script.len() == WITNESS_V0_SCRIPTHASH_SIZE + 2
        && script[0] == OP_0
        && script[1] == WITNESS_V0_SCRIPTHASH_SIZE as u8
}

/// Returns the version and program of a witness program, a script consisting of a
/// small integer version followed by a single direct push of 2 to 40 bytes.
pub fn extract_witness_program_info(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }

    let version = as_small_int(script[0])?;

    if script[1] as usize + 2 != script.len() {
        return None;
    }

    Some((version, &script[2..]))
}

pub fn is_witness_program(script: &[u8]) -> bool {
    extract_witness_program_info(script).is_some()
}

/// Returns whether the script can never be spent, i.e. it parses and starts with OP_RETURN.
pub fn is_unspendable(script: &[u8]) -> bool {
    parse_script(script)
        .is_ok_and(|opcodes| opcodes.first().is_some_and(|op| op.opcode() == OP_RETURN))
}

fn count_sig_ops(opcodes: &[ParsedOpcode<'_>], precise: bool) -> usize {
    let mut count = 0;
    let mut last_opcode = OP_INVALIDOPCODE;

    for op in opcodes {
        match op.opcode() {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                count += match as_small_int(last_opcode) {
                    Some(n) if precise && last_opcode != OP_0 => n as usize,
                    _ => MAX_PUBKEYS_PER_MULTISIG as usize,
                };
            }
            _ => {}
        }
        last_opcode = op.opcode();
    }

    count
}

/// Counts the signature operations of the script, assuming the maximum number of
/// keys for every multisig.
///
/// Opcodes preceding a parse failure are still counted.
pub fn get_sig_op_count(script: &[u8]) -> usize {
    let (opcodes, _) = parse_script_partial(script);
    count_sig_ops(&opcodes, false)
}

/// Counts the signature operations of spending `script_pubkey` with `script_sig`.
///
/// Multisig operations preceded by a small integer count that many keys, and with
/// `bip16` active a pay-to-script-hash output counts the operations of its redeem script.
pub fn get_precise_sig_op_count(script_sig: &[u8], script_pubkey: &[u8], bip16: bool) -> usize {
    let (opcodes, _) = parse_script_partial(script_pubkey);

    // Templates are matched the way the engine matches them, without a trailing vote.
    if !(bip16 && is_pay_to_script_hash(strip_vote_script(script_pubkey))) {
        return count_sig_ops(&opcodes, true);
    }

    let Some(redeem_script) = last_push_of_push_only(script_sig) else {
        return 0;
    };

    let (redeem_opcodes, _) = parse_script_partial(redeem_script);
    count_sig_ops(&redeem_opcodes, true)
}

/// Counts the signature operations of the witness when `script_pubkey` is a witness
/// program, directly or nested in pay-to-script-hash.
pub fn get_witness_sig_op_count(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &[Vec<u8>],
) -> usize {
    let template = strip_vote_script(script_pubkey);

    if is_witness_program(template) {
        return witness_sig_ops(template, witness);
    }

    if is_pay_to_script_hash(template) {
        if let Some(redeem_script) = last_push_of_push_only(script_sig) {
            if is_witness_program(redeem_script) {
                return witness_sig_ops(redeem_script, witness);
            }
        }
    }

    0
}

fn witness_sig_ops(program_script: &[u8], witness: &[Vec<u8>]) -> usize {
    match extract_witness_program_info(program_script) {
        Some((0, program)) if program.len() == WITNESS_V0_KEYHASH_SIZE => 1,
        Some((0, program)) if program.len() == WITNESS_V0_SCRIPTHASH_SIZE => {
            match witness.last() {
                Some(witness_script) => {
                    let (opcodes, _) = parse_script_partial(witness_script);
                    count_sig_ops(&opcodes, true)
                }
                None => 0,
            }
        }
        _ => 0,
    }
}

fn last_push_of_push_only(script_sig: &[u8]) -> Option<&[u8]> {
    let opcodes = parse_script(script_sig).ok()?;
    if !is_push_only(&opcodes) {
        return None;
    }
    opcodes.last().map(|op| op.data())
}
