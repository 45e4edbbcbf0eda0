use crate::constants::{MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE};
use crate::error::Error;
use crate::num::ScriptNum;
use crate::opcode::{OP_0, OP_1, OP_1NEGATE, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_VOTE};

/// Builds scripts using canonical pushes.
///
/// The first failure is recorded and every later call becomes a no-op, so a chain of
/// calls only needs to be checked once through [`ScriptBuilder::script`].
#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    script: Vec<u8>,
    err: Option<Error>,
}

/// Serialized size of the canonical push of `data`.
fn canonical_data_size(data: &[u8]) -> usize {
    let len = data.len();

    if len == 0 || (len == 1 && (data[0] <= 16 || data[0] == 0x81)) {
        return 1;
    }

    if len < OP_PUSHDATA1 as usize {
        1 + len
    } else if len <= 0xff {
        2 + len
    } else if len <= 0xffff {
        3 + len
    } else {
        5 + len
    }
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length of the script under construction.
    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    fn fits(&mut self, extra: usize) -> bool {
        if self.err.is_some() {
            return false;
        }

        let new_len = self.script.len() + extra;
        if new_len > MAX_SCRIPT_SIZE {
            self.err = Some(Error::ScriptSize(new_len));
            return false;
        }

        true
    }

    /// Appends a single opcode.
    pub fn add_op(mut self, opcode: u8) -> Self {
        if self.fits(1) {
            self.script.push(opcode);
        }
        self
    }

    /// Appends the opcodes in order.
    pub fn add_ops(mut self, opcodes: &[u8]) -> Self {
        if self.fits(opcodes.len()) {
            self.script.extend_from_slice(opcodes);
        }
        self
    }

    /// Appends the canonical push of `data`.
    ///
    /// Empty data and `[0]` become OP_0, `[1]..=[16]` the matching small integer
    /// opcode and `[0x81]` OP_1NEGATE.
    pub fn add_data(mut self, data: &[u8]) -> Self {
        if self.err.is_some() {
            return self;
        }

        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            self.err = Some(Error::ElementTooBig(data.len()));
            return self;
        }

        if self.fits(canonical_data_size(data)) {
            self.push_data_unchecked(data);
        }
        self
    }

    /// Appends the canonical push of `data` without the element and script size limits.
    ///
    /// Only useful for constructing scripts that are meant to fail.
    pub fn add_full_data(mut self, data: &[u8]) -> Self {
        if self.err.is_some() {
            return self;
        }

        if u32::try_from(data.len()).is_err() {
            self.err = Some(Error::ElementTooBig(data.len()));
            return self;
        }

        self.push_data_unchecked(data);
        self
    }

    /// Appends the shortest encoding of `value`.
    pub fn add_int64(mut self, value: i64) -> Self {
        if !self.fits(1) {
            return self;
        }

        match value {
            0 => {
                self.script.push(OP_0);
                self
            }
            -1 => {
                self.script.push(OP_1NEGATE);
                self
            }
            1..=16 => {
                self.script.push(OP_1 - 1 + value as u8);
                self
            }
            _ => self.add_data(&ScriptNum::from(value).to_bytes()),
        }
    }

    /// Appends a `<vote_for> <vote_against> OP_VOTE` suffix.
    pub fn add_vote(self, vote_for: &[u8], vote_against: &[u8]) -> Self {
        self.add_data(vote_for)
            .add_data(vote_against)
            .add_op(OP_VOTE)
    }

    /// Clears the script and any recorded failure.
    pub fn reset(mut self) -> Self {
        self.script.clear();
        self.err = None;
        self
    }

    /// Returns the built script or the first failure encountered.
    pub fn script(self) -> Result<Vec<u8>, Error> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.script),
        }
    }

    fn push_data_unchecked(&mut self, data: &[u8]) {
        let len = data.len();

        if len == 0 || (len == 1 && data[0] == 0) {
            self.script.push(OP_0);
            return;
        }

        if len == 1 && data[0] <= 16 {
            self.script.push(OP_1 - 1 + data[0]);
            return;
        }

        if len == 1 && data[0] == 0x81 {
            self.script.push(OP_1NEGATE);
            return;
        }

        if len < OP_PUSHDATA1 as usize {
            self.script.push(len as u8);
        } else if len <= 0xff {
            self.script.push(OP_PUSHDATA1);
            self.script.push(len as u8);
        } else if len <= 0xffff {
            self.script.push(OP_PUSHDATA2);
            self.script.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.script.push(OP_PUSHDATA4);
            self.script.extend_from_slice(&(len as u32).to_le_bytes());
        }

        self.script.extend_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::*;
    use crate::script::parse_script;

    #[test]
    fn test_add_int64() {
        let cases: &[(i64, &[u8])] = &[
            (0, &[OP_0]),
            (-1, &[OP_1NEGATE]),
            (1, &[OP_1]),
            (16, &[OP_16]),
            (17, &[OP_DATA_1, 0x11]),
            (-2, &[OP_DATA_1, 0x82]),
            (127, &[OP_DATA_1, 0x7f]),
            (128, &[0x02, 0x80, 0x00]),
            (-128, &[0x02, 0x80, 0x80]),
            (255, &[0x02, 0xff, 0x00]),
            (65535, &[0x03, 0xff, 0xff, 0x00]),
            (2147483647, &[0x04, 0xff, 0xff, 0xff, 0x7f]),
            (-2147483647, &[0x04, 0xff, 0xff, 0xff, 0xff]),
            (
                i64::MAX,
                &[0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f],
            ),
        ];

        for (value, expected) in cases {
            let script = ScriptBuilder::new().add_int64(*value).script().unwrap();
            assert_eq!(&script, expected, "encoding of {value}");
        }
    }

    #[test]
    fn test_add_int64_is_canonical() {
        for value in 0..=65535i64 {
            for value in [value, -value] {
                let script = ScriptBuilder::new().add_int64(value).script().unwrap();
                let opcodes = parse_script(&script).unwrap();
                assert_eq!(opcodes.len(), 1);
                assert!(opcodes[0].is_canonical_push(), "{value}");
                if opcodes[0].info().is_push() {
                    assert!(opcodes[0].check_minimal_data_push().is_ok(), "{value}");
                }
            }
        }
    }

    #[test]
    fn test_add_data_is_canonical() {
        for len in 0..=MAX_SCRIPT_ELEMENT_SIZE {
            let data = vec![0x49; len];
            let script = ScriptBuilder::new().add_data(&data).script().unwrap();
            let opcodes = parse_script(&script).unwrap();
            assert_eq!(opcodes.len(), 1);
            assert!(opcodes[0].is_canonical_push(), "{len} bytes");
            assert!(opcodes[0].check_minimal_data_push().is_ok(), "{len} bytes");
            assert_eq!(opcodes[0].data(), &data[..]);
        }
    }

    #[test]
    fn test_add_data_small_values() {
        let script = ScriptBuilder::new()
            .add_data(&[])
            .add_data(&[0])
            .add_data(&[5])
            .add_data(&[16])
            .add_data(&[17])
            .add_data(&[0x81])
            .script()
            .unwrap();
        assert_eq!(
            script,
            vec![OP_0, OP_0, OP_5, OP_16, OP_DATA_1, 17, OP_1NEGATE]
        );
    }

    #[test]
    fn test_first_error_sticks() {
        let result = ScriptBuilder::new()
            .add_op(OP_DUP)
            .add_data(&[0u8; MAX_SCRIPT_ELEMENT_SIZE + 1])
            .add_op(OP_EQUAL)
            .script();
        assert_eq!(result, Err(Error::ElementTooBig(MAX_SCRIPT_ELEMENT_SIZE + 1)));

        let mut builder = ScriptBuilder::new();
        for _ in 0..MAX_SCRIPT_SIZE {
            builder = builder.add_op(OP_NOP);
        }
        assert_eq!(builder.len(), MAX_SCRIPT_SIZE);
        let builder = builder.add_op(OP_NOP).add_data(&[1, 2]);
        assert_eq!(builder.len(), MAX_SCRIPT_SIZE);
        assert_eq!(builder.script(), Err(Error::ScriptSize(MAX_SCRIPT_SIZE + 1)));

        let builder = ScriptBuilder::new()
            .add_data(&[0u8; 1000])
            .reset()
            .add_op(OP_TRUE);
        assert_eq!(builder.script(), Ok(vec![OP_TRUE]));
    }

    #[test]
    fn test_add_full_data_skips_limits() {
        let data = vec![0u8; MAX_SCRIPT_ELEMENT_SIZE + 1];
        let script = ScriptBuilder::new().add_full_data(&data).script().unwrap();
        assert_eq!(&script[..3], &[OP_PUSHDATA2, 0x09, 0x02]);
        assert_eq!(script.len(), 3 + data.len());
    }

    #[test]
    fn test_add_vote() {
        let script = ScriptBuilder::new()
            .add_ops(&[OP_DUP, OP_HASH160])
            .add_vote(&[], &[0xaa, 0xbb])
            .script()
            .unwrap();
        assert_eq!(script, vec![OP_DUP, OP_HASH160, OP_0, 0x02, 0xaa, 0xbb, OP_VOTE]);
    }
}
