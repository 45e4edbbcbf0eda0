//! Script numeric

use std::ops::{Add, Neg, Sub};

/// Script number error type.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum NumError {
    #[error("Script number overflow")]
    Overflow,
    #[error("Non-minimally encoded script number")]
    NotMinimallyEncoded,
}

/// A numeric type used in Bitcoin Script operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScriptNum {
    value: i64,
}

impl<T: Into<i64>> From<T> for ScriptNum {
    fn from(value: T) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl ScriptNum {
    /// Maximum script number length in bytes.
    pub const MAX_NUM_SIZE: usize = 4;

    /// Construct a [`ScriptNum`] with size validation.
    pub fn from_bytes(
        data: &[u8],
        require_minimal: bool,
        max_size: Option<usize>,
    ) -> Result<Self, NumError> {
        let max_size = max_size.unwrap_or(Self::MAX_NUM_SIZE);

        if data.len() > max_size {
            return Err(NumError::Overflow);
        }

        let Some(&last) = data.last() else {
            return Ok(Self { value: 0 });
        };

        if require_minimal && !Self::is_minimally_encoded(data) {
            return Err(NumError::NotMinimallyEncoded);
        }

        // Little endian magnitude, the high bit of the last byte is the sign.
        let magnitude = data
            .iter()
            .rev()
            .fold(0i64, |acc, &byte| acc.wrapping_shl(8) | i64::from(byte));

        let value = if last & 0x80 != 0 {
            let sign_bit = 0x80i64.wrapping_shl(8 * (data.len() as u32 - 1));
            -(magnitude & !sign_bit)
        } else {
            magnitude
        };

        Ok(Self { value })
    }

    /// Convert the number to a minimally encoded byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.value == 0 {
            return vec![];
        }

        let mut result = Vec::new();

        let mut abs_value = self.value.unsigned_abs();

        while abs_value != 0 {
            result.push((abs_value & 0xff) as u8);
            abs_value >>= 8;
        }

        let negative = self.value < 0;

        // Handle sign bit
        let last = result.len() - 1;
        if result[last] & 0x80 != 0 {
            result.push(if negative { 0x80 } else { 0 });
        } else if negative {
            result[last] |= 0x80;
        }

        result
    }

    /// A number is minimal unless its last byte carries nothing but the sign, which is
    /// only needed when the byte before it has the high bit set.
    fn is_minimally_encoded(data: &[u8]) -> bool {
        match data {
            [] => true,
            [.., prev, last] if *last & 0x7f == 0 => *prev & 0x80 != 0,
            [last] => *last & 0x7f != 0,
            _ => true,
        }
    }

    /// Get the underlying value.
    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative()
    }

    pub fn abs(&self) -> Self {
        self.value.wrapping_abs().into()
    }

    /// Returns the value clamped to the i32 range, the width every opcode operand
    /// other than lock times is decoded with.
    pub fn to_i32(&self) -> i32 {
        self.value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }
}

impl Add for ScriptNum {
    type Output = Self;

    // Operands are at most 5 bytes wide, the sum always fits in an i64.
    fn add(self, other: Self) -> Self {
        Self {
            value: self.value.wrapping_add(other.value),
        }
    }
}

impl Sub for ScriptNum {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            value: self.value.wrapping_sub(other.value),
        }
    }
}

impl Neg for ScriptNum {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: self.value.wrapping_neg(),
        }
    }
}
