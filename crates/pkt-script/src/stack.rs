use crate::flags::VerifyFlags;
use crate::num::ScriptNum;
use std::ops::{Deref, DerefMut};

/// Stack error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StackError {
    #[error("invalid stack operation")]
    InvalidOperation,
    #[error("stack index {index} is out of range for a stack of depth {depth}")]
    InvalidIndex { index: i64, depth: usize },
    #[error(transparent)]
    Num(#[from] crate::num::NumError),
}

/// Stack for the script execution.
pub type Stack = GenericStack<Vec<u8>>;

type Result<T> = std::result::Result<T, StackError>;

/// A stack used for managing script execution data with various operations.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct GenericStack<T = Vec<u8>> {
    data: Vec<T>,
    verify_minimaldata: bool,
}

#[cfg(test)]
impl<T> From<Vec<T>> for GenericStack<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            data,
            verify_minimaldata: false,
        }
    }
}

impl<T> Deref for GenericStack<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for GenericStack<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<T> GenericStack<T> {
    #[inline]
    pub fn new(data: Vec<T>, verify_minimaldata: bool) -> Self {
        Self {
            data,
            verify_minimaldata,
        }
    }

    pub fn with_flags(flags: &VerifyFlags) -> Self {
        Self {
            data: Vec::new(),
            verify_minimaldata: flags.verify_minimaldata(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Consumes the stack and returns the items, bottom first.
    pub fn into_inner(self) -> Vec<T> {
        self.data
    }

    // Ensure there are at least `n` elements on the stack.
    #[inline]
    pub fn require(&self, len: usize) -> Result<()> {
        if self.data.len() < len {
            return Err(StackError::InvalidOperation);
        }
        Ok(())
    }

    /// Returns the last element of the stack.
    #[inline]
    pub fn last(&self) -> Result<&T> {
        self.data.last().ok_or(StackError::InvalidOperation)
    }

    /// Removes and returns the last element of the stack.
    #[inline]
    pub fn pop(&mut self) -> Result<T> {
        self.data.pop().ok_or(StackError::InvalidOperation)
    }

    /// Pops a number from the stack and converts it into a ScriptNum.
    #[inline]
    pub fn pop_num(&mut self) -> Result<ScriptNum>
    where
        T: AsRef<[u8]>,
    {
        self.pop_num_with_max_size(ScriptNum::MAX_NUM_SIZE)
    }

    /// Pops a number of at most `max_size` bytes from the stack.
    #[inline]
    pub fn pop_num_with_max_size(&mut self, max_size: usize) -> Result<ScriptNum>
    where
        T: AsRef<[u8]>,
    {
        ScriptNum::from_bytes(self.pop()?.as_ref(), self.verify_minimaldata, Some(max_size))
            .map_err(Into::into)
    }

    /// Decodes the top element as a number of at most `max_size` bytes, leaving it on the stack.
    #[inline]
    pub fn peek_num_with_max_size(&self, max_size: usize) -> Result<ScriptNum>
    where
        T: AsRef<[u8]>,
    {
        ScriptNum::from_bytes(self.last()?.as_ref(), self.verify_minimaldata, Some(max_size))
            .map_err(Into::into)
    }

    /// Push an element onto the stack.
    #[inline]
    pub fn push(&mut self, value: T) -> &mut Self {
        self.data.push(value);
        self
    }

    /// Returns the element at the specified position from the top of the stack.
    ///
    /// `self.top(0)` is equalant to `self.last()`.
    #[inline]
    pub fn top(&self, i: usize) -> Result<&T> {
        let pos = i + 1;
        self.require(pos)?;
        Ok(&self.data[self.data.len() - pos])
    }

    /// Peeks the top element and converts it to a boolean.
    #[inline]
    pub fn peek_bool(&self) -> Result<bool>
    where
        T: AsRef<[u8]>,
    {
        Ok(cast_to_bool(self.last()?.as_ref()))
    }

    /// Pops the top element and converts it to a boolean.
    #[inline]
    pub fn pop_bool(&mut self) -> Result<bool>
    where
        T: AsRef<[u8]>,
    {
        Ok(cast_to_bool(self.pop()?.as_ref()))
    }

    /// Removes the element at the given index.
    #[inline]
    pub fn remove(&mut self, i: usize) -> Result<T> {
        let pos = i + 1;
        self.require(pos)?;
        let to_remove = self.data.len() - pos;
        Ok(self.data.remove(to_remove))
    }

    /// Removes the top `n` stack items.
    #[inline]
    pub fn drop(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        for _ in 0..n {
            self.data.pop();
        }
        Ok(())
    }

    /// Duplicates the top N items on the stack.
    ///
    /// dup(1): [x1 x2] -> [x1 x2 x2]
    /// dup(2): [x1 x2] -> [x1 x2 x1 x2]
    #[inline]
    pub fn dup(&mut self, n: usize) -> Result<()>
    where
        T: Clone,
    {
        self.require(n)?;
        let len = self.data.len();
        // Extend the stack with a clone of the top `n` items in place.
        self.data.extend_from_within(len - n..);
        Ok(())
    }

    /// Copies N items N items back to the top of the stack.
    ///
    /// over(1): [... x1 x2 x3] -> [... x1 x2 x3 x2]
    /// over(2): [... x1 x2 x3 x4] -> [... x1 x2 x3 x4 x1 x2]
    #[inline]
    pub fn over(&mut self, n: usize) -> Result<()>
    where
        T: Clone,
    {
        let count = n * 2;
        self.require(count)?;

        let len = self.data.len();

        // Extend the stack with a clone of the items `n` back in place.
        self.data.extend_from_within(len - count..len - count + n);

        Ok(())
    }

    /// Rotates the top 3N items on the stack to the left N times.
    ///
    /// - rot(1): [x1 x2 x3] -> [x2 x3 x1]
    /// - rot(2): [x1 x2 x3 x4 x5 x6] -> [x3 x4 x5 x6 x1 x2]
    #[inline]
    pub fn rot(&mut self, n: usize) -> Result<()>
    where
        T: Clone,
    {
        let count = n * 3;
        self.require(count)?;

        let len = self.data.len();
        let start_index = len - count;
        let slice = &mut self.data[start_index..];

        slice.rotate_left(n);

        Ok(())
    }

    // Swaps the top N items on the stack with those below them.
    //
    // GenericStack transformation:
    // - swap(1): [x1 x2] -> [x2 x1]
    // - swap(2): [x1 x2 x3 x4] -> [x3 x4 x1 x2]
    #[inline]
    pub fn swap(&mut self, n: usize) -> Result<()> {
        let count = n * 2;
        self.require(count)?;
        let len = self.data.len();
        // Use slices to perform the swap
        let (lower, upper) = self.data.split_at_mut(len - count + n);
        lower[len - count..].swap_with_slice(&mut upper[..n]);
        Ok(())
    }

    /// Removes the second-to-top stack item.
    ///
    /// nip: [x1 x2 x3] -> [x1 x3]
    #[inline]
    pub fn nip(&mut self) -> Result<()> {
        self.require(2)?;
        let len = self.data.len();
        self.data.swap_remove(len - 2);
        Ok(())
    }

    // Copies the item at the top of the stack and inserts it before the 2nd
    // to top item.
    //
    // [... x1 x2] -> [... x2 x1 x2]
    #[inline]
    pub fn tuck(&mut self) -> Result<()>
    where
        T: Clone,
    {
        self.require(2)?;
        let len = self.data.len();
        let v = self.data[len - 1].clone();
        self.data.insert(len - 2, v);
        Ok(())
    }

    /// Copies the item `n` back in the stack to the top.
    ///
    /// pick(2): [x1 x2 x3] -> [x1 x2 x3 x1]
    #[inline]
    pub fn pick(&mut self, n: i64) -> Result<()>
    where
        T: Clone,
    {
        let index = self.check_index(n)?;
        let v = self.top(index)?.clone();
        self.data.push(v);
        Ok(())
    }

    /// Moves the item `n` back in the stack to the top.
    ///
    /// roll(2): [x1 x2 x3] -> [x2 x3 x1]
    #[inline]
    pub fn roll(&mut self, n: i64) -> Result<()> {
        let index = self.check_index(n)?;
        let v = self.remove(index)?;
        self.data.push(v);
        Ok(())
    }

    fn check_index(&self, n: i64) -> Result<usize> {
        if n < 0 || n >= self.data.len() as i64 {
            return Err(StackError::InvalidIndex {
                index: n,
                depth: self.data.len(),
            });
        }
        Ok(n as usize)
    }
}

impl Stack {
    #[inline]
    pub fn push_num(&mut self, num: impl Into<ScriptNum>) -> &mut Self {
        self.push(num.into().to_bytes());
        self
    }

    #[inline]
    pub fn push_bool(&mut self, boolean: bool) -> &mut Self {
        if boolean {
            self.push(vec![1]);
        } else {
            self.push(Vec::new());
        }
        self
    }
}

/// Converts a byte slice to a boolean.
pub fn cast_to_bool(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&last, rest)) => rest.iter().any(|&x| x != 0) || (last != 0 && last != 0x80),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::NumError;

    type TestStack = GenericStack<u8>;
    type StackOp = fn(&mut TestStack) -> Result<()>;

    #[test]
    fn test_access() {
        let mut stack: TestStack = vec![0, 5].into();
        assert_eq!(stack.require(2), Ok(()));
        assert_eq!(stack.require(3), Err(StackError::InvalidOperation));
        assert_eq!(stack.last(), Ok(&5));
        assert_eq!(stack.top(1), Ok(&0));
        assert_eq!(stack.top(2), Err(StackError::InvalidOperation));
        assert_eq!(stack.remove(1), Ok(0));
        assert_eq!(stack.pop(), Ok(5));
        assert_eq!(stack.pop(), Err(StackError::InvalidOperation));
        assert_eq!(stack.last(), Err(StackError::InvalidOperation));
        stack.push(7).push(8);
        assert_eq!(stack.into_inner(), vec![7, 8]);
    }

    #[test]
    fn test_shuffle_ops() {
        // (operation, initial stack, stack afterwards or None if the stack is too short)
        let cases: &[(&str, StackOp, &[u8], Option<&[u8]>)] = &[
            ("drop(0)", |s| s.drop(0), &[], Some(&[])),
            ("drop(2)", |s| s.drop(2), &[0, 1, 2], Some(&[0])),
            ("drop(3)", |s| s.drop(3), &[0, 1], None),
            ("dup(1)", |s| s.dup(1), &[1, 2], Some(&[1, 2, 2])),
            ("dup(2)", |s| s.dup(2), &[1, 2], Some(&[1, 2, 1, 2])),
            ("dup(3)", |s| s.dup(3), &[1, 2], None),
            ("over(1)", |s| s.over(1), &[1, 2, 3], Some(&[1, 2, 3, 2])),
            ("over(2)", |s| s.over(2), &[1, 2, 3, 4], Some(&[1, 2, 3, 4, 1, 2])),
            ("over(2)", |s| s.over(2), &[1, 2, 3], None),
            ("rot(1)", |s| s.rot(1), &[0, 1, 2, 3], Some(&[0, 2, 3, 1])),
            ("rot(2)", |s| s.rot(2), &[1, 2, 3, 4, 5, 6], Some(&[3, 4, 5, 6, 1, 2])),
            ("rot(1)", |s| s.rot(1), &[1, 2], None),
            ("swap(1)", |s| s.swap(1), &[0, 1, 2, 3], Some(&[0, 1, 3, 2])),
            ("swap(2)", |s| s.swap(2), &[0, 1, 2, 3], Some(&[2, 3, 0, 1])),
            ("swap(3)", |s| s.swap(3), &[0, 1, 2, 3], None),
            ("nip", |s| s.nip(), &[0, 1, 2], Some(&[0, 2])),
            ("nip", |s| s.nip(), &[0], None),
            ("tuck", |s| s.tuck(), &[0, 1, 2], Some(&[0, 2, 1, 2])),
            ("tuck", |s| s.tuck(), &[0], None),
        ];

        for (name, op, initial, expected) in cases {
            let mut stack: TestStack = initial.to_vec().into();
            let result = op(&mut stack);
            match expected {
                Some(expected) => {
                    assert_eq!(result, Ok(()), "{name} on {initial:?}");
                    assert_eq!(stack.into_inner(), expected.to_vec(), "{name} on {initial:?}");
                }
                None => {
                    assert_eq!(result, Err(StackError::InvalidOperation), "{name} on {initial:?}");
                    assert_eq!(stack.into_inner(), initial.to_vec(), "{name} on {initial:?}");
                }
            }
        }
    }

    #[test]
    fn test_pick_roll() {
        let mut stack: TestStack = vec![1, 2, 3].into();
        assert_eq!(stack.pick(2), Ok(()));
        assert_eq!(stack.roll(1), Ok(()));
        assert_eq!(stack.roll(0), Ok(()));
        assert_eq!(stack.into_inner(), vec![1, 2, 1, 3]);

        // Indices come from 4-byte operands clamped to i32, none of them may wrap into range.
        let stack: TestStack = vec![1, 2, 3].into();
        for index in [3, -1, i64::from(i32::MAX), i64::from(i32::MIN)] {
            let mut stack = stack.clone();
            let expected = Err(StackError::InvalidIndex { index, depth: 3 });
            assert_eq!(stack.pick(index), expected);
            assert_eq!(stack.roll(index), expected);
            assert_eq!(stack.into_inner(), vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_numbers() {
        let mut stack = Stack::default();
        stack.push_num(-129).push_num(0).push_bool(true).push_bool(false);
        assert_eq!(stack.into_inner(), vec![vec![0x81, 0x80], vec![], vec![1], vec![]]);

        let mut stack = Stack::default();
        stack.push_num(-129).push_num(0).push_bool(true);
        assert_eq!(stack.peek_bool(), Ok(true));
        assert_eq!(stack.pop_bool(), Ok(true));
        assert_eq!(stack.pop_num().map(|n| n.value()), Ok(0));
        assert_eq!(stack.pop_num().map(|n| n.value()), Ok(-129));
        assert_eq!(stack.pop_num(), Err(StackError::InvalidOperation));
    }

    #[test]
    fn test_number_width() {
        // 5-byte lock times only decode through the wide accessors.
        let lock_time = vec![0xff, 0xff, 0xff, 0xff, 0x00];
        let mut stack = Stack::new(vec![lock_time.clone()], true);
        assert_eq!(
            stack.peek_num_with_max_size(5).map(|n| n.value()),
            Ok(4294967295)
        );
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.pop_num(), Err(StackError::Num(NumError::Overflow)));

        let mut stack = Stack::new(vec![lock_time], true);
        assert_eq!(
            stack.pop_num_with_max_size(5).map(|n| n.value()),
            Ok(4294967295)
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn test_minimal_data_flag() {
        let non_minimal = vec![vec![0x01, 0x00]];

        let mut lax = Stack::new(non_minimal.clone(), false);
        assert_eq!(lax.pop_num().map(|n| n.value()), Ok(1));

        let mut strict = Stack::with_flags(&VerifyFlags::MINIMALDATA);
        strict.extend(non_minimal);
        assert_eq!(strict.pop_num(), Err(StackError::Num(NumError::NotMinimallyEncoded)));
    }

    #[test]
    fn test_cast_to_bool() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00]));
        assert!(!cast_to_bool(&[0x80]));
        assert!(!cast_to_bool(&[0x00, 0x00, 0x80]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x00, 0x01]));
        assert!(cast_to_bool(&[0x01]));
    }
}
