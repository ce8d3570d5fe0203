use std::collections::HashMap;

use crate::{
    common::{Word, address::Address},
    decoder::Program,
    executor::ExecutorError,
};

pub const STACK_LIMIT: usize = 1024;

/// Largest single memory access (in bytes) the engine agrees to perform.
pub const MEMORY_LIMIT: usize = 1 << 25;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack(Vec<Word>);

impl Stack {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, value: Word) -> Result<(), ExecutorError> {
        if self.0.len() >= STACK_LIMIT {
            return Err(ExecutorError::StackOverflow);
        }
        self.0.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word, ExecutorError> {
        self.0.pop().ok_or(ExecutorError::StackUnderflow)
    }

    /// `peek(0)` is the top of the stack.
    pub fn peek(&self, n: usize) -> Option<&Word> {
        self.0.len().checked_sub(n + 1).and_then(|i| self.0.get(i))
    }

    /// Pops `n` words at once, top of the stack first. Nothing is popped on underflow.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Word>, ExecutorError> {
        if self.0.len() < n {
            return Err(ExecutorError::StackUnderflow);
        }
        let mut args = self.0.split_off(self.0.len() - n);
        args.reverse();
        Ok(args)
    }

    /// Bottom to top.
    pub fn as_slice(&self) -> &[Word] {
        &self.0
    }
}

/// Sparse byte-addressed memory. Absent bytes read as zero and are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    bytes: HashMap<Word, u8>,
    mark: Word,
}

impl Memory {
    /// High-water-mark in 32-byte words.
    pub fn words(&self) -> Word {
        self.mark
    }

    /// MSIZE
    pub fn size(&self) -> Word {
        self.mark.saturating_mul(Word::from(32))
    }

    /// The mark after an access to `[offset, offset + len)`, memory is not touched.
    pub fn expanded(&self, offset: &Word, len: &Word) -> Word {
        if len.is_zero() {
            return self.mark;
        }
        let end = offset.saturating_add(*len);
        self.mark.max(end.words())
    }

    pub fn touch(&mut self, offset: &Word, len: &Word) {
        self.mark = self.expanded(offset, len);
    }

    pub fn get(&self, offset: &Word) -> u8 {
        self.bytes.get(offset).copied().unwrap_or_default()
    }

    pub fn load(&mut self, offset: &Word, len: usize) -> Vec<u8> {
        self.touch(offset, &Word::from(len));
        (0..len)
            .map(|i| self.get(&offset.wrapping_add(Word::from(i))))
            .collect()
    }

    pub fn store(&mut self, offset: &Word, data: &[u8]) {
        self.touch(offset, &Word::from(data.len()));
        for (i, byte) in data.iter().enumerate() {
            let at = offset.wrapping_add(Word::from(i));
            if *byte == 0 {
                self.bytes.remove(&at);
            } else {
                self.bytes.insert(at, *byte);
            }
        }
    }

    /// Copies `len` bytes of `src` starting at `from` to `offset`.
    pub fn copy(&mut self, offset: &Word, src: &[u8], from: &Word, len: usize) {
        self.store(offset, &padded(src, from, len));
    }
}

/// `len` bytes of `src` starting at `from`, reading past its end as zeros.
pub fn padded(src: &[u8], from: &Word, len: usize) -> Vec<u8> {
    let start = from.to_usize().unwrap_or(usize::MAX);
    (0..len)
        .map(|i| {
            start
                .checked_add(i)
                .and_then(|at| src.get(at))
                .copied()
                .unwrap_or_default()
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gas {
    pub limit: Word,
    pub used: Word,
}

impl Gas {
    pub fn new(limit: Word) -> Self {
        Self {
            limit,
            used: Word::zero(),
        }
    }

    pub fn remaining(&self) -> Word {
        self.limit.saturating_sub(self.used)
    }

    /// Gives back gas returned by a callee.
    pub fn add(&mut self, gas: Word) {
        self.used = self.used.saturating_sub(gas);
    }

    pub fn sub(&mut self, gas: Word) -> Result<(), ExecutorError> {
        if gas > self.remaining() {
            return Err(ExecutorError::OutOfGas);
        }
        self.used = self.used.saturating_add(gas);
        Ok(())
    }
}

/// Isolated execution context of a single call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub program: Program,
    pub pc: usize,
    pub gas: Gas,
    pub stack: Stack,
    pub memory: Memory,
    /// Executing account.
    pub id: Address,
    pub caller: Address,
    pub value: Word,
    pub data: Vec<u8>,
    pub output: Vec<u8>,
}

impl Frame {
    pub fn new(program: Program, gas: Word) -> Self {
        Self {
            program,
            gas: Gas::new(gas),
            ..Default::default()
        }
    }

    pub fn with_context(self, id: Address, caller: Address, value: Word, data: Vec<u8>) -> Self {
        Self {
            id,
            caller,
            value,
            data,
            ..self
        }
    }
}
