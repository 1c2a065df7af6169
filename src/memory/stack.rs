//! Evaluation stack implementation
//!
//! The evaluation stack lives inside [`Memory`] between
//! [`EVAL_STACK_LIMIT`] and [`EVAL_STACK_TOP`] and grows downward one word
//! at a time. It is used for expression evaluation and parameter passing.
//!
//! # Layout
//!
//! Multi-word values keep their memory layout on the stack: the word that
//! lives at the lowest address in memory ends up on top. For a REAL that
//! means the low word is on top of the high word.

use super::value::{real_to_words, words_to_real, Word};
use super::Memory;
use crate::interpreter::constants::{EVAL_STACK_LIMIT, EVAL_STACK_TOP};
use crate::interpreter::errors::ExecutionError;

/// The evaluation stack pointer and its operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalStack {
    sp: u16,
}

impl EvalStack {
    pub fn new() -> Self {
        EvalStack { sp: EVAL_STACK_TOP }
    }

    /// Current stack pointer (address of the top word)
    pub fn sp(&self) -> u16 {
        self.sp
    }

    /// Reposition the stack pointer (frame restore, parameter release)
    pub fn set_sp(&mut self, sp: u16) {
        self.sp = sp;
    }

    /// Number of words currently on the stack
    pub fn depth(&self) -> usize {
        EVAL_STACK_TOP.saturating_sub(self.sp) as usize / 2
    }

    pub fn is_empty(&self) -> bool {
        self.sp >= EVAL_STACK_TOP
    }

    /// Push a word
    pub fn push(&mut self, mem: &mut Memory, word: Word) -> Result<(), ExecutionError> {
        if self.sp < EVAL_STACK_LIMIT + 2 {
            return Err(ExecutionError::StackOverflow);
        }
        self.sp -= 2;
        mem.write_word(self.sp, word)
    }

    /// Pop a word
    pub fn pop(&mut self, mem: &Memory) -> Result<Word, ExecutionError> {
        if self.sp >= EVAL_STACK_TOP {
            return Err(ExecutionError::SystemError {
                message: "evaluation stack underflow".to_string(),
            });
        }
        let word = mem.read_word(self.sp)?;
        self.sp += 2;
        Ok(word)
    }

    /// Read the word `depth` entries below the top without popping
    pub fn peek(&self, mem: &Memory, depth: u16) -> Result<Word, ExecutionError> {
        let addr = self.sp.wrapping_add(depth * 2);
        if addr >= EVAL_STACK_TOP {
            return Err(ExecutionError::SystemError {
                message: "evaluation stack underflow".to_string(),
            });
        }
        mem.read_word(addr)
    }

    pub fn push_int(&mut self, mem: &mut Memory, value: i16) -> Result<(), ExecutionError> {
        self.push(mem, value as Word)
    }

    pub fn pop_int(&mut self, mem: &Memory) -> Result<i16, ExecutionError> {
        Ok(self.pop(mem)? as i16)
    }

    pub fn push_bool(&mut self, mem: &mut Memory, value: bool) -> Result<(), ExecutionError> {
        self.push(mem, value as Word)
    }

    pub fn pop_bool(&mut self, mem: &Memory) -> Result<bool, ExecutionError> {
        Ok(self.pop(mem)? & 1 == 1)
    }

    /// Push a REAL: high word first, so the low word ends on top
    pub fn push_real(&mut self, mem: &mut Memory, value: f32) -> Result<(), ExecutionError> {
        let (low, high) = real_to_words(value);
        self.push(mem, high)?;
        self.push(mem, low)
    }

    pub fn pop_real(&mut self, mem: &Memory) -> Result<f32, ExecutionError> {
        let low = self.pop(mem)?;
        let high = self.pop(mem)?;
        Ok(words_to_real(low, high))
    }

    /// Push a block of words in memory order (`words[0]` ends on top)
    pub fn push_block(&mut self, mem: &mut Memory, words: &[Word]) -> Result<(), ExecutionError> {
        for &word in words.iter().rev() {
            self.push(mem, word)?;
        }
        Ok(())
    }

    /// Pop a block of `count` words in memory order
    pub fn pop_block(&mut self, mem: &Memory, count: usize) -> Result<Vec<Word>, ExecutionError> {
        (0..count).map(|_| self.pop(mem)).collect()
    }

    /// Discard `bytes` bytes from the top of the stack
    pub fn release(&mut self, bytes: u16) {
        self.sp = self.sp.wrapping_add(bytes);
    }

    /// Words currently on the stack, top first (for viewers; never fails)
    pub fn words(&self, mem: &Memory, limit: usize) -> Vec<Word> {
        let mut result = Vec::new();
        let mut addr = self.sp;
        while addr < EVAL_STACK_TOP && result.len() < limit {
            result.push(mem.peek_word(addr));
            addr += 2;
        }
        result
    }
}

impl Default for EvalStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_lifo() {
        let mut mem = Memory::new();
        let mut stack = EvalStack::new();
        stack.push(&mut mem, 1).unwrap();
        stack.push(&mut mem, 2).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.peek(&mem, 1).unwrap(), 1);
        assert_eq!(stack.pop(&mem).unwrap(), 2);
        assert_eq!(stack.pop(&mem).unwrap(), 1);
        assert!(stack.is_empty());
        assert!(stack.pop(&mem).is_err());
    }

    #[test]
    fn test_real_layout_matches_memory() {
        let mut mem = Memory::new();
        let mut stack = EvalStack::new();
        stack.push_real(&mut mem, 1.5).unwrap();
        let (low, high) = real_to_words(1.5);
        assert_eq!(mem.read_word(stack.sp()).unwrap(), low);
        assert_eq!(mem.read_word(stack.sp() + 2).unwrap(), high);
        assert_eq!(stack.pop_real(&mem).unwrap(), 1.5);
    }

    #[test]
    fn test_block_order() {
        let mut mem = Memory::new();
        let mut stack = EvalStack::new();
        stack.push_block(&mut mem, &[10, 20, 30]).unwrap();
        assert_eq!(stack.words(&mem, 8), vec![10, 20, 30]);
        assert_eq!(stack.pop_block(&mem, 3).unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut mem = Memory::new();
        let mut stack = EvalStack::new();
        stack.set_sp(EVAL_STACK_LIMIT + 2);
        stack.push(&mut mem, 1).unwrap();
        assert_eq!(stack.push(&mut mem, 2), Err(ExecutionError::StackOverflow));
    }
}
